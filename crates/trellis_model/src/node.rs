//! Node identity and the per-node component/view API
//!
//! A [`ModelNode`] is an opaque identity owning a path, a lifecycle state,
//! an ordered projection list, and a cached component signature. Payloads
//! live in the registry's shared [`ObservableStore`]; the node keeps its
//! signature bitset in step with every addition so action gating never has
//! to walk the store.
//!
//! Node ids come from a single process-wide counter: monotonically
//! increasing, never recycled, valid across independent registries.

use crate::bits::Bits;
use crate::component::{Component, ComponentId};
use crate::error::{ModelError, Result};
use crate::path::ModelPath;
use crate::projection::{InstantiationContext, ModelProjection, ProjectionSpec, ViewTag};
use crate::state::ModelState;
use crate::store::{ComponentStore, MapStore, ObservableStore};
use std::any::{type_name, Any};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Shared handle to the registry's observable component store.
pub(crate) type SharedStore = Arc<RwLock<ObservableStore<MapStore>>>;

/// Process-wide id source. Id allocation is the one piece of shared mutable
/// state reachable from multiple registries, so it is serialized here even
/// though everything else assumes single-threaded access.
static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque node identity. Never reused after removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Allocates the next id.
    pub(crate) fn next() -> NodeId {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw id value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An entity in the model: identity, components, projections, lifecycle.
pub struct ModelNode {
    id: NodeId,
    path: ModelPath,
    state: ModelState,
    /// Cached signature; updated on every component addition.
    bits: Bits,
    projections: Vec<ModelProjection>,
    default_view: Option<ViewTag>,
    store: SharedStore,
}

impl ModelNode {
    pub(crate) fn new(id: NodeId, path: ModelPath, store: SharedStore) -> Self {
        Self {
            id,
            path,
            state: ModelState::Created,
            bits: Bits::empty(),
            projections: Vec::new(),
            default_view: None,
            store,
        }
    }

    /// This node's identity.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Where this node lives in the model tree.
    pub fn path(&self) -> &ModelPath {
        &self.path
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ModelState {
        self.state
    }

    /// The name used in diagnostics: the path's string form.
    pub fn display_name(&self) -> String {
        self.path.to_string()
    }

    /// The node's current component signature.
    pub fn component_bits(&self) -> Bits {
        self.bits.clone()
    }

    pub(crate) fn set_state(&mut self, state: ModelState) {
        self.state = state;
    }

    pub(crate) fn set_default_view(&mut self, view: Option<ViewTag>) {
        self.default_view = view;
    }

    // =========================================================================
    // COMPONENTS
    // =========================================================================

    /// Stores `value` on this node and folds its bit into the signature.
    /// Returns true when the component's bit was previously unset — the
    /// registry only re-dispatches for first-time additions.
    pub(crate) fn add_component(&mut self, value: Box<dyn Component>) -> bool {
        let id = value.component_id();
        let newly_set = !self.bits.get(id.index());
        self.store.write().unwrap().set(self.id, value);
        self.bits = self.bits.or(&id.bits());
        newly_set
    }

    /// Whether a component of type `T` is present.
    pub fn has_component<T: Any>(&self) -> bool {
        self.bits.get(ComponentId::of::<T>().index())
    }

    /// The component of type `T`, if present.
    pub fn find_component<T: Any + Clone>(&self) -> Option<T> {
        self.store
            .read()
            .unwrap()
            .get(self.id, ComponentId::of::<T>())
            .and_then(|value| value.as_any().downcast_ref::<T>().cloned())
    }

    /// The component of type `T`. Absence is a usage error, reported with
    /// the node's display name — distinct from "not yet resolved".
    pub fn get_component<T: Any + Clone>(&self) -> Result<T> {
        self.find_component::<T>()
            .ok_or_else(|| ModelError::ComponentNotFound {
                node: self.display_name(),
                component: type_name::<T>(),
            })
    }

    /// Ids of all components on this node, in insertion order.
    pub fn component_ids(&self) -> Vec<ComponentId> {
        self.store.read().unwrap().ids_of(self.id)
    }

    /// Snapshot of all component payloads, in insertion order.
    pub fn components(&self) -> Vec<Box<dyn Component>> {
        self.store
            .read()
            .unwrap()
            .all_of(self.id)
            .into_iter()
            .map(|value| value.clone_box())
            .collect()
    }

    // =========================================================================
    // PROJECTIONS
    // =========================================================================

    pub(crate) fn add_projection(&mut self, spec: ProjectionSpec) {
        self.projections.push(spec.attach());
    }

    fn instantiation_context(&self) -> InstantiationContext {
        InstantiationContext::new(self.id, self.path.clone())
    }

    /// Whether any projection declares view type `T`.
    pub fn can_be_viewed_as<T: Any>(&self) -> bool {
        self.projections
            .iter()
            .any(|projection| projection.can_be_viewed_as::<T>())
    }

    /// Resolves this node as `T`: the first projection in registration
    /// order that declares the view and yields a `T` wins. Failure carries
    /// the node's display name and every currently viewable type, so the
    /// error is self-diagnosing.
    pub fn projection<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        let ctx = self.instantiation_context();
        for projection in &self.projections {
            if let Some(view) = projection.get::<T>(&ctx) {
                return Ok(view);
            }
        }
        Err(ModelError::IncompatibleView {
            node: self.display_name(),
            requested: type_name::<T>(),
            available: self.view_names().join(", "),
        })
    }

    /// Names of every view type currently declared by this node.
    pub fn view_names(&self) -> Vec<&'static str> {
        self.projections
            .iter()
            .flat_map(|projection| projection.views().iter().map(|view| view.name()))
            .collect()
    }

    /// Forces the default projection (the declared default view, else the
    /// first projection). Invoked when the node realizes.
    pub(crate) fn realize_default_projection(&self) {
        let ctx = self.instantiation_context();
        let target = match self.default_view {
            Some(tag) => self
                .projections
                .iter()
                .find(|projection| projection.views().contains(&tag)),
            None => self.projections.first(),
        };
        if let Some(projection) = target {
            projection.realize(&ctx);
        }
    }
}

impl fmt::Debug for ModelNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelNode")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("state", &self.state)
            .field("views", &self.view_names())
            .finish()
    }
}
