//! The registry facade
//!
//! [`ModelRegistry`] owns every node, the shared component store, and the
//! action list. It is the single entry point for mutation: registration,
//! lifecycle advancement, component addition, and action configuration all
//! flow through it, and every one of those can trigger action dispatch.
//!
//! Dispatch is synchronous and re-entrant. Before an action list is walked
//! it is snapshotted into owned clones (bodies are `Arc`-shared, so clones
//! are cheap), which lets action bodies register children, add components,
//! and configure further actions against `&mut ModelRegistry` without
//! aliasing the list being walked. Actions appended mid-dispatch join the
//! list for subsequent dispatches, not the one in flight.
//!
//! Ambient "current node" state is an explicit scope stack owned by the
//! registry, entered through an RAII guard. Nothing here touches
//! thread-local storage.

use crate::action::{ModelAction, ModelSpec};
use crate::component::{Component, ComponentId};
use crate::error::{ModelError, Result};
use crate::node::{ModelNode, NodeId, SharedStore};
use crate::path::ModelPath;
use crate::projection::{ProjectionSpec, ViewTag};
use crate::state::ModelState;
use crate::store::{MapStore, ObservableStore};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::any::Any;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, trace};

// =============================================================================
// SCOPE STACK
// =============================================================================

/// The registry's explicit "current node" stack. Shared by `Arc` so guards
/// stay valid while the registry is mutably borrowed by dispatch.
#[derive(Clone, Default)]
pub(crate) struct ScopeStack {
    frames: Arc<Mutex<Vec<NodeId>>>,
}

impl ScopeStack {
    fn enter(&self, node: NodeId) -> ScopeGuard {
        self.frames.lock().unwrap().push(node);
        ScopeGuard {
            frames: Arc::clone(&self.frames),
        }
    }

    fn current(&self) -> Option<NodeId> {
        self.frames.lock().unwrap().last().copied()
    }
}

/// RAII guard for a scope frame; pops its node on drop.
pub struct ScopeGuard {
    frames: Arc<Mutex<Vec<NodeId>>>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.frames.lock().unwrap().pop();
    }
}

// =============================================================================
// REGISTRATIONS
// =============================================================================

/// Everything a node starts life with: a path, initial components,
/// projections, an optional default view, and initial actions.
pub struct ModelRegistration {
    path: ModelPath,
    components: Vec<Box<dyn Component>>,
    projections: Vec<ProjectionSpec>,
    default_view: Option<ViewTag>,
    actions: Vec<ModelAction>,
}

impl ModelRegistration {
    /// Starts a registration for the node at `path`.
    pub fn builder(path: ModelPath) -> ModelRegistrationBuilder {
        ModelRegistrationBuilder {
            registration: ModelRegistration {
                path,
                components: Vec::new(),
                projections: Vec::new(),
                default_view: None,
                actions: Vec::new(),
            },
        }
    }

    /// A bare registration with no components, projections, or actions.
    pub fn of(path: ModelPath) -> ModelRegistration {
        Self::builder(path).build()
    }
}

/// Consuming builder for [`ModelRegistration`].
pub struct ModelRegistrationBuilder {
    registration: ModelRegistration,
}

impl ModelRegistrationBuilder {
    /// Adds an initial component. Part of the node's starting signature;
    /// does not trigger component dispatch on its own.
    pub fn component(mut self, value: impl Component) -> Self {
        self.registration.components.push(Box::new(value));
        self
    }

    /// Adds a projection.
    pub fn projection(mut self, spec: ProjectionSpec) -> Self {
        self.registration.projections.push(spec);
        self
    }

    /// Declares `T` as the node's default view, forced on realization.
    pub fn default_view<T: Any>(mut self) -> Self {
        self.registration.default_view = Some(ViewTag::of::<T>());
        self
    }

    /// Adds an initial action. Initial actions join the registry's action
    /// list at registration and apply to every node, not just this one.
    pub fn action(mut self, action: ModelAction) -> Self {
        self.registration.actions.push(action);
        self
    }

    pub fn build(self) -> ModelRegistration {
        self.registration
    }
}

// =============================================================================
// QUERIES
// =============================================================================

enum QueryScope {
    All,
    At(ModelPath),
    ChildrenOf(ModelPath),
    DescendantsOf(ModelPath),
}

/// A node selection: a path scope plus an optional predicate. Results come
/// back in registration order.
pub struct NodeQuery {
    scope: QueryScope,
    filter: Option<ModelSpec>,
}

impl NodeQuery {
    /// Every node in the registry.
    pub fn all() -> Self {
        Self {
            scope: QueryScope::All,
            filter: None,
        }
    }

    /// The node at exactly `path`.
    pub fn at(path: ModelPath) -> Self {
        Self {
            scope: QueryScope::At(path),
            filter: None,
        }
    }

    /// Direct children of `path`.
    pub fn children_of(path: ModelPath) -> Self {
        Self {
            scope: QueryScope::ChildrenOf(path),
            filter: None,
        }
    }

    /// All strict descendants of `path`, any depth.
    pub fn descendants_of(path: ModelPath) -> Self {
        Self {
            scope: QueryScope::DescendantsOf(path),
            filter: None,
        }
    }

    /// Restricts the selection to nodes satisfying `spec`.
    pub fn matching(mut self, spec: ModelSpec) -> Self {
        self.filter = Some(spec);
        self
    }

    fn admits(&self, node: &ModelNode) -> bool {
        let in_scope = match &self.scope {
            QueryScope::All => true,
            QueryScope::At(path) => node.path() == path,
            QueryScope::ChildrenOf(path) => node.path().is_direct_descendant(path),
            QueryScope::DescendantsOf(path) => node.path().is_descendant(path),
        };
        in_scope
            && self
                .filter
                .as_ref()
                .is_none_or(|spec| spec.satisfied_by(node))
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Owner of all nodes, the component store, and the action list.
pub struct ModelRegistry {
    store: SharedStore,
    /// Nodes in registration order, keyed by path.
    nodes: IndexMap<ModelPath, ModelNode>,
    ids: FxHashMap<NodeId, ModelPath>,
    actions: Vec<ModelAction>,
    scope: ScopeStack,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        let mut store = ObservableStore::new(MapStore::new());
        store.on_change(|node, component| {
            trace!(
                node = node.raw(),
                component = component.component_id().name(),
                "component changed"
            );
        });
        Self {
            store: Arc::new(RwLock::new(store)),
            nodes: IndexMap::new(),
            ids: FxHashMap::default(),
            actions: Vec::new(),
            scope: ScopeStack::default(),
        }
    }

    // =========================================================================
    // LOOKUP
    // =========================================================================

    /// The node at `path`, or [`ModelError::PathNotFound`].
    pub fn get(&self, path: &ModelPath) -> Result<&ModelNode> {
        self.nodes
            .get(path)
            .ok_or_else(|| ModelError::PathNotFound {
                path: path.to_string(),
            })
    }

    /// The node at `path`, if registered.
    pub fn find(&self, path: &ModelPath) -> Option<&ModelNode> {
        self.nodes.get(path)
    }

    /// Whether a node is registered at `path`.
    pub fn has(&self, path: &ModelPath) -> bool {
        self.nodes.contains_key(path)
    }

    /// The node with identity `id`, or [`ModelError::UnknownNode`].
    pub fn node(&self, id: NodeId) -> Result<&ModelNode> {
        self.node_ref(id)
            .ok_or(ModelError::UnknownNode { id: id.raw() })
    }

    fn node_ref(&self, id: NodeId) -> Option<&ModelNode> {
        self.ids.get(&id).and_then(|path| self.nodes.get(path))
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut ModelNode> {
        self.ids.get(&id).and_then(|path| self.nodes.get_mut(path))
    }

    /// Nodes admitted by `query`, in registration order.
    pub fn query(&self, query: &NodeQuery) -> Vec<&ModelNode> {
        self.nodes
            .values()
            .filter(|node| query.admits(node))
            .collect()
    }

    /// The innermost node currently in scope, if any.
    pub fn current_scope(&self) -> Option<NodeId> {
        self.scope.current()
    }

    /// Makes `id` the current scope until the returned guard drops.
    /// Realization enters scope automatically; callers running code on
    /// behalf of a node can do the same explicitly.
    pub fn enter_scope(&self, id: NodeId) -> Result<ScopeGuard> {
        self.node(id)?;
        Ok(self.scope.enter(id))
    }

    // =========================================================================
    // REGISTRATION
    // =========================================================================

    /// Registers a node and drives it to `Registered`: the node is created,
    /// initial components and projections attached, initial actions
    /// appended (and evaluated against already-registered nodes), and
    /// dispatch runs for `Created`, `Initialized`, and `Registered` in
    /// order. Paths are unique per registry.
    pub fn register(&mut self, registration: ModelRegistration) -> Result<NodeId> {
        let ModelRegistration {
            path,
            components,
            projections,
            default_view,
            actions,
        } = registration;

        if self.nodes.contains_key(&path) {
            return Err(ModelError::DuplicatePath {
                path: path.to_string(),
            });
        }

        let id = NodeId::next();
        debug!(node = id.raw(), path = %path, "registering node");

        let mut node = ModelNode::new(id, path.clone(), Arc::clone(&self.store));
        for component in components {
            node.add_component(component);
        }
        for projection in projections {
            node.add_projection(projection);
        }
        node.set_default_view(default_view);

        let existing: Vec<NodeId> = self.nodes.values().map(ModelNode::id).collect();
        self.ids.insert(id, path.clone());
        self.nodes.insert(path, node);

        // Initial actions apply registry-wide. The new node is excluded
        // here: the Created dispatch just below covers it.
        for action in actions {
            self.actions.push(action.clone());
            for other in &existing {
                self.evaluate(&action, *other);
            }
        }

        self.dispatch_all(id);
        self.advance(id)?;
        self.advance(id)?;
        Ok(id)
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Advances the node one lifecycle state and dispatches. Entering a
    /// state attaches its marker component so signatures reflect progress;
    /// the marker never triggers component dispatch of its own.
    pub fn advance(&mut self, id: NodeId) -> Result<ModelState> {
        let node = self
            .node_mut(id)
            .ok_or(ModelError::UnknownNode { id: id.raw() })?;
        let Some(next) = node.state().next() else {
            return Err(ModelError::AlreadyRealized {
                node: node.display_name(),
            });
        };
        node.set_state(next);
        if let Some(marker) = next.tag() {
            node.add_component(marker);
        }
        trace!(node = id.raw(), state = ?next, "state advanced");
        self.dispatch_all(id);
        Ok(next)
    }

    /// Drives the node at `path` to `Realized` and forces its default
    /// projection. Idempotent once realized. The node is the current scope
    /// for the duration, so actions running under realization can find
    /// their owner without ambient state.
    pub fn realize(&mut self, path: &ModelPath) -> Result<NodeId> {
        let id = self.get(path)?.id();
        debug!(node = id.raw(), path = %path, "realizing node");

        let _guard = self.scope.enter(id);
        while !self.node(id)?.state().is_at_least(ModelState::Realized) {
            self.advance(id)?;
        }
        self.node(id)?.realize_default_projection();
        Ok(id)
    }

    // =========================================================================
    // COMPONENTS AND ACTIONS
    // =========================================================================

    /// Adds a component to a node. Dispatch runs only when the component's
    /// bit was previously unset, and only input-gated actions that require
    /// that bit are candidates; replacing a payload never re-dispatches.
    pub fn add_component(&mut self, id: NodeId, value: impl Component) -> Result<()> {
        let component_id = value.component_id();
        let node = self
            .node_mut(id)
            .ok_or(ModelError::UnknownNode { id: id.raw() })?;
        let newly_set = node.add_component(Box::new(value));
        if newly_set {
            self.dispatch_component(id, component_id);
        }
        Ok(())
    }

    /// Appends an action and evaluates it against every registered node,
    /// in registration order.
    pub fn configure(&mut self, action: ModelAction) {
        self.actions.push(action.clone());
        let ids: Vec<NodeId> = self.nodes.values().map(ModelNode::id).collect();
        for id in ids {
            self.evaluate(&action, id);
        }
    }

    // =========================================================================
    // DISPATCH
    // =========================================================================

    /// Evaluates every action against `id`. Runs on state entry.
    fn dispatch_all(&mut self, id: NodeId) {
        let snapshot = self.actions.clone();
        for action in snapshot {
            self.evaluate(&action, id);
        }
    }

    /// Evaluates only actions whose requirement includes the newly set
    /// bit. Runs on first-time component additions.
    fn dispatch_component(&mut self, id: NodeId, component: ComponentId) {
        let snapshot: Vec<ModelAction> = self
            .actions
            .iter()
            .filter(|action| action.is_input_gated() && action.requires(component))
            .cloned()
            .collect();
        for action in snapshot {
            self.evaluate(&action, id);
        }
    }

    fn evaluate(&mut self, action: &ModelAction, id: NodeId) {
        let Some(node) = self.node_ref(id) else {
            return;
        };
        if action.matches(node) {
            trace!(node = id.raw(), action = ?action, "action matched");
            action.invoke(self, id);
        }
    }
}
