//! Signature-gated behaviors
//!
//! Actions are the reactive half of the model: behaviors that fire when a
//! node's lifecycle advances or its component set grows. Every action
//! precomputes its required-component signature once at construction, so
//! the dispatcher (see [`crate::registry`]) rejects non-candidates with a
//! word-wise [`Bits::contains_all`] test before looking at anything else.
//!
//! Gating composes: input gating (1-3 required component types, delivered
//! as typed arguments), exact-state gating, arbitrary predicates
//! ([`ModelSpec`]), and an at-most-once guard keyed by action identity.
//! The `discover` composite folds an implicit "at least Registered"
//! requirement into its delegate's signature, so early rejection happens
//! without unwrapping the delegate.

use crate::bits::Bits;
use crate::component::ComponentId;
use crate::node::{ModelNode, NodeId};
use crate::registry::ModelRegistry;
use crate::state::{IsAtLeastRegistered, ModelState};
use smallvec::SmallVec;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

// =============================================================================
// MODEL SPECS - predicates over nodes
// =============================================================================

/// A named, composable predicate over a node.
#[derive(Clone)]
pub struct ModelSpec {
    description: String,
    test: Arc<dyn Fn(&ModelNode) -> bool + Send + Sync>,
}

impl ModelSpec {
    /// A predicate from a description and a test function.
    pub fn new(
        description: impl Into<String>,
        test: impl Fn(&ModelNode) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            description: description.into(),
            test: Arc::new(test),
        }
    }

    /// Satisfied when the node carries a component of type `T`.
    pub fn has_component<T: Any>() -> Self {
        Self::new(
            format!("has component '{}'", std::any::type_name::<T>()),
            |node: &ModelNode| node.has_component::<T>(),
        )
    }

    /// Satisfied when the node has reached `state`.
    pub fn state_at_least(state: ModelState) -> Self {
        Self::new(format!("state at least {state:?}"), move |node| {
            node.state().is_at_least(state)
        })
    }

    /// Whether the node satisfies this predicate.
    pub fn satisfied_by(&self, node: &ModelNode) -> bool {
        (self.test)(node)
    }

    /// Conjunction of both predicates.
    pub fn and(self, other: ModelSpec) -> ModelSpec {
        let description = format!("({} and {})", self.description, other.description);
        ModelSpec::new(description, move |node| {
            self.satisfied_by(node) && other.satisfied_by(node)
        })
    }

    /// Disjunction of both predicates.
    pub fn or(self, other: ModelSpec) -> ModelSpec {
        let description = format!("({} or {})", self.description, other.description);
        ModelSpec::new(description, move |node| {
            self.satisfied_by(node) || other.satisfied_by(node)
        })
    }

    /// The negation of this predicate.
    pub fn negate(self) -> ModelSpec {
        let description = format!("(not {})", self.description);
        ModelSpec::new(description, move |node| !self.satisfied_by(node))
    }

    /// The predicate's description, for diagnostics.
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Debug for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelSpec({})", self.description)
    }
}

// =============================================================================
// ACTIONS
// =============================================================================

/// Stable identity of an action, used for equality and the at-most-once
/// guard. All `do_nothing` actions share id 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ActionId(u64);

static NEXT_ACTION_ID: AtomicU64 = AtomicU64::new(1);

impl ActionId {
    const DO_NOTHING: ActionId = ActionId(0);

    fn next() -> ActionId {
        ActionId(NEXT_ACTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// An action body; receives the registry so it can add components,
/// projections, and child registrations.
pub type ActionBody = Arc<dyn Fn(&mut ModelRegistry, NodeId) + Send + Sync>;

#[derive(Clone)]
enum ActionKind {
    DoNothing,
    Run(ActionBody),
}

/// A behavior gated by required components, lifecycle state, and/or an
/// arbitrary predicate. Cheap to clone; clones share identity and the
/// at-most-once guard.
#[derive(Clone)]
pub struct ModelAction {
    id: ActionId,
    /// Precomputed required-component signature.
    required: Bits,
    /// Declared input component ids, for debugging.
    inputs: SmallVec<[ComponentId; 3]>,
    state_gate: Option<ModelState>,
    spec: Option<ModelSpec>,
    once: Option<Arc<AtomicBool>>,
    kind: ActionKind,
}

impl ModelAction {
    fn from_kind(kind: ActionKind) -> Self {
        Self {
            id: ActionId::next(),
            required: Bits::empty(),
            inputs: SmallVec::new(),
            state_gate: None,
            spec: None,
            once: None,
            kind,
        }
    }

    /// The stable no-op action.
    pub fn do_nothing() -> Self {
        Self {
            id: ActionId::DO_NOTHING,
            required: Bits::empty(),
            inputs: SmallVec::new(),
            state_gate: None,
            spec: None,
            once: None,
            kind: ActionKind::DoNothing,
        }
    }

    /// An unconditional action.
    pub fn run(body: impl Fn(&mut ModelRegistry, NodeId) + Send + Sync + 'static) -> Self {
        Self::from_kind(ActionKind::Run(Arc::new(body)))
    }

    /// An action requiring component `A`, delivered as a typed argument.
    pub fn executing<A>(f: impl Fn(&mut ModelRegistry, NodeId, A) + Send + Sync + 'static) -> Self
    where
        A: Any + Clone,
    {
        let mut action = Self::run(move |registry, node| {
            let Ok(a) = registry.node(node).and_then(|n| n.get_component::<A>()) else {
                return;
            };
            f(registry, node, a);
        });
        action.inputs = SmallVec::from_iter([ComponentId::of::<A>()]);
        action.required = ComponentId::of::<A>().bits();
        action
    }

    /// An action requiring components `A` and `B`.
    pub fn executing2<A, B>(
        f: impl Fn(&mut ModelRegistry, NodeId, A, B) + Send + Sync + 'static,
    ) -> Self
    where
        A: Any + Clone,
        B: Any + Clone,
    {
        let mut action = Self::run(move |registry, node| {
            let Ok((a, b)) = registry.node(node).and_then(|n| {
                let a = n.get_component::<A>()?;
                let b = n.get_component::<B>()?;
                Ok((a, b))
            }) else {
                return;
            };
            f(registry, node, a, b);
        });
        action.inputs = SmallVec::from_iter([ComponentId::of::<A>(), ComponentId::of::<B>()]);
        action.required = ComponentId::of::<A>().bits().or(&ComponentId::of::<B>().bits());
        action
    }

    /// An action requiring components `A`, `B`, and `C`.
    pub fn executing3<A, B, C>(
        f: impl Fn(&mut ModelRegistry, NodeId, A, B, C) + Send + Sync + 'static,
    ) -> Self
    where
        A: Any + Clone,
        B: Any + Clone,
        C: Any + Clone,
    {
        let mut action = Self::run(move |registry, node| {
            let Ok((a, b, c)) = registry.node(node).and_then(|n| {
                let a = n.get_component::<A>()?;
                let b = n.get_component::<B>()?;
                let c = n.get_component::<C>()?;
                Ok((a, b, c))
            }) else {
                return;
            };
            f(registry, node, a, b, c);
        });
        action.inputs = SmallVec::from_iter([
            ComponentId::of::<A>(),
            ComponentId::of::<B>(),
            ComponentId::of::<C>(),
        ]);
        action.required = ComponentId::of::<A>()
            .bits()
            .or(&ComponentId::of::<B>().bits())
            .or(&ComponentId::of::<C>().bits());
        action
    }

    /// An action that resolves the node's `T` view, then applies `f`.
    pub fn using_projection<T>(
        f: impl Fn(&mut ModelRegistry, NodeId, Arc<T>) + Send + Sync + 'static,
    ) -> Self
    where
        T: Any + Send + Sync,
    {
        Self::run(move |registry, node| {
            let view = match registry.node(node).and_then(|n| n.projection::<T>()) {
                Ok(view) => view,
                Err(error) => {
                    tracing::warn!(node = node.raw(), %error, "projection action skipped");
                    return;
                }
            };
            f(registry, node, view);
        })
    }

    /// A composite that fires on discovery: the delegate's requirements
    /// plus an implicit "at least Registered" bit, unioned up front so
    /// Created-only nodes are rejected before the delegate is consulted.
    pub fn discover(delegate: ModelAction) -> ModelAction {
        let required = delegate
            .required
            .or(&ComponentId::of::<IsAtLeastRegistered>().bits());
        ModelAction {
            required,
            ..delegate
        }
    }

    /// Gates this action on an exact lifecycle state: it never fires for
    /// earlier or later states.
    pub fn in_state(mut self, state: ModelState) -> Self {
        self.state_gate = Some(state);
        self
    }

    /// Gates this action on an arbitrary predicate over the node.
    pub fn only_if(mut self, spec: ModelSpec) -> Self {
        self.spec = Some(spec);
        self
    }

    /// Caps this action at a single execution, keyed by its identity.
    /// Re-entry and re-dispatch become no-ops.
    pub fn once(mut self) -> Self {
        self.once = Some(Arc::new(AtomicBool::new(false)));
        self
    }

    /// The precomputed required-component signature.
    pub fn required_bits(&self) -> Bits {
        self.required.clone()
    }

    /// Whether this action's requirement includes the given component bit.
    pub(crate) fn requires(&self, id: ComponentId) -> bool {
        self.required.get(id.index())
    }

    /// Whether this action has any required component bits.
    pub(crate) fn is_input_gated(&self) -> bool {
        !self.required.is_empty()
    }

    /// Whether the node currently satisfies every gate.
    pub(crate) fn matches(&self, node: &ModelNode) -> bool {
        if !node.component_bits().contains_all(&self.required) {
            return false;
        }
        if let Some(state) = self.state_gate {
            if node.state() != state {
                return false;
            }
        }
        if let Some(spec) = &self.spec {
            if !spec.satisfied_by(node) {
                return false;
            }
        }
        true
    }

    /// Runs the body, consuming the at-most-once guard if present.
    pub(crate) fn invoke(&self, registry: &mut ModelRegistry, node: NodeId) {
        if let Some(guard) = &self.once {
            if guard.swap(true, Ordering::SeqCst) {
                return;
            }
        }
        match &self.kind {
            ActionKind::DoNothing => {}
            ActionKind::Run(body) => body(registry, node),
        }
    }
}

impl PartialEq for ModelAction {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ModelAction {}

impl fmt::Debug for ModelAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("ModelAction");
        debug.field("id", &self.id);
        if !self.inputs.is_empty() {
            let names: Vec<_> = self.inputs.iter().map(|input| input.name()).collect();
            debug.field("inputs", &names);
        }
        if let Some(state) = self.state_gate {
            debug.field("state", &state);
        }
        if let Some(spec) = &self.spec {
            debug.field("only_if", &spec.description());
        }
        debug.finish()
    }
}
