//! Node lifecycle state machine
//!
//! Every node moves through a total order of states, monotonically and at
//! most once per state:
//!
//! ```text
//! Created -> Initialized -> Registered -> Realized (terminal)
//! ```
//!
//! Reaching a state attaches the matching `IsAtLeast*` tag component to the
//! node, so "has reached state X" participates in the same bitset pre-filter
//! as ordinary component requirements — a discovery action's implicit
//! "at least Registered" gate is just one more bit in its required
//! signature.

use crate::component::Component;

/// Lifecycle state of a node. The ordering of the variants is the ordering
/// of the lifecycle; `is_at_least` is derived from it, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModelState {
    /// Allocated, initializer actions not yet applied.
    Created,
    /// Initializer actions applied.
    Initialized,
    /// Visible to discovery; discovery actions applied.
    Registered,
    /// Fully realized. Terminal.
    Realized,
}

impl ModelState {
    /// The state following this one; `None` for the terminal state.
    pub fn next(self) -> Option<ModelState> {
        match self {
            ModelState::Created => Some(ModelState::Initialized),
            ModelState::Initialized => Some(ModelState::Registered),
            ModelState::Registered => Some(ModelState::Realized),
            ModelState::Realized => None,
        }
    }

    /// Whether this state is `other` or later.
    pub fn is_at_least(self, other: ModelState) -> bool {
        self >= other
    }

    /// The tag component attached to a node when it reaches this state.
    /// `Created` has no tag; it is implied by the node's existence.
    pub(crate) fn tag(self) -> Option<Box<dyn Component>> {
        match self {
            ModelState::Created => None,
            ModelState::Initialized => Some(Box::new(IsAtLeastInitialized)),
            ModelState::Registered => Some(Box::new(IsAtLeastRegistered)),
            ModelState::Realized => Some(Box::new(IsAtLeastRealized)),
        }
    }
}

/// Tag component present on nodes that reached `Initialized`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IsAtLeastInitialized;

/// Tag component present on nodes that reached `Registered`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IsAtLeastRegistered;

/// Tag component present on nodes that reached `Realized`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IsAtLeastRealized;
