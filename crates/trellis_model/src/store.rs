//! Component storage and change notification
//!
//! Storage is a flat map from `(node, component-id)` slots to payloads, with
//! at most one payload per slot. The [`ObservableStore`] decorator wraps any
//! store and raises registered change callbacks exactly once per `set` call
//! whose new value is absent-or-different from the previous one; equal
//! replacements store silently and observation-only calls never notify.
//! Notification is synchronous: every callback has returned by the time
//! `set` returns.

use crate::component::{Component, ComponentId};
use crate::node::NodeId;
use rustc_hash::FxHashMap;

/// Map-style storage of component payloads keyed by `(node, component-id)`.
pub trait ComponentStore {
    /// Stores `value` in its slot, returning the previous payload if any.
    fn set(&mut self, node: NodeId, value: Box<dyn Component>) -> Option<Box<dyn Component>>;

    /// The payload in a slot, if present. Never notifies.
    fn get(&self, node: NodeId, id: ComponentId) -> Option<&dyn Component>;

    /// Ids of all components on `node`, in insertion order.
    fn ids_of(&self, node: NodeId) -> Vec<ComponentId>;

    /// All payloads on `node`, in insertion order.
    fn all_of(&self, node: NodeId) -> Vec<&dyn Component>;
}

/// The default map-backed store.
#[derive(Default)]
pub struct MapStore {
    slots: FxHashMap<(NodeId, ComponentId), Box<dyn Component>>,
    /// Insertion order of component ids per node.
    order: FxHashMap<NodeId, Vec<ComponentId>>,
}

impl MapStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ComponentStore for MapStore {
    fn set(&mut self, node: NodeId, value: Box<dyn Component>) -> Option<Box<dyn Component>> {
        let id = value.component_id();
        let previous = self.slots.insert((node, id), value);
        if previous.is_none() {
            self.order.entry(node).or_default().push(id);
        }
        previous
    }

    fn get(&self, node: NodeId, id: ComponentId) -> Option<&dyn Component> {
        self.slots.get(&(node, id)).map(|value| value.as_ref())
    }

    fn ids_of(&self, node: NodeId) -> Vec<ComponentId> {
        self.order.get(&node).cloned().unwrap_or_default()
    }

    fn all_of(&self, node: NodeId) -> Vec<&dyn Component> {
        self.ids_of(node)
            .into_iter()
            .filter_map(|id| self.get(node, id))
            .collect()
    }
}

/// Change callback invoked with the node and the freshly stored payload.
pub type ChangeListener = Box<dyn Fn(NodeId, &dyn Component) + Send + Sync>;

/// Decorator that notifies listeners of effective changes to any store.
pub struct ObservableStore<S> {
    inner: S,
    listeners: Vec<ChangeListener>,
}

impl<S: ComponentStore> ObservableStore<S> {
    /// Wraps `inner`, initially with no listeners.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            listeners: Vec::new(),
        }
    }

    /// Registers a change callback. Callbacks fire in registration order.
    pub fn on_change(&mut self, listener: impl Fn(NodeId, &dyn Component) + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }
}

impl<S: ComponentStore> ComponentStore for ObservableStore<S> {
    fn set(&mut self, node: NodeId, value: Box<dyn Component>) -> Option<Box<dyn Component>> {
        let id = value.component_id();
        let changed = self
            .inner
            .get(node, id)
            .is_none_or(|previous| !previous.eq_dyn(value.as_ref()));
        let previous = self.inner.set(node, value);
        if changed {
            if let Some(current) = self.inner.get(node, id) {
                for listener in &self.listeners {
                    listener(node, current);
                }
            }
        }
        previous
    }

    fn get(&self, node: NodeId, id: ComponentId) -> Option<&dyn Component> {
        self.inner.get(node, id)
    }

    fn ids_of(&self, node: NodeId) -> Vec<ComponentId> {
        self.inner.ids_of(node)
    }

    fn all_of(&self, node: NodeId) -> Vec<&dyn Component> {
        self.inner.all_of(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Debug, PartialEq)]
    struct Label(&'static str);

    #[derive(Clone, Debug, PartialEq)]
    struct Count(u32);

    #[test]
    fn test_set_returns_previous() {
        let mut store = MapStore::new();
        let node = NodeId::next();

        assert!(store.set(node, Box::new(Label("a"))).is_none());
        let previous = store.set(node, Box::new(Label("b"))).unwrap();
        assert_eq!(previous.as_any().downcast_ref::<Label>(), Some(&Label("a")));
    }

    #[test]
    fn test_one_slot_per_component_id() {
        let mut store = MapStore::new();
        let node = NodeId::next();

        store.set(node, Box::new(Label("a")));
        store.set(node, Box::new(Label("b")));
        store.set(node, Box::new(Count(1)));

        assert_eq!(store.ids_of(node).len(), 2);
        assert_eq!(store.all_of(node).len(), 2);
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut store = MapStore::new();
        let node = NodeId::next();

        store.set(node, Box::new(Count(1)));
        store.set(node, Box::new(Label("x")));

        let ids = store.ids_of(node);
        assert_eq!(ids[0], ComponentId::of::<Count>());
        assert_eq!(ids[1], ComponentId::of::<Label>());
    }

    #[test]
    fn test_nodes_are_isolated() {
        let mut store = MapStore::new();
        let a = NodeId::next();
        let b = NodeId::next();

        store.set(a, Box::new(Label("a")));
        assert!(store.get(b, ComponentId::of::<Label>()).is_none());
        assert!(store.ids_of(b).is_empty());
    }

    #[test]
    fn test_observable_notifies_on_change() {
        let mut store = ObservableStore::new(MapStore::new());
        let node = NodeId::next();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        store.on_change(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        store.set(node, Box::new(Count(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        store.set(node, Box::new(Count(2)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_observable_suppresses_equal_replacement() {
        let mut store = ObservableStore::new(MapStore::new());
        let node = NodeId::next();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        store.on_change(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        store.set(node, Box::new(Count(1)));
        store.set(node, Box::new(Count(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // The equal replacement still stored.
        assert!(store.get(node, ComponentId::of::<Count>()).is_some());
    }

    #[test]
    fn test_observable_never_notifies_on_reads() {
        let mut store = ObservableStore::new(MapStore::new());
        let node = NodeId::next();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        store.on_change(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        store.set(node, Box::new(Count(1)));
        let _ = store.get(node, ComponentId::of::<Count>());
        let _ = store.ids_of(node);
        let _ = store.all_of(node);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_observable_passes_new_value() {
        let mut store = ObservableStore::new(MapStore::new());
        let node = NodeId::next();
        let observed = Arc::new(AtomicUsize::new(0));
        let sink = observed.clone();
        store.on_change(move |_, value| {
            if let Some(count) = value.as_any().downcast_ref::<Count>() {
                sink.store(count.0 as usize, Ordering::SeqCst);
            }
        });

        store.set(node, Box::new(Count(42)));
        assert_eq!(observed.load(Ordering::SeqCst), 42);
    }
}
