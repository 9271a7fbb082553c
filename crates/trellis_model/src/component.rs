//! Component payloads and interned component identity
//!
//! A component is an opaque typed payload attached to a node. The core never
//! inspects payloads beyond equality (for change suppression) and identity:
//! each distinct payload type is interned into a [`ComponentId`] — a compact
//! bit index assigned process-wide, append-only, on first sight. Signatures
//! built from those indices (see [`crate::bits::Bits`]) make action gating a
//! subset test instead of a type-by-type probe.
//!
//! [`Component`] is blanket-implemented, so any `Clone + PartialEq + Debug`
//! value works as a payload, including unit structs used as pure markers:
//!
//! ```ignore
//! #[derive(Clone, Debug, PartialEq)]
//! struct DisplayName(String);
//!
//! #[derive(Clone, Copy, Debug, PartialEq)]
//! struct ExcludeFromIde; // tag component
//! ```

use crate::bits::Bits;
use rustc_hash::FxHashMap;
use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::{OnceLock, RwLock};

/// Object-safe contract for component payloads.
///
/// Implemented for every `Any + Clone + PartialEq + Debug + Send + Sync`
/// type; there is nothing to implement by hand.
pub trait Component: Any + Send + Sync + fmt::Debug {
    /// The interned id of this payload's concrete type.
    fn component_id(&self) -> ComponentId;

    /// Upcast for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Dynamic equality: true iff `other` has the same concrete type and
    /// compares equal. Used by the observable store to suppress
    /// notifications for equal replacements.
    fn eq_dyn(&self, other: &dyn Component) -> bool;

    /// Clones the payload behind the trait object.
    fn clone_box(&self) -> Box<dyn Component>;
}

impl<T> Component for T
where
    T: Any + Clone + PartialEq + fmt::Debug + Send + Sync,
{
    fn component_id(&self) -> ComponentId {
        ComponentId::of::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_dyn(&self, other: &dyn Component) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| other == self)
    }

    fn clone_box(&self) -> Box<dyn Component> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Component> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Interned identity of a component type: its process-wide bit index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u32);

/// Process-wide type table. Append-only; ids are never reused or reassigned,
/// so a `ComponentId` observed once stays valid for the process lifetime.
struct TypeTable {
    ids: FxHashMap<TypeId, ComponentId>,
    names: Vec<&'static str>,
}

static TYPE_TABLE: OnceLock<RwLock<TypeTable>> = OnceLock::new();

fn type_table() -> &'static RwLock<TypeTable> {
    TYPE_TABLE.get_or_init(|| {
        RwLock::new(TypeTable {
            ids: FxHashMap::default(),
            names: Vec::new(),
        })
    })
}

impl ComponentId {
    /// The id of component type `T`, interning it on first sight.
    pub fn of<T: Any>() -> ComponentId {
        let type_id = TypeId::of::<T>();
        {
            let table = type_table().read().unwrap();
            if let Some(id) = table.ids.get(&type_id) {
                return *id;
            }
        }
        let mut table = type_table().write().unwrap();
        // Double-checked: another caller may have interned between locks.
        if let Some(id) = table.ids.get(&type_id) {
            return *id;
        }
        let id = ComponentId(table.names.len() as u32);
        table.ids.insert(type_id, id);
        table.names.push(type_name::<T>());
        id
    }

    /// The bit index backing this id.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// A single-bit signature at this id's index.
    pub fn bits(self) -> Bits {
        Bits::of_bit(self.index())
    }

    /// The component type's name, for diagnostics.
    pub fn name(self) -> &'static str {
        type_table().read().unwrap().names[self.index()]
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Alpha(u32);

    #[derive(Clone, Debug, PartialEq)]
    struct Beta;

    #[test]
    fn test_ids_are_stable_per_type() {
        assert_eq!(ComponentId::of::<Alpha>(), ComponentId::of::<Alpha>());
        assert_ne!(ComponentId::of::<Alpha>(), ComponentId::of::<Beta>());
    }

    #[test]
    fn test_bits_match_index() {
        let id = ComponentId::of::<Alpha>();
        assert!(id.bits().get(id.index()));
        assert_eq!(id.bits().len(), id.index() + 1);
    }

    #[test]
    fn test_name_is_recorded() {
        assert!(ComponentId::of::<Beta>().name().ends_with("Beta"));
    }

    #[test]
    fn test_dynamic_equality() {
        let a: Box<dyn Component> = Box::new(Alpha(1));
        let same: Box<dyn Component> = Box::new(Alpha(1));
        let different: Box<dyn Component> = Box::new(Alpha(2));
        let other_type: Box<dyn Component> = Box::new(Beta);

        assert!(a.eq_dyn(same.as_ref()));
        assert!(!a.eq_dyn(different.as_ref()));
        assert!(!a.eq_dyn(other_type.as_ref()));
    }

    #[test]
    fn test_clone_box_preserves_value() {
        let a: Box<dyn Component> = Box::new(Alpha(7));
        let b = a.clone();
        assert!(a.eq_dyn(b.as_ref()));
        assert_eq!(b.as_any().downcast_ref::<Alpha>(), Some(&Alpha(7)));
    }
}
