//! Trellis model core
//!
//! The object model underneath a Trellis build: a registry of nodes
//! addressed by dotted paths, each carrying type-keyed components, lazy
//! typed views, and a four-stage lifecycle. Behavior attaches as actions
//! gated by component signatures, so "when this node has sources and a
//! toolchain, wire up a compile step" is a bitset test, not a scan.
//!
//! - [`ModelRegistry`] — owns nodes, storage, and the action list
//! - [`ModelNode`] / [`NodeId`] — entities with components and views
//! - [`ModelAction`] / [`ModelSpec`] — signature-gated behaviors
//! - [`ProjectionSpec`] — lazy typed views over a node
//! - [`ModelPath`] — hierarchical dotted addresses
//!
//! ```ignore
//! let mut registry = ModelRegistry::new();
//!
//! registry.configure(ModelAction::executing::<Sources>(|registry, node, sources| {
//!     let compile = registry.node(node).unwrap().path().child("compile").unwrap();
//!     registry.register(ModelRegistration::of(compile)).unwrap();
//! }));
//!
//! let lib = registry.register(ModelRegistration::of(ModelPath::parse("lib")))?;
//! registry.add_component(lib, Sources::from("src"))?; // triggers the action
//! ```
//!
//! Everything is synchronous and single-threaded by design; the only
//! process-wide state is id and component-type interning.

pub mod action;
pub mod bits;
pub mod component;
pub mod error;
pub mod node;
pub mod path;
pub mod projection;
pub mod registry;
pub mod state;
pub mod store;

pub use action::{ModelAction, ModelSpec};
pub use bits::Bits;
pub use component::{Component, ComponentId};
pub use error::{ModelError, Result};
pub use node::{ModelNode, NodeId};
pub use path::ModelPath;
pub use projection::{InstantiationContext, NodeAware, ProjectionSpec, ViewTag};
pub use registry::{
    ModelRegistration, ModelRegistrationBuilder, ModelRegistry, NodeQuery, ScopeGuard,
};
pub use state::{
    IsAtLeastInitialized, IsAtLeastRealized, IsAtLeastRegistered, ModelState,
};
pub use store::{ChangeListener, ComponentStore, MapStore, ObservableStore};
