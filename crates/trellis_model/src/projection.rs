//! Typed, memoized views over a node
//!
//! A node's public face is its projections: typed views over the backing
//! payloads. A projection either wraps an already-constructed value, builds
//! one lazily from an instantiation strategy (receiving an explicit
//! [`InstantiationContext`]), or builds one from a zero-argument factory.
//! Lazy variants memoize on first use and never reconstruct.
//!
//! View identity is an interned type-tag list, not runtime subtyping: a
//! projection declares its primary type plus any extra view tags, and
//! resolution checks tag membership before downcasting the memoized
//! instance. The first matching projection in registration order wins.

use crate::node::NodeId;
use crate::path::ModelPath;
use smallvec::SmallVec;
use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Interned identity of a view type.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewTag {
    type_id: TypeId,
    name: &'static str,
}

impl ViewTag {
    /// The tag of view type `T`.
    pub fn of<T: Any>() -> ViewTag {
        ViewTag {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// The view type's name, for diagnostics.
    pub fn name(self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ViewTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ViewTag({})", self.name)
    }
}

/// Context handed to instantiation strategies: which node is being
/// projected, and where it lives. Passed explicitly — there is no ambient
/// "current node" global.
#[derive(Clone, Debug)]
pub struct InstantiationContext {
    node: NodeId,
    path: ModelPath,
}

impl InstantiationContext {
    pub(crate) fn new(node: NodeId, path: ModelPath) -> Self {
        Self { node, path }
    }

    /// The node this projection belongs to.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The owning node's path.
    pub fn path(&self) -> &ModelPath {
        &self.path
    }
}

/// Implemented by projected values that want a back-reference to their
/// owning node. A factory-built instance implementing this is attached
/// exactly once, when the projection first materializes.
pub trait NodeAware: Any + Send + Sync {
    /// Called with the owning node's id on first use.
    fn attached_to(&self, owner: NodeId);

    /// Upcast for downcasting to the concrete type.
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// A materialized projection value.
#[derive(Clone)]
enum Instance {
    Plain(Arc<dyn Any + Send + Sync>),
    Aware(Arc<dyn NodeAware>),
}

impl Instance {
    fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Instance::Plain(value) => value.clone().downcast::<T>().ok(),
            Instance::Aware(value) => value.clone().as_any_arc().downcast::<T>().ok(),
        }
    }
}

enum SpecKind {
    /// Fixed, already-constructed value.
    Instance(Instance),
    /// Built on first use from an instantiation strategy.
    Managed(Arc<dyn Fn(&InstantiationContext) -> Instance + Send + Sync>),
    /// Built on first use from a zero-argument factory.
    Supplied(Arc<dyn Fn() -> Instance + Send + Sync>),
}

/// Immutable description of a projection, attached to a node at
/// registration (or later, by an action).
pub struct ProjectionSpec {
    views: SmallVec<[ViewTag; 2]>,
    kind: SpecKind,
}

impl ProjectionSpec {
    /// A projection wrapping an already-constructed value.
    pub fn of_instance<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            views: SmallVec::from_iter([ViewTag::of::<T>()]),
            kind: SpecKind::Instance(Instance::Plain(Arc::new(value))),
        }
    }

    /// A lazily-built projection; `create` runs once, on first use, with an
    /// explicit context naming the owning node.
    pub fn managed<T, F>(create: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&InstantiationContext) -> T + Send + Sync + 'static,
    {
        Self {
            views: SmallVec::from_iter([ViewTag::of::<T>()]),
            kind: SpecKind::Managed(Arc::new(move |ctx| Instance::Plain(Arc::new(create(ctx))))),
        }
    }

    /// A lazily-built projection from a zero-argument factory.
    pub fn supplied<T, F>(factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            views: SmallVec::from_iter([ViewTag::of::<T>()]),
            kind: SpecKind::Supplied(Arc::new(move || Instance::Plain(Arc::new(factory())))),
        }
    }

    /// Like [`supplied`](Self::supplied), for factories producing
    /// [`NodeAware`] values: the instance is attached back to its owning
    /// node on first use only.
    pub fn supplied_aware<T, F>(factory: F) -> Self
    where
        T: NodeAware,
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        Self {
            views: SmallVec::from_iter([ViewTag::of::<T>()]),
            kind: SpecKind::Supplied(Arc::new(move || Instance::Aware(factory()))),
        }
    }

    /// Declares an additional view tag for this projection. Consuming, so
    /// specs chain at construction and cannot be mutated afterwards.
    pub fn viewable_as<U: Any>(mut self) -> Self {
        let tag = ViewTag::of::<U>();
        if !self.views.contains(&tag) {
            self.views.push(tag);
        }
        self
    }

    /// The primary view tag (the declared projection type).
    pub fn primary_view(&self) -> ViewTag {
        self.views[0]
    }

    pub(crate) fn attach(self) -> ModelProjection {
        ModelProjection {
            views: self.views,
            kind: self.kind,
            cell: OnceLock::new(),
        }
    }
}

/// A projection attached to a node. Memoizes its value on first use; once
/// memoized it never reconstructs.
pub struct ModelProjection {
    views: SmallVec<[ViewTag; 2]>,
    kind: SpecKind,
    cell: OnceLock<Instance>,
}

impl ModelProjection {
    /// Whether this projection declares view type `T`.
    pub fn can_be_viewed_as<T: Any>(&self) -> bool {
        self.views.contains(&ViewTag::of::<T>())
    }

    /// Declared view tags, primary first.
    pub fn views(&self) -> &[ViewTag] {
        &self.views
    }

    fn instance(&self, ctx: &InstantiationContext) -> &Instance {
        match &self.kind {
            SpecKind::Instance(value) => value,
            SpecKind::Managed(create) => self.cell.get_or_init(|| create(ctx)),
            SpecKind::Supplied(factory) => self.cell.get_or_init(|| {
                let instance = factory();
                if let Instance::Aware(value) = &instance {
                    value.attached_to(ctx.node());
                }
                instance
            }),
        }
    }

    /// Resolves the view as `T`, materializing the value if this is its
    /// first use. `None` when the tag does not match or the memoized value
    /// is not a `T`.
    pub fn get<T: Any + Send + Sync>(&self, ctx: &InstantiationContext) -> Option<Arc<T>> {
        if !self.can_be_viewed_as::<T>() {
            return None;
        }
        self.instance(ctx).downcast::<T>()
    }

    /// Forces construction of the memoized value without resolving a view.
    pub fn realize(&self, ctx: &InstantiationContext) {
        let _ = self.instance(ctx);
    }
}

impl fmt::Debug for ModelProjection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.views.iter().map(|view| view.name()).collect();
        write!(f, "ModelProjection({})", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    fn test_ctx() -> InstantiationContext {
        InstantiationContext::new(NodeId::next(), ModelPath::parse("test.node"))
    }

    struct Toolchain {
        name: &'static str,
    }

    #[test]
    fn test_instance_projection() {
        let projection = ProjectionSpec::of_instance(Toolchain { name: "gcc" }).attach();
        assert!(projection.can_be_viewed_as::<Toolchain>());
        assert!(!projection.can_be_viewed_as::<String>());

        let view = projection.get::<Toolchain>(&test_ctx()).unwrap();
        assert_eq!(view.name, "gcc");
    }

    #[test]
    fn test_managed_projection_builds_once() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let projection = ProjectionSpec::managed(move |ctx: &InstantiationContext| {
            counter.fetch_add(1, Ordering::SeqCst);
            format!("view of {}", ctx.path())
        })
        .attach();

        let ctx = test_ctx();
        assert_eq!(built.load(Ordering::SeqCst), 0);
        let first = projection.get::<String>(&ctx).unwrap();
        let second = projection.get::<String>(&ctx).unwrap();
        assert_eq!(*first, "view of test.node");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_supplied_projection_memoizes() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let projection = ProjectionSpec::supplied(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            42u32
        })
        .attach();

        let ctx = test_ctx();
        projection.realize(&ctx);
        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert_eq!(*projection.get::<u32>(&ctx).unwrap(), 42);
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    struct OwnedView {
        owner: AtomicU64,
        attach_calls: AtomicUsize,
    }

    impl NodeAware for OwnedView {
        fn attached_to(&self, owner: NodeId) {
            self.owner.store(owner.raw(), Ordering::SeqCst);
            self.attach_calls.fetch_add(1, Ordering::SeqCst);
        }

        fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    #[test]
    fn test_aware_instance_attached_once_on_first_use() {
        let projection = ProjectionSpec::supplied_aware(|| {
            Arc::new(OwnedView {
                owner: AtomicU64::new(0),
                attach_calls: AtomicUsize::new(0),
            })
        })
        .attach();

        let ctx = test_ctx();
        let first = projection.get::<OwnedView>(&ctx).unwrap();
        let second = projection.get::<OwnedView>(&ctx).unwrap();

        assert_eq!(first.owner.load(Ordering::SeqCst), ctx.node().raw());
        assert_eq!(first.attach_calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_extra_view_tags() {
        struct Marker;

        let projection = ProjectionSpec::of_instance(Toolchain { name: "clang" })
            .viewable_as::<Marker>()
            .attach();

        assert!(projection.can_be_viewed_as::<Toolchain>());
        assert!(projection.can_be_viewed_as::<Marker>());
        assert_eq!(projection.views().len(), 2);
        // The extra tag is declarative; the memoized value stays a Toolchain.
        assert!(projection.get::<Marker>(&test_ctx()).is_none());
    }
}
