use core::{
    fmt::{self, Debug, Formatter},
    marker::PhantomData,
    ops::Deref,
};
use std::sync::Arc;

use crate::{
    dependency::Dependency,
    dependency_resolver::DependencyResolver,
    errors::ResolveErrorKind,
    injector::Injector,
    key::{Key, Marker},
};

/// Unqualified dependency resolved before the dependent is constructed
pub struct Inject<Dep: ?Sized>(pub Arc<Dep>);

impl<Dep: Send + Sync + 'static> DependencyResolver for Inject<Dep> {
    type Error = ResolveErrorKind;

    #[inline]
    fn resolve(injector: &Injector) -> Result<Self, Self::Error> {
        injector.get::<Dep>().map(Self)
    }

    #[inline]
    fn dependencies(dependencies: &mut Vec<Dependency>) {
        dependencies.push(Dependency::direct(Key::of::<Dep>()));
    }
}

impl<Dep: ?Sized> Deref for Inject<Dep> {
    type Target = Dep;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<Dep: ?Sized + Debug> Debug for Inject<Dep> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Inject").field(&self.0).finish()
    }
}

/// Dependency qualified by the marker `M`.
///
/// ```rust
/// use bindery::{InjectQualified, Marker};
///
/// struct Replica;
///
/// impl Marker for Replica {}
///
/// struct Pool;
///
/// fn replica_pool(InjectQualified(pool, ..): InjectQualified<Pool, Replica>) {}
/// ```
pub struct InjectQualified<Dep: ?Sized, M: Marker>(pub Arc<Dep>, pub PhantomData<fn() -> M>);

impl<Dep: ?Sized, M: Marker> InjectQualified<Dep, M> {
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> Arc<Dep> {
        self.0
    }
}

impl<Dep: Send + Sync + 'static, M: Marker> DependencyResolver for InjectQualified<Dep, M> {
    type Error = ResolveErrorKind;

    #[inline]
    fn resolve(injector: &Injector) -> Result<Self, Self::Error> {
        injector.get_marked::<Dep, M>().map(|dependency| Self(dependency, PhantomData))
    }

    #[inline]
    fn dependencies(dependencies: &mut Vec<Dependency>) {
        dependencies.push(Dependency::direct(Key::marked::<Dep, M>()));
    }
}

impl<Dep: ?Sized, M: Marker> Deref for InjectQualified<Dep, M> {
    type Target = Dep;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<Dep: ?Sized + Debug, M: Marker> Debug for InjectQualified<Dep, M> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InjectQualified").field(&self.0).finish()
    }
}
