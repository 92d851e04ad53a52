use core::{
    fmt::{self, Debug, Formatter},
    marker::PhantomData,
};
use std::sync::{Arc, Weak};
use tracing::warn;

use crate::{
    dependency::Dependency,
    dependency_resolver::DependencyResolver,
    errors::ResolveErrorKind,
    injector::{Injector, InjectorInner},
    key::{Key, Marker},
};

/// Deferred reference to a binding.
///
/// Nothing is constructed until [`Lazy::get`] is called, and every call goes through the full resolution
/// of the key, so scopes are respected. Requesting a `Lazy` instead of an [`crate::Inject`]
/// breaks dependency cycles:
/// ```rust
/// use bindery::{Inject, InstantiateErrorKind, Lazy, RegistryBuilder, Injector};
///
/// struct Parent(Lazy<Child>);
/// struct Child(std::sync::Arc<Parent>);
///
/// let mut builder = RegistryBuilder::default();
/// let mut binder = builder.binder();
/// binder
///     .bind::<Parent>()
///     .in_singleton_scope()
///     .to_constructor(|child: Lazy<Child>| Ok::<_, InstantiateErrorKind>(Parent(child)))
///     .unwrap();
/// binder
///     .bind::<Child>()
///     .to_constructor(|Inject(parent): Inject<Parent>| Ok::<_, InstantiateErrorKind>(Child(parent)))
///     .unwrap();
/// let injector = Injector::new(builder.finalize().unwrap());
///
/// let parent = injector.get::<Parent>().unwrap();
/// let child = parent.0.get().unwrap();
/// assert!(std::sync::Arc::ptr_eq(&parent, &child.0));
/// ```
pub struct Lazy<T: ?Sized> {
    injector: Weak<InjectorInner>,
    key: Key,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: Send + Sync + 'static> Lazy<T> {
    #[inline]
    #[must_use]
    pub(crate) fn new(injector: &Injector, key: Key) -> Self {
        Self {
            injector: injector.downgrade(),
            key,
            _marker: PhantomData,
        }
    }

    /// Resolves the referenced key.
    ///
    /// # Errors
    /// Returns the resolution error of the key or [`ResolveErrorKind::InjectorDropped`]
    /// if the injector the handle was created by doesn't exist anymore.
    pub fn get(&self) -> Result<Arc<T>, ResolveErrorKind> {
        let Some(injector) = Injector::upgrade(&self.injector) else {
            let err = ResolveErrorKind::InjectorDropped { key: self.key.clone() };
            warn!("{}", err);
            return Err(err);
        };
        injector.get_by_key(&self.key)
    }
}

impl<T: ?Sized> Lazy<T> {
    #[inline]
    #[must_use]
    pub const fn key(&self) -> &Key {
        &self.key
    }
}

impl<T: ?Sized> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        Self {
            injector: self.injector.clone(),
            key: self.key.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> Debug for Lazy<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy").field("key", &self.key).finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> DependencyResolver for Lazy<T> {
    type Error = ResolveErrorKind;

    #[inline]
    fn resolve(injector: &Injector) -> Result<Self, Self::Error> {
        Ok(Self::new(injector, Key::of::<T>()))
    }

    #[inline]
    fn dependencies(dependencies: &mut Vec<Dependency>) {
        dependencies.push(Dependency::lazy(Key::of::<T>()));
    }
}

/// Deferred reference to a binding qualified by the marker `M`
pub struct LazyQualified<T: ?Sized, M: Marker>(pub Lazy<T>, pub PhantomData<fn() -> M>);

impl<T: ?Sized, M: Marker> LazyQualified<T, M> {
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> Lazy<T> {
        self.0
    }
}

impl<T: Send + Sync + 'static, M: Marker> DependencyResolver for LazyQualified<T, M> {
    type Error = ResolveErrorKind;

    #[inline]
    fn resolve(injector: &Injector) -> Result<Self, Self::Error> {
        Ok(Self(Lazy::new(injector, Key::marked::<T, M>()), PhantomData))
    }

    #[inline]
    fn dependencies(dependencies: &mut Vec<Dependency>) {
        dependencies.push(Dependency::lazy(Key::marked::<T, M>()));
    }
}

impl<T: ?Sized, M: Marker> Clone for LazyQualified<T, M> {
    fn clone(&self) -> Self {
        Self(self.0.clone(), PhantomData)
    }
}

impl<T: ?Sized, M: Marker> Debug for LazyQualified<T, M> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LazyQualified").field(&self.0).finish()
    }
}
