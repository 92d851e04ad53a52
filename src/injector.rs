use core::fmt::{self, Debug, Formatter};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info_span};

use crate::{
    any::{AnyInstance, TypeInfo},
    bootstrap::InjectorBuilder,
    cache::{Acquired, CacheKey, SingletonCache},
    config::Config,
    cycle::{begin_resolution, requesting_key},
    errors::ResolveErrorKind,
    key::{Key, Marker, Qualifier},
    lazy::Lazy,
    module::ModuleInfo,
    multibinding::Aggregate,
    registry::{Entry, Registry},
};

pub(crate) struct InjectorInner {
    registry: Registry,
    cache: SingletonCache,
    modules: Vec<ModuleInfo>,
}

/// Resolution engine over a finalized [`Registry`].
///
/// Cheap to clone, clones share the singleton cache. Singletons live as long as the injector.
#[derive(Clone)]
pub struct Injector {
    inner: Arc<InjectorInner>,
}

impl Injector {
    #[inline]
    #[must_use]
    pub fn new(registry: Registry) -> Self {
        Self::with_modules(registry, Vec::new())
    }

    #[inline]
    #[must_use]
    pub(crate) fn with_modules(registry: Registry, modules: Vec<ModuleInfo>) -> Self {
        Self {
            inner: Arc::new(InjectorInner {
                registry,
                cache: SingletonCache::default(),
                modules,
            }),
        }
    }

    /// Builder composing modules into an injector
    #[inline]
    #[must_use]
    pub fn builder() -> InjectorBuilder {
        InjectorBuilder::default()
    }

    /// Gets an instance of the unqualified binding of `T`
    ///
    /// # Errors
    /// - [`ResolveErrorKind::Unsatisfied`] if the key isn't bound
    /// - [`ResolveErrorKind::Circular`] if the key depends on itself without a [`Lazy`] in between
    /// - any error of constructors of the key and its dependencies
    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveErrorKind> {
        self.get_by_key(&Key::of::<T>())
    }

    /// Gets an instance of `T` bound under the qualifier
    ///
    /// # Errors
    /// See [`Injector::get`]
    pub fn get_qualified<T: Send + Sync + 'static>(&self, qualifier: Qualifier) -> Result<Arc<T>, ResolveErrorKind> {
        self.get_by_key(&Key::qualified::<T>(qualifier))
    }

    /// Gets an instance of `T` bound under the qualifier of the marker
    ///
    /// # Errors
    /// See [`Injector::get`]
    pub fn get_marked<T: Send + Sync + 'static, M: Marker>(&self) -> Result<Arc<T>, ResolveErrorKind> {
        self.get_by_key(&Key::marked::<T, M>())
    }

    /// # Errors
    /// See [`Injector::get`], [`ResolveErrorKind::IncorrectType`] is returned if the key isn't a key of `T`
    pub fn get_by_key<T: Send + Sync + 'static>(&self, key: &Key) -> Result<Arc<T>, ResolveErrorKind> {
        let instance = self.resolve(key)?;
        instance.downcast::<T>().map_err(|_| {
            let err = ResolveErrorKind::IncorrectType {
                key: key.clone(),
                expected: TypeInfo::of::<T>(),
            };
            error!("{}", err);
            err
        })
    }

    /// Deferred handle of the unqualified binding of `T`, nothing is resolved until [`Lazy::get`]
    #[inline]
    #[must_use]
    pub fn get_provider<T: Send + Sync + 'static>(&self) -> Lazy<T> {
        Lazy::new(self, Key::of::<T>())
    }

    #[inline]
    #[must_use]
    pub fn get_provider_by_key<T: Send + Sync + 'static>(&self, key: Key) -> Lazy<T> {
        Lazy::new(self, key)
    }

    #[inline]
    #[must_use]
    pub fn has_binding<T: 'static>(&self) -> bool {
        self.has_binding_key(&Key::of::<T>())
    }

    #[inline]
    #[must_use]
    pub fn has_binding_key(&self, key: &Key) -> bool {
        key.is::<Injector>() || self.inner.registry.contains(key)
    }

    /// Bound keys in a stable order
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.inner.registry.keys()
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &Config {
        self.inner.registry.config()
    }

    /// Modules the injector was built from, in the order they were configured
    #[inline]
    #[must_use]
    pub fn modules(&self) -> &[ModuleInfo] {
        &self.inner.modules
    }

    #[inline]
    pub(crate) fn downgrade(&self) -> Weak<InjectorInner> {
        Arc::downgrade(&self.inner)
    }

    #[inline]
    pub(crate) fn upgrade(inner: &Weak<InjectorInner>) -> Option<Self> {
        inner.upgrade().map(|inner| Self { inner })
    }

    #[inline]
    fn id(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    pub(crate) fn resolve(&self, key: &Key) -> Result<AnyInstance, ResolveErrorKind> {
        let span = info_span!("get", %key);
        let _guard = span.enter();

        if key.is::<Injector>() {
            return Ok(Arc::new(self.clone()));
        }

        let Some(entry) = self.inner.registry.entry(key) else {
            let err = ResolveErrorKind::Unsatisfied {
                key: key.clone(),
                requested_by: requesting_key(self.id()),
            };
            error!("{}", err);
            return Err(err);
        };

        let scope = match entry {
            Entry::Binding(binding) => binding.effective_scope(),
            Entry::Aggregate(aggregate) => aggregate.scope,
        };
        if !scope.is_cached() {
            let _resolution = begin_resolution(self.id(), key, self.config().max_resolution_depth)?;
            return self.construct(key, entry);
        }

        let cache_key = CacheKey::Binding(key.clone());
        if let Some(instance) = self.inner.cache.get(&cache_key) {
            debug!("Found in cache");
            return Ok(instance);
        }
        debug!("Not found in cache");

        // Checked before waiting on the cache, so a thread re-entering its own construction fails instead of blocking
        let _resolution = begin_resolution(self.id(), key, self.config().max_resolution_depth)?;
        self.cached(cache_key, || self.construct(key, entry))
    }

    /// Returns the cached instance or constructs it, at most one thread constructs a key at a time
    fn cached(
        &self,
        cache_key: CacheKey,
        construct: impl FnOnce() -> Result<AnyInstance, ResolveErrorKind>,
    ) -> Result<AnyInstance, ResolveErrorKind> {
        match self.inner.cache.acquire(cache_key) {
            Acquired::Ready(instance) => {
                debug!("Constructed by another thread");
                Ok(instance)
            }
            Acquired::Vacant(reservation) => {
                let instance = construct()?;
                reservation.fulfill(instance.clone());
                Ok(instance)
            }
        }
    }

    fn construct(&self, key: &Key, entry: &Entry) -> Result<AnyInstance, ResolveErrorKind> {
        match entry {
            Entry::Binding(binding) => {
                let instance = binding.produce(self, key)?;
                debug!(strategy = binding.strategy().name(), "Constructed");
                Ok(instance)
            }
            Entry::Aggregate(aggregate) => self.assemble(key, aggregate),
        }
    }

    fn assemble(&self, key: &Key, aggregate: &Aggregate) -> Result<AnyInstance, ResolveErrorKind> {
        let mut elements = Vec::with_capacity(aggregate.contributions.len());
        for (index, contribution) in aggregate.contributions.iter().enumerate() {
            let binding = &contribution.binding;
            let instance = if binding.effective_scope().is_cached() {
                self.cached(CacheKey::Element(key.clone(), index), || binding.produce(self, key))?
            } else {
                binding.produce(self, key)?
            };
            elements.push((contribution.map_key.as_ref().map(|map_key| map_key.value()), instance));
        }

        let collection = aggregate.assemble(key, elements)?;
        debug!(contributions = aggregate.contributions.len(), "Assembled");
        Ok(collection)
    }
}

impl Debug for Injector {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("registry", &self.inner.registry)
            .field("cached", &self.inner.cache.len())
            .field("modules", &self.inner.modules)
            .finish()
    }
}
