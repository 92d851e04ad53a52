use core::{hash::Hash, marker::PhantomData};
use std::{borrow::Cow, fmt::Debug, sync::Arc};

use crate::{
    binding::Binding,
    dependency_resolver::DependencyResolver,
    errors::BindErrorKind,
    instantiator::{Injectable, Instantiator},
    key::{Key, Marker, Qualifier},
    multibinding::{List, ListBuilder, Map, MapBuilder, Set, SetBuilder},
    provider::Provider,
    registry::{RegistryBuilder, Source},
    scope::Scope,
};

/// Registration handle given to a module while it's configured.
///
/// Every registration is attributed to the module, so it can be overridden by modules overriding it.
pub struct Binder<'a> {
    registry: &'a mut RegistryBuilder,
    source: Source,
}

impl<'a> Binder<'a> {
    #[inline]
    pub(crate) fn new(registry: &'a mut RegistryBuilder, source: Source) -> Self {
        Self { registry, source }
    }

    #[inline]
    #[must_use]
    pub const fn source(&self) -> Source {
        self.source
    }

    /// Starts an unqualified binding of `T`
    #[inline]
    pub fn bind<T: Send + Sync + 'static>(&mut self) -> BindingBuilder<'_, T> {
        BindingBuilder {
            registry: &mut *self.registry,
            source: self.source,
            key: Key::of::<T>(),
            scope: None,
            _marker: PhantomData,
        }
    }

    /// Registers a prepared binding
    ///
    /// # Errors
    /// See [`RegistryBuilder::register`]
    pub fn register(&mut self, key: Key, binding: Binding) -> Result<(), BindErrorKind> {
        self.registry.register_from(key, binding, self.source)
    }

    /// Declares the unqualified [`Set`] of `T`, contributions of all modules are accumulated
    ///
    /// # Errors
    /// Returns [`BindErrorKind::AggregateConflict`] if the key is bound by a plain binding
    /// or [`BindErrorKind::Finalized`] if the registry is finalized
    pub fn bind_set<T: Eq + Hash + Send + Sync + 'static>(&mut self) -> Result<SetBuilder<'_, T>, BindErrorKind> {
        SetBuilder::new(self.registry, self.source, Key::of::<Set<T>>())
    }

    pub fn bind_set_qualified<T: Eq + Hash + Send + Sync + 'static>(
        &mut self,
        qualifier: Qualifier,
    ) -> Result<SetBuilder<'_, T>, BindErrorKind> {
        SetBuilder::new(self.registry, self.source, Key::qualified::<Set<T>>(qualifier))
    }

    pub fn bind_set_marked<T: Eq + Hash + Send + Sync + 'static, M: Marker>(&mut self) -> Result<SetBuilder<'_, T>, BindErrorKind> {
        SetBuilder::new(self.registry, self.source, Key::marked::<Set<T>, M>())
    }

    /// Declares the unqualified [`List`] of `T`
    ///
    /// # Errors
    /// Same as [`Binder::bind_set`]
    pub fn bind_list<T: Send + Sync + 'static>(&mut self) -> Result<ListBuilder<'_, T>, BindErrorKind> {
        ListBuilder::new(self.registry, self.source, Key::of::<List<T>>())
    }

    pub fn bind_list_qualified<T: Send + Sync + 'static>(&mut self, qualifier: Qualifier) -> Result<ListBuilder<'_, T>, BindErrorKind> {
        ListBuilder::new(self.registry, self.source, Key::qualified::<List<T>>(qualifier))
    }

    /// Declares the unqualified [`Map`] from `K` to `V`
    ///
    /// # Errors
    /// Same as [`Binder::bind_set`]
    pub fn bind_map<K, V>(&mut self) -> Result<MapBuilder<'_, K, V>, BindErrorKind>
    where
        K: Clone + Debug + Eq + Hash + Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        MapBuilder::new(self.registry, self.source, Key::of::<Map<K, V>>())
    }

    pub fn bind_map_qualified<K, V>(&mut self, qualifier: Qualifier) -> Result<MapBuilder<'_, K, V>, BindErrorKind>
    where
        K: Clone + Debug + Eq + Hash + Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        MapBuilder::new(self.registry, self.source, Key::qualified::<Map<K, V>>(qualifier))
    }
}

/// Binding of one key under construction, finished by one of the `to_*` methods
#[must_use]
pub struct BindingBuilder<'a, T> {
    registry: &'a mut RegistryBuilder,
    source: Source,
    key: Key,
    scope: Option<Scope>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> BindingBuilder<'_, T> {
    #[inline]
    pub fn qualified(mut self, qualifier: Qualifier) -> Self {
        self.key = self.key.with_qualifier(Some(qualifier));
        self
    }

    #[inline]
    pub fn named(self, name: impl Into<Cow<'static, str>>) -> Self {
        self.qualified(Qualifier::named(name))
    }

    #[inline]
    pub fn marked<M: Marker>(mut self) -> Self {
        self.key = self.key.with_qualifier(M::qualifier());
        self
    }

    #[inline]
    pub fn in_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    #[inline]
    pub fn in_singleton_scope(self) -> Self {
        self.in_scope(Scope::Singleton)
    }

    #[inline]
    pub fn unscoped(self) -> Self {
        self.in_scope(Scope::Unscoped)
    }

    #[inline]
    #[must_use]
    pub const fn key(&self) -> &Key {
        &self.key
    }

    /// Finishes the binding with a prepared recipe, the scope set on the builder takes precedence
    ///
    /// # Errors
    /// See [`RegistryBuilder::register`]
    pub fn to_binding(self, binding: Binding) -> Result<(), BindErrorKind> {
        let binding = match self.scope {
            Some(scope) => binding.in_scope(scope),
            None => binding,
        };
        self.registry.register_from(self.key, binding, self.source)
    }

    pub fn to_constructor<Inst, Deps>(self, instantiator: Inst) -> Result<(), BindErrorKind>
    where
        Inst: Instantiator<Deps, Provides = T>,
        Deps: DependencyResolver + 'static,
    {
        self.to_binding(Binding::constructor(instantiator))
    }

    /// Binds `T` to the implementation `Impl` constructed by injection
    pub fn to_type<Impl: Injectable + Into<T>>(self) -> Result<(), BindErrorKind> {
        self.to_binding(Binding::of_type::<T, Impl>())
    }

    pub fn to_instance(self, value: T) -> Result<(), BindErrorKind> {
        self.to_binding(Binding::instance(value))
    }

    pub fn to_shared_instance(self, value: Arc<T>) -> Result<(), BindErrorKind> {
        self.to_binding(Binding::shared_instance(value))
    }

    pub fn to_provider<P: Provider<T> + Injectable>(self) -> Result<(), BindErrorKind> {
        self.to_binding(Binding::provider::<T, P>())
    }

    pub fn to_provider_instance<P: Provider<T>>(self, provider: P) -> Result<(), BindErrorKind> {
        self.to_binding(Binding::provider_instance::<T, P>(provider))
    }

    /// Resolves the key as another key of `T`
    ///
    /// # Errors
    /// Returns [`BindErrorKind::IncorrectType`] if the target key isn't a key of `T`
    pub fn to_key(self, target: Key) -> Result<(), BindErrorKind> {
        self.to_binding(Binding::alias(target))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        errors::{BindErrorKind, InstantiateErrorKind},
        inject::Inject,
        instantiator::Injectable,
        key::{Key, Marker},
        provider::Provider,
        Injector, RegistryBuilder, ResolveErrorKind, Scope,
    };

    use std::sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    };
    use tracing_test::traced_test;

    trait Storage: Send + Sync {
        fn name(&self) -> &'static str;
    }

    struct Memory;

    impl Storage for Memory {
        fn name(&self) -> &'static str {
            "memory"
        }
    }

    impl Injectable for Memory {
        type Deps = ();

        fn inject((): ()) -> Result<Self, InstantiateErrorKind> {
            Ok(Self)
        }
    }

    impl From<Memory> for Box<dyn Storage> {
        fn from(value: Memory) -> Self {
            Box::new(value)
        }
    }

    struct Connections(u8);

    struct ConnectionsProvider(Arc<u8>);

    impl Injectable for ConnectionsProvider {
        type Deps = (Inject<u8>,);

        fn inject((Inject(limit),): Self::Deps) -> Result<Self, InstantiateErrorKind> {
            Ok(Self(limit))
        }
    }

    impl Provider<Connections> for ConnectionsProvider {
        fn get(&self) -> Result<Connections, InstantiateErrorKind> {
            Ok(Connections(*self.0))
        }
    }

    struct Admin;

    impl Marker for Admin {}

    #[test]
    #[traced_test]
    fn test_strategies() {
        let provider_call_count = Arc::new(AtomicU8::new(0));

        let mut builder = RegistryBuilder::default();
        let mut binder = builder.binder();
        binder.bind::<u8>().to_instance(4).unwrap();
        binder.bind::<u8>().named("admin").to_key(Key::of::<u8>()).unwrap();
        binder.bind::<Box<dyn Storage>>().to_type::<Memory>().unwrap();
        binder.bind::<Connections>().to_provider::<ConnectionsProvider>().unwrap();
        binder
            .bind::<Connections>()
            .marked::<Admin>()
            .in_singleton_scope()
            .to_provider_instance({
                let provider_call_count = provider_call_count.clone();
                move || {
                    provider_call_count.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, InstantiateErrorKind>(Connections(1))
                }
            })
            .unwrap();
        let injector = Injector::new(builder.finalize().unwrap());

        assert_eq!(*injector.get_qualified::<u8>(crate::Qualifier::named("admin")).unwrap(), 4);
        assert_eq!(injector.get::<Box<dyn Storage>>().unwrap().name(), "memory");
        assert_eq!(injector.get::<Connections>().unwrap().0, 4);

        let admin = injector.get_marked::<Connections, Admin>().unwrap();
        assert_eq!(admin.0, 1);
        assert!(Arc::ptr_eq(&admin, &injector.get_marked::<Connections, Admin>().unwrap()));
        assert_eq!(provider_call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[traced_test]
    fn test_instance_is_shared() {
        let mut builder = RegistryBuilder::default();
        builder.binder().bind::<String>().unscoped().to_instance(String::from("shared")).unwrap();
        let injector = Injector::new(builder.finalize().unwrap());

        assert!(Arc::ptr_eq(&injector.get::<String>().unwrap(), &injector.get::<String>().unwrap()));
    }

    #[test]
    #[traced_test]
    fn test_alias_of_other_type() {
        let mut builder = RegistryBuilder::default();

        assert!(matches!(
            builder.binder().bind::<u8>().to_key(Key::of::<u16>()),
            Err(BindErrorKind::IncorrectType { .. })
        ));
    }

    #[test]
    #[traced_test]
    fn test_provider_error() {
        let mut builder = RegistryBuilder::default();
        builder
            .binder()
            .bind::<Connections>()
            .in_scope(Scope::Singleton)
            .to_provider_instance(crate::provider::Named::new("pool", || {
                Err::<Connections, _>(InstantiateErrorKind::Custom(anyhow::anyhow!("pool is closed")))
            }))
            .unwrap();
        let injector = Injector::new(builder.finalize().unwrap());

        assert!(matches!(
            injector.get::<Connections>(),
            Err(ResolveErrorKind::Provider { provider, .. }) if provider == "pool"
        ));
    }
}
