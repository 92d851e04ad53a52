use core::{
    fmt::{self, Debug, Formatter},
    hash::Hash,
    marker::PhantomData,
    ops::Deref,
};
use indexmap::{IndexMap, IndexSet};
use std::sync::Arc;
use tracing::{debug, error};

use crate::{
    any::{AnyInstance, TypeInfo},
    binding::Binding,
    dependency_resolver::DependencyResolver,
    errors::{BindErrorKind, ResolveErrorKind},
    instantiator::{Injectable, Instantiator},
    key::Key,
    provider::Provider,
    registry::{RegistryBuilder, Source},
    scope::Scope,
};

/// Resolved set aggregate, equal contributions are collapsed and the first seen order is kept
pub struct Set<T>(IndexSet<Arc<T>>);

impl<T> Set<T> {
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> IndexSet<Arc<T>> {
        self.0
    }
}

impl<T> Deref for Set<T> {
    type Target = IndexSet<Arc<T>>;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: Debug> Debug for Set<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.iter()).finish()
    }
}

/// Resolved list aggregate, every contribution is kept in contribution order
pub struct List<T>(Vec<Arc<T>>);

impl<T> List<T> {
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> Vec<Arc<T>> {
        self.0
    }
}

impl<T> Deref for List<T> {
    type Target = [Arc<T>];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: Debug> Debug for List<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

/// Resolved map aggregate in contribution order
pub struct Map<K, V>(IndexMap<K, Arc<V>>);

impl<K, V> Map<K, V> {
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> IndexMap<K, Arc<V>> {
        self.0
    }
}

impl<K, V> Deref for Map<K, V> {
    type Target = IndexMap<K, Arc<V>>;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<K: Debug, V: Debug> Debug for Map<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

/// Key of a map contribution with the type erased
#[derive(Clone)]
pub(crate) struct MapKey {
    value: AnyInstance,
    display: String,
    eq: fn(&AnyInstance, &AnyInstance) -> bool,
}

impl MapKey {
    fn new<K: Debug + Eq + Send + Sync + 'static>(value: K) -> Self {
        Self {
            display: format!("{value:?}"),
            value: Arc::new(value),
            eq: |a, b| a.downcast_ref::<K>().zip(b.downcast_ref::<K>()).is_some_and(|(a, b)| a == b),
        }
    }

    #[inline]
    pub(crate) fn value(&self) -> AnyInstance {
        self.value.clone()
    }

    fn matches(&self, other: &MapKey) -> bool {
        (self.eq)(&self.value, &other.value)
    }
}

#[derive(Clone)]
pub(crate) struct Contribution {
    pub(crate) binding: Binding,
    pub(crate) source: Source,
    pub(crate) map_key: Option<MapKey>,
}

/// Elements resolved in contribution order with their map keys
pub(crate) type Elements = Vec<(Option<AnyInstance>, AnyInstance)>;

type Assemble = fn(&Key, Elements) -> Result<AnyInstance, ResolveErrorKind>;

/// Registry entry accumulating contributions of many modules into one collection
#[derive(Clone)]
pub(crate) struct Aggregate {
    element: TypeInfo,
    pub(crate) scope: Scope,
    pub(crate) contributions: Vec<Contribution>,
    assemble: Assemble,
}

impl Aggregate {
    fn new(element: TypeInfo, scope: Scope, assemble: Assemble) -> Self {
        Self {
            element,
            scope,
            contributions: Vec::new(),
            assemble,
        }
    }

    #[inline]
    pub(crate) fn assemble(&self, key: &Key, elements: Elements) -> Result<AnyInstance, ResolveErrorKind> {
        (self.assemble)(key, elements)
    }

    /// Adds the contribution, a repeated map key is replaced only by a contribution of an overriding module
    pub(crate) fn insert(
        &mut self,
        key: &Key,
        contribution: Contribution,
        is_overriding: impl Fn(Source, Source) -> bool,
    ) -> Result<(), BindErrorKind> {
        if contribution.binding.provides() != self.element {
            let err = BindErrorKind::IncorrectType {
                key: key.clone(),
                actual: contribution.binding.provides(),
            };
            error!("{}", err);
            return Err(err);
        }

        let Some(map_key) = &contribution.map_key else {
            debug!(%key, source = %contribution.source, "Contributed");
            self.contributions.push(contribution);
            return Ok(());
        };

        let existing = self.contributions.iter_mut().find(|existing| {
            existing
                .map_key
                .as_ref()
                .is_some_and(|existing_key| existing_key.matches(map_key))
        });
        match existing {
            None => {
                debug!(%key, map_key = %map_key.display, source = %contribution.source, "Contributed");
                self.contributions.push(contribution);
                Ok(())
            }
            Some(existing) if is_overriding(contribution.source, existing.source) => {
                debug!(%key, map_key = %map_key.display, source = %existing.source, "Map entry overridden");
                *existing = contribution;
                Ok(())
            }
            Some(existing) if is_overriding(existing.source, contribution.source) => {
                debug!(%key, map_key = %map_key.display, source = %contribution.source, "Map entry ignored, overridden");
                Ok(())
            }
            Some(existing) => {
                let err = BindErrorKind::DuplicateMapKey {
                    key: key.clone(),
                    map_key: map_key.display.clone(),
                    existing: existing.source,
                    duplicate: contribution.source,
                };
                error!("{}", err);
                Err(err)
            }
        }
    }
}

fn downcast<T: Send + Sync + 'static>(key: &Key, instance: AnyInstance) -> Result<Arc<T>, ResolveErrorKind> {
    instance.downcast::<T>().map_err(|_| {
        let err = ResolveErrorKind::IncorrectType {
            key: key.clone(),
            expected: TypeInfo::of::<T>(),
        };
        error!("{}", err);
        err
    })
}

fn assemble_set<T: Eq + Hash + Send + Sync + 'static>(key: &Key, elements: Elements) -> Result<AnyInstance, ResolveErrorKind> {
    let mut set = IndexSet::with_capacity(elements.len());
    for (_, instance) in elements {
        set.insert(downcast::<T>(key, instance)?);
    }
    Ok(Arc::new(Set(set)))
}

fn assemble_list<T: Send + Sync + 'static>(key: &Key, elements: Elements) -> Result<AnyInstance, ResolveErrorKind> {
    let list = elements
        .into_iter()
        .map(|(_, instance)| downcast::<T>(key, instance))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Arc::new(List(list)))
}

fn assemble_map<K, V>(key: &Key, elements: Elements) -> Result<AnyInstance, ResolveErrorKind>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    let mut map = IndexMap::with_capacity(elements.len());
    for (map_key, instance) in elements {
        let Some(map_key) = map_key else {
            let err = ResolveErrorKind::IncorrectType {
                key: key.clone(),
                expected: TypeInfo::of::<K>(),
            };
            error!("{}", err);
            return Err(err);
        };
        let map_key = downcast::<K>(key, map_key)?;
        map.insert(K::clone(&map_key), downcast::<V>(key, instance)?);
    }
    Ok(Arc::new(Map(map)))
}

macro_rules! impl_common_builder {
    ($builder:ident <$($param:ident),*>) => {
        impl<$($param,)*> $builder<'_, $($param,)*> {
            /// Key the aggregate is resolved by
            #[inline]
            #[must_use]
            pub const fn key(&self) -> &Key {
                &self.key
            }

            /// Scope of the assembled collection, contributions keep their own scopes
            ///
            /// # Errors
            /// Returns [`BindErrorKind::Finalized`] if the registry is finalized
            pub fn in_scope(&mut self, scope: Scope) -> Result<&mut Self, BindErrorKind> {
                self.registry.set_aggregate_scope(&self.key, scope)?;
                Ok(self)
            }
        }
    };
}

/// Contributions to a [`Set`] aggregate
pub struct SetBuilder<'a, T> {
    registry: &'a mut RegistryBuilder,
    source: Source,
    key: Key,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T> SetBuilder<'a, T>
where
    T: Eq + Hash + Send + Sync + 'static,
{
    pub(crate) fn new(registry: &'a mut RegistryBuilder, source: Source, key: Key) -> Result<Self, BindErrorKind> {
        registry.declare_aggregate(key.clone(), |config| {
            Aggregate::new(TypeInfo::of::<T>(), config.default_scope, assemble_set::<T>)
        })?;
        Ok(Self {
            registry,
            source,
            key,
            _marker: PhantomData,
        })
    }

    /// # Errors
    /// Returns [`BindErrorKind::IncorrectType`] if the binding doesn't provide `T`
    /// or [`BindErrorKind::Finalized`] if the registry is finalized
    pub fn add_binding(&mut self, binding: Binding) -> Result<&mut Self, BindErrorKind> {
        self.registry.contribute(&self.key, binding, self.source, None)?;
        Ok(self)
    }

    pub fn add_instance(&mut self, value: T) -> Result<&mut Self, BindErrorKind> {
        self.add_binding(Binding::instance(value))
    }

    pub fn add_instances(&mut self, values: impl IntoIterator<Item = T>) -> Result<&mut Self, BindErrorKind> {
        for value in values {
            self.add_instance(value)?;
        }
        Ok(self)
    }

    pub fn add_constructor<Inst, Deps>(&mut self, instantiator: Inst) -> Result<&mut Self, BindErrorKind>
    where
        Inst: Instantiator<Deps, Provides = T>,
        Deps: DependencyResolver + 'static,
    {
        self.add_binding(Binding::constructor(instantiator))
    }

    pub fn add_type<Impl: Injectable + Into<T>>(&mut self) -> Result<&mut Self, BindErrorKind> {
        self.add_binding(Binding::of_type::<T, Impl>())
    }

    /// Contributes the instance bound to another key
    pub fn add_key(&mut self, key: Key) -> Result<&mut Self, BindErrorKind> {
        self.add_binding(Binding::alias(key))
    }

    pub fn add_provider<P: Provider<T> + Injectable>(&mut self) -> Result<&mut Self, BindErrorKind> {
        self.add_binding(Binding::provider::<T, P>())
    }

    pub fn add_provider_instance<P: Provider<T>>(&mut self, provider: P) -> Result<&mut Self, BindErrorKind> {
        self.add_binding(Binding::provider_instance::<T, P>(provider))
    }
}

impl_common_builder!(SetBuilder<T>);

/// Contributions to a [`List`] aggregate
pub struct ListBuilder<'a, T> {
    registry: &'a mut RegistryBuilder,
    source: Source,
    key: Key,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T> ListBuilder<'a, T>
where
    T: Send + Sync + 'static,
{
    pub(crate) fn new(registry: &'a mut RegistryBuilder, source: Source, key: Key) -> Result<Self, BindErrorKind> {
        registry.declare_aggregate(key.clone(), |config| {
            Aggregate::new(TypeInfo::of::<T>(), config.default_scope, assemble_list::<T>)
        })?;
        Ok(Self {
            registry,
            source,
            key,
            _marker: PhantomData,
        })
    }

    /// # Errors
    /// Returns [`BindErrorKind::IncorrectType`] if the binding doesn't provide `T`
    /// or [`BindErrorKind::Finalized`] if the registry is finalized
    pub fn add_binding(&mut self, binding: Binding) -> Result<&mut Self, BindErrorKind> {
        self.registry.contribute(&self.key, binding, self.source, None)?;
        Ok(self)
    }

    pub fn add_instance(&mut self, value: T) -> Result<&mut Self, BindErrorKind> {
        self.add_binding(Binding::instance(value))
    }

    pub fn add_instances(&mut self, values: impl IntoIterator<Item = T>) -> Result<&mut Self, BindErrorKind> {
        for value in values {
            self.add_instance(value)?;
        }
        Ok(self)
    }

    pub fn add_constructor<Inst, Deps>(&mut self, instantiator: Inst) -> Result<&mut Self, BindErrorKind>
    where
        Inst: Instantiator<Deps, Provides = T>,
        Deps: DependencyResolver + 'static,
    {
        self.add_binding(Binding::constructor(instantiator))
    }

    pub fn add_type<Impl: Injectable + Into<T>>(&mut self) -> Result<&mut Self, BindErrorKind> {
        self.add_binding(Binding::of_type::<T, Impl>())
    }

    pub fn add_key(&mut self, key: Key) -> Result<&mut Self, BindErrorKind> {
        self.add_binding(Binding::alias(key))
    }

    pub fn add_provider<P: Provider<T> + Injectable>(&mut self) -> Result<&mut Self, BindErrorKind> {
        self.add_binding(Binding::provider::<T, P>())
    }

    pub fn add_provider_instance<P: Provider<T>>(&mut self, provider: P) -> Result<&mut Self, BindErrorKind> {
        self.add_binding(Binding::provider_instance::<T, P>(provider))
    }
}

impl_common_builder!(ListBuilder<T>);

/// Keyed contributions to a [`Map`] aggregate
pub struct MapBuilder<'a, K, V> {
    registry: &'a mut RegistryBuilder,
    source: Source,
    key: Key,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<'a, K, V> MapBuilder<'a, K, V>
where
    K: Clone + Debug + Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub(crate) fn new(registry: &'a mut RegistryBuilder, source: Source, key: Key) -> Result<Self, BindErrorKind> {
        registry.declare_aggregate(key.clone(), |config| {
            Aggregate::new(TypeInfo::of::<V>(), config.default_scope, assemble_map::<K, V>)
        })?;
        Ok(Self {
            registry,
            source,
            key,
            _marker: PhantomData,
        })
    }

    /// # Errors
    /// - [`BindErrorKind::DuplicateMapKey`] if the map key is already contributed by a module unrelated by override
    /// - [`BindErrorKind::IncorrectType`] if the binding doesn't provide `V`
    /// - [`BindErrorKind::Finalized`] if the registry is finalized
    pub fn put_binding(&mut self, map_key: K, binding: Binding) -> Result<&mut Self, BindErrorKind> {
        self.registry
            .contribute(&self.key, binding, self.source, Some(MapKey::new(map_key)))?;
        Ok(self)
    }

    pub fn put_instance(&mut self, map_key: K, value: V) -> Result<&mut Self, BindErrorKind> {
        self.put_binding(map_key, Binding::instance(value))
    }

    pub fn put_constructor<Inst, Deps>(&mut self, map_key: K, instantiator: Inst) -> Result<&mut Self, BindErrorKind>
    where
        Inst: Instantiator<Deps, Provides = V>,
        Deps: DependencyResolver + 'static,
    {
        self.put_binding(map_key, Binding::constructor(instantiator))
    }

    pub fn put_type<Impl: Injectable + Into<V>>(&mut self, map_key: K) -> Result<&mut Self, BindErrorKind> {
        self.put_binding(map_key, Binding::of_type::<V, Impl>())
    }

    pub fn put_key(&mut self, map_key: K, key: Key) -> Result<&mut Self, BindErrorKind> {
        self.put_binding(map_key, Binding::alias(key))
    }

    pub fn put_provider<P: Provider<V> + Injectable>(&mut self, map_key: K) -> Result<&mut Self, BindErrorKind> {
        self.put_binding(map_key, Binding::provider::<V, P>())
    }

    pub fn put_provider_instance<P: Provider<V>>(&mut self, map_key: K, provider: P) -> Result<&mut Self, BindErrorKind> {
        self.put_binding(map_key, Binding::provider_instance::<V, P>(provider))
    }
}

impl_common_builder!(MapBuilder<K, V>);

#[cfg(test)]
mod tests {
    use super::{List, Map, Set};
    use crate::{
        any::TypeInfo,
        errors::{BindErrorKind, InstantiateErrorKind},
        inject::Inject,
        key::Key,
        module::ModuleId,
        Injector, RegistryBuilder, Scope,
    };

    use std::sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    };
    use tracing_test::traced_test;

    struct Base;
    struct Overriding;
    struct Other;

    fn id<M: 'static>() -> ModuleId {
        ModuleId::new(TypeInfo::of::<M>(), 0)
    }

    #[test]
    #[traced_test]
    fn test_set_deduplicates() {
        let mut builder = RegistryBuilder::default();
        builder
            .binder()
            .bind_set::<&'static str>()
            .unwrap()
            .add_instances(["a", "b", "a"])
            .unwrap();
        let injector = Injector::new(builder.finalize().unwrap());

        let set = injector.get::<Set<&'static str>>().unwrap();

        assert_eq!(set.len(), 2);
        assert!(set.contains(&"a"));
        assert!(set.contains(&"b"));
    }

    #[test]
    #[traced_test]
    fn test_list_keeps_duplicates_in_order() {
        let mut builder = RegistryBuilder::default();
        let mut binder = builder.binder();
        binder.bind::<u8>().to_instance(3).unwrap();
        binder
            .bind_list::<u8>()
            .unwrap()
            .add_instance(1)
            .unwrap()
            .add_key(Key::of::<u8>())
            .unwrap()
            .add_constructor(|| Ok::<_, InstantiateErrorKind>(1))
            .unwrap();
        let injector = Injector::new(builder.finalize().unwrap());

        let list = injector.get::<List<u8>>().unwrap();

        assert_eq!(list.iter().map(|value| **value).collect::<Vec<_>>(), [1, 3, 1]);
    }

    #[test]
    #[traced_test]
    fn test_empty_aggregate() {
        let mut builder = RegistryBuilder::default();
        builder.binder().bind_set::<u8>().unwrap();
        let injector = Injector::new(builder.finalize().unwrap());

        assert!(injector.get::<Set<u8>>().unwrap().is_empty());
        assert!(injector.get::<Set<u16>>().is_err());
    }

    #[test]
    #[traced_test]
    fn test_map_keys() {
        let mut builder = RegistryBuilder::default();
        builder
            .binder()
            .bind_map::<&'static str, &'static str>()
            .unwrap()
            .put_instance("first", "a")
            .unwrap()
            .put_instance("second", "b")
            .unwrap()
            .put_instance("third", "a")
            .unwrap();

        assert!(matches!(
            builder.binder().bind_map::<&'static str, &'static str>().unwrap().put_instance("first", "c"),
            Err(BindErrorKind::DuplicateMapKey { map_key, .. }) if map_key == "\"first\""
        ));

        let injector = Injector::new(builder.finalize().unwrap());
        let map = injector.get::<Map<&'static str, &'static str>>().unwrap();

        assert_eq!(map.len(), 3);
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), ["first", "second", "third"]);
        assert_eq!(*map[&"third"], "a");
    }

    #[test]
    #[traced_test]
    fn test_map_override() {
        let mut builder = RegistryBuilder::default();
        builder.declare_override(id::<Overriding>(), id::<Base>()).unwrap();

        builder
            .module_binder(id::<Overriding>())
            .bind_map::<u8, &'static str>()
            .unwrap()
            .put_instance(1, "overriding")
            .unwrap();
        builder
            .module_binder(id::<Base>())
            .bind_map::<u8, &'static str>()
            .unwrap()
            .put_instance(1, "base")
            .unwrap()
            .put_instance(2, "base")
            .unwrap();
        assert!(matches!(
            builder
                .module_binder(id::<Other>())
                .bind_map::<u8, &'static str>()
                .unwrap()
                .put_instance(2, "other"),
            Err(BindErrorKind::DuplicateMapKey { .. })
        ));

        let injector = Injector::new(builder.finalize().unwrap());
        let map = injector.get::<Map<u8, &'static str>>().unwrap();

        assert_eq!(*map[&1], "overriding");
        assert_eq!(*map[&2], "base");
    }

    #[test]
    #[traced_test]
    fn test_contribution_scopes() {
        let element_call_count = Arc::new(AtomicU8::new(0));

        let mut builder = RegistryBuilder::default();
        let mut binder = builder.binder();
        binder.bind::<u16>().to_instance(10).unwrap();
        binder
            .bind_list::<u16>()
            .unwrap()
            .add_binding(
                crate::Binding::constructor({
                    let element_call_count = element_call_count.clone();
                    move |Inject(base): Inject<u16>| {
                        element_call_count.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, InstantiateErrorKind>(*base + 1)
                    }
                })
                .in_singleton_scope(),
            )
            .unwrap()
            .add_constructor(|Inject(base): Inject<u16>| Ok::<_, InstantiateErrorKind>(*base + 2))
            .unwrap();
        let injector = Injector::new(builder.finalize().unwrap());

        let first = injector.get::<List<u16>>().unwrap();
        let second = injector.get::<List<u16>>().unwrap();

        // Unscoped aggregate is assembled on every resolution, its singleton element is constructed once
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first[0], &second[0]));
        assert!(!Arc::ptr_eq(&first[1], &second[1]));
        assert_eq!((*first[0], *first[1]), (11, 12));
        assert_eq!(element_call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[traced_test]
    fn test_singleton_aggregate() {
        let mut builder = RegistryBuilder::default();
        builder
            .binder()
            .bind_set::<u8>()
            .unwrap()
            .in_scope(Scope::Singleton)
            .unwrap()
            .add_constructor(|| Ok::<_, InstantiateErrorKind>(1))
            .unwrap();
        let injector = Injector::new(builder.finalize().unwrap());

        assert!(Arc::ptr_eq(
            &injector.get::<Set<u8>>().unwrap(),
            &injector.get::<Set<u8>>().unwrap()
        ));
    }

    #[test]
    #[traced_test]
    fn test_aggregate_conflict() {
        let mut builder = RegistryBuilder::default();
        builder.binder().bind::<u8>().to_instance(1).unwrap();
        builder.binder().bind_set::<u8>().unwrap();

        // `Set<u8>` and `u8` are different keys, binding the set type itself conflicts
        assert!(matches!(
            builder.binder().bind::<Set<u8>>().to_constructor(|| Err::<Set<u8>, _>(InstantiateErrorKind::Custom(anyhow::anyhow!("unused")))),
            Err(BindErrorKind::AggregateConflict { .. })
        ));
    }
}
