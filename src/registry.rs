use core::fmt::{self, Debug, Display, Formatter};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};
use tracing::{debug, error};

use crate::{
    binder::Binder,
    binding::Binding,
    config::Config,
    dependency::{Dependency, DependencyKind},
    errors::BindErrorKind,
    injector::Injector,
    key::Key,
    module::ModuleId,
    multibinding::{Aggregate, Contribution, MapKey},
    scope::Scope,
};

/// Origin of a registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// Registered by a direct call, can't override or be overridden
    Direct,
    Module(ModuleId),
}

impl Display for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Source::Direct => f.write_str("direct registration"),
            Source::Module(module) => write!(f, "module {module}"),
        }
    }
}

struct Candidate {
    binding: Binding,
    source: Source,
}

enum PendingEntry {
    Candidates(Vec<Candidate>),
    Aggregate(Aggregate),
}

pub(crate) enum Entry {
    Binding(Binding),
    Aggregate(Aggregate),
}

impl Entry {
    #[must_use]
    fn dependencies(&self) -> Vec<&Dependency> {
        match self {
            Entry::Binding(binding) => binding.dependencies().iter().collect(),
            Entry::Aggregate(aggregate) => aggregate
                .contributions
                .iter()
                .flat_map(|contribution| contribution.binding.dependencies())
                .collect(),
        }
    }
}

type OverrideGraph = BTreeMap<ModuleId, BTreeSet<ModuleId>>;

/// Whether `overriding` takes precedence over `overridden`, directly or transitively
fn is_overriding(graph: &OverrideGraph, overriding: Source, overridden: Source) -> bool {
    let (Source::Module(overriding), Source::Module(overridden)) = (overriding, overridden) else {
        return false;
    };

    let mut visited = BTreeSet::new();
    let mut stack = vec![overriding];
    while let Some(module) = stack.pop() {
        if !visited.insert(module) {
            continue;
        }
        if let Some(targets) = graph.get(&module) {
            if targets.contains(&overridden) {
                return true;
            }
            stack.extend(targets.iter().copied());
        }
    }
    false
}

/// Candidate strictly taking precedence over all others, `None` if there is no such candidate
fn effective_candidate<'a>(graph: &OverrideGraph, candidates: &'a [Candidate]) -> Option<&'a Candidate> {
    candidates.iter().find(|candidate| {
        candidates.iter().all(|other| {
            core::ptr::eq(*candidate, other)
                || (is_overriding(graph, candidate.source, other.source) && !is_overriding(graph, other.source, candidate.source))
        })
    })
}

/// Mutable registry used while configuring modules.
///
/// Several modules may bind the same key if one of them overrides the others,
/// the effective binding is selected on [`RegistryBuilder::finalize`], so registration order doesn't matter.
pub struct RegistryBuilder {
    config: Config,
    entries: BTreeMap<Key, PendingEntry>,
    overrides: OverrideGraph,
    finalized: Option<Registry>,
}

impl RegistryBuilder {
    #[inline]
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            entries: BTreeMap::new(),
            overrides: BTreeMap::new(),
            finalized: None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    #[must_use]
    pub const fn is_finalized(&self) -> bool {
        self.finalized.is_some()
    }

    /// Binder of direct registrations
    #[inline]
    pub fn binder(&mut self) -> Binder<'_> {
        Binder::new(self, Source::Direct)
    }

    /// Binder of registrations overridable by modules overriding `module`
    #[inline]
    pub fn module_binder(&mut self, module: ModuleId) -> Binder<'_> {
        Binder::new(self, Source::Module(module))
    }

    /// Registers a binding that can't be overridden
    ///
    /// # Errors
    /// - [`BindErrorKind::DuplicateBinding`] if the key is already bound
    /// - [`BindErrorKind::IncorrectType`] if the binding doesn't provide the type of the key
    /// - [`BindErrorKind::Finalized`] if the registry is finalized
    pub fn register(&mut self, key: Key, binding: Binding) -> Result<(), BindErrorKind> {
        self.register_from(key, binding, Source::Direct)
    }

    /// Registers a binding of the module.
    ///
    /// # Errors
    /// Same as [`RegistryBuilder::register`], the key can be bound again only by
    /// modules related to this one by an override relation.
    pub fn register_overridable(&mut self, key: Key, binding: Binding, module: ModuleId) -> Result<(), BindErrorKind> {
        self.register_from(key, binding, Source::Module(module))
    }

    /// Declares that bindings of `overriding` take precedence over bindings of `overridden` for the same keys
    ///
    /// # Errors
    /// Returns [`BindErrorKind::FinalizedOverride`] if the registry is finalized
    pub fn declare_override(&mut self, overriding: ModuleId, overridden: ModuleId) -> Result<(), BindErrorKind> {
        if self.finalized.is_some() {
            let err = BindErrorKind::FinalizedOverride { overriding, overridden };
            error!("{}", err);
            return Err(err);
        }

        debug!(%overriding, %overridden, "Override declared");
        self.overrides.entry(overriding).or_default().insert(overridden);
        Ok(())
    }

    /// Effective binding of the key at the moment
    #[must_use]
    pub fn lookup(&self, key: &Key) -> Option<&Binding> {
        if let Some(registry) = &self.finalized {
            return registry.lookup(key);
        }

        match self.entries.get(key)? {
            PendingEntry::Candidates(candidates) => {
                effective_candidate(&self.overrides, candidates).map(|candidate| &candidate.binding)
            }
            PendingEntry::Aggregate(_) => None,
        }
    }

    #[must_use]
    pub fn contains(&self, key: &Key) -> bool {
        match &self.finalized {
            Some(registry) => registry.contains(key),
            None => self.entries.contains_key(key),
        }
    }

    pub(crate) fn register_from(&mut self, key: Key, binding: Binding, source: Source) -> Result<(), BindErrorKind> {
        if self.finalized.is_some() {
            let err = BindErrorKind::Finalized { key };
            error!("{}", err);
            return Err(err);
        }
        if binding.provides() != key.type_info {
            let err = BindErrorKind::IncorrectType {
                key,
                actual: binding.provides(),
            };
            error!("{}", err);
            return Err(err);
        }

        let binding = binding.with_default_scope(self.config.default_scope);

        match self.entries.get_mut(&key) {
            None => {
                debug!(%key, %source, "Registered");
                self.entries
                    .insert(key, PendingEntry::Candidates(vec![Candidate { binding, source }]));
                Ok(())
            }
            Some(PendingEntry::Aggregate(_)) => {
                let err = BindErrorKind::AggregateConflict { key };
                error!("{}", err);
                Err(err)
            }
            Some(PendingEntry::Candidates(candidates)) => {
                let conflict = candidates.iter().find(|candidate| {
                    !is_overriding(&self.overrides, source, candidate.source)
                        && !is_overriding(&self.overrides, candidate.source, source)
                });
                if let Some(conflict) = conflict {
                    let err = BindErrorKind::DuplicateBinding {
                        existing: conflict.source,
                        duplicate: source,
                        key,
                    };
                    error!("{}", err);
                    return Err(err);
                }

                debug!(%key, %source, "Registered overridable candidate");
                candidates.push(Candidate { binding, source });
                Ok(())
            }
        }
    }

    /// Creates the aggregate of the key if it doesn't exist yet
    pub(crate) fn declare_aggregate(&mut self, key: Key, aggregate: impl FnOnce(&Config) -> Aggregate) -> Result<(), BindErrorKind> {
        if self.finalized.is_some() {
            let err = BindErrorKind::Finalized { key };
            error!("{}", err);
            return Err(err);
        }

        match self.entries.get(&key) {
            Some(PendingEntry::Aggregate(_)) => Ok(()),
            Some(PendingEntry::Candidates(_)) => {
                let err = BindErrorKind::AggregateConflict { key };
                error!("{}", err);
                Err(err)
            }
            None => {
                debug!(%key, "Aggregate declared");
                let aggregate = aggregate(&self.config);
                self.entries.insert(key, PendingEntry::Aggregate(aggregate));
                Ok(())
            }
        }
    }

    pub(crate) fn contribute(
        &mut self,
        key: &Key,
        binding: Binding,
        source: Source,
        map_key: Option<MapKey>,
    ) -> Result<(), BindErrorKind> {
        let Self {
            config,
            entries,
            overrides,
            finalized,
        } = self;

        if finalized.is_some() {
            let err = BindErrorKind::Finalized { key: key.clone() };
            error!("{}", err);
            return Err(err);
        }
        let Some(PendingEntry::Aggregate(aggregate)) = entries.get_mut(key) else {
            let err = BindErrorKind::AggregateConflict { key: key.clone() };
            error!("{}", err);
            return Err(err);
        };

        let contribution = Contribution {
            binding: binding.with_default_scope(config.default_scope),
            source,
            map_key,
        };
        aggregate.insert(key, contribution, |overriding, overridden| is_overriding(overrides, overriding, overridden))
    }

    pub(crate) fn set_aggregate_scope(&mut self, key: &Key, scope: Scope) -> Result<(), BindErrorKind> {
        if self.finalized.is_some() {
            let err = BindErrorKind::Finalized { key: key.clone() };
            error!("{}", err);
            return Err(err);
        }
        match self.entries.get_mut(key) {
            Some(PendingEntry::Aggregate(aggregate)) => {
                aggregate.scope = scope;
                Ok(())
            }
            _ => {
                let err = BindErrorKind::AggregateConflict { key: key.clone() };
                error!("{}", err);
                Err(err)
            }
        }
    }

    /// Selects the effective binding of every key and freezes the registry.
    /// Any later mutation fails with [`BindErrorKind::Finalized`], finalizing again returns the same registry.
    ///
    /// # Errors
    /// - [`BindErrorKind::AmbiguousOverride`] if the override relation between candidates of a key is cyclic
    /// - [`BindErrorKind::Unsatisfied`] if [`Config::validate_on_build`] is set and a direct dependency isn't bound
    pub fn finalize(&mut self) -> Result<Registry, BindErrorKind> {
        if let Some(registry) = &self.finalized {
            return Ok(registry.clone());
        }

        let mut entries = BTreeMap::new();
        for (key, entry) in &self.entries {
            let entry = match entry {
                PendingEntry::Candidates(candidates) => {
                    let Some(winner) = effective_candidate(&self.overrides, candidates) else {
                        let err = BindErrorKind::AmbiguousOverride { key: key.clone() };
                        error!("{}", err);
                        return Err(err);
                    };
                    for overridden in candidates.iter().filter(|candidate| !core::ptr::eq(*candidate, winner)) {
                        debug!(%key, by = %winner.source, source = %overridden.source, "Binding overridden");
                    }
                    Entry::Binding(winner.binding.clone())
                }
                PendingEntry::Aggregate(aggregate) => Entry::Aggregate(aggregate.clone()),
            };
            entries.insert(key.clone(), entry);
        }

        if self.config.validate_on_build {
            validate(&entries)?;
        }

        let registry = Registry {
            inner: Arc::new(RegistryInner {
                entries,
                config: self.config,
            }),
        };
        debug!(bindings = registry.len(), "Registry finalized");

        self.finalized = Some(registry.clone());
        Ok(registry)
    }
}

impl Default for RegistryBuilder {
    #[inline]
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Debug for RegistryBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("config", &self.config)
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .field("overrides", &self.overrides)
            .field("finalized", &self.finalized.is_some())
            .finish()
    }
}

fn validate(entries: &BTreeMap<Key, Entry>) -> Result<(), BindErrorKind> {
    for (key, entry) in entries {
        for dependency in entry.dependencies() {
            if dependency.kind == DependencyKind::Lazy || dependency.key.is::<Injector>() {
                continue;
            }
            if !entries.contains_key(&dependency.key) {
                let err = BindErrorKind::Unsatisfied {
                    key: dependency.key.clone(),
                    requested_by: key.clone(),
                };
                error!("{}", err);
                return Err(err);
            }
        }
    }
    Ok(())
}

pub(crate) struct RegistryInner {
    entries: BTreeMap<Key, Entry>,
    config: Config,
}

/// Finalized read-only registry, cheap to clone
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Registry {
    #[must_use]
    pub fn lookup(&self, key: &Key) -> Option<&Binding> {
        match self.inner.entries.get(key)? {
            Entry::Binding(binding) => Some(binding),
            Entry::Aggregate(_) => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, key: &Key) -> bool {
        self.inner.entries.contains_key(key)
    }

    /// Bound keys in a stable order
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.inner.entries.keys()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    #[inline]
    pub(crate) fn entry(&self, key: &Key) -> Option<&Entry> {
        self.inner.entries.get(key)
    }
}

impl Debug for Registry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("keys", &self.keys().collect::<Vec<_>>())
            .field("config", &self.inner.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{RegistryBuilder, Source};
    use crate::{
        any::TypeInfo,
        binding::{instance, Binding},
        config::Config,
        errors::{BindErrorKind, InstantiateErrorKind},
        inject::Inject,
        injector::Injector,
        key::Key,
        lazy::Lazy,
        module::ModuleId,
        scope::Scope,
    };

    use tracing_test::traced_test;

    struct Base;
    struct Overriding;
    struct Unrelated;
    struct Top;

    fn id<M: 'static>() -> ModuleId {
        ModuleId::new(TypeInfo::of::<M>(), 0)
    }

    #[test]
    #[traced_test]
    fn test_duplicate_binding() {
        let mut builder = RegistryBuilder::default();
        builder.register(Key::of::<u8>(), instance(1_u8)).unwrap();

        assert!(matches!(
            builder.register(Key::of::<u8>(), instance(2_u8)),
            Err(BindErrorKind::DuplicateBinding {
                existing: Source::Direct,
                duplicate: Source::Direct,
                ..
            })
        ));
        // Another qualifier is another key
        builder.register(Key::named::<u8>("other"), instance(2_u8)).unwrap();
    }

    #[test]
    #[traced_test]
    fn test_incorrect_type() {
        let mut builder = RegistryBuilder::default();

        assert!(matches!(
            builder.register(Key::of::<u8>(), instance(1_u16)),
            Err(BindErrorKind::IncorrectType { actual, .. }) if actual.is::<u16>()
        ));
        assert!(!builder.contains(&Key::of::<u8>()));
    }

    #[test]
    #[traced_test]
    fn test_override_independent_of_order() {
        for overriding_first in [false, true] {
            let mut builder = RegistryBuilder::default();
            builder.declare_override(id::<Overriding>(), id::<Base>()).unwrap();

            let mut register = |module: ModuleId, value: u8| builder.register_overridable(Key::of::<u8>(), instance(value), module);
            if overriding_first {
                register(id::<Overriding>(), 2).unwrap();
                register(id::<Base>(), 1).unwrap();
            } else {
                register(id::<Base>(), 1).unwrap();
                register(id::<Overriding>(), 2).unwrap();
            }

            let registry = builder.finalize().unwrap();
            assert_eq!(registry.len(), 1);

            let injector = Injector::new(registry);
            assert_eq!(*injector.get::<u8>().unwrap(), 2, "overriding registered first: {overriding_first}");
        }
    }

    #[test]
    #[traced_test]
    fn test_transitive_override() {
        let mut builder = RegistryBuilder::default();
        builder.declare_override(id::<Top>(), id::<Overriding>()).unwrap();
        builder.declare_override(id::<Overriding>(), id::<Base>()).unwrap();

        builder.register_overridable(Key::of::<u8>(), instance(1_u8), id::<Base>()).unwrap();
        builder.register_overridable(Key::of::<u8>(), instance(3_u8), id::<Top>()).unwrap();
        builder.register_overridable(Key::of::<u8>(), instance(2_u8), id::<Overriding>()).unwrap();

        assert!(matches!(
            builder.register_overridable(Key::of::<u8>(), instance(4_u8), id::<Unrelated>()),
            Err(BindErrorKind::DuplicateBinding { .. })
        ));
        // Direct registrations are never overridable
        assert!(matches!(
            builder.register(Key::of::<u8>(), instance(5_u8)),
            Err(BindErrorKind::DuplicateBinding { .. })
        ));
        builder.finalize().unwrap();
    }

    #[test]
    #[traced_test]
    fn test_ambiguous_override() {
        let mut builder = RegistryBuilder::default();
        builder.declare_override(id::<Overriding>(), id::<Base>()).unwrap();
        builder.declare_override(id::<Base>(), id::<Overriding>()).unwrap();
        builder.register_overridable(Key::of::<u8>(), instance(1_u8), id::<Base>()).unwrap();
        builder.register_overridable(Key::of::<u8>(), instance(2_u8), id::<Overriding>()).unwrap();

        assert!(matches!(builder.finalize(), Err(BindErrorKind::AmbiguousOverride { .. })));
    }

    #[test]
    #[traced_test]
    fn test_mutation_after_finalize() {
        let mut builder = RegistryBuilder::default();
        builder.register(Key::of::<u8>(), instance(1_u8)).unwrap();
        let registry = builder.finalize().unwrap();

        assert!(matches!(
            builder.register(Key::of::<u16>(), instance(1_u16)),
            Err(BindErrorKind::Finalized { .. })
        ));
        assert!(matches!(
            builder.binder().bind::<u32>().to_instance(1),
            Err(BindErrorKind::Finalized { .. })
        ));
        assert!(matches!(
            builder.declare_override(id::<Overriding>(), id::<Base>()),
            Err(BindErrorKind::FinalizedOverride { .. })
        ));
        assert!(builder.binder().bind_set::<u8>().is_err());

        let finalized_again = builder.finalize().unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(finalized_again.len(), 1);
        assert!(!registry.contains(&Key::of::<u16>()));
        assert!(builder.lookup(&Key::of::<u8>()).is_some());
    }

    #[test]
    #[traced_test]
    fn test_default_scope() {
        let mut builder = RegistryBuilder::new(Config {
            default_scope: Scope::Singleton,
            ..Config::default()
        });
        builder
            .register(Key::of::<u8>(), Binding::constructor(|| Ok::<_, InstantiateErrorKind>(1_u8)))
            .unwrap();
        builder
            .register(
                Key::of::<u16>(),
                Binding::constructor(|| Ok::<_, InstantiateErrorKind>(1_u16)).unscoped(),
            )
            .unwrap();
        let registry = builder.finalize().unwrap();

        assert_eq!(registry.lookup(&Key::of::<u8>()).unwrap().scope(), Some(Scope::Singleton));
        assert_eq!(registry.lookup(&Key::of::<u16>()).unwrap().scope(), Some(Scope::Unscoped));
    }

    #[test]
    #[traced_test]
    fn test_validate_on_build() {
        let config = Config {
            validate_on_build: true,
            ..Config::default()
        };

        let mut builder = RegistryBuilder::new(config);
        builder
            .register(
                Key::of::<u16>(),
                Binding::constructor(|Inject(value): Inject<u8>| Ok::<_, InstantiateErrorKind>(u16::from(*value))),
            )
            .unwrap();
        assert!(matches!(
            builder.finalize(),
            Err(BindErrorKind::Unsatisfied { key, requested_by }) if key.is::<u8>() && requested_by.is::<u16>()
        ));

        // Lazy dependencies are resolved on demand
        let mut builder = RegistryBuilder::new(config);
        builder
            .register(
                Key::of::<u16>(),
                Binding::constructor(|_: Lazy<u8>| Ok::<_, InstantiateErrorKind>(1_u16)),
            )
            .unwrap();
        builder.finalize().unwrap();
    }
}
