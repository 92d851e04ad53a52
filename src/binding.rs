use core::{
    any::type_name,
    fmt::{self, Debug, Formatter},
};
use std::{borrow::Cow, sync::Arc};

use crate::{
    any::{AnyInstance, TypeInfo},
    dependency::Dependency,
    dependency_resolver::{dependencies_of, DependencyResolver},
    errors::{InstantiateErrorKind, InstantiatorErrorKind, ResolveErrorKind},
    injector::Injector,
    instantiator::{boxed_injectable, boxed_instantiator, BoxedInstantiator, Injectable, Instantiator},
    key::Key,
    provider::Provider,
    scope::Scope,
};

pub(crate) type BoxedProvider = Arc<dyn Fn() -> Result<AnyInstance, InstantiateErrorKind> + Send + Sync>;

#[derive(Clone)]
pub(crate) enum Strategy {
    Construct(BoxedInstantiator),
    Instance(AnyInstance),
    /// Provider constructed by injection on every resolution, then asked for an instance
    ProviderType {
        provider: BoxedInstantiator,
        name: Cow<'static, str>,
    },
    ProviderInstance {
        provider: BoxedProvider,
        name: Cow<'static, str>,
    },
    Alias(Key),
}

impl Strategy {
    #[must_use]
    pub(crate) const fn name(&self) -> &'static str {
        match self {
            Strategy::Construct(_) => "constructor",
            Strategy::Instance(_) => "instance",
            Strategy::ProviderType { .. } => "provider type",
            Strategy::ProviderInstance { .. } => "provider instance",
            Strategy::Alias(_) => "alias",
        }
    }
}

/// Recipe producing instances of one type.
///
/// The scope is left unset unless specified, in which case the registry applies its default scope on registration.
#[derive(Clone)]
pub struct Binding {
    provides: TypeInfo,
    strategy: Strategy,
    scope: Option<Scope>,
    dependencies: Vec<Dependency>,
}

impl Binding {
    /// Binding constructed by the instantiator from its resolved dependencies
    #[must_use]
    pub fn constructor<Inst, Deps>(instantiator: Inst) -> Self
    where
        Inst: Instantiator<Deps>,
        Deps: DependencyResolver + 'static,
    {
        Self {
            provides: TypeInfo::of::<Inst::Provides>(),
            strategy: Strategy::Construct(boxed_instantiator(instantiator)),
            scope: None,
            dependencies: dependencies_of::<Deps>(),
        }
    }

    /// Binding of `T` constructed as `Impl` and converted with [`Into`]
    #[must_use]
    pub fn of_type<T, Impl>() -> Self
    where
        T: Send + Sync + 'static,
        Impl: Injectable + Into<T>,
    {
        Self {
            provides: TypeInfo::of::<T>(),
            strategy: Strategy::Construct(boxed_injectable::<T, Impl>()),
            scope: None,
            dependencies: dependencies_of::<Impl::Deps>(),
        }
    }

    /// Binding to a fixed value, every resolution returns the same instance regardless of the scope
    #[must_use]
    pub fn instance<T: Send + Sync + 'static>(value: T) -> Self {
        Self::shared_instance(Arc::new(value))
    }

    #[must_use]
    pub fn shared_instance<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            provides: TypeInfo::of::<T>(),
            strategy: Strategy::Instance(value),
            scope: None,
            dependencies: Vec::new(),
        }
    }

    /// Binding of `T` to the provider type `P`, which is constructed by injection on every resolution
    #[must_use]
    pub fn provider<T, P>() -> Self
    where
        T: Send + Sync + 'static,
        P: Provider<T> + Injectable,
    {
        Self {
            provides: TypeInfo::of::<T>(),
            strategy: Strategy::ProviderType {
                provider: Arc::new(
                    |injector: &Injector| -> Result<AnyInstance, InstantiatorErrorKind<ResolveErrorKind, InstantiateErrorKind>> {
                        let dependencies = <P::Deps as DependencyResolver>::resolve(injector)
                            .map_err(|err| InstantiatorErrorKind::Deps(err.into()))?;
                        let provider = P::inject(dependencies).map_err(InstantiatorErrorKind::Factory)?;
                        match Provider::<T>::get(&provider) {
                            Ok(instance) => Ok(Arc::new(instance) as AnyInstance),
                            Err(err) => Err(InstantiatorErrorKind::Factory(err)),
                        }
                    },
                ),
                name: Cow::Borrowed(type_name::<P>()),
            },
            scope: None,
            dependencies: dependencies_of::<P::Deps>(),
        }
    }

    /// Binding of `T` to the provider value
    #[must_use]
    pub fn provider_instance<T, P>(provider: P) -> Self
    where
        T: Send + Sync + 'static,
        P: Provider<T>,
    {
        let name = Provider::<T>::name(&provider);
        Self {
            provides: TypeInfo::of::<T>(),
            strategy: Strategy::ProviderInstance {
                provider: Arc::new(move || Provider::<T>::get(&provider).map(|instance| Arc::new(instance) as AnyInstance)),
                name,
            },
            scope: None,
            dependencies: Vec::new(),
        }
    }

    /// Binding resolved as another key of the same type
    #[must_use]
    pub fn alias(target: Key) -> Self {
        Self {
            provides: target.type_info,
            dependencies: vec![Dependency::direct(target.clone())],
            strategy: Strategy::Alias(target),
            scope: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn in_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    #[inline]
    #[must_use]
    pub fn in_singleton_scope(self) -> Self {
        self.in_scope(Scope::Singleton)
    }

    #[inline]
    #[must_use]
    pub fn unscoped(self) -> Self {
        self.in_scope(Scope::Unscoped)
    }

    #[inline]
    #[must_use]
    pub const fn provides(&self) -> TypeInfo {
        self.provides
    }

    /// Injection points requested by the binding, in resolution order
    #[inline]
    #[must_use]
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    #[inline]
    #[must_use]
    pub const fn scope(&self) -> Option<Scope> {
        self.scope
    }

    #[inline]
    pub(crate) const fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    #[inline]
    #[must_use]
    pub(crate) fn with_default_scope(mut self, scope: Scope) -> Self {
        self.scope.get_or_insert(scope);
        self
    }

    /// Scope of a registered binding
    #[inline]
    pub(crate) fn effective_scope(&self) -> Scope {
        self.scope.unwrap_or_default()
    }

    /// Constructs an instance, the dependencies are resolved with the injector
    pub(crate) fn produce(&self, injector: &Injector, key: &Key) -> Result<AnyInstance, ResolveErrorKind> {
        match &self.strategy {
            Strategy::Construct(instantiator) => match instantiator(injector) {
                Ok(instance) => Ok(instance),
                Err(InstantiatorErrorKind::Deps(err)) => Err(err),
                Err(InstantiatorErrorKind::Factory(source)) => Err(ResolveErrorKind::Instantiate { key: key.clone(), source }),
            },
            Strategy::Instance(instance) => Ok(instance.clone()),
            Strategy::ProviderType { provider, name } => match provider(injector) {
                Ok(instance) => Ok(instance),
                Err(InstantiatorErrorKind::Deps(err)) => Err(err),
                Err(InstantiatorErrorKind::Factory(source)) => Err(ResolveErrorKind::Provider {
                    key: key.clone(),
                    provider: name.clone(),
                    source,
                }),
            },
            Strategy::ProviderInstance { provider, name } => provider().map_err(|source| ResolveErrorKind::Provider {
                key: key.clone(),
                provider: name.clone(),
                source,
            }),
            Strategy::Alias(target) => injector.resolve(target),
        }
    }
}

impl Debug for Binding {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("provides", &self.provides.name)
            .field("strategy", &self.strategy.name())
            .field("scope", &self.scope)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// Binding to a fixed value, see [`Binding::instance`]
#[inline]
#[must_use]
pub fn instance<T: Send + Sync + 'static>(value: T) -> Binding {
    Binding::instance(value)
}
