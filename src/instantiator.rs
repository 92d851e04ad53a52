use std::sync::Arc;
use tracing::debug;

use super::{
    dependency_resolver::DependencyResolver,
    errors::{InstantiateErrorKind, InstantiatorErrorKind, ResolveErrorKind},
};
use crate::{any::AnyInstance, injector::Injector};

/// Construction recipe of a type from its injection points.
///
/// Implemented for closures whose arguments are [`DependencyResolver`]s:
/// ```rust
/// use bindery::{Inject, InstantiateErrorKind, Instantiator};
///
/// struct Config;
/// struct Server(std::sync::Arc<Config>);
///
/// fn check<Deps: bindery::DependencyResolver>(_: impl Instantiator<Deps>) {}
///
/// check(|Inject(config): Inject<Config>| Ok::<_, InstantiateErrorKind>(Server(config)));
/// ```
pub trait Instantiator<Deps>: Send + Sync + 'static
where
    Deps: DependencyResolver,
{
    type Provides: Send + Sync + 'static;
    type Error: Into<InstantiateErrorKind>;

    fn instantiate(&self, dependencies: Deps) -> Result<Self::Provides, Self::Error>;
}

/// A type that knows how to construct itself from its injection points
pub trait Injectable: Sized + Send + Sync + 'static {
    type Deps: DependencyResolver + 'static;

    fn inject(dependencies: Self::Deps) -> Result<Self, InstantiateErrorKind>;
}

pub(crate) type BoxedInstantiator =
    Arc<dyn Fn(&Injector) -> Result<AnyInstance, InstantiatorErrorKind<ResolveErrorKind, InstantiateErrorKind>> + Send + Sync>;

#[must_use]
pub(crate) fn boxed_instantiator<Inst, Deps>(instantiator: Inst) -> BoxedInstantiator
where
    Inst: Instantiator<Deps>,
    Deps: DependencyResolver + 'static,
{
    Arc::new(move |injector: &Injector| -> Result<AnyInstance, InstantiatorErrorKind<ResolveErrorKind, InstantiateErrorKind>> {
        let dependencies = match Deps::resolve(injector) {
            Ok(dependencies) => dependencies,
            Err(err) => return Err(InstantiatorErrorKind::Deps(err.into())),
        };
        let dependency = match instantiator.instantiate(dependencies) {
            Ok(dependency) => dependency,
            Err(err) => return Err(InstantiatorErrorKind::Factory(err.into())),
        };

        debug!("Instantiated");

        Ok(Arc::new(dependency) as AnyInstance)
    })
}

/// Instantiator of `Impl` converted into the bound type `T`
#[must_use]
pub(crate) fn boxed_injectable<T, Impl>() -> BoxedInstantiator
where
    T: Send + Sync + 'static,
    Impl: Injectable + Into<T>,
{
    boxed_instantiator(|dependencies: Impl::Deps| Impl::inject(dependencies).map(Into::<T>::into))
}

macro_rules! impl_instantiator {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case)]
        impl<F, Response, Err, $($ty,)*> Instantiator<($($ty,)*)> for F
        where
            F: Fn($($ty,)*) -> Result<Response, Err> + Send + Sync + 'static,
            Response: Send + Sync + 'static,
            Err: Into<InstantiateErrorKind>,
            $( $ty: DependencyResolver, )*
        {
            type Provides = Response;
            type Error = Err;

            #[inline]
            fn instantiate(&self, ($($ty,)*): ($($ty,)*)) -> Result<Self::Provides, Self::Error> {
                self($($ty,)*)
            }
        }
    };
}

all_the_tuples!(impl_instantiator);

/// Creates a `Box<dyn Trait>` from a value, optionally including supertraits.
///
/// # Syntax
/// ```text
/// boxed!(value; Trait [+ SuperTrait1 [+ SuperTrait2 ...]])
/// ```
///
/// # Examples
/// ```rust
/// use bindery::boxed;
///
/// trait UserRepo {}
///
/// struct PostgresUserRepo;
///
/// impl UserRepo for PostgresUserRepo {}
///
/// let repo: Box<dyn UserRepo + Send + Sync> = boxed!(PostgresUserRepo; UserRepo + Send + Sync);
/// ```
#[macro_export]
macro_rules! boxed {
    ($val:expr ; $trait:tt $($super_traits:tt)*) => {{
        Box::new($val) as Box<dyn $r#trait $($super_traits)*>
    }};
}

#[cfg(test)]
mod tests {
    use super::{boxed_injectable, boxed_instantiator, DependencyResolver, Injectable, InstantiateErrorKind, Instantiator};
    use crate::{errors::InstantiatorErrorKind, inject::Inject, Injector, RegistryBuilder, Scope};

    use std::sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    };
    use tracing::debug;
    use tracing_test::traced_test;

    struct Request(bool);
    struct Response(bool);

    #[test]
    #[allow(dead_code)]
    fn test_factory_helper() {
        fn resolver<Deps: DependencyResolver, F: Instantiator<Deps>>(_f: F) {}
        fn resolver_with_dep<Deps: DependencyResolver>() {
            resolver(|| Ok::<_, InstantiateErrorKind>(()));
        }
    }

    #[test]
    #[traced_test]
    fn test_boxed_instantiator() {
        let instantiator_request_call_count = Arc::new(AtomicU8::new(0));
        let instantiator_response_call_count = Arc::new(AtomicU8::new(0));

        let mut builder = RegistryBuilder::default();
        builder
            .binder()
            .bind::<Request>()
            .in_scope(Scope::Singleton)
            .to_constructor({
                let instantiator_request_call_count = instantiator_request_call_count.clone();
                move || {
                    instantiator_request_call_count.fetch_add(1, Ordering::SeqCst);

                    debug!("Call instantiator request");
                    Ok::<_, InstantiateErrorKind>(Request(true))
                }
            })
            .unwrap();
        let injector = Injector::new(builder.finalize().unwrap());

        let instantiator_response = boxed_instantiator({
            let instantiator_response_call_count = instantiator_response_call_count.clone();
            move |val_1: Inject<Request>, val_2: Inject<Request>| {
                assert!(Arc::ptr_eq(&val_1.0, &val_2.0));

                instantiator_response_call_count.fetch_add(1, Ordering::SeqCst);

                debug!("Call instantiator response");
                Ok::<_, InstantiateErrorKind>(Response(val_1.0 .0))
            }
        });

        let response_1 = instantiator_response(&injector).unwrap();
        let response_2 = instantiator_response(&injector).unwrap();

        assert!(response_1.downcast::<Response>().unwrap().0);
        assert!(response_2.downcast::<Response>().unwrap().0);
        assert_eq!(instantiator_request_call_count.load(Ordering::SeqCst), 1);
        // The outer instantiator isn't cached here, caching is done by the injector
        assert_eq!(instantiator_response_call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    #[traced_test]
    fn test_boxed_instantiator_errors() {
        let injector = Injector::new(RegistryBuilder::default().finalize().unwrap());

        let missing_dependency = boxed_instantiator(|Inject(request): Inject<Request>| Ok::<_, InstantiateErrorKind>(Response(request.0)));
        let failing = boxed_instantiator(|| Err::<Response, _>(InstantiateErrorKind::Custom(anyhow::anyhow!("unavailable"))));

        assert!(matches!(missing_dependency(&injector), Err(InstantiatorErrorKind::Deps(_))));
        assert!(matches!(failing(&injector), Err(InstantiatorErrorKind::Factory(_))));
    }

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_owned()
        }
    }

    impl Injectable for English {
        type Deps = ();

        fn inject((): ()) -> Result<Self, InstantiateErrorKind> {
            Ok(Self)
        }
    }

    impl From<English> for Box<dyn Greeter> {
        fn from(value: English) -> Self {
            boxed!(value; Greeter)
        }
    }

    #[test]
    fn test_boxed_injectable() {
        let injector = Injector::new(RegistryBuilder::default().finalize().unwrap());

        let instance = boxed_injectable::<Box<dyn Greeter>, English>()(&injector).unwrap();

        assert_eq!(instance.downcast::<Box<dyn Greeter>>().unwrap().greet(), "hello");
    }
}
