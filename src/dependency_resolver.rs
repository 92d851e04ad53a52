use crate::{dependency::Dependency, errors::ResolveErrorKind, injector::Injector};

/// Statically declared injection point.
///
/// Implemented by [`crate::Inject`], [`crate::InjectQualified`], [`crate::Lazy`], [`crate::LazyQualified`], [`Injector`]
/// and by tuples of them, which are resolved left to right.
pub trait DependencyResolver: Sized {
    type Error: Into<ResolveErrorKind>;

    fn resolve(injector: &Injector) -> Result<Self, Self::Error>;

    /// Pushes descriptors of the keys requested by [`Self::resolve`], in resolution order
    fn dependencies(dependencies: &mut Vec<Dependency>);
}

#[must_use]
pub(crate) fn dependencies_of<Deps: DependencyResolver>() -> Vec<Dependency> {
    let mut dependencies = Vec::new();
    Deps::dependencies(&mut dependencies);
    dependencies
}

impl DependencyResolver for Injector {
    type Error = ResolveErrorKind;

    #[inline]
    fn resolve(injector: &Injector) -> Result<Self, Self::Error> {
        Ok(injector.clone())
    }

    #[inline]
    fn dependencies(_dependencies: &mut Vec<Dependency>) {}
}

macro_rules! impl_dependency_resolver {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case, unused_mut)]
        impl<$($ty,)*> DependencyResolver for ($($ty,)*)
        where
            $( $ty: DependencyResolver, )*
        {
            type Error = ResolveErrorKind;

            #[inline]
            #[allow(unused_variables)]
            fn resolve(injector: &Injector) -> Result<Self, Self::Error> {
                Ok(($($ty::resolve(injector).map_err(Into::into)?,)*))
            }

            #[inline]
            #[allow(unused_variables)]
            fn dependencies(dependencies: &mut Vec<Dependency>) {
                $( $ty::dependencies(dependencies); )*
            }
        }
    };
}

all_the_tuples!(impl_dependency_resolver);

#[cfg(test)]
mod tests {
    use super::{dependencies_of, DependencyResolver};
    use crate::{
        dependency::{Dependency, DependencyKind},
        errors::InstantiateErrorKind,
        inject::{Inject, InjectQualified},
        key::{Key, Marker},
        lazy::Lazy,
        Injector, Registry, RegistryBuilder,
    };

    use parking_lot::Mutex;
    use std::sync::Arc;
    use tracing_test::traced_test;

    struct Primary;

    impl Marker for Primary {}

    #[test]
    #[allow(dead_code)]
    fn test_dependency_resolver_impls() {
        fn resolver<T: DependencyResolver>() {}
        fn resolver_with_dep<Dep: Send + Sync + 'static>() {
            resolver::<Inject<Dep>>();
            resolver::<Lazy<Dep>>();
            resolver::<(Inject<Dep>, Lazy<Dep>, InjectQualified<Dep, Primary>)>();
            resolver::<(Injector, Inject<Dep>)>();
        }
    }

    #[test]
    fn test_dependencies_declaration_order() {
        let dependencies = dependencies_of::<(Inject<u8>, Lazy<u16>, InjectQualified<u32, Primary>, Injector)>();

        assert_eq!(
            dependencies,
            [
                Dependency::direct(Key::of::<u8>()),
                Dependency::lazy(Key::of::<u16>()),
                Dependency::direct(Key::marked::<u32, Primary>()),
            ]
        );
        assert_eq!(dependencies[1].kind, DependencyKind::Lazy);
    }

    #[test]
    #[traced_test]
    fn test_resolve_declaration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut builder = RegistryBuilder::default();
        builder
            .binder()
            .bind::<u8>()
            .to_constructor({
                let order = order.clone();
                move || {
                    order.lock().push("u8");
                    Ok::<_, InstantiateErrorKind>(1)
                }
            })
            .unwrap();
        builder
            .binder()
            .bind::<u16>()
            .to_constructor({
                let order = order.clone();
                move || {
                    order.lock().push("u16");
                    Ok::<_, InstantiateErrorKind>(2)
                }
            })
            .unwrap();
        let registry: Registry = builder.finalize().unwrap();
        let injector = Injector::new(registry);

        let (Inject(a), Inject(b)) = <(Inject<u16>, Inject<u8>)>::resolve(&injector).unwrap();

        assert_eq!((*a, *b), (2, 1));
        assert_eq!(*order.lock(), ["u16", "u8"]);
    }
}
