use core::any::type_name;
use std::borrow::Cow;

use crate::errors::InstantiateErrorKind;

/// Source of instances of `T` that is bound instead of `T` itself.
///
/// A provider is either bound as a value ([`crate::BindingBuilder::to_provider_instance`])
/// or as a type constructed by injection ([`crate::BindingBuilder::to_provider`]).
pub trait Provider<T>: Send + Sync + 'static {
    fn get(&self) -> Result<T, InstantiateErrorKind>;

    /// Name used in diagnostics
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(type_name::<Self>())
    }
}

impl<T, F> Provider<T> for F
where
    F: Fn() -> Result<T, InstantiateErrorKind> + Send + Sync + 'static,
{
    #[inline]
    fn get(&self) -> Result<T, InstantiateErrorKind> {
        self()
    }
}

/// Provider with an explicit diagnostic name
pub struct Named<P> {
    name: Cow<'static, str>,
    provider: P,
}

impl<P> Named<P> {
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>, provider: P) -> Self {
        Self {
            name: name.into(),
            provider,
        }
    }
}

impl<T, P: Provider<T>> Provider<T> for Named<P> {
    #[inline]
    fn get(&self) -> Result<T, InstantiateErrorKind> {
        self.provider.get()
    }

    #[inline]
    fn name(&self) -> Cow<'static, str> {
        self.name.clone()
    }
}
