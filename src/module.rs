use ahash::AHasher;
use core::{
    fmt::{self, Display, Formatter},
    hash::{Hash, Hasher},
};
use std::{
    borrow::Cow,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::{any::TypeInfo, binder::Binder, errors::BindErrorKind};

/// Unit of configuration contributing bindings to an injector.
///
/// ```rust
/// use bindery::{Binder, BindErrorKind, Module, ModuleMetadata};
///
/// struct Defaults;
///
/// impl Module for Defaults {
///     fn configure(&self, binder: &mut Binder<'_>) -> Result<(), BindErrorKind> {
///         binder.bind::<u16>().to_instance(8080)
///     }
/// }
///
/// struct Production;
///
/// impl Module for Production {
///     fn configure(&self, binder: &mut Binder<'_>) -> Result<(), BindErrorKind> {
///         binder.bind::<u16>().to_instance(80)
///     }
///
///     fn metadata(&self) -> ModuleMetadata {
///         ModuleMetadata::default().with_name("production").overrides::<Defaults>()
///     }
/// }
/// ```
pub trait Module: Send + Sync + 'static {
    fn configure(&self, binder: &mut Binder<'_>) -> Result<(), BindErrorKind>;

    fn metadata(&self) -> ModuleMetadata {
        ModuleMetadata::default()
    }

    /// Feeds the configuration state the module captured.
    /// Modules of the same type with equal state are the same module, and only the first one is applied.
    fn fingerprint(&self, _state: &mut Fingerprint) {}
}

/// Descriptive metadata of a module and the module types it overrides
#[derive(Debug, Clone, Default)]
pub struct ModuleMetadata {
    pub name: Option<Cow<'static, str>>,
    pub description: Option<Cow<'static, str>>,
    pub overrides: Vec<TypeInfo>,
}

impl ModuleMetadata {
    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<Cow<'static, str>>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Bindings of the module take precedence over bindings of modules of type `M`
    #[inline]
    #[must_use]
    pub fn overrides<M: Module>(self) -> Self {
        self.overrides_type(TypeInfo::of::<M>())
    }

    #[inline]
    #[must_use]
    pub fn overrides_type(mut self, module: TypeInfo) -> Self {
        self.overrides.push(module);
        self
    }
}

/// Hasher of the configuration state of a module
pub struct Fingerprint(AHasher);

impl Fingerprint {
    #[inline]
    #[must_use]
    pub(crate) fn new() -> Self {
        Self(AHasher::default())
    }
}

impl Hasher for Fingerprint {
    #[inline]
    fn finish(&self) -> u64 {
        self.0.finish()
    }

    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        self.0.write(bytes);
    }
}

/// Identity of a module: its type and the fingerprint of its state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId {
    pub type_info: TypeInfo,
    pub fingerprint: u64,
}

impl ModuleId {
    #[inline]
    #[must_use]
    pub const fn new(type_info: TypeInfo, fingerprint: u64) -> Self {
        Self { type_info, fingerprint }
    }

    #[must_use]
    pub fn of<M: Module>(module: &M) -> Self {
        let mut fingerprint = Fingerprint::new();
        module.fingerprint(&mut fingerprint);
        Self::new(TypeInfo::of::<M>(), fingerprint.finish())
    }
}

impl Display for ModuleId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_info.short_name())
    }
}

/// Metadata of a module applied to an injector
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    pub id: ModuleId,
    pub name: Cow<'static, str>,
    pub description: Option<Cow<'static, str>>,
    /// Applied modules overridden by this one
    pub overrides: Vec<ModuleId>,
}

/// Source of identities of closure modules without hashable state
static NEXT_FN_MODULE: AtomicU64 = AtomicU64::new(0);

/// Module defined by a closure
pub struct FnModule<F> {
    configure: F,
    metadata: ModuleMetadata,
    instance: u64,
}

impl<F> FnModule<F> {
    #[inline]
    #[must_use]
    pub fn with_metadata(mut self, metadata: ModuleMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

impl<F> Module for FnModule<F>
where
    F: Fn(&mut Binder<'_>) -> Result<(), BindErrorKind> + Send + Sync + 'static,
{
    #[inline]
    fn configure(&self, binder: &mut Binder<'_>) -> Result<(), BindErrorKind> {
        (self.configure)(binder)
    }

    #[inline]
    fn metadata(&self) -> ModuleMetadata {
        self.metadata.clone()
    }

    #[inline]
    fn fingerprint(&self, state: &mut Fingerprint) {
        self.instance.hash(state);
    }
}

/// Module configured by the closure.
///
/// What the closure captured can't be compared, so every call creates a distinct module,
/// even for the same closure. Use [`fn_module_with_state`] for modules that are the same when their state is equal.
#[inline]
#[must_use]
pub fn fn_module<F>(configure: F) -> FnModule<F>
where
    F: Fn(&mut Binder<'_>) -> Result<(), BindErrorKind> + Send + Sync + 'static,
{
    FnModule {
        configure,
        metadata: ModuleMetadata::default(),
        instance: NEXT_FN_MODULE.fetch_add(1, Ordering::Relaxed),
    }
}

/// Module configured by the closure from the state, modules of the same closure with equal state are the same module
pub struct StatefulModule<S, F> {
    state: S,
    configure: F,
    metadata: ModuleMetadata,
}

impl<S, F> StatefulModule<S, F> {
    #[inline]
    #[must_use]
    pub fn with_metadata(mut self, metadata: ModuleMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

impl<S, F> Module for StatefulModule<S, F>
where
    S: Hash + Send + Sync + 'static,
    F: Fn(&S, &mut Binder<'_>) -> Result<(), BindErrorKind> + Send + Sync + 'static,
{
    #[inline]
    fn configure(&self, binder: &mut Binder<'_>) -> Result<(), BindErrorKind> {
        (self.configure)(&self.state, binder)
    }

    #[inline]
    fn metadata(&self) -> ModuleMetadata {
        self.metadata.clone()
    }

    #[inline]
    fn fingerprint(&self, state: &mut Fingerprint) {
        self.state.hash(state);
    }
}

#[inline]
#[must_use]
pub fn fn_module_with_state<S, F>(state: S, configure: F) -> StatefulModule<S, F>
where
    S: Hash + Send + Sync + 'static,
    F: Fn(&S, &mut Binder<'_>) -> Result<(), BindErrorKind> + Send + Sync + 'static,
{
    StatefulModule {
        state,
        configure,
        metadata: ModuleMetadata::default(),
    }
}
