#[macro_use]
pub(crate) mod macros;

pub(crate) mod any;
pub(crate) mod binder;
pub(crate) mod binding;
pub(crate) mod bootstrap;
pub(crate) mod cache;
pub(crate) mod config;
pub(crate) mod cycle;
pub(crate) mod dependency;
pub(crate) mod dependency_resolver;
pub(crate) mod errors;
pub(crate) mod inject;
pub(crate) mod injector;
pub(crate) mod instantiator;
pub(crate) mod key;
pub(crate) mod lazy;
pub(crate) mod module;
pub(crate) mod multibinding;
pub(crate) mod provider;
pub(crate) mod registry;
pub(crate) mod scope;

pub use any::TypeInfo;
pub use binder::{Binder, BindingBuilder};
pub use binding::{instance, Binding};
pub use bootstrap::InjectorBuilder;
pub use config::{Config, DEFAULT_MAX_RESOLUTION_DEPTH};
pub use dependency::{Dependency, DependencyKind};
pub use dependency_resolver::DependencyResolver;
pub use errors::{BindErrorKind, BuildErrorKind, InstantiateErrorKind, InstantiatorErrorKind, ModuleErrorKind, ResolveErrorKind};
pub use inject::{Inject, InjectQualified};
pub use injector::Injector;
pub use instantiator::{Injectable, Instantiator};
pub use key::{Key, Marker, Qualifier, Unqualified};
pub use lazy::{Lazy, LazyQualified};
pub use module::{fn_module, fn_module_with_state, Fingerprint, FnModule, Module, ModuleId, ModuleInfo, ModuleMetadata, StatefulModule};
pub use multibinding::{List, ListBuilder, Map, MapBuilder, Set, SetBuilder};
pub use provider::{Named, Provider};
pub use registry::{Registry, RegistryBuilder, Source};
pub use scope::Scope;
