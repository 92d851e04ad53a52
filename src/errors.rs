mod bind;
mod dependency_resolver;
mod instantiate;
mod instantiator;
mod module;

pub use bind::BindErrorKind;
pub use dependency_resolver::ResolveErrorKind;
pub use instantiate::InstantiateErrorKind;
pub use instantiator::InstantiatorErrorKind;
pub use module::{BuildErrorKind, ModuleErrorKind};
