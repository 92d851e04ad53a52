use super::bind::BindErrorKind;
use crate::module::ModuleId;

#[derive(thiserror::Error, Debug)]
pub enum ModuleErrorKind {
    #[error(
        "Module override cycle detected: {}",
        path.iter().map(ToString::to_string).collect::<Vec<_>>().join(" -> ")
    )]
    Cycle { path: Vec<ModuleId> },
    #[error("Failed to configure module {module}")]
    Configure {
        module: ModuleId,
        #[source]
        source: BindErrorKind,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum BuildErrorKind {
    #[error(transparent)]
    Module(#[from] ModuleErrorKind),
    #[error(transparent)]
    Bind(#[from] BindErrorKind),
}
