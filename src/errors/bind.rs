use crate::{any::TypeInfo, key::Key, module::ModuleId, registry::Source};

#[derive(thiserror::Error, Debug)]
pub enum BindErrorKind {
    #[error("Duplicate binding for {key}: bound by {existing} and by {duplicate}, neither overrides the other")]
    DuplicateBinding { key: Key, existing: Source, duplicate: Source },
    #[error("Duplicate map key {map_key} in {key}: contributed by {existing} and by {duplicate}, neither overrides the other")]
    DuplicateMapKey {
        key: Key,
        map_key: String,
        existing: Source,
        duplicate: Source,
    },
    #[error("{key} is bound both as a single binding and as a multibinding")]
    AggregateConflict { key: Key },
    #[error("Binding registered for {key} provides {actual}")]
    IncorrectType { key: Key, actual: TypeInfo },
    #[error("No binding found for {key}, requested by {requested_by}")]
    Unsatisfied { key: Key, requested_by: Key },
    #[error("Registry is finalized, {key} can't be bound")]
    Finalized { key: Key },
    #[error("Registry is finalized, override of {overridden} by {overriding} can't be declared")]
    FinalizedOverride { overriding: ModuleId, overridden: ModuleId },
    #[error("Override relation between bindings of {key} is cyclic")]
    AmbiguousOverride { key: Key },
}
