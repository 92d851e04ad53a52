use std::borrow::Cow;

use super::instantiate::InstantiateErrorKind;
use crate::{
    any::TypeInfo,
    key::{Key, KeyPath},
};

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error(
        "No binding found for {key}{}",
        requested_by.as_ref().map(|key| format!(", requested by {key}")).unwrap_or_default()
    )]
    Unsatisfied { key: Key, requested_by: Option<Key> },
    #[error("Circular dependency detected: {}", KeyPath(path))]
    Circular { path: Vec<Key> },
    #[error("Resolution depth limit ({max_depth}) exceeded while resolving {key}")]
    DepthExceeded { key: Key, max_depth: usize },
    #[error("Incorrect type of {key}. Expected: {expected}")]
    IncorrectType { key: Key, expected: TypeInfo },
    #[error("Failed to instantiate {key}")]
    Instantiate {
        key: Key,
        #[source]
        source: InstantiateErrorKind,
    },
    #[error("Provider {provider} failed to provide {key}")]
    Provider {
        key: Key,
        provider: Cow<'static, str>,
        #[source]
        source: InstantiateErrorKind,
    },
    #[error("Injector was dropped before {key} was resolved")]
    InjectorDropped { key: Key },
}
