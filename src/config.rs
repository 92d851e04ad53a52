use crate::scope::Scope;

pub const DEFAULT_MAX_RESOLUTION_DEPTH: usize = 100;

/// Config for an injector
/// ## Fields
/// - `default_scope`:
///   Scope of bindings registered without an explicit one.
///   It's applied at registration, so changing it doesn't affect already registered bindings.
///
/// - `max_resolution_depth`:
///   Maximum length of a dependency chain resolved by one call.
///
/// - `validate_on_build`:
///   If `true`, the registry checks on finalization that every declared injection point has a binding,
///   so missing dependencies fail the build instead of the first resolution.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub default_scope: Scope,
    pub max_resolution_depth: usize,
    pub validate_on_build: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_scope: Scope::Unscoped,
            max_resolution_depth: DEFAULT_MAX_RESOLUTION_DEPTH,
            validate_on_build: false,
        }
    }
}
