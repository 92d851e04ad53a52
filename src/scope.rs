/// Lifetime policy of instances produced by a binding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Scope {
    /// New instance on every resolution
    #[default]
    Unscoped,
    /// One instance per injector, constructed at most once
    Singleton,
}

impl Scope {
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Scope::Unscoped => "unscoped",
            Scope::Singleton => "singleton",
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_cached(&self) -> bool {
        matches!(self, Scope::Singleton)
    }
}
