use crate::key::Key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DependencyKind {
    /// Resolved before the instance is constructed
    Direct,
    /// Resolved on demand through a [`crate::Lazy`] handle, so it doesn't take part in cycle detection
    Lazy,
}

/// Injection point descriptor of a binding
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Dependency {
    pub key: Key,
    pub kind: DependencyKind,
}

impl Dependency {
    #[inline]
    #[must_use]
    pub const fn direct(key: Key) -> Self {
        Self {
            key,
            kind: DependencyKind::Direct,
        }
    }

    #[inline]
    #[must_use]
    pub const fn lazy(key: Key) -> Self {
        Self {
            key,
            kind: DependencyKind::Lazy,
        }
    }
}
