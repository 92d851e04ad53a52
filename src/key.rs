use std::borrow::Cow;

use core::fmt::{self, Display, Formatter};

use crate::any::TypeInfo;

/// Discriminator between several bindings of the same type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Qualifier {
    Named(Cow<'static, str>),
    Marker(TypeInfo),
}

impl Qualifier {
    #[inline]
    #[must_use]
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Named(name.into())
    }

    #[inline]
    #[must_use]
    pub fn marker<M: ?Sized + 'static>() -> Self {
        Self::Marker(TypeInfo::of::<M>())
    }
}

impl Display for Qualifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Qualifier::Named(name) => write!(f, "\"{name}\""),
            Qualifier::Marker(type_info) => write!(f, "@{}", type_info.short_name()),
        }
    }
}

/// Statically declared qualifier of an injection point.
///
/// Any `'static` type can be a marker, the default qualifier is the identity of the marker type:
/// ```rust
/// use bindery::Marker;
///
/// struct ExtraCommands;
///
/// impl Marker for ExtraCommands {}
/// ```
pub trait Marker: 'static {
    #[must_use]
    fn qualifier() -> Option<Qualifier> {
        Some(Qualifier::marker::<Self>())
    }
}

/// Marker of injection points without a qualifier
pub struct Unqualified;

impl Marker for Unqualified {
    #[inline]
    fn qualifier() -> Option<Qualifier> {
        None
    }
}

/// Identity of a bindable dependency
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key {
    pub type_info: TypeInfo,
    pub qualifier: Option<Qualifier>,
}

impl Key {
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_info: TypeInfo::of::<T>(),
            qualifier: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn qualified<T: ?Sized + 'static>(qualifier: Qualifier) -> Self {
        Self {
            type_info: TypeInfo::of::<T>(),
            qualifier: Some(qualifier),
        }
    }

    #[inline]
    #[must_use]
    pub fn named<T: ?Sized + 'static>(name: impl Into<Cow<'static, str>>) -> Self {
        Self::qualified::<T>(Qualifier::named(name))
    }

    #[inline]
    #[must_use]
    pub fn marked<T: ?Sized + 'static, M: Marker>() -> Self {
        Self {
            type_info: TypeInfo::of::<T>(),
            qualifier: M::qualifier(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_qualifier(self, qualifier: Option<Qualifier>) -> Self {
        Self { qualifier, ..self }
    }

    #[inline]
    #[must_use]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.type_info.is::<T>()
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{}[{qualifier}]", self.type_info.name),
            None => f.write_str(self.type_info.name),
        }
    }
}

pub(crate) struct KeyPath<'a>(pub(crate) &'a [Key]);

impl Display for KeyPath<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (index, key) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}
