use std::fmt;

/// Linkage of symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Linkage {
    /// Defined in the module and visible from the outside.
    Public,

    /// Defined in the module and only visible inside it.
    #[default]
    Private,

    /// Defined outside of the module.
    External,
}

impl Linkage {
    pub fn is_external(self) -> bool {
        self == Self::External
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Private => write!(f, "private"),
            Self::External => write!(f, "external"),
        }
    }
}
