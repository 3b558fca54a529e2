//! Declared scalar types.

use std::fmt;
use std::sync::Arc;

use super::enum_class::EnumClass;

/// The declared type of a scalar node.
///
/// `Any` accepts every scalar unchanged; `Union` requires an exact arm match
/// with no cross-arm coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    Any,
    Bool,
    Int,
    Float,
    Str,
    Bytes,
    /// A filesystem path.
    Path,
    Enum(Arc<EnumClass>),
    Union(Vec<ValueKind>),
}

impl ValueKind {
    /// Whether this is the untyped `Any` kind, which accepts every scalar
    /// unchanged.
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Str => write!(f, "str"),
            Self::Bytes => write!(f, "bytes"),
            Self::Path => write!(f, "path"),
            Self::Enum(class) => write!(f, "enum {}", class.name()),
            Self::Union(arms) => {
                write!(f, "union(")?;
                for (i, arm) in arms.iter().enumerate() {
                    if i > 0 {
                        write!(f, "|")?;
                    }
                    write!(f, "{arm}")?;
                }
                write!(f, ")")
            }
        }
    }
}
