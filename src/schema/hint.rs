//! Field type hints.

use std::fmt;
use std::sync::Arc;

use crate::base::{KeyKind, ValueKind};

use super::Schema;

/// The declared type of a schema field.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeHint {
    /// Untyped; accepts anything.
    Any,
    /// A primitive or enum scalar kind.
    Kind(ValueKind),
    /// The wrapped hint, additionally permitting null.
    Optional(Box<TypeHint>),
    /// A list container with an element hint.
    List(Box<TypeHint>),
    /// A map container with a key-kind constraint and element hint.
    Map { key: KeyKind, value: Box<TypeHint> },
    /// A union of primitive kinds; values must match one arm exactly.
    Union(Vec<ValueKind>),
    /// A nested structured record.
    Nested(Arc<Schema>),
}

impl TypeHint {
    /// Whether null is a permitted value under this hint, i.e. whether it
    /// carries an explicit `Optional` wrapper.
    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional(_))
    }

    /// The scalar kind declared by this hint, if it is scalar-shaped.
    /// Container and nested-record hints return `None`.
    pub fn scalar_kind(&self) -> Option<ValueKind> {
        match self {
            Self::Any => Some(ValueKind::Any),
            Self::Kind(kind) => Some(kind.clone()),
            Self::Optional(inner) => inner.scalar_kind(),
            Self::Union(arms) => Some(ValueKind::Union(arms.clone())),
            Self::List(_) | Self::Map { .. } | Self::Nested(_) => None,
        }
    }

    /// The hint with any `Optional` wrapper stripped.
    pub fn unwrap_optional(&self) -> &TypeHint {
        match self {
            Self::Optional(inner) => inner.unwrap_optional(),
            other => other,
        }
    }
}

impl fmt::Display for TypeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Kind(kind) => write!(f, "{kind}"),
            Self::Optional(inner) => write!(f, "optional {inner}"),
            Self::List(elem) => write!(f, "list[{elem}]"),
            Self::Map { key, value } => write!(f, "map[{}, {value}]", key.as_str()),
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
            Self::Nested(schema) => write!(f, "{}", schema.name()),
        }
    }
}
