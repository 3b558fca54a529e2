//! Container keys.
//!
//! Map containers are keyed by [`Key`], which covers the full domain of
//! hashable configuration scalars. List containers use positional indices
//! and only materialize `Key::Int` when reporting paths.

use std::fmt;

use smol_str::SmolStr;

/// An `f64` wrapper with bit-pattern equality so floats can serve as map
/// keys. Two NaNs with identical bit patterns compare equal.
#[derive(Debug, Clone, Copy)]
pub struct FloatBits(pub f64);

impl FloatBits {
    pub fn value(self) -> f64 {
        self.0
    }
}

impl PartialEq for FloatBits {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for FloatBits {}

impl std::hash::Hash for FloatBits {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

/// A key in a map container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Str(SmolStr),
    Int(i64),
    Bool(bool),
    Float(FloatBits),
    Bytes(Vec<u8>),
    /// An enumeration member, identified by class and member name.
    Enum { class: SmolStr, member: SmolStr },
}

/// The kind of a key, used for per-container key-type constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Str,
    Int,
    Bool,
    Float,
    Bytes,
    Enum,
}

impl KeyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::Int => "int",
            Self::Bool => "bool",
            Self::Float => "float",
            Self::Bytes => "bytes",
            Self::Enum => "enum",
        }
    }
}

impl Key {
    /// The kind of this key.
    pub fn kind(&self) -> KeyKind {
        match self {
            Self::Str(_) => KeyKind::Str,
            Self::Int(_) => KeyKind::Int,
            Self::Bool(_) => KeyKind::Bool,
            Self::Float(_) => KeyKind::Float,
            Self::Bytes(_) => KeyKind::Bytes,
            Self::Enum { .. } => KeyKind::Enum,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self::Str(SmolStr::new(s))
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self::Str(SmolStr::new(s))
    }
}

impl From<SmolStr> for Key {
    fn from(s: SmolStr) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Key {
    fn from(i: i32) -> Self {
        Self::Int(i as i64)
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Self::Int(i as i64)
    }
}

impl From<bool> for Key {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Key {
    fn from(f: f64) -> Self {
        Self::Float(FloatBits(f))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Float(bits) => write!(f, "{}", bits.0),
            Self::Bytes(b) => {
                write!(f, "b'")?;
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                write!(f, "'")
            }
            Self::Enum { member, .. } => write!(f, "{member}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_kinds() {
        assert_eq!(Key::from("name").kind(), KeyKind::Str);
        assert_eq!(Key::from(3i64).kind(), KeyKind::Int);
        assert_eq!(Key::from(true).kind(), KeyKind::Bool);
        assert_eq!(Key::from(1.5).kind(), KeyKind::Float);
    }

    #[test]
    fn test_float_bits_equality() {
        assert_eq!(Key::from(1.5), Key::from(1.5));
        assert_ne!(Key::from(1.5), Key::from(2.5));
        assert_eq!(Key::Float(FloatBits(f64::NAN)), Key::Float(FloatBits(f64::NAN)));
    }

    #[test]
    fn test_display() {
        assert_eq!(Key::from("port").to_string(), "port");
        assert_eq!(Key::from(10i64).to_string(), "10");
        assert_eq!(Key::from(false).to_string(), "false");
        let e = Key::Enum {
            class: "Color".into(),
            member: "RED".into(),
        };
        assert_eq!(e.to_string(), "RED");
    }
}
