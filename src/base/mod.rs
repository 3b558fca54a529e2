//! Foundation types for the configuration engine.
//!
//! This module provides fundamental types used throughout the crate:
//! - [`Key`] - Container keys (string, int, bool, float, bytes, enum)
//! - [`PathPart`], [`parse_path`] - Dotted/bracketed path notation
//! - [`Flag`], [`FlagSet`] - Three-valued container flags
//! - [`Value`] - Plain, language-native configuration values
//! - [`EnumClass`], [`EnumMember`] - Runtime enumeration descriptors
//! - [`ValueKind`] - Declared scalar types
//!
//! This module has NO dependencies on other strata modules.

mod enum_class;
mod flags;
mod key;
mod kind;
mod path;
mod value;

pub use enum_class::{EnumClass, EnumMember};
pub use flags::{Flag, FlagSet};
pub use key::{FloatBits, Key, KeyKind};
pub use kind::ValueKind;
pub use path::{PathPart, format_path, parse_path, push_part};
pub use value::Value;
