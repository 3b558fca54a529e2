//! Error types for configuration operations.
//!
//! Errors fall into four families:
//! - Structural: bad path, index out of bounds, struct-mode violation.
//! - Validation: type/value mismatch during assignment, merge, or binding.
//! - Interpolation: grammar failure, cycle, missing target, failing resolver.
//! - Mandatory-missing: reading a `???` scalar through a strict accessor.
//!
//! Every error carries the full key path from the root so callers can report
//! the offending node without re-walking the tree.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Top-level error type for all configuration operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    /// A map key or list index does not exist.
    #[error("key error at '{full_key}': {message}")]
    Key { full_key: String, message: String },

    /// A write would add or remove a field on a struct-locked container.
    #[error("attribute error at '{full_key}': {message}")]
    Attribute { full_key: String, message: String },

    /// A node has the wrong shape for the requested operation.
    #[error("type error at '{full_key}': expected {expected}, found {actual}")]
    Type {
        full_key: String,
        expected: String,
        actual: String,
    },

    /// A value cannot be coerced to the declared type of its node.
    #[error("validation error at '{full_key}': value '{value}' is not a valid {expected}")]
    Validation {
        full_key: String,
        value: String,
        expected: String,
    },

    /// A mutation was attempted on a read-only subtree.
    #[error("read-only error at '{full_key}': {message}")]
    Readonly { full_key: String, message: String },

    /// A mandatory (`???`) value was read through a strict accessor.
    #[error("missing mandatory value at '{full_key}'")]
    MissingMandatory { full_key: String },

    /// An interpolation produced a value the enclosing node cannot hold.
    #[error("unsupported interpolation type at '{full_key}': {message}")]
    UnsupportedInterpolationType { full_key: String, message: String },

    /// Any failure while resolving an interpolation expression.
    #[error(transparent)]
    Interpolation(#[from] InterpolationError),

    /// The interpolation grammar rejected an expression.
    #[error(transparent)]
    Grammar(#[from] GrammarParseError),
}

/// Failures raised while resolving `${...}` expressions.
///
/// All variants are reachable through [`ConfigError::Interpolation`] so that
/// callers can catch the whole family with a single match arm.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InterpolationError {
    /// A referenced key does not exist, or a relative reference climbed past
    /// the root.
    #[error("interpolation key error at '{full_key}': {message}")]
    Key { full_key: String, message: String },

    /// The resolved value failed validation against the declared type.
    #[error("interpolation validation error at '{full_key}': {message}")]
    Validation { full_key: String, message: String },

    /// The interpolation target is itself a mandatory `???` value.
    #[error("interpolation at '{full_key}' points to missing value '{target}'")]
    ToMissing { full_key: String, target: String },

    /// Reference resolution re-entered a node already being resolved.
    #[error("interpolation cycle detected at '{full_key}': {chain}")]
    Cycle { full_key: String, chain: String },

    /// A resolver was not found or returned an error.
    #[error("resolver error at '{full_key}' in '{resolver}': {message}")]
    Resolver {
        full_key: String,
        resolver: String,
        message: String,
    },
}

/// A syntax error from the interpolation grammar, with a byte offset into the
/// offending expression text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("grammar parse error at offset {offset}: {message} (in '{text}')")]
pub struct GrammarParseError {
    pub message: String,
    pub offset: usize,
    pub text: String,
}

impl ConfigError {
    /// Create a key error.
    pub fn key(full_key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Key {
            full_key: full_key.into(),
            message: message.into(),
        }
    }

    /// Create a struct-mode attribute error.
    pub fn attribute(full_key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Attribute {
            full_key: full_key.into(),
            message: message.into(),
        }
    }

    /// Create a type error.
    pub fn type_error(
        full_key: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::Type {
            full_key: full_key.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a validation error from the offending raw value.
    pub fn validation(
        full_key: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::Validation {
            full_key: full_key.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// Create a read-only violation error.
    pub fn readonly(full_key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Readonly {
            full_key: full_key.into(),
            message: message.into(),
        }
    }

    /// Create a missing-mandatory-value error.
    pub fn missing(full_key: impl Into<String>) -> Self {
        Self::MissingMandatory {
            full_key: full_key.into(),
        }
    }

    /// Check whether this error is a structural absence (missing key or
    /// index) as opposed to a validation or interpolation failure.
    ///
    /// Operations with a `default` parameter convert only structural absence
    /// into the default; everything else propagates.
    pub fn is_structural_absence(&self) -> bool {
        matches!(self, Self::Key { .. } | Self::Attribute { .. })
    }

    /// The full key path carried by this error, if any.
    pub fn full_key(&self) -> Option<&str> {
        match self {
            Self::Key { full_key, .. }
            | Self::Attribute { full_key, .. }
            | Self::Type { full_key, .. }
            | Self::Validation { full_key, .. }
            | Self::Readonly { full_key, .. }
            | Self::MissingMandatory { full_key }
            | Self::UnsupportedInterpolationType { full_key, .. } => Some(full_key),
            Self::Interpolation(err) => err.full_key(),
            Self::Grammar(_) => None,
        }
    }
}

impl InterpolationError {
    /// Create an interpolation key error.
    pub fn key(full_key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Key {
            full_key: full_key.into(),
            message: message.into(),
        }
    }

    /// Create an interpolation validation error.
    pub fn validation(full_key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            full_key: full_key.into(),
            message: message.into(),
        }
    }

    /// Create an interpolation-to-missing error.
    pub fn to_missing(full_key: impl Into<String>, target: impl Into<String>) -> Self {
        Self::ToMissing {
            full_key: full_key.into(),
            target: target.into(),
        }
    }

    /// Create a resolver failure error.
    pub fn resolver(
        full_key: impl Into<String>,
        resolver: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Resolver {
            full_key: full_key.into(),
            resolver: resolver.into(),
            message: message.into(),
        }
    }

    /// The full key path carried by this error.
    pub fn full_key(&self) -> Option<&str> {
        match self {
            Self::Key { full_key, .. }
            | Self::Validation { full_key, .. }
            | Self::ToMissing { full_key, .. }
            | Self::Cycle { full_key, .. }
            | Self::Resolver { full_key, .. } => Some(full_key),
        }
    }
}

impl GrammarParseError {
    /// Create a grammar error at a byte offset within the expression text.
    pub fn new(message: impl Into<String>, offset: usize, text: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            offset,
            text: text.into(),
        }
    }
}
