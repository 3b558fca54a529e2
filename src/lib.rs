//! # strata-base
//!
//! Core library for hierarchical configuration trees: typed nodes, lazy
//! `${...}` interpolation, and layered merge.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! yaml      → YAML load/dump with ???/interpolation conventions
//!   ↓
//! convert   → projection, resolve-in-place, missing keys, masked copy
//!   ↓
//! merge     → n-ary right-biased layered merge
//!   ↓
//! config    → public Config handle: paths, typed reads, validated writes
//!   ↓
//! eval      → interpolation evaluator (references, resolvers, cycles)
//!   ↓
//! resolver  → copy-on-write registry, oc.* built-ins, memo cache
//!   ↓
//! node      → arena tree: NodeId, scalar payloads, coercion
//!   ↓
//! schema    → structured record declarations (fields, hints, defaults)
//!   ↓
//! grammar   → logos mode-switching lexer, recursive-descent parser
//!   ↓
//! base      → primitives (Key, paths, flags, Value, enums, kinds)
//! ```
//!
//! ## Example
//!
//! ```
//! use strata::{Config, Value};
//!
//! let cfg = Config::from_yaml(
//!     "database_server:\n  port: 1234\ndatabase_client:\n  server_port: ${database_server.port}\n",
//! )
//! .unwrap();
//! assert_eq!(
//!     cfg.get("database_client.server_port").unwrap(),
//!     Value::Int(1234)
//! );
//! ```

/// Foundation types: keys, paths, flags, plain values, enums, kinds
pub mod base;

/// Interpolation grammar: lexer, parser, and AST
pub mod grammar;

/// Structured record declarations
pub mod schema;

/// The arena-backed configuration tree
pub mod node;

/// Resolver registry and built-ins
pub mod resolver;

/// Interpolation evaluator
mod eval;

/// The public Config handle
pub mod config;

/// Layered merge engine
pub mod merge;

/// Container utilities
pub mod convert;

/// YAML serialization
mod yaml;

/// Error taxonomy
pub mod errors;

// Re-export the types most callers need.
pub use base::{EnumClass, EnumMember, Flag, Key, Value, ValueKind};
pub use config::{Config, UpdateOpts, WritableGuard};
pub use convert::{StructuredConfigMode, ToContainerOpts};
pub use errors::{ConfigError, GrammarParseError, InterpolationError, Result};
pub use merge::{ListMergeMode, MergeOptions};
pub use resolver::{ResolverCtx, clear_all, clear_resolver, has_resolver, register, register_with_context};
pub use schema::{FieldDef, FieldDefault, Schema, TypeHint};
