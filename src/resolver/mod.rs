//! The resolver registry: named callables invoked from interpolations.
//!
//! The registry is the only process-wide mutable state in the engine. It
//! uses copy-on-write semantics: every mutation installs a fresh `Arc`'d
//! table, and an evaluation snapshots the current `Arc` at entry so mid
//! resolve mutations are never observable.
//!
//! Built-in resolvers live under the reserved `oc.` namespace and are
//! installed at first use; [`clear_all`] restores them for test isolation.

mod builtins;

use std::sync::{Arc, LazyLock};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::base::Value;
use crate::errors::{ConfigError, Result};

/// Context handed to context-aware resolvers: a window onto the tree that
/// anchors the evaluation.
///
/// Projections of the parent and root are raw (interpolations verbatim,
/// `???` for missing) so that building them cannot re-enter the node
/// currently being resolved; [`ResolverCtx::select`] resolves the selected
/// subtree.
pub trait ResolverCtx {
    /// Resolve a dotted path against the root. Structural absence and a
    /// missing (`???`) target yield `Ok(None)`; other failures propagate.
    fn select(&mut self, path: &str) -> Result<Option<Value>>;

    /// Raw projection of the anchor's parent container.
    fn parent(&mut self) -> Result<Option<Value>>;

    /// Raw projection of the root.
    fn root(&mut self) -> Result<Value>;

    /// Parse a string through the Element grammar and evaluate it.
    fn decode(&mut self, text: &str) -> Result<Value>;

    /// Full key of the node being resolved.
    fn anchor_key(&self) -> String;
}

/// The two callable shapes a resolver may take.
#[derive(Clone)]
pub enum ResolverFn {
    /// A plain function of its evaluated arguments.
    Plain(Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>),
    /// A function that additionally receives the evaluation context.
    WithContext(Arc<dyn Fn(&mut dyn ResolverCtx, &[Value]) -> Result<Value> + Send + Sync>),
}

/// A registered resolver.
#[derive(Clone)]
pub struct ResolverEntry {
    pub(crate) func: ResolverFn,
    pub(crate) use_cache: bool,
}

/// An immutable resolver table.
#[derive(Clone, Default)]
pub struct Registry {
    entries: FxHashMap<String, ResolverEntry>,
}

impl Registry {
    fn with_builtins() -> Self {
        let mut registry = Self::default();
        builtins::install(&mut registry.entries);
        registry
    }

    pub fn get(&self, name: &str) -> Option<&ResolverEntry> {
        self.entries.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}

static REGISTRY: LazyLock<RwLock<Arc<Registry>>> =
    LazyLock::new(|| RwLock::new(Arc::new(Registry::with_builtins())));

/// Memoization cache for `use_cache` resolvers, keyed by resolver name and
/// the normalized textual argument list. Invalidated on registry mutation.
static CACHE: LazyLock<Mutex<FxHashMap<(String, String), Value>>> =
    LazyLock::new(|| Mutex::new(FxHashMap::default()));

/// Snapshot the registry for one evaluation.
pub(crate) fn snapshot() -> Arc<Registry> {
    REGISTRY.read().clone()
}

/// Register a plain resolver.
///
/// Fails if `name` is already registered unless `replace` is true.
/// `use_cache` opts into memoization keyed by the textual argument list, so
/// `${r:0,1}` and `${r:0, 1}` hit the same entry.
pub fn register(
    name: &str,
    func: impl Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    replace: bool,
    use_cache: bool,
) -> Result<()> {
    register_entry(
        name,
        ResolverEntry {
            func: ResolverFn::Plain(Arc::new(func)),
            use_cache,
        },
        replace,
    )
}

/// Register a context-aware resolver (receives parent/root access).
pub fn register_with_context(
    name: &str,
    func: impl Fn(&mut dyn ResolverCtx, &[Value]) -> Result<Value> + Send + Sync + 'static,
    replace: bool,
    use_cache: bool,
) -> Result<()> {
    register_entry(
        name,
        ResolverEntry {
            func: ResolverFn::WithContext(Arc::new(func)),
            use_cache,
        },
        replace,
    )
}

fn register_entry(name: &str, entry: ResolverEntry, replace: bool) -> Result<()> {
    validate_name(name)?;
    let mut guard = REGISTRY.write();
    if guard.has(name) && !replace {
        return Err(ConfigError::validation(
            name,
            name,
            "unregistered resolver name (already registered; pass replace)",
        ));
    }
    let mut next = Registry::clone(&guard);
    next.entries.insert(name.to_string(), entry);
    *guard = Arc::new(next);
    CACHE.lock().clear();
    Ok(())
}

/// Whether a resolver is registered.
pub fn has_resolver(name: &str) -> bool {
    REGISTRY.read().has(name)
}

/// Remove one resolver. Returns whether it existed.
pub fn clear_resolver(name: &str) -> bool {
    let mut guard = REGISTRY.write();
    if !guard.has(name) {
        return false;
    }
    let mut next = Registry::clone(&guard);
    next.entries.remove(name);
    *guard = Arc::new(next);
    CACHE.lock().clear();
    true
}

/// Drop all custom resolvers and restore the built-ins.
pub fn clear_all() {
    let mut guard = REGISTRY.write();
    *guard = Arc::new(Registry::with_builtins());
    CACHE.lock().clear();
}

pub(crate) fn cache_lookup(name: &str, raw_args: &str) -> Option<Value> {
    CACHE.lock().get(&(name.to_string(), raw_args.to_string())).cloned()
}

pub(crate) fn cache_store(name: &str, raw_args: &str, value: Value) {
    CACHE
        .lock()
        .insert((name.to_string(), raw_args.to_string()), value);
}

/// Resolver names are dot-joined identifier sequences.
fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.split('.').all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
                && !part.starts_with(|c: char| c.is_ascii_digit())
        });
    if valid {
        Ok(())
    } else {
        Err(ConfigError::validation(
            name,
            name,
            "resolver name (dot-joined identifiers)",
        ))
    }
}
