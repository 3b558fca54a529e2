//! Container utilities: projection to plain values, eager resolution,
//! missing-key enumeration, and masked copies.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;

use crate::base::Value;
use crate::config::Config;
use crate::errors::{ConfigError, Result};
use crate::eval::Evaluator;
use crate::node::{NodeId, Payload, ScalarValue, Tree};

/// How schema-bound subtrees project in [`Config::to_container`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StructuredConfigMode {
    /// Project to a plain map (default).
    #[default]
    Plain,
    /// Same projection; the schema reference stays with the tree, so
    /// re-creating from the output reattaches no schema.
    Keep,
    /// Project to a plain map, forcing interpolation resolution under the
    /// schema subtree regardless of the outer `resolve` flag. Pair with
    /// [`Config::to_typed`] to materialize a record type.
    Instantiate,
}

/// Options for [`Config::to_container`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ToContainerOpts {
    /// Resolve interpolations instead of emitting them verbatim.
    pub resolve: bool,
    /// Raise on `???` values instead of emitting the literal `???`.
    pub throw_on_missing: bool,
    pub sc_mode: StructuredConfigMode,
}

impl Config {
    /// Project the tree to a plain value.
    pub fn to_container(&self, opts: &ToContainerOpts) -> Result<Value> {
        let mut eval = Evaluator::new(&self.tree);
        project(&self.tree, self.tree.root(), opts, &mut eval, false)
    }

    /// Build a configuration from any serializable record, routing through
    /// the YAML data model.
    pub fn from_serialize<T: serde::Serialize>(value: &T) -> Result<Config> {
        let yaml = serde_yaml::to_value(value).map_err(|err| {
            ConfigError::validation("", err.to_string(), std::any::type_name::<T>())
        })?;
        crate::yaml::load_yaml_value(&yaml)
    }

    /// Materialize the configuration as a typed record via serde. Forces
    /// full resolution and raises on missing values.
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T> {
        let opts = ToContainerOpts {
            resolve: true,
            throw_on_missing: true,
            sc_mode: StructuredConfigMode::Instantiate,
        };
        let value = self.to_container(&opts)?;
        let yaml = crate::yaml::value_to_yaml(&value);
        serde_yaml::from_value(yaml).map_err(|err| {
            ConfigError::validation("", err.to_string(), std::any::type_name::<T>())
        })
    }

    /// Eagerly evaluate every interpolation in place, replacing each
    /// expression node with its resolved value. Resolution is computed
    /// before any mutation, so a failure leaves the tree unchanged.
    pub fn resolve_in_place(&mut self) -> Result<()> {
        let mut expressions = Vec::new();
        collect_expressions(&self.tree, self.tree.root(), &mut expressions);

        let mut resolved = Vec::with_capacity(expressions.len());
        {
            let mut eval = Evaluator::new(&self.tree);
            for id in expressions {
                resolved.push((id, eval.scalar_value(id)?));
            }
        }
        for (id, value) in resolved {
            match ScalarValue::from_plain(&value) {
                Some(scalar) => {
                    self.tree
                        .node_mut(id)
                        .as_scalar_mut()
                        .expect("expression node")
                        .value = scalar;
                }
                None => {
                    // A reference to a container: the node becomes one.
                    let built = self.tree.build_plain(&value);
                    self.tree.adopt_payload(id, built);
                }
            }
        }
        Ok(())
    }

    /// The full key of every descendant scalar holding `???`, including
    /// list indices (`foo.bar[2]`).
    pub fn missing_keys(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        collect_missing(&self.tree, self.tree.root(), &mut out);
        out
    }

    /// A copy restricted to the named top-level keys, preserving declared
    /// types and flags. Keys that do not exist are skipped.
    pub fn masked_copy<S: AsRef<str>>(&self, keys: &[S]) -> Result<Config> {
        if !self.tree.node(self.tree.root()).is_map() {
            return Err(ConfigError::type_error(
                "",
                "map",
                self.tree.node(self.tree.root()).payload.kind_name(),
            ));
        }
        let mut tree = Tree::new();
        let root = tree.root();
        let root_flags = *self.tree.node(self.tree.root()).flags();
        tree.node_mut(root).flags = root_flags;
        for key in keys {
            let key = crate::base::Key::from(key.as_ref());
            if let Some(child) = self.tree.child(self.tree.root(), &key) {
                let copy = tree.import_subtree(&self.tree, child);
                tree.attach_map_entry(root, key, copy);
            }
        }
        Ok(Config::from_tree(tree))
    }
}

/// Raw plain projection: interpolations verbatim, `???` for missing.
pub(crate) fn project_raw(tree: &Tree, id: NodeId) -> Value {
    match &tree.node(id).payload {
        Payload::Scalar(scalar) => match &scalar.value {
            ScalarValue::Missing => Value::Str("???".into()),
            ScalarValue::Interp(text) => Value::Str(text.clone()),
            concrete => concrete.to_plain().expect("concrete scalar"),
        },
        Payload::Map(map) => Value::Map(
            map.entries
                .iter()
                .map(|(key, child)| (key.clone(), project_raw(tree, *child)))
                .collect(),
        ),
        Payload::List(list) => Value::List(
            list.items
                .iter()
                .map(|child| project_raw(tree, *child))
                .collect(),
        ),
    }
}

fn project(
    tree: &Tree,
    id: NodeId,
    opts: &ToContainerOpts,
    eval: &mut Evaluator<'_>,
    forced: bool,
) -> Result<Value> {
    let resolve = opts.resolve || forced;
    match &tree.node(id).payload {
        Payload::Scalar(scalar) => match &scalar.value {
            ScalarValue::Missing => {
                if opts.throw_on_missing {
                    Err(ConfigError::missing(tree.full_key(id)))
                } else {
                    Ok(Value::Str("???".into()))
                }
            }
            ScalarValue::Interp(text) => {
                if resolve {
                    eval.scalar_value(id)
                } else {
                    Ok(Value::Str(text.clone()))
                }
            }
            concrete => Ok(concrete.to_plain().expect("concrete scalar")),
        },
        Payload::Map(map) => {
            let forced = forced
                || (opts.sc_mode == StructuredConfigMode::Instantiate && map.schema.is_some());
            let entries: Vec<_> = map.entries.iter().map(|(k, v)| (k.clone(), *v)).collect();
            let mut out = IndexMap::with_capacity(entries.len());
            for (key, child) in entries {
                out.insert(key, project(tree, child, opts, eval, forced)?);
            }
            Ok(Value::Map(out))
        }
        Payload::List(list) => {
            let items = list.items.clone();
            let mut out = Vec::with_capacity(items.len());
            for child in items {
                out.push(project(tree, child, opts, eval, forced)?);
            }
            Ok(Value::List(out))
        }
    }
}

fn collect_expressions(tree: &Tree, id: NodeId, out: &mut Vec<NodeId>) {
    match &tree.node(id).payload {
        Payload::Scalar(scalar) => {
            if scalar.value.is_interp() {
                out.push(id);
            }
        }
        _ => {
            for child in tree.children(id) {
                collect_expressions(tree, child, out);
            }
        }
    }
}

fn collect_missing(tree: &Tree, id: NodeId, out: &mut BTreeSet<String>) {
    match &tree.node(id).payload {
        Payload::Scalar(scalar) => {
            if scalar.value.is_missing() {
                out.insert(tree.full_key(id));
            }
        }
        _ => {
            for child in tree.children(id) {
                collect_missing(tree, child, out);
            }
        }
    }
}
