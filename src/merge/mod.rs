//! Layered merge: an n-ary right-biased per-position overlay.
//!
//! The left side anchors declared types and schemas; the right side supplies
//! values. Merging never mutates its inputs: the public entry points build
//! the result in a fresh tree and a mid-merge validation failure drops the
//! scratch work, leaving every input observably unchanged.

use crate::base::{Flag, Key, PathPart};
use crate::config::Config;
use crate::errors::{ConfigError, Result};
use crate::node::{NodeId, Payload, ScalarNode, ScalarValue, Tree, coerce};
use crate::schema::TypeHint;

/// How list containers combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListMergeMode {
    /// The right list replaces the left (default).
    #[default]
    Replace,
    /// Left items followed by all right items.
    Extend,
    /// Left items followed by right items not already present (value
    /// equality).
    ExtendUnique,
}

/// Options for the merge engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    pub list_mode: ListMergeMode,
}

impl Config {
    /// Merge configurations left to right with default options.
    pub fn merge(configs: &[&Config]) -> Result<Config> {
        Self::merge_with(configs, &MergeOptions::default())
    }

    /// Merge configurations left to right.
    pub fn merge_with(configs: &[&Config], opts: &MergeOptions) -> Result<Config> {
        let Some((first, rest)) = configs.split_first() else {
            return Ok(Config::new());
        };
        let mut result = (*first).clone();
        for layer in rest {
            let root = result.tree.root();
            merge_node(&mut result.tree, root, &layer.tree, layer.tree.root(), opts)?;
        }
        Ok(result)
    }

    /// Merge, consuming the inputs. Identical contract to [`Config::merge`]
    /// but free to reuse the first layer's storage.
    pub fn unsafe_merge(configs: Vec<Config>) -> Result<Config> {
        let mut layers = configs.into_iter();
        let Some(mut result) = layers.next() else {
            return Ok(Config::new());
        };
        for layer in layers {
            let root = result.tree.root();
            merge_node(&mut result.tree, root, &layer.tree, layer.tree.root(), &MergeOptions::default())?;
        }
        Ok(result)
    }

    /// Merge another configuration into this one. Builds into a scratch
    /// tree and swaps on success, so a failure leaves `self` unchanged.
    pub fn merge_from(&mut self, other: &Config) -> Result<()> {
        let merged = Config::merge(&[&*self, other])?;
        self.tree = merged.tree;
        Ok(())
    }
}

/// Recursively overlay `src_id` (in `src`) onto `dst_id` (in `dst`).
pub(crate) fn merge_node(
    dst: &mut Tree,
    dst_id: NodeId,
    src: &Tree,
    src_id: NodeId,
    opts: &MergeOptions,
) -> Result<()> {
    // MISSING on the right never overwrites (nor does it need recursion).
    if let Some(scalar) = src.node(src_id).as_scalar() {
        if scalar.value.is_missing() {
            return Ok(());
        }
    }

    let dst_is_map = dst.node(dst_id).is_map();
    let dst_is_list = dst.node(dst_id).is_list();
    let src_is_map = src.node(src_id).is_map();
    let src_is_list = src.node(src_id).is_list();

    if dst_is_map && src_is_map {
        return merge_maps(dst, dst_id, src, src_id, opts);
    }
    if dst_is_list && src_is_list {
        return merge_lists(dst, dst_id, src, src_id, opts);
    }
    if let (Some(dst_scalar), Some(src_scalar)) =
        (dst.node(dst_id).as_scalar(), src.node(src_id).as_scalar())
    {
        let kind = dst_scalar.kind.clone();
        let optional = dst_scalar.optional;
        let value = src_scalar.value.clone();
        return merge_scalar(dst, dst_id, value, kind, optional);
    }

    // Shape mismatch: an interpolation on the right replaces anything; any
    // other replacement is rejected when the left anchors a schema or a
    // declared scalar type.
    if let Some(src_scalar) = src.node(src_id).as_scalar() {
        if let ScalarValue::Interp(text) = &src_scalar.value {
            let text = text.clone();
            let donor = dst.alloc(crate::node::Node::scalar(ScalarNode::any(
                ScalarValue::Interp(text),
            )));
            dst.adopt_payload(dst_id, donor);
            return Ok(());
        }
    }
    let anchored = match &dst.node(dst_id).payload {
        Payload::Map(map) => map.schema.is_some(),
        Payload::Scalar(scalar) => !scalar.kind.is_any(),
        Payload::List(_) => false,
    };
    if anchored {
        return Err(ConfigError::type_error(
            dst.full_key(dst_id),
            dst.node(dst_id).payload.kind_name(),
            src.node(src_id).payload.kind_name(),
        ));
    }
    tracing::debug!(
        key = %dst.full_key(dst_id),
        "merge replaces {} with {}",
        dst.node(dst_id).payload.kind_name(),
        src.node(src_id).payload.kind_name()
    );
    replace_payload(dst, dst_id, src, src_id);
    Ok(())
}

fn merge_maps(
    dst: &mut Tree,
    dst_id: NodeId,
    src: &Tree,
    src_id: NodeId,
    opts: &MergeOptions,
) -> Result<()> {
    let src_entries: Vec<(Key, NodeId)> = src
        .node(src_id)
        .as_map()
        .expect("map node")
        .entries
        .iter()
        .map(|(k, v)| (k.clone(), *v))
        .collect();

    for (key, src_child) in src_entries {
        if let Some(dst_child) = dst.child(dst_id, &key) {
            merge_node(dst, dst_child, src, src_child, opts)?;
            continue;
        }

        // New key: the union keeps left order first, then right's new keys.
        let (schema, elem_hint, closed) = {
            let map = dst.node(dst_id).as_map().expect("map node");
            (
                map.schema.clone(),
                map.elem_hint.clone(),
                dst.flag(dst_id, Flag::Struct),
            )
        };
        if closed {
            let mut full_key = dst.full_key(dst_id);
            crate::base::push_part(&mut full_key, &PathPart::Key(key.to_string().into()));
            return Err(match schema {
                Some(schema) => ConfigError::validation(
                    full_key,
                    key.to_string(),
                    format!("field of {}", schema.name()),
                ),
                None => {
                    ConfigError::attribute(full_key, format!("key '{key}' is not in struct"))
                }
            });
        }
        let hint = schema
            .as_ref()
            .and_then(|s| key.as_str().and_then(|name| s.field(name)))
            .map(|field| field.hint().clone())
            .or(elem_hint);
        let child = import_with_hint(dst, src, src_child, hint.as_ref(), dst_id, &key)?;
        dst.attach_map_entry(dst_id, key, child);
    }
    Ok(())
}

fn merge_lists(
    dst: &mut Tree,
    dst_id: NodeId,
    src: &Tree,
    src_id: NodeId,
    opts: &MergeOptions,
) -> Result<()> {
    let src_items = src.node(src_id).as_list().expect("list node").items.clone();
    match opts.list_mode {
        ListMergeMode::Replace => {
            let old_items = {
                let list = dst.node_mut(dst_id).as_list_mut().expect("list node");
                std::mem::take(&mut list.items)
            };
            for item in old_items {
                dst.node_mut(item).parent = None;
                dst.node_mut(item).key = None;
                dst.free_subtree(item);
            }
            for src_item in src_items {
                let copy = dst.import_subtree(src, src_item);
                dst.push_list_item(dst_id, copy);
            }
        }
        ListMergeMode::Extend => {
            for src_item in src_items {
                let copy = dst.import_subtree(src, src_item);
                dst.push_list_item(dst_id, copy);
            }
        }
        ListMergeMode::ExtendUnique => {
            for src_item in src_items {
                let present = dst
                    .node(dst_id)
                    .as_list()
                    .expect("list node")
                    .items
                    .iter()
                    .any(|dst_item| dst.subtree_eq(*dst_item, src, src_item));
                if !present {
                    let copy = dst.import_subtree(src, src_item);
                    dst.push_list_item(dst_id, copy);
                }
            }
        }
    }
    Ok(())
}

/// Overlay one scalar value: right wins, validated against the left's
/// declared type, which is retained.
fn merge_scalar(
    dst: &mut Tree,
    dst_id: NodeId,
    value: ScalarValue,
    kind: crate::base::ValueKind,
    optional: bool,
) -> Result<()> {
    let stored = match value {
        ScalarValue::Missing => return Ok(()),
        // Interpolations are copied as expression text, re-resolving in the
        // merged tree.
        interp @ ScalarValue::Interp(_) => interp,
        ScalarValue::Null => {
            if optional || kind.is_any() {
                ScalarValue::Null
            } else {
                return Err(ConfigError::validation(
                    dst.full_key(dst_id),
                    "null",
                    format!("{kind} (not optional)"),
                ));
            }
        }
        concrete => {
            let plain = concrete.to_plain().expect("concrete scalar");
            let full_key = dst.full_key(dst_id);
            coerce(&plain, &kind, optional, &full_key)?
        }
    };
    dst.node_mut(dst_id)
        .as_scalar_mut()
        .expect("scalar node")
        .value = stored;
    Ok(())
}

/// Import a subtree, validating against a declared hint when one applies.
fn import_with_hint(
    dst: &mut Tree,
    src: &Tree,
    src_id: NodeId,
    hint: Option<&TypeHint>,
    dst_parent: NodeId,
    key: &Key,
) -> Result<NodeId> {
    match hint {
        None => Ok(dst.import_subtree(src, src_id)),
        Some(hint) => {
            let value = crate::convert::project_raw(src, src_id);
            let mut full_key = dst.full_key(dst_parent);
            crate::base::push_part(&mut full_key, &PathPart::Key(key.to_string().into()));
            crate::config::build_typed_subtree(dst, &value, Some(hint), &full_key)
        }
    }
}

/// Replace a node's payload with a copy of another tree's subtree, keeping
/// the node's identity, key, and flags.
fn replace_payload(dst: &mut Tree, dst_id: NodeId, src: &Tree, src_id: NodeId) {
    let imported = dst.import_subtree(src, src_id);
    dst.adopt_payload(dst_id, imported);
}

#[cfg(test)]
mod tests {
    use crate::base::Value;
    use crate::config::Config;

    use super::*;

    fn cfg(yaml: &str) -> Config {
        Config::from_yaml(yaml).unwrap()
    }

    #[test]
    fn test_right_bias_and_key_order() {
        let left = cfg("a: 1\nb: 2\n");
        let right = cfg("b: 20\nc: 30\n");
        let merged = Config::merge(&[&left, &right]).unwrap();
        assert_eq!(merged.get("a").unwrap(), Value::Int(1));
        assert_eq!(merged.get("b").unwrap(), Value::Int(20));
        assert_eq!(merged.get("c").unwrap(), Value::Int(30));
        // Left keys keep their order; right's new keys follow.
        let keys: Vec<String> = merged
            .to_container(&Default::default())
            .unwrap()
            .as_map()
            .unwrap()
            .keys()
            .map(|k| k.to_string())
            .collect();
        assert_eq!(keys, ["a", "b", "c"]);
    }

    #[test]
    fn test_nested_recursion() {
        let left = cfg("server:\n  port: 80\n  host: localhost\n");
        let right = cfg("server:\n  port: 8080\n");
        let merged = Config::merge(&[&left, &right]).unwrap();
        assert_eq!(merged.get("server.port").unwrap(), Value::Int(8080));
        assert_eq!(
            merged.get("server.host").unwrap(),
            Value::Str("localhost".into())
        );
    }

    #[test]
    fn test_list_modes() {
        let left = cfg("users: [user1, user2]\n");
        let right = cfg("users: [user2, user3]\n");

        let replaced = Config::merge(&[&left, &right]).unwrap();
        assert_eq!(
            replaced.get("users").unwrap(),
            Value::from(vec!["user2", "user3"])
        );

        let extended = Config::merge_with(
            &[&left, &right],
            &MergeOptions {
                list_mode: ListMergeMode::Extend,
            },
        )
        .unwrap();
        assert_eq!(
            extended.get("users").unwrap(),
            Value::from(vec!["user1", "user2", "user2", "user3"])
        );

        let unique = Config::merge_with(
            &[&left, &right],
            &MergeOptions {
                list_mode: ListMergeMode::ExtendUnique,
            },
        )
        .unwrap();
        assert_eq!(
            unique.get("users").unwrap(),
            Value::from(vec!["user1", "user2", "user3"])
        );
    }

    #[test]
    fn test_missing_never_overwrites() {
        let left = cfg("a: concrete\n");
        let right = cfg("a: '???'\n");
        let merged = Config::merge(&[&left, &right]).unwrap();
        assert_eq!(merged.get("a").unwrap(), Value::Str("concrete".into()));
    }

    #[test]
    fn test_inputs_unchanged_on_failure() {
        use crate::base::ValueKind;
        use crate::schema::{FieldDef, Schema, TypeHint};

        let schema = Schema::builder("Server")
            .field(FieldDef::new("port", TypeHint::Kind(ValueKind::Int)).with_default(80i64))
            .build();
        let mut left = Config::from_schema(&schema).unwrap();
        let right = cfg("port: not_a_number\n");
        let before = left.clone();
        assert!(left.merge_from(&right).is_err());
        assert_eq!(left, before);
    }

    #[test]
    fn test_interpolation_copied_as_expression() {
        let left = cfg("a: 1\nb: 2\n");
        let right = cfg("b: ${a}\n");
        let merged = Config::merge(&[&left, &right]).unwrap();
        assert!(merged.is_interpolation("b").unwrap());
        assert_eq!(merged.get("b").unwrap(), Value::Int(1));
    }

    #[test]
    fn test_merge_is_right_associative_without_interpolations() {
        let a = cfg("x: 1\nshared: {p: 1, q: 2}\n");
        let b = cfg("y: 2\nshared: {q: 20}\n");
        let c = cfg("z: 3\nshared: {r: 30}\n");
        let left_fold = Config::merge(&[&Config::merge(&[&a, &b]).unwrap(), &c]).unwrap();
        let right_fold = Config::merge(&[&a, &Config::merge(&[&b, &c]).unwrap()]).unwrap();
        assert_eq!(left_fold, right_fold);
    }

    #[test]
    fn test_unsafe_merge_contract() {
        let left = cfg("a: 1\n");
        let right = cfg("b: 2\n");
        let merged = Config::unsafe_merge(vec![left, right]).unwrap();
        assert_eq!(merged.get("a").unwrap(), Value::Int(1));
        assert_eq!(merged.get("b").unwrap(), Value::Int(2));
    }

    #[test]
    fn test_flags_preserved_on_left() {
        let mut left = cfg("server: {port: 80}\n");
        left.set_struct("server", Some(true)).unwrap();
        let right = cfg("server: {port: 90}\n");
        let merged = Config::merge(&[&left, &right]).unwrap();
        assert!(merged.is_struct("server").unwrap());
        assert_eq!(merged.get("server.port").unwrap(), Value::Int(90));

        // A new key under the struct-locked container is rejected.
        let extra = cfg("server: {extra: 1}\n");
        assert!(Config::merge(&[&left, &extra]).is_err());
    }
}
