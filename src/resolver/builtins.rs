//! Built-in resolvers, reserved under the `oc.` namespace.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::base::{Key, Value};
use crate::errors::{ConfigError, Result};

use super::{ResolverCtx, ResolverEntry, ResolverFn};

pub(super) fn install(entries: &mut FxHashMap<String, ResolverEntry>) {
    let plain = |f: fn(&[Value]) -> Result<Value>| ResolverEntry {
        func: ResolverFn::Plain(Arc::new(f)),
        use_cache: false,
    };
    let ctx = |f: fn(&mut dyn ResolverCtx, &[Value]) -> Result<Value>| ResolverEntry {
        func: ResolverFn::WithContext(Arc::new(f)),
        use_cache: false,
    };

    entries.insert("oc.env".into(), plain(env));
    entries.insert("oc.create".into(), plain(create));
    entries.insert("oc.decode".into(), ctx(decode));
    entries.insert("oc.select".into(), ctx(select));
    entries.insert("oc.deprecated".into(), ctx(deprecated));
    entries.insert("oc.dict.keys".into(), ctx(dict_keys));
    entries.insert("oc.dict.values".into(), ctx(dict_values));
}

/// `${oc.env:VAR}` / `${oc.env:VAR,default}` - environment lookup.
///
/// The variable's value is returned as a string. A default of the literal
/// `null` yields the null value, not the string "null".
fn env(args: &[Value]) -> Result<Value> {
    let name = string_arg(args, 0, "oc.env")?;
    match std::env::var(&name) {
        Ok(value) => Ok(Value::Str(value)),
        Err(_) => match args.get(1) {
            Some(default) => Ok(default.clone()),
            None => Err(ConfigError::validation(
                name.clone(),
                name,
                "set environment variable (no default provided)",
            )),
        },
    }
}

/// `${oc.decode:text}` - parse a string through the Element grammar and
/// return the typed result. Null passes through.
fn decode(ctx: &mut dyn ResolverCtx, args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(Value::Null) | None => Ok(Value::Null),
        Some(Value::Str(text)) => ctx.decode(text),
        Some(other) => Err(ConfigError::validation(
            ctx.anchor_key(),
            other.to_string(),
            "str or null argument to oc.decode",
        )),
    }
}

/// `${oc.select:key}` / `${oc.select:key,default}` - like a node reference
/// but returns the default instead of raising on a missing target.
fn select(ctx: &mut dyn ResolverCtx, args: &[Value]) -> Result<Value> {
    let path = string_arg(args, 0, "oc.select")?;
    match ctx.select(&path)? {
        Some(value) => Ok(value),
        None => Ok(args.get(1).cloned().unwrap_or(Value::Null)),
    }
}

/// `${oc.create:value}` - returns its evaluated argument; map and list
/// results become freshly-parented containers at the point they are stored
/// or projected.
fn create(args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(value) => Ok(value.clone()),
        None => Ok(Value::Map(Default::default())),
    }
}

/// `${oc.deprecated:new_key}` / `${oc.deprecated:new_key,message}` - warns
/// on access and forwards to the new key. `$OLD_KEY` and `$NEW_KEY` in the
/// message are substituted.
fn deprecated(ctx: &mut dyn ResolverCtx, args: &[Value]) -> Result<Value> {
    let new_key = string_arg(args, 0, "oc.deprecated")?;
    let old_key = ctx.anchor_key();
    let template = match args.get(1) {
        Some(Value::Str(message)) => message.clone(),
        _ => "'$OLD_KEY' is deprecated. Change your code and config to use '$NEW_KEY'".into(),
    };
    let message = template
        .replace("$OLD_KEY", &old_key)
        .replace("$NEW_KEY", &new_key);
    tracing::warn!(old_key = %old_key, new_key = %new_key, "{message}");
    match ctx.select(&new_key)? {
        Some(value) => Ok(value),
        None => Err(ConfigError::key(
            new_key.clone(),
            format!("deprecation target '{new_key}' not found"),
        )),
    }
}

/// `${oc.dict.keys:path}` - the keys of the referenced map, as a list.
fn dict_keys(ctx: &mut dyn ResolverCtx, args: &[Value]) -> Result<Value> {
    let (path, map) = select_map(ctx, args, "oc.dict.keys")?;
    let _ = path;
    Ok(Value::List(map.keys().map(key_to_value).collect()))
}

/// `${oc.dict.values:path}` - the values of the referenced map, as a list.
/// Values are resolved at call time; re-reading re-resolves through the
/// lazy evaluator.
fn dict_values(ctx: &mut dyn ResolverCtx, args: &[Value]) -> Result<Value> {
    let (path, map) = select_map(ctx, args, "oc.dict.values")?;
    let _ = path;
    Ok(Value::List(map.values().cloned().collect()))
}

fn select_map(
    ctx: &mut dyn ResolverCtx,
    args: &[Value],
    resolver: &str,
) -> Result<(String, indexmap::IndexMap<Key, Value>)> {
    let path = string_arg(args, 0, resolver)?;
    match ctx.select(&path)? {
        Some(Value::Map(map)) => Ok((path, map)),
        Some(other) => Err(ConfigError::type_error(path, "map", other.type_name())),
        None => Err(ConfigError::key(path.clone(), format!("no map at '{path}'"))),
    }
}

fn string_arg(args: &[Value], index: usize, resolver: &str) -> Result<String> {
    match args.get(index) {
        Some(Value::Str(s)) => Ok(s.clone()),
        Some(other) => Ok(other.to_string()),
        None => Err(ConfigError::validation(
            resolver,
            "<missing>",
            format!("argument {index} of {resolver}"),
        )),
    }
}

fn key_to_value(key: &Key) -> Value {
    match key {
        Key::Str(s) => Value::Str(s.to_string()),
        Key::Int(i) => Value::Int(*i),
        Key::Bool(b) => Value::Bool(*b),
        Key::Float(bits) => Value::Float(bits.value()),
        Key::Bytes(b) => Value::Bytes(b.clone()),
        Key::Enum { member, .. } => Value::Str(member.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_returns_string() {
        // SAFETY: test-local variable name, no concurrent readers of it.
        unsafe { std::env::set_var("STRATA_BUILTIN_TEST_VAR", "42") };
        let got = env(&[Value::from("STRATA_BUILTIN_TEST_VAR")]).unwrap();
        assert_eq!(got, Value::Str("42".into()));
        unsafe { std::env::remove_var("STRATA_BUILTIN_TEST_VAR") };
    }

    #[test]
    fn test_env_default_and_null_default() {
        let got = env(&[Value::from("STRATA_UNSET_VAR_XYZ"), Value::from("fallback")]).unwrap();
        assert_eq!(got, Value::Str("fallback".into()));
        let got = env(&[Value::from("STRATA_UNSET_VAR_XYZ"), Value::Null]).unwrap();
        assert_eq!(got, Value::Null);
        assert!(env(&[Value::from("STRATA_UNSET_VAR_XYZ")]).is_err());
    }

    #[test]
    fn test_create_passthrough() {
        let map: Value = [("a", 1i64)].into_iter().collect();
        assert_eq!(create(&[map.clone()]).unwrap(), map);
        assert_eq!(create(&[]).unwrap(), Value::Map(Default::default()));
    }
}
