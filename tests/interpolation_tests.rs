//! End-to-end interpolation behavior: references, relative paths, dynamic
//! keys, type preservation, and cycles.

use strata::{Config, ConfigError, InterpolationError, Value};

#[test]
fn test_reference_preserves_referent_type() {
    let cfg = Config::from_yaml(
        "database_server:\n  port: 1234\ndatabase_client:\n  server_port: ${database_server.port}\n",
    )
    .unwrap();
    // An integer, not a string.
    assert_eq!(
        cfg.get("database_client.server_port").unwrap(),
        Value::Int(1234)
    );
}

#[test]
fn test_resolve_then_serialize() {
    let mut cfg = Config::from_yaml(
        "database_server:\n  port: 1234\ndatabase_client:\n  server_port: ${database_server.port}\n",
    )
    .unwrap();
    cfg.resolve_in_place().unwrap();
    let out = cfg.to_yaml().unwrap();
    assert!(!out.contains("${"));
    let again = Config::from_yaml(&out).unwrap();
    assert_eq!(again.get("database_server.port").unwrap(), Value::Int(1234));
    assert_eq!(
        again.get("database_client.server_port").unwrap(),
        Value::Int(1234)
    );
}

#[test]
fn test_composite_text_stringifies() {
    let cfg = Config::from_yaml("host: web\nport: 80\nurl: http://${host}:${port}/\n").unwrap();
    assert_eq!(
        cfg.get("url").unwrap(),
        Value::Str("http://web:80/".into())
    );
}

#[test]
fn test_dynamic_key_selection() {
    let mut cfg = Config::from_yaml(
        "plans:\n  A: plan A\n  B: plan B\nselected_plan: A\nplan: ${plans[${selected_plan}]}\n",
    )
    .unwrap();
    assert_eq!(cfg.get("plan").unwrap(), Value::Str("plan A".into()));
    // Interpolation is lazy: mutating the selector changes the result.
    cfg.set("selected_plan", "B").unwrap();
    assert_eq!(cfg.get("plan").unwrap(), Value::Str("plan B".into()));
}

#[test]
fn test_relative_references() {
    let cfg = Config::from_yaml(
        "x: 10\nouter:\n  y: 20\n  sibling: ${.y}\n  from_root: ${..x}\n",
    )
    .unwrap();
    assert_eq!(cfg.get("outer.sibling").unwrap(), Value::Int(20));
    assert_eq!(cfg.get("outer.from_root").unwrap(), Value::Int(10));
}

#[test]
fn test_relative_reference_past_root_fails() {
    let cfg = Config::from_yaml("a: ${..x}\n").unwrap();
    match cfg.get("a") {
        Err(ConfigError::Interpolation(InterpolationError::Key { .. })) => {}
        other => panic!("expected interpolation key error, got {other:?}"),
    }
}

#[test]
fn test_list_index_reference() {
    let cfg = Config::from_yaml("xs: [a, b, c]\nfirst: ${xs[0]}\nlast: ${xs[2]}\n").unwrap();
    assert_eq!(cfg.get("first").unwrap(), Value::Str("a".into()));
    assert_eq!(cfg.get("last").unwrap(), Value::Str("c".into()));
}

#[test]
fn test_reference_to_container_captures_value() {
    let cfg = Config::from_yaml("src:\n  a: 1\n  b: 2\nalias: ${src}\n").unwrap();
    let value = cfg.get("alias").unwrap();
    let map = value.as_map().unwrap();
    assert_eq!(map.len(), 2);
}

#[test]
fn test_chained_references() {
    let cfg = Config::from_yaml("a: 1\nb: ${a}\nc: ${b}\n").unwrap();
    assert_eq!(cfg.get("c").unwrap(), Value::Int(1));
}

#[test]
fn test_reference_through_interpolated_intermediate() {
    let cfg = Config::from_yaml("real:\n  x: 5\nalias: ${real}\nvia: ${alias.x}\n").unwrap();
    assert_eq!(cfg.get("via").unwrap(), Value::Int(5));
}

#[test]
fn test_cycle_detected() {
    let cfg = Config::from_yaml("a: ${b}\nb: ${a}\n").unwrap();
    match cfg.get("a") {
        Err(ConfigError::Interpolation(InterpolationError::Cycle { .. })) => {}
        other => panic!("expected cycle error, got {other:?}"),
    }
}

#[test]
fn test_self_cycle_detected() {
    let cfg = Config::from_yaml("a: ${a}\n").unwrap();
    assert!(matches!(
        cfg.get("a"),
        Err(ConfigError::Interpolation(InterpolationError::Cycle { .. }))
    ));
}

#[test]
fn test_reference_to_missing_value() {
    let cfg = Config::from_yaml("a: '???'\nb: ${a}\n").unwrap();
    match cfg.get("b") {
        Err(ConfigError::Interpolation(InterpolationError::ToMissing { .. })) => {}
        other => panic!("expected interpolation-to-missing error, got {other:?}"),
    }
}

#[test]
fn test_reference_to_unknown_key() {
    let cfg = Config::from_yaml("a: ${nope.deep}\n").unwrap();
    assert!(matches!(
        cfg.get("a"),
        Err(ConfigError::Interpolation(InterpolationError::Key { .. }))
    ));
}

#[test]
fn test_escaped_interpolation_is_literal() {
    let cfg = Config::from_yaml("price: 10\nnote: \"cost \\\\${price}\"\n").unwrap();
    assert_eq!(cfg.get("note").unwrap(), Value::Str("cost ${price}".into()));
}

#[test]
fn test_typed_node_coerces_resolved_value() {
    use std::sync::Arc;
    use strata::{FieldDef, Schema, TypeHint, ValueKind};

    let schema: Arc<Schema> = Schema::builder("Client")
        .field(
            FieldDef::new("server_port", TypeHint::Kind(ValueKind::Int))
                .with_default("${server.port}"),
        )
        .build();
    let mut cfg = Config::from_schema(&schema).unwrap();
    cfg.update(
        "server.port",
        "8080",
        &strata::UpdateOpts {
            merge: true,
            force_add: true,
        },
    )
    .unwrap();
    // The referent is a string, the declared kind is int: coerced on read.
    assert_eq!(cfg.get("server_port").unwrap(), Value::Int(8080));
}

#[test]
fn test_interpolation_errors_catch_broadly() {
    let cfg = Config::from_yaml("a: ${nope}\nb: ${x\n");
    // Syntactic validity is checked on assignment (load).
    assert!(cfg.is_err());

    let cfg = Config::from_yaml("a: ${nope}\n").unwrap();
    let err = cfg.get("a").unwrap_err();
    assert!(matches!(err, ConfigError::Interpolation(_)));
}
