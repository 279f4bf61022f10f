use rstest::rstest;
use serde_json::Value;

use duotone::{
    from_str, from_str_as, CodecRegistry, DecodeErrorKind, DecodeOptions, Field, TypeBinding,
};

#[derive(Debug, Default, PartialEq)]
struct User {
    id: i64,
    name: String,
    admin: bool,
    extras: Vec<(String, Value)>,
}

fn registry() -> CodecRegistry {
    let registry = CodecRegistry::new();
    registry.register(
        TypeBinding::builder("User")
            .with_factory(|| Box::new(User::default()))
            .with_field(Field::<User>::i64("id", |user, value| user.id = value))
            .with_field(Field::<User>::string("name", |user, value| {
                user.name = value
            }))
            .with_field(Field::<User>::bool("admin", |user, value| {
                user.admin = value
            }))
            .with_extras(|target, name, value| {
                if let Some(user) = target.downcast_mut::<User>() {
                    user.extras.push((name.to_string(), value));
                }
            })
            .build(),
    );
    registry.register(
        TypeBinding::builder("Plain")
            .with_factory(|| Box::new(User::default()))
            .with_field(Field::<User>::string("name", |user, value| {
                user.name = value
            }))
            .build(),
    );
    registry
}

fn options() -> DecodeOptions {
    DecodeOptions::new()
}

#[test]
fn decodes_fields_by_hash() {
    let registry = registry();
    let user = from_str_as::<User>(
        &registry,
        r#"{"id":7,"name":"Ada","admin":true}"#,
        "User",
        options(),
    )
    .unwrap()
    .unwrap();
    assert_eq!(user.id, 7);
    assert_eq!(user.name, "Ada");
    assert!(user.admin);
    assert!(user.extras.is_empty());
}

#[test]
fn unknown_fields_go_to_extras_sink() {
    let registry = registry();
    let user = from_str_as::<User>(
        &registry,
        r#"{"name":"Ada","shoe_size":42,"tags":["a","b"]}"#,
        "User",
        options(),
    )
    .unwrap()
    .unwrap();
    assert_eq!(user.name, "Ada");
    assert_eq!(user.extras.len(), 2);
    assert_eq!(user.extras[0].0, "shoe_size");
    assert_eq!(user.extras[1].1, serde_json::json!(["a", "b"]));
}

#[test]
fn unknown_fields_are_dropped_without_a_sink() {
    let registry = registry();
    let user = from_str_as::<User>(
        &registry,
        r#"{"name":"Ada","shoe_size":42}"#,
        "Plain",
        options(),
    )
    .unwrap()
    .unwrap();
    assert_eq!(user.name, "Ada");
    assert!(user.extras.is_empty());
}

#[rstest]
#[case(r#"{"Name":"Ada"}"#)]
#[case(r#"{"NAME":"Ada"}"#)]
#[case(r#"{"na_me":"Ada"}"#)]
fn smart_match_retries_with_lowercase_hash(#[case] input: &str) {
    let registry = registry();
    let user = from_str_as::<User>(
        &registry,
        input,
        "Plain",
        options().with_smart_match(true),
    )
    .unwrap()
    .unwrap();
    assert_eq!(user.name, "Ada");
}

#[test]
fn smart_match_is_off_by_default() {
    let registry = registry();
    let user = from_str_as::<User>(&registry, r#"{"Name":"Ada"}"#, "Plain", options())
        .unwrap()
        .unwrap();
    assert_eq!(user.name, "");
}

#[test]
fn explicit_null_yields_no_value() {
    let registry = registry();
    let user = from_str_as::<User>(&registry, "null", "User", options()).unwrap();
    assert!(user.is_none());
}

#[test]
fn legacy_boolean_tokens_yield_no_value() {
    let registry = registry();
    assert!(from_str(&registry, "true", "User", options())
        .unwrap()
        .is_none());
    assert!(from_str(&registry, "false", "User", options())
        .unwrap()
        .is_none());
}

#[test]
fn trailing_separators_are_skipped() {
    let registry = registry();
    let user = from_str_as::<User>(&registry, r#"{"name":"Ada",}"#, "User", options())
        .unwrap()
        .unwrap();
    assert_eq!(user.name, "Ada");
}

#[test]
fn array_payload_maps_positionally_when_enabled() {
    let registry = registry();
    let user = from_str_as::<User>(
        &registry,
        r#"[3,"Ada",true]"#,
        "User",
        options().with_array_to_object(true),
    )
    .unwrap()
    .unwrap();
    assert_eq!(user.id, 3);
    assert_eq!(user.name, "Ada");
    assert!(user.admin);
}

#[test]
fn array_payload_fails_without_the_flag() {
    let registry = registry();
    let err = from_str(&registry, r#"[3,"Ada",true]"#, "User", options()).unwrap_err();
    assert_eq!(err.kind, DecodeErrorKind::MalformedStructure);
}

#[test]
fn non_serializable_types_fail_fast() {
    let registry = registry();
    registry.register(
        TypeBinding::builder("Sealed")
            .with_serializable(false)
            .with_factory(|| Box::new(User::default()))
            .build(),
    );
    let err = from_str(&registry, r#"{"name":"x"}"#, "Sealed", options()).unwrap_err();
    assert_eq!(err.kind, DecodeErrorKind::NotSerializable);
}

#[test]
fn missing_factory_never_yields_a_partial_object() {
    let registry = registry();
    registry.register(
        TypeBinding::builder("Abstract")
            .with_field(Field::<User>::string("name", |user, value| {
                user.name = value
            }))
            .build(),
    );
    let err = from_str(&registry, r#"{"name":"x"}"#, "Abstract", options()).unwrap_err();
    assert_eq!(err.kind, DecodeErrorKind::UnsupportedValue);
}

#[test]
fn schema_validator_rejects_bad_instances() {
    let registry = registry();
    registry.register(
        TypeBinding::builder("Checked")
            .with_factory(|| Box::new(User::default()))
            .with_field(Field::<User>::i64("id", |user, value| user.id = value))
            .with_schema(|instance| {
                let user = instance
                    .downcast_ref::<User>()
                    .ok_or("wrong instance type")?;
                if user.id > 0 {
                    Ok(())
                } else {
                    Err("id must be positive".to_string())
                }
            })
            .build(),
    );
    let ok = from_str_as::<User>(&registry, r#"{"id":1}"#, "Checked", options())
        .unwrap()
        .unwrap();
    assert_eq!(ok.id, 1);

    let err = from_str(&registry, r#"{"id":-1}"#, "Checked", options()).unwrap_err();
    assert_eq!(err.kind, DecodeErrorKind::SchemaViolation);
}

#[derive(Debug, Default)]
struct RangeDraft {
    lo: i64,
    hi: i64,
}

#[derive(Debug, PartialEq)]
struct Range {
    span: i64,
}

#[test]
fn build_function_replaces_the_instance() {
    let registry = registry();
    registry.register(
        TypeBinding::builder("Range")
            .with_factory(|| Box::new(RangeDraft::default()))
            .with_field(Field::<RangeDraft>::i64("lo", |draft, value| {
                draft.lo = value
            }))
            .with_field(Field::<RangeDraft>::i64("hi", |draft, value| {
                draft.hi = value
            }))
            .with_build(|instance| match instance.downcast::<RangeDraft>() {
                Ok(draft) => Box::new(Range {
                    span: draft.hi - draft.lo,
                }),
                Err(instance) => instance,
            })
            .build(),
    );
    let range = from_str_as::<Range>(&registry, r#"{"lo":3,"hi":10}"#, "Range", options())
        .unwrap()
        .unwrap();
    assert_eq!(range, Range { span: 7 });
}

#[test]
fn field_value_type_mismatch_is_an_error() {
    let registry = registry();
    let err = from_str(&registry, r#"{"id":"seven"}"#, "User", options()).unwrap_err();
    assert_eq!(err.kind, DecodeErrorKind::UnsupportedValue);
}
