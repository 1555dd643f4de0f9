//! Covers the hermetic environment boundary (invariant I4): only keys the
//! caller explicitly names ever reach the compiler, regardless of what else
//! is set in the process environment.

use cirrus_parse::descriptor::{Cardinality, FieldDescriptor, FieldKind, MessageDescriptor};
use cirrus_parse::{collect_env, compile_yaml, MapEnvProvider};

fn descriptor() -> MessageDescriptor {
    let mut d = MessageDescriptor::new();
    d.push(FieldDescriptor { name: "image".to_string(), kind: FieldKind::String, cardinality: Cardinality::Singular });
    d
}

#[test]
fn only_explicitly_allowed_keys_are_collected() {
    let mut values = std::collections::HashMap::new();
    values.insert("DOCKER_TAG".to_string(), "v1.2.3".to_string());
    values.insert("SECRET_TOKEN".to_string(), "do-not-leak".to_string());
    let provider = MapEnvProvider::new(values);

    let env = collect_env(&provider, &["DOCKER_TAG".to_string()]);
    assert_eq!(env, vec![("DOCKER_TAG".to_string(), "v1.2.3".to_string())]);

    let message = compile_yaml("image: app:${DOCKER_TAG}\n", &descriptor(), &env).unwrap();
    assert_eq!(message.get_scalar("image").unwrap(), "app:v1.2.3");
}

#[test]
fn an_unrequested_key_is_silently_unavailable_rather_than_leaking() {
    let mut values = std::collections::HashMap::new();
    values.insert("DOCKER_TAG".to_string(), "v1".to_string());
    let provider = MapEnvProvider::new(values);

    // SECRET_TOKEN was never requested, so it isn't in the collected env,
    // and expansion falls back to empty string rather than erroring.
    let env = collect_env(&provider, &["DOCKER_TAG".to_string()]);
    let message = compile_yaml("image: app:${SECRET_TOKEN}\n", &descriptor(), &env).unwrap();
    assert_eq!(message.get_scalar("image").unwrap(), "app:");
}
