//! Covers `additional_containers` through the full `compile_yaml` pipeline
//! (Proto-Reflective Parser dispatch + the dedicated container parser),
//! rather than calling `parse_additional_container` directly.

use cirrus_parse::descriptor::{Cardinality, FieldDescriptor, FieldKind, MessageDescriptor};
use cirrus_parse::{compile_yaml, CompileError};

fn descriptor() -> MessageDescriptor {
    let mut d = MessageDescriptor::new();
    d.push(FieldDescriptor {
        name: "additional_containers".to_string(),
        kind: FieldKind::Message(Box::new(MessageDescriptor::new())),
        cardinality: Cardinality::Repeated,
    });
    d
}

#[test]
fn compiles_a_list_of_sidecar_containers_with_expanded_fields() {
    let source = "\
additional_containers:
  - name: redis
    image: redis:${REDIS_TAG}
    memory: 512MiB
    environment:
      MODE: cluster
    command:
      - redis-server
      - --appendonly
      - \"yes\"
";
    let env = vec![("REDIS_TAG".to_string(), "7".to_string())];
    let message = compile_yaml(source, &descriptor(), &env).unwrap();
    let containers = message.get_repeated("additional_containers");
    assert_eq!(containers.len(), 1);
    assert_eq!(containers[0]["name"], "redis");
    assert_eq!(containers[0]["image"], "redis:7");
    assert_eq!(containers[0]["memory"], 512);
    assert_eq!(containers[0]["environment"]["MODE"], "cluster");
    assert_eq!(containers[0]["command"][1], "--appendonly");
}

#[test]
fn a_sidecar_container_missing_its_required_image_field_fails() {
    let source = "additional_containers:\n  - name: redis\n";
    let err = compile_yaml(source, &descriptor(), &[]).unwrap_err();
    assert!(matches!(err, CompileError::Aggregate(_) | CompileError::UnknownField { .. }));
}
