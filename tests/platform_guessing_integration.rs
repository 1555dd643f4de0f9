//! Covers `guess_platform`/`guess_architecture` recursing through a nested
//! message descriptor (an instance wrapping a container image field), the
//! shape `pkg/parser/instance/proto.go`'s original recursion was built for.

use cirrus_parse::descriptor::{Cardinality, FieldDescriptor, FieldKind, MessageDescriptor};
use cirrus_parse::platform::{guess_architecture, guess_platform, guess_platform_from_type_tag};
use serde_json::json;

fn image_descriptor() -> MessageDescriptor {
    let mut image = MessageDescriptor::new();
    image
        .push(FieldDescriptor { name: "platform".to_string(), kind: FieldKind::String, cardinality: Cardinality::Singular })
        .push(FieldDescriptor { name: "architecture".to_string(), kind: FieldKind::String, cardinality: Cardinality::Singular });
    image
}

fn instance_descriptor() -> MessageDescriptor {
    let mut instance = MessageDescriptor::new();
    instance.push(FieldDescriptor {
        name: "image".to_string(),
        kind: FieldKind::Message(Box::new(image_descriptor())),
        cardinality: Cardinality::Singular,
    });
    instance
}

#[test]
fn recurses_into_a_nested_message_field_to_find_platform() {
    let descriptor = instance_descriptor();
    let raw = json!({"image": {"platform": "Windows", "architecture": "ARM64"}});
    assert_eq!(guess_platform(&raw, &descriptor), "windows");
}

#[test]
fn defaults_to_linux_when_no_field_in_the_whole_tree_is_named_platform() {
    let mut descriptor = MessageDescriptor::new();
    descriptor.push(FieldDescriptor { name: "name".to_string(), kind: FieldKind::String, cardinality: Cardinality::Singular });
    let raw = json!({"name": "build"});
    assert_eq!(guess_platform(&raw, &descriptor), "linux");
}

#[test]
fn architecture_has_no_default_even_when_nested() {
    let descriptor = instance_descriptor();
    let raw = json!({"image": {"platform": "linux"}});
    assert_eq!(guess_architecture(&raw, &descriptor), None);
}

#[test]
fn type_tag_fast_path_is_checked_independently_of_field_walk() {
    assert_eq!(guess_platform_from_type_tag("FreeBSDInstance"), Some("freebsd"));
    assert_eq!(guess_platform_from_type_tag("OSXInstance"), Some("darwin"));
}
