//! Proto-Reflective Parser (spec.md §4.F): builds a [`DefaultParser`] from a
//! [`MessageDescriptor`] by dispatching on each field's [`FieldKind`].
//!
//! Ported rule-for-rule from `pkg/parser/instance/proto.go`'s
//! `NewProtoParser`, which switches on `field.Kind()`.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use crate::additional_container::parse_additional_container;
use crate::descriptor::{parse_megabytes, Cardinality, FieldDescriptor, FieldKind as DescKind, MessageDescriptor};
use crate::descriptor::CompiledMessage;
use crate::error::CompileError;
use crate::parseable::{DefaultParser, FieldKind, FieldRegistration, Nameable};
use crate::schema::{array_schema, boolean_schema, condition_schema, enum_schema, integer_schema, number_schema, object_schema, string_map_schema, string_schema};

/// Fields whose name ends in `credentials` or `config` are registered as
/// Collectible rather than Optional, per spec.md §6's reserved-name list and
/// `proto.go`'s `StringKind` singular branch.
fn is_collectible_string_field(name: &str) -> bool {
    name.ends_with("credentials") || name.ends_with("config")
}

/// Builds a [`DefaultParser`] that compiles mapping nodes into a
/// [`CompiledMessage`] according to `descriptor`.
pub fn build_parser(descriptor: &MessageDescriptor) -> DefaultParser<CompiledMessage> {
    let mut parser = DefaultParser::new();
    for field in &descriptor.fields {
        register_field(&mut parser, field);
    }
    parser
}

fn register_field(parser: &mut DefaultParser<CompiledMessage>, field: &FieldDescriptor) {
    let name = field.name.clone();
    match &field.kind {
        DescKind::Message(nested) if field.name == "additional_containers" => {
            parser.registry.register(&name, array_schema(object_schema()), false);
            let name_owned = name.clone();
            parser.push(FieldRegistration::new(
                Nameable::Exact(name.clone()),
                FieldKind::Optional,
                move |node, ctx, out: &mut CompiledMessage| {
                    for item in node.as_sequence()? {
                        let value = parse_additional_container(item, &ctx.env, &ctx.boolevator)?;
                        out.push_repeated(&name_owned, value);
                    }
                    Ok(())
                },
            ));
            let _ = nested;
        }
        DescKind::Message(nested) if field.cardinality == Cardinality::Map => {
            parser.registry.register(&name, string_map_schema(), false);
            let name_owned = name.clone();
            // A map field is a plain `map<string, string>` (spec.md §4.F):
            // `docker_arguments` additionally accepts a list of single-entry
            // mappings, per its reserved-name dual shape (spec.md §3).
            let accepts_list_of_maps = name == "docker_arguments";
            parser.push(FieldRegistration::new(
                Nameable::Exact(name.clone()),
                FieldKind::Optional,
                move |node, ctx, out: &mut CompiledMessage| {
                    let entries = if accepts_list_of_maps {
                        node.map_or_list_of_maps_with_expansion(&ctx.env)?
                    } else {
                        node.as_mapping()?
                            .into_iter()
                            .map(|(k, v)| Ok((k.to_string(), v.expanded_string(&ctx.env)?)))
                            .collect::<std::result::Result<Vec<_>, CompileError>>()?
                    };
                    let map: BTreeMap<String, String> = entries.into_iter().collect();
                    out.set_map(&name_owned, map);
                    Ok(())
                },
            ));
            let _ = nested;
        }
        DescKind::Message(nested) if field.cardinality == Cardinality::Repeated => {
            parser.registry.register(&name, array_schema(object_schema()), false);
            let nested = (**nested).clone();
            let name_owned = name.clone();
            parser.push(FieldRegistration::new(
                Nameable::Exact(name.clone()),
                FieldKind::Optional,
                move |node, ctx, out: &mut CompiledMessage| {
                    let sub = build_parser(&nested);
                    for item in node.as_sequence()? {
                        let mut nested_ctx = ctx.clone();
                        let mut nested_out = CompiledMessage::new();
                        let mut diagnostics = crate::error::Diagnostics::new();
                        sub.parse(item, &mut nested_ctx, &mut nested_out, &mut diagnostics)?;
                        diagnostics.into_result()?;
                        out.push_repeated(&name_owned, nested_out.to_json());
                    }
                    Ok(())
                },
            ));
        }
        DescKind::Message(nested) => {
            parser.registry.register(&name, object_schema(), false);
            let nested = (**nested).clone();
            let name_owned = name.clone();
            parser.push(FieldRegistration::new(
                Nameable::Exact(name.clone()),
                FieldKind::Optional,
                move |node, ctx, out: &mut CompiledMessage| {
                    let sub = build_parser(&nested);
                    let mut nested_ctx = ctx.clone();
                    let mut nested_out = CompiledMessage::new();
                    let mut diagnostics = crate::error::Diagnostics::new();
                    sub.parse(node, &mut nested_ctx, &mut nested_out, &mut diagnostics)?;
                    diagnostics.into_result()?;
                    out.set_scalar(&name_owned, nested_out.to_json());
                    Ok(())
                },
            ));
        }
        DescKind::Enum(values) => {
            parser.registry.register(
                &name,
                enum_schema(&values.iter().map(String::as_str).collect::<Vec<_>>()),
                false,
            );
            let values = values.clone();
            let name_owned = name.clone();
            parser.push(FieldRegistration::new(
                Nameable::Exact(name.clone()),
                FieldKind::Optional,
                move |node, ctx, out: &mut CompiledMessage| {
                    let raw = node.expanded_string(&ctx.env)?;
                    let upper = raw.to_ascii_uppercase();
                    let matched = values.iter().find(|v| v.to_ascii_uppercase() == upper);
                    match matched {
                        Some(value) => {
                            out.set_scalar(&name_owned, JsonValue::String(value.clone()));
                            Ok(())
                        }
                        None => Err(CompileError::EnumOutOfRange {
                            value: raw,
                            allowed: values.join(", "),
                            location: node.location(),
                        }),
                    }
                },
            ));
        }
        DescKind::String if field.cardinality == Cardinality::Repeated => {
            parser.registry.register(&name, array_schema(string_schema()), false);
            let name_owned = name.clone();
            parser.push(FieldRegistration::new(
                Nameable::Exact(name.clone()),
                FieldKind::Optional,
                move |node, ctx, out: &mut CompiledMessage| {
                    for item in node.slice_of_expanded_strings(&ctx.env)? {
                        out.push_repeated(&name_owned, JsonValue::String(item));
                    }
                    Ok(())
                },
            ));
        }
        DescKind::String => {
            parser.registry.register(&name, string_schema(), false);
            let kind = if is_collectible_string_field(&name) {
                FieldKind::Collectible
            } else {
                FieldKind::Optional
            };
            let nameable = if is_collectible_string_field(&name) {
                Nameable::Suffix(
                    if name.ends_with("credentials") { "credentials" } else { "config" }.to_string(),
                )
            } else {
                Nameable::Exact(name.clone())
            };
            let name_owned = name.clone();
            parser.push(FieldRegistration::new(
                nameable,
                kind,
                move |node, ctx, out: &mut CompiledMessage| {
                    let value = node.expanded_string(&ctx.env)?;
                    out.set_scalar(&name_owned, JsonValue::String(value));
                    Ok(())
                },
            ));
        }
        DescKind::Int64 | DescKind::Uint64 | DescKind::Int32 | DescKind::Uint32 => {
            parser.registry.register(&name, integer_schema(), false);
            let name_owned = name.clone();
            let is_memory = name.eq_ignore_ascii_case("memory");
            parser.push(FieldRegistration::new(
                Nameable::Exact(name.clone()),
                FieldKind::Optional,
                move |node, ctx, out: &mut CompiledMessage| {
                    let raw = node.expanded_string(&ctx.env)?;
                    let parsed = if is_memory {
                        parse_megabytes(&raw, node.location())?
                    } else {
                        raw.parse::<i64>().map_err(|_| CompileError::NumericOverflow {
                            location: node.location(),
                            message: format!("'{raw}' is not a valid integer"),
                        })?
                    };
                    out.set_scalar(&name_owned, JsonValue::from(parsed));
                    Ok(())
                },
            ));
        }
        DescKind::Float | DescKind::Double => {
            parser.registry.register(&name, number_schema(), false);
            let name_owned = name.clone();
            parser.push(FieldRegistration::new(
                Nameable::Exact(name.clone()),
                FieldKind::Optional,
                move |node, ctx, out: &mut CompiledMessage| {
                    let raw = node.expanded_string(&ctx.env)?;
                    let parsed: f64 = raw.parse().map_err(|_| CompileError::NumericOverflow {
                        location: node.location(),
                        message: format!("'{raw}' is not a valid float"),
                    })?;
                    out.set_scalar(
                        &name_owned,
                        JsonValue::from(serde_json::Number::from_f64(parsed).unwrap_or(0.into())),
                    );
                    Ok(())
                },
            ));
        }
        DescKind::Bool => {
            parser.registry.register(&name, boolean_schema(), false);
            let name_owned = name.clone();
            parser.push(FieldRegistration::new(
                Nameable::Exact(name.clone()),
                FieldKind::Optional,
                move |node, ctx, out: &mut CompiledMessage| {
                    let value = node.bool_value(&ctx.env, &ctx.boolevator)?;
                    out.set_scalar(&name_owned, JsonValue::Bool(value));
                    Ok(())
                },
            ));
        }
        DescKind::Unsupported(kind) => {
            let kind = *kind;
            let name_owned = name.clone();
            parser.registry.register(&name, condition_schema(), false);
            parser.push(FieldRegistration::new(
                Nameable::Exact(name.clone()),
                FieldKind::Optional,
                move |_node, _ctx, _out: &mut CompiledMessage| {
                    Err(CompileError::UnsupportedKind {
                        field: name_owned.clone(),
                        kind: kind.to_string(),
                    })
                },
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Cardinality, FieldDescriptor, FieldKind as DescKind, MessageDescriptor};
    use crate::node::parse_node;
    use crate::parseable::ParseContext;

    fn descriptor() -> MessageDescriptor {
        let mut d = MessageDescriptor::new();
        d.push(FieldDescriptor { name: "name".to_string(), kind: DescKind::String, cardinality: Cardinality::Singular });
        d.push(FieldDescriptor { name: "memory".to_string(), kind: DescKind::Int64, cardinality: Cardinality::Singular });
        d.push(FieldDescriptor {
            name: "platform".to_string(),
            kind: DescKind::Enum(vec!["linux".to_string(), "windows".to_string()]),
            cardinality: Cardinality::Singular,
        });
        d.push(FieldDescriptor { name: "cluster_config".to_string(), kind: DescKind::String, cardinality: Cardinality::Singular });
        d
    }

    #[test]
    fn parses_scalar_fields() {
        let node = parse_node("name: build\nmemory: 1GiB\nplatform: LINUX\n").unwrap();
        let parser = build_parser(&descriptor());
        let mut ctx = ParseContext::new(Vec::new());
        let mut out = CompiledMessage::new();
        let mut diagnostics = crate::error::Diagnostics::new();
        parser.parse(&node, &mut ctx, &mut out, &mut diagnostics).unwrap();
        assert!(diagnostics.is_empty(), "{:?}", diagnostics.errors());
        assert_eq!(out.get_scalar("name"), Some(&JsonValue::String("build".to_string())));
        assert_eq!(out.get_scalar("memory"), Some(&JsonValue::from(1024)));
        assert_eq!(out.get_scalar("platform"), Some(&JsonValue::String("linux".to_string())));
    }

    #[test]
    fn enum_out_of_range_is_recoverable() {
        let node = parse_node("platform: solaris\n").unwrap();
        let parser = build_parser(&descriptor());
        let mut ctx = ParseContext::new(Vec::new());
        let mut out = CompiledMessage::new();
        let mut diagnostics = crate::error::Diagnostics::new();
        parser.parse(&node, &mut ctx, &mut out, &mut diagnostics).unwrap();
        assert_eq!(diagnostics.errors().len(), 1);
        assert!(matches!(diagnostics.errors()[0], CompileError::EnumOutOfRange { .. }));
    }

    #[test]
    fn suffix_config_field_is_collectible() {
        let node = parse_node("cluster_config: secret-ref\nname: build\n").unwrap();
        let parser = build_parser(&descriptor());
        let mut ctx = ParseContext::new(Vec::new());
        let mut out = CompiledMessage::new();
        let mut diagnostics = crate::error::Diagnostics::new();
        parser.parse(&node, &mut ctx, &mut out, &mut diagnostics).unwrap();
        assert!(diagnostics.is_empty(), "{:?}", diagnostics.errors());
        assert_eq!(out.get_scalar("cluster_config"), Some(&JsonValue::String("secret-ref".to_string())));
    }
}
