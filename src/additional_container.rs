//! `additional_containers`: the one list field the Proto-Reflective Parser
//! special-cases instead of treating as a generic array-of-message field.
//!
//! Grounded on `pkg/parser/instance/proto.go`'s `NewAdditionalContainer` /
//! marshal-unmarshal-round-trip special case inside `NewProtoParser`'s
//! `MessageKind` + `IsList()` branch.

use serde_json::{json, Value as JsonValue};

use crate::boolevator::Boolevator;
use crate::descriptor::parse_megabytes;
use crate::error::{CompileError, Result};
use crate::node::Node;

/// Parses one `additional_containers` entry into its JSON representation.
/// Fixed fields: `name` (required), `image` (required), `cpu`/`memory`
/// (byte-size strings via [`parse_megabytes`]), `environment` (string map),
/// `command` (array of strings, expanded).
pub fn parse_additional_container(
    node: &Node,
    env: &[(String, String)],
    _boolevator: &Boolevator,
) -> Result<JsonValue> {
    let entries = node.as_mapping()?;
    let mut name = None;
    let mut image = None;
    let mut cpu = None;
    let mut memory = None;
    let mut environment = serde_json::Map::new();
    let mut command = Vec::new();

    for (key, value) in entries {
        match key {
            "name" => name = Some(value.expanded_string(env)?),
            "image" => image = Some(value.expanded_string(env)?),
            "cpu" => cpu = Some(value.expanded_string(env)?),
            "memory" => {
                let raw = value.expanded_string(env)?;
                memory = Some(parse_megabytes(&raw, value.location())?);
            }
            "environment" => {
                for (k, v) in value.map_or_list_of_maps_with_expansion(env)? {
                    environment.insert(k, JsonValue::String(v));
                }
            }
            "command" => command = value.slice_of_expanded_strings(env)?,
            other => {
                return Err(CompileError::UnknownField {
                    key: other.to_string(),
                    location: value.location(),
                })
            }
        }
    }

    let name = name.ok_or_else(|| CompileError::UnknownField {
        key: "<missing required field 'name'>".to_string(),
        location: node.location(),
    })?;
    let image = image.ok_or_else(|| CompileError::UnknownField {
        key: "<missing required field 'image'>".to_string(),
        location: node.location(),
    })?;

    Ok(json!({
        "name": name,
        "image": image,
        "cpu": cpu,
        "memory": memory,
        "environment": environment,
        "command": command,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::parse_node;

    #[test]
    fn parses_minimal_container() {
        let node = parse_node("name: sidecar\nimage: redis\n").unwrap();
        let result = parse_additional_container(&node, &[], &Boolevator::new()).unwrap();
        assert_eq!(result["name"], "sidecar");
        assert_eq!(result["image"], "redis");
    }

    #[test]
    fn parses_memory_field() {
        let node = parse_node("name: sidecar\nimage: redis\nmemory: 1GiB\n").unwrap();
        let result = parse_additional_container(&node, &[], &Boolevator::new()).unwrap();
        assert_eq!(result["memory"], 1024);
    }

    #[test]
    fn rejects_unknown_field() {
        let node = parse_node("name: sidecar\nimage: redis\nbogus: 1\n").unwrap();
        let err = parse_additional_container(&node, &[], &Boolevator::new()).unwrap_err();
        assert!(matches!(err, CompileError::UnknownField { .. }));
    }
}
