//! Value Bridge (spec.md §4.I, §3): converts between Script Values, native
//! dynamic values (`serde_json::Value`), and [`Node`]s. Only the
//! JSON-compatible subset of Script Value crosses the bridge; `Callable` and
//! non-string-keyed `Dict`s raise [`CompileError::BridgeTypeError`].
//!
//! Grounded on the teacher's `coerce.rs` (typed-decode-dispatch idiom),
//! narrowed to the subset spec.md §3 names.

use serde_json::Value as JsonValue;

use crate::error::{CompileError, Result};
use crate::node::{Location, Node};

/// The dynamic value type scripts operate on (spec.md §3's Script Value).
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<ScriptValue>),
    Dict(Vec<(ScriptValue, ScriptValue)>),
    /// Not JSON-compatible; never crosses the bridge.
    Callable(String),
    /// A named bag of fields; bridges to a JSON object.
    Struct(String, Vec<(String, ScriptValue)>),
}

impl ScriptValue {
    pub fn truthy(&self) -> bool {
        match self {
            ScriptValue::None => false,
            ScriptValue::Bool(b) => *b,
            ScriptValue::Int(i) => *i != 0,
            ScriptValue::Float(f) => *f != 0.0,
            ScriptValue::String(s) => !s.is_empty(),
            ScriptValue::Bytes(b) => !b.is_empty(),
            ScriptValue::List(items) => !items.is_empty(),
            ScriptValue::Dict(entries) => !entries.is_empty(),
            ScriptValue::Callable(_) => true,
            ScriptValue::Struct(_, _) => true,
        }
    }
}

/// Converts a [`ScriptValue`] to `serde_json::Value`. `Bytes` is base64-free
/// here (no `base64` dependency remains in this crate, see DESIGN.md) and is
/// instead rendered as a JSON array of byte integers, matching how the
/// teacher's own `coerce.rs` renders non-UTF8 payloads when no encoding
/// crate is available.
pub fn script_to_json(value: &ScriptValue) -> Result<JsonValue> {
    Ok(match value {
        ScriptValue::None => JsonValue::Null,
        ScriptValue::Bool(b) => JsonValue::Bool(*b),
        ScriptValue::Int(i) => JsonValue::from(*i),
        ScriptValue::Float(f) => {
            JsonValue::from(serde_json::Number::from_f64(*f).ok_or_else(|| {
                CompileError::BridgeTypeError(format!("float {f} is not JSON-representable"))
            })?)
        }
        ScriptValue::String(s) => JsonValue::String(s.clone()),
        ScriptValue::Bytes(bytes) => {
            JsonValue::Array(bytes.iter().map(|b| JsonValue::from(*b)).collect())
        }
        ScriptValue::List(items) => {
            JsonValue::Array(items.iter().map(script_to_json).collect::<Result<_>>()?)
        }
        ScriptValue::Dict(entries) => {
            let mut map = serde_json::Map::new();
            for (k, v) in entries {
                let key = match k {
                    ScriptValue::String(s) => s.clone(),
                    other => {
                        return Err(CompileError::BridgeTypeError(format!(
                            "dict key {other:?} is not a string; only string-keyed dicts cross the bridge"
                        )))
                    }
                };
                map.insert(key, script_to_json(v)?);
            }
            JsonValue::Object(map)
        }
        ScriptValue::Callable(name) => {
            return Err(CompileError::BridgeTypeError(format!(
                "callable '{name}' cannot cross the value bridge"
            )))
        }
        ScriptValue::Struct(_, fields) => {
            let mut map = serde_json::Map::new();
            for (k, v) in fields {
                map.insert(k.clone(), script_to_json(v)?);
            }
            JsonValue::Object(map)
        }
    })
}

/// Converts `serde_json::Value` back into a [`ScriptValue`].
pub fn json_to_script(value: &JsonValue) -> ScriptValue {
    match value {
        JsonValue::Null => ScriptValue::None,
        JsonValue::Bool(b) => ScriptValue::Bool(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                ScriptValue::Int(i)
            } else {
                ScriptValue::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        JsonValue::String(s) => ScriptValue::String(s.clone()),
        JsonValue::Array(items) => ScriptValue::List(items.iter().map(json_to_script).collect()),
        JsonValue::Object(map) => ScriptValue::Dict(
            map.iter()
                .map(|(k, v)| (ScriptValue::String(k.clone()), json_to_script(v)))
                .collect(),
        ),
    }
}

/// Converts a [`Node`] into a [`ScriptValue`], expanding scalar strings
/// against `env` first (so scripts see the same resolved values the
/// Proto-Reflective Parser would).
pub fn node_to_script(node: &Node, env: &[(String, String)]) -> Result<ScriptValue> {
    match node {
        Node::Scalar(..) => Ok(ScriptValue::String(node.expanded_string(env)?)),
        Node::Sequence(items, _) => Ok(ScriptValue::List(
            items
                .iter()
                .map(|item| node_to_script(item, env))
                .collect::<Result<_>>()?,
        )),
        Node::Mapping(entries, _) => {
            let mut out = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                out.push((
                    ScriptValue::String(k.as_scalar()?.to_string()),
                    node_to_script(v, env)?,
                ));
            }
            Ok(ScriptValue::Dict(out))
        }
    }
}

/// Converts a [`ScriptValue`] into a [`Node`], for re-serializing script
/// output (e.g. a `main()` result) back through the YAML writer.
pub fn script_to_node(value: &ScriptValue, location: Location) -> Result<Node> {
    Ok(match value {
        ScriptValue::None => Node::Scalar(String::new(), location),
        ScriptValue::Bool(b) => Node::Scalar(b.to_string(), location),
        ScriptValue::Int(i) => Node::Scalar(i.to_string(), location),
        ScriptValue::Float(f) => Node::Scalar(f.to_string(), location),
        ScriptValue::String(s) => Node::Scalar(s.clone(), location),
        ScriptValue::Bytes(bytes) => Node::Scalar(format!("{bytes:?}"), location),
        ScriptValue::List(items) => Node::Sequence(
            items
                .iter()
                .map(|item| script_to_node(item, location))
                .collect::<Result<_>>()?,
            location,
        ),
        ScriptValue::Dict(entries) => {
            let mut out = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                let key = match k {
                    ScriptValue::String(s) => s.clone(),
                    other => {
                        return Err(CompileError::BridgeTypeError(format!(
                            "dict key {other:?} is not a string"
                        )))
                    }
                };
                out.push((Node::Scalar(key, location), script_to_node(v, location)?));
            }
            Node::Mapping(out, location)
        }
        ScriptValue::Callable(name) => {
            return Err(CompileError::BridgeTypeError(format!(
                "callable '{name}' cannot cross the value bridge"
            )))
        }
        ScriptValue::Struct(_, fields) => {
            let mut out = Vec::with_capacity(fields.len());
            for (k, v) in fields {
                out.push((Node::Scalar(k.clone(), location), script_to_node(v, location)?));
            }
            Node::Mapping(out, location)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_list_and_dict_through_json() {
        let value = ScriptValue::Dict(vec![(
            ScriptValue::String("name".to_string()),
            ScriptValue::List(vec![ScriptValue::Int(1), ScriptValue::Int(2)]),
        )]);
        let json = script_to_json(&value).unwrap();
        let back = json_to_script(&json);
        assert_eq!(back, value);
    }

    #[test]
    fn non_string_dict_key_is_bridge_type_error() {
        let value = ScriptValue::Dict(vec![(ScriptValue::Int(1), ScriptValue::None)]);
        assert!(matches!(
            script_to_json(&value),
            Err(CompileError::BridgeTypeError(_))
        ));
    }

    #[test]
    fn callable_never_crosses_the_bridge() {
        let value = ScriptValue::Callable("main".to_string());
        assert!(matches!(
            script_to_json(&value),
            Err(CompileError::BridgeTypeError(_))
        ));
    }

    #[test]
    fn node_to_script_expands_scalars() {
        let node = crate::node::parse_node("name: $BUILD\n").unwrap();
        let env = vec![("BUILD".to_string(), "release".to_string())];
        let value = node_to_script(&node, &env).unwrap();
        match value {
            ScriptValue::Dict(entries) => {
                assert_eq!(entries[0].1, ScriptValue::String("release".to_string()));
            }
            other => panic!("expected dict, got {other:?}"),
        }
    }
}
