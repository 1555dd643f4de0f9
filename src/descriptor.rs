//! Message Descriptor and Compiled Message (spec.md §3, §4.F data types).
//!
//! No crate in the example pack provides dynamic protobuf reflection (see
//! DESIGN.md, Open Question 3) — this models the descriptor/value pair as
//! plain Rust types over `serde_json::Value`, the teacher's own universal
//! dynamic-value representation (`ast.rs`, `coerce.rs`, `validate.rs`).

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use crate::error::{CompileError, Result};
use crate::node::Location;

/// The shape of a single field, as a reflective descriptor would report it.
/// No hardcoded message shape exists anywhere else in this crate — every
/// consumer (the generic Proto-Reflective Parser, the Docker-builder fixed
/// parser) builds its behavior from these.
#[derive(Debug, Clone)]
pub enum FieldKind {
    String,
    Int64,
    Uint64,
    Int32,
    Uint32,
    Float,
    Double,
    Bool,
    Enum(Vec<String>),
    Message(Box<MessageDescriptor>),
    /// `bytes`/`group` — explicitly unsupported per spec.md §4.F.
    Unsupported(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Singular,
    Repeated,
    /// A `map<string, V>` field.
    Map,
}

#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub cardinality: Cardinality,
}

#[derive(Debug, Clone, Default)]
pub struct MessageDescriptor {
    pub fields: Vec<FieldDescriptor>,
}

impl MessageDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn push(&mut self, descriptor: FieldDescriptor) -> &mut Self {
        self.fields.push(descriptor);
        self
    }
}

/// A dynamic, already-validated value tree produced by a parser: scalars set
/// once, repeated fields preserve encounter order, map fields are emitted in
/// ascending byte-lexicographic key order for determinism (invariant I2).
#[derive(Debug, Clone, Default)]
pub struct CompiledMessage {
    scalars: BTreeMap<String, JsonValue>,
    repeated: BTreeMap<String, Vec<JsonValue>>,
    maps: BTreeMap<String, BTreeMap<String, String>>,
}

impl CompiledMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a scalar field. Setting the same field twice is a logic error in
    /// the calling parser (each descriptor field is registered once), so the
    /// second write simply overwrites — schema mismatches that would cause a
    /// double-write are caught earlier, at the Parseable Core's ambiguous-
    /// field check.
    pub fn set_scalar(&mut self, field: &str, value: JsonValue) {
        self.scalars.insert(field.to_string(), value);
    }

    pub fn get_scalar(&self, field: &str) -> Option<&JsonValue> {
        self.scalars.get(field)
    }

    pub fn push_repeated(&mut self, field: &str, value: JsonValue) {
        self.repeated.entry(field.to_string()).or_default().push(value);
    }

    pub fn get_repeated(&self, field: &str) -> &[JsonValue] {
        self.repeated.get(field).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn set_map(&mut self, field: &str, entries: BTreeMap<String, String>) {
        self.maps.insert(field.to_string(), entries);
    }

    pub fn get_map(&self, field: &str) -> Option<&BTreeMap<String, String>> {
        self.maps.get(field)
    }

    /// Renders the whole message as a single `serde_json::Value`, with map
    /// fields already in ascending key order (`BTreeMap` iterates sorted),
    /// satisfying I2's "byte-identical for identical logical input".
    pub fn to_json(&self) -> JsonValue {
        let mut root = serde_json::Map::new();
        for (k, v) in &self.scalars {
            root.insert(k.clone(), v.clone());
        }
        for (k, items) in &self.repeated {
            root.insert(k.clone(), JsonValue::Array(items.clone()));
        }
        for (k, map) in &self.maps {
            let mut obj = serde_json::Map::new();
            for (mk, mv) in map {
                obj.insert(mk.clone(), JsonValue::String(mv.clone()));
            }
            root.insert(k.clone(), JsonValue::Object(obj));
        }
        JsonValue::Object(root)
    }

    /// Decodes a previously-serialized message back out of its map
    /// representation. Callers performing best-effort decodes (see
    /// `src/platform.rs`'s platform/architecture guessing, SPEC_FULL.md
    /// §3.2) must log a returned error via `tracing::warn!` before falling
    /// back, never silently discard it as the Go original's
    /// `_ = proto.Unmarshal(...)` does.
    pub fn from_json(value: &JsonValue, location: Location) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| CompileError::SchemaMismatch {
            location,
            message: "compiled message must decode from a JSON object".to_string(),
        })?;
        let mut message = CompiledMessage::new();
        for (k, v) in obj {
            match v {
                JsonValue::Array(items) => {
                    for item in items {
                        message.push_repeated(k, item.clone());
                    }
                }
                JsonValue::Object(map) if map.values().all(|v| v.is_string()) => {
                    let entries = map
                        .iter()
                        .map(|(mk, mv)| (mk.clone(), mv.as_str().unwrap_or_default().to_string()))
                        .collect();
                    message.set_map(k, entries);
                }
                other => message.set_scalar(k, other.clone()),
            }
        }
        Ok(message)
    }
}

/// Byte-size string parser for the `memory` field family, and for
/// `--log-rotate-size` (SPEC_FULL.md §2.3, reusing this same parser).
///
/// Open Question resolution (DESIGN.md): MiB-as-megabytes. Both `MB` and
/// `MiB` suffixes are treated as binary multiples of 1,048,576 bytes; the
/// returned value is in megabytes. `"1 GiB"` and `"1 GB"` both parse to
/// `1024`.
pub fn parse_megabytes(raw: &str, location: Location) -> Result<i64> {
    const MIB: f64 = 1024.0 * 1024.0;
    let trimmed = raw.trim();
    let split_at = trimmed
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(trimmed.len());
    let (number_part, unit_part) = trimmed.split_at(split_at);
    let number: f64 = number_part.trim().parse().map_err(|_| CompileError::NumericOverflow {
        location,
        message: format!("'{raw}' is not a valid memory size"),
    })?;
    let unit = unit_part.trim().to_ascii_lowercase();
    let bytes = match unit.as_str() {
        "" | "mb" | "mib" | "m" => number * MIB,
        "gb" | "gib" | "g" => number * MIB * 1024.0,
        "kb" | "kib" | "k" => number * 1024.0,
        "b" => number,
        other => {
            return Err(CompileError::NumericOverflow {
                location,
                message: format!("unrecognized memory unit '{other}' in '{raw}'"),
            })
        }
    };
    Ok((bytes / MIB).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> Location {
        Location { line: 1, col: 1 }
    }

    #[test]
    fn mb_and_mib_agree() {
        assert_eq!(parse_megabytes("1 GiB", loc()).unwrap(), 1024);
        assert_eq!(parse_megabytes("1 GB", loc()).unwrap(), 1024);
    }

    #[test]
    fn bare_number_is_megabytes() {
        assert_eq!(parse_megabytes("512", loc()).unwrap(), 512);
    }

    #[test]
    fn rejects_unknown_unit() {
        assert!(parse_megabytes("5 furlongs", loc()).is_err());
    }

    #[test]
    fn to_json_sorts_map_fields_by_key() {
        let mut message = CompiledMessage::new();
        let mut map = BTreeMap::new();
        map.insert("z".to_string(), "1".to_string());
        map.insert("a".to_string(), "2".to_string());
        message.set_map("labels", map);
        let rendered = message.to_json();
        let keys: Vec<&String> = rendered["labels"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["a", "z"]);
    }

    #[test]
    fn round_trips_through_json() {
        let mut message = CompiledMessage::new();
        message.set_scalar("name", JsonValue::String("build".to_string()));
        message.push_repeated("depends_on", JsonValue::String("lint".to_string()));
        let json = message.to_json();
        let decoded = CompiledMessage::from_json(&json, loc()).unwrap();
        assert_eq!(decoded.get_scalar("name"), Some(&JsonValue::String("build".to_string())));
        assert_eq!(decoded.get_repeated("depends_on").len(), 1);
    }
}
