//! Schema Registry (spec.md §4.D): JSON-Schema-shaped fragments describing
//! each registered field, mirroring the Parseable Core's own field surface
//! rather than validating arbitrary documents.
//!
//! Grounded on the teacher's `schema.rs` (fragment shape, `serde_json::Value`
//! as the fragment representation) narrowed to the fragment-builder role
//! spec.md §4.D names: one builder per field kind, assembled into an object
//! schema per parser by [`SchemaRegistry`].

use std::collections::BTreeMap;

use serde_json::{json, Value as JsonValue};

/// A single field's schema fragment plus whether it is required.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub fragment: JsonValue,
    pub required: bool,
}

/// Accumulates field fragments for one parser, in registration order, and
/// renders them into a single JSON-Schema-shaped `object` document.
#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    fields: BTreeMap<String, FieldSchema>,
    order: Vec<String>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, fragment: JsonValue, required: bool) {
        if !self.fields.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.fields.insert(name.to_string(), FieldSchema { fragment, required });
    }

    /// Renders the accumulated fields into `{"type": "object", "properties":
    /// {...}, "required": [...]}`, matching spec.md §3's Message Descriptor
    /// framing ("no hardcoded shape" — built up purely from registrations).
    pub fn render(&self) -> JsonValue {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for name in &self.order {
            let field = &self.fields[name];
            properties.insert(name.clone(), field.fragment.clone());
            if field.required {
                required.push(JsonValue::String(name.clone()));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// `string`
pub fn string_schema() -> JsonValue {
    json!({ "type": "string" })
}

/// `integer`
pub fn integer_schema() -> JsonValue {
    json!({ "type": "integer" })
}

/// `number`
pub fn number_schema() -> JsonValue {
    json!({ "type": "number" })
}

/// `boolean`
pub fn boolean_schema() -> JsonValue {
    json!({ "type": "boolean" })
}

/// `enum{values...}`
pub fn enum_schema(values: &[&str]) -> JsonValue {
    json!({ "type": "string", "enum": values })
}

/// `array<T>`
pub fn array_schema(item: JsonValue) -> JsonValue {
    json!({ "type": "array", "items": item })
}

/// `map<string,string>`
pub fn string_map_schema() -> JsonValue {
    json!({ "type": "object", "additionalProperties": { "type": "string" } })
}

/// `object`, opaque (no declared properties) — used for fields whose shape
/// is only known by recursing into a nested parser's own registry.
pub fn object_schema() -> JsonValue {
    json!({ "type": "object" })
}

/// A boolean-or-string-DSL condition fragment, used for `only_if`.
pub fn condition_schema() -> JsonValue {
    json!({ "type": "string", "format": "cirrus-condition" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_properties_in_registration_order() {
        let mut registry = SchemaRegistry::new();
        registry.register("name", string_schema(), true);
        registry.register("platform", enum_schema(&["linux", "windows"]), false);

        let rendered = registry.render();
        assert_eq!(rendered["type"], "object");
        assert_eq!(rendered["required"], json!(["name"]));
        assert_eq!(rendered["properties"]["platform"]["enum"][0], "linux");
    }

    #[test]
    fn re_registering_a_name_overwrites_without_duplicating_order() {
        let mut registry = SchemaRegistry::new();
        registry.register("memory", string_schema(), false);
        registry.register("memory", integer_schema(), true);
        let rendered = registry.render();
        assert_eq!(rendered["properties"].as_object().unwrap().len(), 1);
        assert_eq!(rendered["required"], json!(["memory"]));
    }
}
