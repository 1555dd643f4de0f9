//! Platform/architecture guessing (SPEC_FULL.md §3.1/§3.2), ported from
//! `pkg/parser/instance/proto.go`'s `GuessPlatform`/
//! `GuessPlatformOfProtoMessage`/`GuessArchitectureOfProtoMessage`.
//!
//! REDESIGN FLAG applied here: the Go original's `_ = proto.Unmarshal(...)`
//! silently discards a decode error before falling back to an empty
//! message. This crate's equivalent fallible decode
//! ([`CompiledMessage::from_json`]) logs the error via `tracing::warn!`
//! instead (see DESIGN.md, Open Question 2).

use serde_json::Value as JsonValue;

use crate::descriptor::{CompiledMessage, MessageDescriptor};
use crate::node::Location;

/// Fast path: a type-tag string (the Go original's `TypeUrl`) containing one
/// of these substrings short-circuits the full field walk.
pub fn guess_platform_from_type_tag(type_tag: &str) -> Option<&'static str> {
    let lower = type_tag.to_ascii_lowercase();
    if lower.contains("windows") {
        Some("windows")
    } else if lower.contains("freebsd") {
        Some("freebsd")
    } else if lower.contains("darwin") || lower.contains("osx") || lower.contains("anka") || lower.contains("macos") {
        Some("darwin")
    } else {
        None
    }
}

/// Decodes `raw` into a [`CompiledMessage`] for platform guessing,
/// returning `None` (and logging) on failure rather than panicking or
/// silently continuing with garbage state.
fn decode_for_platform_guess(raw: &JsonValue) -> Option<CompiledMessage> {
    match CompiledMessage::from_json(raw, Location::default()) {
        Ok(message) => Some(message),
        Err(err) => {
            tracing::warn!(%err, "failed to decode message while guessing platform; best-effort result only");
            None
        }
    }
}

/// Walks singular message-typed fields recursively, looking for a field
/// named (case-insensitively) `platform`. Present+set returns its lowercased
/// value; present+unset defaults to `"linux"`; absent recurses into
/// non-repeated message fields only.
pub fn guess_platform(raw: &JsonValue, descriptor: &MessageDescriptor) -> String {
    let Some(message) = decode_for_platform_guess(raw) else {
        return "linux".to_string();
    };
    guess_platform_of_compiled(&message, descriptor).unwrap_or_else(|| "linux".to_string())
}

fn guess_platform_of_compiled(message: &CompiledMessage, descriptor: &MessageDescriptor) -> Option<String> {
    if let Some(field) = descriptor.field("platform") {
        let _ = field;
        return Some(match message.get_scalar("platform") {
            Some(JsonValue::String(s)) => s.to_ascii_lowercase(),
            Some(_) | None => "linux".to_string(),
        });
    }

    for field in &descriptor.fields {
        if let crate::descriptor::FieldKind::Message(nested) = &field.kind {
            if field.cardinality == crate::descriptor::Cardinality::Singular {
                if let Some(JsonValue::Object(_)) = message.get_scalar(&field.name) {
                    let child_raw = message.get_scalar(&field.name).cloned().unwrap_or(JsonValue::Null);
                    if let Some(child) = decode_for_platform_guess(&child_raw) {
                        if let Some(found) = guess_platform_of_compiled(&child, nested) {
                            return Some(found);
                        }
                    }
                }
            }
        }
    }
    None
}

/// Same structure as [`guess_platform`] but for `architecture`: no default,
/// no recursion.
pub fn guess_architecture(raw: &JsonValue, descriptor: &MessageDescriptor) -> Option<String> {
    let message = decode_for_platform_guess(raw)?;
    if descriptor.field("architecture").is_none() {
        return None;
    }
    match message.get_scalar("architecture") {
        Some(JsonValue::String(s)) => Some(s.to_ascii_lowercase()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Cardinality, FieldDescriptor, FieldKind};
    use serde_json::json;

    #[test]
    fn type_tag_fast_path_matches_known_substrings() {
        assert_eq!(guess_platform_from_type_tag("type.googleapis.com/api.WindowsInstance"), Some("windows"));
        assert_eq!(guess_platform_from_type_tag("anka-instance"), Some("darwin"));
        assert_eq!(guess_platform_from_type_tag("unknown"), None);
    }

    #[test]
    fn defaults_to_linux_when_platform_field_unset() {
        let mut descriptor = MessageDescriptor::new();
        descriptor.push(FieldDescriptor { name: "platform".to_string(), kind: FieldKind::String, cardinality: Cardinality::Singular });
        let raw = json!({});
        assert_eq!(guess_platform(&raw, &descriptor), "linux");
    }

    #[test]
    fn returns_lowercased_platform_when_set() {
        let mut descriptor = MessageDescriptor::new();
        descriptor.push(FieldDescriptor { name: "platform".to_string(), kind: FieldKind::String, cardinality: Cardinality::Singular });
        let raw = json!({"platform": "WINDOWS"});
        assert_eq!(guess_platform(&raw, &descriptor), "windows");
    }

    #[test]
    fn architecture_has_no_default() {
        let descriptor = MessageDescriptor::new();
        let raw = json!({});
        assert_eq!(guess_architecture(&raw, &descriptor), None);
    }

    #[test]
    fn malformed_message_falls_back_without_panicking() {
        let descriptor = MessageDescriptor::new();
        let raw = json!("not an object");
        assert_eq!(guess_platform(&raw, &descriptor), "linux");
    }
}
