//! Parseable Core (spec.md §4.E): the two-phase walk shared by every
//! Message Descriptor consumer (the generic Proto-Reflective Parser and the
//! fixed-schema Docker-builder parser alike).
//!
//! Grounded on the teacher's `lib.rs` orchestration idiom (single pass over
//! mapping entries, schema-driven dispatch) generalized into collectible
//! sweep + direct match per spec.md §4.E / §9's "collectible hoisting as a
//! scoped frame stack" design note.

use std::collections::HashMap;

use crate::boolevator::Boolevator;
use crate::error::{CompileError, Diagnostics};
use crate::node::{Location, Node};
use crate::schema::SchemaRegistry;

/// A predicate over YAML keys: exact name, or (eventually) a richer matcher.
/// Kept as a simple enum since spec.md §4.E only names exact-name and
/// suffix-based ("*credentials", "*config") nameables.
#[derive(Debug, Clone)]
pub enum Nameable {
    Exact(String),
    Suffix(String),
}

impl Nameable {
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Nameable::Exact(name) => name == key,
            Nameable::Suffix(suffix) => key.ends_with(suffix.as_str()),
        }
    }

    fn describe(&self) -> String {
        match self {
            Nameable::Exact(name) => name.clone(),
            Nameable::Suffix(suffix) => format!("*{suffix}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Optional,
    Required,
    /// Hoisted from enclosing scopes rather than matched at the local level;
    /// spec.md §3's Collectible Field.
    Collectible,
}

/// Runtime state threaded through a single parse: accumulated environment
/// bindings, the shared boolean evaluator, the set of files touched (for
/// cache-invalidation/build-graph purposes), and whether remote I/O is
/// disabled (test mode, invariant I4).
#[derive(Debug, Clone)]
pub struct ParseContext {
    pub env: Vec<(String, String)>,
    pub boolevator: Boolevator,
    pub affected_files: Vec<String>,
    pub test_mode: bool,
}

impl ParseContext {
    pub fn new(env: Vec<(String, String)>) -> Self {
        Self {
            env,
            boolevator: Boolevator::new(),
            affected_files: Vec::new(),
            test_mode: false,
        }
    }

    pub fn child_with_env(&self, additional: Vec<(String, String)>) -> Self {
        let mut env = self.env.clone();
        env.extend(additional);
        Self {
            env,
            boolevator: self.boolevator.clone(),
            affected_files: self.affected_files.clone(),
            test_mode: self.test_mode,
        }
    }
}

type ParseCallback<T> = Box<dyn Fn(&Node, &mut ParseContext, &mut T) -> Result<(), CompileError>>;

/// One registered field: what it matches, its schema fragment, how to parse
/// it, and whether it is required/optional/collectible.
pub struct FieldRegistration<T> {
    pub nameable: Nameable,
    pub kind: FieldKind,
    callback: ParseCallback<T>,
}

impl<T> FieldRegistration<T> {
    pub fn new(
        nameable: Nameable,
        kind: FieldKind,
        callback: impl Fn(&Node, &mut ParseContext, &mut T) -> Result<(), CompileError> + 'static,
    ) -> Self {
        Self { nameable, kind, callback: Box::new(callback) }
    }
}

/// Generic two-phase walker over a mapping [`Node`], parameterized by the
/// output type `T` each field callback mutates.
///
/// Phase 1 (Collectible Sweep): every [`FieldKind::Collectible`] field is
/// looked up first, regardless of position, hoisted from the *local* scope
/// only — callers compose scopes themselves via [`ParseContext::child_with_env`]
/// to get the "inherited from enclosing scopes" behavior (spec.md's scoped
/// frame stack design note), since the frame stack itself lives one level up
/// (whoever walks a tree of nested parsers).
///
/// Phase 2 (Direct Match): every remaining key is matched against the
/// non-collectible registrations; zero matches is [`CompileError::UnknownField`],
/// more than one is [`CompileError::AmbiguousField`]. Missing
/// [`FieldKind::Required`] fields are reported once the walk completes.
pub struct DefaultParser<T> {
    pub registry: SchemaRegistry,
    fields: Vec<FieldRegistration<T>>,
}

impl<T> DefaultParser<T> {
    pub fn new() -> Self {
        Self { registry: SchemaRegistry::new(), fields: Vec::new() }
    }

    pub fn push(&mut self, field: FieldRegistration<T>) {
        self.fields.push(field);
    }

    /// Walks `node` (must be a mapping), accumulating recoverable errors into
    /// `diagnostics` and returning them aggregated once the walk completes.
    pub fn parse(
        &self,
        node: &Node,
        ctx: &mut ParseContext,
        out: &mut T,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), CompileError> {
        let entries = match node.as_mapping() {
            Ok(entries) => entries,
            Err(e) => {
                diagnostics.push(e);
                return Ok(());
            }
        };

        let mut matched_required: HashMap<String, bool> = HashMap::new();
        for field in &self.fields {
            if field.kind == FieldKind::Required {
                matched_required.insert(field.nameable.describe(), false);
            }
        }

        // Phase 1: collectible sweep, order-independent per I3.
        let mut collectible_matched: Vec<bool> = vec![false; entries.len()];
        for (idx, (key, value_node)) in entries.iter().enumerate() {
            for field in self.fields.iter().filter(|f| f.kind == FieldKind::Collectible) {
                if field.nameable.matches(key) {
                    collectible_matched[idx] = true;
                    if let Err(e) = (field.callback)(value_node, ctx, out) {
                        if e.is_recoverable() {
                            diagnostics.push(e);
                        } else {
                            return Err(e);
                        }
                    }
                }
            }
        }

        // Phase 2: direct match against non-collectible registrations.
        for (idx, (key, value_node)) in entries.iter().enumerate() {
            if collectible_matched[idx] {
                continue;
            }
            let loc = value_node.location();
            let candidates: Vec<&FieldRegistration<T>> = self
                .fields
                .iter()
                .filter(|f| f.kind != FieldKind::Collectible && f.nameable.matches(key))
                .collect();

            match candidates.len() {
                0 => diagnostics.push(CompileError::UnknownField {
                    key: key.to_string(),
                    location: loc,
                }),
                1 => {
                    let field = candidates[0];
                    if field.kind == FieldKind::Required {
                        matched_required.insert(field.nameable.describe(), true);
                    }
                    if let Err(e) = (field.callback)(value_node, ctx, out) {
                        if e.is_recoverable() {
                            diagnostics.push(e);
                        } else {
                            return Err(e);
                        }
                    }
                }
                count => diagnostics.push(CompileError::AmbiguousField {
                    key: key.to_string(),
                    location: loc,
                    count,
                }),
            }
        }

        for (name, was_matched) in &matched_required {
            if !was_matched {
                diagnostics.push(CompileError::UnknownField {
                    key: format!("<missing required field '{name}'>"),
                    location: Location::default(),
                });
            }
        }

        Ok(())
    }
}

impl<T> Default for DefaultParser<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::parse_node;

    #[derive(Debug, Default)]
    struct Out {
        name: Option<String>,
        extra: Vec<String>,
    }

    fn build_parser() -> DefaultParser<Out> {
        let mut parser = DefaultParser::new();
        parser.push(FieldRegistration::new(
            Nameable::Exact("name".to_string()),
            FieldKind::Required,
            |node, ctx, out: &mut Out| {
                out.name = Some(node.expanded_string(&ctx.env)?);
                Ok(())
            },
        ));
        parser.push(FieldRegistration::new(
            Nameable::Suffix("config".to_string()),
            FieldKind::Collectible,
            |node, _ctx, out: &mut Out| {
                out.extra.push(node.as_scalar()?.to_string());
                Ok(())
            },
        ));
        parser
    }

    #[test]
    fn direct_match_sets_field() {
        let node = parse_node("name: build\n").unwrap();
        let mut ctx = ParseContext::new(Vec::new());
        let mut out = Out::default();
        let mut diagnostics = Diagnostics::new();
        build_parser().parse(&node, &mut ctx, &mut out, &mut diagnostics).unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(out.name.as_deref(), Some("build"));
    }

    #[test]
    fn unknown_field_is_recoverable_and_collected() {
        let node = parse_node("name: build\nbogus: 1\n").unwrap();
        let mut ctx = ParseContext::new(Vec::new());
        let mut out = Out::default();
        let mut diagnostics = Diagnostics::new();
        build_parser().parse(&node, &mut ctx, &mut out, &mut diagnostics).unwrap();
        assert_eq!(diagnostics.errors().len(), 1);
        assert!(matches!(diagnostics.errors()[0], CompileError::UnknownField { .. }));
    }

    #[test]
    fn missing_required_field_is_reported() {
        let node = parse_node("docker_config: x\n").unwrap();
        let mut ctx = ParseContext::new(Vec::new());
        let mut out = Out::default();
        let mut diagnostics = Diagnostics::new();
        build_parser().parse(&node, &mut ctx, &mut out, &mut diagnostics).unwrap();
        assert!(diagnostics
            .errors()
            .iter()
            .any(|e| matches!(e, CompileError::UnknownField { key, .. } if key.contains("missing required"))));
    }

    #[test]
    fn collectible_field_matches_regardless_of_position() {
        let node = parse_node("docker_config: secret\nname: build\n").unwrap();
        let mut ctx = ParseContext::new(Vec::new());
        let mut out = Out::default();
        let mut diagnostics = Diagnostics::new();
        build_parser().parse(&node, &mut ctx, &mut out, &mut diagnostics).unwrap();
        assert_eq!(out.extra, vec!["secret".to_string()]);
    }
}
