//! Uniform tree view over parsed YAML with source location info.
//!
//! Grounded on the teacher's `mini_yaml.rs` hand-rolled recursive-descent
//! parser (line-oriented, defensive depth/size limits) and `ast.rs`'s
//! node-shaped types, generalized into a tree the rest of the pipeline can
//! walk without re-parsing.

use std::collections::BTreeSet;
use std::fmt;

use crate::env::expand;
use crate::error::{CompileError, Result};

/// Maximum nesting depth accepted by the block-structure parser. Guards
/// against pathological input driving the recursive descent into a stack
/// overflow.
const MAX_CONTAINER_DEPTH: usize = 256;
/// Maximum number of lines accepted in a single document.
const MAX_DOCUMENT_LINES: usize = 200_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Source position of a [`Node`]: file name is tracked by the caller since a
/// single parse only ever has one file, line/col are 1-based.
pub struct Location {
    pub line: usize,
    pub col: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Debug, Clone)]
/// A tagged tree element produced by parsing a YAML-subset document.
///
/// Immutable after parsing; mappings preserve insertion order.
pub enum Node {
    Scalar(String, Location),
    Mapping(Vec<(Node, Node)>, Location),
    Sequence(Vec<Node>, Location),
}

impl Node {
    pub fn location(&self) -> Location {
        match self {
            Node::Scalar(_, loc) => *loc,
            Node::Mapping(_, loc) => *loc,
            Node::Sequence(_, loc) => *loc,
        }
    }

    fn mismatch(&self, expected: &str) -> CompileError {
        CompileError::SchemaMismatch {
            location: self.location(),
            message: format!("expected {expected}, found {}", self.kind_name()),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Node::Scalar(..) => "scalar",
            Node::Mapping(..) => "mapping",
            Node::Sequence(..) => "sequence",
        }
    }

    /// Direct children as `(key, value)` pairs; empty for scalars/sequences.
    pub fn children(&self) -> &[(Node, Node)] {
        match self {
            Node::Mapping(entries, _) => entries,
            _ => &[],
        }
    }

    pub fn as_scalar(&self) -> Result<&str> {
        match self {
            Node::Scalar(s, _) => Ok(s),
            _ => Err(self.mismatch("scalar")),
        }
    }

    pub fn as_sequence(&self) -> Result<&[Node]> {
        match self {
            Node::Sequence(items, _) => Ok(items),
            _ => Err(self.mismatch("sequence")),
        }
    }

    pub fn as_mapping(&self) -> Result<Vec<(&str, &Node)>> {
        match self {
            Node::Mapping(entries, _) => entries
                .iter()
                .map(|(k, v)| Ok((k.as_scalar()?, v)))
                .collect(),
            _ => Err(self.mismatch("mapping")),
        }
    }

    /// Raw scalar, expanded against `env` via the Environment Expander.
    pub fn expanded_string(&self, env: &[(String, String)]) -> Result<String> {
        let raw = self.as_scalar()?;
        expand(raw, env, self.location())
    }

    /// Sequence of scalars, each expanded against `env`.
    pub fn slice_of_expanded_strings(&self, env: &[(String, String)]) -> Result<Vec<String>> {
        self.as_sequence()?
            .iter()
            .map(|item| item.expanded_string(env))
            .collect()
    }

    /// Evaluates this scalar as a boolean predicate via the Boolean Evaluator.
    pub fn bool_value(
        &self,
        env: &[(String, String)],
        boolevator: &crate::boolevator::Boolevator,
    ) -> Result<bool> {
        let raw = self.as_scalar()?;
        boolevator.eval(raw, env).map_err(|message| CompileError::EvalError {
            location: self.location(),
            message,
        })
    }

    /// A mapping of scalar keys to raw (unexpanded) scalar values.
    pub fn string_mapping(&self) -> Result<Vec<(String, String)>> {
        self.as_mapping()?
            .into_iter()
            .map(|(k, v)| Ok((k.to_string(), v.as_scalar()?.to_string())))
            .collect()
    }

    /// Accepts either a mapping, or a sequence of single-entry mappings
    /// (`docker_arguments`'s dual shape), expanding every value.
    pub fn map_or_list_of_maps_with_expansion(
        &self,
        env: &[(String, String)],
    ) -> Result<Vec<(String, String)>> {
        match self {
            Node::Mapping(..) => self
                .as_mapping()?
                .into_iter()
                .map(|(k, v)| Ok((k.to_string(), v.expanded_string(env)?)))
                .collect(),
            Node::Sequence(items, _) => {
                let mut out = Vec::new();
                for item in items {
                    for (k, v) in item.as_mapping()? {
                        out.push((k.to_string(), v.expanded_string(env)?));
                    }
                }
                Ok(out)
            }
            Node::Scalar(..) => Err(self.mismatch("mapping or list of mappings")),
        }
    }
}

/// Parses a YAML-subset document into a [`Node`] tree.
///
/// Supports block mappings/sequences (2-space indent), inline `{k: v}` /
/// `[a, b]` collections, single/double-quoted and bare scalars, and `#`
/// comments. Duplicate mapping keys at the same level are a
/// [`CompileError::SchemaMismatch`], matching spec.md §8's boundary behavior.
pub fn parse_node(source: &str) -> Result<Node> {
    let lines: Vec<&str> = source.lines().collect();
    if lines.len() > MAX_DOCUMENT_LINES {
        return Err(CompileError::SchemaMismatch {
            location: Location { line: 1, col: 1 },
            message: format!("document exceeds {MAX_DOCUMENT_LINES} lines"),
        });
    }

    let mut parser = BlockParser { lines: &lines, pos: 0 };
    let node = parser.parse_block(0, 0)?;
    Ok(node.unwrap_or(Node::Mapping(Vec::new(), Location { line: 1, col: 1 })))
}

struct BlockParser<'a> {
    lines: &'a [&'a str],
    pos: usize,
}

impl<'a> BlockParser<'a> {
    fn peek(&self) -> Option<(&'a str, usize)> {
        self.lines.get(self.pos).map(|l| (*l, self.pos))
    }

    fn skip_blank_and_comments(&mut self) {
        while let Some((line, _)) = self.peek() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn indent_of(line: &str) -> usize {
        line.chars().take_while(|c| *c == ' ').count()
    }

    fn parse_block(&mut self, min_indent: usize, depth: usize) -> Result<Option<Node>> {
        if depth > MAX_CONTAINER_DEPTH {
            return Err(CompileError::SchemaMismatch {
                location: Location { line: self.pos + 1, col: 1 },
                message: format!("nesting exceeds {MAX_CONTAINER_DEPTH} levels"),
            });
        }

        self.skip_blank_and_comments();
        let Some((first_line, first_idx)) = self.peek() else {
            return Ok(None);
        };
        let indent = Self::indent_of(first_line);
        if indent < min_indent {
            return Ok(None);
        }

        let trimmed = first_line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("- ") {
            return self.parse_sequence(indent, depth, rest, first_idx);
        }
        if trimmed == "-" {
            return self.parse_sequence(indent, depth, "", first_idx);
        }
        self.parse_mapping(indent, depth)
    }

    fn parse_sequence(
        &mut self,
        indent: usize,
        depth: usize,
        _first_rest: &str,
        first_idx: usize,
    ) -> Result<Option<Node>> {
        let mut items = Vec::new();
        loop {
            self.skip_blank_and_comments();
            let Some((line, idx)) = self.peek() else { break };
            if Self::indent_of(line) != indent {
                break;
            }
            let trimmed = line.trim_start();
            let Some(rest) = trimmed
                .strip_prefix("- ")
                .or_else(|| (trimmed == "-").then_some(""))
            else {
                break;
            };
            let loc = Location { line: idx + 1, col: indent + 1 };
            self.pos += 1;
            if rest.trim().is_empty() {
                let child = self.parse_block(indent + 1, depth + 1)?;
                items.push(child.unwrap_or(Node::Scalar(String::new(), loc)));
            } else if let Some(inline) = parse_inline(rest.trim(), loc)? {
                items.push(inline);
            } else {
                items.push(parse_scalar_line(rest.trim(), loc));
            }
        }
        Ok(Some(Node::Sequence(items, Location { line: first_idx + 1, col: indent + 1 })))
    }

    fn parse_mapping(&mut self, indent: usize, depth: usize) -> Result<Option<Node>> {
        let mut entries: Vec<(Node, Node)> = Vec::new();
        let mut seen_keys = BTreeSet::new();
        let start_loc = self.peek().map(|(_, idx)| Location { line: idx + 1, col: indent + 1 });

        loop {
            self.skip_blank_and_comments();
            let Some((line, idx)) = self.peek() else { break };
            let this_indent = Self::indent_of(line);
            if this_indent != indent {
                break;
            }
            let trimmed = line.trim_start();
            if trimmed.starts_with("- ") || trimmed == "-" {
                break;
            }

            let (key_text, rest) = split_key_value(trimmed).ok_or_else(|| {
                CompileError::SchemaMismatch {
                    location: Location { line: idx + 1, col: this_indent + 1 },
                    message: format!("expected 'key: value' mapping entry, found '{trimmed}'"),
                }
            })?;
            let loc = Location { line: idx + 1, col: this_indent + 1 };
            self.pos += 1;

            if !seen_keys.insert(key_text.to_string()) {
                return Err(CompileError::SchemaMismatch {
                    location: loc,
                    message: format!("duplicate mapping key '{key_text}'"),
                });
            }

            let key_node = Node::Scalar(key_text.to_string(), loc);
            let value_node = if rest.trim().is_empty() {
                match self.parse_block(indent + 1, depth + 1)? {
                    Some(child) => child,
                    None => Node::Scalar(String::new(), loc),
                }
            } else if let Some(inline) = parse_inline(rest.trim(), loc)? {
                inline
            } else {
                parse_scalar_line(rest.trim(), loc)
            };

            entries.push((key_node, value_node));
        }

        if entries.is_empty() {
            return Ok(None);
        }
        Ok(Some(Node::Mapping(entries, start_loc.unwrap_or_default())))
    }
}

/// Splits `key: value` (or `key:`) at the first unquoted colon-space.
fn split_key_value(line: &str) -> Option<(&str, &str)> {
    if let Some(rest) = line.strip_suffix(':') {
        return Some((rest, ""));
    }
    let bytes = line.as_bytes();
    let mut in_quotes: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match in_quotes {
            Some(q) if b == q => in_quotes = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => in_quotes = Some(b),
            None if b == b':' && (i + 1 == bytes.len() || bytes[i + 1] == b' ') => {
                return Some((line[..i].trim(), line[i + 1..].trim_start()));
            }
            None => {}
        }
        i += 1;
    }
    None
}

/// Parses `{...}` / `[...]` inline collections; returns `None` if `text`
/// doesn't start with either delimiter, meaning the caller should treat it
/// as a scalar.
fn parse_inline(text: &str, loc: Location) -> Result<Option<Node>> {
    if text.starts_with('{') {
        let inner = text
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .ok_or_else(|| CompileError::SchemaMismatch {
                location: loc,
                message: "unterminated inline mapping".to_string(),
            })?;
        let mut entries = Vec::new();
        for part in split_top_level(inner, ',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (k, v) = split_key_value(part).ok_or_else(|| CompileError::SchemaMismatch {
                location: loc,
                message: format!("invalid inline mapping entry '{part}'"),
            })?;
            entries.push((
                Node::Scalar(k.to_string(), loc),
                parse_scalar_line(v.trim(), loc),
            ));
        }
        return Ok(Some(Node::Mapping(entries, loc)));
    }
    if text.starts_with('[') {
        let inner = text
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .ok_or_else(|| CompileError::SchemaMismatch {
                location: loc,
                message: "unterminated inline sequence".to_string(),
            })?;
        let items = split_top_level(inner, ',')
            .into_iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(|p| parse_scalar_line(p, loc))
            .collect();
        return Ok(Some(Node::Sequence(items, loc)));
    }
    Ok(None)
}

fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    let mut in_quotes: Option<char> = None;
    for (i, c) in text.char_indices() {
        match in_quotes {
            Some(q) if c == q => in_quotes = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => in_quotes = Some(c),
                '{' | '[' => depth += 1,
                '}' | ']' => depth -= 1,
                c if c == sep && depth == 0 => {
                    out.push(&text[start..i]);
                    start = i + c.len_utf8();
                }
                _ => {}
            },
        }
    }
    out.push(&text[start..]);
    out
}

fn parse_scalar_line(text: &str, loc: Location) -> Node {
    let unquoted = unquote(text);
    Node::Scalar(unquoted, loc)
}

fn unquote(text: &str) -> String {
    if text.len() >= 2 {
        if let Some(inner) = text.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
            return inner.replace("\\\"", "\"").replace("\\n", "\n");
        }
        if let Some(inner) = text.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
            return inner.replace("''", "'");
        }
    }
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_mapping() {
        let node = parse_node("name: build\nplatform: linux\n").unwrap();
        let map = node.as_mapping().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map[0].0, "name");
        assert_eq!(map[0].1.as_scalar().unwrap(), "build");
    }

    #[test]
    fn rejects_duplicate_keys() {
        let err = parse_node("name: a\nname: b\n").unwrap_err();
        assert!(matches!(err, CompileError::SchemaMismatch { .. }));
    }

    #[test]
    fn parses_nested_sequence() {
        let node = parse_node("tasks:\n  - name: a\n  - name: b\n").unwrap();
        let map = node.as_mapping().unwrap();
        let seq = map[0].1.as_sequence().unwrap();
        assert_eq!(seq.len(), 2);
        assert_eq!(
            seq[1].as_mapping().unwrap()[0].1.as_scalar().unwrap(),
            "b"
        );
    }

    #[test]
    fn parses_inline_collections() {
        let node = parse_node("args: {a: '1', b: '2'}\nlist: [x, y]\n").unwrap();
        let map = node.as_mapping().unwrap();
        let args = map[0].1.as_mapping().unwrap();
        assert_eq!(args.len(), 2);
        let list = map[1].1.as_sequence().unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn empty_document_is_empty_mapping() {
        let node = parse_node("").unwrap();
        assert!(node.as_mapping().unwrap().is_empty());
    }
}
