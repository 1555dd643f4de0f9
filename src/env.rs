//! Environment variable expansion: `${NAME}`, `$NAME`, `${NAME:-default}`.
//!
//! Grounded on the teacher's `resolve.rs` (`resolve_one_binding`'s
//! interpolation regex and recursion-bound-then-error idiom), narrowed to
//! spec.md §4.B's exact substitution grammar.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{CompileError, Result};
use crate::node::Location;

/// Rewrites beyond this bound within a single `expand` call are treated as a
/// cycle (spec.md §4.B: "100-rewrite bound").
const MAX_REWRITES: usize = 100;

fn pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(:-([^}]*))?\}|\$([A-Za-z_][A-Za-z0-9_]*)")
            .expect("static pattern is valid")
    })
}

fn lookup<'a>(env: &'a [(String, String)], name: &str) -> Option<&'a str> {
    env.iter()
        .rev()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

/// Expands all `${NAME}`, `$NAME`, and `${NAME:-default}` references in
/// `input` against `env`. Undefined names with no default expand to the
/// empty string. Re-expands the result until no further substitutions occur,
/// up to [`MAX_REWRITES`] times, after which [`CompileError::ExpansionCycle`]
/// is raised.
pub fn expand(input: &str, env: &[(String, String)], location: Location) -> Result<String> {
    let mut current = input.to_string();
    for _ in 0..MAX_REWRITES {
        let mut changed = false;
        let next = pattern()
            .replace_all(&current, |caps: &regex::Captures| {
                changed = true;
                if let Some(braced) = caps.get(1) {
                    let name = braced.as_str();
                    match lookup(env, name) {
                        Some(value) => value.to_string(),
                        None => caps
                            .get(3)
                            .map(|d| d.as_str().to_string())
                            .unwrap_or_default(),
                    }
                } else if let Some(bare) = caps.get(4) {
                    lookup(env, bare.as_str()).unwrap_or("").to_string()
                } else {
                    String::new()
                }
            })
            .into_owned();
        if !changed || next == current {
            return Ok(next);
        }
        current = next;
    }
    Err(CompileError::ExpansionCycle {
        location,
        bound: MAX_REWRITES,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> Location {
        Location { line: 1, col: 1 }
    }

    #[test]
    fn expands_braced_and_bare() {
        let env = vec![("NAME".to_string(), "cirrus".to_string())];
        assert_eq!(expand("${NAME}-x", &env, loc()).unwrap(), "cirrus-x");
        assert_eq!(expand("$NAME-x", &env, loc()).unwrap(), "cirrus-x");
    }

    #[test]
    fn applies_default_when_undefined() {
        let env = vec![];
        assert_eq!(
            expand("${MISSING:-fallback}", &env, loc()).unwrap(),
            "fallback"
        );
    }

    #[test]
    fn undefined_without_default_is_empty() {
        let env = vec![];
        assert_eq!(expand("[${MISSING}]", &env, loc()).unwrap(), "[]");
    }

    #[test]
    fn detects_expansion_cycle() {
        let env = vec![
            ("A".to_string(), "${B}".to_string()),
            ("B".to_string(), "${A}".to_string()),
        ];
        let err = expand("${A}", &env, loc()).unwrap_err();
        assert!(matches!(err, CompileError::ExpansionCycle { .. }));
    }

    #[test]
    fn later_bindings_shadow_earlier_ones() {
        let env = vec![
            ("NAME".to_string(), "first".to_string()),
            ("NAME".to_string(), "second".to_string()),
        ];
        assert_eq!(expand("$NAME", &env, loc()).unwrap(), "second");
    }
}
