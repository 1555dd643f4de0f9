//! Compiles a CI configuration document — either declarative YAML or a
//! small embedded script that produces YAML — into a strongly-typed,
//! deterministic [`descriptor::CompiledMessage`], driven reflectively by a
//! [`descriptor::MessageDescriptor`] (spec.md §1/§2).
//!
//! Control flow mirrors spec.md §2: a source string enters the Script VM
//! Host (G, [`vm`]) if it is a script, or goes directly to the
//! Proto-Reflective Parser (F, [`proto_parser`]) if it is YAML. The script
//! host's return value crosses the Value Bridge (I, [`value`]) into a
//! [`node::Node`] tree; from there both paths converge on the same walk
//! against the target descriptor, consulting the Environment Expander (B,
//! [`env`]), Boolean Evaluator (C, [`boolevator`]), and Parseable Core (E,
//! [`parseable`]), accumulating diagnostics via the Node Model (A,
//! [`node`]).
//!
//! Use [`compile`] for the general entry point, [`compile_yaml`] /
//! [`compile_script`] for the single-path shortcuts, and [`run_hook`] for a
//! named-hook invocation that never raises a Rust `Err`.

pub mod additional_container;
pub mod boolevator;
pub mod config;
pub mod descriptor;
pub mod dockerbuilder;
pub mod env;
pub mod error;
pub mod node;
pub mod parseable;
pub mod platform;
pub mod proto_parser;
pub mod schema;
pub mod value;
pub mod vfs;
pub mod vm;
pub mod worker;
pub mod yaml_writer;

use std::time::{Duration, Instant};

use serde_json::Value as JsonValue;

pub use descriptor::{CompiledMessage, MessageDescriptor};
pub use error::{CompileError, Result};
pub use value::ScriptValue;

use error::Diagnostics;
use node::Node;
use parseable::ParseContext;
use vfs::FileSystem;
use vm::{CancelToken, ScriptHost};

/// Environment lookup abstraction used by the CLI to build a hermetic
/// (invariant I4) environment vector before handing it to the compiler.
///
/// Grounded on `src/resolve.rs` (teacher)'s `EnvProvider`/`MapEnvProvider`/
/// `ProcessEnvProvider` split.
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// [`EnvProvider`] backed by the process environment.
pub struct ProcessEnvProvider;

impl EnvProvider for ProcessEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// [`EnvProvider`] backed by a caller-supplied map, for tests and hermetic
/// script execution.
#[derive(Debug, Clone, Default)]
pub struct MapEnvProvider {
    values: std::collections::HashMap<String, String>,
}

impl MapEnvProvider {
    pub fn new(values: std::collections::HashMap<String, String>) -> Self {
        Self { values }
    }
}

impl EnvProvider for MapEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Builds an ordered env vector from `keys`, in declaration order, skipping
/// keys the provider doesn't have. This is the only place process
/// environment variables enter the compiler, and only for the keys the
/// caller explicitly names — the rest of the hermetic boundary (I4).
pub fn collect_env(provider: &dyn EnvProvider, keys: &[String]) -> Vec<(String, String)> {
    keys.iter()
        .filter_map(|key| provider.get(key).map(|value| (key.clone(), value)))
        .collect()
}

/// The raw form of a compilation input (spec.md §2's "enters G (if script)
/// or goes directly to F (if YAML)").
pub enum Source<'a> {
    Yaml(&'a str),
    Script(&'a str),
}

/// Output of a full [`compile`] call: the compiled message plus any
/// `print()` output captured while running a script source (empty for a
/// YAML source).
pub struct CompileOutput {
    pub message: CompiledMessage,
    pub output_logs: String,
}

/// `MainResult` from spec.md §6: a script's `main()` re-rendered as a
/// pretty-printed YAML document, alongside captured logs.
pub struct MainResult {
    pub output_logs: String,
    pub yaml_config: String,
}

/// `HookResult` from spec.md §6, with the `duration_ns` field the bare
/// [`vm::HookResult`] does not track (that lives at the orchestration layer,
/// not inside the VM host).
pub struct HookOutcome {
    pub error_message: Option<String>,
    pub output_logs: String,
    pub duration_ns: i64,
    pub result: Option<JsonValue>,
}

/// Runs the full pipeline: script execution (if `source` is a script) or a
/// direct parse (if YAML), then the Proto-Reflective Parser walk against
/// `descriptor`.
pub fn compile(
    source: Source,
    descriptor: &MessageDescriptor,
    env: &[(String, String)],
    fs: Box<dyn FileSystem>,
    cancel: CancelToken,
    poll_interval: Duration,
) -> Result<CompileOutput> {
    let (node, output_logs) = match source {
        Source::Yaml(text) => (node::parse_node(text)?, String::new()),
        Source::Script(text) => {
            let host = ScriptHost::new(fs);
            let script = host.parse(text)?;
            let (value, logs) = host.main(&script, env, cancel, poll_interval)?;
            (value::script_to_node(&value, node::Location::default())?, logs.output)
        }
    };

    let message = walk(&node, descriptor, env)?;
    Ok(CompileOutput { message, output_logs })
}

/// Shortcut for a YAML-only compilation (no Script VM Host involved).
pub fn compile_yaml(
    source: &str,
    descriptor: &MessageDescriptor,
    env: &[(String, String)],
) -> Result<CompiledMessage> {
    let node = node::parse_node(source)?;
    walk(&node, descriptor, env)
}

/// Shortcut for a script-only compilation: runs `main()`, bridges its
/// return value to a [`Node`], then walks it against `descriptor`.
pub fn compile_script(
    source: &str,
    descriptor: &MessageDescriptor,
    env: &[(String, String)],
    fs: Box<dyn FileSystem>,
    cancel: CancelToken,
    poll_interval: Duration,
) -> Result<CompileOutput> {
    compile(Source::Script(source), descriptor, env, fs, cancel, poll_interval)
}

/// Runs a script's `main()` and renders its return value as a standalone
/// YAML document, without walking it against any descriptor — the
/// `MainResult` shape from spec.md §6, for callers that only want
/// generated YAML (e.g. `cirrus-parse --yaml`).
pub fn run_script_main(
    source: &str,
    env: &[(String, String)],
    fs: Box<dyn FileSystem>,
    cancel: CancelToken,
    poll_interval: Duration,
) -> Result<MainResult> {
    let host = ScriptHost::new(fs);
    let script = host.parse(source)?;
    let (value, logs) = host.main(&script, env, cancel, poll_interval)?;
    let json = value::script_to_json(&value)?;
    Ok(MainResult { output_logs: logs.output, yaml_config: yaml_writer::to_yaml_string(&json) })
}

/// Like [`run_script_main`], but a script with no `main` global renders an
/// empty YAML document instead of raising an error — `MainOptional` from
/// spec.md §4.G / `larker.go`.
pub fn run_script_main_optional(
    source: &str,
    env: &[(String, String)],
    fs: Box<dyn FileSystem>,
    cancel: CancelToken,
    poll_interval: Duration,
) -> Result<MainResult> {
    let host = ScriptHost::new(fs);
    let script = host.parse(source)?;
    let (value, logs) = host.main_optional(&script, env, cancel, poll_interval)?;
    let json = value::script_to_json(&value)?;
    Ok(MainResult { output_logs: logs.output, yaml_config: yaml_writer::to_yaml_string(&json) })
}

/// Runs a named hook, folding any failure into [`HookOutcome`] rather than
/// propagating a Rust `Err` — matching spec.md §6's `HookResult` contract
/// and `pkg/larker/larker.go`'s `Hook`.
pub fn run_hook(
    source: &str,
    name: &str,
    arguments: Vec<ScriptValue>,
    env: &[(String, String)],
    fs: Box<dyn FileSystem>,
    cancel: CancelToken,
    poll_interval: Duration,
) -> HookOutcome {
    let started = Instant::now();
    let host = ScriptHost::new(fs);
    let outcome = match host.parse(source) {
        Ok(script) => host.hook(&script, name, arguments, env, cancel, poll_interval),
        Err(err) => vm::HookResult { value: None, error_message: Some(err.to_string()), output_logs: String::new() },
    };
    let duration_ns = started.elapsed().as_nanos().min(i64::MAX as u128) as i64;

    let result = outcome.value.as_ref().and_then(|v| value::script_to_json(v).ok());
    HookOutcome {
        error_message: outcome.error_message,
        output_logs: outcome.output_logs,
        duration_ns,
        result,
    }
}

/// Shared tail of every compilation path: walk `node` against `descriptor`
/// via the Proto-Reflective Parser, aggregating recoverable diagnostics.
fn walk(node: &Node, descriptor: &MessageDescriptor, env: &[(String, String)]) -> Result<CompiledMessage> {
    let parser = proto_parser::build_parser(descriptor);
    let mut ctx = ParseContext::new(env.to_vec());
    let mut out = CompiledMessage::new();
    let mut diagnostics = Diagnostics::new();
    parser.parse(node, &mut ctx, &mut out, &mut diagnostics)?;
    diagnostics.into_result()?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Cardinality, FieldDescriptor, FieldKind as DescKind};
    use crate::vfs::DummyFs;

    fn descriptor() -> MessageDescriptor {
        let mut d = MessageDescriptor::new();
        d.push(FieldDescriptor { name: "name".to_string(), kind: DescKind::String, cardinality: Cardinality::Singular });
        d
    }

    #[test]
    fn compiles_yaml_source_directly() {
        let message = compile_yaml("name: build\n", &descriptor(), &[]).unwrap();
        assert_eq!(message.get_scalar("name"), Some(&JsonValue::String("build".to_string())));
    }

    #[test]
    fn compiles_script_source_through_the_value_bridge() {
        let output = compile_script(
            "def main():\n  return {\"name\": \"generated\"}\n",
            &descriptor(),
            &[],
            Box::new(DummyFs::new()),
            CancelToken::new(),
            Duration::from_millis(10),
        )
        .unwrap();
        assert_eq!(output.message.get_scalar("name"), Some(&JsonValue::String("generated".to_string())));
    }

    #[test]
    fn run_hook_folds_errors_into_the_outcome_rather_than_erroring() {
        let outcome = run_hook(
            "def broken():\n  return 1 / 0\n",
            "broken",
            Vec::new(),
            &[],
            Box::new(DummyFs::new()),
            CancelToken::new(),
            Duration::from_millis(10),
        );
        assert!(outcome.error_message.is_some());
        assert!(outcome.result.is_none());
    }

    #[test]
    fn run_script_main_renders_yaml() {
        let result = run_script_main(
            "def main():\n  return {\"name\": \"build\"}\n",
            &[],
            Box::new(DummyFs::new()),
            CancelToken::new(),
            Duration::from_millis(10),
        )
        .unwrap();
        assert!(result.yaml_config.contains("name: build"));
    }

    #[test]
    fn run_script_main_optional_renders_empty_yaml_without_a_main() {
        let result = run_script_main_optional(
            "x = 1\n",
            &[],
            Box::new(DummyFs::new()),
            CancelToken::new(),
            Duration::from_millis(10),
        )
        .unwrap();
        assert_eq!(result.yaml_config, yaml_writer::to_yaml_string(&JsonValue::Object(serde_json::Map::new())));
    }

    #[test]
    fn unknown_field_surfaces_as_an_aggregate_error() {
        let err = compile_yaml("bogus: 1\n", &descriptor(), &[]).unwrap_err();
        assert!(matches!(err, CompileError::Aggregate(_)));
    }
}
