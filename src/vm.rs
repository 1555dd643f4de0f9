//! Script VM Host (spec.md §4.G): a small sandboxed interpreter for
//! `.cirrus.star`-style scripts, with `main()`/named-hook entry points,
//! cooperative cancellation, and script-stack backtraces on error.
//!
//! No pack repo embeds a Starlark/Python-like scripting crate (DESIGN.md,
//! Open Question 4) — this extends the teacher's own `expr/`
//! lexer/parser/evaluator idiom with list/dict literals and
//! `def NAME(params): return EXPR` top-level bindings, rather than
//! importing an ungrounded dependency. Concurrency shape (worker thread +
//! 3-way select + `thread.Cancel`-style token) is grounded on
//! `pkg/larker/larker.go`'s `Main`/`Hook`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{CompileError, Result};
use crate::value::ScriptValue;
use crate::vfs::FileSystem;

mod lexer;
mod parser;
mod eval;

pub use parser::{Expr, Stmt};

/// A live, cancellable script execution token, handed to callers so they can
/// request early termination of a running `main`/hook call.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Captured `print()` output plus, on failure, a rendered call-stack
/// backtrace — grounded on `larker.go`'s `logsWithErrorAttached`.
#[derive(Debug, Clone, Default)]
pub struct RunLogs {
    pub output: String,
}

impl RunLogs {
    fn attach_backtrace(&self, backtrace: &str) -> String {
        let mut out = self.output.clone();
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(backtrace);
        out
    }
}

/// Result of a named-hook call: errors are returned as data (not a Rust
/// `Err`), matching `larker.go`'s `HookResult{ErrorMessage, OutputLogs}`.
#[derive(Debug, Clone)]
pub struct HookResult {
    pub value: Option<ScriptValue>,
    pub error_message: Option<String>,
    pub output_logs: String,
}

/// A parsed, not-yet-executed script: top-level statements plus `def`
/// bindings collected during parsing.
pub struct Script {
    program: Vec<Stmt>,
}

/// The declared parameter count of `script`'s top-level `main` def, or 0 if
/// there is no such def (the missing-entry-point case is caught later, by
/// `call_entry`'s lookup).
fn main_param_count(script: &Script) -> usize {
    script
        .program
        .iter()
        .find_map(|stmt| match stmt {
            Stmt::Def { name, params, .. } if name == "main" => Some(params.len()),
            _ => None,
        })
        .unwrap_or(0)
}

/// Hosts script execution against a [`FileSystem`] for `load()`.
pub struct ScriptHost {
    fs: Box<dyn FileSystem>,
}

impl ScriptHost {
    pub fn new(fs: Box<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Parses `source` into a [`Script`], raising [`CompileError::LoadFailed`]
    /// on a syntax error.
    pub fn parse(&self, source: &str) -> Result<Script> {
        let tokens = lexer::tokenize(source).map_err(CompileError::LoadFailed)?;
        let program = parser::parse_program(tokens).map_err(CompileError::LoadFailed)?;
        Ok(Script { program })
    }

    /// Runs `script`'s top-level `main()` global function to completion,
    /// racing a worker thread against cancellation, mirroring `larker.go`'s
    /// `select { case <-resCh: ...; case <-errCh: ...; case <-ctx.Done(): ... }`.
    ///
    /// `main` may be declared zero-arg or one-arg; a one-arg `main` receives
    /// an opaque context value, per `larker.go`'s `NumParams() != 0` check.
    pub fn main(
        &self,
        script: &Script,
        env: &[(String, String)],
        cancel: CancelToken,
        poll_interval: Duration,
    ) -> Result<(ScriptValue, RunLogs)> {
        let arguments = match main_param_count(script) {
            1 => vec![ScriptValue::Struct("Context".to_string(), Vec::new())],
            _ => Vec::new(),
        };
        self.call_entry(script, "main", arguments, env, cancel, poll_interval)
    }

    /// Like [`ScriptHost::main`], but a script with no `main` global is not
    /// an error: it yields an empty result, matching `larker.go`'s
    /// `MainOptional` wrapping `Main`.
    pub fn main_optional(
        &self,
        script: &Script,
        env: &[(String, String)],
        cancel: CancelToken,
        poll_interval: Duration,
    ) -> Result<(ScriptValue, RunLogs)> {
        match self.main(script, env, cancel, poll_interval) {
            Ok(result) => Ok(result),
            Err(CompileError::NotFound(_)) => {
                Ok((ScriptValue::Dict(Vec::new()), RunLogs::default()))
            }
            Err(other) => Err(other),
        }
    }

    /// Runs a named hook with `arguments`, never propagating a script error
    /// as a Rust `Err` — instead folding it into [`HookResult`].
    pub fn hook(
        &self,
        script: &Script,
        name: &str,
        arguments: Vec<ScriptValue>,
        env: &[(String, String)],
        cancel: CancelToken,
        poll_interval: Duration,
    ) -> HookResult {
        match self.call_entry(script, name, arguments, env, cancel, poll_interval) {
            Ok((value, logs)) => HookResult {
                value: Some(value),
                error_message: None,
                output_logs: logs.output,
            },
            Err(CompileError::ExecFailed { message, backtrace }) => HookResult {
                value: None,
                error_message: Some(message),
                output_logs: RunLogs::default().attach_backtrace(&backtrace),
            },
            Err(other) => HookResult {
                value: None,
                error_message: Some(other.to_string()),
                output_logs: String::new(),
            },
        }
    }

    fn call_entry(
        &self,
        script: &Script,
        name: &str,
        arguments: Vec<ScriptValue>,
        env: &[(String, String)],
        cancel: CancelToken,
        poll_interval: Duration,
    ) -> Result<(ScriptValue, RunLogs)> {
        let (tx, rx) = mpsc::channel();
        let program = script.program.clone();
        let name = name.to_string();
        let env = env.to_vec();
        let fs_handle = self.fs.clone_box();

        std::thread::Builder::new()
            .name(format!("script-vm-{name}"))
            .spawn(move || {
                let mut interp = eval::Interpreter::new(fs_handle, env);
                let result = interp.run_entry(&program, &name, arguments);
                let _ = tx.send((result, interp.take_logs()));
            })
            .expect("failed to spawn script VM worker thread");

        loop {
            match rx.recv_timeout(poll_interval) {
                Ok((Ok(value), logs)) => return Ok((value, RunLogs { output: logs })),
                Ok((Err(eval::EvalError::NotFound(msg)), _)) => {
                    return Err(CompileError::NotFound(msg))
                }
                Ok((Err(eval::EvalError::Runtime { message, backtrace }), _)) => {
                    return Err(CompileError::ExecFailed { message, backtrace })
                }
                Ok((Err(eval::EvalError::UnexpectedResult(msg)), _)) => {
                    return Err(CompileError::MainUnexpectedResult(msg))
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if cancel.is_cancelled() {
                        return Err(CompileError::Cancelled);
                    }
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(CompileError::ExecFailed {
                        message: "script worker thread terminated unexpectedly".to_string(),
                        backtrace: String::new(),
                    })
                }
            }
        }
    }
}
