//! Tree-walking evaluator for the Script VM's statement/expression grammar.

use std::collections::HashMap;

use super::parser::{BinOp, Expr, Stmt, UnaryOp};
use crate::value::ScriptValue;
use crate::vfs::FileSystem;

#[derive(Debug, Clone)]
pub enum EvalError {
    NotFound(String),
    UnexpectedResult(String),
    Runtime { message: String, backtrace: String },
}

struct Function {
    params: Vec<String>,
    body: Vec<Stmt>,
}

pub struct Interpreter {
    #[allow(dead_code)]
    fs: Box<dyn FileSystem>,
    env: Vec<(String, String)>,
    functions: HashMap<String, Function>,
    logs: String,
    call_stack: Vec<String>,
}

impl Interpreter {
    pub fn new(fs: Box<dyn FileSystem>, env: Vec<(String, String)>) -> Self {
        Self {
            fs,
            env,
            functions: HashMap::new(),
            logs: String::new(),
            call_stack: Vec::new(),
        }
    }

    pub fn take_logs(&mut self) -> String {
        std::mem::take(&mut self.logs)
    }

    /// Collects every top-level `def`, then calls `entry_name` with
    /// `arguments`. `main`'s result must be a list or dict (spec.md §4.G);
    /// any other entry point's result is returned as-is.
    pub fn run_entry(
        &mut self,
        program: &[Stmt],
        entry_name: &str,
        arguments: Vec<ScriptValue>,
    ) -> Result<ScriptValue, EvalError> {
        for stmt in program {
            if let Stmt::Def { name, params, body } = stmt {
                self.functions.insert(
                    name.clone(),
                    Function { params: params.clone(), body: body.clone() },
                );
            }
        }

        let Some(function) = self.functions.get(entry_name) else {
            return Err(EvalError::NotFound(format!("'{entry_name}' is not defined")));
        };
        if arguments.len() > function.params.len() {
            return Err(EvalError::Runtime {
                message: format!(
                    "'{entry_name}' takes at most {} argument(s), got {}",
                    function.params.len(),
                    arguments.len()
                ),
                backtrace: entry_name.to_string(),
            });
        }

        let params = function.params.clone();
        let body = function.body.clone();
        let mut scope = HashMap::new();
        for (param, value) in params.iter().zip(arguments) {
            scope.insert(param.clone(), value);
        }

        self.call_stack.push(entry_name.to_string());
        let result = self.exec_block(&body, &mut scope);
        self.call_stack.pop();

        let value = match result {
            Ok(Some(value)) => value,
            Ok(None) => ScriptValue::None,
            Err(e) => return Err(e),
        };

        if entry_name == "main" && !matches!(value, ScriptValue::List(_) | ScriptValue::Dict(_)) {
            return Err(EvalError::UnexpectedResult(format!(
                "main must return a list or dict, got {value:?}"
            )));
        }
        Ok(value)
    }

    fn exec_block(
        &mut self,
        body: &[Stmt],
        scope: &mut HashMap<String, ScriptValue>,
    ) -> Result<Option<ScriptValue>, EvalError> {
        for stmt in body {
            match stmt {
                Stmt::Def { .. } => {}
                Stmt::Assign(name, expr) => {
                    let value = self.eval_expr(expr, scope)?;
                    scope.insert(name.clone(), value);
                }
                Stmt::Return(expr) => {
                    return Ok(Some(self.eval_expr(expr, scope)?));
                }
                Stmt::Expr(expr) => {
                    self.eval_expr(expr, scope)?;
                }
            }
        }
        Ok(None)
    }

    fn backtrace(&self) -> String {
        self.call_stack.join(" -> ")
    }

    fn runtime_error(&self, message: impl Into<String>) -> EvalError {
        EvalError::Runtime { message: message.into(), backtrace: self.backtrace() }
    }

    fn eval_expr(
        &mut self,
        expr: &Expr,
        scope: &mut HashMap<String, ScriptValue>,
    ) -> Result<ScriptValue, EvalError> {
        match expr {
            Expr::Int(n) => Ok(ScriptValue::Int(*n)),
            Expr::Float(f) => Ok(ScriptValue::Float(*f)),
            Expr::Str(s) => Ok(ScriptValue::String(self.expand(s))),
            Expr::Bool(b) => Ok(ScriptValue::Bool(*b)),
            Expr::None => Ok(ScriptValue::None),
            Expr::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval_expr(item, scope)?);
                }
                Ok(ScriptValue::List(out))
            }
            Expr::Dict(entries) => {
                let mut out = Vec::with_capacity(entries.len());
                for (k, v) in entries {
                    out.push((self.eval_expr(k, scope)?, self.eval_expr(v, scope)?));
                }
                Ok(ScriptValue::Dict(out))
            }
            Expr::Var(name) => scope
                .get(name)
                .cloned()
                .ok_or_else(|| self.runtime_error(format!("'{name}' is not defined"))),
            Expr::Unary(UnaryOp::Neg, inner) => match self.eval_expr(inner, scope)? {
                ScriptValue::Int(i) => Ok(ScriptValue::Int(-i)),
                ScriptValue::Float(f) => Ok(ScriptValue::Float(-f)),
                other => Err(self.runtime_error(format!("cannot negate {other:?}"))),
            },
            Expr::Unary(UnaryOp::Not, inner) => {
                let value = self.eval_expr(inner, scope)?;
                Ok(ScriptValue::Bool(!value.truthy()))
            }
            Expr::Binary(op, left, right) => self.eval_binary(*op, left, right, scope),
            Expr::Call(name, args) => self.eval_call(name, args, scope),
        }
    }

    fn eval_binary(
        &mut self,
        op: BinOp,
        left: &Expr,
        right: &Expr,
        scope: &mut HashMap<String, ScriptValue>,
    ) -> Result<ScriptValue, EvalError> {
        if matches!(op, BinOp::And) {
            let l = self.eval_expr(left, scope)?;
            if !l.truthy() {
                return Ok(ScriptValue::Bool(false));
            }
            return Ok(ScriptValue::Bool(self.eval_expr(right, scope)?.truthy()));
        }
        if matches!(op, BinOp::Or) {
            let l = self.eval_expr(left, scope)?;
            if l.truthy() {
                return Ok(ScriptValue::Bool(true));
            }
            return Ok(ScriptValue::Bool(self.eval_expr(right, scope)?.truthy()));
        }

        let l = self.eval_expr(left, scope)?;
        let r = self.eval_expr(right, scope)?;

        match op {
            BinOp::Eq => return Ok(ScriptValue::Bool(l == r)),
            BinOp::NotEq => return Ok(ScriptValue::Bool(l != r)),
            _ => {}
        }

        if let (ScriptValue::String(a), ScriptValue::String(b)) = (&l, &r) {
            return match op {
                BinOp::Add => Ok(ScriptValue::String(format!("{a}{b}"))),
                BinOp::Lt => Ok(ScriptValue::Bool(a < b)),
                BinOp::Lte => Ok(ScriptValue::Bool(a <= b)),
                BinOp::Gt => Ok(ScriptValue::Bool(a > b)),
                BinOp::Gte => Ok(ScriptValue::Bool(a >= b)),
                _ => Err(self.runtime_error(format!("unsupported string operator {op:?}"))),
            };
        }

        let (a, b) = (self.as_number(&l)?, self.as_number(&r)?);
        let both_int = matches!(l, ScriptValue::Int(_)) && matches!(r, ScriptValue::Int(_));

        match op {
            BinOp::Add => Ok(self.numeric_result(a + b, both_int)),
            BinOp::Sub => Ok(self.numeric_result(a - b, both_int)),
            BinOp::Mul => Ok(self.numeric_result(a * b, both_int)),
            BinOp::Div => {
                if b == 0.0 {
                    return Err(self.runtime_error("division by zero"));
                }
                Ok(ScriptValue::Float(a / b))
            }
            BinOp::Mod => {
                if b == 0.0 {
                    return Err(self.runtime_error("modulo by zero"));
                }
                Ok(self.numeric_result(a % b, both_int))
            }
            BinOp::Lt => Ok(ScriptValue::Bool(a < b)),
            BinOp::Lte => Ok(ScriptValue::Bool(a <= b)),
            BinOp::Gt => Ok(ScriptValue::Bool(a > b)),
            BinOp::Gte => Ok(ScriptValue::Bool(a >= b)),
            BinOp::And | BinOp::Or | BinOp::Eq | BinOp::NotEq => unreachable!("handled above"),
        }
    }

    fn numeric_result(&self, value: f64, both_int: bool) -> ScriptValue {
        if both_int {
            ScriptValue::Int(value as i64)
        } else {
            ScriptValue::Float(value)
        }
    }

    fn as_number(&self, value: &ScriptValue) -> Result<f64, EvalError> {
        match value {
            ScriptValue::Int(i) => Ok(*i as f64),
            ScriptValue::Float(f) => Ok(*f),
            other => Err(self.runtime_error(format!("{other:?} is not a number"))),
        }
    }

    fn eval_call(
        &mut self,
        name: &str,
        args: &[Expr],
        scope: &mut HashMap<String, ScriptValue>,
    ) -> Result<ScriptValue, EvalError> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_expr(arg, scope)?);
        }

        if name == "print" {
            let rendered: Vec<String> = values.iter().map(render_for_print).collect();
            self.logs.push_str(&rendered.join(" "));
            self.logs.push('\n');
            return Ok(ScriptValue::None);
        }
        if name == "len" {
            return match values.first() {
                Some(ScriptValue::List(items)) => Ok(ScriptValue::Int(items.len() as i64)),
                Some(ScriptValue::Dict(entries)) => Ok(ScriptValue::Int(entries.len() as i64)),
                Some(ScriptValue::String(s)) => Ok(ScriptValue::Int(s.chars().count() as i64)),
                other => Err(self.runtime_error(format!("len() unsupported for {other:?}"))),
            };
        }

        let Some(function) = self.functions.get(name) else {
            return Err(self.runtime_error(format!("'{name}' is not defined")));
        };
        if values.len() > function.params.len() {
            return Err(self.runtime_error(format!(
                "'{name}' takes at most {} argument(s), got {}",
                function.params.len(),
                values.len()
            )));
        }

        let params = function.params.clone();
        let body = function.body.clone();
        let mut callee_scope = HashMap::new();
        for (param, value) in params.iter().zip(values) {
            callee_scope.insert(param.clone(), value);
        }

        self.call_stack.push(name.to_string());
        let result = self.exec_block(&body, &mut callee_scope);
        self.call_stack.pop();
        Ok(result?.unwrap_or(ScriptValue::None))
    }

    fn expand(&self, raw: &str) -> String {
        crate::env::expand(raw, &self.env, crate::node::Location::default())
            .unwrap_or_else(|_| raw.to_string())
    }
}

fn render_for_print(value: &ScriptValue) -> String {
    match value {
        ScriptValue::String(s) => s.clone(),
        ScriptValue::Int(i) => i.to_string(),
        ScriptValue::Float(f) => f.to_string(),
        ScriptValue::Bool(b) => b.to_string(),
        ScriptValue::None => "None".to_string(),
        other => format!("{other:?}"),
    }
}
