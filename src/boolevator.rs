//! Boolean predicate DSL evaluator: `== != =~ !~ && || !` with parentheses.
//!
//! Grounded on the teacher's `expr/lexer.rs` + `expr/parser.rs` + `expr/eval.rs`
//! triad (hand-rolled tokenizer, recursive-descent parser, tree-walking
//! evaluator), narrowed to spec.md §4.C's string-typed surface: operands are
//! environment-expanded strings, not numbers.

use regex::Regex;

use crate::env::expand;
use crate::node::Location;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    String(String),
    Ident(String),
    EqEq,
    NotEq,
    RegexMatch,
    RegexNotMatch,
    AndAnd,
    OrOr,
    Bang,
    LParen,
    RParen,
    Eof,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { chars: input.chars().peekable() }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, String> {
        let mut tokens = Vec::new();
        loop {
            while matches!(self.chars.peek(), Some(c) if c.is_whitespace()) {
                self.chars.next();
            }
            let Some(&c) = self.chars.peek() else {
                tokens.push(Token::Eof);
                return Ok(tokens);
            };
            match c {
                '(' => { self.chars.next(); tokens.push(Token::LParen); }
                ')' => { self.chars.next(); tokens.push(Token::RParen); }
                '"' | '\'' => tokens.push(Token::String(self.read_quoted(c)?)),
                '=' => {
                    self.chars.next();
                    match self.chars.next() {
                        Some('=') => tokens.push(Token::EqEq),
                        Some('~') => tokens.push(Token::RegexMatch),
                        other => return Err(format!("expected '=' or '~' after '=', found {other:?}")),
                    }
                }
                '!' => {
                    self.chars.next();
                    match self.chars.peek() {
                        Some('=') => { self.chars.next(); tokens.push(Token::NotEq); }
                        Some('~') => { self.chars.next(); tokens.push(Token::RegexNotMatch); }
                        _ => tokens.push(Token::Bang),
                    }
                }
                '&' => {
                    self.chars.next();
                    if self.chars.next() != Some('&') {
                        return Err("expected '&&'".to_string());
                    }
                    tokens.push(Token::AndAnd);
                }
                '|' => {
                    self.chars.next();
                    if self.chars.next() != Some('|') {
                        return Err("expected '||'".to_string());
                    }
                    tokens.push(Token::OrOr);
                }
                _ if c.is_alphanumeric() || c == '_' || c == '$' || c == '.' || c == '-' || c == '/' => {
                    tokens.push(Token::Ident(self.read_ident()));
                }
                other => return Err(format!("unexpected character '{other}'")),
            }
        }
    }

    fn read_quoted(&mut self, quote: char) -> Result<String, String> {
        self.chars.next();
        let mut out = String::new();
        loop {
            match self.chars.next() {
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.chars.next() {
                    Some(c) => out.push(c),
                    None => return Err("unterminated string literal".to_string()),
                },
                Some(c) => out.push(c),
                None => return Err("unterminated string literal".to_string()),
            }
        }
    }

    fn read_ident(&mut self) -> String {
        let mut out = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' || c == '$' || c == '{' || c == '}' || c == '.' || c == '-' || c == '/' || c == ':' {
                out.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        out
    }
}

#[derive(Debug, Clone)]
enum Expr {
    Literal(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    NotEq(Box<Expr>, Box<Expr>),
    Match(Box<Expr>, Box<Expr>),
    NotMatch(Box<Expr>, Box<Expr>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn parse(mut self) -> Result<Expr, String> {
        let expr = self.parse_or()?;
        if *self.peek() != Token::Eof {
            return Err(format!("unexpected trailing token {:?}", self.peek()));
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_and()?;
        while *self.peek() == Token::OrOr {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_unary()?;
        while *self.peek() == Token::AndAnd {
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        if *self.peek() == Token::Bang {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, String> {
        let left = self.parse_primary()?;
        match self.peek().clone() {
            Token::EqEq => { self.advance(); Ok(Expr::Eq(Box::new(left), Box::new(self.parse_primary()?))) }
            Token::NotEq => { self.advance(); Ok(Expr::NotEq(Box::new(left), Box::new(self.parse_primary()?))) }
            Token::RegexMatch => { self.advance(); Ok(Expr::Match(Box::new(left), Box::new(self.parse_primary()?))) }
            Token::RegexNotMatch => { self.advance(); Ok(Expr::NotMatch(Box::new(left), Box::new(self.parse_primary()?))) }
            _ => Ok(left),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.advance() {
            Token::String(s) => Ok(Expr::Literal(s)),
            Token::Ident(s) => Ok(Expr::Literal(s)),
            Token::LParen => {
                let inner = self.parse_or()?;
                if self.advance() != Token::RParen {
                    return Err("expected ')'".to_string());
                }
                Ok(inner)
            }
            other => Err(format!("unexpected token {other:?}")),
        }
    }
}

/// Compiles and evaluates the boolean predicate DSL (spec.md §4.C).
#[derive(Debug, Default, Clone)]
pub struct Boolevator;

impl Boolevator {
    pub fn new() -> Self {
        Self
    }

    /// Parses and evaluates `expression` against `env`, expanding every
    /// literal operand first.
    pub fn eval(&self, expression: &str, env: &[(String, String)]) -> Result<bool, String> {
        let tokens = Lexer::new(expression).tokenize()?;
        let ast = Parser { tokens, pos: 0 }.parse()?;
        self.eval_expr(&ast, env)
    }

    fn eval_expr(&self, expr: &Expr, env: &[(String, String)]) -> Result<bool, String> {
        match expr {
            Expr::Literal(s) => {
                let expanded = self.resolve(s, env)?;
                Ok(!expanded.is_empty() && expanded != "false")
            }
            Expr::Not(inner) => Ok(!self.eval_expr(inner, env)?),
            Expr::And(l, r) => Ok(self.eval_expr(l, env)? && self.eval_expr(r, env)?),
            Expr::Or(l, r) => Ok(self.eval_expr(l, env)? || self.eval_expr(r, env)?),
            Expr::Eq(l, r) => Ok(self.operand(l, env)? == self.operand(r, env)?),
            Expr::NotEq(l, r) => Ok(self.operand(l, env)? != self.operand(r, env)?),
            Expr::Match(l, r) => self.regex_match(l, r, env),
            Expr::NotMatch(l, r) => self.regex_match(l, r, env).map(|matched| !matched),
        }
    }

    fn regex_match(&self, l: &Expr, r: &Expr, env: &[(String, String)]) -> Result<bool, String> {
        let haystack = self.operand(l, env)?;
        let pattern = self.operand(r, env)?;
        let re = Regex::new(&pattern).map_err(|e| format!("invalid regex '{pattern}': {e}"))?;
        Ok(re.is_match(&haystack))
    }

    fn operand(&self, expr: &Expr, env: &[(String, String)]) -> Result<String, String> {
        match expr {
            Expr::Literal(s) => self.resolve(s, env),
            other => {
                let b = self.eval_expr(other, env)?;
                Ok(b.to_string())
            }
        }
    }

    fn resolve(&self, raw: &str, env: &[(String, String)]) -> Result<String, String> {
        expand(raw, env, Location::default()).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> Vec<(String, String)> {
        vec![
            ("CIRRUS_BRANCH".to_string(), "main".to_string()),
            ("CIRRUS_PR".to_string(), "".to_string()),
        ]
    }

    #[test]
    fn equality_and_inequality() {
        let b = Boolevator::new();
        assert!(b.eval("$CIRRUS_BRANCH == 'main'", &env()).unwrap());
        assert!(b.eval("$CIRRUS_BRANCH != 'dev'", &env()).unwrap());
    }

    #[test]
    fn regex_match_and_not_match() {
        let b = Boolevator::new();
        assert!(b.eval("$CIRRUS_BRANCH =~ 'ma.*'", &env()).unwrap());
        assert!(b.eval("$CIRRUS_BRANCH !~ 'dev.*'", &env()).unwrap());
    }

    #[test]
    fn logical_operators_and_negation() {
        let b = Boolevator::new();
        assert!(b
            .eval("$CIRRUS_BRANCH == 'main' && !($CIRRUS_PR == 'set')", &env())
            .unwrap());
        assert!(b
            .eval("$CIRRUS_BRANCH == 'dev' || $CIRRUS_BRANCH == 'main'", &env())
            .unwrap());
    }

    #[test]
    fn bare_identifier_is_truthy_when_nonempty() {
        let b = Boolevator::new();
        assert!(b.eval("$CIRRUS_BRANCH", &env()).unwrap());
        assert!(!b.eval("$CIRRUS_PR", &env()).unwrap());
    }
}
