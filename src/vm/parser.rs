//! Recursive-descent parser for the Script VM's statement/expression
//! grammar. Grounded on the teacher's `expr/parser.rs` precedence-climbing
//! shape, extended with `def NAME(params): ...` blocks (Python-style
//! indentation) and list/dict literals.

use super::lexer::Token;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    None,
    List(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Var(String),
    Call(String, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Def { name: String, params: Vec<String>, body: Vec<Stmt> },
    Assign(String, Expr),
    Return(Expr),
    Expr(Expr),
}

struct Line {
    indent: usize,
    tokens: Vec<Token>,
}

fn split_lines(tokens: Vec<Token>) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut current: Option<Line> = None;
    for token in tokens {
        match token {
            Token::LineStart(indent) => {
                if let Some(line) = current.take() {
                    lines.push(line);
                }
                current = Some(Line { indent, tokens: Vec::new() });
            }
            Token::Eof => {
                if let Some(line) = current.take() {
                    lines.push(line);
                }
            }
            other => {
                if let Some(line) = current.as_mut() {
                    line.tokens.push(other);
                }
            }
        }
    }
    lines
}

pub fn parse_program(tokens: Vec<Token>) -> Result<Vec<Stmt>, String> {
    let lines = split_lines(tokens);
    let mut pos = 0;
    parse_block(&lines, &mut pos, 0)
}

fn parse_block(lines: &[Line], pos: &mut usize, min_indent: usize) -> Result<Vec<Stmt>, String> {
    let mut stmts = Vec::new();
    while *pos < lines.len() {
        let line = &lines[*pos];
        if line.indent < min_indent {
            break;
        }
        if line.tokens.first() == Some(&Token::Def) {
            stmts.push(parse_def(lines, pos)?);
        } else {
            stmts.push(parse_simple_stmt(&line.tokens)?);
            *pos += 1;
        }
    }
    Ok(stmts)
}

fn parse_def(lines: &[Line], pos: &mut usize) -> Result<Stmt, String> {
    let header_indent = lines[*pos].indent;
    let header = &lines[*pos].tokens;
    let mut hp = 0usize;
    expect(header, &mut hp, &Token::Def)?;
    let name = match header.get(hp) {
        Some(Token::Ident(n)) => n.clone(),
        other => return Err(format!("expected function name, found {other:?}")),
    };
    hp += 1;
    expect(header, &mut hp, &Token::LParen)?;
    let mut params = Vec::new();
    while header.get(hp) != Some(&Token::RParen) {
        match header.get(hp) {
            Some(Token::Ident(p)) => {
                params.push(p.clone());
                hp += 1;
            }
            other => return Err(format!("expected parameter name, found {other:?}")),
        }
        if header.get(hp) == Some(&Token::Comma) {
            hp += 1;
        }
    }
    expect(header, &mut hp, &Token::RParen)?;
    expect(header, &mut hp, &Token::Colon)?;
    *pos += 1;

    let body = parse_block(lines, pos, header_indent + 1)?;
    if body.is_empty() {
        return Err(format!("'def {name}' has an empty body"));
    }
    Ok(Stmt::Def { name, params, body })
}

fn expect(tokens: &[Token], pos: &mut usize, expected: &Token) -> Result<(), String> {
    match tokens.get(*pos) {
        Some(t) if t == expected => {
            *pos += 1;
            Ok(())
        }
        other => Err(format!("expected {expected:?}, found {other:?}")),
    }
}

fn parse_simple_stmt(tokens: &[Token]) -> Result<Stmt, String> {
    if tokens.first() == Some(&Token::Return) {
        let mut p = ExprParser { tokens, pos: 1 };
        let expr = p.parse_or()?;
        return Ok(Stmt::Return(expr));
    }
    if let (Some(Token::Ident(name)), Some(Token::Eq)) = (tokens.first(), tokens.get(1)) {
        let mut p = ExprParser { tokens, pos: 2 };
        let expr = p.parse_or()?;
        return Ok(Stmt::Assign(name.clone(), expr));
    }
    let mut p = ExprParser { tokens, pos: 0 };
    let expr = p.parse_or()?;
    Ok(Stmt::Expr(expr))
}

struct ExprParser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> ExprParser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::OrOr) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Binary(BinOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_equality()?;
        while self.peek() == Some(&Token::AndAnd) {
            self.advance();
            let right = self.parse_equality()?;
            left = Expr::Binary(BinOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinOp::Eq,
                Some(Token::NotEq) => BinOp::NotEq,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinOp::Lt,
                Some(Token::Lte) => BinOp::Lte,
                Some(Token::Gt) => BinOp::Gt,
                Some(Token::Gte) => BinOp::Gte,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        match self.peek() {
            Some(Token::Minus) => {
                self.advance();
                Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.parse_unary()?)))
            }
            Some(Token::Bang) => {
                self.advance();
                Ok(Expr::Unary(UnaryOp::Not, Box::new(self.parse_unary()?)))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.advance() {
            Some(Token::Int(n)) => Ok(Expr::Int(n)),
            Some(Token::Float(f)) => Ok(Expr::Float(f)),
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::True) => Ok(Expr::Bool(true)),
            Some(Token::False) => Ok(Expr::Bool(false)),
            Some(Token::None_) => Ok(Expr::None),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    other => Err(format!("expected ')', found {other:?}")),
                }
            }
            Some(Token::LBracket) => {
                let mut items = Vec::new();
                while self.peek() != Some(&Token::RBracket) {
                    items.push(self.parse_or()?);
                    if self.peek() == Some(&Token::Comma) {
                        self.advance();
                    }
                }
                self.advance();
                Ok(Expr::List(items))
            }
            Some(Token::LBrace) => {
                let mut entries = Vec::new();
                while self.peek() != Some(&Token::RBrace) {
                    let key = self.parse_or()?;
                    match self.advance() {
                        Some(Token::Colon) => {}
                        other => return Err(format!("expected ':' in dict literal, found {other:?}")),
                    }
                    let value = self.parse_or()?;
                    entries.push((key, value));
                    if self.peek() == Some(&Token::Comma) {
                        self.advance();
                    }
                }
                self.advance();
                Ok(Expr::Dict(entries))
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.advance();
                    let mut args = Vec::new();
                    while self.peek() != Some(&Token::RParen) {
                        args.push(self.parse_or()?);
                        if self.peek() == Some(&Token::Comma) {
                            self.advance();
                        }
                    }
                    self.advance();
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Var(name))
                }
            }
            other => Err(format!("unexpected token {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::lexer::tokenize;

    #[test]
    fn parses_def_with_list_return() {
        let tokens = tokenize("def main():\n  return [1, 2]\n").unwrap();
        let program = parse_program(tokens).unwrap();
        assert_eq!(program.len(), 1);
        match &program[0] {
            Stmt::Def { name, body, .. } => {
                assert_eq!(name, "main");
                assert_eq!(body.len(), 1);
            }
            other => panic!("expected def, got {other:?}"),
        }
    }

    #[test]
    fn parses_dict_literal() {
        let tokens = tokenize("def main():\n  return {\"a\": 1}\n").unwrap();
        let program = parse_program(tokens).unwrap();
        match &program[0] {
            Stmt::Def { body, .. } => match &body[0] {
                Stmt::Return(Expr::Dict(entries)) => assert_eq!(entries.len(), 1),
                other => panic!("expected return dict, got {other:?}"),
            },
            other => panic!("expected def, got {other:?}"),
        }
    }
}
