//! Hand-rolled tokenizer for the Script VM's small Python-like surface.
//!
//! Grounded on the teacher's `expr/lexer.rs`, extended with list/dict
//! delimiters, `def`/`return` keywords, and indentation tracking (one
//! [`Token::LineStart`] per logical line, carrying its leading-space count,
//! since the grammar uses Python-style indented blocks for `def` bodies).

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LineStart(usize),
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    True,
    False,
    None_,
    Def,
    Return,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    EqEq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    AndAnd,
    OrOr,
    Bang,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Eof,
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    for raw_line in source.lines() {
        let indent = raw_line.chars().take_while(|c| *c == ' ').count();
        let content = raw_line.trim();
        if content.is_empty() || content.starts_with('#') {
            continue;
        }
        tokens.push(Token::LineStart(indent));
        tokenize_line(content, &mut tokens)?;
    }
    tokens.push(Token::Eof);
    Ok(tokens)
}

fn tokenize_line(line: &str, tokens: &mut Vec<Token>) -> Result<(), String> {
    let mut chars = line.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '#' => break,
            '(' => { chars.next(); tokens.push(Token::LParen); }
            ')' => { chars.next(); tokens.push(Token::RParen); }
            '[' => { chars.next(); tokens.push(Token::LBracket); }
            ']' => { chars.next(); tokens.push(Token::RBracket); }
            '{' => { chars.next(); tokens.push(Token::LBrace); }
            '}' => { chars.next(); tokens.push(Token::RBrace); }
            ',' => { chars.next(); tokens.push(Token::Comma); }
            ':' => { chars.next(); tokens.push(Token::Colon); }
            '+' => { chars.next(); tokens.push(Token::Plus); }
            '-' => { chars.next(); tokens.push(Token::Minus); }
            '*' => { chars.next(); tokens.push(Token::Star); }
            '/' => { chars.next(); tokens.push(Token::Slash); }
            '%' => { chars.next(); tokens.push(Token::Percent); }
            '"' | '\'' => tokens.push(Token::Str(read_string(&mut chars, c)?)),
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::EqEq);
                } else {
                    tokens.push(Token::Eq);
                }
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::NotEq);
                } else {
                    tokens.push(Token::Bang);
                }
            }
            '<' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Lte);
                } else {
                    tokens.push(Token::Lt);
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Gte);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '&' => {
                chars.next();
                if chars.next() != Some('&') {
                    return Err("expected '&&'".to_string());
                }
                tokens.push(Token::AndAnd);
            }
            '|' => {
                chars.next();
                if chars.next() != Some('|') {
                    return Err("expected '||'".to_string());
                }
                tokens.push(Token::OrOr);
            }
            c if c.is_ascii_digit() => tokens.push(read_number(&mut chars)),
            c if c.is_alphabetic() || c == '_' => tokens.push(read_ident(&mut chars)),
            other => return Err(format!("unexpected character '{other}'")),
        }
    }
    Ok(())
}

fn read_string(
    chars: &mut std::iter::Peekable<std::str::Chars>,
    quote: char,
) -> Result<String, String> {
    chars.next();
    let mut out = String::new();
    loop {
        match chars.next() {
            Some(c) if c == quote => return Ok(out),
            Some('\\') => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(c) => out.push(c),
                None => return Err("unterminated string literal".to_string()),
            },
            Some(c) => out.push(c),
            None => return Err("unterminated string literal".to_string()),
        }
    }
}

fn read_number(chars: &mut std::iter::Peekable<std::str::Chars>) -> Token {
    let mut raw = String::new();
    let mut is_float = false;
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            raw.push(c);
            chars.next();
        } else if c == '.' && !is_float {
            is_float = true;
            raw.push(c);
            chars.next();
        } else {
            break;
        }
    }
    if is_float {
        Token::Float(raw.parse().unwrap_or(0.0))
    } else {
        Token::Int(raw.parse().unwrap_or(0))
    }
}

fn read_ident(chars: &mut std::iter::Peekable<std::str::Chars>) -> Token {
    let mut raw = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_alphanumeric() || c == '_' {
            raw.push(c);
            chars.next();
        } else {
            break;
        }
    }
    match raw.as_str() {
        "def" => Token::Def,
        "return" => Token::Return,
        "True" => Token::True,
        "False" => Token::False,
        "None" => Token::None_,
        "and" => Token::AndAnd,
        "or" => Token::OrOr,
        "not" => Token::Bang,
        _ => Token::Ident(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_indentation_per_line() {
        let tokens = tokenize("def main():\n  return 1\n").unwrap();
        assert_eq!(tokens[0], Token::LineStart(0));
        assert!(tokens.contains(&Token::LineStart(2)));
    }

    #[test]
    fn tokenizes_list_and_dict_literals() {
        let tokens = tokenize("x = [1, 2]\n").unwrap();
        assert!(tokens.contains(&Token::LBracket));
        assert!(tokens.contains(&Token::Int(2)));
    }
}
