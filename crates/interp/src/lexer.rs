//! Tokenizer for the command language.

use num_bigint::BigInt;

use crate::error::{InterpError, InterpResult};

/// Source position of a token, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Int(BigInt),
    Float(f64),
    Str(String),
    True,
    False,
    Nil,
    Return,
    Dot,
    Colon,
    Comma,
    Equals,
    Minus,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Semicolon,
    Eof,
}

impl Token {
    /// Short description used in parse errors.
    pub fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("identifier `{name}`"),
            Token::Int(i) => format!("integer `{i}`"),
            Token::Float(f) => format!("number `{f}`"),
            Token::Str(_) => "string literal".to_string(),
            Token::True => "`true`".to_string(),
            Token::False => "`false`".to_string(),
            Token::Nil => "`nil`".to_string(),
            Token::Return => "`return`".to_string(),
            Token::Dot => "`.`".to_string(),
            Token::Colon => "`:`".to_string(),
            Token::Comma => "`,`".to_string(),
            Token::Equals => "`=`".to_string(),
            Token::Minus => "`-`".to_string(),
            Token::LParen => "`(`".to_string(),
            Token::RParen => "`)`".to_string(),
            Token::LBrace => "`{`".to_string(),
            Token::RBrace => "`}`".to_string(),
            Token::Semicolon => "`;`".to_string(),
            Token::Eof => "end of input".to_string(),
        }
    }
}

/// Tokenizes `source` into a vector of positioned tokens, terminated by
/// [`Token::Eof`].
pub fn tokenize(source: &str) -> InterpResult<Vec<(Token, Pos)>> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line = 1usize;
    let mut column = 1usize;

    macro_rules! bump {
        () => {{
            let c = chars.next();
            if let Some(ch) = c {
                if ch == '\n' {
                    line += 1;
                    column = 1;
                } else {
                    column += 1;
                }
            }
            c
        }};
    }

    while let Some(&c) = chars.peek() {
        let pos = Pos { line, column };
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                bump!();
            }
            '-' => {
                bump!();
                // `--` starts a comment running to end of line.
                if chars.peek() == Some(&'-') {
                    while let Some(&n) = chars.peek() {
                        if n == '\n' {
                            break;
                        }
                        bump!();
                    }
                } else {
                    tokens.push((Token::Minus, pos));
                }
            }
            '.' => {
                bump!();
                tokens.push((Token::Dot, pos));
            }
            ':' => {
                bump!();
                tokens.push((Token::Colon, pos));
            }
            ',' => {
                bump!();
                tokens.push((Token::Comma, pos));
            }
            '=' => {
                bump!();
                tokens.push((Token::Equals, pos));
            }
            '(' => {
                bump!();
                tokens.push((Token::LParen, pos));
            }
            ')' => {
                bump!();
                tokens.push((Token::RParen, pos));
            }
            '{' => {
                bump!();
                tokens.push((Token::LBrace, pos));
            }
            '}' => {
                bump!();
                tokens.push((Token::RBrace, pos));
            }
            ';' => {
                bump!();
                tokens.push((Token::Semicolon, pos));
            }
            '"' | '\'' => {
                let quote = c;
                bump!();
                let mut text = String::new();
                loop {
                    match bump!() {
                        None => {
                            return Err(InterpError::parse(
                                "unterminated string literal",
                                pos.line,
                                pos.column,
                            ))
                        }
                        Some(ch) if ch == quote => break,
                        Some('\\') => match bump!() {
                            Some('n') => text.push('\n'),
                            Some('t') => text.push('\t'),
                            Some('\\') => text.push('\\'),
                            Some(ch) if ch == quote => text.push(ch),
                            Some(other) => {
                                return Err(InterpError::parse(
                                    format!("unknown escape `\\{other}`"),
                                    pos.line,
                                    pos.column,
                                ))
                            }
                            None => {
                                return Err(InterpError::parse(
                                    "unterminated string literal",
                                    pos.line,
                                    pos.column,
                                ))
                            }
                        },
                        Some(ch) => text.push(ch),
                    }
                }
                tokens.push((Token::Str(text), pos));
            }
            '0'..='9' => {
                let mut digits = String::new();
                let mut is_float = false;
                while let Some(&n) = chars.peek() {
                    if n.is_ascii_digit() {
                        digits.push(n);
                        bump!();
                    } else if n == '.' {
                        // A digit must follow; otherwise this dot belongs to
                        // a path expression.
                        let mut ahead = chars.clone();
                        ahead.next();
                        match ahead.peek() {
                            Some(d) if d.is_ascii_digit() => {
                                is_float = true;
                                digits.push('.');
                                bump!();
                            }
                            _ => break,
                        }
                    } else if n == 'e' || n == 'E' {
                        is_float = true;
                        digits.push(n);
                        bump!();
                        if let Some(&s) = chars.peek() {
                            if s == '+' || s == '-' {
                                digits.push(s);
                                bump!();
                            }
                        }
                    } else {
                        break;
                    }
                }
                if is_float {
                    let value: f64 = digits.parse().map_err(|_| {
                        InterpError::parse(
                            format!("malformed number `{digits}`"),
                            pos.line,
                            pos.column,
                        )
                    })?;
                    tokens.push((Token::Float(value), pos));
                } else {
                    let value: BigInt = digits.parse().map_err(|_| {
                        InterpError::parse(
                            format!("malformed integer `{digits}`"),
                            pos.line,
                            pos.column,
                        )
                    })?;
                    tokens.push((Token::Int(value), pos));
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&n) = chars.peek() {
                    if n.is_alphanumeric() || n == '_' {
                        name.push(n);
                        bump!();
                    } else {
                        break;
                    }
                }
                let token = match name.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "nil" => Token::Nil,
                    "return" => Token::Return,
                    _ => Token::Ident(name),
                };
                tokens.push((token, pos));
            }
            other => {
                return Err(InterpError::parse(
                    format!("unexpected character `{other}`"),
                    pos.line,
                    pos.column,
                ))
            }
        }
    }

    tokens.push((Token::Eof, Pos { line, column }));
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .expect("tokenize should succeed")
            .into_iter()
            .map(|(t, _)| t)
            .collect()
    }

    #[test]
    fn test_call_tokens() {
        let tokens = kinds("iso.set(0.7)");
        assert_eq!(
            tokens,
            vec![
                Token::Ident("iso".into()),
                Token::Dot,
                Token::Ident("set".into()),
                Token::LParen,
                Token::Float(0.7),
                Token::RParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_int_vs_float() {
        assert_eq!(
            kinds("42"),
            vec![Token::Int(BigInt::from(42)), Token::Eof]
        );
        assert_eq!(kinds("1.5"), vec![Token::Float(1.5), Token::Eof]);
        assert_eq!(kinds("1e3"), vec![Token::Float(1000.0), Token::Eof]);
    }

    #[test]
    fn test_dot_after_int_is_path() {
        // `a.b` after an integer-looking segment must not lex as a float.
        let tokens = kinds("m0.color");
        assert_eq!(
            tokens,
            vec![
                Token::Ident("m0".into()),
                Token::Dot,
                Token::Ident("color".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_strings_and_escapes() {
        assert_eq!(
            kinds("\"a\\nb\""),
            vec![Token::Str("a\nb".into()), Token::Eof]
        );
        assert_eq!(kinds("'x'"), vec![Token::Str("x".into()), Token::Eof]);
        assert!(tokenize("\"open").is_err());
    }

    #[test]
    fn test_comments() {
        let tokens = kinds("true -- trailing words\nfalse");
        assert_eq!(tokens, vec![Token::True, Token::False, Token::Eof]);
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            kinds("return nil"),
            vec![Token::Return, Token::Nil, Token::Eof]
        );
    }
}
