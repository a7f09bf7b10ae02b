//! Recursive-descent parser for the command language.

use crate::ast::{Expr, Program, Stmt};
use crate::error::{InterpError, InterpResult};
use crate::lexer::{tokenize, Pos, Token};

/// Parses `source` into a [`Program`].
pub fn parse(source: &str) -> InterpResult<Program> {
    let tokens = tokenize(source)?;
    Parser { tokens, at: 0 }.program()
}

struct Parser {
    tokens: Vec<(Token, Pos)>,
    at: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.at].0
    }

    fn pos(&self) -> Pos {
        self.tokens[self.at].1
    }

    fn bump(&mut self) -> Token {
        let token = self.tokens[self.at].0.clone();
        if self.at < self.tokens.len() - 1 {
            self.at += 1;
        }
        token
    }

    fn error<T>(&self, message: impl Into<String>) -> InterpResult<T> {
        let pos = self.pos();
        Err(InterpError::parse(message, pos.line, pos.column))
    }

    fn expect(&mut self, token: Token) -> InterpResult<()> {
        if *self.peek() == token {
            self.bump();
            Ok(())
        } else {
            self.error(format!(
                "expected {}, found {}",
                token.describe(),
                self.peek().describe()
            ))
        }
    }

    fn program(&mut self) -> InterpResult<Program> {
        let mut stmts = Vec::new();
        loop {
            while *self.peek() == Token::Semicolon {
                self.bump();
            }
            if *self.peek() == Token::Eof {
                break;
            }
            let stmt = self.statement()?;
            let is_return = matches!(stmt, Stmt::Return(_));
            stmts.push(stmt);
            if is_return {
                while *self.peek() == Token::Semicolon {
                    self.bump();
                }
                if *self.peek() != Token::Eof {
                    return self.error("`return` must be the final statement");
                }
            }
        }
        Ok(Program { stmts })
    }

    fn statement(&mut self) -> InterpResult<Stmt> {
        if *self.peek() == Token::Return {
            self.bump();
            let value = self.expression()?;
            return Ok(Stmt::Return(value));
        }

        let expr = self.expression()?;
        if *self.peek() == Token::Equals {
            let path = match expr {
                Expr::Path(path) => path,
                _ => return self.error("assignment target must be a path"),
            };
            self.bump();
            let value = self.expression()?;
            return Ok(Stmt::Assign { path, value });
        }
        Ok(Stmt::Expr(expr))
    }

    fn expression(&mut self) -> InterpResult<Expr> {
        match self.peek().clone() {
            Token::Nil => {
                self.bump();
                Ok(Expr::Nil)
            }
            Token::True => {
                self.bump();
                Ok(Expr::Bool(true))
            }
            Token::False => {
                self.bump();
                Ok(Expr::Bool(false))
            }
            Token::Int(value) => {
                self.bump();
                Ok(Expr::Int(value))
            }
            Token::Float(value) => {
                self.bump();
                Ok(Expr::Float(value))
            }
            Token::Str(value) => {
                self.bump();
                Ok(Expr::Str(value))
            }
            Token::Minus => {
                self.bump();
                let inner = self.expression()?;
                match inner {
                    Expr::Int(_) | Expr::Float(_) | Expr::Path(_) => {
                        Ok(Expr::Neg(Box::new(inner)))
                    }
                    _ => self.error("`-` applies only to numbers and path reads"),
                }
            }
            Token::LBrace => self.constructor(),
            Token::Ident(_) => self.path_expression(),
            other => self.error(format!("unexpected {}", other.describe())),
        }
    }

    /// `{e1, e2}` or `{name = e, …}`. The two forms cannot be mixed.
    fn constructor(&mut self) -> InterpResult<Expr> {
        self.expect(Token::LBrace)?;
        if *self.peek() == Token::RBrace {
            self.bump();
            return Ok(Expr::Array(Vec::new()));
        }

        // A lone identifier followed by `=` selects the record form.
        let is_record = matches!(self.peek(), Token::Ident(_))
            && matches!(
                self.tokens.get(self.at + 1).map(|t| &t.0),
                Some(Token::Equals)
            );

        if is_record {
            let mut fields = Vec::new();
            loop {
                let name = match self.bump() {
                    Token::Ident(name) => name,
                    other => {
                        return self.error(format!(
                            "expected field name, found {}",
                            other.describe()
                        ))
                    }
                };
                self.expect(Token::Equals)?;
                let value = self.expression()?;
                fields.push((name, value));
                match self.bump() {
                    Token::Comma => continue,
                    Token::RBrace => break,
                    other => {
                        return self.error(format!(
                            "expected `,` or `}}`, found {}",
                            other.describe()
                        ))
                    }
                }
            }
            Ok(Expr::Record(fields))
        } else {
            let mut items = Vec::new();
            loop {
                items.push(self.expression()?);
                match self.bump() {
                    Token::Comma => continue,
                    Token::RBrace => break,
                    other => {
                        return self.error(format!(
                            "expected `,` or `}}`, found {}",
                            other.describe()
                        ))
                    }
                }
            }
            Ok(Expr::Array(items))
        }
    }

    /// Path read, call, or method call starting at an identifier.
    fn path_expression(&mut self) -> InterpResult<Expr> {
        let mut path = Vec::new();
        loop {
            match self.bump() {
                Token::Ident(name) => path.push(name),
                other => {
                    return self.error(format!(
                        "expected identifier, found {}",
                        other.describe()
                    ))
                }
            }
            if *self.peek() == Token::Dot {
                self.bump();
                continue;
            }
            break;
        }

        match self.peek().clone() {
            Token::LParen => {
                let args = self.call_args()?;
                Ok(Expr::Call {
                    path,
                    method: None,
                    args,
                })
            }
            Token::Colon => {
                self.bump();
                let method = match self.bump() {
                    Token::Ident(name) => name,
                    other => {
                        return self.error(format!(
                            "expected method name, found {}",
                            other.describe()
                        ))
                    }
                };
                let args = self.call_args()?;
                Ok(Expr::Call {
                    path,
                    method: Some(method),
                    args,
                })
            }
            _ => Ok(Expr::Path(path)),
        }
    }

    fn call_args(&mut self) -> InterpResult<Vec<Expr>> {
        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        if *self.peek() == Token::RParen {
            self.bump();
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            match self.bump() {
                Token::Comma => continue,
                Token::RParen => break,
                other => {
                    return self.error(format!(
                        "expected `,` or `)`, found {}",
                        other.describe()
                    ))
                }
            }
        }
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    #[test]
    fn test_parse_call() {
        let program = parse("iso.set(0.7)").expect("parse should succeed");
        assert_eq!(
            program.stmts,
            vec![Stmt::Expr(Expr::Call {
                path: vec!["iso".into(), "set".into()],
                method: None,
                args: vec![Expr::Float(0.7)],
            })]
        );
    }

    #[test]
    fn test_parse_method_call() {
        let program = parse("_sys_.inst.m0:setColor(1, 0, 0)").unwrap();
        assert_eq!(
            program.stmts,
            vec![Stmt::Expr(Expr::Call {
                path: vec!["_sys_".into(), "inst".into(), "m0".into()],
                method: Some("setColor".into()),
                args: vec![
                    Expr::Int(BigInt::from(1)),
                    Expr::Int(BigInt::from(0)),
                    Expr::Int(BigInt::from(0)),
                ],
            })]
        );
    }

    #[test]
    fn test_parse_return() {
        let program = parse("return iso.get()").unwrap();
        assert_eq!(
            program.stmts,
            vec![Stmt::Return(Expr::Call {
                path: vec!["iso".into(), "get".into()],
                method: None,
                args: vec![],
            })]
        );
        assert!(parse("return 1; iso.get()").is_err());
    }

    #[test]
    fn test_parse_assignment() {
        let program = parse("cfg.verbose = true").unwrap();
        assert_eq!(
            program.stmts,
            vec![Stmt::Assign {
                path: vec!["cfg".into(), "verbose".into()],
                value: Expr::Bool(true),
            }]
        );
        assert!(parse("3 = 4").is_err());
    }

    #[test]
    fn test_parse_constructors() {
        let program = parse("return {1, 2, 3}").unwrap();
        assert_eq!(
            program.stmts,
            vec![Stmt::Return(Expr::Array(vec![
                Expr::Int(BigInt::from(1)),
                Expr::Int(BigInt::from(2)),
                Expr::Int(BigInt::from(3)),
            ]))]
        );

        let program = parse("return {width = 4, name = \"head\"}").unwrap();
        assert_eq!(
            program.stmts,
            vec![Stmt::Return(Expr::Record(vec![
                ("width".into(), Expr::Int(BigInt::from(4))),
                ("name".into(), Expr::Str("head".into())),
            ]))]
        );
    }

    #[test]
    fn test_parse_negative() {
        let program = parse("iso.set(-0.5)").unwrap();
        assert_eq!(
            program.stmts,
            vec![Stmt::Expr(Expr::Call {
                path: vec!["iso".into(), "set".into()],
                method: None,
                args: vec![Expr::Neg(Box::new(Expr::Float(0.5)))],
            })]
        );
    }

    #[test]
    fn test_statement_separators() {
        let program = parse("a.f(); b.g()\nc.h()").unwrap();
        assert_eq!(program.stmts.len(), 3);
    }
}
