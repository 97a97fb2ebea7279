//! Recursive descent parser for procedure source.

use super::ast::{Constant, Expr, ExprKind, Function, Module, Stmt};
use super::lexer::{Token, TokenKind, Tokenizer};
use crate::result::LoadError;

/// Parser over a token stream.
///
/// Grammar:
/// ```text
/// module    ::= item*
/// item      ::= 'let' IDENT '=' expr ';' | 'async'? 'fn' IDENT '(' params ')' block | ';'
/// params    ::= (IDENT (',' IDENT)* ','?)?
/// block     ::= '{' stmt* '}'
/// stmt      ::= 'let' IDENT '=' expr END | 'return' expr? END | expr END
/// END       ::= ';' | before '}' | line break
/// expr      ::= unary ('+' unary)*
/// unary     ::= 'await' unary | postfix
/// postfix   ::= primary ('.' IDENT | '(' args ')')*
/// args      ::= (arg (',' arg)* ','?)?
/// arg       ::= IDENT '=' expr | expr
/// primary   ::= STRING | NUMBER | 'true' | 'false' | 'null' | IDENT | '(' expr ')'
/// ```
#[derive(Debug)]
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Parser over `tokens` (must end with [`TokenKind::Eof`])
    #[must_use]
    pub const fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    /// Tokenize and parse source text
    pub fn parse_str(source: &str) -> Result<Module, LoadError> {
        let tokens = Tokenizer::new(source).tokenize()?;
        Self::new(tokens).parse_module()
    }

    /// Parse a whole module
    pub fn parse_module(&mut self) -> Result<Module, LoadError> {
        let mut module = Module::default();
        loop {
            match self.current_kind() {
                TokenKind::Eof => return Ok(module),
                TokenKind::Semicolon => {
                    self.advance();
                }
                TokenKind::Let => module.constants.push(self.parse_constant()?),
                TokenKind::Async | TokenKind::Fn => module.functions.push(self.parse_function()?),
                other => {
                    return Err(self.error(format!(
                        "expected 'let', 'fn' or 'async fn', found {}",
                        other.describe()
                    )));
                }
            }
        }
    }

    fn current(&self) -> &Token {
        // The stream always ends with Eof, which is never consumed.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn previous_line(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map_or(1, |t| t.line)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.current_kind() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token, LoadError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(format!(
                "expected {}, found {}",
                kind.describe(),
                self.current_kind().describe()
            )))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<(String, usize), LoadError> {
        match self.current_kind().clone() {
            TokenKind::Ident(name) => {
                let token = self.advance();
                Ok((name, token.line))
            }
            other => Err(self.error(format!("expected {what}, found {}", other.describe()))),
        }
    }

    fn error(&self, message: String) -> LoadError {
        let token = self.current();
        LoadError::Syntax {
            line: token.line,
            column: token.column,
            message,
        }
    }

    fn parse_constant(&mut self) -> Result<Constant, LoadError> {
        let keyword = self.expect(&TokenKind::Let)?;
        let (name, _) = self.expect_ident("constant name")?;
        self.expect(&TokenKind::Assign)?;
        let value = self.parse_expression()?;
        self.end_statement()?;
        Ok(Constant {
            name,
            value,
            line: keyword.line,
        })
    }

    fn parse_function(&mut self) -> Result<Function, LoadError> {
        let start_line = self.current().line;
        let is_async = self.eat(&TokenKind::Async);
        self.expect(&TokenKind::Fn)?;
        let (name, _) = self.expect_ident("function name")?;

        self.expect(&TokenKind::LeftParen)?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RightParen) {
            let (param, _) = self.expect_ident("parameter name")?;
            params.push(param);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RightParen)?;

        self.expect(&TokenKind::LeftBrace)?;
        let mut body = Vec::new();
        while !self.check(&TokenKind::RightBrace) {
            if self.check(&TokenKind::Eof) {
                return Err(self.error(format!("unclosed body of function '{name}'")));
            }
            if self.eat(&TokenKind::Semicolon) {
                continue;
            }
            body.push(self.parse_statement()?);
        }
        self.expect(&TokenKind::RightBrace)?;

        Ok(Function {
            name,
            is_async,
            params,
            body,
            line: start_line,
        })
    }

    fn parse_statement(&mut self) -> Result<Stmt, LoadError> {
        let line = self.current().line;
        let stmt = match self.current_kind() {
            TokenKind::Let => {
                self.advance();
                let (name, _) = self.expect_ident("variable name")?;
                self.expect(&TokenKind::Assign)?;
                let value = self.parse_expression()?;
                Stmt::Let { name, value, line }
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.ends_statement() {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                Stmt::Return { value, line }
            }
            _ => Stmt::Expr(self.parse_expression()?),
        };
        self.end_statement()?;
        Ok(stmt)
    }

    fn ends_statement(&self) -> bool {
        matches!(
            self.current_kind(),
            TokenKind::Semicolon | TokenKind::RightBrace | TokenKind::Eof
        ) || self.current().line > self.previous_line()
    }

    fn end_statement(&mut self) -> Result<(), LoadError> {
        if self.eat(&TokenKind::Semicolon) || self.ends_statement() {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected ';', found {}",
                self.current_kind().describe()
            )))
        }
    }

    fn parse_expression(&mut self) -> Result<Expr, LoadError> {
        let mut left = self.parse_unary()?;
        while self.check(&TokenKind::Plus) {
            let op = self.advance();
            let right = self.parse_unary()?;
            left = Expr::new(
                ExprKind::Add(Box::new(left), Box::new(right)),
                op.line,
                op.column,
            );
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, LoadError> {
        if self.check(&TokenKind::Await) {
            let token = self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expr::new(
                ExprKind::Await(Box::new(inner)),
                token.line,
                token.column,
            ));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, LoadError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.check(&TokenKind::Dot) {
                let dot = self.advance();
                let (name, _) = self.expect_ident("member name")?;
                expr = Expr::new(
                    ExprKind::Member {
                        object: Box::new(expr),
                        name,
                    },
                    dot.line,
                    dot.column,
                );
            } else if self.check(&TokenKind::LeftParen) {
                let paren = self.advance();
                let (args, kwargs) = self.parse_arguments()?;
                expr = Expr::new(
                    ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                        kwargs,
                    },
                    paren.line,
                    paren.column,
                );
            } else {
                return Ok(expr);
            }
        }
    }

    #[allow(clippy::type_complexity)]
    fn parse_arguments(&mut self) -> Result<(Vec<Expr>, Vec<(String, Expr)>), LoadError> {
        let mut args = Vec::new();
        let mut kwargs: Vec<(String, Expr)> = Vec::new();
        while !self.check(&TokenKind::RightParen) {
            let is_keyword = matches!(self.current_kind(), TokenKind::Ident(_))
                && self
                    .tokens
                    .get(self.pos + 1)
                    .is_some_and(|t| t.kind == TokenKind::Assign);
            if is_keyword {
                let (name, _) = self.expect_ident("argument name")?;
                if kwargs.iter().any(|(k, _)| *k == name) {
                    return Err(self.error(format!("keyword argument '{name}' repeated")));
                }
                self.expect(&TokenKind::Assign)?;
                kwargs.push((name, self.parse_expression()?));
            } else {
                if !kwargs.is_empty() {
                    return Err(self.error("positional argument follows keyword argument".to_string()));
                }
                args.push(self.parse_expression()?);
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RightParen)?;
        Ok((args, kwargs))
    }

    fn parse_primary(&mut self) -> Result<Expr, LoadError> {
        let token = self.current().clone();
        let kind = match token.kind {
            TokenKind::Str(s) => ExprKind::Str(s),
            TokenKind::Number(n) => ExprKind::Number(n),
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),
            TokenKind::Null => ExprKind::Null,
            TokenKind::Ident(name) => ExprKind::Ident(name),
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RightParen)?;
                return Ok(inner);
            }
            other => {
                return Err(self.error(format!("expected expression, found {}", other.describe())));
            }
        };
        self.advance();
        Ok(Expr::new(kind, token.line, token.column))
    }
}
