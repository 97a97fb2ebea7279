//! Tokenizer for procedure source text.

use crate::result::LoadError;

/// Token kinds
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifier
    Ident(String),
    /// String literal (escapes resolved)
    Str(String),
    /// Numeric literal
    Number(f64),
    /// `let`
    Let,
    /// `fn`
    Fn,
    /// `async`
    Async,
    /// `await`
    Await,
    /// `return`
    Return,
    /// `true`
    True,
    /// `false`
    False,
    /// `null`
    Null,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `;`
    Semicolon,
    /// `+`
    Plus,
    /// `=`
    Assign,
    /// End of input
    Eof,
}

impl TokenKind {
    /// Short description for error messages
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Ident(name) => format!("identifier '{name}'"),
            Self::Str(_) => "string literal".to_string(),
            Self::Number(n) => format!("number {n}"),
            Self::Let => "'let'".to_string(),
            Self::Fn => "'fn'".to_string(),
            Self::Async => "'async'".to_string(),
            Self::Await => "'await'".to_string(),
            Self::Return => "'return'".to_string(),
            Self::True => "'true'".to_string(),
            Self::False => "'false'".to_string(),
            Self::Null => "'null'".to_string(),
            Self::LeftParen => "'('".to_string(),
            Self::RightParen => "')'".to_string(),
            Self::LeftBrace => "'{'".to_string(),
            Self::RightBrace => "'}'".to_string(),
            Self::Comma => "','".to_string(),
            Self::Dot => "'.'".to_string(),
            Self::Semicolon => "';'".to_string(),
            Self::Plus => "'+'".to_string(),
            Self::Assign => "'='".to_string(),
            Self::Eof => "end of input".to_string(),
        }
    }
}

/// A token with its 1-based source position
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Kind
    pub kind: TokenKind,
    /// Line
    pub line: usize,
    /// Column
    pub column: usize,
}

/// Converts source text into tokens
#[derive(Debug)]
pub struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Tokenizer<'a> {
    /// Tokenizer at the start of `input`
    #[must_use]
    pub const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize everything; the last token is always [`TokenKind::Eof`]
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LoadError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    /// Next token
    pub fn next_token(&mut self) -> Result<Token, LoadError> {
        self.skip_trivia();
        let (line, column) = (self.line, self.column);
        let Some(ch) = self.current_char() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                line,
                column,
            });
        };

        let kind = match ch {
            '0'..='9' => self.read_number()?,
            'r' if matches!(self.peek_char(1), Some('"' | '\'')) => {
                self.advance();
                self.read_string(true)?
            }
            c if c.is_alphabetic() || c == '_' => self.read_word(),
            '"' | '\'' => self.read_string(false)?,
            _ => {
                self.advance();
                match ch {
                    '(' => TokenKind::LeftParen,
                    ')' => TokenKind::RightParen,
                    '{' => TokenKind::LeftBrace,
                    '}' => TokenKind::RightBrace,
                    ',' => TokenKind::Comma,
                    '.' => TokenKind::Dot,
                    ';' => TokenKind::Semicolon,
                    '+' => TokenKind::Plus,
                    '=' => TokenKind::Assign,
                    _ => return Err(syntax_error(line, column, format!("unexpected character '{ch}'"))),
                }
            }
        };

        Ok(Token { kind, line, column })
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current_char()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_trivia(&mut self) {
        while let Some(ch) = self.current_char() {
            let comment = ch == '#' || (ch == '/' && self.peek_char(1) == Some('/'));
            if comment {
                while let Some(c) = self.current_char() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> Result<TokenKind, LoadError> {
        let (line, column) = (self.line, self.column);
        let start = self.pos;
        let mut has_dot = false;
        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() || ch == '_' {
                self.advance();
            } else if ch == '.' && !has_dot && self.peek_char(1).is_some_and(|c| c.is_ascii_digit()) {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }
        let text = self.input[start..self.pos].replace('_', "");
        text.parse()
            .map(TokenKind::Number)
            .map_err(|_| syntax_error(line, column, format!("invalid number '{text}'")))
    }

    fn read_word(&mut self) -> TokenKind {
        let start = self.pos;
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        match &self.input[start..self.pos] {
            "let" => TokenKind::Let,
            "fn" => TokenKind::Fn,
            "async" => TokenKind::Async,
            "await" => TokenKind::Await,
            "return" => TokenKind::Return,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            word => TokenKind::Ident(word.to_string()),
        }
    }

    fn read_string(&mut self, raw: bool) -> Result<TokenKind, LoadError> {
        let (line, column) = (self.line, self.column);
        let Some(quote) = self.advance() else {
            return Err(syntax_error(line, column, "expected string".to_string()));
        };
        let mut value = String::new();
        loop {
            let Some(ch) = self.advance() else {
                return Err(syntax_error(line, column, "unterminated string".to_string()));
            };
            match ch {
                c if c == quote => return Ok(TokenKind::Str(value)),
                '\n' => {
                    return Err(syntax_error(line, column, "unterminated string".to_string()));
                }
                '\\' if !raw => {
                    let Some(escaped) = self.advance() else {
                        return Err(syntax_error(line, column, "unterminated string".to_string()));
                    };
                    match escaped {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        '0' => value.push('\0'),
                        '\\' | '"' | '\'' => value.push(escaped),
                        other => {
                            value.push('\\');
                            value.push(other);
                        }
                    }
                }
                c => value.push(c),
            }
        }
    }

}

const fn syntax_error(line: usize, column: usize, message: String) -> LoadError {
    LoadError::Syntax {
        line,
        column,
        message,
    }
}
