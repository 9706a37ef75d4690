mod token;


pub use token::{Span, Token, TokenKind};

use std::str::Chars;

/// Hand-written scanner with two modes: code, and raw list text between
/// brackets where only whitespace and brackets separate words.
pub struct Lexer<'a> {
    source: &'a str,
    chars: Chars<'a>,
    position: usize,
    line: u32,
    column: u32,
    list_depth: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars(),
            position: 0,
            line: 1,
            column: 1,
            list_depth: 0,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        if self.list_depth > 0 {
            return Ok(self.next_list_token());
        }

        self.skip_whitespace();

        let start_position = self.position;
        let start_line = self.line;
        let start_column = self.column;

        let kind = match self.peek() {
            None => TokenKind::Eof,
            Some(c) => match c {
                ';' => {
                    self.skip_comment();
                    return self.next_token();
                }

                '\n' => {
                    self.advance();
                    TokenKind::Newline
                }

                '(' => {
                    self.advance();
                    TokenKind::LeftParen
                }
                ')' => {
                    self.advance();
                    TokenKind::RightParen
                }
                '[' => {
                    self.advance();
                    self.list_depth = 1;
                    TokenKind::LeftBracket
                }
                ']' => {
                    self.advance();
                    TokenKind::RightBracket
                }

                '+' => {
                    self.advance();
                    TokenKind::Plus
                }
                '*' => {
                    self.advance();
                    TokenKind::Star
                }
                '/' => {
                    self.advance();
                    TokenKind::Slash
                }

                '-' if self.peek_next().is_some_and(|c| c.is_ascii_digit()) => self.number()?,
                '-' => {
                    self.advance();
                    TokenKind::Minus
                }

                '=' if self.peek_next() == Some('=') => {
                    self.advance();
                    self.advance();
                    TokenKind::EqualEqual
                }
                '=' => {
                    self.advance();
                    TokenKind::Equal
                }

                '!' if self.peek_next() == Some('=') => {
                    self.advance();
                    self.advance();
                    TokenKind::BangEqual
                }

                '<' if self.peek_next() == Some('=') => {
                    self.advance();
                    self.advance();
                    TokenKind::LessEqual
                }
                '<' => {
                    self.advance();
                    TokenKind::Less
                }

                '>' if self.peek_next() == Some('=') => {
                    self.advance();
                    self.advance();
                    TokenKind::GreaterEqual
                }
                '>' => {
                    self.advance();
                    TokenKind::Greater
                }

                '"' => {
                    self.advance();
                    TokenKind::Quote(self.delimited_word())
                }
                ':' => {
                    self.advance();
                    let name = self.delimited_word();
                    if name.is_empty() {
                        return Err(LexError {
                            message: "Expected a variable name after ':'".to_string(),
                            line: start_line,
                            column: start_column,
                        });
                    }
                    TokenKind::Reference(name)
                }

                c if c.is_ascii_digit() => self.number()?,

                c if is_symbol_start(c) => self.symbol_or_keyword(),

                c => {
                    return Err(LexError {
                        message: format!("Unexpected character: '{c}'"),
                        line: start_line,
                        column: start_column,
                    });
                }
            },
        };

        Ok(Token {
            kind,
            span: self.span_from(start_position, start_line, start_column),
        })
    }

    fn next_list_token(&mut self) -> Token {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }

        let start_position = self.position;
        let start_line = self.line;
        let start_column = self.column;

        let kind = match self.peek() {
            None => TokenKind::Eof,
            Some('[') => {
                self.advance();
                self.list_depth += 1;
                TokenKind::LeftBracket
            }
            Some(']') => {
                self.advance();
                self.list_depth -= 1;
                TokenKind::RightBracket
            }
            Some(_) => {
                while let Some(c) = self.peek() {
                    if c.is_whitespace() || c == '[' || c == ']' {
                        break;
                    }
                    self.advance();
                }
                TokenKind::Word(self.source[start_position..self.position].to_string())
            }
        };

        Token {
            kind,
            span: self.span_from(start_position, start_line, start_column),
        }
    }

    fn span_from(&self, start: usize, line: u32, column: u32) -> Span {
        Span {
            start,
            end: self.position,
            line,
            column,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.chars.clone();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.position += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    // Newlines are tokens in code mode, so they are not skipped here.
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() && c != '\n' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    /// Text of a quoted word or variable reference, up to the next delimiter.
    fn delimited_word(&mut self) -> String {
        let start = self.position;
        while let Some(c) = self.peek() {
            if is_delimiter(c) {
                break;
            }
            self.advance();
        }
        self.source[start..self.position].to_string()
    }

    fn symbol_or_keyword(&mut self) -> TokenKind {
        let start = self.position;

        while let Some(c) = self.peek() {
            if is_symbol_continue(c) {
                self.advance();
            } else {
                break;
            }
        }

        let text = &self.source[start..self.position];

        match text.to_ascii_lowercase().as_str() {
            "to" => TokenKind::To,
            "end" => TokenKind::End,
            "nil" => TokenKind::Nil,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => TokenKind::Symbol(text.to_string()),
        }
    }

    fn number(&mut self) -> Result<TokenKind, LexError> {
        let start = self.position;
        let start_line = self.line;
        let start_column = self.column;

        if self.peek() == Some('-') {
            self.advance();
        }

        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();

            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }

            let text = &self.source[start..self.position];
            let value: f64 = text.parse().map_err(|_| LexError {
                message: format!("Invalid float literal: {text}"),
                line: start_line,
                column: start_column,
            })?;

            Ok(TokenKind::Float(value))
        } else {
            let text = &self.source[start..self.position];
            let value: i64 = text.parse().map_err(|_| LexError {
                message: format!("Invalid integer literal: {text}"),
                line: start_line,
                column: start_column,
            })?;

            Ok(TokenKind::Integer(value))
        }
    }
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, ':' | '[' | ']' | '(' | ')')
}

fn is_symbol_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '?'
}

fn is_symbol_continue(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '!' | '?' | '.')
}
