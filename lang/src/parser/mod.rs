pub mod ast;

#[cfg(test)]
mod tests;

pub use ast::*;

use std::rc::Rc;

use crate::error::LangError;
use crate::interpreter::Environment;
use crate::lexer::{Lexer, Span, Token, TokenKind};

/// Recursive-descent parser. Whether a bare word is a call, and how many
/// inputs it takes, depends on the procedures defined in the environment, so
/// parsing consults (and extends) it.
pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    position: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

const EQUALITY: &[(TokenKind, &str)] = &[
    (TokenKind::Equal, "equal?"),
    (TokenKind::EqualEqual, "equal?"),
    (TokenKind::BangEqual, "notequal?"),
];

const COMPARISON: &[(TokenKind, &str)] = &[
    (TokenKind::Less, "less?"),
    (TokenKind::Greater, "greater?"),
    (TokenKind::LessEqual, "lessequal?"),
    (TokenKind::GreaterEqual, "greaterequal?"),
];

const TERM: &[(TokenKind, &str)] = &[(TokenKind::Plus, "add"), (TokenKind::Minus, "sub")];

const FACTOR: &[(TokenKind, &str)] = &[(TokenKind::Star, "mul"), (TokenKind::Slash, "div")];

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, tokens: Vec<Token>) -> Self {
        Self {
            source,
            tokens,
            position: 0,
        }
    }

    /// Parse every top-level line. Definitions are registered in `env` and
    /// also returned in place as `Node::Procedure`. A failed read leaves the
    /// procedure table as it was, headers and aliases included.
    pub fn parse_program(&mut self, env: &mut Environment) -> Result<Vec<Node>, ParseError> {
        let procedures = env.snapshot_procedures();
        let program = self.parse_lines(env);
        if program.is_err() {
            env.restore_procedures(procedures);
        }
        program
    }

    fn parse_lines(&mut self, env: &mut Environment) -> Result<Vec<Node>, ParseError> {
        self.register_headers(env)?;
        self.register_aliases(env)?;

        let mut program = Vec::new();
        loop {
            self.skip_newlines();
            if self.is_at_end() {
                break;
            }
            if self.check(&TokenKind::To) {
                program.push(self.parse_definition(env)?);
            } else {
                program.push(self.parse_expression(env)?);
            }
        }
        Ok(program)
    }

    /// Define every `to NAME :a :b` header up front so calls can be parsed
    /// with the right arity before (or inside) the definition itself.
    fn register_headers(&self, env: &mut Environment) -> Result<(), ParseError> {
        for (index, token) in self.tokens.iter().enumerate() {
            if token.kind != TokenKind::To {
                continue;
            }
            let name = match self.tokens.get(index + 1).map(|t| &t.kind) {
                Some(TokenKind::Symbol(name)) => name.clone(),
                _ => {
                    return Err(ParseError::new(
                        "Expected procedure name after 'to'",
                        token.span,
                    ));
                }
            };
            let params = self
                .tokens
                .iter()
                .skip(index + 2)
                .map_while(|t| match &t.kind {
                    TokenKind::Reference(param) => Some(param.to_lowercase()),
                    _ => None,
                })
                .collect();
            env.define(Procedure::user(&name, params));
        }
        Ok(())
    }

    /// `alias "orig "new` must take effect before the lines that use `new`.
    fn register_aliases(&self, env: &mut Environment) -> Result<(), ParseError> {
        for window in self.tokens.windows(3) {
            if let [
                Token {
                    kind: TokenKind::Symbol(keyword),
                    span,
                },
                Token {
                    kind: TokenKind::Quote(original),
                    ..
                },
                Token {
                    kind: TokenKind::Quote(alias),
                    ..
                },
            ] = window
                && keyword.eq_ignore_ascii_case("alias")
            {
                env.alias(original, alias)
                    .map_err(|err| ParseError::new(err.to_string(), *span))?;
            }
        }
        Ok(())
    }

    fn parse_definition(&mut self, env: &mut Environment) -> Result<Node, ParseError> {
        let to = self.expect(TokenKind::To)?;
        let name = match self.advance() {
            Some(Token {
                kind: TokenKind::Symbol(name),
                ..
            }) => name,
            _ => {
                return Err(ParseError::new(
                    "Expected procedure name after 'to'",
                    to.span,
                ));
            }
        };

        let mut params = Vec::new();
        while let Some(TokenKind::Reference(param)) = self.peek_kind() {
            params.push(param.to_lowercase());
            self.position += 1;
        }

        let mut body = Vec::new();
        loop {
            self.skip_newlines();
            match self.peek_kind() {
                Some(TokenKind::End) => break,
                Some(TokenKind::To) => {
                    return Err(ParseError::new(
                        format!("Cannot define a procedure inside {name}"),
                        self.current_span(),
                    ));
                }
                None | Some(TokenKind::Eof) => {
                    return Err(ParseError::new(
                        format!("Missing 'end' for procedure {name}"),
                        to.span,
                    ));
                }
                Some(_) => body.push(self.parse_expression(env)?),
            }
        }
        let end = self.expect(TokenKind::End)?;

        let source = self
            .source
            .get(to.span.start..end.span.end)
            .map(str::to_string);
        let procedure = env.define(Procedure::user(&name, params).with_body(body, source));
        Ok(Node::Procedure(procedure))
    }

    pub fn parse_expression(&mut self, env: &Environment) -> Result<Node, ParseError> {
        self.parse_binary(env, 0)
    }

    // Levels: equality, comparison, term, factor, then primary.
    fn parse_binary(&mut self, env: &Environment, level: usize) -> Result<Node, ParseError> {
        let operators = match level {
            0 => EQUALITY,
            1 => COMPARISON,
            2 => TERM,
            3 => FACTOR,
            _ => return self.parse_primary(env),
        };

        let mut left = self.parse_binary(env, level + 1)?;
        while let Some((name, span)) = self.match_operator(operators) {
            let right = self.parse_binary(env, level + 1)?;
            left = Node::Call(Rc::new(Call::new(name, vec![left, right], span)));
        }
        Ok(left)
    }

    fn parse_primary(&mut self, env: &Environment) -> Result<Node, ParseError> {
        let span = self.current_span();
        let Some(token) = self.advance() else {
            return Err(ParseError::new("Unexpected end of input", span));
        };

        match token.kind {
            TokenKind::Integer(n) => Ok(Node::Integer(n)),
            TokenKind::Float(n) => Ok(Node::float(n)),
            TokenKind::True => Ok(Node::Boolean(true)),
            TokenKind::False => Ok(Node::Boolean(false)),
            TokenKind::Nil => Ok(Node::Nil),
            TokenKind::Quote(text) => Ok(Node::quote(&text)),
            TokenKind::Reference(name) => Ok(Node::Call(Rc::new(Call::new(
                "thing",
                vec![Node::symbol(&name)],
                token.span,
            )))),
            TokenKind::Symbol(name) if env.defined(&name) => self.parse_call(env, name, token.span),
            TokenKind::Symbol(name) => Ok(Node::symbol(&name)),
            TokenKind::LeftBracket => self.parse_list(token.span),
            TokenKind::LeftParen => self.parse_group(env, token.span),
            TokenKind::Newline => Err(ParseError::new("Unexpected end of line", token.span)),
            kind => Err(ParseError::new(
                format!("Unexpected token '{kind}'"),
                token.span,
            )),
        }
    }

    /// A call consumes exactly as many expressions as the procedure has inputs.
    fn parse_call(&mut self, env: &Environment, name: String, span: Span) -> Result<Node, ParseError> {
        let arity = env.procedure(&name).map(|p| p.arity()).unwrap_or(0);
        let mut children = Vec::with_capacity(arity);
        for _ in 0..arity {
            children.push(self.parse_expression(env)?);
        }
        Ok(Node::Call(Rc::new(Call::new(name, children, span))))
    }

    /// `(name a b c)` calls with every expression up to `)`; anything else in
    /// parentheses is plain grouping.
    fn parse_group(&mut self, env: &Environment, open: Span) -> Result<Node, ParseError> {
        self.skip_newlines();
        if let Some(Token {
            kind: TokenKind::Symbol(name),
            span,
        }) = self.peek()
            && env.defined(name)
        {
            let name = name.clone();
            let span = *span;
            self.position += 1;

            let mut children = Vec::new();
            loop {
                self.skip_newlines();
                if self.check(&TokenKind::RightParen) {
                    break;
                }
                if self.is_at_end() {
                    return Err(ParseError::new("Unterminated '('", open));
                }
                children.push(self.parse_expression(env)?);
            }
            self.position += 1;
            return Ok(Node::Call(Rc::new(Call::new(name, children, span))));
        }

        let expression = self.parse_expression(env)?;
        self.skip_newlines();
        if !self.check(&TokenKind::RightParen) {
            return Err(ParseError::new("Expected ')'", self.current_span()));
        }
        self.position += 1;
        Ok(expression)
    }

    /// Lists are data: every raw word becomes a Symbol, nothing is evaluated.
    fn parse_list(&mut self, open: Span) -> Result<Node, ParseError> {
        let mut items = Vec::new();
        loop {
            let Some(token) = self.advance() else {
                return Err(ParseError::new("Unterminated list", open));
            };
            match token.kind {
                TokenKind::Word(text) => items.push(Node::symbol(&text)),
                TokenKind::LeftBracket => items.push(self.parse_list(token.span)?),
                TokenKind::RightBracket => {
                    let source = self.source.get(open.end..token.span.start).unwrap_or("");
                    let span = Span {
                        start: open.start,
                        end: token.span.end,
                        line: open.line,
                        column: open.column,
                    };
                    return Ok(Node::List(List::parsed(items, source, span)));
                }
                _ => return Err(ParseError::new("Unterminated list", open)),
            }
        }
    }

    fn match_operator(&mut self, operators: &[(TokenKind, &'static str)]) -> Option<(&'static str, Span)> {
        let token = self.peek()?;
        let (_, name) = operators.iter().find(|(kind, _)| *kind == token.kind)?;
        let span = token.span;
        self.position += 1;
        Some((*name, span))
    }

    fn skip_newlines(&mut self) {
        while self.check(&TokenKind::Newline) {
            self.position += 1;
        }
    }

    fn current_span(&self) -> Span {
        self.peek()
            .or_else(|| self.tokens.last())
            .map(|t| t.span)
            .unwrap_or_default()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn advance(&mut self) -> Option<Token> {
        if self.is_at_end() {
            None
        } else {
            let token = self.tokens[self.position].clone();
            self.position += 1;
            Some(token)
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek().map(|t| &t.kind == kind).unwrap_or(false)
    }

    fn is_at_end(&self) -> bool {
        self.peek()
            .map(|t| t.kind == TokenKind::Eof)
            .unwrap_or(true)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.check(&kind) {
            if let Some(token) = self.advance() {
                return Ok(token);
            }
        }
        let token = self.peek();
        Err(ParseError::new(
            format!(
                "Expected '{}', got '{}'",
                kind,
                token.map(|t| t.kind.to_string()).unwrap_or_else(|| "EOF".into())
            ),
            self.current_span(),
        ))
    }
}

/// Parse a line of input as the contents of a list, as `readlist` does.
pub fn read_list(text: &str) -> Result<List, LangError> {
    let source = format!("[{text}]");
    let tokens = Lexer::new(&source).tokenize()?;
    let mut parser = Parser::new(&source, tokens);
    let open = parser.expect(TokenKind::LeftBracket)?;
    match parser.parse_list(open.span)? {
        Node::List(list) => Ok(list),
        other => Err(LangError::Parse(ParseError::new(
            format!("Expected a list, got {}", other.node_type()),
            open.span,
        ))),
    }
}
