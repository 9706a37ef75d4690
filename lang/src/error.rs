use crate::interpreter::RuntimeError;
use crate::lexer::LexError;
use crate::parser::ParseError;
use std::fmt;

/// Unified error type for reading and running Logo source
#[derive(Debug)]
pub enum LangError {
    Lex(LexError),
    Parse(ParseError),
    Runtime(RuntimeError),
}

impl From<LexError> for LangError {
    fn from(err: LexError) -> Self {
        LangError::Lex(err)
    }
}

impl From<ParseError> for LangError {
    fn from(err: ParseError) -> Self {
        LangError::Parse(err)
    }
}

impl From<RuntimeError> for LangError {
    fn from(err: RuntimeError) -> Self {
        LangError::Runtime(err)
    }
}

impl fmt::Display for LangError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LangError::Lex(err) => write!(
                f,
                "Lexical error at line {}, column {}: {}",
                err.line, err.column, err.message
            ),
            LangError::Parse(err) => write!(
                f,
                "Parse error at line {}, column {}: {}",
                err.span.line, err.span.column, err.message
            ),
            LangError::Runtime(err) => write!(f, "Runtime error: {err}"),
        }
    }
}

impl std::error::Error for LangError {}

impl LangError {
    /// Line and column of the offending source text. Runtime errors have
    /// none: blocks are re-read, so their positions are not file positions.
    pub fn location(&self) -> Option<(u32, u32)> {
        match self {
            LangError::Lex(err) => Some((err.line, err.column)),
            LangError::Parse(err) => Some((err.span.line, err.span.column)),
            LangError::Runtime(_) => None,
        }
    }

    /// Format error with source context
    pub fn format_with_source(&self, source: &str) -> String {
        let (line, column, message, kind) = match self {
            LangError::Lex(err) => (err.line, err.column, &err.message, "Lexical error"),
            LangError::Parse(err) => (err.span.line, err.span.column, &err.message, "Parse error"),
            LangError::Runtime(_) => return format!("\n{self}\n"),
        };

        let mut output = String::new();

        output.push_str(&format!("\n{} at line {}", kind, line));
        if column > 0 {
            output.push_str(&format!(", column {}", column));
        }
        output.push_str(&format!(": {}\n\n", message));

        // Two lines either side of the error
        let lines: Vec<&str> = source.lines().collect();
        let error_line_idx = (line as usize).saturating_sub(1);

        let start = error_line_idx.saturating_sub(2);
        let end = (error_line_idx + 3).min(lines.len());

        for (idx, line_content) in lines.iter().enumerate().take(end).skip(start) {
            let line_num = idx + 1;

            if idx == error_line_idx {
                output.push_str(&format!(" → {:4} | {}\n", line_num, line_content));

                if column > 0 {
                    output.push_str("        | ");
                    output.push_str(&" ".repeat(column as usize - 1));
                    output.push_str("^\n");
                }
            } else {
                output.push_str(&format!("   {:4} | {}\n", line_num, line_content));
            }
        }

        output
    }
}
