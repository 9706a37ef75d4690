//! Machine-readable output for `-o json`.
//!
//! A run prints exactly one JSON object on stdout: either the script result
//! together with everything the program wrote, or the error that stopped it.

use lang::error::LangError;
use lang::Node;
use serde::Serialize;

/// Output mode for CLI execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Program output goes straight to stdout (default)
    Text,
    /// Single JSON object after execution completes
    Json,
}

impl OutputMode {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "text" => Some(OutputMode::Text),
            "json" => Some(OutputMode::Json),
            _ => None,
        }
    }
}

/// One line written by `print`, `show` or `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsoleEntry {
    pub timestamp_ms: u64,
    pub message: String,
}

/// Error location with 1-indexed line and column.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorLocation {
    pub line: u32,
    pub column: u32,
}

/// JSON output for script execution.
#[derive(Debug, Clone, Serialize)]
pub struct JsonScriptOutput {
    #[serde(rename = "type")]
    pub output_type: &'static str,
    pub status: &'static str,
    pub value: String,
    pub duration_ms: u64,
    pub console: Vec<ConsoleEntry>,
}

/// JSON output for errors. Runtime errors carry no location.
#[derive(Debug, Clone, Serialize)]
pub struct JsonErrorOutput {
    #[serde(rename = "type")]
    pub output_type: &'static str,
    pub message: String,
    pub location: Option<ErrorLocation>,
    pub backtrace: Vec<String>,
    pub console: Vec<ConsoleEntry>,
}

pub fn format_error_json(
    error: &LangError,
    backtrace: Vec<String>,
    console: Vec<ConsoleEntry>,
) -> JsonErrorOutput {
    let message = match error {
        LangError::Lex(err) => err.message.clone(),
        LangError::Parse(err) => err.message.clone(),
        LangError::Runtime(err) => err.to_string(),
    };

    JsonErrorOutput {
        output_type: "error",
        message,
        location: error
            .location()
            .map(|(line, column)| ErrorLocation { line, column }),
        backtrace,
        console,
    }
}

pub fn format_script_json(value: &Node, duration_ms: u64, console: Vec<ConsoleEntry>) -> JsonScriptOutput {
    JsonScriptOutput {
        output_type: "script",
        status: "complete",
        value: display_value(value),
        duration_ms,
        console,
    }
}

/// Nil and None have no printed form; they report as an empty string.
pub fn display_value(value: &Node) -> String {
    match value {
        Node::Nil | Node::None => String::new(),
        other => other.to_string(),
    }
}

pub fn to_json<T: Serialize>(output: &T) -> String {
    serde_json::to_string(output).unwrap_or_else(|err| {
        log::error!("failed to serialize output: {err}");
        r#"{"type":"error","message":"failed to serialize output","location":null}"#.to_string()
    })
}
