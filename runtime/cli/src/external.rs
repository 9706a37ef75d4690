use crate::output::ConsoleEntry;
use lang::interpreter::builtins::{Input, Output, StdConsole};
use std::time::Instant;

/// Console used in JSON mode. Output is kept line by line with the time it
/// was written instead of going to stdout; input still comes from stdin.
pub struct RecordingConsole {
    started: Instant,
    pending: String,
    entries: Vec<ConsoleEntry>,
    input: Box<dyn Input>,
}

impl RecordingConsole {
    pub fn new() -> Self {
        Self::with_input(Box::new(StdConsole))
    }

    pub fn with_input(input: Box<dyn Input>) -> Self {
        Self {
            started: Instant::now(),
            pending: String::new(),
            entries: Vec::new(),
            input,
        }
    }

    /// Everything written so far. A trailing partial line from `type` is
    /// included as its own entry.
    pub fn take_entries(&mut self) -> Vec<ConsoleEntry> {
        if !self.pending.is_empty() {
            let message = std::mem::take(&mut self.pending);
            self.push(message);
        }
        std::mem::take(&mut self.entries)
    }

    fn push(&mut self, message: String) {
        let timestamp_ms = self.started.elapsed().as_millis() as u64;
        self.entries.push(ConsoleEntry {
            timestamp_ms,
            message,
        });
    }
}

impl Output for RecordingConsole {
    fn write(&mut self, text: &str) {
        self.pending.push_str(text);
        while let Some(newline) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=newline).collect();
            self.push(line.trim_end_matches('\n').to_string());
        }
    }
}

impl Input for RecordingConsole {
    fn read_line(&mut self) -> Option<String> {
        self.input.read_line()
    }
}
