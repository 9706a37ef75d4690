/// Collects the lines of a `to ... end` definition typed at the REPL so the
/// whole procedure is read in one go.
#[derive(Debug, Default)]
pub struct Definition {
    lines: Vec<String>,
}

impl Definition {
    pub fn is_open(&self) -> bool {
        !self.lines.is_empty()
    }

    /// Feed one line. Returns the collected source once a line starting with
    /// `end` closes the definition, or the line itself when no definition is
    /// being collected and it does not start one.
    pub fn push(&mut self, line: &str) -> Option<String> {
        if !self.is_open() && !starts_with_word(line, "to") {
            return Some(line.to_string());
        }

        self.lines.push(line.to_string());
        if self.lines.len() > 1 && starts_with_word(line, "end") {
            return Some(std::mem::take(&mut self.lines).join("\n"));
        }
        None
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

fn starts_with_word(line: &str, word: &str) -> bool {
    line.split_whitespace()
        .next()
        .is_some_and(|first| first.eq_ignore_ascii_case(word))
}
