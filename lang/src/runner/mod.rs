use crate::error::LangError;
use crate::interpreter::Interpreter;
use crate::parser::Node;
use std::time::Instant;


/// Drives one script through an interpreter, stopping at pauses.
pub struct ScriptRunner {
    source: String,
}

/// How far a run got.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The program ran out; holds the value of the last expression
    Completed(Node),
    /// A `pause` stopped the engine with work still pending
    Paused,
}

impl Outcome {
    pub fn is_paused(&self) -> bool {
        matches!(self, Outcome::Paused)
    }
}

impl ScriptRunner {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Read the whole script, registering its procedures, then run it.
    pub fn run(&self, interpreter: &mut Interpreter) -> Result<Outcome, LangError> {
        let program = interpreter.read(&self.source)?;
        let value = interpreter.run(program)?;
        Ok(outcome(interpreter, value))
    }

    pub fn resume(&self, interpreter: &mut Interpreter) -> Result<Outcome, LangError> {
        let value = interpreter.resume()?;
        Ok(outcome(interpreter, value))
    }

    /// Run and keep resuming through every pause. Returns the final value
    /// and the elapsed milliseconds.
    pub fn run_to_completion(&self, interpreter: &mut Interpreter) -> Result<(Node, u128), LangError> {
        let start = Instant::now();
        let mut pauses = 0;
        let mut outcome = self.run(interpreter)?;

        loop {
            match outcome {
                Outcome::Completed(value) => return Ok((value, start.elapsed().as_millis())),
                Outcome::Paused => {
                    pauses += 1;
                    log::info!(
                        "paused ({pauses}) at depth {}: {}",
                        interpreter.depth(),
                        interpreter.backtrace().join(" <- ")
                    );
                    outcome = self.resume(interpreter)?;
                }
            }
        }
    }
}

fn outcome(interpreter: &Interpreter, value: Node) -> Outcome {
    if interpreter.paused() {
        Outcome::Paused
    } else {
        Outcome::Completed(value)
    }
}
