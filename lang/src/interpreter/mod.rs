pub mod builtins;
mod engine;
mod frame;
mod scope;

#[cfg(test)]
mod tests;

pub use engine::{DEFAULT_MAX_DEPTH, Interpreter, MacroContext, MacroStep, RuntimeError};
pub use frame::Frame;
pub use scope::{Environment, GLOBAL_SCOPE, Scope};
