pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod runner;

pub use error::LangError;
pub use interpreter::Interpreter;
pub use parser::Node;
