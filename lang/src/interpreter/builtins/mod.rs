//! Primitive procedures
//!
//! Each group registers a fixed table of name, inputs and callback against an
//! Environment. Natives receive evaluated inputs and return synchronously;
//! macros run in the caller's scope and drive further work through a
//! `MacroContext`.

pub mod arithmetic;
pub mod control;
pub mod data;
pub mod io;
pub mod logic;
pub mod template;
pub mod turtle;

use std::cell::RefCell;
use std::rc::Rc;

use super::Environment;

pub use io::{BufferedConsole, Console, Input, Output, StdConsole};
pub use turtle::Turtle;

/// Register every primitive group. IO primitives talk to `console`; the
/// returned turtle is the one the turtle primitives move.
pub fn load_stdlib(env: &mut Environment, console: Rc<RefCell<dyn Console>>) -> Rc<RefCell<Turtle>> {
    let turtle = Rc::new(RefCell::new(Turtle::new()));

    arithmetic::register(env);
    logic::register(env);
    control::register(env);
    data::register(env);
    io::register(env, console);
    template::register(env);
    turtle::register(env, Rc::clone(&turtle));

    log::debug!("loaded {} primitives", env.procedures().len());
    turtle
}
