use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::rc::Rc;

use crate::interpreter::{Environment, RuntimeError};
use crate::parser::{self, Node, Procedure};

/// Sink for everything `print`, `show` and `type` write.
pub trait Output {
    fn write(&mut self, text: &str);
}

/// Source of lines for `readword` and `readlist`. `None` means no more input.
pub trait Input {
    fn read_line(&mut self) -> Option<String>;
}

pub trait Console: Output + Input {}

impl<T: Output + Input> Console for T {}

/// Process stdout and stdin.
#[derive(Debug, Default)]
pub struct StdConsole;

impl Output for StdConsole {
    fn write(&mut self, text: &str) {
        let mut stdout = io::stdout().lock();
        if let Err(err) = stdout.write_all(text.as_bytes()).and_then(|_| stdout.flush()) {
            log::warn!("failed to write output: {err}");
        }
    }
}

impl Input for StdConsole {
    fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
            Err(err) => {
                log::warn!("failed to read input: {err}");
                None
            }
        }
    }
}

/// In-memory console: input lines are queued up front, output is collected.
#[derive(Debug, Default)]
pub struct BufferedConsole {
    input: VecDeque<String>,
    output: String,
}

impl BufferedConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            input: lines.into_iter().map(Into::into).collect(),
            output: String::new(),
        }
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    /// Collected output split into lines, without their terminators.
    pub fn lines(&self) -> Vec<String> {
        self.output.lines().map(str::to_string).collect()
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }
}

impl Output for BufferedConsole {
    fn write(&mut self, text: &str) {
        self.output.push_str(text);
    }
}

impl Input for BufferedConsole {
    fn read_line(&mut self) -> Option<String> {
        self.input.pop_front()
    }
}

pub fn register(env: &mut Environment, console: Rc<RefCell<dyn Console>>) {
    let out = Rc::clone(&console);
    env.define(Procedure::native("print", &["thing"], move |_, args| {
        out.borrow_mut().write(&(join(args, print_form) + "\n"));
        Ok(Node::None)
    }));

    let out = Rc::clone(&console);
    env.define(Procedure::native("show", &["thing"], move |_, args| {
        out.borrow_mut().write(&(join(args, |node| node.to_string()) + "\n"));
        Ok(Node::None)
    }));

    let out = Rc::clone(&console);
    env.define(Procedure::native("type", &["thing"], move |_, args| {
        out.borrow_mut().write(&join(args, print_form));
        Ok(Node::None)
    }));

    let input = Rc::clone(&console);
    env.define(Procedure::native("readword", &[], move |_, _| {
        let line = input.borrow_mut().read_line().unwrap_or_default();
        Ok(Node::quote(&line))
    }));

    let input = console;
    env.define(Procedure::native("readlist", &[], move |_, _| {
        let line = input.borrow_mut().read_line().unwrap_or_default();
        parser::read_list(&line)
            .map(Node::List)
            .map_err(|err| RuntimeError::Syntax(err.to_string()))
    }));
}

/// Printed form: a list loses its outer brackets, nested lists keep theirs.
pub fn print_form(node: &Node) -> String {
    match node {
        Node::List(list) => list
            .items()
            .iter()
            .map(Node::to_string)
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}

fn join(args: &[Node], render: impl Fn(&Node) -> String) -> String {
    args.iter().map(render).collect::<Vec<_>>().join(" ")
}
