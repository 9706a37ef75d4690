//! Template iteration: `map`, `filter` and `find`
//!
//! Every `?` in the template is replaced by the current value and the
//! realized template runs as a bounded program. Values are the items of a
//! list or the characters of a word.

use unicode_segmentation::UnicodeSegmentation;

use crate::interpreter::{Environment, MacroContext, MacroStep, RuntimeError};
use crate::parser::{List, Node, NodeType, NodeTypeError, Procedure};

pub fn register(env: &mut Environment) {
    env.define(Procedure::macro_procedure("map", &["template", "values"], |ctx, args| {
        iterate(ctx, args, Mode::Map)
    }));
    env.define(Procedure::macro_procedure("filter", &["template", "values"], |ctx, args| {
        iterate(ctx, args, Mode::Filter)
    }));
    env.define(Procedure::macro_procedure("find", &["template", "values"], |ctx, args| {
        iterate(ctx, args, Mode::Find)
    }));
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Map,
    Filter,
    Find,
}

struct Iteration {
    values: Vec<Node>,
    /// Position of the value whose run is in flight
    current: usize,
    results: Vec<Node>,
    /// Iterating the characters of a word rather than a list
    word: bool,
}

fn iterate(ctx: &mut MacroContext<'_>, args: &[Node], mode: Mode) -> Result<MacroStep, RuntimeError> {
    let template = args[0].as_list()?;

    let state = match ctx.take_state::<Iteration>() {
        Some(mut state) => {
            let result = ctx.child_result().unwrap_or(Node::Nil);
            let value = state.values[state.current].clone();
            state.current += 1;
            match mode {
                Mode::Map => state.results.push(result),
                Mode::Filter if truth(&result, template)? => state.results.push(value),
                Mode::Filter => {}
                Mode::Find if truth(&result, template)? => return Ok(MacroStep::Done(value)),
                Mode::Find => {}
            }
            state
        }
        None => start(&args[1])?,
    };

    match state.values.get(state.current) {
        Some(value) => {
            let realized = List::new(substitute(&template.items(), value));
            let program = ctx.read(&realized)?;
            ctx.set_state(state);
            ctx.run_bounded(program);
            Ok(MacroStep::Pending)
        }
        None => Ok(MacroStep::Done(finish(mode, state))),
    }
}

fn start(values: &Node) -> Result<Iteration, RuntimeError> {
    let (values, word) = match values {
        Node::List(list) => (list.to_vec(), false),
        Node::Symbol(text) | Node::Quote(text) => (
            text.graphemes(true).map(Node::quote).collect(),
            true,
        ),
        node => {
            return Err(NodeTypeError::new(&[NodeType::List, NodeType::Word], node).into());
        }
    };
    Ok(Iteration {
        values,
        current: 0,
        results: Vec::new(),
        word,
    })
}

fn finish(mode: Mode, state: Iteration) -> Node {
    match (mode, state.word) {
        (Mode::Find, _) => Node::Nil,
        (_, false) => Node::list(state.results),
        (Mode::Map, true) => {
            let text: String = state.results.iter().map(|node| node.to_string()).collect();
            Node::symbol(&text)
        }
        (Mode::Filter, true) => {
            let text: String = state.results.iter().map(|node| node.to_string()).collect();
            Node::quote(&text)
        }
    }
}

/// Filter and find templates must yield a boolean.
fn truth(result: &Node, template: &List) -> Result<bool, RuntimeError> {
    match result {
        Node::Boolean(b) => Ok(*b),
        _ => Err(NodeTypeError::new(&[NodeType::Boolean], &Node::List(template.clone())).into()),
    }
}

/// Replace every `?` symbol, at any nesting depth, with `value`.
fn substitute(template: &[Node], value: &Node) -> Vec<Node> {
    template
        .iter()
        .map(|node| match node {
            Node::Symbol(text) if &**text == "?" => as_literal(value),
            Node::List(list) => Node::list(substitute(&list.items(), value)),
            other => other.clone(),
        })
        .collect()
}

/// A bare word read back as code would be a call; quote it unless numeric.
fn as_literal(value: &Node) -> Node {
    match value {
        Node::Symbol(text) if !value.is_number() => Node::quote(text),
        other => other.clone(),
    }
}
