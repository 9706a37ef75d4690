//! Control primitives
//!
//! Everything that has to see or change the caller's variables, or that runs
//! a block, is a macro. Blocks are re-read from their source and their lines
//! are scheduled one at a time, so a block never recurses on the host stack
//! and a `pause` inside one stops between two of its lines.

use std::rc::Rc;

use crate::interpreter::{Environment, MacroContext, MacroStep, RuntimeError};
use crate::parser::{Call, List, Node, Procedure};

pub fn register(env: &mut Environment) {
    env.define(Procedure::native("alias", &["original", "alias"], |env, args| {
        env.alias(&args[0].as_name()?, &args[1].as_name()?)?;
        Ok(Node::None)
    }));

    env.define(Procedure::macro_procedure("output", &["value"], |_, args| {
        Ok(MacroStep::Output(args[0].clone()))
    }));
    env.define(Procedure::macro_procedure("stop", &[], |_, _| {
        Ok(MacroStep::Output(Node::Nil))
    }));

    env.define(Procedure::macro_procedure("thing", &["name"], |ctx, args| {
        let name = args[0].as_name()?;
        Ok(MacroStep::Done(ctx.env().thing(&name)?))
    }));
    env.define(Procedure::macro_procedure("local", &["name"], |ctx, args| {
        ctx.env().local(&args[0].as_name()?);
        Ok(MacroStep::Done(Node::None))
    }));
    env.define(Procedure::macro_procedure("make", &["name", "value"], |ctx, args| {
        ctx.env().make(&args[0].as_name()?, args[1].clone());
        Ok(MacroStep::Done(args[1].clone()))
    }));
    env.define(Procedure::macro_procedure("localmake", &["name", "value"], |ctx, args| {
        let name = args[0].as_name()?;
        ctx.env().local(&name);
        ctx.env().make(&name, args[1].clone());
        Ok(MacroStep::Done(args[1].clone()))
    }));

    env.define(Procedure::macro_procedure("if", &["condition", "iftrue"], if_then));
    env.define(Procedure::macro_procedure(
        "ifelse",
        &["condition", "iftrue", "iffalse"],
        if_else,
    ));
    env.define(Procedure::macro_procedure("repeat", &["count", "block"], repeat));
    env.define(Procedure::macro_procedure("run", &["block"], run));

    env.define(Procedure::macro_procedure("pause", &[], |ctx, _| {
        ctx.pause();
        Ok(MacroStep::Done(Node::None))
    }));
}

/// Lines of a block still to run, and the value of the last one that finished.
pub(crate) struct Block {
    lines: std::vec::IntoIter<Node>,
    value: Node,
}

impl Block {
    pub(crate) fn read(ctx: &mut MacroContext<'_>, list: &List) -> Result<Self, RuntimeError> {
        Ok(Self {
            lines: ctx.read(list)?.into_iter(),
            value: Node::Nil,
        })
    }

    /// Schedule the next call, or return the block's value once every line
    /// has run. Literal lines just become the current value.
    pub(crate) fn step(&mut self, ctx: &mut MacroContext<'_>) -> Result<Option<Node>, RuntimeError> {
        if let Some(value) = ctx.child_result() {
            self.value = value;
        }
        for line in self.lines.by_ref() {
            match line {
                Node::Call(call) => {
                    ctx.schedule(call);
                    return Ok(None);
                }
                Node::Symbol(name) => return Err(RuntimeError::FunctionNotFound(name.to_string())),
                Node::Procedure(_) => {}
                literal => self.value = literal,
            }
        }
        Ok(Some(std::mem::replace(&mut self.value, Node::Nil)))
    }
}

/// Resume the block held in the frame's state, or read `list` to start one.
fn run_block(ctx: &mut MacroContext<'_>, list: &List) -> Result<MacroStep, RuntimeError> {
    let mut block = match ctx.take_state::<Block>() {
        Some(block) => block,
        None => Block::read(ctx, list)?,
    };
    match block.step(ctx)? {
        Some(value) => Ok(MacroStep::Done(value)),
        None => {
            ctx.set_state(block);
            Ok(MacroStep::Pending)
        }
    }
}

/// if(condition, [block]) → value of the block, or nil
fn if_then(ctx: &mut MacroContext<'_>, args: &[Node]) -> Result<MacroStep, RuntimeError> {
    if args[0].as_boolean()? {
        run_block(ctx, args[1].as_list()?)
    } else {
        Ok(MacroStep::Done(Node::Nil))
    }
}

/// ifelse(condition, [iftrue], [iffalse]) → value of the chosen block
fn if_else(ctx: &mut MacroContext<'_>, args: &[Node]) -> Result<MacroStep, RuntimeError> {
    let branch = if args[0].as_boolean()? { &args[1] } else { &args[2] };
    run_block(ctx, branch.as_list()?)
}

struct Repeat {
    remaining: i64,
    block: Block,
}

/// repeat(count, [block]) → value of the last iteration
///
/// The block is read afresh for every iteration.
fn repeat(ctx: &mut MacroContext<'_>, args: &[Node]) -> Result<MacroStep, RuntimeError> {
    let list = args[1].as_list()?;
    let mut state = match ctx.take_state::<Repeat>() {
        Some(state) => state,
        None => {
            let count = args[0].as_integer()?;
            if count <= 0 {
                return Ok(MacroStep::Done(Node::Nil));
            }
            Repeat {
                remaining: count - 1,
                block: Block::read(ctx, list)?,
            }
        }
    };

    loop {
        match state.block.step(ctx)? {
            None => {
                ctx.set_state(state);
                return Ok(MacroStep::Pending);
            }
            Some(value) if state.remaining == 0 => return Ok(MacroStep::Done(value)),
            Some(_) => {
                state.remaining -= 1;
                state.block = Block::read(ctx, list)?;
            }
        }
    }
}

struct Running;

/// run([block]) → value of the block's last line
///
/// The block runs to completion on a stack of its own. A procedure name runs
/// that procedure; any other word is its own value.
fn run(ctx: &mut MacroContext<'_>, args: &[Node]) -> Result<MacroStep, RuntimeError> {
    if ctx.take_state::<Running>().is_some() {
        return Ok(MacroStep::Done(ctx.child_result().unwrap_or(Node::Nil)));
    }

    let program = match &args[0] {
        Node::List(list) => ctx.read(list)?,
        word @ (Node::Symbol(_) | Node::Quote(_)) => {
            let name = word.as_name()?;
            if !ctx.env().defined(&name) {
                return Ok(MacroStep::Done(word.clone()));
            }
            vec![Node::Call(Rc::new(Call::new(name, Vec::new(), Default::default())))]
        }
        value => return Ok(MacroStep::Done(value.clone())),
    };

    ctx.set_state(Running);
    ctx.run_bounded(program);
    Ok(MacroStep::Pending)
}
