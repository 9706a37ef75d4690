use im_rc::Vector;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::LangError;
use crate::lexer::{Lexer, Span};
use crate::parser::{Call, List, Node, NodeTypeError, Parser, ProcedureKind};

use super::frame::Frame;
use super::scope::{Environment, Scope};

/// Default bound on active frames before a run is abandoned as runaway recursion
pub const DEFAULT_MAX_DEPTH: usize = 100_000;

#[derive(Debug, Clone)]
pub enum RuntimeError {
    NodeType(NodeTypeError),
    FunctionNotFound(String),
    VariableNotFound(String),
    Recursion {
        procedure: String,
        depth: usize,
    },
    NotEnoughInputs {
        procedure: String,
        expected: usize,
        received: usize,
    },
    Arithmetic(String),
    Index {
        index: i64,
        length: usize,
    },
    /// A list run as code failed to lex or parse
    Syntax(String),
    /// setitem would store a list inside itself
    CircularList,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::NodeType(err) => write!(f, "{err}"),
            RuntimeError::FunctionNotFound(name) => write!(f, "I don't know how to {name}"),
            RuntimeError::VariableNotFound(name) => write!(f, "{name} has no value"),
            RuntimeError::Recursion { procedure, depth } => write!(
                f,
                "too many nested calls ({depth} active) while calling {procedure}"
            ),
            RuntimeError::NotEnoughInputs {
                procedure,
                expected,
                received,
            } => write!(
                f,
                "not enough inputs to {procedure}: expected {expected}, received {received}"
            ),
            RuntimeError::Arithmetic(message) => write!(f, "{message}"),
            RuntimeError::Index { index, length } => {
                write!(f, "index {index} is out of range for length {length}")
            }
            RuntimeError::Syntax(message) => write!(f, "{message}"),
            RuntimeError::CircularList => write!(f, "a list cannot contain itself"),
        }
    }
}

impl std::error::Error for RuntimeError {}

impl From<NodeTypeError> for RuntimeError {
    fn from(err: NodeTypeError) -> Self {
        RuntimeError::NodeType(err)
    }
}

/// What a macro reports back after one invocation.
#[derive(Debug)]
pub enum MacroStep {
    /// Revisit this frame once the work it scheduled has finished
    Pending,
    /// The frame is complete with this value
    Done(Node),
    /// Complete the nearest enclosing user-defined procedure with this value
    Output(Node),
}

/// Handle a macro gets to the engine during one invocation.
///
/// Requests made through the context are applied after the macro returns:
/// at most one scheduled call, or one bounded sub-program, per invocation.
pub struct MacroContext<'a> {
    env: &'a mut Environment,
    continuation: &'a mut Option<Box<dyn Any>>,
    child_result: Option<Node>,
    scheduled: Option<Rc<Call>>,
    bounded: Option<Vec<Node>>,
    pause: bool,
}

impl<'a> MacroContext<'a> {
    pub fn env(&mut self) -> &mut Environment {
        self.env
    }

    /// Take this frame's continuation out, if it holds a `T`.
    pub fn take_state<T: 'static>(&mut self) -> Option<T> {
        let state = self.continuation.take()?;
        match state.downcast::<T>() {
            Ok(state) => Some(*state),
            Err(other) => {
                *self.continuation = Some(other);
                None
            }
        }
    }

    pub fn set_state<T: 'static>(&mut self, state: T) {
        *self.continuation = Some(Box::new(state));
    }

    /// Value of the call or bounded program this macro last waited on.
    pub fn child_result(&mut self) -> Option<Node> {
        self.child_result.take()
    }

    pub fn schedule(&mut self, call: Rc<Call>) {
        self.scheduled = Some(call);
    }

    /// Run `program` on a fresh stack, isolated from the outer program, and
    /// hand its final value back through `child_result`.
    pub fn run_bounded(&mut self, program: Vec<Node>) {
        self.bounded = Some(program);
    }

    pub fn read(&mut self, list: &List) -> Result<Vec<Node>, RuntimeError> {
        read_block(self.env, list)
    }

    pub fn pause(&mut self) {
        self.pause = true;
    }
}

struct Bounded {
    frames: Vec<Frame>,
    program: Vector<Node>,
}

/// Explicit-stack evaluator. All evaluation state lives in the frame stack,
/// the program queue and the environment, so the host stack never grows with
/// user recursion and pausing is simply not ticking.
pub struct Interpreter {
    env: Environment,
    frames: Vec<Frame>,
    program: Vector<Node>,
    /// Outer state saved by bounded runs, innermost last
    bounded: Vec<Bounded>,
    suspended: usize,
    last_result: Node,
    paused: bool,
    max_depth: usize,
    /// Active frame count per procedure name
    active: HashMap<String, usize>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            env: Environment::new(),
            frames: Vec::with_capacity(64),
            program: Vector::new(),
            bounded: Vec::new(),
            suspended: 0,
            last_result: Node::None,
            paused: false,
            max_depth,
            active: HashMap::new(),
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn last_result(&self) -> &Node {
        &self.last_result
    }

    /// Parse source into a program list. Procedure definitions are registered
    /// as they are read and appear in the program as `Node::Procedure`.
    pub fn read(&mut self, source: &str) -> Result<Node, LangError> {
        Ok(Node::list(read_source(&mut self.env, source)?))
    }

    /// Re-tokenize a literal block into a program list.
    pub fn read_list(&mut self, list: &List) -> Result<Node, RuntimeError> {
        Ok(Node::list(read_block(&mut self.env, list)?))
    }

    /// Queue a program (or a single node) behind any pending work.
    pub fn load(&mut self, program: Node) {
        match program {
            Node::List(list) => self.program.extend(list.to_vec()),
            node => self.program.push_back(node),
        }
    }

    /// Load and tick until the work runs out or the engine pauses. While
    /// paused the program is only queued.
    pub fn run(&mut self, program: Node) -> Result<Node, RuntimeError> {
        if self.is_idle() {
            self.last_result = Node::None;
        }
        self.load(program);
        self.drive()
    }

    pub fn resume(&mut self) -> Result<Node, RuntimeError> {
        if self.paused {
            log::debug!("resume at depth {}", self.depth());
            self.paused = false;
        }
        self.drive()
    }

    /// Takes effect at the next tick boundary.
    pub fn pause(&mut self) {
        if !self.paused {
            log::debug!("pause at depth {}", self.depth());
        }
        self.paused = true;
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn is_idle(&self) -> bool {
        !self.has_work()
    }

    /// Active frames, including those saved by enclosing bounded runs.
    pub fn depth(&self) -> usize {
        self.frames.len() + self.suspended
    }

    /// Names of the active frames, innermost first.
    pub fn backtrace(&self) -> Vec<String> {
        self.frames
            .iter()
            .rev()
            .chain(
                self.bounded
                    .iter()
                    .rev()
                    .flat_map(|saved| saved.frames.iter().rev()),
            )
            .map(|frame| frame.call.name.clone())
            .collect()
    }

    /// Source position of the innermost active call.
    pub fn current_span(&self) -> Option<Span> {
        self.frames.last().map(|frame| frame.call.span)
    }

    /// Discard all in-flight work after an error. Definitions and global
    /// variables survive.
    pub fn reset(&mut self) {
        self.frames.clear();
        self.program.clear();
        self.bounded.clear();
        self.suspended = 0;
        self.active.clear();
        self.env.truncate();
        self.paused = false;
    }

    /// Perform one state transition. Returns whether work remains.
    pub fn tick(&mut self) -> Result<bool, RuntimeError> {
        if self.paused {
            return Ok(self.has_work());
        }

        let top = self
            .frames
            .last()
            .map(|frame| (frame.evaluated, frame.needs_arguments()));
        match top {
            None => self.advance_program()?,
            Some((true, _)) => {
                self.unschedule();
            }
            Some((false, true)) => self.evaluate_argument()?,
            Some((false, false)) => self.invoke()?,
        }

        Ok(self.has_work())
    }

    /// Push a frame for `call`, with a fresh scope unless it is a macro.
    pub fn schedule(&mut self, call: Rc<Call>) -> Result<(), RuntimeError> {
        let definition = self.env.procedure(&call.name)?;
        let depth = self.depth();
        if depth >= self.max_depth {
            return Err(RuntimeError::Recursion {
                procedure: definition.name.clone(),
                depth,
            });
        }

        let active = self.active.entry(definition.name.clone()).or_insert(0);
        if *active > 0 && definition.is_user_defined() {
            log::debug!("recursive call to {} ({} active)", definition.name, active);
        }
        *active += 1;

        log::trace!("schedule {} at depth {}", definition.name, depth + 1);
        if !definition.is_macro() {
            self.env.push(Scope::new(&definition.name));
        }
        self.frames.push(Frame::new(call, definition));
        Ok(())
    }

    /// Pop the top frame and route its value to whoever was waiting on it.
    pub fn unschedule(&mut self) -> Option<Node> {
        let frame = self.frames.pop()?;
        self.release(&frame);

        let result = frame.result.unwrap_or(Node::Nil);
        log::trace!("unschedule {} -> {}", frame.definition.name, result.to_source());

        if let Some(parent) = self.frames.last_mut() {
            if parent.needs_arguments() {
                parent.arguments.push(result.clone());
            } else {
                parent.result = Some(result.clone());
            }
        }
        self.last_result = result.clone();
        Some(result)
    }

    fn has_work(&self) -> bool {
        !self.frames.is_empty() || !self.program.is_empty() || !self.bounded.is_empty()
    }

    fn drive(&mut self) -> Result<Node, RuntimeError> {
        while !self.paused {
            match self.tick() {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) => {
                    log::warn!("{err} (in {})", self.backtrace().join(" <- "));
                    return Err(err);
                }
            }
        }
        Ok(self.last_result.clone())
    }

    fn release(&mut self, frame: &Frame) {
        if !frame.is_macro() {
            self.env.pop();
        }
        if let Some(count) = self.active.get_mut(frame.name()) {
            *count -= 1;
            if *count == 0 {
                self.active.remove(frame.name());
            }
        }
    }

    fn advance_program(&mut self) -> Result<(), RuntimeError> {
        if let Some(node) = self.program.pop_front() {
            match node {
                Node::Call(call) => self.schedule(call)?,
                Node::Symbol(name) => return Err(RuntimeError::FunctionNotFound(name.to_string())),
                Node::Procedure(procedure) => {
                    log::debug!("defined {}", procedure.header());
                    self.last_result = Node::None;
                }
                literal => self.last_result = literal,
            }
        } else if let Some(saved) = self.bounded.pop() {
            self.end_bounded(saved);
        }
        Ok(())
    }

    fn evaluate_argument(&mut self) -> Result<(), RuntimeError> {
        let Some(frame) = self.frames.last_mut() else {
            return Ok(());
        };
        match frame.next_argument() {
            Some(Node::Call(call)) => self.schedule(call),
            Some(literal) => {
                frame.arguments.push(literal.deep_clone());
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn invoke(&mut self) -> Result<(), RuntimeError> {
        let Some(frame) = self.frames.last_mut() else {
            return Ok(());
        };
        let definition = Rc::clone(&frame.definition);

        if frame.arguments.len() < definition.arity() {
            return Err(RuntimeError::NotEnoughInputs {
                procedure: definition.name.clone(),
                expected: definition.arity(),
                received: frame.arguments.len(),
            });
        }

        if !frame.bound {
            frame.bound = true;
            if !definition.is_macro() {
                for (name, value) in definition.params.iter().zip(&frame.arguments) {
                    self.env.local(name);
                    self.env.make(name, value.clone());
                }
            }
        }

        match &definition.kind {
            ProcedureKind::Native(callback) => {
                log::trace!("call primitive {}", definition.name);
                let result = callback(&mut self.env, &frame.arguments)?;
                frame.finish(result);
                Ok(())
            }
            ProcedureKind::Macro(callback) => {
                let mut context = MacroContext {
                    env: &mut self.env,
                    continuation: &mut frame.continuation,
                    child_result: frame.result.take(),
                    scheduled: None,
                    bounded: None,
                    pause: false,
                };
                let step = callback(&mut context, &frame.arguments)?;
                let MacroContext {
                    scheduled,
                    bounded,
                    pause,
                    ..
                } = context;

                let mut output = None;
                match step {
                    MacroStep::Pending => {}
                    MacroStep::Done(value) => frame.finish(value),
                    MacroStep::Output(value) => output = Some(value),
                }

                if let Some(program) = bounded {
                    self.begin_bounded(program);
                } else if let Some(call) = scheduled {
                    self.schedule(call)?;
                }
                if let Some(value) = output {
                    self.output(value);
                }
                if pause {
                    self.pause();
                }
                Ok(())
            }
            ProcedureKind::UserDefined => self.step_body(),
        }
    }

    fn step_body(&mut self) -> Result<(), RuntimeError> {
        let Some(frame) = self.frames.last_mut() else {
            return Ok(());
        };
        match frame.definition.body.get(frame.cursor).cloned() {
            Some(line) => {
                frame.cursor += 1;
                match line {
                    Node::Call(call) => self.schedule(call)?,
                    Node::Symbol(name) => {
                        return Err(RuntimeError::FunctionNotFound(name.to_string()));
                    }
                    Node::Procedure(_) => {}
                    literal => frame.result = Some(literal.deep_clone()),
                }
            }
            None => {
                let result = frame.result.take().unwrap_or(Node::Nil);
                frame.finish(result);
            }
        }
        Ok(())
    }

    /// Complete the nearest user-defined frame with `value`, abandoning every
    /// frame above it. Bounded runs between here and that frame are abandoned
    /// too. Outside any procedure the innermost remaining frame completes.
    fn output(&mut self, value: Node) {
        loop {
            if let Some(target) = self.frames.iter().rposition(Frame::is_user_defined) {
                self.abandon_above(target + 1);
                if let Some(frame) = self.frames.get_mut(target) {
                    frame.finish(value);
                }
                return;
            }

            let Some(saved) = self.bounded.pop() else {
                if let Some(frame) = self.frames.last_mut() {
                    frame.finish(value);
                }
                return;
            };

            log::debug!("output leaves a bounded run, restoring {} frames", saved.frames.len());
            self.abandon_above(0);
            self.suspended -= saved.frames.len();
            self.frames = saved.frames;
            self.program = saved.program;
        }
    }

    /// Pop and release frames until `len` remain.
    fn abandon_above(&mut self, len: usize) {
        while self.frames.len() > len {
            if let Some(frame) = self.frames.pop() {
                log::trace!("abandon {}", frame.definition.name);
                self.release(&frame);
            }
        }
    }

    fn begin_bounded(&mut self, program: Vec<Node>) {
        let frames = std::mem::take(&mut self.frames);
        let outer = std::mem::replace(&mut self.program, program.into_iter().collect());
        log::debug!(
            "bounded run of {} lines, saving {} frames",
            self.program.len(),
            frames.len()
        );
        self.suspended += frames.len();
        self.bounded.push(Bounded {
            frames,
            program: outer,
        });
        self.last_result = Node::Nil;
    }

    fn end_bounded(&mut self, saved: Bounded) {
        let result = self.last_result.clone();
        log::debug!("bounded run finished with {}", result.to_source());
        self.suspended -= saved.frames.len();
        self.frames = saved.frames;
        self.program = saved.program;
        if let Some(frame) = self.frames.last_mut() {
            frame.result = Some(result);
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn read_source(env: &mut Environment, source: &str) -> Result<Vec<Node>, LangError> {
    let tokens = Lexer::new(source).tokenize()?;
    Ok(Parser::new(source, tokens).parse_program(env)?)
}

fn read_block(env: &mut Environment, list: &List) -> Result<Vec<Node>, RuntimeError> {
    let source = list.inner_source();
    read_source(env, &source).map_err(|err| RuntimeError::Syntax(format!("{err} in [{source}]")))
}
