use std::any::Any;
use std::rc::Rc;

use crate::parser::{Call, Node, Procedure, ProcedureKind};

/// Evaluation state of one in-flight invocation.
///
/// The parsed `Call` is only a template; everything that changes while the
/// invocation runs lives here, so the same template can be on the stack many
/// times at once.
pub struct Frame {
    pub call: Rc<Call>,
    pub definition: Rc<Procedure>,
    pub arguments: Vec<Node>,
    /// Formals have been bound into the frame's scope
    pub bound: bool,
    /// Next body line to schedule (user-defined procedures)
    pub cursor: usize,
    pub result: Option<Node>,
    pub evaluated: bool,
    /// Work a macro keeps between its invocations
    pub continuation: Option<Box<dyn Any>>,
}

impl Frame {
    pub fn new(call: Rc<Call>, definition: Rc<Procedure>) -> Self {
        Self {
            arguments: Vec::with_capacity(call.children.len()),
            call,
            definition,
            bound: false,
            cursor: 0,
            result: None,
            evaluated: false,
            continuation: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn is_macro(&self) -> bool {
        self.definition.is_macro()
    }

    pub fn is_user_defined(&self) -> bool {
        matches!(self.definition.kind, ProcedureKind::UserDefined)
    }

    pub fn needs_arguments(&self) -> bool {
        self.arguments.len() < self.call.children.len()
    }

    /// The argument expression to evaluate next.
    pub fn next_argument(&self) -> Option<Node> {
        self.call.children.get(self.arguments.len()).cloned()
    }

    pub fn finish(&mut self, result: Node) {
        self.result = Some(result);
        self.evaluated = true;
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("name", &self.definition.name)
            .field("arguments", &self.arguments)
            .field("cursor", &self.cursor)
            .field("result", &self.result)
            .field("evaluated", &self.evaluated)
            .finish()
    }
}
