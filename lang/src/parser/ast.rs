use ordered_float::OrderedFloat;
use std::cell::{Ref, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use crate::interpreter::{Environment, MacroContext, MacroStep, RuntimeError};
use crate::lexer::Span;

/// A Logo datum. The same tree is both program and data: parsed code is made
/// of these nodes, and primitives consume and produce them.
#[derive(Clone, Debug)]
pub enum Node {
    /// 64-bit signed integer
    Integer(i64),

    /// 64-bit float; any float operand makes arithmetic produce a float
    Float(OrderedFloat<f64>),

    Boolean(bool),

    /// Bare word. Every raw word inside a `[ ... ]` literal is a Symbol.
    Symbol(Rc<str>),

    /// `"word`, stored without the leading quote mark
    Quote(Rc<str>),

    /// Absence of a value; never equal to anything
    Nil,

    /// Value of a declared but unassigned local; never equal to anything
    None,

    List(List),

    /// A call site template: `print :x`
    Call(Rc<Call>),

    Procedure(Rc<Procedure>),
}

/// Tags used in type errors. `Number` and `Word` name groups of tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Integer,
    Float,
    Number,
    Boolean,
    Symbol,
    Quote,
    Word,
    Nil,
    None,
    List,
    Call,
    Procedure,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeType::Integer => "integer",
            NodeType::Float => "float",
            NodeType::Number => "number",
            NodeType::Boolean => "boolean",
            NodeType::Symbol => "symbol",
            NodeType::Quote => "quote",
            NodeType::Word => "word",
            NodeType::Nil => "nil",
            NodeType::None => "none",
            NodeType::List => "list",
            NodeType::Call => "call",
            NodeType::Procedure => "procedure",
        };
        write!(f, "{name}")
    }
}

/// Raised when a node's tag does not match what an operation narrows it to.
#[derive(Debug, Clone)]
pub struct NodeTypeError {
    pub expected: Vec<NodeType>,
    pub received: NodeType,
    pub node: Node,
}

impl NodeTypeError {
    pub fn new(expected: &[NodeType], node: &Node) -> Self {
        Self {
            expected: expected.to_vec(),
            received: node.node_type(),
            node: node.clone(),
        }
    }
}

impl fmt::Display for NodeTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let expected: Vec<String> = self.expected.iter().map(|t| t.to_string()).collect();
        write!(
            f,
            "expected {} but received {} '{}'",
            expected.join(" or "),
            self.received,
            self.node.to_source()
        )
    }
}

/// A numeric operand after narrowing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Integer(n) => n as f64,
            Number::Float(n) => n,
        }
    }

    /// Parse word text the way the lexer reads numeric literals.
    pub fn parse(text: &str) -> Option<Number> {
        let digits = text.strip_prefix('-').unwrap_or(text);
        if digits.is_empty()
            || !digits.chars().all(|c| c.is_ascii_digit() || c == '.')
            || !digits.starts_with(|c: char| c.is_ascii_digit())
        {
            return None;
        }
        if digits.contains('.') {
            text.parse().ok().map(Number::Float)
        } else {
            text.parse().ok().map(Number::Integer)
        }
    }
}

impl From<Number> for Node {
    fn from(number: Number) -> Self {
        match number {
            Number::Integer(n) => Node::Integer(n),
            Number::Float(n) => Node::Float(OrderedFloat(n)),
        }
    }
}

impl Node {
    pub fn symbol(text: &str) -> Self {
        Node::Symbol(Rc::from(text))
    }

    pub fn quote(text: &str) -> Self {
        Node::Quote(Rc::from(text))
    }

    pub fn float(value: f64) -> Self {
        Node::Float(OrderedFloat(value))
    }

    pub fn list(items: Vec<Node>) -> Self {
        Node::List(List::new(items))
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            Node::Integer(_) => NodeType::Integer,
            Node::Float(_) => NodeType::Float,
            Node::Boolean(_) => NodeType::Boolean,
            Node::Symbol(_) => NodeType::Symbol,
            Node::Quote(_) => NodeType::Quote,
            Node::Nil => NodeType::Nil,
            Node::None => NodeType::None,
            Node::List(_) => NodeType::List,
            Node::Call(_) => NodeType::Call,
            Node::Procedure(_) => NodeType::Procedure,
        }
    }

    pub fn is_word(&self) -> bool {
        matches!(
            self,
            Node::Integer(_) | Node::Float(_) | Node::Boolean(_) | Node::Symbol(_) | Node::Quote(_)
        )
    }

    pub fn is_number(&self) -> bool {
        match self {
            Node::Integer(_) | Node::Float(_) => true,
            Node::Symbol(text) | Node::Quote(text) => Number::parse(text).is_some(),
            _ => false,
        }
    }

    /// Text of a Symbol or Quote.
    pub fn text(&self) -> Option<&str> {
        match self {
            Node::Symbol(text) | Node::Quote(text) => Some(text),
            _ => None,
        }
    }

    /// Printed text of any word, used by the word-level data primitives.
    pub fn word_text(&self) -> Option<String> {
        if self.is_word() {
            Some(self.to_string())
        } else {
            None
        }
    }

    pub fn as_number(&self) -> Result<Number, NodeTypeError> {
        match self {
            Node::Integer(n) => Ok(Number::Integer(*n)),
            Node::Float(n) => Ok(Number::Float(n.0)),
            Node::Symbol(text) | Node::Quote(text) => {
                Number::parse(text).ok_or_else(|| NodeTypeError::new(&[NodeType::Number], self))
            }
            _ => Err(NodeTypeError::new(&[NodeType::Number], self)),
        }
    }

    pub fn as_integer(&self) -> Result<i64, NodeTypeError> {
        match self.as_number() {
            Ok(Number::Integer(n)) => Ok(n),
            _ => Err(NodeTypeError::new(&[NodeType::Integer], self)),
        }
    }

    pub fn as_boolean(&self) -> Result<bool, NodeTypeError> {
        match self {
            Node::Boolean(b) => Ok(*b),
            _ => Err(NodeTypeError::new(&[NodeType::Boolean], self)),
        }
    }

    pub fn as_list(&self) -> Result<&List, NodeTypeError> {
        match self {
            Node::List(list) => Ok(list),
            _ => Err(NodeTypeError::new(&[NodeType::List], self)),
        }
    }

    /// Variable and procedure names arrive as `"name` or as a bare symbol.
    pub fn as_name(&self) -> Result<String, NodeTypeError> {
        match self {
            Node::Symbol(text) | Node::Quote(text) => Ok(text.to_lowercase()),
            _ => Err(NodeTypeError::new(&[NodeType::Symbol, NodeType::Quote], self)),
        }
    }

    pub fn as_call(&self) -> Result<&Rc<Call>, NodeTypeError> {
        match self {
            Node::Call(call) => Ok(call),
            _ => Err(NodeTypeError::new(&[NodeType::Call], self)),
        }
    }

    /// A copy that shares no list storage with `self`.
    pub fn deep_clone(&self) -> Node {
        match self {
            Node::List(list) => Node::List(list.deep_clone()),
            other => other.clone(),
        }
    }

    /// Re-readable form: quotes keep their mark, lists keep their brackets.
    pub fn to_source(&self) -> String {
        match self {
            Node::Quote(text) => format!("\"{text}"),
            Node::List(list) => format!("[{}]", list.inner_source()),
            other => other.to_string(),
        }
    }

    /// Ordering for numbers (widened) and for word text.
    pub fn compare(&self, other: &Node) -> Option<Ordering> {
        if let (Ok(a), Ok(b)) = (self.as_number(), other.as_number()) {
            return match (a, b) {
                (Number::Integer(a), Number::Integer(b)) => Some(a.cmp(&b)),
                (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
            };
        }
        match (self.text(), other.text()) {
            (Some(a), Some(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Node::Nil | Node::None, _) | (_, Node::Nil | Node::None) => false,
            (Node::Integer(a), Node::Integer(b)) => a == b,
            (Node::Float(a), Node::Float(b)) => a == b,
            (Node::Integer(a), Node::Float(b)) | (Node::Float(b), Node::Integer(a)) => {
                *a as f64 == b.0
            }
            (Node::Boolean(a), Node::Boolean(b)) => a == b,
            (Node::Boolean(b), Node::Symbol(t) | Node::Quote(t))
            | (Node::Symbol(t) | Node::Quote(t), Node::Boolean(b)) => {
                t.eq_ignore_ascii_case(if *b { "true" } else { "false" })
            }
            (Node::Symbol(a) | Node::Quote(a), Node::Symbol(b) | Node::Quote(b)) => a == b,
            (number @ (Node::Integer(_) | Node::Float(_)), Node::Symbol(t) | Node::Quote(t))
            | (Node::Symbol(t) | Node::Quote(t), number @ (Node::Integer(_) | Node::Float(_))) => {
                Number::parse(t).is_some_and(|n| Node::from(n) == *number)
            }
            (Node::List(a), Node::List(b)) => a == b,
            (Node::Call(a), Node::Call(b)) => {
                a.name.eq_ignore_ascii_case(&b.name) && a.children == b.children
            }
            (Node::Procedure(a), Node::Procedure(b)) => a.name.eq_ignore_ascii_case(&b.name),
            _ => false,
        }
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(other)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Integer(n) => write!(f, "{n}"),
            Node::Float(n) => {
                if n.0.is_finite() && n.0.fract() == 0.0 && n.0.abs() < 1e15 {
                    write!(f, "{:.1}", n.0)
                } else {
                    write!(f, "{}", n.0)
                }
            }
            Node::Boolean(b) => write!(f, "{b}"),
            Node::Symbol(text) | Node::Quote(text) => write!(f, "{text}"),
            Node::Nil => write!(f, "nil"),
            Node::None => Ok(()),
            Node::List(list) => {
                write!(f, "[")?;
                for (i, item) in list.items().iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Node::Call(call) => {
                write!(f, "({}", call.name)?;
                for child in &call.children {
                    write!(f, " {}", child.to_source())?;
                }
                write!(f, ")")
            }
            Node::Procedure(procedure) => write!(f, "to {}", procedure.header()),
        }
    }
}

/// Ordered, shared, mutable sequence of nodes. Clones share storage, so
/// `setitem` on a list bound to a variable is visible through the variable.
#[derive(Clone, Debug)]
pub struct List {
    data: Rc<RefCell<ListData>>,
    span: Option<Span>,
}

#[derive(Debug)]
struct ListData {
    items: Vec<Node>,
    source: Option<Rc<str>>,
}

impl List {
    pub fn new(items: Vec<Node>) -> Self {
        Self {
            data: Rc::new(RefCell::new(ListData {
                items,
                source: None,
            })),
            span: None,
        }
    }

    /// A list read from source text; `source` is the text between the brackets.
    pub fn parsed(items: Vec<Node>, source: &str, span: Span) -> Self {
        Self {
            data: Rc::new(RefCell::new(ListData {
                items,
                source: Some(Rc::from(source)),
            })),
            span: Some(span),
        }
    }

    pub fn items(&self) -> Ref<'_, Vec<Node>> {
        Ref::map(self.data.borrow(), |data| &data.items)
    }

    pub fn to_vec(&self) -> Vec<Node> {
        self.data.borrow().items.clone()
    }

    pub fn len(&self) -> usize {
        self.data.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.borrow().items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Node> {
        self.data.borrow().items.get(index).cloned()
    }

    /// Replace the item at `index` in place. Returns false when out of range.
    pub fn set(&self, index: usize, node: Node) -> bool {
        let mut data = self.data.borrow_mut();
        match data.items.get_mut(index) {
            Some(slot) => {
                *slot = node;
                data.source = None;
                true
            }
            None => false,
        }
    }

    /// Original text between the brackets, if the list came from source and
    /// has not been mutated since.
    pub fn source(&self) -> Option<Rc<str>> {
        self.data.borrow().source.clone()
    }

    pub fn span(&self) -> Option<Span> {
        self.span
    }

    pub fn ptr_eq(&self, other: &List) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }

    /// Copy with fresh storage for this list and every list nested in it.
    pub fn deep_clone(&self) -> List {
        let data = self.data.borrow();
        Self {
            data: Rc::new(RefCell::new(ListData {
                items: data.items.iter().map(Node::deep_clone).collect(),
                source: data.source.clone(),
            })),
            span: self.span,
        }
    }

    /// Whether `other` is this list or appears anywhere inside it.
    pub fn contains_list(&self, other: &List) -> bool {
        self.ptr_eq(other)
            || self.items().iter().any(|item| match item {
                Node::List(inner) => inner.contains_list(other),
                _ => false,
            })
    }

    /// Text to hand back to the parser when this list is run as code.
    pub fn inner_source(&self) -> String {
        if let Some(source) = self.source() {
            return source.to_string();
        }
        let items: Vec<String> = self.items().iter().map(Node::to_source).collect();
        items.join(" ")
    }
}

impl PartialEq for List {
    fn eq(&self, other: &Self) -> bool {
        let a = self.items();
        let b = other.items();
        a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
    }
}

/// A call site. Immutable once parsed; every evaluation gets its own frame.
#[derive(Debug)]
pub struct Call {
    pub name: String,
    pub children: Vec<Node>,
    pub span: Span,
}

impl Call {
    pub fn new(name: impl Into<String>, children: Vec<Node>, span: Span) -> Self {
        Self {
            name: name.into(),
            children,
            span,
        }
    }
}

pub type NativeFn = Rc<dyn Fn(&mut Environment, &[Node]) -> Result<Node, RuntimeError>>;
pub type MacroFn = Rc<dyn Fn(&mut MacroContext<'_>, &[Node]) -> Result<MacroStep, RuntimeError>>;

#[derive(Clone)]
pub enum ProcedureKind {
    UserDefined,
    /// Runs synchronously on evaluated arguments in its own scope
    Native(NativeFn),
    /// Runs in the caller's scope and may schedule further work
    Macro(MacroFn),
}

impl fmt::Debug for ProcedureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcedureKind::UserDefined => write!(f, "UserDefined"),
            ProcedureKind::Native(_) => write!(f, "Native"),
            ProcedureKind::Macro(_) => write!(f, "Macro"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Procedure {
    pub name: String,
    pub params: Vec<String>,
    pub kind: ProcedureKind,
    pub body: Vec<Node>,
    /// Text from `to` through `end`, kept for re-display
    pub source: Option<String>,
}

impl Procedure {
    pub fn user(name: &str, params: Vec<String>) -> Self {
        Self {
            name: name.to_lowercase(),
            params,
            kind: ProcedureKind::UserDefined,
            body: Vec::new(),
            source: None,
        }
    }

    pub fn native(
        name: &str,
        params: &[&str],
        callback: impl Fn(&mut Environment, &[Node]) -> Result<Node, RuntimeError> + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            kind: ProcedureKind::Native(Rc::new(callback)),
            body: Vec::new(),
            source: None,
        }
    }

    pub fn macro_procedure(
        name: &str,
        params: &[&str],
        callback: impl Fn(&mut MacroContext<'_>, &[Node]) -> Result<MacroStep, RuntimeError> + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            kind: ProcedureKind::Macro(Rc::new(callback)),
            body: Vec::new(),
            source: None,
        }
    }

    pub fn with_body(mut self, body: Vec<Node>, source: Option<String>) -> Self {
        self.body = body;
        self.source = source;
        self
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn is_macro(&self) -> bool {
        matches!(self.kind, ProcedureKind::Macro(_))
    }

    pub fn is_user_defined(&self) -> bool {
        matches!(self.kind, ProcedureKind::UserDefined)
    }

    /// `name :a :b`
    pub fn header(&self) -> String {
        let mut header = self.name.clone();
        for param in &self.params {
            header.push_str(" :");
            header.push_str(param);
        }
        header
    }
}
