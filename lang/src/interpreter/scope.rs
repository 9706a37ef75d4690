use std::collections::HashMap;
use std::rc::Rc;

use crate::parser::{Node, Procedure};

use super::RuntimeError;

#[derive(Debug, Clone)]
enum Binding {
    /// Declared with `local` but never assigned
    Declared,
    Value(Node),
}

/// One dynamic variable frame, named after the procedure that pushed it.
#[derive(Debug, Clone)]
pub struct Scope {
    name: String,
    members: HashMap<String, Binding>,
}

impl Scope {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_lowercase(),
            members: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.contains_key(&name.to_lowercase())
    }

    /// A declared-but-unassigned name reads as `Node::None`.
    pub fn get(&self, name: &str) -> Option<Node> {
        self.members
            .get(&name.to_lowercase())
            .map(|binding| match binding {
                Binding::Declared => Node::None,
                Binding::Value(node) => node.clone(),
            })
    }

    pub fn set(&mut self, name: &str, value: Node) {
        self.members
            .insert(name.to_lowercase(), Binding::Value(value));
    }

    /// Insert a placeholder that shadows outer bindings. An existing binding in
    /// this scope is left untouched.
    pub fn declare(&mut self, name: &str) {
        self.members
            .entry(name.to_lowercase())
            .or_insert(Binding::Declared);
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Stack of dynamic scopes over a flat, global procedure table.
///
/// Variables resolve top-down through every active scope; procedures always
/// resolve against the global table. `make` rewrites the nearest binding and
/// falls back to creating a global one.
#[derive(Debug)]
pub struct Environment {
    scopes: Vec<Scope>,
    procedures: HashMap<String, Rc<Procedure>>,
}

pub const GLOBAL_SCOPE: &str = "global";

impl Environment {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new(GLOBAL_SCOPE)],
            procedures: HashMap::new(),
        }
    }

    pub fn push(&mut self, scope: Scope) {
        self.scopes.push(scope);
    }

    /// Pop the innermost scope. The global scope is never popped.
    pub fn pop(&mut self) -> Option<Scope> {
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    pub fn peek(&self) -> &Scope {
        &self.scopes[self.scopes.len() - 1]
    }

    pub fn peek_mut(&mut self) -> &mut Scope {
        let top = self.scopes.len() - 1;
        &mut self.scopes[top]
    }

    pub fn global(&self) -> &Scope {
        &self.scopes[0]
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Drop every scope above the global one.
    pub fn truncate(&mut self) {
        self.scopes.truncate(1);
    }

    pub fn define(&mut self, procedure: Procedure) -> Rc<Procedure> {
        let procedure = Rc::new(procedure);
        self.procedures
            .insert(procedure.name.to_lowercase(), Rc::clone(&procedure));
        procedure
    }

    pub fn procedure(&self, name: &str) -> Result<Rc<Procedure>, RuntimeError> {
        self.procedures
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| RuntimeError::FunctionNotFound(name.to_string()))
    }

    pub fn defined(&self, name: &str) -> bool {
        self.procedures.contains_key(&name.to_lowercase())
    }

    /// Copy of the procedure table, to be put back with `restore_procedures`.
    pub fn snapshot_procedures(&self) -> HashMap<String, Rc<Procedure>> {
        self.procedures.clone()
    }

    pub fn restore_procedures(&mut self, procedures: HashMap<String, Rc<Procedure>>) {
        self.procedures = procedures;
    }

    /// Bind a second name to an existing definition.
    pub fn alias(&mut self, original: &str, alias: &str) -> Result<(), RuntimeError> {
        let procedure = self.procedure(original)?;
        self.procedures.insert(alias.to_lowercase(), procedure);
        Ok(())
    }

    /// Every registered name with its definition, sorted by name.
    pub fn procedures(&self) -> Vec<(&str, &Rc<Procedure>)> {
        let mut entries: Vec<_> = self
            .procedures
            .iter()
            .map(|(name, procedure)| (name.as_str(), procedure))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    pub fn make(&mut self, name: &str, value: Node) {
        log::trace!("make {name} {}", value.to_source());
        match self.scopes.iter_mut().rev().find(|scope| scope.contains(name)) {
            Some(scope) => scope.set(name, value),
            None => self.scopes[0].set(name, value),
        }
    }

    pub fn local(&mut self, name: &str) {
        log::trace!("local {name} in {}", self.peek().name());
        self.peek_mut().declare(name);
    }

    pub fn thing(&self, name: &str) -> Result<Node, RuntimeError> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .ok_or_else(|| RuntimeError::VariableNotFound(name.to_string()))
    }

    pub fn thingable(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.contains(name))
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
