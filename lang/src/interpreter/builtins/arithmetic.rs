use crate::interpreter::{Environment, RuntimeError};
use crate::parser::{Node, Number, Procedure};

pub fn register(env: &mut Environment) {
    env.define(Procedure::native("add", &["a", "b"], |_, args| {
        binary(&args[0], &args[1], "add", i64::checked_add, |a, b| a + b)
    }));
    env.define(Procedure::native("sub", &["a", "b"], |_, args| {
        binary(&args[0], &args[1], "sub", i64::checked_sub, |a, b| a - b)
    }));
    env.define(Procedure::native("mul", &["a", "b"], |_, args| {
        binary(&args[0], &args[1], "mul", i64::checked_mul, |a, b| a * b)
    }));
    env.define(Procedure::native("div", &["a", "b"], |_, args| divide(&args[0], &args[1])));
    env.define(Procedure::native("mod", &["a", "b"], |_, args| modulo(&args[0], &args[1])));
    env.define(Procedure::native("integer", &["n"], |_, args| integer(&args[0])));
    env.define(Procedure::native("round", &["n"], |_, args| round(&args[0])));
}

/// Integer op Integer stays integral; any Float operand widens both.
fn binary(
    left: &Node,
    right: &Node,
    name: &str,
    integers: fn(i64, i64) -> Option<i64>,
    floats: fn(f64, f64) -> f64,
) -> Result<Node, RuntimeError> {
    match (left.as_number()?, right.as_number()?) {
        (Number::Integer(a), Number::Integer(b)) => integers(a, b)
            .map(Node::Integer)
            .ok_or_else(|| RuntimeError::Arithmetic(format!("integer overflow in {name} {a} {b}"))),
        (a, b) => Ok(Node::float(floats(a.as_f64(), b.as_f64()))),
    }
}

/// div(a, b) → Number
/// Truncates when both inputs are integers.
fn divide(left: &Node, right: &Node) -> Result<Node, RuntimeError> {
    match (left.as_number()?, right.as_number()?) {
        (Number::Integer(_), Number::Integer(0)) => {
            Err(RuntimeError::Arithmetic("division by zero".to_string()))
        }
        (Number::Integer(a), Number::Integer(b)) => a
            .checked_div(b)
            .map(Node::Integer)
            .ok_or_else(|| RuntimeError::Arithmetic(format!("integer overflow in div {a} {b}"))),
        (a, b) => Ok(Node::float(a.as_f64() / b.as_f64())),
    }
}

/// mod(a, b) → Integer
/// Sign follows the dividend.
fn modulo(left: &Node, right: &Node) -> Result<Node, RuntimeError> {
    let a = left.as_integer()?;
    let b = right.as_integer()?;
    if b == 0 {
        return Err(RuntimeError::Arithmetic("division by zero".to_string()));
    }
    a.checked_rem(b)
        .map(Node::Integer)
        .ok_or_else(|| RuntimeError::Arithmetic(format!("integer overflow in mod {a} {b}")))
}

/// integer(n) → Integer, truncating toward zero
fn integer(value: &Node) -> Result<Node, RuntimeError> {
    match value.as_number()? {
        Number::Integer(n) => Ok(Node::Integer(n)),
        Number::Float(n) => float_to_integer(n.trunc()),
    }
}

/// round(n) → Integer, halves away from zero
fn round(value: &Node) -> Result<Node, RuntimeError> {
    match value.as_number()? {
        Number::Integer(n) => Ok(Node::Integer(n)),
        Number::Float(n) => float_to_integer(n.round()),
    }
}

fn float_to_integer(n: f64) -> Result<Node, RuntimeError> {
    if n.is_finite() && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        Ok(Node::Integer(n as i64))
    } else {
        Err(RuntimeError::Arithmetic(format!("{n} does not fit in an integer")))
    }
}
