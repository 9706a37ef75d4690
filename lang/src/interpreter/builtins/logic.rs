use std::cmp::Ordering;

use crate::interpreter::{Environment, RuntimeError};
use crate::parser::{Node, Number, Procedure};

pub fn register(env: &mut Environment) {
    env.define(Procedure::native("equal?", &["a", "b"], |_, args| {
        Ok(Node::Boolean(args[0] == args[1]))
    }));
    env.define(Procedure::native("notequal?", &["a", "b"], |_, args| {
        Ok(Node::Boolean(args[0] != args[1]))
    }));
    env.define(Procedure::native("less?", &["a", "b"], |_, args| {
        compare(&args[0], &args[1], Ordering::is_lt)
    }));
    env.define(Procedure::native("greater?", &["a", "b"], |_, args| {
        compare(&args[0], &args[1], Ordering::is_gt)
    }));
    env.define(Procedure::native("lessequal?", &["a", "b"], |_, args| {
        compare(&args[0], &args[1], Ordering::is_le)
    }));
    env.define(Procedure::native("greaterequal?", &["a", "b"], |_, args| {
        compare(&args[0], &args[1], Ordering::is_ge)
    }));
    env.define(Procedure::native("and", &["a", "b"], |_, args| {
        Ok(Node::Boolean(args[0].as_boolean()? && args[1].as_boolean()?))
    }));
    env.define(Procedure::native("or", &["a", "b"], |_, args| {
        Ok(Node::Boolean(args[0].as_boolean()? || args[1].as_boolean()?))
    }));
    env.define(Procedure::native("not", &["a"], |_, args| {
        Ok(Node::Boolean(!args[0].as_boolean()?))
    }));
}

/// Numeric comparison with integer-to-float widening. NaN compares false.
fn compare(left: &Node, right: &Node, test: fn(Ordering) -> bool) -> Result<Node, RuntimeError> {
    let ordering = match (left.as_number()?, right.as_number()?) {
        (Number::Integer(a), Number::Integer(b)) => Some(a.cmp(&b)),
        (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
    };
    Ok(Node::Boolean(ordering.is_some_and(test)))
}
