use std::cell::RefCell;
use std::rc::Rc;

use crate::interpreter::{Environment, RuntimeError};
use crate::parser::{Node, Procedure};

/// Headless turtle. Heading is in degrees, clockwise, with 0 pointing north.
#[derive(Debug, Clone, PartialEq)]
pub struct Turtle {
    x: f64,
    y: f64,
    heading: f64,
    /// Every point the turtle has visited since the screen was last cleared
    path: Vec<(f64, f64)>,
}

impl Turtle {
    pub fn new() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            heading: 0.0,
            path: vec![(0.0, 0.0)],
        }
    }

    pub fn forward(&mut self, distance: f64) {
        let radians = self.heading.to_radians();
        self.x += distance * radians.sin();
        self.y += distance * radians.cos();
        self.path.push((self.x, self.y));
    }

    /// Positive angles turn clockwise.
    pub fn turn(&mut self, degrees: f64) {
        self.heading = (self.heading + degrees).rem_euclid(360.0);
    }

    pub fn home(&mut self) {
        self.x = 0.0;
        self.y = 0.0;
        self.heading = 0.0;
        self.path.push((0.0, 0.0));
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn position(&self) -> (i64, i64) {
        (self.x.round() as i64, self.y.round() as i64)
    }

    pub fn path(&self) -> &[(f64, f64)] {
        &self.path
    }

    fn position_node(&self) -> Node {
        let (x, y) = self.position();
        Node::list(vec![Node::Integer(x), Node::Integer(y)])
    }
}

impl Default for Turtle {
    fn default() -> Self {
        Self::new()
    }
}

pub fn register(env: &mut Environment, turtle: Rc<RefCell<Turtle>>) {
    for name in ["forward", "fd"] {
        define_motion(env, name, &turtle, |turtle, n| turtle.forward(n));
    }
    for name in ["back", "bk"] {
        define_motion(env, name, &turtle, |turtle, n| turtle.forward(-n));
    }
    for name in ["right", "rt"] {
        define_motion(env, name, &turtle, |turtle, n| turtle.turn(n));
    }
    for name in ["left", "lt"] {
        define_motion(env, name, &turtle, |turtle, n| turtle.turn(-n));
    }

    let state = Rc::clone(&turtle);
    env.define(Procedure::native("turtlepos", &[], move |_, _| {
        Ok(state.borrow().position_node())
    }));

    let state = Rc::clone(&turtle);
    env.define(Procedure::native("home", &[], move |_, _| {
        let mut turtle = state.borrow_mut();
        turtle.home();
        Ok(turtle.position_node())
    }));

    for name in ["clearscreen", "cs"] {
        let state = Rc::clone(&turtle);
        env.define(Procedure::native(name, &[], move |_, _| {
            let mut turtle = state.borrow_mut();
            turtle.clear();
            Ok(turtle.position_node())
        }));
    }
}

fn define_motion(
    env: &mut Environment,
    name: &str,
    turtle: &Rc<RefCell<Turtle>>,
    apply: fn(&mut Turtle, f64),
) {
    let state = Rc::clone(turtle);
    env.define(Procedure::native(name, &["amount"], move |_, args| {
        let amount = args[0].as_number()?.as_f64();
        let mut turtle = state.borrow_mut();
        apply(&mut turtle, amount);
        Ok::<_, RuntimeError>(turtle.position_node())
    }));
}
