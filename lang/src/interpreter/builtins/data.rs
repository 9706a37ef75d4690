//! Word and list primitives
//!
//! Words are treated as sequences of grapheme clusters. Operations that take
//! a word and give back a word keep a quoted word quoted; everything else
//! comes back as a bare symbol.

use std::cell::Cell;
use std::rc::Rc;

use unicode_segmentation::UnicodeSegmentation;

use crate::interpreter::{Environment, RuntimeError};
use crate::parser::{Node, NodeType, NodeTypeError, Procedure};

pub fn register(env: &mut Environment) {
    // Selectors
    env.define(Procedure::native("first", &["thing"], |_, args| first(&args[0])));
    env.define(Procedure::native("last", &["thing"], |_, args| last(&args[0])));
    env.define(Procedure::native("butfirst", &["thing"], |_, args| butfirst(&args[0])));
    env.define(Procedure::native("butlast", &["thing"], |_, args| butlast(&args[0])));
    env.define(Procedure::native("item", &["index", "thing"], |_, args| {
        item(&args[0], &args[1])
    }));

    // Mutators
    env.define(Procedure::native("setitem", &["index", "list", "value"], |_, args| {
        setitem(&args[0], &args[1], &args[2])
    }));

    // Constructors
    env.define(Procedure::native("fput", &["thing", "list"], |_, args| {
        fput(&args[0], &args[1])
    }));
    env.define(Procedure::native("lput", &["thing", "list"], |_, args| {
        lput(&args[0], &args[1])
    }));
    env.define(Procedure::native("reverse", &["thing"], |_, args| reverse(&args[0])));
    env.define(Procedure::native("word", &["a", "b"], |_, args| word(args)));
    env.define(Procedure::native("list", &["a", "b"], |_, args| {
        Ok(Node::list(args.iter().map(Node::deep_clone).collect()))
    }));
    env.define(Procedure::native("sentence", &["a", "b"], |_, args| Ok(sentence(args))));
    env.define(Procedure::native("lowercase", &["thing"], |_, args| {
        convert_case(&args[0], str::to_lowercase)
    }));
    env.define(Procedure::native("uppercase", &["thing"], |_, args| {
        convert_case(&args[0], str::to_uppercase)
    }));

    let counter = Rc::new(Cell::new(0u64));
    env.define(Procedure::native("gensym", &[], move |_, _| {
        counter.set(counter.get() + 1);
        Ok(Node::symbol(&format!("g{}", counter.get())))
    }));

    // Queries
    env.define(Procedure::native("count", &["thing"], |_, args| count(&args[0])));
    env.define(Procedure::native("empty?", &["thing"], |_, args| {
        Ok(Node::Boolean(is_empty(&args[0])))
    }));
    env.define(Procedure::native("word?", &["thing"], |_, args| {
        Ok(Node::Boolean(args[0].is_word()))
    }));
    env.define(Procedure::native("number?", &["thing"], |_, args| {
        Ok(Node::Boolean(args[0].is_number()))
    }));
    env.define(Procedure::native("list?", &["thing"], |_, args| {
        Ok(Node::Boolean(matches!(args[0], Node::List(_))))
    }));
    env.define(Procedure::native("member?", &["thing", "list"], |_, args| {
        member(&args[0], &args[1])
    }));
}

fn type_error(node: &Node) -> RuntimeError {
    NodeTypeError::new(&[NodeType::List, NodeType::Word], node).into()
}

fn word_text(node: &Node) -> Result<String, RuntimeError> {
    node.word_text()
        .ok_or_else(|| NodeTypeError::new(&[NodeType::Word], node).into())
}

fn graphemes(text: &str) -> Vec<&str> {
    text.graphemes(true).collect()
}

/// A word built from `text`, quoted if `like` was quoted.
fn rebuild(like: &Node, text: &str) -> Node {
    match like {
        Node::Quote(_) => Node::quote(text),
        _ => Node::symbol(text),
    }
}

/// first(list | word) → first item or character
fn first(thing: &Node) -> Result<Node, RuntimeError> {
    select(thing, |length| (length > 0).then_some(0))
}

/// last(list | word) → last item or character
fn last(thing: &Node) -> Result<Node, RuntimeError> {
    select(thing, |length| length.checked_sub(1))
}

/// item(index, list | word) → the item at a 1-based index
fn item(index: &Node, thing: &Node) -> Result<Node, RuntimeError> {
    let index = index.as_integer()?;
    select(thing, |length| {
        usize::try_from(index)
            .ok()
            .filter(|i| (1..=length).contains(i))
            .map(|i| i - 1)
    })
    .map_err(|err| match err {
        RuntimeError::Index { length, .. } => RuntimeError::Index { index, length },
        other => other,
    })
}

fn select(thing: &Node, position: impl Fn(usize) -> Option<usize>) -> Result<Node, RuntimeError> {
    match thing {
        Node::List(list) => {
            let length = list.len();
            position(length)
                .and_then(|i| list.get(i))
                .ok_or(RuntimeError::Index { index: 1, length })
        }
        node if node.is_word() => {
            let text = word_text(node)?;
            let chars = graphemes(&text);
            position(chars.len())
                .map(|i| rebuild(node, chars[i]))
                .ok_or(RuntimeError::Index {
                    index: 1,
                    length: chars.len(),
                })
        }
        node => Err(type_error(node)),
    }
}

/// butfirst(list | word) → everything but the first item
fn butfirst(thing: &Node) -> Result<Node, RuntimeError> {
    slice(thing, |length| 1.min(length)..length)
}

/// butlast(list | word) → everything but the last item
fn butlast(thing: &Node) -> Result<Node, RuntimeError> {
    slice(thing, |length| 0..length.saturating_sub(1))
}

fn slice(
    thing: &Node,
    range: impl Fn(usize) -> std::ops::Range<usize>,
) -> Result<Node, RuntimeError> {
    match thing {
        Node::List(list) => {
            let items = list.items();
            Ok(Node::list(
                items[range(items.len())].iter().map(Node::deep_clone).collect(),
            ))
        }
        node if node.is_word() => {
            let text = word_text(node)?;
            let chars = graphemes(&text);
            Ok(rebuild(node, &chars[range(chars.len())].concat()))
        }
        node => Err(type_error(node)),
    }
}

/// setitem(index, list, value) → none
///
/// Replaces the item in place, so every variable holding the list sees it.
/// The stored value is a copy, and a list may not be stored inside itself.
fn setitem(index: &Node, list: &Node, value: &Node) -> Result<Node, RuntimeError> {
    let index = index.as_integer()?;
    let list = list.as_list()?;
    if let Node::List(inner) = value
        && inner.contains_list(list)
    {
        return Err(RuntimeError::CircularList);
    }
    let replaced = usize::try_from(index)
        .ok()
        .and_then(|i| i.checked_sub(1))
        .is_some_and(|i| list.set(i, value.deep_clone()));
    if replaced {
        Ok(Node::None)
    } else {
        Err(RuntimeError::Index {
            index,
            length: list.len(),
        })
    }
}

/// fput(thing, list | word) → list with `thing` in front
fn fput(thing: &Node, target: &Node) -> Result<Node, RuntimeError> {
    match target {
        Node::List(list) => {
            let mut items = Vec::with_capacity(list.len() + 1);
            items.push(thing.deep_clone());
            items.extend(list.items().iter().map(Node::deep_clone));
            Ok(Node::list(items))
        }
        node if node.is_word() => Ok(rebuild(node, &(word_text(thing)? + &word_text(node)?))),
        node => Err(type_error(node)),
    }
}

/// lput(thing, list | word) → list with `thing` at the end
fn lput(thing: &Node, target: &Node) -> Result<Node, RuntimeError> {
    match target {
        Node::List(list) => {
            let mut items: Vec<Node> = list.items().iter().map(Node::deep_clone).collect();
            items.push(thing.deep_clone());
            Ok(Node::list(items))
        }
        node if node.is_word() => Ok(rebuild(node, &(word_text(node)? + &word_text(thing)?))),
        node => Err(type_error(node)),
    }
}

fn reverse(thing: &Node) -> Result<Node, RuntimeError> {
    match thing {
        Node::List(list) => Ok(Node::list(list.items().iter().rev().map(Node::deep_clone).collect())),
        node if node.is_word() => {
            let text = word_text(node)?;
            Ok(rebuild(node, &text.graphemes(true).rev().collect::<String>()))
        }
        node => Err(type_error(node)),
    }
}

/// word(a, b, ...) → symbol of the inputs' text run together
fn word(args: &[Node]) -> Result<Node, RuntimeError> {
    let mut text = String::new();
    for arg in args {
        match arg {
            Node::Nil => {}
            node => text.push_str(&word_text(node)?),
        }
    }
    Ok(Node::symbol(&text))
}

/// sentence(a, b, ...) → list of the inputs, with list inputs spliced in
fn sentence(args: &[Node]) -> Node {
    let mut items = Vec::new();
    for arg in args {
        match arg {
            Node::List(list) => items.extend(list.items().iter().map(Node::deep_clone)),
            node => items.push(node.deep_clone()),
        }
    }
    Node::list(items)
}

fn convert_case(thing: &Node, convert: fn(&str) -> String) -> Result<Node, RuntimeError> {
    match thing {
        Node::List(list) => {
            let items = list
                .items()
                .iter()
                .map(|item| convert_case(item, convert))
                .collect::<Result<_, _>>()?;
            Ok(Node::list(items))
        }
        Node::Symbol(text) | Node::Quote(text) => Ok(rebuild(thing, &convert(text))),
        node if node.is_word() => Ok(node.clone()),
        node => Err(type_error(node)),
    }
}

/// count(list | word) → number of items or characters
fn count(thing: &Node) -> Result<Node, RuntimeError> {
    let length = match thing {
        Node::List(list) => list.len(),
        node if node.is_word() => word_text(node)?.graphemes(true).count(),
        node => return Err(type_error(node)),
    };
    Ok(Node::Integer(length as i64))
}

fn is_empty(thing: &Node) -> bool {
    match thing {
        Node::List(list) => list.is_empty(),
        Node::Symbol(text) | Node::Quote(text) => text.is_empty(),
        Node::Nil | Node::None => true,
        _ => false,
    }
}

/// member?(thing, list | word) → whether `thing` is one of the items
fn member(thing: &Node, target: &Node) -> Result<Node, RuntimeError> {
    match target {
        Node::List(list) => Ok(Node::Boolean(list.items().iter().any(|item| item == thing))),
        node if node.is_word() => {
            let needle = word_text(thing)?;
            let text = word_text(node)?;
            Ok(Node::Boolean(text.graphemes(true).any(|g| g == needle)))
        }
        node => Err(type_error(node)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(items: &[&str]) -> Node {
        Node::list(items.iter().map(|item| Node::symbol(item)).collect())
    }

    #[test]
    fn selectors_work_on_lists_and_words() {
        assert_eq!(first(&words(&["a", "b", "c"])).ok(), Some(Node::symbol("a")));
        assert_eq!(last(&Node::quote("héllo")).ok(), Some(Node::quote("o")));
        assert_eq!(
            butfirst(&words(&["a", "b", "c"])).ok(),
            Some(words(&["b", "c"]))
        );
        assert_eq!(butlast(&Node::quote("abc")).ok(), Some(Node::quote("ab")));
        assert_eq!(
            item(&Node::Integer(2), &words(&["a", "b"])).ok(),
            Some(Node::symbol("b"))
        );
    }

    #[test]
    fn words_are_split_by_grapheme() {
        assert!(matches!(count(&Node::quote("e\u{301}a")), Ok(Node::Integer(2))));
        assert_eq!(
            reverse(&Node::quote("e\u{301}a")).ok(),
            Some(Node::quote("ae\u{301}"))
        );
    }

    #[test]
    fn out_of_range_index() {
        assert!(matches!(
            item(&Node::Integer(4), &words(&["a", "b"])),
            Err(RuntimeError::Index { index: 4, length: 2 })
        ));
        assert!(matches!(
            first(&Node::list(Vec::new())),
            Err(RuntimeError::Index { length: 0, .. })
        ));
    }

    #[test]
    fn setitem_mutates_shared_list() {
        let list = words(&["a", "b"]);
        let alias = list.clone();
        assert!(setitem(&Node::Integer(1), &list, &Node::Integer(9)).is_ok());
        assert_eq!(alias.to_string(), "[9 b]");
    }

    #[test]
    fn setitem_stores_a_copy() {
        let target = words(&["a", "b"]);
        let value = words(&["x"]);
        assert!(setitem(&Node::Integer(1), &target, &value).is_ok());
        assert!(setitem(&Node::Integer(1), &value, &Node::symbol("y")).is_ok());
        assert_eq!(target.to_string(), "[[x] b]");
    }

    #[test]
    fn setitem_rejects_a_list_inside_itself() {
        let inner = words(&["a"]);
        let outer = Node::list(vec![inner.clone(), Node::symbol("b")]);

        assert!(matches!(
            setitem(&Node::Integer(1), &outer, &outer),
            Err(RuntimeError::CircularList)
        ));
        let wrapper = Node::list(vec![outer.clone()]);
        assert!(matches!(
            setitem(&Node::Integer(1), &inner, &wrapper),
            Err(RuntimeError::CircularList)
        ));
        assert_eq!(outer.to_string(), "[[a] b]");
    }

    #[test]
    fn constructors_copy_nested_lists() {
        let original = Node::list(vec![words(&["1", "2"]), Node::Integer(3)]);
        let built = [
            fput(&Node::Integer(0), &original),
            lput(&Node::Integer(0), &original),
            reverse(&original),
            butlast(&original),
            Ok(sentence(&[original.clone()])),
        ];

        for node in built {
            let node = node.expect("Should build");
            let list = node.as_list().expect("Should be a list");
            for item in list.items().iter() {
                if let Node::List(nested) = item {
                    assert!(nested.set(0, Node::Integer(9)));
                }
            }
        }
        assert_eq!(original.to_string(), "[[1 2] 3]");
    }

    #[test]
    fn constructors() {
        assert_eq!(
            fput(&Node::symbol("x"), &words(&["a"])).map(|n| n.to_string()).ok(),
            Some("[x a]".to_string())
        );
        assert_eq!(
            lput(&Node::symbol("x"), &words(&["a"])).map(|n| n.to_string()).ok(),
            Some("[a x]".to_string())
        );
        assert_eq!(
            word(&[Node::quote("ab"), Node::Integer(1)]).ok(),
            Some(Node::symbol("ab1"))
        );
        assert_eq!(
            sentence(&[words(&["a", "b"]), Node::symbol("c")]).to_string(),
            "[a b c]"
        );
    }

    #[test]
    fn case_conversion_recurses() {
        let nested = Node::list(vec![Node::quote("Ab"), words(&["cD"])]);
        assert_eq!(
            convert_case(&nested, str::to_uppercase).map(|n| n.to_string()).ok(),
            Some("[AB [CD]]".to_string())
        );
    }

    #[test]
    fn predicates() {
        assert!(is_empty(&Node::list(Vec::new())));
        assert!(!is_empty(&Node::quote("a")));
        assert!(matches!(
            member(&Node::symbol("b"), &words(&["a", "b"])),
            Ok(Node::Boolean(true))
        ));
        assert!(matches!(
            member(&Node::quote("z"), &Node::quote("abc")),
            Ok(Node::Boolean(false))
        ));
    }
}
