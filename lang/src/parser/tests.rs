use super::*;
use crate::interpreter::builtins::{self, BufferedConsole};
use crate::lexer::Lexer;
use expect_test::{Expect, expect};
use std::cell::RefCell;
use std::rc::Rc;

fn environment() -> Environment {
    let mut env = Environment::new();
    builtins::load_stdlib(&mut env, Rc::new(RefCell::new(BufferedConsole::new())));
    env
}

fn check(input: &str, expect: Expect) {
    let mut env = environment();
    let output = match parse(input, &mut env) {
        Ok(program) => format_program(&program),
        Err(e) => format!("Error: {} at {}:{}", e.message, e.span.line, e.span.column),
    };
    expect.assert_eq(&output);
}

fn parse(input: &str, env: &mut Environment) -> Result<Vec<Node>, ParseError> {
    let tokens = Lexer::new(input).tokenize().expect("Should tokenize");
    Parser::new(input, tokens).parse_program(env)
}

fn format_program(program: &[Node]) -> String {
    program.iter().map(format_node).collect::<Vec<_>>().join("\n")
}

fn format_node(node: &Node) -> String {
    match node {
        Node::Procedure(procedure) => {
            let mut lines = vec![format!("to {}", procedure.header())];
            lines.extend(procedure.body.iter().map(|line| format!("  {}", format_node(line))));
            lines.push("end".to_string());
            lines.join("\n")
        }
        other => other.to_source(),
    }
}

#[test]
fn parse_operator_precedence() {
    check(
        "print 2 + 3 * 4 - 1",
        expect!["(print (sub (add 2 (mul 3 4)) 1))"],
    );
}

#[test]
fn parse_grouping() {
    check("print (2 + 3) * 4", expect!["(print (mul (add 2 3) 4))"]);
}

#[test]
fn parse_comparison_and_equality() {
    check(
        "1 + 2 = 3\n:a <= :b\n:a != 1",
        expect![[r#"
            (equal? (add 1 2) 3)
            (lessequal? (thing a) (thing b))
            (notequal? (thing a) 1)"#]],
    );
}

#[test]
fn parse_calls_by_arity() {
    check(
        r#"print item 2 [a b c]
make "x sentence [a] "b
turtlepos"#,
        expect![[r#"
            (print (item 2 [a b c]))
            (make "x (sentence [a] "b))
            (turtlepos)"#]],
    );
}

#[test]
fn parse_variadic_call() {
    check(
        "(print 1 2 3)\n(sentence [a] [b] [c])",
        expect![[r#"
            (print 1 2 3)
            (sentence [a] [b] [c])"#]],
    );
}

#[test]
fn parse_lists_are_not_evaluated() {
    check(
        "repeat 4 [fd 100 rt 90]\nprint [nested [list :x] \"q]",
        expect![[r#"
            (repeat 4 [fd 100 rt 90])
            (print [nested [list :x] "q])"#]],
    );
}

#[test]
fn parse_literals() {
    check(
        "true\nfalse\nnil\n3.5\n-2\n\"word",
        expect![[r#"
            true
            false
            nil
            3.5
            -2
            "word"#]],
    );
}

#[test]
fn parse_procedure_definition() {
    check(
        "to square :n
  output :n * :n
end
print square 5",
        expect![[r#"
            to square :n
              (output (mul (thing n) (thing n)))
            end
            (print (square 5))"#]],
    );
}

#[test]
fn parse_forward_reference() {
    check(
        "print twice 2
to twice :x
  output :x * 2
end",
        expect![[r#"
            (print (twice 2))
            to twice :x
              (output (mul (thing x) 2))
            end"#]],
    );
}

#[test]
fn parse_keeps_definition_source() {
    let mut env = environment();
    let source = "; squares\nto square :n\n  output :n * :n\nEND\n";
    parse(source, &mut env).expect("Should parse");

    let procedure = env.procedure("square").expect("Should be defined");
    assert_eq!(
        procedure.source.as_deref(),
        Some("to square :n\n  output :n * :n\nEND")
    );
    assert_eq!(procedure.arity(), 1);
}

#[test]
fn parse_alias_before_use() {
    check(
        "alias \"print \"say\nsay \"hi",
        expect![[r#"
            (alias "print "say)
            (say "hi)"#]],
    );
}

#[test]
fn parse_unknown_word_is_a_symbol() {
    check("frobnicate 1", expect![[r#"
        frobnicate
        1"#]]);
}

#[test]
fn parse_error_unterminated_list() {
    check("print [a b", expect!["Error: Unterminated list at 1:7"]);
}

#[test]
fn parse_error_missing_paren() {
    check("(2 + 3", expect!["Error: Expected ')' at 1:7"]);
}

#[test]
fn parse_error_missing_end() {
    check(
        "to square :n\n  output :n * :n",
        expect!["Error: Missing 'end' for procedure square at 1:1"],
    );
}

#[test]
fn failed_read_keeps_existing_definitions() {
    let mut env = environment();
    parse("to foo :a\n  print :a\nend", &mut env).expect("Should parse");

    let err = parse("to foo\n  print 1\nto bar\nend\nalias \"foo \"baz", &mut env)
        .expect_err("Should fail");
    assert_eq!(err.message, "Cannot define a procedure inside foo");

    let foo = env.procedure("foo").expect("foo should survive");
    assert_eq!(foo.header(), "foo :a");
    assert!(!env.defined("bar"));
    assert!(!env.defined("baz"));
}

#[test]
fn parse_error_nested_definition() {
    check(
        "to outer\n  to inner\n  end\nend",
        expect!["Error: Cannot define a procedure inside outer at 2:3"],
    );
}

#[test]
fn parse_error_missing_input() {
    check("print", expect!["Error: Unexpected end of input at 1:6"]);
}

#[test]
fn parse_error_stray_bracket() {
    check("print ]", expect!["Error: Unexpected token ']' at 1:7"]);
}

#[test]
fn read_list_parses_a_line_of_words() {
    let list = read_list("hello [big] world").expect("Should read");
    assert_eq!(list.len(), 3);
    assert_eq!(Node::List(list).to_string(), "[hello [big] world]");
}
