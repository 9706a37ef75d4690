mod scope_tests {
    use crate::interpreter::{Environment, RuntimeError, Scope};
    use crate::parser::{Node, Procedure};

    #[test]
    fn lookup_walks_scopes_top_down() {
        let mut env = Environment::new();
        env.make("v", Node::Integer(1));
        env.push(Scope::new("outer"));
        env.local("v");
        env.make("v", Node::Integer(2));
        env.push(Scope::new("inner"));

        assert_eq!(env.thing("v").ok(), Some(Node::Integer(2)));
        env.pop();
        env.pop();
        assert_eq!(env.thing("v").ok(), Some(Node::Integer(1)));
    }

    #[test]
    fn make_falls_back_to_global() {
        let mut env = Environment::new();
        env.push(Scope::new("proc"));
        env.make("fresh", Node::quote("x"));
        env.pop();

        assert!(env.global().contains("fresh"));
        assert!(env.thingable("FRESH"));
    }

    #[test]
    fn declared_local_reads_as_none() {
        let mut env = Environment::new();
        env.make("v", Node::Integer(1));
        env.push(Scope::new("proc"));
        env.local("v");

        assert!(matches!(env.thing("v"), Ok(Node::None)));
    }

    #[test]
    fn global_scope_is_never_popped() {
        let mut env = Environment::new();
        assert!(env.pop().is_none());
        assert_eq!(env.depth(), 1);
        assert_eq!(env.peek().name(), "global");
    }

    #[test]
    fn unknown_names() {
        let env = Environment::new();
        assert!(matches!(env.thing("nope"), Err(RuntimeError::VariableNotFound(_))));
        assert!(matches!(
            env.procedure("nope"),
            Err(RuntimeError::FunctionNotFound(_))
        ));
    }

    #[test]
    fn procedures_are_case_insensitive_and_aliasable() {
        let mut env = Environment::new();
        env.define(Procedure::user("Square", vec!["n".to_string()]));

        assert!(env.defined("SQUARE"));
        assert!(env.alias("square", "sq").is_ok());
        assert_eq!(env.procedure("sq").map(|p| p.header()).ok(), Some("square :n".to_string()));
        assert!(env.alias("missing", "m").is_err());
    }
}

mod engine_tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use expect_test::{Expect, expect};

    use crate::error::LangError;
    use crate::interpreter::builtins::{self, BufferedConsole, Console};
    use crate::interpreter::{DEFAULT_MAX_DEPTH, Interpreter, RuntimeError};
    use crate::parser::Node;

    struct Session {
        interpreter: Interpreter,
        console: Rc<RefCell<BufferedConsole>>,
    }

    impl Session {
        fn new() -> Self {
            Self::with_max_depth(DEFAULT_MAX_DEPTH)
        }

        fn with_max_depth(max_depth: usize) -> Self {
            let console = Rc::new(RefCell::new(BufferedConsole::new()));
            let sink: Rc<RefCell<dyn Console>> = console.clone();
            let mut interpreter = Interpreter::with_max_depth(max_depth);
            builtins::load_stdlib(interpreter.env_mut(), sink);
            Self {
                interpreter,
                console,
            }
        }

        fn run(&mut self, source: &str) -> Result<Node, LangError> {
            let program = self.interpreter.read(source)?;
            Ok(self.interpreter.run(program)?)
        }

        fn resume(&mut self) -> Node {
            self.interpreter.resume().expect("Should resume")
        }

        fn output(&self) -> String {
            self.console.borrow_mut().take_output()
        }
    }

    fn check_output(source: &str, expected: Expect) {
        let mut session = Session::new();
        session.run(source).expect("Should run");
        expected.assert_eq(&session.output());
    }

    fn check_result(source: &str, expected: Expect) {
        let mut session = Session::new();
        let result = session.run(source).expect("Should run");
        expected.assert_eq(&result.to_source());
    }

    fn runtime_error(source: &str) -> RuntimeError {
        match Session::new().run(source) {
            Err(LangError::Runtime(err)) => err,
            other => panic!("Expected a runtime error, got {other:?}"),
        }
    }

    #[test]
    fn deep_recursion_does_not_grow_the_host_stack() {
        let mut session = Session::new();
        session
            .run(
                "to countdown :n
                   print :n
                   if :n > 0 [countdown :n - 1]
                 end
                 countdown 8000",
            )
            .expect("Should run");

        let lines = session.console.borrow().lines();
        assert_eq!(lines.len(), 8001);
        assert_eq!(lines.first().map(String::as_str), Some("8000"));
        assert_eq!(lines.last().map(String::as_str), Some("0"));
        assert!(lines.iter().rev().enumerate().all(|(i, line)| *line == i.to_string()));
        assert!(session.interpreter.is_idle());
        assert_eq!(session.interpreter.env().depth(), 1);
    }

    #[test]
    fn make_without_local_is_visible_to_the_caller() {
        check_output(
            r#"make "v 20
               to setv
                 make "v 10
                 print :v
               end
               setv
               print :v"#,
            expect![[r#"
                10
                10
            "#]],
        );
    }

    #[test]
    fn local_shadows_the_callers_binding() {
        check_output(
            r#"make "v 20
               to setv
                 local "v
                 make "v 10
                 print :v
               end
               setv
               print :v"#,
            expect![[r#"
                10
                20
            "#]],
        );
    }

    #[test]
    fn callee_sees_callers_locals() {
        check_output(
            r#"to inner
                 print :secret
               end
               to outer
                 localmake "secret 7
                 inner
               end
               outer"#,
            expect![[r#"
                7
            "#]],
        );
    }

    #[test]
    fn if_runs_its_block_only_when_true() {
        check_output(
            r#"if 3 > 2 [print "Yes]"#,
            expect![[r#"
                Yes
            "#]],
        );

        let mut session = Session::new();
        let result = session.run(r#"if 3 < 2 [print "Yes]"#).expect("Should run");
        assert!(matches!(result, Node::Nil));
        assert_eq!(session.output(), "");
    }

    #[test]
    fn ifelse_returns_the_taken_branch() {
        check_result(r#"ifelse 1 > 2 ["yes] ["no]"#, expect![[r#""no"#]]);
        check_result(r#"ifelse 1 < 2 ["yes] ["no]"#, expect![[r#""yes"#]]);
    }

    #[test]
    fn nested_if_inside_if() {
        check_output(
            r#"if true [if 1 < 2 [print "inner] print "outer]"#,
            expect![[r#"
                inner
                outer
            "#]],
        );
    }

    #[test]
    fn condition_must_be_boolean() {
        assert!(matches!(
            runtime_error(r#"if 1 [print "x]"#),
            RuntimeError::NodeType(_)
        ));
    }

    #[test]
    fn pause_splits_output_at_the_pause_points() {
        let mut session = Session::new();
        session
            .run(
                "print 1
                 pause
                 print 2
                 pause
                 print 3",
            )
            .expect("Should run");
        assert!(session.interpreter.paused());
        assert_eq!(session.output(), "1\n");

        session.resume();
        assert!(session.interpreter.paused());
        assert_eq!(session.output(), "2\n");

        session.resume();
        assert!(!session.interpreter.paused());
        assert!(session.interpreter.is_idle());
        assert_eq!(session.output(), "3\n");
    }

    #[test]
    fn pause_inside_a_block() {
        let mut session = Session::new();
        session
            .run(r#"repeat 3 [print "tick pause] print "done"#)
            .expect("Should run");

        let mut pauses = 0;
        while session.interpreter.paused() {
            pauses += 1;
            session.resume();
        }
        assert_eq!(pauses, 3);
        expect![[r#"
            tick
            tick
            tick
            done
        "#]]
        .assert_eq(&session.output());
    }

    #[test]
    fn run_while_paused_only_queues() {
        let mut session = Session::new();
        session.run("pause print 1").expect("Should run");
        session.run("print 2").expect("Should queue");
        assert_eq!(session.output(), "");

        session.resume();
        assert_eq!(session.output(), "1\n2\n");
    }

    #[test]
    fn arithmetic_promotion() {
        check_result("add 2 3", expect!["5"]);
        check_result("2 + 0.5", expect!["2.5"]);
        check_result("7 / 2", expect!["3"]);
        check_result("7 / 2.0", expect!["3.5"]);
        check_result("2 + 3 * 4 - 1", expect!["13"]);
        check_result("(7 - 5) * 3", expect!["6"]);
    }

    #[test]
    fn list_round_trip() {
        let mut session = Session::new();
        let program = session
            .interpreter
            .read("[a  [b c]   \"d 12]")
            .expect("Should read");
        let list = program.as_list().expect("Should be a list").get(0);
        assert_eq!(
            list.map(|node| node.to_source()),
            Some("[a  [b c]   \"d 12]".to_string())
        );

        let rebuilt = Node::list(vec![
            Node::symbol("a"),
            Node::list(vec![Node::symbol("b"), Node::symbol("c")]),
        ]);
        assert_eq!(rebuilt.to_source(), "[a [b c]]");
    }

    #[test]
    fn output_inside_repeat_returns_from_the_procedure() {
        check_output(
            r#"to findfirst
                 repeat 5 [output 42]
                 print "unreachable
               end
               print findfirst"#,
            expect![[r#"
                42
            "#]],
        );
    }

    #[test]
    fn stop_ends_the_procedure() {
        check_output(
            r#"to early :n
                 if :n > 1 [stop]
                 print :n
               end
               early 1
               early 2"#,
            expect![[r#"
                1
            "#]],
        );
    }

    #[test]
    fn implicit_return_is_the_last_line() {
        check_result(
            "to double :n
               :n * 2
             end
             double 21",
            expect!["42"],
        );
    }

    #[test]
    fn empty_procedure_returns_nil() {
        let mut session = Session::new();
        let result = session.run("to nothing\nend\nnothing").expect("Should run");
        assert!(matches!(result, Node::Nil));
    }

    #[test]
    fn definition_yields_no_value() {
        let mut session = Session::new();
        let result = session.run("to nothing\nend").expect("Should run");
        assert!(matches!(result, Node::None));
    }

    #[test]
    fn run_is_isolated_from_the_outer_program() {
        check_output(
            r#"make "x run [add 1 2]
               print :x
               print run [print "inner 5]"#,
            expect![[r#"
                3
                inner
                5
            "#]],
        );
    }

    #[test]
    fn run_a_procedure_by_name() {
        check_output(
            r#"to greet
                 print "hello
               end
               run "greet"#,
            expect![[r#"
                hello
            "#]],
        );
    }

    #[test]
    fn repeat_returns_the_last_iteration() {
        check_output(
            r#"make "i 0
               repeat 3 [make "i :i + 1 print :i]"#,
            expect![[r#"
                1
                2
                3
            "#]],
        );
    }

    #[test]
    fn templates() {
        check_result("map [? * ?] [1 2 3]", expect!["[1 4 9]"]);
        check_result("filter [equal? (mod ? 2) 1] [1 2 3 4]", expect!["[1 3]"]);
        check_result("find [equal? ? 2] [1 2 3 4]", expect!["2"]);
        check_result(r#"map [uppercase ?] "abcd"#, expect!["ABCD"]);
        check_result(r#"filter [notequal? ? "b] "abcd"#, expect![[r#""acd"#]]);
        check_result(r#"find [equal? ? "b] "abcd"#, expect![[r#""b"#]]);
    }

    #[test]
    fn find_without_a_match_is_nil() {
        let mut session = Session::new();
        let result = session.run("find [equal? ? 9] [1 2 3]").expect("Should run");
        assert!(matches!(result, Node::Nil));
    }

    #[test]
    fn turtle_moves() {
        check_result("fd 100 rt 90 fd 100 turtlepos", expect!["[100 100]"]);
        check_result("repeat 4 [fd 50 rt 90] turtlepos", expect!["[0 0]"]);
    }

    #[test]
    fn print_show_and_type() {
        check_output(
            r#"print [a [b c]]
               show [a [b c]]
               type "x
               (print 1 "two [3])"#,
            expect![[r#"
                a [b c]
                [a [b c]]
                x1 two 3
            "#]],
        );
    }

    #[test]
    fn readlist_and_readword() {
        let console = Rc::new(RefCell::new(BufferedConsole::with_input([
            "hello world",
            "single",
        ])));
        let sink: Rc<RefCell<dyn Console>> = console.clone();
        let mut interpreter = Interpreter::new();
        builtins::load_stdlib(interpreter.env_mut(), sink);

        let program = interpreter.read("readlist").expect("Should read");
        let list = interpreter.run(program).expect("Should run");
        assert_eq!(list.to_string(), "[hello world]");

        let program = interpreter.read("readword").expect("Should read");
        let word = interpreter.run(program).expect("Should run");
        assert_eq!(word.to_source(), "\"single");
    }

    #[test]
    fn setitem_is_visible_through_variables() {
        check_output(
            r#"make "xs [1 2 3]
               setitem 2 :xs "b
               print :xs"#,
            expect![[r#"
                1 b 3
            "#]],
        );
    }

    #[test]
    fn gensym_counts_up() {
        check_output(
            "print gensym print gensym",
            expect![[r#"
                g1
                g2
            "#]],
        );
    }

    #[test]
    fn alias_defines_a_second_name() {
        check_output(
            r#"alias "print "say
               say "hi"#,
            expect![[r#"
                hi
            "#]],
        );
    }

    #[test]
    fn runaway_recursion_is_an_error() {
        let mut session = Session::with_max_depth(50);
        let err = session
            .run("to forever\n  forever\nend\nforever")
            .expect_err("Should hit the depth limit");

        assert!(matches!(
            err,
            LangError::Runtime(RuntimeError::Recursion { depth: 50, .. })
        ));
        assert!(session.interpreter.backtrace().iter().all(|name| name == "forever"));
    }

    #[test]
    fn errors_leave_state_inspectable_until_reset() {
        let mut session = Session::new();
        let err = session
            .run("make \"kept 1\nto boom\n  print :missing\nend\nboom")
            .expect_err("Should fail");
        assert!(matches!(
            err,
            LangError::Runtime(RuntimeError::VariableNotFound(ref name)) if name == "missing"
        ));
        assert_eq!(session.interpreter.backtrace(), vec!["thing", "print", "boom"]);

        session.interpreter.reset();
        assert!(session.interpreter.is_idle());
        assert_eq!(session.interpreter.env().depth(), 1);
        assert!(matches!(session.run("2"), Ok(Node::Integer(2))));
        assert_eq!(
            session.run("print :kept").map(|_| session.output()).ok(),
            Some("1\n".to_string())
        );
    }

    #[test]
    fn unknown_procedure() {
        assert!(matches!(
            runtime_error("frobnicate"),
            RuntimeError::FunctionNotFound(name) if name == "frobnicate"
        ));
    }

    #[test]
    fn too_few_inputs_in_a_variadic_call() {
        assert!(matches!(
            runtime_error("(add 1)"),
            RuntimeError::NotEnoughInputs {
                expected: 2,
                received: 1,
                ..
            }
        ));
    }

    #[test]
    fn type_errors_from_primitives() {
        assert!(matches!(
            runtime_error(r#"add "a 1"#),
            RuntimeError::NodeType(_)
        ));
        assert!(matches!(
            runtime_error("item 5 [a b]"),
            RuntimeError::Index { index: 5, length: 2 }
        ));
    }

    #[test]
    fn output_inside_run_returns_from_the_procedure() {
        check_output(
            r#"to f
                 run [output 5]
                 print "after
                 output 7
               end
               print f"#,
            expect![[r#"
                5
            "#]],
        );
    }

    #[test]
    fn stop_inside_run_ends_the_procedure() {
        let mut session = Session::new();
        session
            .run(
                r#"to g
                     run [if true [stop]]
                     print "after
                   end
                   g
                   print "done"#,
            )
            .expect("Should run");

        assert_eq!(session.output(), "done\n");
        assert!(session.interpreter.is_idle());
        assert_eq!(session.interpreter.env().depth(), 1);
    }

    #[test]
    fn ifelse_runs_only_the_taken_branch() {
        check_output(
            r#"ifelse false [print "a] [print "b]"#,
            expect![[r#"
                b
            "#]],
        );
    }

    #[test]
    fn failed_read_keeps_the_previous_definition() {
        let mut session = Session::new();
        session.run("to foo :a\n  print :a\nend").expect("Should define");

        let err = session.run("to foo\n  print 1").expect_err("Should fail to read");
        assert!(matches!(err, LangError::Parse(_)));

        session.run("foo 42").expect("Should run");
        assert_eq!(session.output(), "42\n");
    }

    #[test]
    fn pause_deep_inside_a_procedure_keeps_its_scopes() {
        let mut session = Session::new();
        session
            .run(
                "to walk :n
                   if :n = 0 [pause stop]
                   walk :n - 1
                   print :n
                 end
                 walk 3",
            )
            .expect("Should run");

        assert!(session.interpreter.paused());
        assert_eq!(session.output(), "");
        assert_eq!(session.interpreter.env().depth(), 5);
        assert!(matches!(session.interpreter.env().thing("n"), Ok(Node::Integer(0))));

        session.resume();
        assert!(!session.interpreter.paused());
        assert!(session.interpreter.is_idle());
        assert_eq!(session.interpreter.env().depth(), 1);
        expect![[r#"
            1
            2
            3
        "#]]
        .assert_eq(&session.output());
    }

    #[test]
    fn read_error_while_paused_keeps_the_paused_program() {
        let mut session = Session::new();
        session.run("print 1 pause print 2").expect("Should run");
        assert!(session.interpreter.paused());

        let err = session.run("print [unclosed").expect_err("Should fail to read");
        assert!(matches!(err, LangError::Parse(_)));
        assert!(session.interpreter.paused());

        session.resume();
        assert_eq!(session.output(), "1\n2\n");
    }

    #[test]
    fn literal_lists_in_a_body_are_fresh_on_every_call() {
        check_output(
            r#"to f
                 make "x [1 2 3]
                 print :x
                 setitem 1 :x 99
               end
               f
               f"#,
            expect![[r#"
                1 2 3
                1 2 3
            "#]],
        );
    }

    #[test]
    fn built_lists_do_not_share_nested_lists() {
        check_output(
            r#"make "a [[1 2] 3]
               make "b fput 0 :a
               setitem 1 item 2 :b 9
               show :a
               show :b"#,
            expect![[r#"
                [[1 2] 3]
                [0 [9 2] 3]
            "#]],
        );
    }

    #[test]
    fn a_list_cannot_contain_itself() {
        assert!(matches!(
            runtime_error(r#"make "a [1 2] setitem 1 :a :a"#),
            RuntimeError::CircularList
        ));
        assert!(matches!(
            runtime_error(r#"make "a [[1] 2] setitem 1 item 1 :a :a"#),
            RuntimeError::CircularList
        ));
    }

    #[test]
    fn ticking_by_hand() {
        let mut session = Session::new();
        let program = session.interpreter.read("print 1 + 2").expect("Should read");
        session.interpreter.load(program);

        let mut ticks = 0;
        while session.interpreter.tick().expect("Should tick") {
            ticks += 1;
        }
        assert!(ticks > 3);
        assert_eq!(session.output(), "3\n");
    }
}
