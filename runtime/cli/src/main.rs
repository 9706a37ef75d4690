mod definition;
mod external;
mod output;

use definition::Definition;
use external::RecordingConsole;
use lang::interpreter::builtins::{self, Console, StdConsole};
use lang::interpreter::DEFAULT_MAX_DEPTH;
use lang::runner::{Outcome, ScriptRunner};
use lang::{Interpreter, LangError, Node};
use output::OutputMode;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::cell::RefCell;
use std::env;
use std::fs;
use std::io::Read;
use std::process;
use std::rc::Rc;
use std::str::FromStr;

fn main() {
    let args: Vec<String> = env::args().collect();

    let mut repl = false;
    let mut eval_script: Option<String> = None;
    let mut script_path: Option<String> = None;
    let mut output_mode = OutputMode::Text;
    let mut max_depth: Option<String> = env::var("TORTUGA_MAX_DEPTH").ok();
    let mut verbosity = 0;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                process::exit(0);
            }
            "-r" | "--repl" => {
                repl = true;
            }
            "-v" | "--verbose" => {
                verbosity += 1;
            }
            "-vv" => {
                verbosity += 2;
            }
            "-e" | "--eval" => {
                i += 1;
                if i < args.len() {
                    eval_script = Some(args[i].clone());
                } else {
                    eprintln!("Error: -e requires a script argument");
                    process::exit(1);
                }
            }
            "-o" | "--output" => {
                i += 1;
                match args.get(i).and_then(|name| OutputMode::parse(name)) {
                    Some(mode) => output_mode = mode,
                    None => {
                        eprintln!("Error: -o requires 'text' or 'json'");
                        process::exit(1);
                    }
                }
            }
            "-d" | "--max-depth" => {
                i += 1;
                if i < args.len() {
                    max_depth = Some(args[i].clone());
                } else {
                    eprintln!("Error: -d requires a number");
                    process::exit(1);
                }
            }
            arg if !arg.starts_with('-') => {
                script_path = Some(arg.to_string());
            }
            unknown => {
                eprintln!("Unknown option: {}", unknown);
                process::exit(1);
            }
        }
        i += 1;
    }

    init_logging(verbosity);

    let max_depth = match max_depth.as_deref().map(str::parse::<usize>) {
        None => DEFAULT_MAX_DEPTH,
        Some(Ok(depth)) if depth > 0 => depth,
        Some(_) => {
            eprintln!("Error: max depth must be a positive number");
            process::exit(1);
        }
    };

    if repl {
        exit(run_repl(max_depth));
    }

    let source = match read_source(eval_script, script_path) {
        Ok(source) => source,
        Err(code) => exit(Err(code)),
    };

    let result = match output_mode {
        OutputMode::Text => run_script(&source, max_depth),
        OutputMode::Json => run_script_json(&source, max_depth),
    };
    exit(result);
}

enum ExitCode {
    ArgumentError,
    RuntimeError,
}

fn exit(result: Result<(), ExitCode>) -> ! {
    match result {
        Ok(()) => process::exit(0),
        Err(ExitCode::ArgumentError) => process::exit(1),
        Err(ExitCode::RuntimeError) => process::exit(2),
    }
}

/// Determine source: -e > file > stdin
fn read_source(eval_script: Option<String>, script_path: Option<String>) -> Result<String, ExitCode> {
    if let Some(script) = eval_script {
        return Ok(script);
    }

    if let Some(path) = script_path {
        return fs::read_to_string(&path).map_err(|e| {
            eprintln!("Error reading file '{}': {}", path, e);
            ExitCode::ArgumentError
        });
    }

    if !atty::is(atty::Stream::Stdin) {
        let mut source = String::new();
        if let Err(e) = std::io::stdin().read_to_string(&mut source) {
            eprintln!("Error reading from stdin: {}", e);
            return Err(ExitCode::ArgumentError);
        }
        if !source.trim().is_empty() {
            return Ok(source);
        }
    }

    print_help();
    Err(ExitCode::ArgumentError)
}

fn print_help() {
    println!("Tortuga - a Logo interpreter");
    println!();
    println!("USAGE:");
    println!("    tortuga <SCRIPT>          Run a script file");
    println!("    tortuga -e <CODE>         Evaluate inline script");
    println!("    tortuga -r                Start REPL");
    println!("    tortuga -h                Show this help");
    println!("    cat file | tortuga        Read script from stdin");
    println!();
    println!("OPTIONS:");
    println!("    -e, --eval <CODE>         Evaluate inline script");
    println!("    -o, --output <MODE>       Output mode: text (default) or json");
    println!("    -d, --max-depth <N>       Maximum number of active calls (default {DEFAULT_MAX_DEPTH})");
    println!("    -v, --verbose             Log engine activity to stderr (-vv for trace)");
    println!();
    println!("ENVIRONMENT:");
    println!("    TORTUGA_MAX_DEPTH         Default for --max-depth");
    println!("    TORTUGA_LOG               Log level: off, error, warn, info, debug, trace");
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => env::var("TORTUGA_LOG")
            .ok()
            .and_then(|name| LevelFilter::from_str(&name).ok())
            .unwrap_or(LevelFilter::Warn),
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    if let Err(e) = TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto) {
        eprintln!("Failed to initialize logging: {}", e);
    }
}

fn create_interpreter(max_depth: usize, console: Rc<RefCell<dyn Console>>) -> Interpreter {
    let mut interpreter = Interpreter::with_max_depth(max_depth);
    builtins::load_stdlib(interpreter.env_mut(), console);
    interpreter
}

fn run_script(source: &str, max_depth: usize) -> Result<(), ExitCode> {
    let mut interpreter = create_interpreter(max_depth, Rc::new(RefCell::new(StdConsole)));
    let runner = ScriptRunner::new(source);

    match runner.run_to_completion(&mut interpreter) {
        Ok((value, duration)) => {
            log::info!("completed in {duration}ms with {}", value.to_source());
            Ok(())
        }
        Err(e) => {
            report_backtrace(&e, &interpreter);
            eprintln!("{}", e.format_with_source(source));
            Err(ExitCode::RuntimeError)
        }
    }
}

fn run_script_json(source: &str, max_depth: usize) -> Result<(), ExitCode> {
    let console = Rc::new(RefCell::new(RecordingConsole::new()));
    let mut interpreter = create_interpreter(max_depth, console.clone());
    let runner = ScriptRunner::new(source);

    match runner.run_to_completion(&mut interpreter) {
        Ok((value, duration)) => {
            let entries = console.borrow_mut().take_entries();
            let output = output::format_script_json(&value, duration as u64, entries);
            println!("{}", output::to_json(&output));
            Ok(())
        }
        Err(e) => {
            report_backtrace(&e, &interpreter);
            let entries = console.borrow_mut().take_entries();
            let output = output::format_error_json(&e, interpreter.backtrace(), entries);
            println!("{}", output::to_json(&output));
            Err(ExitCode::RuntimeError)
        }
    }
}

fn report_backtrace(error: &LangError, interpreter: &Interpreter) {
    if let LangError::Runtime(err) = error {
        log::warn!(
            "{err} (depth {}): {}",
            interpreter.depth(),
            interpreter.backtrace().join(" <- ")
        );
    }
}

fn run_repl(max_depth: usize) -> Result<(), ExitCode> {
    println!("Tortuga Logo REPL. Type bye to leave.");

    let mut interpreter = create_interpreter(max_depth, Rc::new(RefCell::new(StdConsole)));
    let mut editor = DefaultEditor::new().map_err(|e| {
        eprintln!("Failed to initialize REPL: {}", e);
        ExitCode::RuntimeError
    })?;

    let mut definition = Definition::default();

    loop {
        let prompt = if definition.is_open() {
            ": "
        } else if interpreter.paused() {
            "paused> "
        } else {
            "? "
        };

        match editor.readline(prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                editor.add_history_entry(line).ok();

                let Some(source) = definition.push(line) else {
                    continue;
                };
                let input = source.as_str();

                let command: Vec<&str> = input.split_whitespace().collect();
                match command.as_slice() {
                    [word] if word.eq_ignore_ascii_case("bye") => {
                        println!("Goodbye!");
                        break;
                    }
                    [word] if word.eq_ignore_ascii_case("resume") => {
                        let result = interpreter.resume().map_err(LangError::from);
                        report(&mut interpreter, input, result);
                    }
                    [word] if word.eq_ignore_ascii_case("reset") => {
                        interpreter.reset();
                    }
                    [word] if word.eq_ignore_ascii_case("pots") => {
                        print_procedures(&interpreter);
                    }
                    [word, name] if word.eq_ignore_ascii_case("po") => {
                        print_procedure(&interpreter, name);
                    }
                    _ => {
                        let result = ScriptRunner::new(input).run(&mut interpreter).map(
                            |outcome| match outcome {
                                Outcome::Completed(value) => value,
                                Outcome::Paused => Node::None,
                            },
                        );
                        report(&mut interpreter, input, result);
                    }
                }
            }
            Err(ReadlineError::Interrupted) if definition.is_open() => {
                definition.clear();
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                return Err(ExitCode::RuntimeError);
            }
        }
    }

    Ok(())
}

fn report(interpreter: &mut Interpreter, input: &str, result: Result<Node, LangError>) {
    match result {
        Ok(_) if interpreter.paused() => {
            println!("Paused at depth {}. Type resume to continue.", interpreter.depth());
        }
        Ok(Node::Nil | Node::None) => {}
        Ok(value) => println!("; {}", value),
        Err(e) => {
            report_backtrace(&e, interpreter);
            eprintln!("{}", e.format_with_source(input));
            if discards_paused_work(&e) {
                interpreter.reset();
            }
        }
    }
}

/// Lex and parse errors happen before anything runs, so paused work survives them.
fn discards_paused_work(error: &LangError) -> bool {
    matches!(error, LangError::Runtime(_))
}

fn print_procedures(interpreter: &Interpreter) {
    for (name, procedure) in interpreter.env().procedures() {
        if procedure.is_user_defined() && procedure.name.eq_ignore_ascii_case(name) {
            println!("to {}", procedure.header());
        }
    }
}

fn print_procedure(interpreter: &Interpreter, name: &str) {
    match interpreter.env().procedure(name) {
        Ok(procedure) if procedure.is_user_defined() => match &procedure.source {
            Some(source) => println!("{}", source),
            None => println!("to {}\nend", procedure.header()),
        },
        Ok(procedure) => println!("{} is a primitive", procedure.name),
        Err(e) => eprintln!("{}", e),
    }
}
