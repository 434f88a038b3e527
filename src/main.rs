// ABOUTME: CLI driver - runs a script file or starts the interactive REPL

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::{Config, DefaultEditor};
use std::path::PathBuf;
use std::rc::Rc;

use treep::config::{VERSION, WELCOME_FOOTER, WELCOME_MESSAGE, WELCOME_SUBTITLE};
use treep::env::Environment;
use treep::error::TreepError;
use treep::infer::{prelude, Inferencer};
use treep::macros::MacroRegistry;
use treep::value::Value;
use treep::{builtins, element::Kind, eval, lexer, normalizer, parser, types::TypeEnv};

/// The TreeP language - one uniform tree from parse to run
#[derive(Parser, Debug)]
#[command(name = "treep")]
#[command(version = VERSION)]
#[command(about = "The TreeP language - one uniform tree from parse to run")]
struct CliArgs {
    /// Script file to execute (optional - if not provided, starts REPL)
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,

    /// Print the post-expansion Element tree and exit
    #[arg(long = "expand")]
    expand: bool,

    /// Print the post-expansion Element tree as JSON and exit
    #[arg(long = "emit-json")]
    emit_json: bool,

    /// Print inferred schemes for top-level bindings and exit
    #[arg(long = "types")]
    types: bool,

    /// Skip type checking before execution
    #[arg(long = "no-typecheck")]
    no_typecheck: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let Some(script_path) = args.script else {
        return repl();
    };
    let source = std::fs::read_to_string(&script_path)?;

    if args.expand {
        for el in treep::expand_source(&source)? {
            println!("{}", el);
        }
        return Ok(());
    }

    if args.emit_json {
        let program = treep::expand_source(&source)?;
        println!("{}", serde_json::to_string_pretty(&program)?);
        return Ok(());
    }

    if args.types {
        let (_, env) = treep::infer_source(&source)?;
        let base = prelude();
        let mut lines: Vec<String> = env
            .iter()
            .filter(|(name, _)| base.get(name).is_none())
            .map(|(name, scheme)| format!("{} : {}", name, scheme))
            .collect();
        lines.sort();
        for line in lines {
            println!("{}", line);
        }
        return Ok(());
    }

    let result = if args.no_typecheck {
        treep::run_unchecked(&source)?
    } else {
        treep::run_source(&source)?
    };

    // An integer result from `main` becomes the process exit code
    if let Value::Int(code) = result {
        if code != 0 {
            std::process::exit(code as i32);
        }
    }
    Ok(())
}

/// Interactive loop with a persistent environment, type environment, and
/// macro registry across lines.
fn repl() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::builder().auto_add_history(true).build();
    let mut rl = DefaultEditor::with_config(config)?;

    let history_file = ".treep_history";
    let _ = rl.load_history(history_file);

    println!("{}", WELCOME_MESSAGE);
    println!("{}", WELCOME_SUBTITLE);
    println!("{}", WELCOME_FOOTER);

    let env = Environment::new();
    builtins::register(&env);
    let mut type_env = prelude();
    let mut inferencer = Inferencer::new();
    let mut registry = MacroRegistry::new();

    loop {
        match rl.readline("treep> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                if let Err(e) = eval_line(
                    &line,
                    env.clone(),
                    &mut type_env,
                    &mut inferencer,
                    &mut registry,
                ) {
                    eprintln!("{}", e);
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("readline error: {}", e);
                break;
            }
        }
    }

    let _ = rl.save_history(history_file);
    Ok(())
}

fn eval_line(
    line: &str,
    env: Rc<Environment>,
    type_env: &mut TypeEnv,
    inferencer: &mut Inferencer,
    registry: &mut MacroRegistry,
) -> Result<(), TreepError> {
    let tokens = lexer::lex(line)?;
    let program = parser::parse(tokens)?;
    let program = normalizer::normalize_program(&program)?;

    for statement in program {
        if statement.kind == Kind::Macro {
            registry.register_definition(&statement)?;
            continue;
        }
        let expanded = registry.expand(&statement)?;
        inferencer.infer(type_env, &expanded)?;
        let value = eval::eval(&expanded, env.clone())?;
        if !matches!(value, Value::Unit) {
            println!("{}", value);
        }
    }
    Ok(())
}
