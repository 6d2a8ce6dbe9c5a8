use std::fs;
use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as CliParser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use verdin::ast::Value;
use verdin::bootstrap::bootstrap_env;
use verdin::env::Environment;
use verdin::evaluator::eval;
use verdin::parser::Parser;

/// A small Lisp interpreter: runs a file, a piped script, or an
/// interactive session.
#[derive(CliParser)]
#[command(name = "verdin", version, about)]
struct Cli {
    /// Source file to run; reads stdin or starts a REPL when omitted
    file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let env = bootstrap_env().context("failed to load the embedded library")?;

    match cli.file {
        Some(path) => {
            let source = fs::read_to_string(&path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            run_source(&source, &env)
        }
        None if atty::is(atty::Stream::Stdin) => repl(&env),
        None => {
            let mut source = String::new();
            std::io::stdin()
                .read_to_string(&mut source)
                .context("cannot read stdin")?;
            run_source(&source, &env)
        }
    }
}

/// Evaluate every form of a source in order. The first error aborts the run
/// and becomes the process exit status; values are discarded, batch programs
/// produce output through `display` and `write`.
fn run_source(source: &str, env: &Environment) -> Result<()> {
    for form in Parser::new(source).forms() {
        let expr = form?;
        eval(&expr, env)?;
    }
    Ok(())
}

/// Interactive loop: one environment for the whole session, so definitions
/// persist across inputs. Errors are printed and the loop continues.
fn repl(env: &Environment) -> Result<()> {
    println!("verdin {}", env!("CARGO_PKG_VERSION"));
    println!("Ctrl+D to exit.");

    let mut rl = DefaultEditor::new().context("could not initialize line editor")?;
    loop {
        match rl.readline("> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                for form in Parser::new(line).forms() {
                    match form.and_then(|expr| eval(&expr, env)) {
                        // define and set! return the unspecified value;
                        // printing it would only be noise
                        Ok(Value::Unspecified) => {}
                        Ok(value) => println!("{value}"),
                        Err(e) => {
                            println!("Error: {e}");
                            break;
                        }
                    }
                }
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => break,
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
    Ok(())
}
