//! The `flowa` command-line interface.
//!
//! `flowa run <file>` parses, compiles, and executes a script; `flowa repl`
//! evaluates lines from stdin against a persistent session. Exit code 0 on
//! success, 1 on any diagnostic, which goes to stderr.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use flowa::{ReplSession, Runner, StdPrint};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flowa", version, about = "The Flowa scripting language")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a .flowa script.
    Run {
        /// Path to the script.
        file: PathBuf,
    },
    /// Start an interactive session reading lines from stdin.
    Repl,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Run { file } => run_file(&file),
        Command::Repl => repl(),
    }
}

fn run_file(file: &PathBuf) -> ExitCode {
    let runner = match Runner::from_file(file) {
        Ok(runner) => runner,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    match runner.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn repl() -> ExitCode {
    let mut session = ReplSession::new();
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    loop {
        print!(">> ");
        let _ = stdout.flush();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => return ExitCode::SUCCESS,
            Ok(_) => {}
            Err(err) => {
                eprintln!("read error: {err}");
                return ExitCode::FAILURE;
            }
        }
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        let mut print = StdPrint::new();
        if let Err(err) = session.eval(line, &mut print) {
            drop(print);
            eprintln!("{err}");
        }
    }
}
