// src/main.rs
use std::fs::File;
use std::io::{self, BufReader, IsTerminal};

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use nish::config::Config;
use nish::readline::{LineReader, ReadlineError, ShellReadline};
use nish::{signals, Flow, Shell};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("nish: {e:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let config = Config::load();

    let batch = std::env::args_os().nth(1);
    let interactive = batch.is_none() && io::stdin().is_terminal();
    let capacity = config.history_capacity;

    signals::install()?;
    let mut shell = Shell::new(config, interactive)?;

    let mut reader = match batch {
        Some(path) => {
            let file = File::open(&path)
                .with_context(|| format!("batch file {} not found", path.to_string_lossy()))?;
            LineReader::Batch(Box::new(BufReader::new(file)))
        }
        None if !interactive => LineReader::Batch(Box::new(io::stdin().lock())),
        None => {
            let previous = shell.history.entries().unwrap_or_default();
            LineReader::Interactive(Box::new(ShellReadline::new(capacity, &previous)?))
        }
    };
    shell.terminal.seize()?;

    if let Some(code) = shell.load_rc()? {
        return Ok(code);
    }

    loop {
        let prompt = shell.build_prompt();
        let line = match reader.readline(&prompt) {
            Ok(line) => line,

            // ── Ctrl+C ────────────────────────────────────────────
            // Cancel current input, print a new prompt
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                shell.last_exit_code = 130;
                continue;
            }

            // ── Ctrl+D / end of batch input ───────────────────────
            Err(ReadlineError::Eof) => {
                if interactive {
                    println!("exit");
                }
                return Ok(shell.last_exit_code);
            }

            Err(ReadlineError::Other(e)) => anyhow::bail!("readline error: {e}"),
        };
        if line.is_empty() {
            continue;
        }

        if let Err(e) = shell.history.append(&line) {
            tracing::warn!(path = %shell.history.path().display(), "history append failed: {e}");
        }

        match shell.eval(&line) {
            Ok(Flow::Continue(_)) => {}
            Ok(Flow::Exit(code)) => return Ok(code),
            Err(e) if nish::error::is_fatal(&e) => return Err(e),
            Err(e) => {
                if interactive {
                    eprintln!("\x1b[31mnish: {e:#}\x1b[0m");
                } else {
                    eprintln!("nish: {e:#}");
                }
                shell.last_exit_code = 1;
            }
        }
    }
}
