// src/executor/builtin/mod.rs
mod core;
mod jobs;

use std::io::Write;

use super::Flow;
use crate::error::ShellError;
use crate::shell::Shell;

/// Commands run inside the interpreter instead of being spawned.
pub const BUILTINS: &[&str] = &["cd", "exit", "history", "jobs", "fg", "bg"];

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Run a built-in, writing its regular output to `out`.
///
/// Only job-control failures that break the interpreter's invariants come
/// back as `Err`; usage errors are printed and reported as a status code.
pub fn run_builtin(shell: &mut Shell, args: &[String], out: &mut dyn Write) -> Result<Flow, ShellError> {
    let code = match args[0].as_str() {
        // ── Core ──────────────────────────────────────────────
        "cd"      => core::builtin_cd(shell, args),
        "history" => core::builtin_history(shell, args, out),
        "exit"    => return Ok(Flow::Exit(0)),

        // ── Job control ───────────────────────────────────────
        "jobs"    => jobs::builtin_jobs(shell, args, out),
        "fg"      => jobs::builtin_fg(shell, args)?,
        "bg"      => jobs::builtin_bg(shell, args)?,

        _         => return Ok(Flow::Continue(127)),
    };
    Ok(Flow::Continue(code))
}
