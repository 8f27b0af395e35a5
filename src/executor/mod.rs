// src/executor/mod.rs
pub mod builtin;
pub mod pipeline;
pub mod terminal;

use std::io::Write;

use anyhow::Result;
use tracing::debug;

use crate::error::ShellError;
use crate::parser::ast::Pipeline;
use crate::shell::Shell;
use pipeline::Built;
use terminal::Target;

/// What the read loop should do after a line has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue(i32),
    Exit(i32),
}

pub fn eval(shell: &mut Shell, line: &str) -> Result<Flow> {
    let pipeline = crate::parser::parse(line)?;
    Ok(execute(shell, pipeline)?)
}

/// Build the pipeline, then run it in the foreground or park it in the background.
pub fn execute(shell: &mut Shell, pipeline: Pipeline) -> Result<Flow, ShellError> {
    if pipeline.is_empty() {
        return Ok(Flow::Continue(shell.last_exit_code));
    }

    // refuse before anything is spawned
    if pipeline.background && !shell.registry.has_room() {
        return Err(ShellError::TableFull { capacity: shell.registry.capacity() });
    }

    let job = match pipeline::build(shell, pipeline)? {
        Built::Exit(code) => return Ok(Flow::Exit(code)),
        Built::Job(job) => job,
    };

    if job.background {
        let pgid = job.pgid();
        let registration = terminal::background(shell, Target::Fresh(job))?;
        if let Some(pgid) = pgid {
            let _ = writeln!(shell.notices, "[{}] {}", registration.job_id, pgid);
        }
        shell.last_exit_code = 0;
    } else if job.pgid().is_some() {
        shell.last_exit_code = terminal::foreground(shell, Target::Fresh(job))?;
    } else {
        // built-ins only: their status is already recorded
        debug!(job = %job, "no processes to wait for");
    }
    Ok(Flow::Continue(shell.last_exit_code))
}
