// src/executor/builtin/jobs.rs
use std::io::Write;

use nix::sys::signal::Signal;

use crate::error::ShellError;
use crate::executor::terminal::{self, Target};
use crate::jobs::JobId;
use crate::shell::Shell;

pub fn builtin_jobs(shell: &mut Shell, args: &[String], out: &mut dyn Write) -> i32 {
    if args.len() != 1 {
        println!("jobs takes in no arguments");
        return 1;
    }
    for job in shell.registry.list() {
        if writeln!(out, "{job}").is_err() {
            return 1;
        }
    }
    0
}

pub fn builtin_fg(shell: &mut Shell, args: &[String]) -> Result<i32, ShellError> {
    let Some(selector) = job_selector("fg", args) else { return Ok(1) };
    let slot = match selector {
        Selector::Latest => shell.registry.find(0, true),
        Selector::Id(id) => shell.registry.find(id, false),
    };
    match slot.filter(|&slot| has_live_process(shell, slot)) {
        Some(slot) => terminal::foreground(shell, Target::Slot(slot)),
        None => {
            println!("Job not found!");
            Ok(1)
        }
    }
}

pub fn builtin_bg(shell: &mut Shell, args: &[String]) -> Result<i32, ShellError> {
    let Some(selector) = job_selector("bg", args) else { return Ok(1) };
    let slot = match selector {
        Selector::Latest => shell.registry.find_foreground(0, true),
        Selector::Id(id) => shell.registry.find_foreground(id, false),
    };
    let Some(slot) = slot.filter(|&slot| has_live_process(shell, slot)) else {
        println!("Job not found!");
        return Ok(1);
    };

    if let Some(job) = shell.registry.get_mut(slot) {
        job.removable = true;
    }
    terminal::background(shell, Target::Slot(slot))?;
    if let Some(job) = shell.registry.get_mut(slot) {
        job.removable = false;
        terminal::signal_group(job, Signal::SIGCONT);
    }
    Ok(0)
}

/// A job whose processes have all been reaped cannot be resumed.
fn has_live_process(shell: &mut Shell, slot: usize) -> bool {
    shell.registry.get_mut(slot).is_some_and(|job| job.any_running())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selector {
    Latest,
    Id(JobId),
}

/// Zero or one argument; the argument must be a job id of at least 1.
fn job_selector(name: &str, args: &[String]) -> Option<Selector> {
    match args {
        [_] => Some(Selector::Latest),
        [_, id] => match id.parse::<JobId>() {
            Ok(id) if id > 0 => Some(Selector::Id(id)),
            _ => {
                println!("Job value not understood!");
                None
            }
        },
        _ => {
            println!("{name} takes in either one or no arguments");
            None
        }
    }
}
