// src/executor/terminal.rs
//
// Terminal ownership and the foreground/background protocol.
//
// Exactly one process group owns the controlling terminal at a time: the
// interpreter's own, or the group of the job running in the foreground.

use std::io::Write;

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::{getpgrp, getpid, setpgid, tcsetpgrp, Pid};
use tracing::{debug, warn};

use crate::error::ShellError;
use crate::jobs::{Job, JobRegistry, ProcessState, Registration, NOT_FOUND_STATUS};
use crate::shell::Shell;

#[derive(Debug)]
pub struct Terminal {
    shell_pgid: Pid,
    owner: Pid,
    interactive: bool,
}

impl Terminal {
    /// Records the current group; nothing is changed until [`Terminal::seize`].
    pub fn new(interactive: bool) -> Self {
        let pgid = getpgrp();
        Terminal { shell_pgid: pgid, owner: pgid, interactive }
    }

    /// Without a terminal (batch mode) ownership is tracked but never handed over.
    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn shell_pgid(&self) -> Pid {
        self.shell_pgid
    }

    /// Process group currently granted the terminal.
    pub fn owner(&self) -> Pid {
        self.owner
    }

    /// Put the interpreter in its own process group and take the terminal.
    pub fn seize(&mut self) -> Result<(), ShellError> {
        match setpgid(Pid::from_raw(0), Pid::from_raw(0)) {
            // a session leader cannot move; it already leads its own group
            Ok(()) | Err(Errno::EPERM) => {}
            Err(err) => return Err(ShellError::Terminal(err)),
        }
        self.shell_pgid = getpgrp();
        if self.interactive {
            tcsetpgrp(std::io::stdin(), self.shell_pgid).map_err(ShellError::Terminal)?;
        }
        self.owner = self.shell_pgid;
        debug!(pgid = %self.shell_pgid, pid = %getpid(), "interpreter owns the terminal");
        Ok(())
    }

    /// Hand the terminal to a job's process group.
    ///
    /// Not fatal: the group may already be gone by the time we get here.
    pub fn grant(&mut self, pgid: Pid) {
        if self.interactive {
            crossterm::terminal::disable_raw_mode().ok();
            if let Err(err) = tcsetpgrp(std::io::stdin(), pgid) {
                warn!(%pgid, %err, "tcsetpgrp failed");
                return;
            }
        }
        debug!(%pgid, "terminal granted");
        self.owner = pgid;
    }

    /// Take the terminal back for the interpreter. No-op if it already has it.
    pub fn reclaim(&mut self) -> Result<(), ShellError> {
        if self.owner == self.shell_pgid {
            return Ok(());
        }
        if self.interactive {
            tcsetpgrp(std::io::stdin(), self.shell_pgid).map_err(ShellError::Terminal)?;
        }
        debug!(pgid = %self.shell_pgid, "terminal reclaimed");
        self.owner = self.shell_pgid;
        Ok(())
    }
}

/// A job handed to the controller: either not yet registered, or the
/// occupant of a registry slot.
#[derive(Debug)]
pub enum Target {
    Fresh(Job),
    Slot(usize),
}

impl Target {
    fn job<'a>(&'a mut self, registry: &'a mut JobRegistry) -> Option<&'a mut Job> {
        match self {
            Target::Fresh(job) => Some(job),
            Target::Slot(slot) => registry.get_mut(*slot),
        }
    }
}

/// Send `signal` to the job's process group. A group that no longer exists is fine.
///
/// Nothing is sent once every process has been reaped: the pgid may belong to
/// someone else by then.
pub fn signal_group(job: &mut Job, signal: Signal) {
    let Some(pgid) = job.pgid() else { return };
    if job.all_finished() {
        debug!(%pgid, ?signal, "job already finished, not signalled");
        return;
    }
    match killpg(pgid, signal) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(err) => warn!(%pgid, ?signal, %err, "killpg failed"),
    }
    if signal == Signal::SIGCONT {
        job.processes_mut().for_each(|process| process.mark_continued());
    }
}

/// Run a job in the foreground until every process has exited or stopped.
///
/// Returns the status of the last process observed. A stopped job is moved
/// into the registry and stays there when this returns.
pub fn foreground(shell: &mut Shell, target: Target) -> Result<i32, ShellError> {
    let mut held = target;
    let Some(job) = held.job(&mut shell.registry) else { return Ok(shell.last_exit_code) };
    let serial = job.serial();
    let pgid = job.pgid();
    let stages = job.spawned_stages();

    job.removable = true;
    shell.foreground = Some(serial);
    signal_group(job, Signal::SIGCONT);
    if let Some(pgid) = pgid {
        shell.terminal.grant(pgid);
    }

    let mut status = shell.last_exit_code;
    let mut suspended = None;
    let mut next = 0;
    while next < stages.len() {
        let Some(job) = held.job(&mut shell.registry) else { break };
        let stage = job.stage_mut(stages[next]);
        let Some(process) = stage.process.as_mut() else {
            next += 1;
            continue;
        };
        let state = match process.wait() {
            Ok(state) => state,
            Err(err) => {
                let _ = shell.terminal.reclaim();
                return Err(err);
            }
        };
        let name = stage.name().to_string();

        match state {
            ProcessState::Stopped(_) => {
                let Some(registration) = demote(shell, &mut held)? else {
                    let _ = writeln!(shell.notices, "nish: job table full, cannot suspend {name}");
                    if let Some(job) = held.job(&mut shell.registry) {
                        signal_group(job, Signal::SIGCONT);
                    }
                    if let Some(pgid) = pgid {
                        shell.terminal.grant(pgid);
                    }
                    shell.foreground = Some(serial);
                    // wait on the same process again
                    continue;
                };
                suspended = Some(registration.job_id);
            }
            ProcessState::Exited(NOT_FOUND_STATUS) => {
                let _ = writeln!(shell.notices, "Command {name} not found!");
            }
            _ => {}
        }
        status = state.code().unwrap_or(status);
        next += 1;
    }

    shell.terminal.reclaim()?;
    if let Some(job) = held.job(&mut shell.registry) {
        job.removable = false;
        if let (Some(job_id), true) = (suspended, shell.terminal.is_interactive()) {
            let _ = writeln!(shell.notices, "\n[{job_id}] Stopped  {job}");
        }
    }
    if shell.foreground == Some(serial) {
        shell.foreground = None;
    }
    Ok(status)
}

/// Move a stopped foreground job into the registry and re-assert the stop
/// across its whole group. Returns `None` if the table had no room.
fn demote(shell: &mut Shell, held: &mut Target) -> Result<Option<Registration>, ShellError> {
    let Some(registration) = park(shell, held)? else { return Ok(None) };
    if let Some(job) = shell.registry.get_mut(registration.slot) {
        // the remaining waits of this foreground run still own the job
        job.removable = true;
        signal_group(job, Signal::SIGTSTP);
    }
    debug!(slot = registration.slot, job_id = registration.job_id, "demoted stopped job");
    Ok(Some(registration))
}

/// Run a job in the background: the interpreter keeps the terminal and the
/// job is recorded in the registry. On a full table the job's processes are
/// left to the registry's reap list.
pub fn background(shell: &mut Shell, target: Target) -> Result<Registration, ShellError> {
    let mut held = target;
    if let Some(registration) = park(shell, &mut held)? {
        return Ok(registration);
    }
    if let Target::Fresh(job) = held {
        shell.registry.adopt_orphans(job);
    }
    Err(ShellError::TableFull { capacity: shell.registry.capacity() })
}

/// Shared by [`background`] and demotion. On a full table the job is handed
/// back through `held` and `None` is returned.
fn park(shell: &mut Shell, held: &mut Target) -> Result<Option<Registration>, ShellError> {
    shell.terminal.reclaim()?;

    let registration = match std::mem::replace(held, Target::Slot(usize::MAX)) {
        Target::Slot(slot) => {
            *held = Target::Slot(slot);
            shell.registry.reinsert(slot)
        }
        Target::Fresh(job) => match shell.registry.try_register(job) {
            Ok(registration) => {
                *held = Target::Slot(registration.slot);
                registration
            }
            Err(job) => {
                *held = Target::Fresh(job);
                return Ok(None);
            }
        },
    };

    if let Some(job) = shell.registry.get_mut(registration.slot) {
        if shell.foreground == Some(job.serial()) {
            shell.foreground = None;
        }
        job.removable = false;
    }
    Ok(Some(registration))
}
