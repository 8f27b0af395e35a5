// src/jobs/mod.rs
//
// Jobs, their pipeline stages and the processes those stages spawned.

pub mod registry;

pub use registry::{JobRegistry, Registration, DEFAULT_CAPACITY};

use std::fmt;

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use tracing::{debug, trace};

use crate::error::ShellError;

/// Exit status a child reports when its program could not be found.
pub const NOT_FOUND_STATUS: i32 = 127;

pub type JobId = usize;

/// Last observed status of a spawned process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Stopped(Signal),
    Exited(i32),
    Signaled(Signal),
    /// Already reaped by someone else (`ECHILD`).
    Reaped,
}

impl ProcessState {
    pub fn is_finished(self) -> bool {
        matches!(self, ProcessState::Exited(_) | ProcessState::Signaled(_) | ProcessState::Reaped)
    }

    /// Shell-style status code: exit code, or 128 + signal number.
    pub fn code(self) -> Option<i32> {
        match self {
            ProcessState::Exited(code) => Some(code),
            ProcessState::Signaled(sig) | ProcessState::Stopped(sig) => Some(128 + sig as i32),
            ProcessState::Running | ProcessState::Reaped => None,
        }
    }
}

#[derive(Debug)]
pub struct Process {
    pid: Pid,
    state: ProcessState,
}

impl Process {
    pub fn new(pid: Pid) -> Self {
        Process { pid, state: ProcessState::Running }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Non-blocking check. Returns true while the process has not terminated.
    pub fn poll(&mut self) -> bool {
        if self.state.is_finished() {
            return false;
        }
        match waitpid(self.pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => true,
            Ok(WaitStatus::Exited(_, code)) => {
                trace!(pid = %self.pid, code, "reaped");
                self.state = ProcessState::Exited(code);
                false
            }
            Ok(WaitStatus::Signaled(_, sig, _)) => {
                trace!(pid = %self.pid, ?sig, "reaped");
                self.state = ProcessState::Signaled(sig);
                false
            }
            Ok(_) => true,
            Err(Errno::ECHILD) => {
                self.state = ProcessState::Reaped;
                false
            }
            Err(err) => {
                debug!(pid = %self.pid, %err, "poll failed; treating as finished");
                self.state = ProcessState::Reaped;
                false
            }
        }
    }

    /// Block until the process exits, is killed, or stops.
    pub fn wait(&mut self) -> Result<ProcessState, ShellError> {
        if self.state.is_finished() {
            return Ok(self.state);
        }
        loop {
            let status = match waitpid(self.pid, Some(WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED)) {
                Ok(status) => status,
                Err(Errno::EINTR) => continue,
                Err(source) => return Err(ShellError::Wait { pid: self.pid, source }),
            };
            self.state = match status {
                WaitStatus::Exited(_, code) => ProcessState::Exited(code),
                WaitStatus::Signaled(_, sig, _) => ProcessState::Signaled(sig),
                WaitStatus::Stopped(_, sig) => ProcessState::Stopped(sig),
                _ => continue,
            };
            debug!(pid = %self.pid, state = ?self.state, "wait");
            return Ok(self.state);
        }
    }

    /// Record that the process was sent a continue signal.
    pub(crate) fn mark_continued(&mut self) {
        if let ProcessState::Stopped(_) = self.state {
            self.state = ProcessState::Running;
        }
    }
}

/// One `|`-delimited command of a job. Built-in stages have no process.
#[derive(Debug)]
pub struct Stage {
    pub argv: Vec<String>,
    pub process: Option<Process>,
}

impl Stage {
    pub fn name(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("")
    }
}

/// One submitted pipeline.
#[derive(Debug)]
pub struct Job {
    serial: u64,
    id: Option<JobId>,
    stages: Vec<Stage>,
    pgid: Option<Pid>,
    pub background: bool,
    pub removable: bool,
}

impl Job {
    pub fn new(serial: u64, background: bool) -> Self {
        Job {
            serial,
            id: None,
            stages: Vec::new(),
            pgid: None,
            background,
            removable: false,
        }
    }

    /// Identity of this job, distinct from its (reusable) job id.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Job id, once the job has been registered.
    pub fn id(&self) -> Option<JobId> {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: JobId) {
        self.id = Some(id);
    }

    /// Process group shared by every spawned stage.
    pub fn pgid(&self) -> Option<Pid> {
        self.pgid
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn push_builtin(&mut self, argv: Vec<String>) {
        self.stages.push(Stage { argv, process: None });
    }

    /// Record a spawned stage. The first spawned process defines the group.
    pub fn push_process(&mut self, argv: Vec<String>, pid: Pid) {
        if self.pgid.is_none() {
            self.pgid = Some(pid);
        }
        self.stages.push(Stage { argv, process: Some(Process::new(pid)) });
    }

    pub fn processes(&self) -> impl Iterator<Item = &Process> {
        self.stages.iter().filter_map(|stage| stage.process.as_ref())
    }

    pub fn processes_mut(&mut self) -> impl Iterator<Item = &mut Process> {
        self.stages.iter_mut().filter_map(|stage| stage.process.as_mut())
    }

    pub fn into_processes(self) -> impl Iterator<Item = Process> {
        self.stages.into_iter().filter_map(|stage| stage.process)
    }

    /// Indices of the stages that spawned a process, in pipeline order.
    pub fn spawned_stages(&self) -> Vec<usize> {
        self.stages
            .iter()
            .enumerate()
            .filter(|(_, stage)| stage.process.is_some())
            .map(|(i, _)| i)
            .collect()
    }

    pub(crate) fn stage_mut(&mut self, index: usize) -> &mut Stage {
        &mut self.stages[index]
    }

    /// Polls every process; true if at least one has not terminated.
    pub fn any_running(&mut self) -> bool {
        // no short-circuit: every finished process gets reaped here
        self.processes_mut().fold(false, |running, process| process.poll() || running)
    }

    /// Polls every process; true once all of them have terminated.
    pub fn all_finished(&mut self) -> bool {
        !self.any_running()
    }

    /// Status code of the last spawned stage, if it has reported one.
    pub fn last_status(&self) -> Option<i32> {
        self.processes().last().and_then(|process| process.state().code())
    }
}

impl fmt::Display for Job {
    /// `<id>: <argv...> | <argv...> &`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.id.unwrap_or(0))?;
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                write!(f, " |")?;
            }
            for arg in &stage.argv {
                write!(f, " {arg}")?;
            }
        }
        if self.background {
            write!(f, " &")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn formats_background_pipeline() {
        let mut job = Job::new(1, true);
        job.set_id(3);
        job.push_builtin(argv(&["jobs"]));
        job.push_builtin(argv(&["wc", "-l"]));
        assert_eq!(job.to_string(), "3: jobs | wc -l &");
    }

    #[test]
    fn formats_foreground_job_without_ampersand() {
        let mut job = Job::new(1, false);
        job.set_id(1);
        job.push_builtin(argv(&["sleep", "10"]));
        assert_eq!(job.to_string(), "1: sleep 10");
    }

    #[test]
    fn first_spawned_process_defines_the_group() {
        let mut job = Job::new(7, false);
        job.push_builtin(argv(&["history"]));
        job.push_process(argv(&["wc"]), Pid::from_raw(4242));
        job.push_process(argv(&["cat"]), Pid::from_raw(4243));
        assert_eq!(job.pgid(), Some(Pid::from_raw(4242)));
        assert_eq!(job.spawned_stages(), vec![1, 2]);
        assert_eq!(job.processes().count(), 2);
    }

    #[test]
    fn job_without_processes_is_finished() {
        let mut job = Job::new(1, false);
        job.push_builtin(argv(&["cd", "/"]));
        assert!(job.all_finished());
        assert_eq!(job.last_status(), None);
    }

    #[test]
    fn status_codes() {
        assert_eq!(ProcessState::Exited(3).code(), Some(3));
        assert_eq!(ProcessState::Signaled(Signal::SIGKILL).code(), Some(137));
        assert!(ProcessState::Reaped.is_finished());
        assert!(!ProcessState::Stopped(Signal::SIGTSTP).is_finished());
    }
}
