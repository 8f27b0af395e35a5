// src/executor/pipeline.rs
//
// Pipeline construction: one child per external stage, stdout of each stage
// wired to stdin of the next, every child in the process group of the first.
// Built-in stages run in-process against the descriptors they were assigned.

use std::ffi::CString;
use std::fs::File;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::unistd::{close, dup2, fork, pipe2, setpgid, ForkResult, Pid};
use tracing::{debug, trace};

use super::builtin;
use super::Flow;
use crate::error::ShellError;
use crate::jobs::{Job, NOT_FOUND_STATUS};
use crate::parser::ast::Pipeline;
use crate::shell::Shell;
use crate::signals;

/// Result of building a pipeline.
#[derive(Debug)]
pub enum Built {
    /// Every external stage has been spawned; ready to be scheduled.
    Job(Job),
    /// An `exit` stage ran; the interpreter should terminate.
    Exit(i32),
}

/// Build a job whose last stage writes to the interpreter's stdout.
pub fn build(shell: &mut Shell, pipeline: Pipeline) -> Result<Built, ShellError> {
    build_with_output(shell, pipeline, None)
}

/// Build a job, sending the last stage's output to `output` when given.
pub fn build_with_output(
    shell: &mut Shell,
    pipeline: Pipeline,
    output: Option<OwnedFd>,
) -> Result<Built, ShellError> {
    let mut job = shell.new_job(pipeline.background);
    let n = pipeline.stages.len();
    let mut last_output = output;
    // None means the interpreter's own stdin
    let mut input: Option<OwnedFd> = None;

    for (i, argv) in pipeline.stages.into_iter().enumerate() {
        let Some(name) = argv.first() else { continue };
        let (next_input, stage_output) = if i + 1 < n {
            let (read, write) = pipe2(OFlag::O_CLOEXEC).map_err(ShellError::Pipe)?;
            (Some(read), Some(write))
        } else {
            (None, last_output.take())
        };

        if builtin::is_builtin(name) {
            let flow = run_builtin_stage(shell, &argv, stage_output.as_ref())?;
            job.push_builtin(argv);
            if let Flow::Exit(code) = flow {
                return Ok(Built::Exit(code));
            }
        } else {
            let pid = spawn(&argv, input.as_ref(), stage_output.as_ref(), job.pgid())?;
            job.push_process(argv, pid);
        }

        // the parent's copies are no longer needed: the previous read end is
        // replaced here and this stage's write end closes at end of scope
        input = next_input;
    }

    Ok(Built::Job(job))
}

fn run_builtin_stage(
    shell: &mut Shell,
    argv: &[String],
    output: Option<&OwnedFd>,
) -> Result<Flow, ShellError> {
    let flow = match output {
        Some(fd) => {
            let mut out = File::from(fd.try_clone()?);
            builtin::run_builtin(shell, argv, &mut out)?
        }
        None => {
            let mut out = io::stdout();
            let flow = builtin::run_builtin(shell, argv, &mut out)?;
            out.flush().ok();
            flow
        }
    };
    if let Flow::Continue(code) = flow {
        shell.last_exit_code = code;
    }
    Ok(flow)
}

/// Fork one stage. `pgid` is the group to join, `None` to start a new one.
pub fn spawn(
    argv: &[String],
    input: Option<&OwnedFd>,
    output: Option<&OwnedFd>,
    pgid: Option<Pid>,
) -> Result<Pid, ShellError> {
    // everything the child needs is allocated before fork
    let c_args = argv
        .iter()
        .map(|arg| CString::new(arg.as_bytes()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ShellError::InvalidArgument(format!("NUL byte in `{}`", argv.join(" "))))?;
    let mut c_argv: Vec<*const libc::c_char> = c_args.iter().map(|arg| arg.as_ptr()).collect();
    c_argv.push(std::ptr::null());

    let group = pgid.unwrap_or(Pid::from_raw(0));
    let stdin_fd = input.map(AsRawFd::as_raw_fd);
    let stdout_fd = output.map(AsRawFd::as_raw_fd);

    // SAFETY: the child only makes async-signal-safe calls before exec/_exit.
    match unsafe { fork() }.map_err(ShellError::Fork)? {
        ForkResult::Child => exec_child(&c_argv, stdin_fd, stdout_fd, group),
        ForkResult::Parent { child } => {
            // repeated in the parent so the group exists before the terminal is granted
            let target = pgid.unwrap_or(child);
            if let Err(err) = setpgid(child, target) {
                // EACCES once the child has already exec'd
                trace!(%child, %err, "setpgid from parent");
            }
            debug!(pid = %child, pgid = %target, ?argv, "spawned");
            Ok(child)
        }
    }
}

fn exec_child(
    argv: &[*const libc::c_char],
    stdin_fd: Option<RawFd>,
    stdout_fd: Option<RawFd>,
    group: Pid,
) -> ! {
    let _ = setpgid(Pid::from_raw(0), group);
    signals::reset_for_child();

    if let Some(fd) = stdin_fd.filter(|&fd| fd != libc::STDIN_FILENO) {
        let _ = dup2(fd, libc::STDIN_FILENO);
        let _ = close(fd);
    }
    if let Some(fd) = stdout_fd.filter(|&fd| fd != libc::STDOUT_FILENO) {
        let _ = dup2(fd, libc::STDOUT_FILENO);
        let _ = close(fd);
    }

    // SAFETY: argv is a NUL-terminated array of pointers into live CStrings.
    unsafe {
        libc::execvp(argv[0], argv.as_ptr());
        let code = if Errno::last() == Errno::ENOENT { NOT_FOUND_STATUS } else { 1 };
        libc::_exit(code)
    }
}
