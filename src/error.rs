// src/error.rs
use nix::errno::Errno;
use nix::unistd::Pid;
use thiserror::Error;

/// Failures of the job-control core.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("job table full ({capacity} jobs)")]
    TableFull { capacity: usize },

    #[error("failed to create pipe: {0}")]
    Pipe(#[source] Errno),

    #[error("failed to fork: {0}")]
    Fork(#[source] Errno),

    #[error("waitpid failed for {pid}: {source}")]
    Wait { pid: Pid, #[source] source: Errno },

    #[error("cannot hand over the terminal: {0}")]
    Terminal(#[source] Errno),

    #[error("cannot install signal dispositions: {0}")]
    Signals(#[source] Errno),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ShellError {
    /// Fatal errors mean the interpreter can no longer keep its job table
    /// and terminal state consistent, so it must exit.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ShellError::Pipe(_)
                | ShellError::Fork(_)
                | ShellError::Wait { .. }
                | ShellError::Terminal(_)
                | ShellError::Signals(_)
        )
    }
}

/// True if `err` carries a fatal [`ShellError`] anywhere in its chain.
pub fn is_fatal(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<ShellError>())
        .any(ShellError::is_fatal)
}
