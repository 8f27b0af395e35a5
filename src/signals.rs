// src/signals.rs
//
// Process-wide signal dispositions, installed once at start-up.

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use tracing::debug;

use crate::error::ShellError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// `SIG_IGN`. Survives exec, so children must reset it.
    Ignore,
    /// A handler that does nothing. Exec resets it to the default action,
    /// so foreground children still die on Ctrl-C and stop on Ctrl-Z.
    Swallow,
    Default,
}

/// What the interpreter does with terminal-generated signals.
pub const SHELL_DISPOSITIONS: &[(Signal, Disposition)] = &[
    // background writes to the terminal must not stop the interpreter
    (Signal::SIGTTOU, Disposition::Ignore),
    (Signal::SIGINT, Disposition::Swallow),
    (Signal::SIGTSTP, Disposition::Swallow),
];

extern "C" fn swallow(_: libc::c_int) {}

fn action(disposition: Disposition) -> SigAction {
    match disposition {
        Disposition::Ignore => SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty()),
        Disposition::Swallow => SigAction::new(SigHandler::Handler(swallow), SaFlags::SA_RESTART, SigSet::empty()),
        Disposition::Default => SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty()),
    }
}

/// Apply a disposition table to the calling process.
pub fn apply(table: &[(Signal, Disposition)]) -> Result<(), ShellError> {
    for &(signal, disposition) in table {
        // SAFETY: the only handler installed is `swallow`, which touches no state.
        unsafe { sigaction(signal, &action(disposition)) }.map_err(ShellError::Signals)?;
        debug!(?signal, ?disposition, "signal disposition");
    }
    Ok(())
}

/// Install the interpreter's dispositions. Called once from `main`.
pub fn install() -> Result<(), ShellError> {
    apply(SHELL_DISPOSITIONS)
}

/// Ignored by the Rust runtime before `main`, not by us.
const RUNTIME_IGNORED: &[Signal] = &[Signal::SIGPIPE];

/// Undo inherited `SIG_IGN` dispositions in a freshly forked child.
///
/// Runs between `fork` and `exec`, so it only calls `sigaction`.
pub fn reset_for_child() {
    let ignored = SHELL_DISPOSITIONS
        .iter()
        .filter(|(_, disposition)| *disposition == Disposition::Ignore)
        .map(|(signal, _)| signal)
        .chain(RUNTIME_IGNORED);
    for &signal in ignored {
        // SAFETY: restoring the default action is async-signal-safe.
        let _ = unsafe { sigaction(signal, &action(Disposition::Default)) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpreter_survives_terminal_signals() {
        for sig in [Signal::SIGINT, Signal::SIGTSTP, Signal::SIGTTOU] {
            let entry = SHELL_DISPOSITIONS.iter().find(|(s, _)| *s == sig);
            assert!(entry.is_some(), "{sig:?} has no disposition");
            assert_ne!(entry.unwrap().1, Disposition::Default);
        }
    }

    #[test]
    fn only_ttou_is_ignored() {
        let ignored: Vec<_> = SHELL_DISPOSITIONS
            .iter()
            .filter(|(_, d)| *d == Disposition::Ignore)
            .map(|(s, _)| *s)
            .collect();
        assert_eq!(ignored, vec![Signal::SIGTTOU]);
    }
}
