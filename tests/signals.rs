// tests/signals.rs
//
// Installs the interpreter's dispositions process-wide, so it lives in its
// own test binary.
use std::fs::File;
use std::io::Read;

use nix::fcntl::OFlag;
use nix::sys::signal::Signal;
use nix::unistd::pipe2;

use nish::config::Config;
use nish::executor::pipeline::{build_with_output, Built};
use nish::executor::terminal::{foreground, Target};
use nish::parser::parse;
use nish::{signals, Flow, Shell};

fn scratch_shell(dir: &tempfile::TempDir) -> Shell {
    signals::install().unwrap();
    let config = Config {
        history_file: dir.path().join(".nishistory"),
        rc_file: None,
        ..Config::default()
    };
    Shell::new(config, false).unwrap()
}

/// `SigIgn` mask from a `/proc/<pid>/status` dump.
fn ignored_mask(status: &str) -> u64 {
    let line = status.lines().find(|l| l.starts_with("SigIgn:")).unwrap();
    u64::from_str_radix(line["SigIgn:".len()..].trim(), 16).unwrap()
}

fn bit(signal: Signal) -> u64 {
    1 << (signal as i32 - 1)
}

#[test]
fn foreground_child_still_dies_on_sigint() {
    let dir = tempfile::tempdir().unwrap();
    let mut shell = scratch_shell(&dir);
    assert_eq!(shell.eval("sh -c 'kill -INT $$'").unwrap(), Flow::Continue(128 + 2));
    assert_eq!(shell.eval("sh -c 'kill -TERM $$'").unwrap(), Flow::Continue(128 + 15));
}

#[test]
fn ignored_signals_are_reset_in_the_child() {
    let dir = tempfile::tempdir().unwrap();
    let mut shell = scratch_shell(&dir);

    let own = ignored_mask(&std::fs::read_to_string("/proc/self/status").unwrap());
    assert_ne!(own & bit(Signal::SIGTTOU), 0, "interpreter should ignore SIGTTOU");

    let (read, write) = pipe2(OFlag::O_CLOEXEC).unwrap();
    let job = match build_with_output(&mut shell, parse("cat /proc/self/status").unwrap(), Some(write)).unwrap() {
        Built::Job(job) => job,
        Built::Exit(_) => unreachable!(),
    };
    assert_eq!(foreground(&mut shell, Target::Fresh(job)).unwrap(), 0);
    let mut status = String::new();
    File::from(read).read_to_string(&mut status).unwrap();

    let child = ignored_mask(&status);
    assert_eq!(child & bit(Signal::SIGTTOU), 0);
    assert_eq!(child & bit(Signal::SIGPIPE), 0);
}
