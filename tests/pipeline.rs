// tests/pipeline.rs
use std::fs::File;
use std::io::Read;
use std::os::fd::OwnedFd;

use nix::fcntl::OFlag;
use nix::unistd::pipe2;

use nish::config::Config;
use nish::executor::pipeline::{build_with_output, Built};
use nish::executor::terminal::{foreground, Target};
use nish::parser::parse;
use nish::{Flow, Shell};

fn scratch_shell(dir: &tempfile::TempDir) -> Shell {
    let config = Config {
        history_file: dir.path().join(".nishistory"),
        rc_file: None,
        ..Config::default()
    };
    Shell::new(config, false).unwrap()
}

/// Run `line` in the foreground, returning its status and everything the
/// last stage wrote.
fn run_captured(shell: &mut Shell, line: &str) -> (i32, String) {
    // close-on-exec so children forked by other tests never hold the write end
    let (read, write): (OwnedFd, OwnedFd) = pipe2(OFlag::O_CLOEXEC).unwrap();
    let job = match build_with_output(shell, parse(line).unwrap(), Some(write)).unwrap() {
        Built::Job(job) => job,
        Built::Exit(code) => panic!("unexpected exit {code}"),
    };
    let status = if job.pgid().is_some() {
        foreground(shell, Target::Fresh(job)).unwrap()
    } else {
        shell.last_exit_code
    };
    let mut output = String::new();
    File::from(read).read_to_string(&mut output).unwrap();
    (status, output)
}

#[test]
fn stages_are_connected_by_pipes() {
    let dir = tempfile::tempdir().unwrap();
    let mut shell = scratch_shell(&dir);
    let (status, output) = run_captured(&mut shell, "printf abc | wc -c");
    assert_eq!(status, 0);
    assert_eq!(output.trim(), "3");
}

#[test]
fn three_stage_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let mut shell = scratch_shell(&dir);
    let (status, output) = run_captured(&mut shell, "printf 'b\\na\\nb\\n' | sort | uniq -c");
    assert_eq!(status, 0);
    let lines: Vec<Vec<&str>> = output.lines().map(|l| l.split_whitespace().collect()).collect();
    assert_eq!(lines, vec![vec!["1", "a"], vec!["2", "b"]]);
}

#[test]
fn every_stage_joins_the_first_stage_group() {
    let dir = tempfile::tempdir().unwrap();
    let mut shell = scratch_shell(&dir);
    let job = match build_with_output(&mut shell, parse("sleep 0.2 | sleep 0.2").unwrap(), None).unwrap() {
        Built::Job(job) => job,
        Built::Exit(_) => unreachable!(),
    };
    let pgid = job.pgid().unwrap();
    let pids: Vec<_> = job.processes().map(|p| p.pid()).collect();
    assert_eq!(pids.len(), 2);
    assert_eq!(pids[0], pgid);
    for pid in &pids {
        assert_eq!(nix::unistd::getpgid(Some(*pid)).unwrap(), pgid);
    }
    assert_eq!(foreground(&mut shell, Target::Fresh(job)).unwrap(), 0);
}

#[test]
fn builtin_output_feeds_the_next_stage() {
    let dir = tempfile::tempdir().unwrap();
    let mut shell = scratch_shell(&dir);
    shell.history.append("ls").unwrap();
    shell.history.append("jobs").unwrap();

    let (status, output) = run_captured(&mut shell, "history | wc -l");
    assert_eq!(status, 0);
    // two entries plus the total line
    assert_eq!(output.trim(), "3");

    let (_, output) = run_captured(&mut shell, "jobs | wc -l");
    assert_eq!(output.trim(), "0");
}

#[test]
fn builtin_as_last_stage_writes_to_the_given_output() {
    let dir = tempfile::tempdir().unwrap();
    let mut shell = scratch_shell(&dir);
    shell.history.append("true").unwrap();
    let (status, output) = run_captured(&mut shell, "history");
    assert_eq!(status, 0);
    assert_eq!(output, "1: true\nTotal Lines Read: 1\n");
}

#[test]
fn missing_command_reports_not_found_status() {
    let dir = tempfile::tempdir().unwrap();
    let mut shell = scratch_shell(&dir);
    let (status, _) = run_captured(&mut shell, "nish-no-such-command-xyz");
    assert_eq!(status, 127);
    // never registered, nothing to reclaim
    assert!(shell.registry.is_empty());

    // the rest of the pipeline still runs
    let (status, output) = run_captured(&mut shell, "nish-no-such-command-xyz | wc -c");
    assert_eq!(status, 0);
    assert_eq!(output.trim(), "0");
}

#[test]
fn status_of_the_last_process_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut shell = scratch_shell(&dir);
    assert_eq!(run_captured(&mut shell, "sh -c 'exit 3'").0, 3);
    assert_eq!(run_captured(&mut shell, "true | sh -c 'exit 4'").0, 4);
    assert_eq!(run_captured(&mut shell, "sh -c 'kill -9 $$'").0, 128 + 9);
}

#[test]
fn eval_tracks_last_exit_code_and_exit() {
    let dir = tempfile::tempdir().unwrap();
    let mut shell = scratch_shell(&dir);
    assert_eq!(shell.eval("false").unwrap(), Flow::Continue(1));
    assert_eq!(shell.last_exit_code, 1);
    assert_eq!(shell.eval("").unwrap(), Flow::Continue(1));
    assert_eq!(shell.eval("true").unwrap(), Flow::Continue(0));
    assert_eq!(shell.eval("exit").unwrap(), Flow::Exit(0));
    assert!(shell.eval("echo 'unterminated").is_err());
}

#[test]
fn cd_changes_where_children_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut shell = scratch_shell(&dir);
    let target = dir.path().canonicalize().unwrap();
    std::fs::write(target.join("marker"), "").unwrap();
    let original = std::env::current_dir().unwrap();

    assert_eq!(shell.eval(&format!("cd {}", target.display())).unwrap(), Flow::Continue(0));
    assert_eq!(shell.cwd, target);
    let (_, output) = run_captured(&mut shell, "ls");
    std::env::set_current_dir(original).unwrap();
    assert!(output.lines().any(|l| l == "marker"));
}
