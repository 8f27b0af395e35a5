// src/executor/builtin/core.rs
use std::io::Write;
use std::path::PathBuf;

use tracing::debug;

use crate::shell::Shell;

pub fn builtin_cd(shell: &mut Shell, args: &[String]) -> i32 {
    if args.len() != 2 {
        println!("cd requires a single argument");
        return 1;
    }

    let path = args[1].as_str();
    let target: PathBuf = if path == "~" {
        match dirs::home_dir() {
            Some(h) => h,
            None => { eprintln!("cd: cannot find home directory"); return 1; }
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        match dirs::home_dir() {
            Some(h) => h.join(rest),
            None => { eprintln!("cd: cannot find home directory"); return 1; }
        }
    } else {
        shell.cwd.join(path)
    };

    let target = match target.canonicalize() {
        Ok(p) => p,
        Err(err) => {
            debug!(%err, "cd target");
            println!("Failed to open {{{path}}}");
            return 1;
        }
    };

    match std::env::set_current_dir(&target) {
        Ok(_) => { shell.set_cwd(&target); 0 }
        Err(err) => {
            debug!(%err, "set_current_dir");
            println!("Failed to open {{{path}}}");
            1
        }
    }
}

pub fn builtin_history(shell: &Shell, args: &[String], out: &mut dyn Write) -> i32 {
    if args.len() != 1 {
        eprintln!("history: takes no arguments");
        return 1;
    }
    match shell.history.print(out) {
        Ok(_) => 0,
        Err(e) => { eprintln!("history: {}: {e}", shell.history.path().display()); 1 }
    }
}
