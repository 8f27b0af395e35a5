// src/shell.rs
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::Config;
use crate::executor::terminal::Terminal;
use crate::executor::Flow;
use crate::history::HistoryStore;
use crate::jobs::{Job, JobRegistry};

/// Everything one interpreter session owns: the job table, terminal
/// ownership, the foreground-job marker and the history store.
pub struct Shell {
    pub cwd: PathBuf,
    pub config: Config,
    pub registry: JobRegistry,
    pub terminal: Terminal,
    pub history: HistoryStore,
    /// Serial of the job currently running in the foreground, if any.
    pub foreground: Option<u64>,
    pub last_exit_code: i32,
    /// Job notices: `[id] pgid`, stop reports, "not found" stages.
    pub notices: Box<dyn Write>,
    next_serial: u64,
}

impl Shell {
    pub fn new(config: Config, interactive: bool) -> Result<Self> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        let history_path = cwd.join(&config.history_file);
        let history = HistoryStore::open(&history_path)
            .with_context(|| format!("opening history {}", history_path.display()))?;

        Ok(Shell {
            cwd,
            registry: JobRegistry::with_capacity(config.max_jobs),
            terminal: Terminal::new(interactive),
            history,
            foreground: None,
            last_exit_code: 0,
            notices: Box::new(io::stdout()),
            next_serial: 1,
            config,
        })
    }

    /// A fresh, unregistered job.
    pub fn new_job(&mut self, background: bool) -> Job {
        let serial = self.next_serial;
        self.next_serial += 1;
        Job::new(serial, background)
    }

    pub fn eval(&mut self, line: &str) -> Result<Flow> {
        crate::executor::eval(self, line)
    }

    /// Evaluate the rc file line by line. Returns the exit code if it ran `exit`.
    pub fn load_rc(&mut self) -> Result<Option<i32>> {
        let Some(rc_path) = self.config.rc_file.clone() else { return Ok(None) };
        if !rc_path.exists() {
            return Ok(None);
        }
        debug!(path = %rc_path.display(), "loading rc file");

        let content = std::fs::read_to_string(&rc_path)?;
        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') { continue; }

            match self.eval(trimmed) {
                Ok(Flow::Exit(code)) => return Ok(Some(code)),
                Ok(Flow::Continue(_)) => {}
                Err(e) if crate::error::is_fatal(&e) => return Err(e),
                Err(e) => eprintln!("nish: rc error: {e:#}"),
            }
        }
        Ok(None)
    }

    pub fn set_cwd(&mut self, dir: &Path) {
        self.cwd = dir.to_path_buf();
    }

    pub fn build_prompt(&self) -> String {
        let home = dirs::home_dir()
            .map(|h| h.display().to_string())
            .unwrap_or_default();

        let cwd = self.cwd.display().to_string();
        let cwd = if !home.is_empty() && cwd.starts_with(&home) {
            cwd.replacen(&home, "~", 1)
        } else {
            cwd
        };

        let marker = if self.last_exit_code == 0 {
            "\x1b[32m>\x1b[0m"
        } else {
            "\x1b[31m>\x1b[0m"
        };

        format!("\x1b[36mnish\x1b[0m \x1b[34m{}\x1b[0m{} ", cwd, marker)
    }
}
