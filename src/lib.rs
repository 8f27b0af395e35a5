// src/lib.rs
pub mod completion;
pub mod config;
pub mod error;
pub mod executor;
pub mod history;
pub mod jobs;
pub mod parser;
pub mod readline;
pub mod shell;
pub mod signals;

pub use error::ShellError;
pub use executor::Flow;
pub use shell::Shell;
