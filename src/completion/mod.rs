// src/completion/mod.rs
// Tab completion: built-in names, executables on PATH, file paths

use std::path::{Path, PathBuf};

use crate::executor::builtin::BUILTINS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub value: String,
    pub builtin: bool,
}

impl Candidate {
    fn plain(value: String) -> Self {
        Candidate { value, builtin: false }
    }
}

/// Candidates for `partial`. `is_command` is true for the first word of a stage.
pub fn complete(partial: &str, is_command: bool) -> Vec<Candidate> {
    let looks_like_path = partial.contains('/') || partial.starts_with('.') || partial.starts_with('~');
    if !is_command || looks_like_path {
        return complete_path(partial).into_iter().map(Candidate::plain).collect();
    }
    if partial.is_empty() {
        return Vec::new();
    }

    let mut results: Vec<Candidate> = BUILTINS
        .iter()
        .filter(|name| name.starts_with(partial))
        .map(|name| Candidate { value: name.to_string(), builtin: true })
        .collect();
    for command in complete_commands(partial) {
        if !results.iter().any(|c| c.value == command) {
            results.push(Candidate::plain(command));
        }
    }
    results
}

/// Entries of the directory named by `partial`, directories with a trailing `/`.
pub fn complete_path(partial: &str) -> Vec<String> {
    let home = dirs::home_dir().map(|h| h.display().to_string());
    let expanded = match (partial.strip_prefix('~'), &home) {
        (Some(rest), Some(home)) => format!("{home}{rest}"),
        _ => partial.to_string(),
    };

    let (dir, prefix, shown_dir) = match expanded.rfind('/') {
        Some(i) => (
            PathBuf::from(if i == 0 { "/" } else { &expanded[..i] }),
            &expanded[i + 1..],
            &partial[..partial.len() - (expanded.len() - i - 1)],
        ),
        None => (PathBuf::from("."), expanded.as_str(), ""),
    };

    let Ok(entries) = std::fs::read_dir(&dir) else { return Vec::new() };
    let mut matches: Vec<String> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(prefix) || (prefix.is_empty() && name.starts_with('.')) {
                return None;
            }
            let trail = if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) { "/" } else { "" };
            Some(format!("{shown_dir}{name}{trail}"))
        })
        .collect();
    matches.sort();
    matches
}

/// Executable names on `$PATH` starting with `partial`.
pub fn complete_commands(partial: &str) -> Vec<String> {
    use std::os::unix::fs::PermissionsExt;

    let path_var = std::env::var("PATH").unwrap_or_default();
    let mut commands = Vec::new();
    for dir in path_var.split(':').filter(|d| !d.is_empty()) {
        let Ok(entries) = std::fs::read_dir(Path::new(dir)) else { continue };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(partial) {
                continue;
            }
            if let Ok(meta) = entry.metadata() {
                if meta.is_file() && meta.permissions().mode() & 0o111 != 0 {
                    commands.push(name);
                }
            }
        }
    }
    commands.sort();
    commands.dedup();
    commands
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_come_first() {
        let results = complete("f", true);
        assert_eq!(results.first(), Some(&Candidate { value: "fg".into(), builtin: true }));
    }

    #[test]
    fn paths_keep_the_typed_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("logs")).unwrap();
        std::fs::write(dir.path().join("lib.rs"), "").unwrap();
        std::fs::write(dir.path().join("main.rs"), "").unwrap();

        let typed = format!("{}/l", dir.path().display());
        let results = complete_path(&typed);
        assert_eq!(results, vec![format!("{typed}ib.rs"), format!("{typed}ogs/")]);
    }

    #[test]
    fn arguments_complete_as_paths_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fgfile"), "").unwrap();
        let typed = format!("{}/fg", dir.path().display());
        let results = complete(&typed, false);
        assert_eq!(results, vec![Candidate::plain(format!("{typed}file"))]);
    }
}
