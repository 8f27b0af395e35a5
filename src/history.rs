// src/history.rs
//
// Append-only, line-per-entry history file.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    /// Open the store, creating an empty file if none exists.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(HistoryStore { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist one line immediately.
    pub fn append(&mut self, line: &str) -> io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", line.replace('\n', " "))
    }

    pub fn entries(&self) -> io::Result<Vec<String>> {
        BufReader::new(File::open(&self.path)?).lines().collect()
    }

    /// `<n>: <line>` for every entry, then the total.
    pub fn print(&self, out: &mut dyn Write) -> io::Result<usize> {
        let entries = self.entries()?;
        for (i, line) in entries.iter().enumerate() {
            writeln!(out, "{}: {}", i + 1, line)?;
        }
        writeln!(out, "Total Lines Read: {}", entries.len())?;
        Ok(entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_and_numbers_from_one() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HistoryStore::open(dir.path().join(".nishistory")).unwrap();
        store.append("ls -l").unwrap();
        store.append("sleep 5 &").unwrap();

        let mut out = Vec::new();
        assert_eq!(store.print(&mut out).unwrap(), 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "1: ls -l\n2: sleep 5 &\nTotal Lines Read: 2\n"
        );
    }

    #[test]
    fn reopening_keeps_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h");
        HistoryStore::open(&path).unwrap().append("jobs").unwrap();
        let store = HistoryStore::open(&path).unwrap();
        assert_eq!(store.entries().unwrap(), vec!["jobs".to_string()]);
    }
}
