// src/parser/ast.rs

/// One input line: `|`-separated stages, optionally run in the background.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pipeline {
    /// Argument vector per stage, left to right. Never contains an empty vector.
    pub stages: Vec<Vec<String>>,
    /// The line ended with `&`.
    pub background: bool,
}

impl Pipeline {
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
