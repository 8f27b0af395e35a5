// src/readline/mod.rs
// Line sources: the interactive editor, or plain lines from a batch file / pipe

use std::borrow::Cow;
use std::io::{self, BufRead, Write};

use anyhow::Result;
use reedline::{
    ColumnarMenu, Completer, DefaultHinter, FileBackedHistory, History, HistoryItem, KeyCode, KeyModifiers, MenuBuilder,
    Prompt, PromptEditMode, PromptHistorySearch, PromptHistorySearchStatus, Reedline,
    ReedlineEvent, ReedlineMenu, Signal, Span, Suggestion,
};

use crate::completion;

// ── Prompt ───────────────────────────────────────────────────────────────────

pub struct NishPrompt {
    pub text: String,
}

impl Prompt for NishPrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.text)
    }
    fn render_prompt_right(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }
    fn render_prompt_indicator(&self, _mode: PromptEditMode) -> Cow<'_, str> {
        Cow::Borrowed("")
    }
    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        Cow::Borrowed("> ")
    }
    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> Cow<'_, str> {
        let prefix = match history_search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "failing ",
        };
        Cow::Owned(format!("({prefix}search: {}) ", history_search.term))
    }
}

// ── Tab Completer ─────────────────────────────────────────────────────────────

pub struct ShellCompleter;

impl Completer for ShellCompleter {
    fn complete(&mut self, line: &str, pos: usize) -> Vec<Suggestion> {
        let before_cursor = &line[..pos];
        let word_start = before_cursor
            .rfind(|c: char| c == ' ' || c == '|')
            .map(|i| i + 1)
            .unwrap_or(0);
        let partial = &before_cursor[word_start..];
        // first word of the line or of a pipeline stage
        let is_command = before_cursor[..word_start]
            .trim_end()
            .chars()
            .last()
            .map_or(true, |c| c == '|');

        completion::complete(partial, is_command)
            .into_iter()
            .map(|candidate| Suggestion {
                append_whitespace: !candidate.value.ends_with('/'),
                value: candidate.value,
                description: candidate.builtin.then(|| "builtin".to_string()),
                style: None,
                extra: None,
                span: Span::new(word_start, pos),
            })
            .collect()
    }
}

// ── Interactive editor ────────────────────────────────────────────────────────

pub struct ShellReadline {
    editor: Reedline,
}

impl ShellReadline {
    /// `capacity` bounds recall; `previous` are the persisted lines of earlier
    /// sessions, oldest first. Persisting new lines is left to the caller.
    pub fn new(capacity: usize, previous: &[String]) -> Result<Self> {
        let history = Box::new(recall_history(capacity, previous)?);
        let completion_menu = Box::new(ColumnarMenu::default().with_name("completion_menu"));

        let mut keybindings = reedline::default_emacs_keybindings();
        keybindings.add_binding(
            KeyModifiers::CONTROL,
            KeyCode::Char('l'),
            ReedlineEvent::ExecuteHostCommand(CLEAR.to_string()),
        );
        keybindings.add_binding(
            KeyModifiers::NONE,
            KeyCode::Tab,
            ReedlineEvent::UntilFound(vec![
                ReedlineEvent::Menu("completion_menu".to_string()),
                ReedlineEvent::MenuNext,
            ]),
        );

        let editor = Reedline::create()
            .with_history(history)
            .with_completer(Box::new(ShellCompleter))
            .with_menu(ReedlineMenu::EngineCompleter(completion_menu))
            .with_edit_mode(Box::new(reedline::Emacs::new(keybindings)))
            .with_hinter(Box::new(
                DefaultHinter::default().with_style(
                    nu_ansi_term::Style::new()
                        .italic()
                        .fg(nu_ansi_term::Color::DarkGray),
                ),
            ));

        Ok(ShellReadline { editor })
    }

    pub fn readline(&mut self, prompt_text: &str) -> Result<String, ReadlineError> {
        let prompt = NishPrompt { text: prompt_text.to_string() };
        match self.editor.read_line(&prompt) {
            Ok(Signal::Success(line)) if line.trim() == CLEAR => {
                clear_screen();
                Err(ReadlineError::Interrupted)
            }
            Ok(Signal::Success(line)) => Ok(line),
            Ok(Signal::CtrlC) => Err(ReadlineError::Interrupted),
            Ok(Signal::CtrlD) => Err(ReadlineError::Eof),
            Err(e) => Err(ReadlineError::Other(e.to_string())),
        }
    }
}

/// In-memory recall holding the newest `capacity` of `previous`.
pub fn recall_history(capacity: usize, previous: &[String]) -> Result<FileBackedHistory> {
    let mut history = FileBackedHistory::new(capacity)?;
    let skip = previous.len().saturating_sub(capacity);
    for line in &previous[skip..] {
        history.save(HistoryItem::from_command_line(line.as_str()))?;
    }
    Ok(history)
}

/// Host command emitted by the Ctrl+L binding.
const CLEAR: &str = "__clear__";

pub fn clear_screen() {
    print!("\x1B[2J\x1B[H");
    let _ = io::stdout().flush();
}

#[derive(Debug)]
pub enum ReadlineError {
    Interrupted,
    Eof,
    Other(String),
}

// ── Line reader ───────────────────────────────────────────────────────────────

/// Where input lines come from.
pub enum LineReader {
    Interactive(Box<ShellReadline>),
    /// A batch file or a non-terminal stdin: no prompt, no editing.
    Batch(Box<dyn BufRead>),
}

impl LineReader {
    pub fn is_interactive(&self) -> bool {
        matches!(self, LineReader::Interactive(_))
    }

    /// One trimmed line, or [`ReadlineError::Eof`] at end of input.
    pub fn readline(&mut self, prompt: &str) -> Result<String, ReadlineError> {
        match self {
            LineReader::Interactive(editor) => editor.readline(prompt).map(|l| l.trim().to_string()),
            LineReader::Batch(input) => {
                let mut line = String::new();
                match input.read_line(&mut line) {
                    Ok(0) => Err(ReadlineError::Eof),
                    Ok(_) => Ok(line.trim().to_string()),
                    Err(e) => Err(ReadlineError::Other(e.to_string())),
                }
            }
        }
    }
}
