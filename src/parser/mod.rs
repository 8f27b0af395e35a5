// src/parser/mod.rs
pub mod ast;

use anyhow::{bail, Result};
use ast::Pipeline;

/// Split a line into pipeline stages and each stage into words.
///
/// A trailing unquoted `&` marks the whole pipeline background; anywhere else
/// `&` is an ordinary character. Quotes group words and protect `|` and `&`.
pub fn parse(input: &str) -> Result<Pipeline> {
    let mut background = false;
    let mut stages = Vec::new();
    let mut current: Vec<String> = Vec::new();
    for token in tokenize(input)? {
        match token {
            Token::Word(word) => current.push(word),
            Token::Background => background = true,
            Token::Pipe => {
                // empty stages are dropped, like `||` collapsing to one pipe
                if !current.is_empty() {
                    stages.push(std::mem::take(&mut current));
                }
            }
        }
    }
    if !current.is_empty() {
        stages.push(current);
    }

    Ok(Pipeline { stages, background })
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Pipe,
    /// `&` with nothing but whitespace after it.
    Background,
}

fn ends_line(chars: &std::iter::Peekable<std::str::Chars>) -> bool {
    chars.clone().skip(1).all(char::is_whitespace)
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' | '\n' | '\x07' => { chars.next(); }

            '|' => {
                chars.next();
                tokens.push(Token::Pipe);
            }

            '&' if ends_line(&chars) => {
                tokens.push(Token::Background);
                break;
            }

            _ => tokens.push(Token::Word(read_word(&mut chars)?)),
        }
    }

    Ok(tokens)
}

/// Read one word, joining quoted and unquoted parts (`a'b c'd` is one word).
fn read_word(chars: &mut std::iter::Peekable<std::str::Chars>) -> Result<String> {
    let mut word = String::new();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' | '\n' | '\x07' | '|' => break,
            '&' if ends_line(chars) => break,

            '\'' => {
                chars.next();
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => word.push(ch),
                        None => bail!("unterminated single quote"),
                    }
                }
            }

            '"' => {
                chars.next();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(next) => word.push(next),
                            None => bail!("unterminated double quote"),
                        },
                        Some(ch) => word.push(ch),
                        None => bail!("unterminated double quote"),
                    }
                }
            }

            '\\' => {
                chars.next();
                if let Some(next) = chars.next() {
                    word.push(next);
                }
            }

            _ => {
                chars.next();
                word.push(c);
            }
        }
    }
    Ok(word)
}
