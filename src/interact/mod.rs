//! Human-in-the-loop confirmation checkpoints
//!
//! Every confirmation in the pipeline goes through the [`Selector`]
//! capability so that automation can substitute a non-interactive
//! implementation. [`AcceptAll`] is the automation default; [`Console`]
//! implements the numbered-menu prompt on stdin.

use crate::domain::Result;
use std::io::{self, BufRead, Write};

/// Outcome of a yes/no confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    /// Yes, and skip every later confirmation in this run
    YesToAll,
}

impl Answer {
    pub fn is_yes(self) -> bool {
        matches!(self, Answer::Yes | Answer::YesToAll)
    }
}

/// Outcome of a subset selection over a list of options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Keep every option
    All,
    /// Keep nothing
    Nothing,
    /// Keep the options at these indices (0-based)
    Subset(Vec<usize>),
}

impl Selection {
    /// Apply the selection to a vector of items, preserving order.
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        match self {
            Selection::All => items,
            Selection::Nothing => Vec::new(),
            Selection::Subset(indices) => items
                .into_iter()
                .enumerate()
                .filter(|(i, _)| indices.contains(i))
                .map(|(_, item)| item)
                .collect(),
        }
    }
}

/// Injected confirmation capability.
///
/// Methods take `&mut self` because a "yes to all" answer upgrades the
/// selector for the remainder of the run.
pub trait Selector {
    /// Ask the user to pick a subset of `options`.
    fn select(&mut self, prompt: &str, options: &[String]) -> Result<Selection>;

    /// Ask the user a yes/no question.
    fn confirm(&mut self, prompt: &str) -> Result<Answer>;
}

/// Non-interactive selector that accepts everything. The automation default.
#[derive(Debug, Default)]
pub struct AcceptAll;

impl Selector for AcceptAll {
    fn select(&mut self, _prompt: &str, _options: &[String]) -> Result<Selection> {
        Ok(Selection::All)
    }

    fn confirm(&mut self, _prompt: &str) -> Result<Answer> {
        Ok(Answer::YesToAll)
    }
}

/// Interactive selector reading numbered-menu answers from stdin.
#[derive(Debug, Default)]
pub struct Console {
    yes_to_all: bool,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_line(&self) -> Result<String> {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}

impl Selector for Console {
    fn select(&mut self, prompt: &str, options: &[String]) -> Result<Selection> {
        if self.yes_to_all {
            return Ok(Selection::All);
        }
        for (i, option) in options.iter().enumerate() {
            println!("{:>3}. {}", i + 1, option);
        }
        println!(
            "{prompt}\n(1, 2, 3, ... / multiple indices separated by a single space / \
             0 for none / anything else for all)"
        );
        io::stdout().flush()?;
        let key = self.read_line()?;
        Ok(parse_menu_answer(&key, options.len()))
    }

    fn confirm(&mut self, prompt: &str) -> Result<Answer> {
        if self.yes_to_all {
            return Ok(Answer::Yes);
        }
        print!("{prompt} (Y/N)  ");
        io::stdout().flush()?;
        let key = self.read_line()?;
        let answer = parse_confirm_answer(&key);
        if answer == Answer::YesToAll {
            self.yes_to_all = true;
        }
        Ok(answer)
    }
}

/// Parse a numbered-menu answer: `0` means none, digits mean a subset,
/// anything else means all.
fn parse_menu_answer(key: &str, option_count: usize) -> Selection {
    let key = key.trim();
    let tokens: Vec<&str> = key.split_whitespace().collect();
    if tokens.is_empty() {
        return Selection::All;
    }
    if tokens.iter().all(|t| t.chars().all(|c| c.is_ascii_digit())) {
        let mut indices: Vec<usize> = tokens
            .iter()
            .filter_map(|t| t.parse::<usize>().ok())
            .collect();
        if indices == [0] {
            return Selection::Nothing;
        }
        indices.retain(|&i| i >= 1 && i <= option_count);
        if indices.is_empty() {
            return Selection::Nothing;
        }
        return Selection::Subset(indices.into_iter().map(|i| i - 1).collect());
    }
    Selection::All
}

/// Parse a yes/no answer, recognizing the "yes to all" escalation.
fn parse_confirm_answer(key: &str) -> Answer {
    let squashed: String = key.to_lowercase().split_whitespace().collect();
    match squashed.as_str() {
        "yy" | "yestoall" | "yes_to_all" => Answer::YesToAll,
        "" | "y" | "yes" | "ok" | "proceed" | "true" | "t" => Answer::Yes,
        _ => Answer::No,
    }
}
