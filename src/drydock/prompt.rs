//! Interactive request/response surface.
//!
//! Callers block on [`Prompter::choose`], [`Prompter::confirm`] or [`Prompter::input`]
//! until an answer arrives. Only one prompt is outstanding at a time.

use crate::error::{DrydockError, Result};
use console::Term;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};

pub trait Prompter {
    /// Pick one of `options`, returning its index. `Cancelled` if the user aborts.
    fn choose(&mut self, prompt: &str, options: &[String]) -> Result<usize>;

    /// Ask a yes/no question.
    fn confirm(&mut self, prompt: &str) -> Result<bool>;

    /// Ask for a line of text, offering `default`.
    fn input(&mut self, prompt: &str, default: &str) -> Result<String>;
}

/// Prompts on stderr so stdout stays clean for command output.
#[derive(Default)]
pub struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self::default()
    }
}

fn io_error(err: dialoguer::Error) -> DrydockError {
    DrydockError::Io(std::io::Error::other(err.to_string()))
}

impl Prompter for TerminalPrompter {
    fn choose(&mut self, prompt: &str, options: &[String]) -> Result<usize> {
        let picked = Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(options)
            .default(0)
            .interact_on_opt(&Term::stderr())
            .map_err(io_error)?;
        picked.ok_or(DrydockError::Cancelled)
    }

    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        let answer = Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(false)
            .interact_on_opt(&Term::stderr())
            .map_err(io_error)?;
        answer.ok_or(DrydockError::Cancelled)
    }

    fn input(&mut self, prompt: &str, default: &str) -> Result<String> {
        Input::<String>::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default.to_string())
            .interact_text_on(&Term::stderr())
            .map_err(io_error)
    }
}

#[cfg(any(test, feature = "test_utils"))]
pub use scripted::{Answer, ScriptedPrompter};

#[cfg(any(test, feature = "test_utils"))]
mod scripted {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Answer {
        Choose(usize),
        Confirm(bool),
        Input(String),
        Cancel,
    }

    /// Replays pre-recorded answers and remembers every prompt it was shown.
    #[derive(Debug, Default)]
    pub struct ScriptedPrompter {
        answers: VecDeque<Answer>,
        pub prompts: Vec<String>,
    }

    impl ScriptedPrompter {
        pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
            Self {
                answers: answers.into_iter().collect(),
                prompts: Vec::new(),
            }
        }

        pub fn silent() -> Self {
            Self::default()
        }

        fn next(&mut self, prompt: &str) -> Result<Answer> {
            self.prompts.push(prompt.to_string());
            self.answers.pop_front().ok_or_else(|| {
                DrydockError::InvalidSelection(format!("unexpected prompt: {}", prompt))
            })
        }
    }

    impl Prompter for ScriptedPrompter {
        fn choose(&mut self, prompt: &str, _options: &[String]) -> Result<usize> {
            match self.next(prompt)? {
                Answer::Choose(i) => Ok(i),
                Answer::Cancel => Err(DrydockError::Cancelled),
                other => Err(DrydockError::InvalidSelection(format!(
                    "expected a choice for `{}`, scripted {:?}",
                    prompt, other
                ))),
            }
        }

        fn confirm(&mut self, prompt: &str) -> Result<bool> {
            match self.next(prompt)? {
                Answer::Confirm(b) => Ok(b),
                Answer::Cancel => Err(DrydockError::Cancelled),
                other => Err(DrydockError::InvalidSelection(format!(
                    "expected a confirmation for `{}`, scripted {:?}",
                    prompt, other
                ))),
            }
        }

        fn input(&mut self, prompt: &str, _default: &str) -> Result<String> {
            match self.next(prompt)? {
                Answer::Input(text) => Ok(text),
                Answer::Cancel => Err(DrydockError::Cancelled),
                other => Err(DrydockError::InvalidSelection(format!(
                    "expected text for `{}`, scripted {:?}",
                    prompt, other
                ))),
            }
        }
    }
}
