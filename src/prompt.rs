//! Operator prompting.
//!
//! The interactive flows (disk choice, timezone confirmation, username) go
//! through the [`Prompt`] trait so tests can drive them with scripted
//! answers instead of a terminal.

use anyhow::{bail, Result};
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

/// A source of operator answers.
pub trait Prompt {
    /// Show `message` and return one line of input, without the trailing
    /// newline.
    fn ask(&mut self, message: &str) -> Result<String>;
}

/// Prompts on stdout, reads answers from stdin.
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn ask(&mut self, message: &str) -> Result<String> {
        print!("{message}");
        io::stdout().flush()?;

        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            bail!("stdin closed while waiting for input");
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Canned answers, consumed in order. Used by tests.
pub struct ScriptedPrompt {
    answers: VecDeque<String>,
}

impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
        }
    }

    /// True when every canned answer has been consumed.
    pub fn exhausted(&self) -> bool {
        self.answers.is_empty()
    }
}

impl Prompt for ScriptedPrompt {
    fn ask(&mut self, message: &str) -> Result<String> {
        match self.answers.pop_front() {
            Some(answer) => Ok(answer),
            None => bail!("no scripted answer left for prompt '{message}'"),
        }
    }
}
