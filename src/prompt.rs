//! Operator input.
//!
//! The workflow never reads stdin directly; it asks an [`InputProvider`].
//! [`ConsoleInput`] is the interactive terminal, [`ScriptedInput`] replays a
//! fixed list of answers for non-interactive runs and tests.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use crate::cert::params::SubjectInfo;
use crate::error::{CaError, Result};

/// A source of operator answers.
pub trait InputProvider {
    /// Shows `prompt` and returns the answer without its line ending, or
    /// `None` once input is exhausted.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;

    /// Shows an informational message to the operator.
    fn notify(&mut self, message: &str);
}

/// How often an empty answer is asked again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// Ask until a non-empty answer arrives or input ends.
    #[default]
    Unbounded,
    /// Give up after this many empty answers.
    Attempts(usize),
}

/// Asks for `prompt` until the answer is non-empty.
///
/// Surrounding whitespace is trimmed before the check. Fails with
/// [`CaError::InvalidInput`] on end of input or when `policy` runs out.
pub fn request_non_empty(
    input: &mut dyn InputProvider,
    prompt: &str,
    complaint: &str,
    policy: RetryPolicy,
) -> Result<String> {
    let mut attempts = 0usize;
    loop {
        let Some(answer) = input.read_line(prompt)? else {
            return Err(CaError::InvalidInput(format!(
                "input ended before an answer to {:?} was given",
                prompt.trim()
            )));
        };
        let answer = answer.trim();
        if !answer.is_empty() {
            return Ok(answer.to_string());
        }

        attempts += 1;
        if let RetryPolicy::Attempts(max) = policy {
            if attempts >= max {
                return Err(CaError::InvalidInput(format!(
                    "no answer to {:?} after {attempts} attempt(s)",
                    prompt.trim()
                )));
            }
        }
        input.notify(complaint);
    }
}

/// Prompts for every CA subject field. Empty answers leave the field unset.
pub fn collect_subject(input: &mut dyn InputProvider) -> Result<SubjectInfo> {
    let mut ask = |prompt: &str| -> Result<Option<String>> {
        let answer = input.read_line(prompt)?.ok_or_else(|| {
            CaError::InvalidInput(format!(
                "input ended before an answer to {:?} was given",
                prompt.trim()
            ))
        })?;
        let answer = answer.trim();
        Ok((!answer.is_empty()).then(|| answer.to_string()))
    };

    Ok(SubjectInfo {
        country: ask("Country Name (2 letter code) [XX]: ")?,
        state: ask("State or Province Name (full name) []: ")?,
        locality: ask("Locality Name (eg, city) [Default City]: ")?,
        organization: ask("Organization Name (eg, company) [Default Company Ltd]: ")?,
        organization_unit: ask("Organizational Unit Name (eg, section) []: ")?,
        common_name: ask("Common Name (eg, your name or your server's hostname) []: ")?
            .unwrap_or_default(),
        email: ask("Email Address []: ")?,
    })
}

/// Reads answers from stdin, prompting on stdout.
#[derive(Debug, Default)]
pub struct ConsoleInput;

impl InputProvider for ConsoleInput {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{prompt}")
            .and_then(|()| stdout.flush())
            .map_err(|e| CaError::InvalidInput(format!("writing prompt: {e}")))?;

        let mut line = String::new();
        let read = io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| CaError::InvalidInput(format!("reading answer: {e}")))?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn notify(&mut self, message: &str) {
        println!("{message}");
    }
}

/// Replays a fixed list of answers and records what was shown.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    answers: VecDeque<String>,
    prompts: Vec<String>,
    notices: Vec<String>,
}

impl ScriptedInput {
    pub fn new<I, T>(answers: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Prompts shown so far, in order.
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    /// Messages shown so far, in order.
    pub fn notices(&self) -> &[String] {
        &self.notices
    }

    /// Answers not consumed yet.
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl InputProvider for ScriptedInput {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        self.prompts.push(prompt.to_string());
        Ok(self.answers.pop_front())
    }

    fn notify(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }
}
