// SPDX-License-Identifier: AGPL-3.0-or-later
//! Operator interaction
//!
//! Line prompts, hidden secret entry and yes/no confirmation. The workflow
//! only talks to the [`Prompter`] trait so a scripted operator can stand in
//! for the terminal.

use std::collections::VecDeque;
use std::io::{BufRead, IsTerminal, Write};

use rustix::termios::{self, LocalModes, OptionalActions, Termios};
use tracing::debug;

use crate::error::{Result, SetupError};

/// Source of operator answers
pub trait Prompter {
    /// Ask for a line of free text, trimmed
    fn ask(&mut self, prompt: &str) -> Result<String>;

    /// Ask for a value without echoing it
    fn ask_secret(&mut self, prompt: &str) -> Result<String>;

    /// Ask a `[y/N]` question; anything but `y`/`yes` is a no
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        let answer = self.ask(&format!("{} [y/N]: ", prompt))?;
        Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
    }
}

/// Prompter backed by the process's stdin/stdout
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    pub fn new() -> Self {
        Self
    }

    fn read_line(prompt: &str) -> Result<String> {
        let mut stdout = std::io::stdout();
        write!(stdout, "{}", prompt)?;
        stdout.flush()?;

        let mut line = String::new();
        let read = std::io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Err(SetupError::InputClosed {
                prompt: prompt.trim().to_string(),
            });
        }
        Ok(line.trim().to_string())
    }
}

/// Restores the saved terminal modes when dropped
struct EchoGuard {
    saved: Termios,
}

impl EchoGuard {
    fn disable() -> std::io::Result<Self> {
        let stdin = std::io::stdin();
        let saved = termios::tcgetattr(&stdin)?;
        let mut silent = saved.clone();
        silent.local_modes.remove(LocalModes::ECHO);
        termios::tcsetattr(&stdin, OptionalActions::Now, &silent)?;
        Ok(Self { saved })
    }
}

impl Drop for EchoGuard {
    fn drop(&mut self) {
        let _ = termios::tcsetattr(std::io::stdin(), OptionalActions::Now, &self.saved);
    }
}

impl Prompter for TerminalPrompter {
    fn ask(&mut self, prompt: &str) -> Result<String> {
        Self::read_line(prompt)
    }

    fn ask_secret(&mut self, prompt: &str) -> Result<String> {
        if !std::io::stdin().is_terminal() {
            debug!("stdin is not a terminal, reading secret without echo control");
            return Self::read_line(prompt);
        }

        let guard = EchoGuard::disable()?;
        let value = Self::read_line(prompt);
        drop(guard);
        println!();
        value
    }
}

/// Whether a variable carries a credential and must be read hidden
pub fn is_secret(name: &str, description: &str) -> bool {
    let haystack = format!("{} {}", name, description).to_uppercase();
    haystack.contains("PASSWORD") || haystack.contains("SECRET")
}

/// One prompt as seen by a [`ScriptedPrompter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskedPrompt {
    pub prompt: String,
    pub secret: bool,
}

/// Prompter that replays a fixed list of answers
///
/// Used for unattended runs and tests. Running out of answers is reported
/// as closed input, the same as EOF on a terminal.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    asked: Vec<AskedPrompt>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
        }
    }

    /// Every prompt issued so far, in order
    pub fn asked(&self) -> &[AskedPrompt] {
        &self.asked
    }

    /// Answers not yet consumed
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    fn next(&mut self, prompt: &str, secret: bool) -> Result<String> {
        self.asked.push(AskedPrompt {
            prompt: prompt.to_string(),
            secret,
        });
        self.answers
            .pop_front()
            .map(|answer| answer.trim().to_string())
            .ok_or_else(|| SetupError::InputClosed {
                prompt: prompt.trim().to_string(),
            })
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, prompt: &str) -> Result<String> {
        self.next(prompt, false)
    }

    fn ask_secret(&mut self, prompt: &str) -> Result<String> {
        self.next(prompt, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_secret() {
        assert!(is_secret("DATASOURCES_DEFAULT_PASSWORD", "Database password"));
        assert!(is_secret("MYSQL_ROOT_PASSWORD", "MySQL root password"));
        assert!(is_secret("EMAIL_TRANSPORT_DEFAULT_PASSWORD", "SMTP Password"));
        assert!(!is_secret("DATASOURCES_DEFAULT_HOST", "Database host"));
        assert!(!is_secret("EMAIL_TRANSPORT_DEFAULT_USERNAME", "SMTP User"));
    }

    #[test]
    fn test_scripted_prompter_replays_in_order() {
        let mut prompter = ScriptedPrompter::new(["first", " second "]);
        assert_eq!(prompter.ask("a: ").unwrap(), "first");
        assert_eq!(prompter.ask_secret("b: ").unwrap(), "second");
        assert_eq!(prompter.asked().len(), 2);
        assert!(prompter.asked()[1].secret);
        assert_eq!(prompter.remaining(), 0);
    }

    #[test]
    fn test_scripted_prompter_exhausted() {
        let mut prompter = ScriptedPrompter::new(Vec::<String>::new());
        let err = prompter.ask("Admin email: ").unwrap_err();
        assert!(matches!(err, SetupError::InputClosed { .. }));
    }

    #[test]
    fn test_confirm() {
        let mut prompter = ScriptedPrompter::new(["y", "YES", "", "n"]);
        assert!(prompter.confirm("Install?").unwrap());
        assert!(prompter.confirm("Install?").unwrap());
        assert!(!prompter.confirm("Install?").unwrap());
        assert!(!prompter.confirm("Install?").unwrap());
        assert_eq!(prompter.asked()[0].prompt, "Install? [y/N]: ");
    }
}
