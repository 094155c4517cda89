// src/engine/confirm.rs

//! Confirmation providers for destructive operations

use crate::error::{Error, Result};
use colored::Colorize;
use dialoguer::{Confirm, Input};
use signal_hook::consts::signal::SIGINT;
use std::io::IsTerminal;

/// Phrase typed to confirm removing every group
pub const REMOVE_ALL_PHRASE: &str = "REMOVE ALL";

/// Phrase typed to confirm deleting user data directories
pub const PURGE_DATA_PHRASE: &str = "DELETE MY DATA";

/// Answers the engine's confirmation questions
pub trait ConfirmationProvider {
    /// Yes/no question
    fn confirm(&self, prompt: &str) -> Result<bool>;

    /// Ask for `phrase` to be typed literally; `false` means the user backed out
    fn confirm_phrase(&self, prompt: &str, phrase: &str) -> Result<bool>;
}

/// Terminal prompts, short-circuited by `--yes` and `--confirm`
pub struct PromptConfirm {
    assume_yes: bool,
    phrase: Option<String>,
}

impl PromptConfirm {
    pub fn new(assume_yes: bool, phrase: Option<String>) -> Self {
        Self { assume_yes, phrase }
    }

    fn require_terminal(what: &str) -> Result<()> {
        if std::io::stdin().is_terminal() {
            Ok(())
        } else {
            Err(Error::PreconditionFailed(format!(
                "{} needs an interactive terminal; pass {}",
                what,
                if what == "confirmation" { "--yes" } else { "--confirm" }
            )))
        }
    }
}

impl ConfirmationProvider for PromptConfirm {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        Self::require_terminal("confirmation")?;

        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(prompt_error)
    }

    fn confirm_phrase(&self, prompt: &str, phrase: &str) -> Result<bool> {
        if let Some(given) = &self.phrase {
            return Ok(given == phrase);
        }
        Self::require_terminal("confirmation phrase")?;

        println!("{}", prompt.red().bold());
        loop {
            let answer: String = Input::new()
                .with_prompt(format!("Type '{}' to continue, or 'no' to cancel", phrase))
                .allow_empty(true)
                .interact_text()
                .map_err(prompt_error)?;

            match answer.trim() {
                a if a == phrase => return Ok(true),
                "" | "n" | "no" | "NO" => return Ok(false),
                _ => println!("Please type exactly '{}'.", phrase),
            }
        }
    }
}

/// Ctrl+C at a prompt arrives as an interrupted read, not as a signal
fn prompt_error(e: dialoguer::Error) -> Error {
    match e {
        dialoguer::Error::IO(io) if io.kind() == std::io::ErrorKind::Interrupted => {
            Error::Interrupted { signal: SIGINT }
        }
        e => Error::Prompt(e),
    }
}

/// Fixed answers for tests and scripted runs
#[cfg(any(test, feature = "test-utils"))]
pub struct ScriptedConfirm {
    answer: bool,
    phrase: Option<String>,
    prompts: std::cell::RefCell<Vec<String>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl ScriptedConfirm {
    pub fn yes() -> Self {
        Self {
            answer: true,
            phrase: None,
            prompts: Default::default(),
        }
    }

    pub fn no() -> Self {
        Self {
            answer: false,
            ..Self::yes()
        }
    }

    /// Type `phrase` whenever a phrase is asked for
    pub fn with_phrase(mut self, phrase: &str) -> Self {
        self.phrase = Some(phrase.to_string());
        self
    }

    /// Every prompt shown so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl ConfirmationProvider for ScriptedConfirm {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        self.prompts.borrow_mut().push(prompt.to_string());
        Ok(self.answer)
    }

    fn confirm_phrase(&self, prompt: &str, phrase: &str) -> Result<bool> {
        self.prompts.borrow_mut().push(prompt.to_string());
        Ok(self.phrase.as_deref() == Some(phrase))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assume_yes_skips_prompt() {
        let confirm = PromptConfirm::new(true, None);
        assert!(confirm.confirm("Remove office?").unwrap());
    }

    #[test]
    fn test_preset_phrase_must_match() {
        let confirm = PromptConfirm::new(true, Some("REMOVE ALL".to_string()));
        assert!(confirm.confirm_phrase("Really?", REMOVE_ALL_PHRASE).unwrap());
        assert!(!confirm.confirm_phrase("Really?", PURGE_DATA_PHRASE).unwrap());
    }

    #[test]
    fn test_ctrl_c_at_prompt_is_an_interrupt() {
        let interrupted = std::io::Error::from(std::io::ErrorKind::Interrupted);
        let err = prompt_error(dialoguer::Error::IO(interrupted));
        assert!(matches!(err, Error::Interrupted { signal: 2 }));
        assert_eq!(crate::commands::exit_code_for_error(&err), 130);

        let broken = std::io::Error::from(std::io::ErrorKind::BrokenPipe);
        assert!(matches!(prompt_error(dialoguer::Error::IO(broken)), Error::Prompt(_)));
    }

    #[test]
    fn test_scripted_records_prompts() {
        let confirm = ScriptedConfirm::no().with_phrase(REMOVE_ALL_PHRASE);
        assert!(!confirm.confirm("first").unwrap());
        assert!(confirm.confirm_phrase("second", REMOVE_ALL_PHRASE).unwrap());
        assert_eq!(confirm.prompts(), vec!["first".to_string(), "second".to_string()]);
    }
}
