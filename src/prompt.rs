//! Interactive input
//!
//! Handlers ask questions through [`Prompter`] so the terminal can be
//! swapped for a script in tests.

use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, Password, Select};

use crate::ui;

pub trait Prompter {
    /// Free-text answer; an empty reply yields `default` when given
    fn input(&mut self, prompt: &str, default: Option<&str>) -> Result<String>;

    /// Hidden answer (tokens)
    fn secret(&mut self, prompt: &str) -> Result<String>;

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool>;

    /// Index of the chosen item
    fn select(&mut self, prompt: &str, items: &[String]) -> Result<usize>;
}

/// Prompts on the controlling terminal
pub struct TermPrompter;

impl Prompter for TermPrompter {
    fn input(&mut self, prompt: &str, default: Option<&str>) -> Result<String> {
        let mut input = Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true);
        if let Some(d) = default {
            input = input.default(d.to_string());
        }
        input.interact_text().context("Failed to read input")
    }

    fn secret(&mut self, prompt: &str) -> Result<String> {
        Password::new()
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()
            .context("Failed to read secret")
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool> {
        Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()
            .context("Failed to read confirmation")
    }

    fn select(&mut self, prompt: &str, items: &[String]) -> Result<usize> {
        Select::new()
            .with_prompt(prompt)
            .items(items)
            .default(0)
            .interact()
            .context("Failed to read selection")
    }
}

/// Ask until `validate` accepts the answer.
///
/// Rejections are shown as warnings and the question is repeated.
pub fn ask_validated<F>(
    prompter: &mut dyn Prompter,
    prompt: &str,
    default: Option<&str>,
    validate: F,
) -> Result<String>
where
    F: Fn(&str) -> std::result::Result<String, String>,
{
    loop {
        let answer = prompter.input(prompt, default)?;
        match validate(answer.trim()) {
            Ok(value) => return Ok(value),
            Err(reason) => ui::warn(&reason),
        }
    }
}

/// Like [`ask_validated`] for hidden input
pub fn ask_secret_validated<F>(prompter: &mut dyn Prompter, prompt: &str, validate: F) -> Result<String>
where
    F: Fn(&str) -> std::result::Result<String, String>,
{
    loop {
        let answer = prompter.secret(prompt)?;
        match validate(answer.trim()) {
            Ok(value) => return Ok(value),
            Err(reason) => ui::warn(&reason),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedPrompter;
    use super::*;

    fn non_empty(s: &str) -> std::result::Result<String, String> {
        if s.is_empty() {
            Err("value required".to_string())
        } else {
            Ok(s.to_string())
        }
    }

    #[test]
    fn ask_validated_reprompts_until_valid() {
        let mut p = ScriptedPrompter::new(["", "  ", "ok"]);
        let value = ask_validated(&mut p, "Name", None, non_empty).unwrap();
        assert_eq!(value, "ok");
        assert_eq!(p.asked.len(), 3);
    }

    #[test]
    fn ask_validated_uses_default() {
        let mut p = ScriptedPrompter::new([""]);
        let value = ask_validated(&mut p, "Host", Some("github.com"), non_empty).unwrap();
        assert_eq!(value, "github.com");
    }

    #[test]
    fn ask_validated_stops_when_input_ends() {
        let mut p = ScriptedPrompter::new(["", ""]);
        assert!(ask_validated(&mut p, "Name", None, non_empty).is_err());
    }

    #[test]
    fn secret_validation() {
        let mut p = ScriptedPrompter::new(["", "tok"]);
        let value = ask_secret_validated(&mut p, "Token", non_empty).unwrap();
        assert_eq!(value, "tok");
    }
}
