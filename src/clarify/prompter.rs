use crate::errors::ClarifyError;
use dialoguer::{Confirm, MultiSelect, Select, theme::ColorfulTheme};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Source of human answers.
///
/// Every method returns `Ok(None)` when the human cancels (Esc / q). Errors are
/// reserved for a broken prompt backend.
pub trait Prompter: Send + Sync {
    fn select(
        &self,
        prompt: &str,
        options: &[&str],
        default: usize,
    ) -> Result<Option<usize>, ClarifyError>;

    fn multi_select(
        &self,
        prompt: &str,
        options: &[&str],
        defaults: &[bool],
    ) -> Result<Option<Vec<usize>>, ClarifyError>;

    fn confirm(&self, prompt: &str, default: bool) -> Result<Option<bool>, ClarifyError>;
}

/// Interactive prompts on the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    pub fn new() -> Self {
        Self
    }
}

impl Prompter for TerminalPrompter {
    fn select(
        &self,
        prompt: &str,
        options: &[&str],
        default: usize,
    ) -> Result<Option<usize>, ClarifyError> {
        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .items(options)
            .default(default)
            .interact_opt()?;
        Ok(selection)
    }

    fn multi_select(
        &self,
        prompt: &str,
        options: &[&str],
        defaults: &[bool],
    ) -> Result<Option<Vec<usize>>, ClarifyError> {
        let selection = MultiSelect::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("{} (Space to toggle, Enter to accept)", prompt))
            .items(options)
            .defaults(defaults)
            .interact_opt()?;
        Ok(selection)
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<Option<bool>, ClarifyError> {
        let answer = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(default)
            .interact_opt()?;
        Ok(answer)
    }
}

/// A canned response for [`ScriptedPrompter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedAnswer {
    /// Accept whatever the prompt pre-selects
    Defaults,
    Pick(Vec<usize>),
    Confirm(bool),
    Cancel,
}

/// Replays a fixed list of answers. Runs out → cancels.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<ScriptedAnswer>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = ScriptedAnswer>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Prompts shown so far, in order.
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().map(|a| a.clone()).unwrap_or_default()
    }

    fn next(&self, prompt: &str) -> ScriptedAnswer {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(prompt.to_string());
        }
        self.answers
            .lock()
            .ok()
            .and_then(|mut a| a.pop_front())
            .unwrap_or(ScriptedAnswer::Cancel)
    }
}

impl Prompter for ScriptedPrompter {
    fn select(
        &self,
        prompt: &str,
        _options: &[&str],
        default: usize,
    ) -> Result<Option<usize>, ClarifyError> {
        Ok(match self.next(prompt) {
            ScriptedAnswer::Defaults => Some(default),
            ScriptedAnswer::Pick(picks) => picks.first().copied(),
            ScriptedAnswer::Confirm(_) => Some(default),
            ScriptedAnswer::Cancel => None,
        })
    }

    fn multi_select(
        &self,
        prompt: &str,
        _options: &[&str],
        defaults: &[bool],
    ) -> Result<Option<Vec<usize>>, ClarifyError> {
        Ok(match self.next(prompt) {
            ScriptedAnswer::Defaults | ScriptedAnswer::Confirm(_) => Some(
                defaults
                    .iter()
                    .enumerate()
                    .filter(|(_, on)| **on)
                    .map(|(i, _)| i)
                    .collect(),
            ),
            ScriptedAnswer::Pick(picks) => Some(picks),
            ScriptedAnswer::Cancel => None,
        })
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<Option<bool>, ClarifyError> {
        Ok(match self.next(prompt) {
            ScriptedAnswer::Confirm(answer) => Some(answer),
            ScriptedAnswer::Defaults | ScriptedAnswer::Pick(_) => Some(default),
            ScriptedAnswer::Cancel => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_prompter_replays_in_order() {
        let prompter = ScriptedPrompter::new([
            ScriptedAnswer::Pick(vec![2]),
            ScriptedAnswer::Defaults,
            ScriptedAnswer::Confirm(true),
        ]);
        let options = ["a", "b", "c"];

        assert_eq!(prompter.select("first", &options, 0).unwrap(), Some(2));
        assert_eq!(
            prompter
                .multi_select("second", &options, &[true, false, true])
                .unwrap(),
            Some(vec![0, 2])
        );
        assert_eq!(prompter.confirm("third", false).unwrap(), Some(true));
        assert_eq!(prompter.asked(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_scripted_prompter_cancels_when_exhausted() {
        let prompter = ScriptedPrompter::new([]);
        assert_eq!(prompter.select("q", &["a"], 0).unwrap(), None);
        assert_eq!(prompter.confirm("q", true).unwrap(), None);
    }
}
