//! Clarification session for SRS creation.
//!
//! Five fixed questions refine a free-text project idea before it is handed to
//! `create-srs`. The answers are serialized into one enriched text block and
//! then discarded; nothing is persisted.

mod prompter;

pub use prompter::{Prompter, ScriptedAnswer, ScriptedPrompter, TerminalPrompter};

use crate::errors::ClarifyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    Single,
    Multi {
        /// An empty selection aborts the session
        required: bool,
    },
}

/// One clarification question.
#[derive(Debug)]
pub struct Question {
    pub number: usize,
    /// Label used in the enriched text (`Q1. Platform: ...`)
    pub label: &'static str,
    pub prompt: &'static str,
    pub options: &'static [&'static str],
    pub defaults: &'static [usize],
    pub kind: QuestionKind,
    /// Reason reported when a required multi-select comes back empty
    pub empty_reason: &'static str,
}

impl Question {
    pub fn prompt_text(&self) -> String {
        format!(
            "Question {}/{}: {}",
            self.number,
            QUESTIONS.len(),
            self.prompt
        )
    }

    fn default_flags(&self) -> Vec<bool> {
        (0..self.options.len())
            .map(|i| self.defaults.contains(&i))
            .collect()
    }
}

/// The fixed question set, in asking order.
pub static QUESTIONS: [Question; 5] = [
    Question {
        number: 1,
        label: "Platform",
        prompt: "On which platform should the application run?",
        options: &[
            "(A) Web application",
            "(B) Mobile app (iOS)",
            "(C) Mobile app (Android)",
            "(D) Desktop app (Windows/Mac)",
            "(E) Multi-platform",
        ],
        defaults: &[0],
        kind: QuestionKind::Single,
        empty_reason: "",
    },
    Question {
        number: 2,
        label: "User Types",
        prompt: "Who are the main users?",
        options: &[
            "(A) End users/Customers",
            "(B) Administrators",
            "(C) Content managers",
            "(D) Guests (no login)",
        ],
        defaults: &[0, 1],
        kind: QuestionKind::Multi { required: true },
        empty_reason: "At least one user type required",
    },
    Question {
        number: 3,
        label: "Core Features",
        prompt: "What are the core features?",
        options: &[
            "(A) User authentication & profiles",
            "(B) Data management (CRUD)",
            "(C) Search & filtering",
            "(D) Reporting & analytics",
            "(E) Real-time updates",
        ],
        defaults: &[0, 1, 2],
        kind: QuestionKind::Multi { required: true },
        empty_reason: "At least one feature required",
    },
    Question {
        number: 4,
        label: "Database",
        prompt: "What type of database?",
        options: &[
            "(A) SQL (PostgreSQL, MySQL)",
            "(B) NoSQL (MongoDB, Firebase)",
            "(C) File-based (SQLite)",
            "(D) Not sure",
        ],
        defaults: &[0],
        kind: QuestionKind::Single,
        empty_reason: "",
    },
    Question {
        number: 5,
        label: "Special Requirements",
        prompt: "Any special requirements?",
        options: &[
            "(A) High security",
            "(B) High performance",
            "(C) Scalability",
            "(D) Offline support",
            "(E) None (standard)",
        ],
        defaults: &[0, 1],
        kind: QuestionKind::Multi { required: false },
        empty_reason: "",
    },
];

/// The chosen options for one question.
#[derive(Debug, Clone)]
pub struct Answer {
    pub question: &'static Question,
    pub choices: Vec<&'static str>,
}

/// Result of a clarification session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClarificationOutcome {
    /// The enriched idea text
    Completed(String),
    Cancelled { reason: String },
}

/// Ordered question/answer pairs for one idea.
#[derive(Debug)]
pub struct ClarificationSession {
    idea: String,
    answers: Vec<Answer>,
}

impl ClarificationSession {
    pub fn new(idea: impl Into<String>) -> Self {
        Self {
            idea: idea.into(),
            answers: Vec::with_capacity(QUESTIONS.len()),
        }
    }

    /// Ask every question in order. The first cancellation ends the session.
    pub fn run(mut self, prompter: &dyn Prompter) -> Result<ClarificationOutcome, ClarifyError> {
        for question in QUESTIONS.iter() {
            let picks = match question.kind {
                QuestionKind::Single => {
                    let default = question.defaults.first().copied().unwrap_or(0);
                    prompter
                        .select(&question.prompt_text(), question.options, default)?
                        .map(|i| vec![i])
                }
                QuestionKind::Multi { .. } => prompter.multi_select(
                    &question.prompt_text(),
                    question.options,
                    &question.default_flags(),
                )?,
            };

            let Some(picks) = picks else {
                tracing::info!(question = question.number, "Clarification cancelled");
                return Ok(ClarificationOutcome::Cancelled {
                    reason: "Cancelled".to_string(),
                });
            };

            if picks.is_empty() && question.kind == (QuestionKind::Multi { required: true }) {
                return Ok(ClarificationOutcome::Cancelled {
                    reason: question.empty_reason.to_string(),
                });
            }

            self.record(question, &picks)?;
        }

        Ok(ClarificationOutcome::Completed(self.enrich()))
    }

    fn record(&mut self, question: &'static Question, picks: &[usize]) -> Result<(), ClarifyError> {
        let choices = picks
            .iter()
            .map(|&index| {
                question
                    .options
                    .get(index)
                    .copied()
                    .ok_or(ClarifyError::InvalidSelection {
                        question: question.label.to_string(),
                        index,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.answers.push(Answer { question, choices });
        Ok(())
    }

    /// Serialize the idea and answers into the enriched input text.
    pub fn enrich(&self) -> String {
        let mut text = format!(
            "Project Idea: {}\n\nCLARIFICATION ANSWERS:\n",
            self.idea.trim()
        );
        for answer in &self.answers {
            let value = if answer.choices.is_empty() {
                "None".to_string()
            } else {
                answer.choices.join(", ")
            };
            text.push_str(&format!(
                "Q{}. {}: {}\n",
                answer.question.number, answer.question.label, value
            ));
        }
        text
    }
}
