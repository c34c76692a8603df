//! crates/prep_core/src/session.rs
//!
//! The in-memory state machine for one test attempt: question navigation,
//! answer selection, review flags, the countdown and the one-shot submission.

use serde::{Deserialize, Serialize};

use crate::analytics::{compute_analytics, AnalyticsResult};
use crate::domain::Question;

/// Countdown budget per question when no explicit duration is given.
pub const DEFAULT_SECONDS_PER_QUESTION: u32 = 60;

/// Errors raised by session operations that must fail loudly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Question index {index} is out of range for a test of {len} questions")]
    OutOfRange { index: usize, len: usize },
}

/// Whether the candidate has seen and answered a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    NotVisited,
    NotAnswered,
    Answered,
}

/// The status shown on the question palette: the review flag takes
/// precedence over the answer status it hides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
    NotVisited,
    NotAnswered,
    Answered,
    #[serde(rename = "review")]
    MarkedForReview,
}

impl DisplayStatus {
    /// The stored form, as written to the `status` slice.
    pub fn as_str(self) -> &'static str {
        match self {
            DisplayStatus::NotVisited => "not_visited",
            DisplayStatus::NotAnswered => "not_answered",
            DisplayStatus::Answered => "answered",
            DisplayStatus::MarkedForReview => "review",
        }
    }

    fn compose(status: AnswerStatus, marked: bool) -> Self {
        match (marked, status) {
            (true, _) => DisplayStatus::MarkedForReview,
            (false, AnswerStatus::NotVisited) => DisplayStatus::NotVisited,
            (false, AnswerStatus::NotAnswered) => DisplayStatus::NotAnswered,
            (false, AnswerStatus::Answered) => DisplayStatus::Answered,
        }
    }
}

/// Why a mutating call left the session untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    Submitted,
    OutOfRange,
    UnknownOption,
}

/// The outcome of a per-question mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Applied,
    Ignored(IgnoreReason),
}

impl Mutation {
    pub fn is_applied(self) -> bool {
        matches!(self, Mutation::Applied)
    }
}

/// The outcome of one countdown tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    /// Time remains; carries the seconds left.
    Running(u32),
    /// This tick exhausted the countdown and submitted the test.
    Expired(AnalyticsResult),
    /// The test was already submitted; nothing changed.
    Idle,
}

/// Palette counts, as shown next to the question grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub answered: usize,
    pub not_answered: usize,
    pub review: usize,
    pub not_visited: usize,
}

/// One test attempt.
#[derive(Debug, Clone)]
pub struct TestSession {
    questions: Vec<Question>,
    answers: Vec<Option<String>>,
    statuses: Vec<AnswerStatus>,
    review: Vec<bool>,
    current: usize,
    duration_seconds: u32,
    remaining_seconds: u32,
    analytics: Option<AnalyticsResult>,
}

impl TestSession {
    /// Creates a session positioned on the first question.
    pub fn new(questions: Vec<Question>, duration_seconds: u32) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::InvalidInput(
                "a test needs at least one question".to_string(),
            ));
        }
        let len = questions.len();
        Ok(Self {
            questions,
            answers: vec![None; len],
            statuses: vec![AnswerStatus::NotVisited; len],
            review: vec![false; len],
            current: 0,
            duration_seconds,
            remaining_seconds: duration_seconds,
            analytics: None,
        })
    }

    /// Creates a session with [`DEFAULT_SECONDS_PER_QUESTION`] per question.
    pub fn with_default_duration(questions: Vec<Question>) -> Result<Self, SessionError> {
        let seconds = default_duration(questions.len());
        Self::new(questions, seconds)
    }

    /// A fresh attempt over the same questions and duration with every mutable field reset.
    pub fn retake(&self) -> Self {
        let len = self.questions.len();
        Self {
            questions: self.questions.clone(),
            answers: vec![None; len],
            statuses: vec![AnswerStatus::NotVisited; len],
            review: vec![false; len],
            current: 0,
            duration_seconds: self.duration_seconds,
            remaining_seconds: self.duration_seconds,
            analytics: None,
        }
    }

    //-------------------------------------------------------------------------------------
    // Transitions
    //-------------------------------------------------------------------------------------

    pub fn select_answer(&mut self, index: usize, option: &str) -> Mutation {
        if let Some(reason) = self.guard(index) {
            return Mutation::Ignored(reason);
        }
        if !self.questions[index].has_option(option) {
            return Mutation::Ignored(IgnoreReason::UnknownOption);
        }
        self.answers[index] = Some(option.to_string());
        self.statuses[index] = AnswerStatus::Answered;
        Mutation::Applied
    }

    /// Moves the cursor. Visiting a question for the first time marks it
    /// not-answered; after submission only the cursor moves.
    pub fn navigate(&mut self, index: usize) -> Result<(), SessionError> {
        if index >= self.len() {
            return Err(SessionError::OutOfRange {
                index,
                len: self.len(),
            });
        }
        self.current = index;
        if !self.is_submitted() && self.statuses[index] == AnswerStatus::NotVisited {
            self.statuses[index] = AnswerStatus::NotAnswered;
        }
        Ok(())
    }

    /// Flips the review flag; the answer status underneath is kept.
    pub fn toggle_review(&mut self, index: usize) -> Mutation {
        if let Some(reason) = self.guard(index) {
            return Mutation::Ignored(reason);
        }
        self.review[index] = !self.review[index];
        Mutation::Applied
    }

    pub fn clear_response(&mut self, index: usize) -> Mutation {
        if let Some(reason) = self.guard(index) {
            return Mutation::Ignored(reason);
        }
        self.answers[index] = None;
        self.statuses[index] = AnswerStatus::NotAnswered;
        Mutation::Applied
    }

    /// Advances the countdown by one second, submitting when it runs out.
    pub fn tick(&mut self) -> Tick {
        if self.is_submitted() {
            return Tick::Idle;
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            Tick::Expired(self.submit().clone())
        } else {
            Tick::Running(self.remaining_seconds)
        }
    }

    /// Freezes the session and scores it. Later calls return the same result.
    pub fn submit(&mut self) -> &AnalyticsResult {
        let questions = &self.questions;
        let answers = &self.answers;
        self.analytics
            .get_or_insert_with(|| compute_analytics(questions, answers))
    }

    fn guard(&self, index: usize) -> Option<IgnoreReason> {
        if self.is_submitted() {
            Some(IgnoreReason::Submitted)
        } else if index >= self.len() {
            Some(IgnoreReason::OutOfRange)
        } else {
            None
        }
    }

    //-------------------------------------------------------------------------------------
    // Accessors
    //-------------------------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn answers(&self) -> &[Option<String>] {
        &self.answers
    }

    pub fn answer(&self, index: usize) -> Option<&str> {
        self.answers.get(index).and_then(Option::as_deref)
    }

    pub fn answer_status(&self, index: usize) -> Option<AnswerStatus> {
        self.statuses.get(index).copied()
    }

    pub fn is_marked(&self, index: usize) -> bool {
        self.review.get(index).copied().unwrap_or(false)
    }

    pub fn review_flags(&self) -> &[bool] {
        &self.review
    }

    pub fn status(&self, index: usize) -> Option<DisplayStatus> {
        self.answer_status(index)
            .map(|s| DisplayStatus::compose(s, self.is_marked(index)))
    }

    pub fn display_statuses(&self) -> Vec<DisplayStatus> {
        self.statuses
            .iter()
            .zip(&self.review)
            .map(|(s, r)| DisplayStatus::compose(*s, *r))
            .collect()
    }

    pub fn summary(&self) -> StatusSummary {
        let mut summary = StatusSummary::default();
        for status in self.display_statuses() {
            match status {
                DisplayStatus::MarkedForReview => summary.review += 1,
                DisplayStatus::Answered => summary.answered += 1,
                DisplayStatus::NotAnswered => summary.not_answered += 1,
                DisplayStatus::NotVisited => summary.not_visited += 1,
            }
        }
        summary
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn duration_seconds(&self) -> u32 {
        self.duration_seconds
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    /// Seconds spent so far.
    pub fn elapsed_seconds(&self) -> u32 {
        self.duration_seconds - self.remaining_seconds
    }

    pub fn is_submitted(&self) -> bool {
        self.analytics.is_some()
    }

    pub fn analytics(&self) -> Option<&AnalyticsResult> {
        self.analytics.as_ref()
    }
}

fn default_duration(len: usize) -> u32 {
    u32::try_from(len)
        .unwrap_or(u32::MAX)
        .saturating_mul(DEFAULT_SECONDS_PER_QUESTION)
}
