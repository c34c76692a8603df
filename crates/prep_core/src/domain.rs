//! crates/prep_core/src/domain.rs
//!
//! Defines the core data structures shared by the test engine, the study
//! planner and the current-affairs feed. The serde field names match the
//! documents written to the realtime store, so they stay readable by the
//! existing web client.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::analytics::{AnalyticsResult, TopicBreakdown};
use crate::session::DisplayStatus;

/// Topic label used for questions that carry no topic of their own.
pub const DEFAULT_TOPIC: &str = "General";

/// The verified identity of the caller, as forwarded by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//=========================================================================================
// Tests
//=========================================================================================

/// A single multiple-choice question. Only constructed through
/// [`crate::content`] validation or deserialised from an already validated record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub statements: Vec<String>,
    pub options: Vec<String>,
    pub answer: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl Question {
    /// The topic used for analytics, falling back to [`DEFAULT_TOPIC`].
    pub fn topic_label(&self) -> &str {
        self.topic
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TOPIC)
    }

    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }
}

/// A submitted test as stored under `users/{uid}/tests/{dateKey}/{testId}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRecord {
    pub submitted: bool,
    pub submitted_at: i64,
    pub subject: String,
    #[serde(default)]
    pub topics: Vec<String>,
    pub questions: Vec<Question>,
    #[serde(default)]
    pub answers: Vec<Option<String>>,
    #[serde(default)]
    pub review: Vec<bool>,
    #[serde(default)]
    pub status: Vec<DisplayStatus>,
    pub score: f64,
    pub total_questions: usize,
    pub date: DateTime<Utc>,
    pub date_key: NaiveDate,
    pub time_taken: u32,
    pub analytics: AnalyticsResult,
    pub test_type: String,
    pub retake_count: u32,
}

/// The question set of a generated test, shared under `pyqs/{testId}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionBankEntry {
    pub questions: Vec<Question>,
    #[serde(default)]
    pub topics: Vec<String>,
    pub created_at: i64,
    pub created_by: UserId,
    pub difficulty: String,
    pub source: String,
}

/// One entry of `users/{uid}/testHistory`, read back by the analytics dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestHistoryEntry {
    pub test_id: String,
    pub date: NaiveDate,
    pub score: f64,
    #[serde(default)]
    pub topics: Vec<String>,
    pub total_questions: usize,
    pub time_taken: u32,
    #[serde(default)]
    pub analytics: Option<AnalyticsResult>,
}

/// Aggregate figures over every test a user has taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallStats {
    pub total_tests: usize,
    pub total_questions: usize,
    pub total_correct: u32,
    pub total_wrong: u32,
    pub average_score: f64,
    pub average_accuracy: f64,
    pub topic_stats: TopicBreakdown,
    pub trend: Vec<TrendPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub score: f64,
    pub accuracy: f64,
}

//=========================================================================================
// Flashcards
//=========================================================================================

/// A question/answer pair produced by the generator, before it is saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashcardDraft {
    pub question: String,
    pub answer: String,
}

/// A flashcard stored under `users/{uid}/flashCards/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    #[serde(skip)]
    pub id: String,
    pub question: String,
    pub answer: String,
    pub topic: String,
    pub created_at: i64,
}

//=========================================================================================
// Study planner
//=========================================================================================

/// A syllabus topic inside a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyTopic {
    pub name: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

impl StudyTopic {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            completed: false,
            completed_date: None,
            completed_at: None,
        }
    }

    /// Flips completion, stamping or clearing the completion day.
    pub fn toggle(&mut self, today: NaiveDate, now: DateTime<Utc>) {
        self.completed = !self.completed;
        if self.completed {
            self.completed_date = Some(today);
            self.completed_at = Some(now.timestamp_millis());
        } else {
            self.completed_date = None;
            self.completed_at = None;
        }
    }
}

/// A subject block in the user's study plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    #[serde(skip)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub topics: Vec<StudyTopic>,
}

/// The settings a user keeps about themselves, shown on the home page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "blank_date_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub exam_date: Option<NaiveDate>,
    /// A line the user wants to be reminded of.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motivation: Option<String>,
}

impl Profile {
    /// Trims every field and drops the ones left empty.
    pub fn normalized(self) -> Self {
        let tidy = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Self {
            name: tidy(self.name),
            exam_date: self.exam_date,
            motivation: tidy(self.motivation),
        }
    }
}

/// Profiles saved by the web client hold `""` for an unset date.
fn blank_date_as_none<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(s) if !s.trim().is_empty() => s
            .trim()
            .parse::<NaiveDate>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

//=========================================================================================
// Current affairs
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    Daily,
    Headlines,
    Editorial,
}

/// The sites the feed can be scraped from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedSource {
    #[serde(rename = "NEXT IAS")]
    NextIas,
    #[serde(rename = "Vajiram & Ravi")]
    Vajiram,
}

impl FeedSource {
    pub fn label(self) -> &'static str {
        match self {
            FeedSource::NextIas => "NEXT IAS",
            FeedSource::Vajiram => "Vajiram & Ravi",
        }
    }
}

/// Which sources a feed request covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceSelector {
    NextIas,
    Vajiram,
    All,
}

impl SourceSelector {
    pub fn sources(self) -> &'static [FeedSource] {
        match self {
            SourceSelector::NextIas => &[FeedSource::NextIas],
            SourceSelector::Vajiram => &[FeedSource::Vajiram],
            SourceSelector::All => &[FeedSource::NextIas, FeedSource::Vajiram],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SourceSelector::NextIas => FeedSource::NextIas.label(),
            SourceSelector::Vajiram => FeedSource::Vajiram.label(),
            SourceSelector::All => "Multiple Sources",
        }
    }
}

/// A best-effort scraped headline. Everything but the title may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentAffairsItem {
    pub title: String,
    pub date: String,
    pub category: String,
    #[serde(rename = "type")]
    pub kind: FeedKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syllabus: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub source: FeedSource,
}

/// A scraped article body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleContent {
    pub title: String,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syllabus: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    pub content: Vec<String>,
    pub source: String,
    pub scraped_at: DateTime<Utc>,
}
