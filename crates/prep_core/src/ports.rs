//! crates/prep_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the document store, the generative model and the scraped sites.

use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;
use std::pin::Pin;

use crate::content::ContentError;
use crate::domain::{
    ArticleContent, CurrentAffairsItem, FeedKind, FlashcardDraft, Question, SourceSelector,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("External service failure: {0}")]
    ExternalService(String),
    #[error("Persistence failure: {0}")]
    Persistence(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl From<ContentError> for PortError {
    fn from(e: ContentError) -> Self {
        PortError::InvalidInput(e.to_string())
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// A stream of successive values at one store path; `None` means the path is empty.
pub type ValueStream = Pin<Box<dyn Stream<Item = PortResult<Option<Value>>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// A realtime document tree addressed by `/`-separated paths.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads the subtree at `path`.
    async fn read(&self, path: &str) -> PortResult<Option<Value>>;

    /// Replaces the subtree at `path`. Writing `null` removes it.
    async fn write(&self, path: &str, value: Value) -> PortResult<()>;

    async fn remove(&self, path: &str) -> PortResult<()> {
        self.write(path, Value::Null).await
    }

    /// Stores `value` under a new time-ordered child key of `path` and returns the key.
    async fn push(&self, path: &str, value: Value) -> PortResult<String>;

    /// Yields the current value at `path`, then a new value after every overlapping write.
    async fn subscribe(&self, path: &str) -> PortResult<ValueStream>;
}

/// The generative model that writes questions, flashcards and syllabus topics.
#[async_trait]
pub trait ContentGenerationService: Send + Sync {
    /// Generates `count` multi-statement MCQs covering `topics`.
    async fn generate_questions(&self, topics: &[String], count: usize) -> PortResult<Vec<Question>>;

    async fn generate_flashcards(&self, topic: &str, count: usize) -> PortResult<Vec<FlashcardDraft>>;

    /// Lists the important syllabus topics of a subject.
    async fn generate_topics(&self, subject: &str) -> PortResult<Vec<String>>;
}

/// Best-effort scraping of current-affairs sites.
#[async_trait]
pub trait CurrentAffairsService: Send + Sync {
    async fn fetch_feed(
        &self,
        sources: SourceSelector,
        kind: FeedKind,
    ) -> PortResult<Vec<CurrentAffairsItem>>;

    async fn fetch_article(&self, url: &str) -> PortResult<ArticleContent>;
}

/// Generates keys for [`DocumentStore::push`]; lexical order follows creation time.
pub fn new_push_key() -> String {
    uuid::Uuid::now_v7().simple().to_string()
}
