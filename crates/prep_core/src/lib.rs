pub mod analytics;
pub mod content;
pub mod domain;
pub mod feed;
pub mod ports;
pub mod session;
pub mod store;
pub mod streak;
pub mod tree;

pub use analytics::{compute_analytics, aggregate_history, AnalyticsResult, TopicBreakdown, TopicStats};
pub use domain::{ArticleContent, CurrentAffairsItem, FeedKind, FeedSource, Flashcard, FlashcardDraft,
    OverallStats, Profile, Question, QuestionBankEntry, SourceSelector, StudyTopic, Subject, TestHistoryEntry,
    TestRecord, UserId};
pub use ports::{ContentGenerationService, CurrentAffairsService, DocumentStore, PortError, PortResult,
    ValueStream};
pub use session::{AnswerStatus, DisplayStatus, Mutation, SessionError, TestSession, Tick};
pub use store::StudyRepository;
