//! crates/prep_core/src/store.rs
//!
//! Typed access to the user's documents in the realtime store. Paths match
//! the layout the web client already reads:
//!
//! ```text
//! users/{uid}/tests/{dateKey}/{testId}      full test record (+ answers/status/review slices)
//! users/{uid}/testHistory/{testId}          dashboard summary
//! users/{uid}/flashCards/{id}
//! users/{uid}/subjects/{id}                 planner subject with its topics
//! users/{uid}/streak, users/{uid}/examDate
//! users/{uid}/profile                       name, exam date and motivation
//! pyqs/{testId}                             shared question bank
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::domain::{
    Flashcard, FlashcardDraft, Profile, Question, QuestionBankEntry, StudyTopic, Subject,
    TestHistoryEntry, TestRecord, UserId,
};
use crate::ports::{DocumentStore, PortError, PortResult, ValueStream};

/// The per-question slices written while a test is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestSlice {
    Answers,
    Status,
    Review,
}

impl TestSlice {
    fn key(self) -> &'static str {
        match self {
            TestSlice::Answers => "answers",
            TestSlice::Status => "status",
            TestSlice::Review => "review",
        }
    }
}

/// The parts of a stored test needed to take it again.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTest {
    pub questions: Vec<Question>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub retake_count: u32,
}

/// Formats a calendar day the way store keys use it.
pub fn date_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

#[derive(Clone)]
pub struct StudyRepository {
    store: Arc<dyn DocumentStore>,
}

impl StudyRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    //-------------------------------------------------------------------------------------
    // Paths
    //-------------------------------------------------------------------------------------

    pub fn test_path(user: &UserId, day: NaiveDate, test_id: &str) -> String {
        format!("users/{}/tests/{}/{}", user, date_key(day), test_id)
    }

    pub fn slice_path(user: &UserId, day: NaiveDate, test_id: &str, slice: TestSlice) -> String {
        format!("{}/{}", Self::test_path(user, day, test_id), slice.key())
    }

    fn history_path(user: &UserId) -> String {
        format!("users/{}/testHistory", user)
    }

    fn flashcards_path(user: &UserId) -> String {
        format!("users/{}/flashCards", user)
    }

    pub fn subjects_path(user: &UserId) -> String {
        format!("users/{}/subjects", user)
    }

    fn streak_path(user: &UserId) -> String {
        format!("users/{}/streak", user)
    }

    fn exam_date_path(user: &UserId) -> String {
        format!("users/{}/examDate", user)
    }

    fn profile_path(user: &UserId) -> String {
        format!("users/{}/profile", user)
    }

    //-------------------------------------------------------------------------------------
    // Tests
    //-------------------------------------------------------------------------------------

    pub async fn save_test(
        &self,
        user: &UserId,
        day: NaiveDate,
        test_id: &str,
        record: &TestRecord,
    ) -> PortResult<()> {
        self.store
            .write(&Self::test_path(user, day, test_id), encode(record)?)
            .await
    }

    /// Loads a stored test for a retake.
    pub async fn load_test(&self, user: &UserId, day: NaiveDate, test_id: &str) -> PortResult<StoredTest> {
        match self.store.read(&Self::test_path(user, day, test_id)).await? {
            Some(value) => decode(value),
            None => Err(PortError::NotFound(format!(
                "Test {} on {} not found",
                test_id,
                date_key(day)
            ))),
        }
    }

    pub async fn save_question_bank(&self, test_id: &str, entry: &QuestionBankEntry) -> PortResult<()> {
        self.store.write(&format!("pyqs/{}", test_id), encode(entry)?).await
    }

    pub async fn save_history(&self, user: &UserId, entry: &TestHistoryEntry) -> PortResult<()> {
        let path = format!("{}/{}", Self::history_path(user), entry.test_id);
        self.store.write(&path, encode(entry)?).await
    }

    /// The user's test history, newest first. Entries that no longer decode are
    /// logged and skipped.
    pub async fn list_history(&self, user: &UserId) -> PortResult<Vec<TestHistoryEntry>> {
        let mut entries: Vec<TestHistoryEntry> = children(self.store.read(&Self::history_path(user)).await?)
            .into_iter()
            .filter_map(|(id, v)| match serde_json::from_value(v) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable history entry {} of user {}: {}", id, user, e);
                    None
                }
            })
            .collect();
        entries.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(entries)
    }

    //-------------------------------------------------------------------------------------
    // Flashcards
    //-------------------------------------------------------------------------------------

    pub async fn list_flashcards(&self, user: &UserId) -> PortResult<Vec<Flashcard>> {
        let value = self.store.read(&Self::flashcards_path(user)).await?;
        children(value)
            .into_iter()
            .map(|(id, v)| {
                let mut card: Flashcard = decode(v)?;
                card.id = id;
                Ok(card)
            })
            .collect()
    }

    pub async fn add_flashcard(
        &self,
        user: &UserId,
        topic: &str,
        draft: FlashcardDraft,
        now: DateTime<Utc>,
    ) -> PortResult<Flashcard> {
        let mut card = Flashcard {
            id: String::new(),
            question: draft.question,
            answer: draft.answer,
            topic: topic.to_string(),
            created_at: now.timestamp_millis(),
        };
        card.id = self
            .store
            .push(&Self::flashcards_path(user), encode(&card)?)
            .await?;
        Ok(card)
    }

    pub async fn delete_flashcard(&self, user: &UserId, id: &str) -> PortResult<()> {
        self.store
            .remove(&format!("{}/{}", Self::flashcards_path(user), id))
            .await
    }

    //-------------------------------------------------------------------------------------
    // Planner
    //-------------------------------------------------------------------------------------

    pub async fn list_subjects(&self, user: &UserId) -> PortResult<Vec<Subject>> {
        subjects_from(self.store.read(&Self::subjects_path(user)).await?)
    }

    pub async fn get_subject(&self, user: &UserId, id: &str) -> PortResult<Subject> {
        let path = format!("{}/{}", Self::subjects_path(user), id);
        let value = self
            .store
            .read(&path)
            .await?
            .ok_or_else(|| PortError::NotFound(format!("Subject {} not found", id)))?;
        let mut subject: Subject = decode(value)?;
        subject.id = id.to_string();
        Ok(subject)
    }

    pub async fn add_subject(&self, user: &UserId, mut subject: Subject) -> PortResult<Subject> {
        subject.id = self
            .store
            .push(&Self::subjects_path(user), encode(&subject)?)
            .await?;
        Ok(subject)
    }

    pub async fn delete_subject(&self, user: &UserId, id: &str) -> PortResult<()> {
        self.store
            .remove(&format!("{}/{}", Self::subjects_path(user), id))
            .await
    }

    pub async fn save_topics(&self, user: &UserId, subject_id: &str, topics: &[StudyTopic]) -> PortResult<()> {
        let path = format!("{}/{}/topics", Self::subjects_path(user), subject_id);
        self.store.write(&path, encode(&topics)?).await
    }

    /// Streams the full subject list whenever anything under it changes.
    pub async fn watch_subjects(&self, user: &UserId) -> PortResult<ValueStream> {
        self.store.subscribe(&Self::subjects_path(user)).await
    }

    pub async fn get_streak(&self, user: &UserId) -> PortResult<u32> {
        Ok(match self.store.read(&Self::streak_path(user)).await? {
            Some(value) => decode(value)?,
            None => 0,
        })
    }

    pub async fn set_streak(&self, user: &UserId, streak: u32) -> PortResult<()> {
        self.store.write(&Self::streak_path(user), Value::from(streak)).await
    }

    pub async fn get_exam_date(&self, user: &UserId) -> PortResult<Option<NaiveDate>> {
        match self.store.read(&Self::exam_date_path(user)).await? {
            Some(value) => decode(value).map(Some),
            None => Ok(None),
        }
    }

    pub async fn set_exam_date(&self, user: &UserId, day: NaiveDate) -> PortResult<()> {
        self.store
            .write(&Self::exam_date_path(user), Value::from(date_key(day)))
            .await
    }

    //-------------------------------------------------------------------------------------
    // Profile
    //-------------------------------------------------------------------------------------

    pub async fn get_profile(&self, user: &UserId) -> PortResult<Profile> {
        Ok(match self.store.read(&Self::profile_path(user)).await? {
            Some(value) => decode(value)?,
            None => Profile::default(),
        })
    }

    /// Replaces the whole profile, as the settings page saves it.
    pub async fn set_profile(&self, user: &UserId, profile: Profile) -> PortResult<Profile> {
        let profile = profile.normalized();
        self.store
            .write(&Self::profile_path(user), encode(&profile)?)
            .await?;
        Ok(profile)
    }
}

/// Decodes a subject list value as read from (or streamed by) the store.
pub fn subjects_from(value: Option<Value>) -> PortResult<Vec<Subject>> {
    children(value)
        .into_iter()
        .map(|(id, v)| {
            let mut subject: Subject = decode(v)?;
            subject.id = id;
            Ok(subject)
        })
        .collect()
}

fn children(value: Option<Value>) -> Vec<(String, Value)> {
    match value {
        Some(Value::Object(map)) => map.into_iter().collect(),
        Some(Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => Vec::new(),
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> PortResult<Value> {
    serde_json::to_value(value).map_err(|e| PortError::Unexpected(e.to_string()))
}

fn decode<T: DeserializeOwned>(value: Value) -> PortResult<T> {
    serde_json::from_value(value).map_err(|e| PortError::Unexpected(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// A bare tree behind a lock; enough to exercise the paths and codecs.
    #[derive(Default)]
    struct TreeStore {
        root: Mutex<Value>,
    }

    #[async_trait]
    impl DocumentStore for TreeStore {
        async fn read(&self, path: &str) -> PortResult<Option<Value>> {
            let root = self.root.lock().unwrap();
            Ok(tree::get(&root, path).cloned().map(tree::restore_arrays))
        }

        async fn write(&self, path: &str, value: Value) -> PortResult<()> {
            tree::set(&mut self.root.lock().unwrap(), path, value);
            Ok(())
        }

        async fn push(&self, path: &str, value: Value) -> PortResult<String> {
            let key = crate::ports::new_push_key();
            self.write(&tree::join(&[path, &key]), value).await?;
            Ok(key)
        }

        async fn subscribe(&self, _path: &str) -> PortResult<ValueStream> {
            Ok(Box::pin(futures::stream::empty()))
        }
    }

    fn repo() -> (StudyRepository, Arc<TreeStore>) {
        let store = Arc::new(TreeStore::default());
        (StudyRepository::new(store.clone()), store)
    }

    fn user() -> UserId {
        UserId::new("u1")
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, d).unwrap()
    }

    #[tokio::test]
    async fn slices_live_under_the_dated_test() {
        assert_eq!(
            StudyRepository::slice_path(&user(), day(2), "t1", TestSlice::Review),
            "users/u1/tests/2025-08-02/t1/review"
        );
    }

    #[tokio::test]
    async fn history_is_listed_newest_first() {
        let (repo, store) = repo();
        for (id, d) in [("t1", 1), ("t3", 3), ("t2", 2)] {
            let entry = TestHistoryEntry {
                test_id: id.to_string(),
                date: day(d),
                score: 50.0,
                topics: vec!["Polity".to_string()],
                total_questions: 2,
                time_taken: 30,
                analytics: None,
            };
            repo.save_history(&user(), &entry).await.unwrap();
        }
        store
            .write("users/u1/testHistory/broken", serde_json::json!({"score": "n/a"}))
            .await
            .unwrap();

        let ids: Vec<String> = repo
            .list_history(&user())
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.test_id)
            .collect();
        assert_eq!(ids, vec!["t3", "t2", "t1"]);
    }

    #[tokio::test]
    async fn subjects_round_trip_with_generated_ids() {
        let (repo, _) = repo();
        let subject = Subject {
            id: String::new(),
            name: "Polity".to_string(),
            start: "09:00".to_string(),
            end: "11:00".to_string(),
            start_date: None,
            end_date: None,
            topics: vec![StudyTopic::new("Preamble")],
        };
        let saved = repo.add_subject(&user(), subject).await.unwrap();
        assert!(!saved.id.is_empty());

        let mut topics = saved.topics.clone();
        topics.push(StudyTopic::new("Fundamental Rights"));
        repo.save_topics(&user(), &saved.id, &topics).await.unwrap();

        let loaded = repo.get_subject(&user(), &saved.id).await.unwrap();
        assert_eq!(loaded.id, saved.id);
        assert_eq!(loaded.topics, topics);
        assert_eq!(repo.list_subjects(&user()).await.unwrap().len(), 1);

        repo.delete_subject(&user(), &saved.id).await.unwrap();
        assert!(matches!(
            repo.get_subject(&user(), &saved.id).await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn missing_tests_are_not_found() {
        let (repo, _) = repo();
        assert!(matches!(
            repo.load_test(&user(), day(2), "nope").await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn streak_and_exam_date_default_to_empty() {
        let (repo, _) = repo();
        assert_eq!(repo.get_streak(&user()).await.unwrap(), 0);
        assert_eq!(repo.get_exam_date(&user()).await.unwrap(), None);

        repo.set_streak(&user(), 4).await.unwrap();
        repo.set_exam_date(&user(), day(24)).await.unwrap();
        assert_eq!(repo.get_streak(&user()).await.unwrap(), 4);
        assert_eq!(repo.get_exam_date(&user()).await.unwrap(), Some(day(24)));
    }

    #[tokio::test]
    async fn profiles_tolerate_blank_dates_and_are_tidied() {
        let (repo, store) = repo();
        assert_eq!(repo.get_profile(&user()).await.unwrap(), Profile::default());

        // Saved by the web client with the date left empty.
        store
            .write(
                "users/u1/profile",
                serde_json::json!({"name": "Asha", "examDate": "", "motivation": "Do it for your family!"}),
            )
            .await
            .unwrap();
        let profile = repo.get_profile(&user()).await.unwrap();
        assert_eq!(profile.name.as_deref(), Some("Asha"));
        assert_eq!(profile.exam_date, None);

        let saved = repo
            .set_profile(
                &user(),
                Profile {
                    name: Some("  Asha  ".to_string()),
                    exam_date: Some(day(30)),
                    motivation: Some(" ".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(saved.name.as_deref(), Some("Asha"));
        assert_eq!(saved.motivation, None);
        assert_eq!(repo.get_profile(&user()).await.unwrap(), saved);
        assert_eq!(saved.exam_date, Some(day(30)));
    }
}
