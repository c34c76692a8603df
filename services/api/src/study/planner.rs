//! services/api/src/study/planner.rs
//!
//! Study planner operations: subjects, their topics, the streak and the
//! dashboard summary.

use chrono::{DateTime, NaiveDate, Utc};
use prep_core::{
    domain::{StudyTopic, Subject, UserId},
    ports::{ContentGenerationService, PortError, PortResult},
    store::StudyRepository,
    streak::calculate_streak,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use super::WithId;

/// The fields a client sends to create a subject.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewSubject {
    pub name: String,
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub topics: Vec<String>,
}

/// The home page summary.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    /// The profile name, for the greeting.
    pub name: Option<String>,
    pub motivation: Option<String>,
    pub streak: u32,
    pub exam_date: Option<NaiveDate>,
    pub days_to_exam: Option<i64>,
    /// Subjects whose date range contains today.
    #[schema(value_type = Vec<Object>)]
    pub active_subjects: Vec<WithId<Subject>>,
}

fn required(value: &str, what: &str) -> PortResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(PortError::InvalidInput(format!("{} must not be empty.", what)));
    }
    Ok(value.to_string())
}

fn topic_at(subject: &mut Subject, index: usize) -> PortResult<&mut StudyTopic> {
    let len = subject.topics.len();
    subject.topics.get_mut(index).ok_or_else(|| {
        PortError::NotFound(format!("Topic {} not found ({} topics)", index, len))
    })
}

//=========================================================================================
// Subjects and topics
//=========================================================================================

pub async fn add_subject(repo: &StudyRepository, user: &UserId, new: NewSubject) -> PortResult<Subject> {
    let name = required(&new.name, "Subject name")?;
    if let (Some(start), Some(end)) = (new.start_date, new.end_date) {
        if end < start {
            return Err(PortError::InvalidInput(
                "The end date must not be before the start date.".to_string(),
            ));
        }
    }
    let subject = Subject {
        id: String::new(),
        name,
        start: new.start,
        end: new.end,
        start_date: new.start_date,
        end_date: new.end_date,
        topics: new
            .topics
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(StudyTopic::new)
            .collect(),
    };
    let subject = repo.add_subject(user, subject).await?;
    info!("User {} added subject {}", user, subject.id);
    Ok(subject)
}

/// Deletes a subject and recomputes the streak its topics may have carried.
pub async fn delete_subject(repo: &StudyRepository, user: &UserId, subject_id: &str, today: NaiveDate) -> PortResult<u32> {
    repo.delete_subject(user, subject_id).await?;
    info!("User {} deleted subject {}", user, subject_id);
    recompute_streak(repo, user, today).await
}

pub async fn add_topic(repo: &StudyRepository, user: &UserId, subject_id: &str, name: &str) -> PortResult<Subject> {
    let name = required(name, "Topic name")?;
    let mut subject = repo.get_subject(user, subject_id).await?;
    subject.topics.push(StudyTopic::new(name));
    repo.save_topics(user, subject_id, &subject.topics).await?;
    Ok(subject)
}

/// Removes a topic. A completed topic may have carried the streak, so it is
/// recomputed too.
pub async fn delete_topic(
    repo: &StudyRepository,
    user: &UserId,
    subject_id: &str,
    index: usize,
    today: NaiveDate,
) -> PortResult<Subject> {
    let mut subject = repo.get_subject(user, subject_id).await?;
    let was_completed = topic_at(&mut subject, index)?.completed;
    subject.topics.remove(index);
    repo.save_topics(user, subject_id, &subject.topics).await?;
    if was_completed {
        recompute_streak(repo, user, today).await?;
    }
    Ok(subject)
}

/// Replaces every topic of a subject with fresh, uncompleted ones.
pub async fn replace_topics(
    repo: &StudyRepository,
    user: &UserId,
    subject_id: &str,
    names: &[String],
) -> PortResult<Subject> {
    let mut subject = repo.get_subject(user, subject_id).await?;
    subject.topics = names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .map(StudyTopic::new)
        .collect();
    repo.save_topics(user, subject_id, &subject.topics).await?;
    Ok(subject)
}

/// Replaces a subject's topics with generated syllabus topics for its name.
pub async fn generate_topics(
    repo: &StudyRepository,
    generator: &dyn ContentGenerationService,
    user: &UserId,
    subject_id: &str,
) -> PortResult<Subject> {
    let subject = repo.get_subject(user, subject_id).await?;
    let topics = generator.generate_topics(&subject.name).await?;
    replace_topics(repo, user, subject_id, &topics).await
}

/// Flips a topic's completion and stores the recomputed streak.
pub async fn toggle_topic(
    repo: &StudyRepository,
    user: &UserId,
    subject_id: &str,
    index: usize,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> PortResult<(Subject, u32)> {
    let mut subject = repo.get_subject(user, subject_id).await?;
    topic_at(&mut subject, index)?.toggle(today, now);
    repo.save_topics(user, subject_id, &subject.topics).await?;
    let streak = recompute_streak(repo, user, today).await?;
    Ok((subject, streak))
}

//=========================================================================================
// Streak and dashboard
//=========================================================================================

/// Recomputes the streak from every subject and stores it.
pub async fn recompute_streak(repo: &StudyRepository, user: &UserId, today: NaiveDate) -> PortResult<u32> {
    let subjects = repo.list_subjects(user).await?;
    let streak = calculate_streak(&subjects, today);
    repo.set_streak(user, streak).await?;
    Ok(streak)
}

pub fn is_active(subject: &Subject, today: NaiveDate) -> bool {
    match (subject.start_date, subject.end_date) {
        (Some(start), Some(end)) => start <= today && today <= end,
        _ => false,
    }
}

pub async fn dashboard(repo: &StudyRepository, user: &UserId, today: NaiveDate) -> PortResult<Dashboard> {
    let subjects = repo.list_subjects(user).await?;
    let streak = calculate_streak(&subjects, today);
    let profile = repo.get_profile(user).await?;
    let exam_date = match profile.exam_date {
        Some(day) => Some(day),
        None => repo.get_exam_date(user).await?,
    };
    Ok(Dashboard {
        name: profile.name,
        motivation: profile.motivation,
        streak,
        exam_date,
        days_to_exam: exam_date.map(|d| (d - today).num_days()),
        active_subjects: subjects
            .into_iter()
            .filter(|s| is_active(s, today))
            .map(WithId::from)
            .collect(),
    })
}
