//! services/api/src/web/study.rs
//!
//! REST handlers for the caller's own study data: flash cards, the study
//! planner, the exam date, the dashboard and test analytics. Every route here
//! sits behind [`crate::web::middleware::require_user`].

use crate::{
    error::port_rejection,
    study::{flashcards, planner, WithId},
    web::state::AppState,
};
use async_stream::stream;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json,
    },
    Extension,
};
use chrono::{NaiveDate, Utc};
use futures::{Stream, StreamExt};
use prep_core::{
    analytics::aggregate_history,
    domain::{Flashcard, FlashcardDraft, OverallStats, Profile, Subject, TestHistoryEntry, UserId},
    store::subjects_from,
    streak::calculate_streak,
};
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, sync::Arc};
use tracing::warn;
use utoipa::ToSchema;

//=========================================================================================
// Request and Response Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct NewFlashcard {
    pub topic: String,
    pub question: String,
    pub answer: String,
}

fn default_card_count() -> usize {
    5
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCardsRequest {
    pub topic: String,
    #[serde(default = "default_card_count")]
    pub num_cards: usize,
}

#[derive(Deserialize, ToSchema)]
pub struct NewTopic {
    pub name: String,
}

#[derive(Deserialize, ToSchema)]
pub struct TopicList {
    pub topics: Vec<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExamDateRequest {
    pub exam_date: NaiveDate,
}

/// The settings page's fields. A blank `examDate` clears it.
#[derive(Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileBody {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<String>, format = Date)]
    pub exam_date: Option<String>,
    #[serde(default)]
    pub motivation: Option<String>,
}

impl From<Profile> for ProfileBody {
    fn from(profile: Profile) -> Self {
        Self {
            name: profile.name,
            exam_date: profile.exam_date.map(|d| d.to_string()),
            motivation: profile.motivation,
        }
    }
}

impl TryFrom<ProfileBody> for Profile {
    type Error = (StatusCode, String);

    fn try_from(body: ProfileBody) -> Result<Self, Self::Error> {
        let exam_date = match body.exam_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<NaiveDate>().map_err(|e| {
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    format!("examDate must be YYYY-MM-DD: {}", e),
                )
            })?),
        };
        Ok(Profile {
            name: body.name,
            exam_date,
            motivation: body.motivation,
        })
    }
}

#[derive(Serialize, ToSchema)]
pub struct ToggleResponse {
    #[schema(value_type = Object)]
    pub subject: WithId<Subject>,
    pub streak: u32,
}

#[derive(Serialize, ToSchema)]
pub struct AnalyticsResponse {
    /// Newest first.
    #[schema(value_type = Vec<Object>)]
    pub history: Vec<TestHistoryEntry>,
    /// Absent until a test has been taken.
    #[schema(value_type = Option<Object>)]
    pub overall: Option<OverallStats>,
}

/// One update of the live subject list.
#[derive(Serialize)]
struct SubjectsSnapshot {
    subjects: Vec<WithId<Subject>>,
    streak: u32,
}

fn with_ids<T>(values: Vec<T>) -> Vec<WithId<T>>
where
    WithId<T>: From<T>,
{
    values.into_iter().map(WithId::from).collect()
}

//=========================================================================================
// Flash cards
//=========================================================================================

/// List the caller's flash cards grouped by topic.
#[utoipa::path(
    get,
    path = "/flashcards",
    responses((status = 200, description = "Cards grouped by topic", body = Vec<flashcards::TopicCards>))
)]
pub async fn list_flashcards_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let groups = flashcards::list_grouped(&app_state.repo, &user)
        .await
        .map_err(port_rejection)?;
    Ok(Json(groups))
}

#[utoipa::path(
    post,
    path = "/flashcards",
    request_body = NewFlashcard,
    responses(
        (status = 201, description = "Card saved"),
        (status = 422, description = "A field is blank")
    )
)]
pub async fn add_flashcard_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
    Json(req): Json<NewFlashcard>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let draft = FlashcardDraft {
        question: req.question,
        answer: req.answer,
    };
    let card = flashcards::add(&app_state.repo, &user, &req.topic, draft, Utc::now())
        .await
        .map_err(port_rejection)?;
    Ok((StatusCode::CREATED, Json(WithId::from(card))))
}

/// Generate flash cards on a topic and save them all.
#[utoipa::path(
    post,
    path = "/flashcards/generate",
    request_body = GenerateCardsRequest,
    responses(
        (status = 201, description = "Cards generated and saved"),
        (status = 502, description = "The model could not be reached")
    )
)]
pub async fn generate_flashcards_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
    Json(req): Json<GenerateCardsRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let cards = flashcards::generate_and_save(
        app_state.generator.as_ref(),
        &app_state.repo,
        &user,
        &req.topic,
        req.num_cards,
        Utc::now(),
    )
    .await
    .map_err(port_rejection)?;
    Ok((StatusCode::CREATED, Json(with_ids::<Flashcard>(cards))))
}

#[utoipa::path(
    delete,
    path = "/flashcards/{id}",
    params(("id" = String, Path, description = "The card's key")),
    responses((status = 204, description = "Card deleted"))
)]
pub async fn delete_flashcard_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    app_state
        .repo
        .delete_flashcard(&user, &id)
        .await
        .map_err(port_rejection)?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Study planner
//=========================================================================================

#[utoipa::path(
    get,
    path = "/subjects",
    responses((status = 200, description = "The caller's subjects"))
)]
pub async fn list_subjects_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let subjects = app_state
        .repo
        .list_subjects(&user)
        .await
        .map_err(port_rejection)?;
    Ok(Json(with_ids(subjects)))
}

#[utoipa::path(
    post,
    path = "/subjects",
    request_body = planner::NewSubject,
    responses(
        (status = 201, description = "Subject created"),
        (status = 422, description = "Blank name or inverted date range")
    )
)]
pub async fn add_subject_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
    Json(req): Json<planner::NewSubject>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let subject = planner::add_subject(&app_state.repo, &user, req)
        .await
        .map_err(port_rejection)?;
    Ok((StatusCode::CREATED, Json(WithId::from(subject))))
}

#[utoipa::path(
    delete,
    path = "/subjects/{id}",
    params(("id" = String, Path, description = "The subject's key")),
    responses((status = 204, description = "Subject deleted"))
)]
pub async fn delete_subject_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let today = app_state.config.local_date(Utc::now());
    planner::delete_subject(&app_state.repo, &user, &id, today)
        .await
        .map_err(port_rejection)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/subjects/{id}/topics",
    request_body = NewTopic,
    params(("id" = String, Path, description = "The subject's key")),
    responses(
        (status = 200, description = "The updated subject"),
        (status = 404, description = "No such subject")
    )
)]
pub async fn add_topic_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
    Path(id): Path<String>,
    Json(req): Json<NewTopic>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let subject = planner::add_topic(&app_state.repo, &user, &id, &req.name)
        .await
        .map_err(port_rejection)?;
    Ok(Json(WithId::from(subject)))
}

/// Replace every topic of a subject.
#[utoipa::path(
    put,
    path = "/subjects/{id}/topics",
    request_body = TopicList,
    params(("id" = String, Path, description = "The subject's key")),
    responses((status = 200, description = "The updated subject"))
)]
pub async fn replace_topics_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
    Path(id): Path<String>,
    Json(req): Json<TopicList>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let subject = planner::replace_topics(&app_state.repo, &user, &id, &req.topics)
        .await
        .map_err(port_rejection)?;
    Ok(Json(WithId::from(subject)))
}

/// Replace a subject's topics with generated syllabus topics.
#[utoipa::path(
    post,
    path = "/subjects/{id}/topics/generate",
    params(("id" = String, Path, description = "The subject's key")),
    responses(
        (status = 200, description = "The updated subject"),
        (status = 502, description = "The model could not be reached")
    )
)]
pub async fn generate_subject_topics_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let subject = planner::generate_topics(&app_state.repo, app_state.generator.as_ref(), &user, &id)
        .await
        .map_err(port_rejection)?;
    Ok(Json(WithId::from(subject)))
}

#[utoipa::path(
    delete,
    path = "/subjects/{id}/topics/{index}",
    params(
        ("id" = String, Path, description = "The subject's key"),
        ("index" = usize, Path, description = "Position of the topic")
    ),
    responses(
        (status = 200, description = "The updated subject"),
        (status = 404, description = "No such subject or topic")
    )
)]
pub async fn delete_topic_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
    Path((id, index)): Path<(String, usize)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let today = app_state.config.local_date(Utc::now());
    let subject = planner::delete_topic(&app_state.repo, &user, &id, index, today)
        .await
        .map_err(port_rejection)?;
    Ok(Json(WithId::from(subject)))
}

/// Flip a topic's completion. The streak is recomputed and returned.
#[utoipa::path(
    post,
    path = "/subjects/{id}/topics/{index}/toggle",
    params(
        ("id" = String, Path, description = "The subject's key"),
        ("index" = usize, Path, description = "Position of the topic")
    ),
    responses(
        (status = 200, description = "The updated subject and streak", body = ToggleResponse),
        (status = 404, description = "No such subject or topic")
    )
)]
pub async fn toggle_topic_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
    Path((id, index)): Path<(String, usize)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let now = Utc::now();
    let today = app_state.config.local_date(now);
    let (subject, streak) = planner::toggle_topic(&app_state.repo, &user, &id, index, today, now)
        .await
        .map_err(port_rejection)?;
    Ok(Json(ToggleResponse {
        subject: subject.into(),
        streak,
    }))
}

/// Streams the subject list and the streak it implies after every change.
pub async fn subjects_stream_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    let mut updates = app_state
        .repo
        .watch_subjects(&user)
        .await
        .map_err(port_rejection)?;
    let config = app_state.config.clone();

    let events = stream! {
        while let Some(update) = updates.next().await {
            let subjects = match update.and_then(subjects_from) {
                Ok(subjects) => subjects,
                Err(e) => {
                    warn!("Subject stream for {} failed: {}", user, e);
                    yield Ok(Event::default().event("error").data(e.to_string()));
                    continue;
                }
            };
            let snapshot = SubjectsSnapshot {
                streak: calculate_streak(&subjects, config.local_date(Utc::now())),
                subjects: with_ids(subjects),
            };
            match Event::default().event("subjects").json_data(&snapshot) {
                Ok(event) => yield Ok(event),
                Err(e) => warn!("Failed to encode subject update: {}", e),
            }
        }
    };
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

//=========================================================================================
// Profile, exam date, dashboard and analytics
//=========================================================================================

#[utoipa::path(
    get,
    path = "/profile",
    responses((status = 200, description = "The caller's profile; unset fields are null", body = ProfileBody))
)]
pub async fn get_profile_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let profile = app_state
        .repo
        .get_profile(&user)
        .await
        .map_err(port_rejection)?;
    Ok(Json(ProfileBody::from(profile)))
}

/// Replaces the caller's profile.
#[utoipa::path(
    put,
    path = "/profile",
    request_body = ProfileBody,
    responses(
        (status = 200, description = "The saved profile", body = ProfileBody),
        (status = 422, description = "The exam date is not a calendar date")
    )
)]
pub async fn set_profile_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
    Json(body): Json<ProfileBody>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let profile = Profile::try_from(body)?;
    let saved = app_state
        .repo
        .set_profile(&user, profile)
        .await
        .map_err(port_rejection)?;
    Ok(Json(ProfileBody::from(saved)))
}

#[utoipa::path(
    put,
    path = "/exam-date",
    request_body = ExamDateRequest,
    responses((status = 204, description = "Exam date saved"))
)]
pub async fn set_exam_date_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
    Json(req): Json<ExamDateRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    app_state
        .repo
        .set_exam_date(&user, req.exam_date)
        .await
        .map_err(port_rejection)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/dashboard",
    responses((status = 200, description = "Streak, exam countdown and today's subjects", body = planner::Dashboard))
)]
pub async fn dashboard_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let today = app_state.config.local_date(Utc::now());
    let dashboard = planner::dashboard(&app_state.repo, &user, today)
        .await
        .map_err(port_rejection)?;
    Ok(Json(dashboard))
}

/// The caller's test history and the statistics aggregated over it.
#[utoipa::path(
    get,
    path = "/analytics",
    responses((status = 200, description = "History and overall statistics", body = AnalyticsResponse))
)]
pub async fn analytics_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let history = app_state
        .repo
        .list_history(&user)
        .await
        .map_err(port_rejection)?;
    let overall = aggregate_history(&history);
    Ok(Json(AnalyticsResponse { history, overall }))
}
