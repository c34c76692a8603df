//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the public REST endpoints (content
//! generation and current affairs) and the master definition for the
//! OpenAPI specification.

use crate::{error::port_rejection, web::state::AppState};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use prep_core::{
    domain::{ArticleContent, CurrentAffairsItem, FeedKind, FlashcardDraft, Question, SourceSelector},
    feed::{dedupe_and_limit, fallback_article, fallback_items},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::web::study;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        generate_test_handler,
        generate_flashcards_handler,
        generate_topics_handler,
        current_affairs_handler,
        article_handler,
        study::list_flashcards_handler,
        study::add_flashcard_handler,
        study::generate_flashcards_handler,
        study::delete_flashcard_handler,
        study::list_subjects_handler,
        study::add_subject_handler,
        study::delete_subject_handler,
        study::add_topic_handler,
        study::delete_topic_handler,
        study::toggle_topic_handler,
        study::replace_topics_handler,
        study::generate_subject_topics_handler,
        study::get_profile_handler,
        study::set_profile_handler,
        study::set_exam_date_handler,
        study::dashboard_handler,
        study::analytics_handler,
    ),
    components(
        schemas(
            GenerateTestRequest, GenerateTestResponse,
            GenerateFlashcardsRequest, GenerateFlashcardsResponse,
            GenerateTopicsRequest, GenerateTopicsResponse,
            CurrentAffairsResponse, ArticleResponse,
            study::NewFlashcard, study::GenerateCardsRequest, study::NewTopic,
            study::TopicList, study::ProfileBody, study::ExamDateRequest, study::ToggleResponse,
            crate::study::planner::NewSubject, crate::study::planner::Dashboard,
            crate::study::flashcards::TopicCards,
        )
    ),
    tags(
        (name = "UPSC Prep API", description = "Practice tests, flash cards, the study planner and current affairs.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Request and Response Structs
//=========================================================================================

fn default_question_count() -> usize {
    10
}

fn default_card_count() -> usize {
    5
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTestRequest {
    pub topics: Vec<String>,
    #[serde(default = "default_question_count")]
    pub num_questions: usize,
}

#[derive(Serialize, ToSchema)]
pub struct GenerateTestResponse {
    #[schema(value_type = Vec<Object>)]
    pub questions: Vec<Question>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateFlashcardsRequest {
    pub topic: String,
    #[serde(default = "default_card_count")]
    pub num_cards: usize,
}

#[derive(Serialize, ToSchema)]
pub struct GenerateFlashcardsResponse {
    #[schema(value_type = Vec<Object>)]
    pub cards: Vec<FlashcardDraft>,
}

#[derive(Deserialize, ToSchema)]
pub struct GenerateTopicsRequest {
    pub subject: String,
}

#[derive(Serialize, ToSchema)]
pub struct GenerateTopicsResponse {
    pub topics: Vec<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct CurrentAffairsQuery {
    /// `daily`, `headlines` or `editorial`.
    #[serde(rename = "type", default = "default_kind")]
    #[param(value_type = Option<String>)]
    pub kind: FeedKind,
    /// `nextias`, `vajiram` or `all`.
    #[serde(default = "default_sources")]
    #[param(value_type = Option<String>)]
    pub source: SourceSelector,
}

fn default_kind() -> FeedKind {
    FeedKind::Daily
}

fn default_sources() -> SourceSelector {
    SourceSelector::NextIas
}

/// The scraped feed. On failure `success` is false and `data` holds placeholder items.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CurrentAffairsResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<CurrentAffairsItem>,
    pub count: usize,
    pub source: String,
    pub scraped_at: DateTime<Utc>,
}

#[derive(Deserialize, IntoParams)]
pub struct ArticleQuery {
    pub url: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ArticleResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub data: Option<ArticleContent>,
}

//=========================================================================================
// Generation Handlers
//=========================================================================================

/// Generate multi-statement MCQs on the given topics.
#[utoipa::path(
    post,
    path = "/api/generate-test",
    request_body = GenerateTestRequest,
    responses(
        (status = 200, description = "Questions generated", body = GenerateTestResponse),
        (status = 422, description = "No topics given, or the model's output was unusable"),
        (status = 502, description = "The model could not be reached")
    )
)]
pub async fn generate_test_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<GenerateTestRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if req.num_questions == 0 {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "numQuestions must be at least 1".to_string(),
        ));
    }
    let questions = app_state
        .generator
        .generate_questions(&req.topics, req.num_questions)
        .await
        .map_err(port_rejection)?;
    Ok(Json(GenerateTestResponse { questions }))
}

/// Generate flash cards on a topic without saving them.
#[utoipa::path(
    post,
    path = "/api/generate-flashcards",
    request_body = GenerateFlashcardsRequest,
    responses(
        (status = 200, description = "Cards generated", body = GenerateFlashcardsResponse),
        (status = 502, description = "The model could not be reached")
    )
)]
pub async fn generate_flashcards_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<GenerateFlashcardsRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let cards = app_state
        .generator
        .generate_flashcards(&req.topic, req.num_cards)
        .await
        .map_err(port_rejection)?;
    Ok(Json(GenerateFlashcardsResponse { cards }))
}

/// List the important syllabus topics of a subject.
#[utoipa::path(
    post,
    path = "/api/generate-topics",
    request_body = GenerateTopicsRequest,
    responses(
        (status = 200, description = "Topics generated", body = GenerateTopicsResponse),
        (status = 502, description = "The model could not be reached")
    )
)]
pub async fn generate_topics_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<GenerateTopicsRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let topics = app_state
        .generator
        .generate_topics(&req.subject)
        .await
        .map_err(port_rejection)?;
    Ok(Json(GenerateTopicsResponse { topics }))
}

//=========================================================================================
// Current Affairs Handlers
//=========================================================================================

/// Scrape the current-affairs feed. Never fails: scraping errors yield placeholder items.
#[utoipa::path(
    get,
    path = "/api/current-affairs",
    params(CurrentAffairsQuery),
    responses(
        (status = 200, description = "Scraped or placeholder items", body = CurrentAffairsResponse)
    )
)]
pub async fn current_affairs_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<CurrentAffairsQuery>,
) -> impl IntoResponse {
    let scraped_at = Utc::now();
    let response = match app_state
        .current_affairs
        .fetch_feed(query.source, query.kind)
        .await
    {
        Ok(items) => {
            let data = dedupe_and_limit(items, app_state.config.feed_limit);
            info!("Serving {} current-affairs items", data.len());
            CurrentAffairsResponse {
                success: true,
                error: None,
                count: data.len(),
                data,
                source: query.source.label().to_string(),
                scraped_at,
            }
        }
        Err(e) => {
            warn!("Current-affairs scraping failed: {}", e);
            let data = fallback_items(app_state.config.local_date(scraped_at));
            CurrentAffairsResponse {
                success: false,
                error: Some(e.to_string()),
                count: data.len(),
                data,
                source: "Mock Data (Scraping Failed)".to_string(),
                scraped_at,
            }
        }
    };
    Json(response)
}

/// Scrape one article. Scraping errors yield a placeholder article.
#[utoipa::path(
    get,
    path = "/api/article",
    params(ArticleQuery),
    responses(
        (status = 200, description = "The article, or a placeholder", body = ArticleResponse),
        (status = 400, description = "No URL given", body = ArticleResponse)
    )
)]
pub async fn article_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ArticleQuery>,
) -> impl IntoResponse {
    let Some(url) = query.url.filter(|u| !u.trim().is_empty()) else {
        let response = ArticleResponse {
            success: false,
            error: Some("Article URL is required".to_string()),
            data: None,
        };
        return (StatusCode::BAD_REQUEST, Json(response));
    };

    let response = match app_state.current_affairs.fetch_article(&url).await {
        Ok(article) => ArticleResponse {
            success: true,
            error: None,
            data: Some(article),
        },
        Err(e) => {
            warn!("Article scraping failed for {}: {}", url, e);
            ArticleResponse {
                success: false,
                error: Some(e.to_string()),
                data: Some(fallback_article(Utc::now())),
            }
        }
    };
    (StatusCode::OK, Json(response))
}
