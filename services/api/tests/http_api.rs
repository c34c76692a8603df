use api_lib::{
    adapters::InMemoryDocumentStore,
    config::Config,
    web::{app_router, state::AppState},
};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{Days, Utc};
use prep_core::{
    domain::{
        ArticleContent, CurrentAffairsItem, FeedKind, FeedSource, FlashcardDraft, Question,
        SourceSelector,
    },
    ports::{ContentGenerationService, CurrentAffairsService, PortError, PortResult},
    store::StudyRepository,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct FakeGenerator {
    fail: bool,
}

#[async_trait]
impl ContentGenerationService for FakeGenerator {
    async fn generate_questions(&self, topics: &[String], count: usize) -> PortResult<Vec<Question>> {
        if self.fail {
            return Err(PortError::ExternalService("model unavailable".to_string()));
        }
        if topics.is_empty() {
            return Err(PortError::InvalidInput("At least one topic is required.".to_string()));
        }
        Ok((0..count)
            .map(|i| Question {
                question: format!("Consider the following statements about {}:", topics[i % topics.len()]),
                statements: vec!["One".to_string(), "Two".to_string()],
                options: vec!["1 only".to_string(), "2 only".to_string()],
                answer: "1 only".to_string(),
                explanation: String::new(),
                topic: Some(topics[i % topics.len()].clone()),
            })
            .collect())
    }

    async fn generate_flashcards(&self, topic: &str, count: usize) -> PortResult<Vec<FlashcardDraft>> {
        Ok((0..count)
            .map(|i| FlashcardDraft {
                question: format!("{} card {}", topic, i),
                answer: "answer".to_string(),
            })
            .collect())
    }

    async fn generate_topics(&self, _subject: &str) -> PortResult<Vec<String>> {
        Ok(vec!["Preamble".to_string(), "Fundamental Rights".to_string()])
    }
}

struct FakeFeed {
    fail: bool,
}

fn item(title: &str) -> CurrentAffairsItem {
    CurrentAffairsItem {
        title: title.to_string(),
        date: "2025-08-02".to_string(),
        category: "Economy".to_string(),
        kind: FeedKind::Daily,
        syllabus: None,
        context: None,
        summary: None,
        link: None,
        source: FeedSource::NextIas,
    }
}

#[async_trait]
impl CurrentAffairsService for FakeFeed {
    async fn fetch_feed(&self, _: SourceSelector, _: FeedKind) -> PortResult<Vec<CurrentAffairsItem>> {
        if self.fail {
            return Err(PortError::ExternalService("HTTP 503".to_string()));
        }
        Ok(vec![item("GDP data"), item("Monsoon"), item("GDP data")])
    }

    async fn fetch_article(&self, _url: &str) -> PortResult<ArticleContent> {
        Err(PortError::ExternalService("HTTP 404".to_string()))
    }
}

fn app(generator_fails: bool, feed_fails: bool) -> Router {
    let state = Arc::new(AppState {
        repo: StudyRepository::new(Arc::new(InMemoryDocumentStore::new())),
        config: Arc::new(Config::default()),
        generator: Arc::new(FakeGenerator { fail: generator_fails }),
        current_affairs: Arc::new(FakeFeed { fail: feed_fails }),
    });
    app_router(state)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user-id", "candidate-1")
        .header("content-type", "application/json");
    let body = body.map_or_else(Body::empty, |b| Body::from(b.to_string()));
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn user_routes_require_an_identity() {
    let app = app(false, false);
    let request = Request::builder().uri("/flashcards").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn generate_test_returns_questions_or_a_gateway_error() {
    let (status, body) = send(
        &app(false, false),
        "POST",
        "/api/generate-test",
        Some(json!({"topics": ["Polity"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["questions"].as_array().unwrap().len(), 10);

    let (status, _) = send(
        &app(true, false),
        "POST",
        "/api/generate-test",
        Some(json!({"topics": ["Polity"], "numQuestions": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (status, _) = send(
        &app(false, false),
        "POST",
        "/api/generate-test",
        Some(json!({"topics": []})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn current_affairs_are_deduplicated() {
    let (status, body) = send(&app(false, false), "GET", "/api/current-affairs?type=daily&source=all", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["count"], json!(2));
    assert_eq!(body["source"], json!("Multiple Sources"));
}

#[tokio::test]
async fn failed_scrapes_fall_back_to_placeholders() {
    let app = app(false, true);
    let (status, body) = send(&app, "GET", "/api/current-affairs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["count"], json!(2));
    assert!(body["error"].as_str().unwrap().contains("503"));

    let (status, body) = send(&app, "GET", "/api/article?url=https://www.nextias.com/ca/x", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], json!("Article Not Available"));

    let (status, _) = send(&app, "GET", "/api/article", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn flashcards_can_be_added_listed_and_deleted() {
    let app = app(false, false);
    let (status, card) = send(
        &app,
        "POST",
        "/flashcards",
        Some(json!({"topic": "Polity", "question": "Article 21?", "answer": "Right to life"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = card["id"].as_str().unwrap().to_string();

    let (status, cards) = send(
        &app,
        "POST",
        "/flashcards/generate",
        Some(json!({"topic": "Economy", "numCards": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(cards.as_array().unwrap().len(), 2);

    let (_, groups) = send(&app, "GET", "/flashcards", None).await;
    let groups = groups.as_array().unwrap().clone();
    assert_eq!(groups.len(), 2);
    let economy = groups.iter().find(|g| g["topic"] == json!("Economy")).unwrap();
    assert_eq!(economy["cards"].as_array().unwrap().len(), 2);

    let (status, _) = send(&app, "DELETE", &format!("/flashcards/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, groups) = send(&app, "GET", "/flashcards", None).await;
    assert_eq!(groups.as_array().unwrap().len(), 1);
    assert_eq!(groups[0]["topic"], json!("Economy"));
}

#[tokio::test]
async fn completing_a_topic_starts_a_streak() {
    let app = app(false, false);
    let today = Config::default().local_date(Utc::now());
    let (status, subject) = send(
        &app,
        "POST",
        "/subjects",
        Some(json!({
            "name": "Polity",
            "start": "09:00",
            "end": "11:00",
            "startDate": today.checked_sub_days(Days::new(1)).unwrap(),
            "endDate": today.checked_add_days(Days::new(30)).unwrap(),
            "topics": ["Preamble"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = subject["id"].as_str().unwrap().to_string();

    let (status, toggled) = send(&app, "POST", &format!("/subjects/{id}/topics/0/toggle"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(toggled["streak"], json!(1));
    assert_eq!(toggled["subject"]["topics"][0]["completed"], json!(true));

    let (status, _) = send(&app, "POST", &format!("/subjects/{id}/topics/5/toggle"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, dashboard) = send(&app, "GET", "/dashboard", None).await;
    assert_eq!(dashboard["streak"], json!(1));
    assert_eq!(dashboard["activeSubjects"][0]["name"], json!("Polity"));
    assert_eq!(dashboard["examDate"], Value::Null);

    let (status, subject) = send(&app, "POST", &format!("/subjects/{id}/topics/generate"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(subject["topics"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn profile_feeds_the_dashboard() {
    let app = app(false, false);
    let (status, body) = send(&app, "GET", "/profile", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"name": null, "examDate": null, "motivation": null}));

    let today = Config::default().local_date(Utc::now());
    let exam = today.checked_add_days(Days::new(30)).unwrap();
    let (status, saved) = send(
        &app,
        "PUT",
        "/profile",
        Some(json!({"name": " Asha ", "examDate": exam, "motivation": "Remember your goal!"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["name"], json!("Asha"));

    let (_, dashboard) = send(&app, "GET", "/dashboard", None).await;
    assert_eq!(dashboard["name"], json!("Asha"));
    assert_eq!(dashboard["motivation"], json!("Remember your goal!"));
    assert_eq!(dashboard["daysToExam"], json!(30));

    let (status, _) = send(&app, "PUT", "/profile", Some(json!({"examDate": "next june"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, cleared) = send(&app, "PUT", "/profile", Some(json!({"name": "Asha", "examDate": ""}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cleared["examDate"], Value::Null);
}

#[tokio::test]
async fn analytics_are_empty_before_any_test() {
    let (status, body) = send(&app(false, false), "GET", "/analytics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["history"], json!([]));
    assert_eq!(body["overall"], Value::Null);
}
