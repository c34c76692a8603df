pub mod countdown_task;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod study;
pub mod ws_handler;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

// Re-export the main WebSocket handler and the identity middleware
// for the binary that builds the web server.
pub use middleware::require_user;
pub use ws_handler::ws_handler;

use state::AppState;

/// Builds every API route. CORS and the Swagger UI are layered on by the binary.
pub fn app_router(app_state: Arc<AppState>) -> Router {
    // Public routes (no identity required)
    let public_routes = Router::new()
        .route("/api/generate-test", post(rest::generate_test_handler))
        .route("/api/generate-flashcards", post(rest::generate_flashcards_handler))
        .route("/api/generate-topics", post(rest::generate_topics_handler))
        .route("/api/current-affairs", get(rest::current_affairs_handler))
        .route("/api/article", get(rest::article_handler));

    // Per-user routes
    let protected_routes = Router::new()
        .route(
            "/flashcards",
            get(study::list_flashcards_handler).post(study::add_flashcard_handler),
        )
        .route("/flashcards/generate", post(study::generate_flashcards_handler))
        .route("/flashcards/{id}", delete(study::delete_flashcard_handler))
        .route(
            "/subjects",
            get(study::list_subjects_handler).post(study::add_subject_handler),
        )
        .route("/subjects/stream", get(study::subjects_stream_handler))
        .route("/subjects/{id}", delete(study::delete_subject_handler))
        .route(
            "/subjects/{id}/topics",
            post(study::add_topic_handler).put(study::replace_topics_handler),
        )
        .route(
            "/subjects/{id}/topics/generate",
            post(study::generate_subject_topics_handler),
        )
        .route("/subjects/{id}/topics/{index}", delete(study::delete_topic_handler))
        .route(
            "/subjects/{id}/topics/{index}/toggle",
            post(study::toggle_topic_handler),
        )
        .route(
            "/profile",
            get(study::get_profile_handler).put(study::set_profile_handler),
        )
        .route("/exam-date", put(study::set_exam_date_handler))
        .route("/dashboard", get(study::dashboard_handler))
        .route("/analytics", get(study::analytics_handler))
        .route("/ws/test", get(ws_handler))
        .layer(axum_middleware::from_fn(require_user));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(app_state)
}
