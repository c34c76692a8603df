//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a live test connection.
//! It applies client messages to the attempt and delegates the countdown.

use crate::{
    study::{LiveTest, WriteHandle},
    web::{
        countdown_task::countdown_process,
        protocol::{ClientMessage, ServerMessage, SessionView},
        state::{AppState, TestConnection},
    },
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use chrono::Utc;
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use prep_core::{domain::UserId, session::Mutation};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

/// The outbound queue of a socket, shared with the countdown and write watchers.
pub type WsSender = mpsc::UnboundedSender<ServerMessage>;

/// Queues one message for the client. Returns false when the client is gone.
pub fn send_message(ws_sender: &WsSender, msg: ServerMessage) -> bool {
    ws_sender.send(msg).is_ok()
}

/// Serialises queued messages onto the socket until either side goes away.
async fn forward_messages(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbox: mpsc::UnboundedReceiver<ServerMessage>,
) {
    while let Some(msg) = outbox.recv().await {
        let json = match serde_json::to_string(&msg) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialise server message: {}", e);
                continue;
            }
        };
        if sink.send(Message::Text(json.into())).await.is_err() {
            warn!("Client went away while sending.");
            break;
        }
    }
}

/// Reports failed background writes to the client without blocking it.
pub fn watch_writes(writes: Vec<WriteHandle>, ws_sender: WsSender) {
    if writes.is_empty() {
        return;
    }
    tokio::spawn(async move {
        for write in writes {
            let failure = match write.await {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(e) => e.to_string(),
            };
            let msg = ServerMessage::PersistenceWarning {
                message: format!("Your progress could not be saved: {}", failure),
            };
            if !send_message(&ws_sender, msg) {
                break;
            }
        }
    });
}

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, user))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user: UserId) {
    info!("New test connection established for user: {}", user);

    let (sink, mut receiver) = socket.split();
    let (ws_sender, outbox) = mpsc::unbounded_channel();
    tokio::spawn(forward_messages(sink, outbox));
    let connection = Arc::new(Mutex::new(TestConnection::new(user)));

    // --- Main Message Loop ---
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                handle_text_message(text.as_str(), &app_state, &connection, &ws_sender).await;
            }
            Message::Close(_) => {
                info!("Client sent close message.");
                break;
            }
            _ => {}
        }
    }

    // --- Cleanup ---
    connection.lock().await.countdown_token.cancel();
    info!("Test connection closed.");
}

/// Helper function to handle the logic for different `ClientMessage` variants.
async fn handle_text_message(
    text: &str,
    app_state: &Arc<AppState>,
    connection: &Arc<Mutex<TestConnection>>,
    ws_sender: &WsSender,
) {
    let client_msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            let msg = ServerMessage::Error {
                message: format!("Unrecognised message: {}", e),
            };
            send_message(ws_sender, msg);
            return;
        }
    };

    let reply = match client_msg {
        ClientMessage::StartTest {
            topics,
            num_questions,
        } => start_test(app_state, connection, ws_sender, topics, num_questions).await,
        ClientMessage::RetakeTest { test_id, date_key } => {
            retake_test(app_state, connection, ws_sender, test_id, date_key).await
        }
        other => apply_to_test(connection, ws_sender, other).await,
    };
    send_message(ws_sender, reply);
}

fn error_message(message: impl Into<String>) -> ServerMessage {
    ServerMessage::Error {
        message: message.into(),
    }
}

//=========================================================================================
// Starting an attempt
//=========================================================================================

async fn start_test(
    app_state: &Arc<AppState>,
    connection: &Arc<Mutex<TestConnection>>,
    ws_sender: &WsSender,
    topics: Vec<String>,
    num_questions: usize,
) -> ServerMessage {
    let topics: Vec<String> = topics
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if topics.is_empty() || num_questions == 0 {
        return error_message("Choose at least one topic and one question.");
    }

    let questions = match app_state.generator.generate_questions(&topics, num_questions).await {
        Ok(questions) => questions,
        Err(e) => {
            error!("Failed to generate questions: {}", e);
            return error_message(format!("Failed to generate test: {}", e));
        }
    };

    let user = connection.lock().await.user.clone();
    let duration = app_state.config.test_duration(questions.len());
    let today = app_state.config.local_date(Utc::now());
    match LiveTest::start(app_state.repo.clone(), user, questions, topics, duration, today) {
        Ok(test) => install(connection, ws_sender, test).await,
        Err(e) => error_message(e.to_string()),
    }
}

async fn retake_test(
    app_state: &Arc<AppState>,
    connection: &Arc<Mutex<TestConnection>>,
    ws_sender: &WsSender,
    test_id: String,
    date_key: Option<chrono::NaiveDate>,
) -> ServerMessage {
    let user = connection.lock().await.user.clone();
    let today = app_state.config.local_date(Utc::now());
    let stored = match app_state
        .repo
        .load_test(&user, date_key.unwrap_or(today), &test_id)
        .await
    {
        Ok(stored) => stored,
        Err(e) => {
            warn!("Failed to load test {} for retake: {}", test_id, e);
            return error_message(format!("Failed to load test: {}", e));
        }
    };

    let duration = app_state.config.test_duration(stored.questions.len());
    match LiveTest::retake(app_state.repo.clone(), user, test_id, stored, duration, today) {
        Ok(test) => install(connection, ws_sender, test).await,
        Err(e) => error_message(e.to_string()),
    }
}

/// Makes `test` the connection's attempt and starts its countdown.
async fn install(
    connection: &Arc<Mutex<TestConnection>>,
    ws_sender: &WsSender,
    test: LiveTest,
) -> ServerMessage {
    let started = ServerMessage::TestStarted {
        test_id: test.test_id().to_string(),
        questions: test.session().questions().to_vec(),
        duration_seconds: test.session().duration_seconds(),
        retake_count: test.retake_count(),
        session: SessionView::of(&test),
    };

    let token = connection.lock().await.replace_test(test);
    let connection = connection.clone();
    let ws_sender = ws_sender.clone();
    tokio::spawn(countdown_process(connection, ws_sender, token));
    started
}

//=========================================================================================
// Applying messages to the running attempt
//=========================================================================================

async fn apply_to_test(
    connection: &Arc<Mutex<TestConnection>>,
    ws_sender: &WsSender,
    msg: ClientMessage,
) -> ServerMessage {
    let mut conn = connection.lock().await;
    let conn = &mut *conn;
    let Some(test) = conn.test.as_mut() else {
        return error_message("No test is in progress.");
    };

    let (outcome, writes) = match msg {
        ClientMessage::Navigate { index } => match test.navigate(index) {
            Ok(writes) => (Mutation::Applied, writes),
            Err(e) => return error_message(e.to_string()),
        },
        ClientMessage::SelectAnswer { index, option } => test.select_answer(index, &option),
        ClientMessage::ToggleReview { index } => test.toggle_review(index),
        ClientMessage::ClearResponse { index } => test.clear_response(index),
        ClientMessage::Submit => {
            conn.countdown_token.cancel();
            let outcome = test.submit(Utc::now());
            watch_writes(outcome.writes, ws_sender.clone());
            return ServerMessage::Submitted {
                analytics: outcome.analytics,
                score: outcome.score,
                time_taken: outcome.time_taken,
                expired: false,
            };
        }
        ClientMessage::StartTest { .. } | ClientMessage::RetakeTest { .. } => {
            return error_message("Unexpected message.");
        }
    };

    watch_writes(writes, ws_sender.clone());
    match outcome {
        Mutation::Applied => ServerMessage::SessionUpdated {
            session: SessionView::of(test),
        },
        Mutation::Ignored(reason) => ServerMessage::Ignored { reason },
    }
}
