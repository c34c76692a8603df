//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the API server
//! for a live test.

use chrono::NaiveDate;
use prep_core::{
    analytics::AnalyticsResult,
    domain::Question,
    session::{DisplayStatus, IgnoreReason, StatusSummary},
};
use serde::{Deserialize, Serialize};

use crate::study::LiveTest;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

fn default_question_count() -> usize {
    10
}

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Generates questions on `topics` and starts a new attempt.
    StartTest {
        topics: Vec<String>,
        #[serde(default = "default_question_count")]
        num_questions: usize,
    },

    /// Starts another attempt at a stored test. Without `date_key` the test
    /// is looked up under today.
    RetakeTest {
        test_id: String,
        #[serde(default)]
        date_key: Option<NaiveDate>,
    },

    Navigate { index: usize },

    SelectAnswer { index: usize, option: String },

    ToggleReview { index: usize },

    ClearResponse { index: usize },

    Submit,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// The client-visible state of an attempt.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SessionView {
    pub current: usize,
    pub answers: Vec<Option<String>>,
    pub statuses: Vec<DisplayStatus>,
    pub summary: StatusSummary,
    pub remaining_seconds: u32,
    pub submitted: bool,
}

impl SessionView {
    pub fn of(test: &LiveTest) -> Self {
        let session = test.session();
        Self {
            current: session.current(),
            answers: session.answers().to_vec(),
            statuses: session.display_statuses(),
            summary: session.summary(),
            remaining_seconds: session.remaining_seconds(),
            submitted: session.is_submitted(),
        }
    }
}

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A new attempt is running; sent once per start or retake.
    TestStarted {
        test_id: String,
        questions: Vec<Question>,
        duration_seconds: u32,
        retake_count: u32,
        session: SessionView,
    },

    /// The attempt changed in response to a client message.
    SessionUpdated { session: SessionView },

    /// The message was valid but changed nothing.
    Ignored { reason: IgnoreReason },

    /// One second of the countdown elapsed.
    Tick { remaining_seconds: u32 },

    /// The attempt was scored, either on request or because time ran out.
    Submitted {
        analytics: AnalyticsResult,
        score: f64,
        time_taken: u32,
        expired: bool,
    },

    /// Saving part of the attempt failed. The attempt itself is unaffected.
    PersistenceWarning { message: String },

    /// Reports an error to the client, which should display an error message.
    Error { message: String },
}
