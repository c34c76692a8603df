//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the state of one live test connection.

use crate::{config::Config, study::LiveTest};
use prep_core::{
    domain::UserId,
    ports::{ContentGenerationService, CurrentAffairsService},
    store::StudyRepository,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: StudyRepository,
    pub config: Arc<Config>,
    pub generator: Arc<dyn ContentGenerationService>,
    pub current_affairs: Arc<dyn CurrentAffairsService>,
}

//=========================================================================================
// TestConnection (Specific to One WebSocket Connection)
//=========================================================================================

/// The state for a single live test socket.
pub struct TestConnection {
    pub user: UserId,
    /// The attempt in progress, if the client has started one.
    pub test: Option<LiveTest>,
    /// Cancels the countdown of the current attempt.
    pub countdown_token: CancellationToken,
}

impl TestConnection {
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            test: None,
            countdown_token: CancellationToken::new(),
        }
    }

    /// Installs a new attempt, stopping the countdown of the previous one.
    /// Returns the token for the new countdown.
    pub fn replace_test(&mut self, test: LiveTest) -> CancellationToken {
        self.countdown_token.cancel();
        self.countdown_token = CancellationToken::new();
        self.test = Some(test);
        self.countdown_token.clone()
    }
}
