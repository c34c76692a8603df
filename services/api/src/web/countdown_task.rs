//! services/api/src/web/countdown_task.rs
//!
//! This module contains the asynchronous "worker" function that drives the
//! countdown of a live test and submits it when time runs out.

use crate::web::{
    protocol::ServerMessage,
    state::TestConnection,
    ws_handler::{send_message, watch_writes, WsSender},
};
use chrono::Utc;
use prep_core::session::Tick;
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Ticks the current attempt once per second until it is submitted or the
/// token is cancelled.
pub async fn countdown_process(
    connection: Arc<Mutex<TestConnection>>,
    ws_sender: WsSender,
    cancellation_token: CancellationToken,
) {
    info!("Countdown started.");
    let mut interval = tokio::time::interval(TICK_INTERVAL);
    // The first tick of an interval completes immediately.
    interval.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => {
                info!("Countdown cancelled.");
                return;
            }
            _ = interval.tick() => {}
        }

        let mut conn = connection.lock().await;
        // The attempt may have been replaced while we waited for the lock.
        if cancellation_token.is_cancelled() {
            return;
        }
        let Some(test) = conn.test.as_mut() else {
            return;
        };

        match test.tick() {
            Tick::Running(remaining_seconds) => {
                if !send_message(&ws_sender, ServerMessage::Tick { remaining_seconds }) {
                    warn!("Failed to send tick. Ending countdown.");
                    return;
                }
            }
            Tick::Expired(_) => {
                info!("Time is up for test {}.", test.test_id());
                let outcome = test.submit(Utc::now());
                watch_writes(outcome.writes, ws_sender.clone());
                let msg = ServerMessage::Submitted {
                    analytics: outcome.analytics,
                    score: outcome.score,
                    time_taken: outcome.time_taken,
                    expired: true,
                };
                send_message(&ws_sender, msg);
                return;
            }
            Tick::Idle => return,
        }
    }
}
