//! services/api/src/web/middleware.rs
//!
//! Identity middleware for protecting routes.

use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use prep_core::domain::UserId;
use tracing::warn;

/// The header the identity proxy sets to the verified user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Middleware that reads the caller's verified id and exposes it to handlers.
///
/// If present, inserts a `UserId` into request extensions.
/// If missing or blank, returns 401 Unauthorized.
pub async fn require_user(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let user_id = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && !id.contains('/'))
        .map(UserId::new)
        .ok_or_else(|| {
            warn!("Rejected {} without a user id", req.uri().path());
            StatusCode::UNAUTHORIZED
        })?;

    req.extensions_mut().insert(user_id);
    Ok(next.run(req).await)
}
