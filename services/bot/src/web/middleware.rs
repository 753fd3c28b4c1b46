//! services/bot/src/web/middleware.rs
//!
//! Identity middleware for learner-scoped routes.

use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use lexicon_core::LearnerId;
use tracing::warn;

pub const LEARNER_HEADER: &str = "x-learner-id";

/// Middleware that reads the platform-assigned learner id from the `x-learner-id`
/// header and inserts it into the request extensions.
///
/// Requests without a usable id are answered with 401 Unauthorized.
pub async fn require_learner(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let learner_id = req
        .headers()
        .get(LEARNER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(LearnerId::from)
        .ok_or_else(|| {
            warn!("Rejected request to {} without a learner id", req.uri().path());
            StatusCode::UNAUTHORIZED
        })?;

    req.extensions_mut().insert(learner_id);
    Ok(next.run(req).await)
}
