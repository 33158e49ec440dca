//! Direct access to the request logger from handlers.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
};

use crate::aggregator::RequestLogger;

/// Rejection used when a handler asks for the logger on a route the
/// middleware does not cover.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("request logger middleware is not installed on this route")]
pub struct MissingRequestLogger;

impl IntoResponse for MissingRequestLogger {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

impl<S> FromRequestParts<S> for RequestLogger
where
    S: Send + Sync,
{
    type Rejection = MissingRequestLogger;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestLogger>()
            .cloned()
            .ok_or(MissingRequestLogger)
    }
}
