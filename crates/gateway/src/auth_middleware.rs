use {
    axum::{
        body::Body,
        extract::State,
        http::{Request, header},
        middleware::Next,
        response::{IntoResponse, Response},
    },
    secrecy::ExposeSecret,
    tracing::debug,
};

use crate::{error::ApiError, server::AppState};

pub const MISSING_TOKEN: &str = "authorization token not provided";
pub const MALFORMED_TOKEN: &str = "invalid token format";
pub const INVALID_TOKEN: &str = "invalid token";

/// Reject requests without `Authorization: Bearer <token>` matching the
/// configured token.
pub async fn require_bearer(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .map(|v| v.to_str().unwrap_or_default());

    match check_bearer(header, state.gateway.token.expose_secret()) {
        Ok(()) => next.run(request).await,
        Err(reason) => {
            debug!(path = %request.uri().path(), reason, "rejected unauthenticated request");
            ApiError::Unauthorized(reason).into_response()
        },
    }
}

/// Validate an `Authorization` header value against `expected`.
pub fn check_bearer(header: Option<&str>, expected: &str) -> Result<(), &'static str> {
    let Some(header) = header.filter(|h| !h.is_empty()) else {
        return Err(MISSING_TOKEN);
    };
    let Some(token) = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
    else {
        return Err(MALFORMED_TOKEN);
    };
    if constant_time_eq(token, expected) {
        Ok(())
    } else {
        Err(INVALID_TOKEN)
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}
