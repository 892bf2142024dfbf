use {
    axum::{
        http::StatusCode,
        response::{IntoResponse, Json, Response},
    },
    relay_dispatch::DispatchError,
};

pub const NOT_READY_MESSAGE: &str = "channel not ready";

/// Errors surfaced synchronously to HTTP callers. Body: `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    NotReady(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    #[must_use]
    pub fn internal(message: impl std::fmt::Display) -> Self {
        Self::Internal(message.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::NotReady { .. } | DispatchError::ChannelUnavailable => {
                Self::NotReady(NOT_READY_MESSAGE.into())
            },
            DispatchError::ShuttingDown => Self::NotReady("dispatcher shutting down".into()),
            DispatchError::TaskNotFound { .. } => Self::NotFound("task not found"),
            other => Self::internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(ref message) = self {
            tracing::error!(error = %message, "request failed");
        }
        (
            self.status(),
            Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, relay_dispatch::SessionState};

    #[test]
    fn dispatch_errors_map_to_statuses() {
        let not_ready: ApiError = DispatchError::NotReady {
            state: SessionState::AwaitingAuthentication,
        }
        .into();
        assert_eq!(not_ready.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(not_ready.to_string(), NOT_READY_MESSAGE);

        let missing: ApiError = DispatchError::task_not_found("abc").into();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let closed: ApiError = DispatchError::ShuttingDown.into();
        assert_eq!(closed.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn response_body_carries_the_display_message() {
        let response = ApiError::validation("fields 'to' and 'text' are required").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "fields 'to' and 'text' are required");
    }
}
