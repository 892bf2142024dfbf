//! `POST /rest/sendMessage/{instance}/{text,image}`.

use {
    axum::{
        extract::{Path, State},
        response::Json,
    },
    bytes::Bytes,
    relay_dispatch::Admission,
    serde::{Deserialize, Serialize},
    tracing::debug,
};

use crate::{error::ApiError, server::AppState};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(default)]
    pub message_data: MessageData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageData {
    pub to: Option<String>,
    pub text: Option<String>,
    pub image_url: Option<String>,
    pub caption: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub task_id: String,
    pub queue_position: usize,
}

impl SendMessageResponse {
    fn queued(message: &'static str, admission: Admission) -> Self {
        Self {
            status: "success",
            message,
            task_id: admission.task_id.to_string(),
            queue_position: admission.queue_position,
        }
    }
}

/// Parse the body ourselves so malformed JSON yields our 400 shape.
fn parse_body(body: &[u8]) -> Result<MessageData, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(MessageData::default());
    }
    serde_json::from_slice::<SendMessageRequest>(body)
        .map(|req| req.message_data)
        .map_err(|e| ApiError::validation(format!("invalid request body: {e}")))
}

fn required(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub async fn send_text_handler(
    State(state): State<AppState>,
    Path(instance): Path<String>,
    body: Bytes,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let data = parse_body(&body)?;
    // Text is sent as given; only the address is trimmed.
    let text = data.text.as_deref().filter(|t| !t.trim().is_empty());
    let (Some(to), Some(text)) = (required(data.to.as_deref()), text) else {
        return Err(ApiError::validation("fields 'to' and 'text' are required"));
    };
    debug!(instance = %instance, to, "text send requested");

    let admission = state.gateway.engine.submit_text(to, text)?;
    Ok(Json(SendMessageResponse::queued("message queued", admission)))
}

pub async fn send_image_handler(
    State(state): State<AppState>,
    Path(instance): Path<String>,
    body: Bytes,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let data = parse_body(&body)?;
    let (Some(to), Some(image_url)) = (
        required(data.to.as_deref()),
        required(data.image_url.as_deref()),
    ) else {
        return Err(ApiError::validation("fields 'to' and 'imageUrl' are required"));
    };
    let caption = required(data.caption.as_deref());
    debug!(instance = %instance, to, image_url, "image send requested");

    let admission = state.gateway.engine.submit_image(to, image_url, caption)?;
    Ok(Json(SendMessageResponse::queued("image queued", admission)))
}
