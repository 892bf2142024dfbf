//! Task records and their status lifecycle.

use std::{borrow::Borrow, fmt};

use {
    chrono::{DateTime, Utc},
    relay_channels::SendReceipt,
    serde::{Deserialize, Serialize},
};

use crate::error::{DispatchError, Result};

/// Opaque task identifier, unique for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Fresh random (v4) identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for TaskId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Text,
    Image,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
        }
    }
}

/// Message content. Flattened into the task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskPayload {
    Text {
        text: String,
    },
    Image {
        image_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
}

impl TaskPayload {
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::Text { .. } => TaskKind::Text,
            Self::Image { .. } => TaskKind::Image,
        }
    }
}

/// `queued -> processing -> {sent | error}`. Nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Processing,
    Sent,
    Error,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Sent => "sent",
            Self::Error => "error",
        }
    }

    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Processing)
                | (Self::Processing, Self::Sent)
                | (Self::Processing, Self::Error)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Error)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome reported back to polling clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub to: String,
    #[serde(flatten)]
    pub payload: TaskPayload,
    pub status: TaskStatus,
    /// Queue depth at admission, counting this task.
    pub position: usize,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub result: Option<DeliveryResult>,
}

impl Task {
    pub fn new(to: impl Into<String>, payload: TaskPayload) -> Self {
        Self {
            id: TaskId::generate(),
            kind: payload.kind(),
            to: to.into(),
            payload,
            status: TaskStatus::Queued,
            position: 0,
            queued_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
            result: None,
        }
    }

    pub fn text(to: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(to, TaskPayload::Text { text: text.into() })
    }

    pub fn image(
        to: impl Into<String>,
        image_url: impl Into<String>,
        caption: Option<String>,
    ) -> Self {
        Self::new(
            to,
            TaskPayload::Image {
                image_url: image_url.into(),
                caption,
            },
        )
    }

    fn transition(&mut self, next: TaskStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(DispatchError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn mark_processing(&mut self) -> Result<()> {
        self.transition(TaskStatus::Processing)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_sent(&mut self, receipt: &SendReceipt) -> Result<()> {
        self.transition(TaskStatus::Sent)?;
        self.completed_at = Some(Utc::now());
        self.result = Some(DeliveryResult {
            success: true,
            to: Some(receipt.to.clone()),
            error: None,
        });
        Ok(())
    }

    pub fn mark_error(&mut self, reason: impl Into<String>) -> Result<()> {
        self.transition(TaskStatus::Error)?;
        let reason = reason.into();
        self.completed_at = Some(Utc::now());
        self.error = Some(reason.clone());
        self.result = Some(DeliveryResult {
            success: false,
            to: None,
            error: Some(reason),
        });
        Ok(())
    }
}
