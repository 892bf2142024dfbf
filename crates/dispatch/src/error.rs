use std::time::Duration;

use relay_channels::ChannelError;

use crate::{session::SessionState, types::TaskStatus};

pub type Result<T> = std::result::Result<T, DispatchError>;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Admission refused because the session is not `Ready`.
    #[error("channel not ready (session {state})")]
    NotReady { state: SessionState },

    #[error("dispatcher is shutting down")]
    ShuttingDown,

    #[error("task not found: {id}")]
    TaskNotFound { id: String },

    #[error("task already registered: {id}")]
    DuplicateTask { id: String },

    #[error("invalid task transition {from} -> {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("invalid pacing window: min {min:?} exceeds max {max:?}")]
    InvalidPacing { min: Duration, max: Duration },

    /// The adapter has not been constructed (bootstrap pending or failed).
    #[error("channel unavailable")]
    ChannelUnavailable,

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

impl DispatchError {
    #[must_use]
    pub fn task_not_found(id: impl Into<String>) -> Self {
        Self::TaskNotFound { id: id.into() }
    }
}
