use std::error::Error as StdError;

/// Crate-wide result type for channel operations.
pub type Result<T> = std::result::Result<T, ChannelError>;

/// Typed channel errors returned by adapter operations.
///
/// A send never panics or throws past the adapter boundary: every failure
/// mode is one of these variants, and the dispatcher records it on the task.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The destination could not be located in the remote client.
    #[error("contact not found: {address}")]
    ContactNotFound { address: String },

    /// Fetching or uploading a payload (e.g. an image URL) failed.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The remote client rejected or broke the interaction.
    #[error("channel failure: {message}")]
    Failure { message: String },

    /// An adapter operation exceeded its time bound.
    #[error("channel operation timed out: {operation}")]
    Timeout { operation: String },

    /// The channel has not been opened or was already closed.
    #[error("channel unavailable: {message}")]
    Unavailable { message: String },

    /// Wrapped source error from an external dependency.
    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl ChannelError {
    #[must_use]
    pub fn contact_not_found(address: impl Into<String>) -> Self {
        Self::ContactNotFound {
            address: address.into(),
        }
    }

    #[must_use]
    pub fn transport(message: impl std::fmt::Display) -> Self {
        Self::Transport {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn failure(message: impl std::fmt::Display) -> Self {
        Self::Failure {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    #[must_use]
    pub fn unavailable(message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Stable snake_case tag, used as a metrics label and in task results.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ContactNotFound { .. } => "contact_not_found",
            Self::Transport { .. } => "transport",
            Self::Failure { .. } | Self::External { .. } => "channel_failure",
            Self::Timeout { .. } => "timeout",
            Self::Unavailable { .. } => "unavailable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_are_stable() {
        assert_eq!(
            ChannelError::contact_not_found("5511").kind(),
            "contact_not_found"
        );
        assert_eq!(ChannelError::transport("x").kind(), "transport");
        assert_eq!(ChannelError::timeout("send_text").kind(), "timeout");
        let io = std::io::Error::other("boom");
        assert_eq!(
            ChannelError::external("open page", io).kind(),
            "channel_failure"
        );
    }

    #[test]
    fn contact_not_found_message_names_the_address() {
        let err = ChannelError::contact_not_found("5511999999999");
        assert_eq!(err.to_string(), "contact not found: 5511999999999");
    }
}
