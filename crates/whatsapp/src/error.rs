use {chromiumoxide::error::CdpError, relay_channels::ChannelError, thiserror::Error};

#[derive(Debug, Error)]
pub enum WhatsAppError {
    #[error("Chrome/Chromium not found\n\n{hint}")]
    BrowserNotFound { hint: String },

    #[error("browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("browser is closed")]
    Closed,

    #[error("element not found: {selector}")]
    ElementNotFound { selector: String },

    #[error("JavaScript evaluation failed: {0}")]
    JsEvalFailed(String),

    #[error("failed to download image: {0}")]
    Download(String),

    #[error("CDP error: {0}")]
    Cdp(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl WhatsAppError {
    #[must_use]
    pub fn element_not_found(selector: impl Into<String>) -> Self {
        Self::ElementNotFound {
            selector: selector.into(),
        }
    }
}

impl From<CdpError> for WhatsAppError {
    fn from(err: CdpError) -> Self {
        Self::Cdp(err.to_string())
    }
}

impl From<WhatsAppError> for ChannelError {
    fn from(err: WhatsAppError) -> Self {
        match err {
            WhatsAppError::BrowserNotFound { .. }
            | WhatsAppError::LaunchFailed(_)
            | WhatsAppError::Closed => ChannelError::unavailable(err),
            WhatsAppError::Download(_) => ChannelError::transport(err),
            WhatsAppError::Io(source) => ChannelError::external("temporary image file", source),
            WhatsAppError::ElementNotFound { .. }
            | WhatsAppError::JsEvalFailed(_)
            | WhatsAppError::Cdp(_) => ChannelError::failure(err),
        }
    }
}
