//! WhatsApp Web channel driven through a headless Chromium over CDP.
//!
//! The browser profile directory carries the logged-in session across
//! restarts; [`login::interactive_login`] creates it.

pub mod channel;
pub mod connector;
pub mod detect;
pub mod dom;
pub mod error;
pub mod login;
pub mod selectors;
pub mod typing;

pub use {
    channel::WhatsAppWebChannel,
    connector::WhatsAppWebConnector,
    detect::{DetectionResult, detect_chrome},
    error::WhatsAppError,
    login::{DEFAULT_LOGIN_TIMEOUT, LoginOutcome, interactive_login},
    typing::TypingPacing,
};
