//! One-off interactive login that stores the session in the browser profile.

use std::time::Duration;

use {
    relay_config::ChannelConfig,
    tracing::{info, warn},
};

use crate::{connector, dom, error::WhatsAppError, selectors::SEARCH_BOX};

pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    LoggedIn,
    TimedOut,
}

/// Open a visible browser on the configured profile and wait for the user to
/// scan the QR code. The browser is closed afterwards either way; the profile
/// directory keeps the session for later headless runs.
pub async fn interactive_login(
    config: &ChannelConfig,
    timeout: Duration,
) -> Result<LoginOutcome, WhatsAppError> {
    let session = connector::launch(config, false).await?;
    info!(
        timeout_secs = timeout.as_secs(),
        profile_dir = %config.profile_dir.display(),
        "scan the QR code in the browser window"
    );

    let outcome = match dom::wait_for_any(&session.page, &[SEARCH_BOX], timeout).await {
        Ok(Some(_)) => LoginOutcome::LoggedIn,
        Ok(None) => LoginOutcome::TimedOut,
        Err(e) => {
            let _ = session.shutdown().await;
            return Err(e);
        },
    };

    match outcome {
        LoginOutcome::LoggedIn => info!("login complete; session saved to profile"),
        LoginOutcome::TimedOut => warn!(timeout_secs = timeout.as_secs(), "login not completed in time"),
    }
    session.shutdown().await?;
    Ok(outcome)
}
