use std::time::Duration;

use {
    anyhow::{Context, Result},
    relay_config::ChannelKind,
    relay_whatsapp::{LoginOutcome, interactive_login},
};

use crate::config_commands::{CliOverrides, resolve_config};

/// Open a visible browser so the operator can scan the QR code once.
pub async fn handle_login(overrides: &CliOverrides, timeout: Duration) -> Result<()> {
    let (config, _) = resolve_config(overrides)?;
    if config.channel.kind != ChannelKind::WhatsappWeb {
        anyhow::bail!(
            "login only applies to the whatsapp_web channel (configured: {})",
            config.channel.kind.as_str()
        );
    }

    eprintln!(
        "Opening WhatsApp Web with profile {}.\nScan the QR code within {}s.",
        config.channel.profile_dir.display(),
        timeout.as_secs()
    );

    match interactive_login(&config.channel, timeout)
        .await
        .context("interactive login")?
    {
        LoginOutcome::LoggedIn => {
            eprintln!("Logged in. The gateway can now run headless with this profile.");
            Ok(())
        },
        LoginOutcome::TimedOut => {
            anyhow::bail!("login not completed within {}s", timeout.as_secs())
        },
    }
}
