use std::sync::Arc;

use {
    anyhow::{Context, Result},
    relay_channels::{ChannelConnector, MemoryChannel, MemoryConnector},
    relay_config::{ChannelKind, RelayConfig},
    relay_dispatch::{DispatchEngine, EngineConfig, ShutdownMode},
    relay_gateway::{GatewayState, start_gateway},
    relay_whatsapp::WhatsAppWebConnector,
    tracing::{info, warn},
};

use crate::config_commands::{CliOverrides, ensure_valid, resolve_config};

pub async fn run_gateway(overrides: &CliOverrides, abandon_on_shutdown: bool) -> Result<()> {
    let (config, path) = resolve_config(overrides)?;
    ensure_valid(&config)?;

    let token = config
        .auth
        .token
        .clone()
        .context("auth.token must be set (config file or BEARER_TOKEN)")?;

    let engine_config = EngineConfig::from_config(&config).context("dispatch settings")?;
    let connector = build_connector(&config);
    let engine = Arc::new(DispatchEngine::start(engine_config.clone(), connector));
    let state = build_state(&config, engine, token)?;

    print_banner(&config, path.as_deref(), &engine_config);

    let mode = if abandon_on_shutdown {
        ShutdownMode::Abandon
    } else {
        ShutdownMode::Drain
    };
    start_gateway(&config.server.bind, config.server.port, state, mode).await
}

fn build_connector(config: &RelayConfig) -> Arc<dyn ChannelConnector> {
    match config.channel.kind {
        ChannelKind::WhatsappWeb => Arc::new(WhatsAppWebConnector::new(config.channel.clone())),
        ChannelKind::Memory => {
            warn!("using the in-memory channel; nothing will be delivered");
            Arc::new(MemoryConnector::new(MemoryChannel::new()))
        },
    }
}

#[cfg(feature = "metrics")]
fn build_state(
    config: &RelayConfig,
    engine: Arc<DispatchEngine>,
    token: secrecy::Secret<String>,
) -> Result<Arc<GatewayState>> {
    let handle = relay_metrics::init_metrics(relay_metrics::MetricsRecorderConfig {
        enabled: config.metrics.enabled,
        global_labels: vec![(
            "channel".to_string(),
            config.channel.kind.as_str().to_string(),
        )],
    })
    .context("installing metrics recorder")?;
    Ok(GatewayState::with_metrics(engine, token, handle))
}

#[cfg(not(feature = "metrics"))]
fn build_state(
    config: &RelayConfig,
    engine: Arc<DispatchEngine>,
    token: secrecy::Secret<String>,
) -> Result<Arc<GatewayState>> {
    if config.metrics.enabled {
        info!("metrics requested but this build has no metrics support");
    }
    Ok(GatewayState::new(engine, token))
}

fn print_banner(
    config: &RelayConfig,
    path: Option<&std::path::Path>,
    engine: &EngineConfig,
) {
    let lines = [
        format!("relay gateway v{}", env!("CARGO_PKG_VERSION")),
        format!(
            "listening on http://{}:{}",
            config.server.bind, config.server.port
        ),
        format!(
            "config: {}",
            path.map_or_else(|| "(defaults)".to_string(), |p| p.display().to_string())
        ),
        format!(
            "channel: {} (headless: {})",
            config.channel.kind.as_str(),
            config.channel.headless
        ),
        format!(
            "pacing: {}-{}s between sends",
            engine.pacing.min().as_secs(),
            engine.pacing.max().as_secs()
        ),
    ];
    let width = lines.iter().map(String::len).max().unwrap_or(0) + 4;
    info!("┌{}┐", "─".repeat(width));
    for line in &lines {
        info!("│  {:<w$}│", line, w = width - 2);
    }
    info!("└{}┘", "─".repeat(width));
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn memory_kind_builds_memory_connector() {
        let mut config = RelayConfig::default();
        config.channel.kind = ChannelKind::Memory;
        assert_eq!(build_connector(&config).kind(), "memory");
    }

    #[test]
    fn default_kind_builds_browser_connector() {
        let config = RelayConfig::default();
        assert_eq!(build_connector(&config).kind(), "whatsapp_web");
    }
}
