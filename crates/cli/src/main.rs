mod config_commands;
mod gateway_commands;
mod login_commands;

use std::{path::PathBuf, time::Duration};

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use crate::config_commands::{CliOverrides, ConfigAction};

#[derive(Parser)]
#[command(name = "relay", about = "HTTP gateway relaying messages to WhatsApp Web")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (default: ./relay.toml, then the user config directory).
    #[arg(long, global = true, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,
    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Port to listen on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Run the browser headless (overrides config value).
    #[arg(long, global = true)]
    headless: Option<bool>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server (default when no subcommand is provided).
    Gateway {
        /// Mark still-queued tasks as errors on shutdown instead of sending them.
        #[arg(long, default_value_t = false)]
        abandon_on_shutdown: bool,
    },
    /// Open a visible browser and scan the QR code to store a session.
    Login {
        #[arg(long, default_value_t = relay_whatsapp::DEFAULT_LOGIN_TIMEOUT.as_secs())]
        timeout_secs: u64,
    },
    /// Configuration inspection.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            config: self.config.clone(),
            bind: self.bind.clone(),
            port: self.port,
            headless: self.headless,
        }
    }
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "relay starting");

    let overrides = cli.overrides();
    match cli.command {
        None => gateway_commands::run_gateway(&overrides, false).await,
        Some(Commands::Gateway {
            abandon_on_shutdown,
        }) => gateway_commands::run_gateway(&overrides, abandon_on_shutdown).await,
        Some(Commands::Login { timeout_secs }) => {
            login_commands::handle_login(&overrides, Duration::from_secs(timeout_secs)).await
        },
        Some(Commands::Config { action }) => {
            config_commands::handle_config(action, &overrides).await
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, clap::CommandFactory};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_overrides_reach_subcommands() {
        let cli = Cli::try_parse_from([
            "relay", "login", "--port", "6000", "--headless", "false", "--timeout-secs", "30",
        ])
        .unwrap();
        let overrides = cli.overrides();
        assert_eq!(overrides.port, Some(6000));
        assert_eq!(overrides.headless, Some(false));
        assert!(matches!(
            cli.command,
            Some(Commands::Login { timeout_secs: 30 })
        ));
    }

    #[test]
    fn no_subcommand_means_gateway() {
        let cli = Cli::try_parse_from(["relay"]).unwrap();
        assert!(cli.command.is_none());
    }
}
