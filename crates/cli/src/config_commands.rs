use std::path::PathBuf;

use {
    anyhow::{Context, Result},
    clap::Subcommand,
    relay_config::{
        RelayConfig, Severity, ValidationResult, apply_env_overrides, find_config_file,
        load_config, validate,
    },
    tracing::{debug, warn},
};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
    /// Print the effective configuration (file, environment and defaults merged).
    Show,
}

/// Overrides given on the command line. Applied last.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub config: Option<PathBuf>,
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub headless: Option<bool>,
}

/// File (explicit or discovered), then environment, then CLI flags.
///
/// An explicit `--config` that cannot be read is an error; a discovered file
/// that fails to parse is too, so a typo never silently falls back to defaults.
pub fn resolve_config(overrides: &CliOverrides) -> Result<(RelayConfig, Option<PathBuf>)> {
    let path = overrides.config.clone().or_else(find_config_file);
    let mut config = match path.as_deref() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(path).with_context(|| format!("loading {}", path.display()))?
        },
        None => {
            debug!("no config file found, using defaults");
            RelayConfig::default()
        },
    };

    apply_env_overrides(&mut config).context("applying environment overrides")?;

    if let Some(ref bind) = overrides.bind {
        config.server.bind = bind.clone();
    }
    if let Some(port) = overrides.port {
        config.server.port = port;
    }
    if let Some(headless) = overrides.headless {
        config.channel.headless = headless;
    }
    Ok((config, path))
}

/// Validate the effective config, log warnings, fail on errors.
pub fn ensure_valid(config: &RelayConfig) -> Result<()> {
    let result = validate::validate(config);
    for d in result
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Warning)
    {
        warn!(path = %d.path, "{}", d.message);
    }
    if result.has_errors() {
        anyhow::bail!("invalid configuration: {}", result.error_summary());
    }
    Ok(())
}

pub async fn handle_config(action: ConfigAction, overrides: &CliOverrides) -> Result<()> {
    match action {
        ConfigAction::Check { verbose } => check(overrides, verbose),
        ConfigAction::Show => show(overrides),
    }
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn collect_diagnostics(overrides: &CliOverrides) -> ValidationResult {
    let path = overrides.config.clone().or_else(find_config_file);
    let mut result = match path.as_deref() {
        Some(path) => validate::validate_file(path),
        None => ValidationResult::default(),
    };
    // Semantic checks only make sense once the file parses.
    if !result.has_errors() {
        match resolve_config(overrides) {
            Ok((config, _)) => result.extend(validate::validate(&config)),
            Err(e) => result.diagnostics.push(relay_config::Diagnostic {
                severity: Severity::Error,
                category: "load",
                path: String::new(),
                message: format!("{e:#}"),
            }),
        }
    }
    if result.config_path.is_none() {
        result.config_path = path;
    }
    result
}

fn check(overrides: &CliOverrides, verbose: bool) -> Result<()> {
    let result = collect_diagnostics(overrides);

    if let Some(ref path) = result.config_path {
        eprintln!("Checking {}\n", path.display());
    } else {
        eprintln!("No config file found; checking defaults and environment.\n");
    }

    let mut shown = 0;
    for d in &result.diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }

        let (color, label) = match d.severity {
            Severity::Error => (RED, "error"),
            Severity::Warning => (YELLOW, "warning"),
            Severity::Info => (CYAN, "info"),
        };

        if d.path.is_empty() {
            eprintln!("  {BOLD}{color}{label}{RESET} {}", d.message);
        } else {
            eprintln!("  {BOLD}{color}{label}{RESET} {}: {}", d.path, d.message);
        }
        shown += 1;
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);

    if shown > 0 {
        eprintln!();
    }

    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }

    if errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn show(overrides: &CliOverrides) -> Result<()> {
    let (config, path) = resolve_config(overrides)?;
    if let Some(path) = path {
        eprintln!("# from {}", path.display());
    }
    println!("{}", render_redacted(&config)?);
    Ok(())
}

fn render_redacted(config: &RelayConfig) -> Result<String> {
    let mut value = serde_json::to_value(config)?;
    if let Some(token) = value.pointer_mut("/auth/token")
        && !token.is_null()
    {
        *token = serde_json::Value::String("[REDACTED]".into());
    }
    Ok(serde_json::to_string_pretty(&value)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, secrecy::Secret};

    #[test]
    fn show_redacts_the_token() {
        let mut config = RelayConfig::default();
        config.auth.token = Some(Secret::new("hunter2".into()));
        let rendered = render_redacted(&config).unwrap();
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn explicit_config_and_cli_flags_apply() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(&path, "[server]\nport = 6001\n[channel]\nheadless = false\n").unwrap();

        let overrides = CliOverrides {
            config: Some(path.clone()),
            bind: Some("127.0.0.1".into()),
            ..Default::default()
        };
        let (config, found) = resolve_config(&overrides).unwrap();
        assert_eq!(found.as_deref(), Some(path.as_path()));
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.channel.url, "https://web.whatsapp.com");
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let overrides = CliOverrides {
            config: Some(PathBuf::from("/definitely/not/here/relay.toml")),
            ..Default::default()
        };
        assert!(resolve_config(&overrides).is_err());
    }
}
