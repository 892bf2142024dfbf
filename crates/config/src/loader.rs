use std::path::{Path, PathBuf};

use {secrecy::Secret, tracing::debug};

use crate::{env_subst::substitute_env, error::ConfigError, schema::RelayConfig};

/// Standard config file names, checked in order.
pub const CONFIG_FILENAMES: &[&str] = &["relay.toml", "relay.yaml", "relay.yml", "relay.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let raw = read_with_env(path)?;
    let config = parse_config(&raw, path)?;
    debug!(path = %path.display(), "config loaded");
    Ok(config)
}

/// Load the config file as a generic JSON tree, after env substitution.
pub fn load_config_value(path: &Path) -> Result<serde_json::Value, ConfigError> {
    let raw = read_with_env(path)?;
    parse_config_value(&raw, path)
}

/// Find the first config file in standard locations.
///
/// Search order:
/// 1. `./relay.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/relay/relay.{toml,yaml,yml,json}` (user-global)
pub fn find_config_file() -> Option<PathBuf> {
    if let Some(p) = first_existing(Path::new(".")) {
        return Some(p);
    }
    config_dir().and_then(|dir| first_existing(&dir))
}

fn first_existing(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/relay/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "relay").map(|d| d.config_dir().to_path_buf())
}

/// Apply the process environment on top of a loaded config.
///
/// `BEARER_TOKEN`, `HEADLESS`, `PORT`, `PUPPETEER_EXECUTABLE_PATH` /
/// `CHROME_BIN` and `RELAY_PROFILE_DIR` win over file values.
pub fn apply_env_overrides(config: &mut RelayConfig) -> Result<(), ConfigError> {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

/// Same as [`apply_env_overrides`] with a custom lookup.
pub fn apply_env_overrides_with(
    config: &mut RelayConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(token) = get("BEARER_TOKEN") {
        config.auth.token = Some(Secret::new(token));
    }
    if let Some(raw) = get("HEADLESS") {
        config.channel.headless = parse_bool("HEADLESS", &raw)?;
    }
    if let Some(raw) = get("PORT") {
        config.server.port = raw
            .trim()
            .parse::<u16>()
            .map_err(|e| ConfigError::invalid_env("PORT", &raw, e.to_string()))?;
    }
    if let Some(path) = get("PUPPETEER_EXECUTABLE_PATH").or_else(|| get("CHROME_BIN")) {
        config.channel.chrome_path = Some(PathBuf::from(path));
    }
    if let Some(dir) = get("RELAY_PROFILE_DIR") {
        config.channel.profile_dir = PathBuf::from(dir);
    }
    Ok(())
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid_env(name, raw, "expected true or false")),
    }
}

fn read_with_env(path: &Path) -> Result<String, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(substitute_env(&raw))
}

fn extension(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("toml")
}

fn parse_config(raw: &str, path: &Path) -> Result<RelayConfig, ConfigError> {
    match extension(path) {
        "toml" => toml::from_str(raw).map_err(|e| ConfigError::parse(path, e)),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| ConfigError::parse(path, e)),
        "json" => serde_json::from_str(raw).map_err(|e| ConfigError::parse(path, e)),
        ext => Err(ConfigError::UnsupportedFormat {
            extension: ext.to_string(),
        }),
    }
}

pub(crate) fn parse_config_value(raw: &str, path: &Path) -> Result<serde_json::Value, ConfigError> {
    match extension(path) {
        "toml" => {
            let v: toml::Value = toml::from_str(raw).map_err(|e| ConfigError::parse(path, e))?;
            serde_json::to_value(v).map_err(|e| ConfigError::parse(path, e))
        },
        "yaml" | "yml" => {
            let v: serde_yaml::Value =
                serde_yaml::from_str(raw).map_err(|e| ConfigError::parse(path, e))?;
            serde_json::to_value(v).map_err(|e| ConfigError::parse(path, e))
        },
        "json" => serde_json::from_str(raw).map_err(|e| ConfigError::parse(path, e)),
        ext => Err(ConfigError::UnsupportedFormat {
            extension: ext.to_string(),
        }),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::schema::ChannelKind, rstest::rstest, secrecy::ExposeSecret};

    #[rstest]
    #[case("relay.toml", "[server]\nport = 7001\n")]
    #[case("relay.yaml", "server:\n  port: 7001\n")]
    #[case("relay.json", r#"{"server": {"port": 7001}}"#)]
    fn loads_every_format(#[case] name: &str, #[case] body: &str) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.server.port, 7001);
        assert_eq!(cfg.session.max_attempts, 60);
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.ini");
        std::fs::write(&path, "port=1").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn reports_parse_errors_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("relay.toml"));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = load_config(Path::new("/nonexistent/relay.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn env_overrides_win_over_file_values() {
        let mut cfg = RelayConfig::default();
        apply_env_overrides_with(&mut cfg, |name| match name {
            "BEARER_TOKEN" => Some("tok".into()),
            "HEADLESS" => Some("False".into()),
            "PORT" => Some("8081".into()),
            "CHROME_BIN" => Some("/opt/chromium".into()),
            "RELAY_PROFILE_DIR" => Some("/var/lib/relay/profile".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(cfg.auth.token.unwrap().expose_secret().as_str(), "tok");
        assert!(!cfg.channel.headless);
        assert_eq!(cfg.server.port, 8081);
        assert_eq!(cfg.channel.chrome_path, Some(PathBuf::from("/opt/chromium")));
        assert_eq!(
            cfg.channel.profile_dir,
            PathBuf::from("/var/lib/relay/profile")
        );
        assert_eq!(cfg.channel.kind, ChannelKind::WhatsappWeb);
    }

    #[test]
    fn puppeteer_path_takes_precedence_over_chrome_bin() {
        let mut cfg = RelayConfig::default();
        apply_env_overrides_with(&mut cfg, |name| match name {
            "PUPPETEER_EXECUTABLE_PATH" => Some("/a".into()),
            "CHROME_BIN" => Some("/b".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(cfg.channel.chrome_path, Some(PathBuf::from("/a")));
    }

    #[rstest]
    #[case("PORT", "http")]
    #[case("PORT", "70000")]
    #[case("HEADLESS", "maybe")]
    fn bad_env_values_are_rejected(#[case] var: &str, #[case] value: &str) {
        let mut cfg = RelayConfig::default();
        let err = apply_env_overrides_with(&mut cfg, |name| {
            (name == var).then(|| value.to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut cfg = RelayConfig::default();
        apply_env_overrides_with(&mut cfg, |_| Some("  ".into())).unwrap();
        assert_eq!(cfg.server.port, 5000);
        assert!(cfg.auth.token.is_none());
    }
}
