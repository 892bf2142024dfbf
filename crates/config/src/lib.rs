//! Configuration loading, validation, env substitution and env overrides.
//!
//! Config files: `relay.toml`, `relay.yaml`, `relay.yml` or `relay.json`.
//! Searched in `./` then `~/.config/relay/`.
//!
//! Supports `${ENV_VAR}` substitution anywhere in the raw file text.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::ConfigError,
    loader::{
        apply_env_overrides, apply_env_overrides_with, config_dir, find_config_file,
        load_config,
    },
    schema::{
        AuthConfig, ChannelConfig, ChannelKind, DispatchConfig, MetricsConfig, RelayConfig,
        ServerConfig, SessionConfig, TypingConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult},
};
