use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("unsupported config format: .{extension}")]
    UnsupportedFormat { extension: String },

    #[error("invalid value for {name}: {value:?} ({reason})")]
    InvalidEnv {
        name: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    #[must_use]
    pub fn parse(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn invalid_env(
        name: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidEnv {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}
