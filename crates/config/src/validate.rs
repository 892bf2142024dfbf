//! Configuration validation.
//!
//! Two passes: [`validate_file`] checks syntax, unknown keys and types of a
//! config file; [`validate`] checks the semantics of a loaded config
//! (after env overrides). The gateway refuses to start on any error.

use std::path::{Path, PathBuf};

use {secrecy::ExposeSecret, serde_json::Value};

use crate::{
    error::ConfigError,
    loader::load_config_value,
    schema::{ChannelKind, RelayConfig},
};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "auth", "range"
    pub category: &'static str,
    /// Dotted path, e.g. "dispatch.pacing_min_secs"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn error(category: &'static str, path: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            category,
            path: path.to_string(),
            message: message.into(),
        }
    }

    fn warning(category: &'static str, path: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            category,
            path: path.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}: {}", self.severity, self.message)
        } else {
            write!(f, "{} [{}]: {}", self.severity, self.path, self.message)
        }
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    pub fn extend(&mut self, other: ValidationResult) {
        self.diagnostics.extend(other.diagnostics);
        if self.config_path.is_none() {
            self.config_path = other.config_path;
        }
    }

    /// Error diagnostics joined into one line, for startup failures.
    pub fn error_summary(&self) -> String {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// ── File checks ─────────────────────────────────────────────────────────────

/// Check a config file for syntax errors, unknown keys and type errors.
#[must_use]
pub fn validate_file(path: &Path) -> ValidationResult {
    let mut result = ValidationResult {
        diagnostics: Vec::new(),
        config_path: Some(path.to_path_buf()),
    };

    let value = match load_config_value(path) {
        Ok(v) => v,
        Err(e) => {
            let category = match e {
                ConfigError::Parse { .. } => "syntax",
                _ => "file-ref",
            };
            result
                .diagnostics
                .push(Diagnostic::error(category, "", e.to_string()));
            return result;
        },
    };

    match serde_json::to_value(RelayConfig::default()) {
        Ok(known) => check_unknown_fields(&value, &known, "", &mut result.diagnostics),
        Err(e) => result.diagnostics.push(Diagnostic::error(
            "type-error",
            "",
            format!("cannot build schema: {e}"),
        )),
    }

    if let Err(e) = serde_json::from_value::<RelayConfig>(value) {
        result
            .diagnostics
            .push(Diagnostic::error("type-error", "", format!("type error: {e}")));
    }

    result
}

/// Walk the file tree against the serialized defaults and flag unknown keys.
fn check_unknown_fields(
    value: &Value,
    known: &Value,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let (Value::Object(table), Value::Object(fields)) = (value, known) else {
        return;
    };
    for (key, child) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match fields.get(key) {
            Some(child_known) => check_unknown_fields(child, child_known, &path, diagnostics),
            None => {
                let message = match suggest(key, fields.keys().map(String::as_str)) {
                    Some(s) => format!("unknown field \"{key}\", did you mean \"{s}\"?"),
                    None => format!("unknown field \"{key}\""),
                };
                diagnostics.push(Diagnostic::error("unknown-field", &path, message));
            },
        }
    }
}

fn suggest<'a>(input: &str, candidates: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    candidates
        .map(|c| (c, levenshtein(input, c)))
        .filter(|(_, d)| *d <= 3)
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut cur = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            cur[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        prev = cur;
    }
    prev[b.len()]
}

// ── Semantic checks ─────────────────────────────────────────────────────────

/// Check a loaded config for values the gateway cannot run with.
#[must_use]
pub fn validate(config: &RelayConfig) -> ValidationResult {
    let mut d = Vec::new();

    if config.server.port == 0 {
        d.push(Diagnostic::error("range", "server.port", "port must be non-zero"));
    }

    let token_missing = config
        .auth
        .token
        .as_ref()
        .is_none_or(|t| t.expose_secret().trim().is_empty());
    if token_missing {
        d.push(Diagnostic::error(
            "auth",
            "auth.token",
            "bearer token is required (set auth.token or BEARER_TOKEN)",
        ));
    }

    let dispatch = &config.dispatch;
    if dispatch.pacing_min_secs > dispatch.pacing_max_secs {
        d.push(Diagnostic::error(
            "range",
            "dispatch.pacing_min_secs",
            format!(
                "pacing_min_secs ({}) exceeds pacing_max_secs ({})",
                dispatch.pacing_min_secs, dispatch.pacing_max_secs
            ),
        ));
    } else if dispatch.pacing_max_secs == 0 {
        d.push(Diagnostic::warning(
            "range",
            "dispatch.pacing_max_secs",
            "pacing is disabled; consecutive sends will be back to back",
        ));
    }
    if dispatch.send_timeout_secs == 0 {
        d.push(Diagnostic::error(
            "range",
            "dispatch.send_timeout_secs",
            "send timeout must be non-zero",
        ));
    }

    let typing = &config.channel.typing;
    if typing.char_delay_min_ms > typing.char_delay_max_ms {
        d.push(Diagnostic::error(
            "range",
            "channel.typing.char_delay_min_ms",
            "char_delay_min_ms exceeds char_delay_max_ms",
        ));
    }
    if typing.pre_send_min_ms > typing.pre_send_max_ms {
        d.push(Diagnostic::error(
            "range",
            "channel.typing.pre_send_min_ms",
            "pre_send_min_ms exceeds pre_send_max_ms",
        ));
    }
    if config.channel.element_timeout_secs == 0 {
        d.push(Diagnostic::error(
            "range",
            "channel.element_timeout_secs",
            "element timeout must be non-zero",
        ));
    }

    if config.session.poll_interval_secs == 0 {
        d.push(Diagnostic::error(
            "range",
            "session.poll_interval_secs",
            "poll interval must be non-zero",
        ));
    }
    if config.session.max_attempts == 0 {
        d.push(Diagnostic::error(
            "range",
            "session.max_attempts",
            "max_attempts must be at least 1",
        ));
    }

    if config.channel.kind == ChannelKind::Memory {
        d.push(Diagnostic::warning(
            "channel",
            "channel.kind",
            "memory channel accepts sends without delivering them",
        ));
    }

    ValidationResult {
        diagnostics: d,
        config_path: None,
    }
}
