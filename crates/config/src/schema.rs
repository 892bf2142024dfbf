/// Config schema types (server, auth, channel, session, dispatch, metrics).
use std::{path::PathBuf, time::Duration};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub channel: ChannelConfig,
    pub session: SessionConfig,
    pub dispatch: DispatchConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 5000,
        }
    }
}

/// Bearer token required by the send endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    #[serde(serialize_with = "serialize_option_secret")]
    pub token: Option<Secret<String>>,
}

/// Which channel implementation the gateway drives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Browser automation against WhatsApp Web.
    #[default]
    WhatsappWeb,
    /// In-process channel that accepts every send; for local development.
    Memory,
}

impl ChannelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WhatsappWeb => "whatsapp_web",
            Self::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub kind: ChannelKind,
    pub headless: bool,
    /// Chromium executable; auto-detected when unset.
    pub chrome_path: Option<PathBuf>,
    /// Browser profile directory. Holds the logged-in session across restarts.
    pub profile_dir: PathBuf,
    pub url: String,
    /// How long to wait for a page element before giving up.
    pub element_timeout_secs: u64,
    pub image_download_timeout_secs: u64,
    pub typing: TypingConfig,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            kind: ChannelKind::default(),
            headless: true,
            chrome_path: None,
            profile_dir: PathBuf::from("/tmp/chrome_profile"),
            url: "https://web.whatsapp.com".into(),
            element_timeout_secs: 30,
            image_download_timeout_secs: 10,
            typing: TypingConfig::default(),
        }
    }
}

impl ChannelConfig {
    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout_secs)
    }

    pub fn image_download_timeout(&self) -> Duration {
        Duration::from_secs(self.image_download_timeout_secs)
    }
}

/// Human typing cadence, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypingConfig {
    pub char_delay_min_ms: u64,
    pub char_delay_max_ms: u64,
    /// Pause between the last keystroke and pressing Enter.
    pub pre_send_min_ms: u64,
    pub pre_send_max_ms: u64,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            char_delay_min_ms: 50,
            char_delay_max_ms: 150,
            pre_send_min_ms: 300,
            pre_send_max_ms: 700,
        }
    }
}

/// Authentication polling after the channel is opened.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub poll_interval_secs: u64,
    pub max_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            max_attempts: 60,
        }
    }
}

impl SessionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Lower bound of the randomized delay between consecutive sends.
    pub pacing_min_secs: u64,
    pub pacing_max_secs: u64,
    /// Upper bound on a single adapter call made by the worker.
    pub send_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            pacing_min_secs: 60,
            pacing_max_secs: 90,
            send_timeout_secs: 300,
        }
    }
}

impl DispatchConfig {
    pub fn pacing_min(&self) -> Duration {
        Duration::from_secs(self.pacing_min_secs)
    }

    pub fn pacing_max(&self) -> Duration {
        Duration::from_secs(self.pacing_max_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
