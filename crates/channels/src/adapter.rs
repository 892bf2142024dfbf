use std::sync::Arc;

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    tokio::sync::{Mutex, OnceCell},
};

use crate::error::{ChannelError, Result};

/// Confirmation returned by a successful send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    /// Destination as the caller supplied it.
    pub to: String,
}

/// Outcome of a single send: a typed value the dispatcher must handle.
pub type SendResult = std::result::Result<SendReceipt, ChannelError>;

/// An exclusive, stateful connection to the remote chat client.
///
/// All methods take `&mut self`: an adapter is only ever driven by whoever
/// holds its [`SharedChannel`] lock, so two operations can never overlap.
#[async_trait]
pub trait ChannelAdapter: Send {
    /// Probe whether the remote client is logged in and usable.
    /// Safe to call repeatedly; probe failures report `false`.
    async fn is_authenticated(&mut self) -> bool;

    /// Locate and open a conversation with `address`.
    /// Returns `Ok(false)` when the destination cannot be found.
    async fn resolve_contact(&mut self, address: &str) -> Result<bool>;

    /// Send a text body. Resolves the contact first.
    async fn send_text(&mut self, address: &str, body: &str) -> SendResult;

    /// Send an image fetched from `image_url`, with an optional caption.
    /// Resolves the contact first.
    async fn send_image(
        &mut self,
        address: &str,
        image_url: &str,
        caption: Option<&str>,
    ) -> SendResult;

    /// Capture the current screen as PNG bytes (used to expose the login QR code).
    async fn capture_screen(&mut self) -> Result<Vec<u8>>;

    /// Release the underlying resources. No-op by default.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Opens a channel. Called exactly once, during session bootstrap.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    /// Short identifier for logs (e.g. "whatsapp_web", "memory").
    fn kind(&self) -> &str;

    /// Construct and open the adapter.
    async fn connect(&self) -> Result<Box<dyn ChannelAdapter>>;
}

/// The single adapter instance, guarded by the one mutex every caller shares.
pub type SharedChannel = Arc<Mutex<Box<dyn ChannelAdapter>>>;

/// Set-once holder for the adapter.
///
/// Empty until the session controller has bootstrapped the channel.
#[derive(Clone, Default)]
pub struct ChannelSlot {
    cell: Arc<OnceCell<SharedChannel>>,
}

impl ChannelSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the adapter. Returns `false` if one was already installed.
    pub fn install(&self, adapter: Box<dyn ChannelAdapter>) -> bool {
        self.cell.set(Arc::new(Mutex::new(adapter))).is_ok()
    }

    pub fn get(&self) -> Option<SharedChannel> {
        self.cell.get().cloned()
    }

    pub fn is_installed(&self) -> bool {
        self.cell.initialized()
    }
}

/// Strip WhatsApp JID suffixes and surrounding whitespace from a destination.
///
/// `"5511999999999@s.whatsapp.net"` and `"5511999999999@c.us"` both become
/// `"5511999999999"`. Other addresses pass through trimmed.
pub fn normalize_address(address: &str) -> &str {
    let trimmed = address.trim();
    trimmed
        .strip_suffix("@s.whatsapp.net")
        .or_else(|| trimmed.strip_suffix("@c.us"))
        .unwrap_or(trimmed)
}
