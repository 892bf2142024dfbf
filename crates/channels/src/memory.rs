//! In-memory channel. No browser, no network.
//!
//! Used by the dispatch and gateway tests, and by `channel.kind = "memory"`
//! to run the gateway locally without a remote client.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, AtomicUsize, Ordering},
    },
    time::Duration,
};

use {async_trait::async_trait, tracing::debug};

use crate::{
    adapter::{ChannelAdapter, ChannelConnector, SendReceipt, SendResult, normalize_address},
    error::{ChannelError, Result},
};

/// PNG signature, returned as the "screen" of a memory channel.
pub const PLACEHOLDER_PNG: &[u8] = b"\x89PNG\r\n\x1a\n";

/// One recorded adapter invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryCall {
    IsAuthenticated,
    ResolveContact {
        address: String,
    },
    SendText {
        to: String,
        body: String,
    },
    SendImage {
        to: String,
        image_url: String,
        caption: Option<String>,
    },
    CaptureScreen,
    Close,
}

#[derive(Default)]
struct ProbeInner {
    calls: Mutex<Vec<MemoryCall>>,
    probes: AtomicU32,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Observation handle shared by every clone of a [`MemoryChannel`].
#[derive(Clone, Default)]
pub struct MemoryProbe {
    inner: Arc<ProbeInner>,
}

impl MemoryProbe {
    /// All recorded calls, in invocation order.
    pub fn calls(&self) -> Vec<MemoryCall> {
        self.inner
            .calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Destinations of completed `send_text`/`send_image` calls, in order.
    pub fn sent_to(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                MemoryCall::SendText { to, .. } | MemoryCall::SendImage { to, .. } => Some(to),
                _ => None,
            })
            .collect()
    }

    /// Number of `is_authenticated` probes seen so far.
    pub fn probe_count(&self) -> u32 {
        self.inner.probes.load(Ordering::SeqCst)
    }

    /// Highest number of adapter operations that were ever running at once.
    pub fn max_concurrency(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: MemoryCall) {
        self.inner
            .calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }

    fn enter(&self) -> InFlight<'_> {
        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight { probe: self }
    }
}

struct InFlight<'a> {
    probe: &'a MemoryProbe,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.probe.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Scripted channel adapter.
#[derive(Clone)]
pub struct MemoryChannel {
    /// Number of probes that report "not logged in" before succeeding.
    /// `None` never authenticates.
    authenticate_after: Option<u32>,
    unknown_contacts: HashSet<String>,
    failing: HashMap<String, String>,
    broken_urls: HashSet<String>,
    latency: Duration,
    probe: MemoryProbe,
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self {
            authenticate_after: Some(0),
            unknown_contacts: HashSet::new(),
            failing: HashMap::new(),
            broken_urls: HashSet::new(),
            latency: Duration::ZERO,
            probe: MemoryProbe::default(),
        }
    }
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report "not logged in" for the first `probes` probes.
    pub fn authenticate_after(mut self, probes: u32) -> Self {
        self.authenticate_after = Some(probes);
        self
    }

    pub fn never_authenticate(mut self) -> Self {
        self.authenticate_after = None;
        self
    }

    /// Make `resolve_contact` return `false` for this destination.
    pub fn with_unknown_contact(mut self, address: &str) -> Self {
        self.unknown_contacts
            .insert(normalize_address(address).to_string());
        self
    }

    /// Make every send to this destination fail with `message`.
    pub fn with_failure(mut self, address: &str, message: impl Into<String>) -> Self {
        self.failing
            .insert(normalize_address(address).to_string(), message.into());
        self
    }

    /// Make image downloads from this URL fail.
    pub fn with_broken_url(mut self, url: impl Into<String>) -> Self {
        self.broken_urls.insert(url.into());
        self
    }

    /// Sleep this long inside every send.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn probe(&self) -> MemoryProbe {
        self.probe.clone()
    }

    async fn prepare_send(&mut self, address: &str) -> Result<()> {
        if !self.resolve_contact(address).await? {
            return Err(ChannelError::contact_not_found(address));
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some(message) = self.failing.get(normalize_address(address)) {
            return Err(ChannelError::failure(message));
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for MemoryChannel {
    async fn is_authenticated(&mut self) -> bool {
        let _guard = self.probe.enter();
        self.probe.record(MemoryCall::IsAuthenticated);
        let seen = self.probe.inner.probes.fetch_add(1, Ordering::SeqCst) + 1;
        self.authenticate_after.is_some_and(|after| seen > after)
    }

    async fn resolve_contact(&mut self, address: &str) -> Result<bool> {
        let number = normalize_address(address).to_string();
        self.probe.record(MemoryCall::ResolveContact {
            address: number.clone(),
        });
        Ok(!self.unknown_contacts.contains(&number))
    }

    async fn send_text(&mut self, address: &str, body: &str) -> SendResult {
        let probe = self.probe.clone();
        let _guard = probe.enter();
        self.prepare_send(address).await?;
        probe.record(MemoryCall::SendText {
            to: address.to_string(),
            body: body.to_string(),
        });
        debug!(to = address, chars = body.len(), "memory channel sent text");
        Ok(SendReceipt {
            to: address.to_string(),
        })
    }

    async fn send_image(
        &mut self,
        address: &str,
        image_url: &str,
        caption: Option<&str>,
    ) -> SendResult {
        let probe = self.probe.clone();
        let _guard = probe.enter();
        self.prepare_send(address).await?;
        if self.broken_urls.contains(image_url) {
            return Err(ChannelError::transport("failed to download image"));
        }
        probe.record(MemoryCall::SendImage {
            to: address.to_string(),
            image_url: image_url.to_string(),
            caption: caption.map(String::from),
        });
        debug!(to = address, image_url, "memory channel sent image");
        Ok(SendReceipt {
            to: address.to_string(),
        })
    }

    async fn capture_screen(&mut self) -> Result<Vec<u8>> {
        let _guard = self.probe.enter();
        self.probe.record(MemoryCall::CaptureScreen);
        Ok(PLACEHOLDER_PNG.to_vec())
    }

    async fn close(&mut self) -> Result<()> {
        self.probe.record(MemoryCall::Close);
        Ok(())
    }
}

/// Connector handing out clones of a prepared [`MemoryChannel`].
pub struct MemoryConnector {
    channel: MemoryChannel,
    fail_with: Option<String>,
}

impl MemoryConnector {
    pub fn new(channel: MemoryChannel) -> Self {
        Self {
            channel,
            fail_with: None,
        }
    }

    /// A connector whose `connect` always fails, e.g. a missing browser.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            channel: MemoryChannel::default(),
            fail_with: Some(message.into()),
        }
    }
}

#[async_trait]
impl ChannelConnector for MemoryConnector {
    fn kind(&self) -> &str {
        "memory"
    }

    async fn connect(&self) -> Result<Box<dyn ChannelAdapter>> {
        if let Some(ref message) = self.fail_with {
            return Err(ChannelError::unavailable(message));
        }
        Ok(Box::new(self.channel.clone()))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn authenticates_after_scripted_probes() {
        let mut channel = MemoryChannel::new().authenticate_after(2);
        assert!(!channel.is_authenticated().await);
        assert!(!channel.is_authenticated().await);
        assert!(channel.is_authenticated().await);
        assert_eq!(channel.probe().probe_count(), 3);
    }

    #[tokio::test]
    async fn never_authenticates() {
        let mut channel = MemoryChannel::new().never_authenticate();
        for _ in 0..5 {
            assert!(!channel.is_authenticated().await);
        }
    }

    #[tokio::test]
    async fn unknown_contact_is_not_an_error_on_resolve() {
        let mut channel = MemoryChannel::new().with_unknown_contact("5511000000000@c.us");
        assert!(!channel.resolve_contact("5511000000000").await.unwrap());
        assert!(channel.resolve_contact("5511999999999").await.unwrap());
    }

    #[tokio::test]
    async fn send_to_unknown_contact_fails_with_contact_not_found() {
        let mut channel = MemoryChannel::new().with_unknown_contact("5511000000000");
        let err = channel
            .send_text("5511000000000@s.whatsapp.net", "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::ContactNotFound { .. }));
        assert!(channel.probe().sent_to().is_empty());
    }

    #[tokio::test]
    async fn records_sends_in_order() {
        let mut channel = MemoryChannel::new();
        let probe = channel.probe();
        channel.send_text("a", "one").await.unwrap();
        channel
            .send_image("b", "https://example.com/cat.png", Some("cat"))
            .await
            .unwrap();
        assert_eq!(probe.sent_to(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(probe.max_concurrency(), 1);
    }

    #[tokio::test]
    async fn broken_url_is_a_transport_error() {
        let mut channel = MemoryChannel::new().with_broken_url("https://example.com/404.png");
        let err = channel
            .send_image("a", "https://example.com/404.png", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "transport");
    }

    #[tokio::test]
    async fn failing_connector_reports_unavailable() {
        let connector = MemoryConnector::failing("chromium not found");
        let err = connector.connect().await.err().unwrap();
        assert!(matches!(err, ChannelError::Unavailable { .. }));
    }
}
