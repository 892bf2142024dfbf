//! The WhatsApp Web conversation flow: search, open, type, attach, send.

use std::time::Duration;

use {
    async_trait::async_trait,
    chromiumoxide::{
        Page, cdp::browser_protocol::page::CaptureScreenshotFormat, page::ScreenshotParams,
    },
    rand::{SeedableRng, rngs::StdRng},
    relay_channels::{
        ChannelAdapter, ChannelError, SendReceipt, SendResult, normalize_address,
    },
    relay_config::ChannelConfig,
    tracing::{debug, info, warn},
};

use crate::{
    connector::BrowserSession,
    dom,
    error::WhatsAppError,
    selectors::{self, ATTACH_BUTTON, COMPOSER, FIRST_RESULT, MEDIA_INPUT, MEDIA_SEND, SEARCH_BOX},
    typing::TypingPacing,
};

/// Settle times the web client needs between UI steps.
const SEARCH_FOCUS_SETTLE: Duration = Duration::from_millis(500);
const SEARCH_RESULTS_SETTLE: Duration = Duration::from_secs(2);
const CHAT_OPEN_SETTLE: Duration = Duration::from_millis(1500);
const AFTER_SEND_SETTLE: Duration = Duration::from_secs(1);
const ATTACH_MENU_SETTLE: Duration = Duration::from_millis(500);
const MEDIA_PREVIEW_SETTLE: Duration = Duration::from_secs(2);
const CAPTION_SETTLE: Duration = Duration::from_millis(500);
const MEDIA_UPLOAD_SETTLE: Duration = Duration::from_secs(2);

const DEFAULT_IMAGE_SUFFIX: &str = ".jpg";

pub struct WhatsAppWebChannel {
    session: Option<BrowserSession>,
    http: reqwest::Client,
    element_timeout: Duration,
    typing: TypingPacing,
    rng: StdRng,
}

impl WhatsAppWebChannel {
    pub(crate) fn new(session: BrowserSession, config: &ChannelConfig) -> Result<Self, WhatsAppError> {
        let http = reqwest::Client::builder()
            .timeout(config.image_download_timeout())
            .build()
            .map_err(|e| WhatsAppError::LaunchFailed(format!("failed to build http client: {e}")))?;
        Ok(Self {
            session: Some(session),
            http,
            element_timeout: config.element_timeout(),
            typing: TypingPacing::from(&config.typing),
            rng: StdRng::from_os_rng(),
        })
    }

    async fn open_conversation(&mut self, address: &str) -> Result<bool, WhatsAppError> {
        let page = live_page(&self.session)?;

        dom::wait_for(page, SEARCH_BOX, self.element_timeout).await?;
        dom::click(page, SEARCH_BOX).await?;
        tokio::time::sleep(SEARCH_FOCUS_SETTLE).await;

        dom::clear_focused(page).await?;
        dom::type_text(page, address, &self.typing, &mut self.rng).await?;
        tokio::time::sleep(SEARCH_RESULTS_SETTLE).await;

        let exact = selectors::contact_title(address);
        let candidates = [exact.as_str(), FIRST_RESULT];
        let Some(index) = dom::wait_for_any(page, &candidates, self.element_timeout).await? else {
            return Ok(false);
        };
        dom::click(page, candidates[index]).await?;
        debug!(address, exact_match = index == 0, "opened conversation");
        tokio::time::sleep(CHAT_OPEN_SETTLE).await;
        Ok(true)
    }

    async fn ensure_conversation(&mut self, address: &str) -> Result<(), ChannelError> {
        if self.open_conversation(address).await? {
            Ok(())
        } else {
            Err(ChannelError::contact_not_found(address))
        }
    }

    async fn type_into_composer(&mut self, text: &str) -> Result<(), WhatsAppError> {
        let page = live_page(&self.session)?;
        dom::wait_for(page, COMPOSER, self.element_timeout).await?;
        dom::click(page, COMPOSER).await?;
        dom::type_text(page, text, &self.typing, &mut self.rng).await
    }

    async fn download_image(&self, image_url: &str) -> Result<tempfile::NamedTempFile, WhatsAppError> {
        let response = self
            .http
            .get(image_url)
            .send()
            .await
            .map_err(|e| WhatsAppError::Download(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(WhatsAppError::Download(format!("status {status}")));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| WhatsAppError::Download(e.to_string()))?;

        let file = tempfile::Builder::new()
            .prefix("relay-image-")
            .suffix(&image_suffix(image_url))
            .tempfile()?;
        tokio::fs::write(file.path(), &bytes).await?;
        debug!(image_url, bytes = bytes.len(), path = %file.path().display(), "image downloaded");
        Ok(file)
    }

    async fn attach_and_send(
        &mut self,
        file: &tempfile::NamedTempFile,
        caption: Option<&str>,
    ) -> Result<(), WhatsAppError> {
        {
            let page = live_page(&self.session)?;
            dom::wait_for(page, ATTACH_BUTTON, self.element_timeout).await?;
            dom::click(page, ATTACH_BUTTON).await?;
            tokio::time::sleep(ATTACH_MENU_SETTLE).await;

            dom::wait_for(page, MEDIA_INPUT, self.element_timeout).await?;
            dom::set_file_input(page, MEDIA_INPUT, file.path()).await?;
            tokio::time::sleep(MEDIA_PREVIEW_SETTLE).await;
        }

        if let Some(caption) = caption.filter(|c| !c.trim().is_empty()) {
            self.type_into_composer(caption).await?;
            tokio::time::sleep(CAPTION_SETTLE).await;
        }

        let page = live_page(&self.session)?;
        dom::wait_for(page, MEDIA_SEND, self.element_timeout).await?;
        dom::click(page, MEDIA_SEND).await?;
        tokio::time::sleep(MEDIA_UPLOAD_SETTLE).await;
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for WhatsAppWebChannel {
    async fn is_authenticated(&mut self) -> bool {
        let Ok(page) = live_page(&self.session) else {
            return false;
        };
        match dom::is_present(page, SEARCH_BOX).await {
            Ok(present) => present,
            Err(e) => {
                debug!(error = %e, "authentication probe failed");
                false
            },
        }
    }

    async fn resolve_contact(&mut self, address: &str) -> Result<bool, ChannelError> {
        let address = normalize_address(address);
        Ok(self.open_conversation(address).await?)
    }

    async fn send_text(&mut self, address: &str, body: &str) -> SendResult {
        let number = normalize_address(address);
        self.ensure_conversation(number).await?;

        self.type_into_composer(body).await?;
        tokio::time::sleep(self.typing.pre_send(&mut self.rng)).await;
        dom::press_enter(live_page(&self.session)?, false).await?;
        tokio::time::sleep(AFTER_SEND_SETTLE).await;

        info!(to = %number, chars = body.chars().count(), "text message sent");
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
        let number = normalize_address(address);
        self.ensure_conversation(number).await?;

        let file = self.download_image(image_url).await?;
        let sent = self.attach_and_send(&file, caption).await;
        if let Err(e) = file.close() {
            warn!(error = %e, "failed to remove temporary image");
        }
        sent?;

        info!(to = %number, image_url, has_caption = caption.is_some(), "image message sent");
        Ok(SendReceipt {
            to: address.to_string(),
        })
    }

    async fn capture_screen(&mut self) -> Result<Vec<u8>, ChannelError> {
        let page = live_page(&self.session)?;
        let png = page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .build(),
            )
            .await
            .map_err(|e| ChannelError::failure(format!("screenshot failed: {e}")))?;
        Ok(png)
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        session.shutdown().await?;
        info!("browser closed");
        Ok(())
    }
}

/// Borrows only the session field, so callers can still use `self.rng`.
fn live_page(session: &Option<BrowserSession>) -> Result<&Page, WhatsAppError> {
    session
        .as_ref()
        .map(|s| &s.page)
        .ok_or(WhatsAppError::Closed)
}

/// File suffix for the downloaded image, taken from the URL path.
fn image_suffix(image_url: &str) -> String {
    url::Url::parse(image_url)
        .ok()
        .and_then(|u| {
            let last = u.path_segments()?.next_back()?.to_string();
            let (_, ext) = last.rsplit_once('.')?;
            let ext = ext.to_ascii_lowercase();
            matches!(ext.as_str(), "jpg" | "jpeg" | "png" | "gif" | "webp").then(|| format!(".{ext}"))
        })
        .unwrap_or_else(|| DEFAULT_IMAGE_SUFFIX.to_string())
}
