use std::time::Duration;

use {
    async_trait::async_trait,
    chromiumoxide::{Browser, BrowserConfig as CdpBrowserConfig, Page, handler::viewport::Viewport},
    futures::StreamExt,
    relay_channels::{ChannelAdapter, ChannelConnector, ChannelError},
    relay_config::ChannelConfig,
    tokio::task::JoinHandle,
    tracing::{debug, info, warn},
};

use crate::{channel::WhatsAppWebChannel, detect, error::WhatsAppError};

const WINDOW_WIDTH: u32 = 1920;
const WINDOW_HEIGHT: u32 = 1080;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A launched browser with the chat client open in its only page.
pub(crate) struct BrowserSession {
    pub browser: Browser,
    pub page: Page,
    pub handler: JoinHandle<()>,
}

impl BrowserSession {
    pub async fn shutdown(mut self) -> Result<(), WhatsAppError> {
        let closed = self.browser.close().await;
        if closed.is_ok()
            && let Err(e) = self.browser.wait().await
        {
            warn!(error = %e, "browser did not exit cleanly");
        }
        self.handler.abort();
        closed.map(|_| ()).map_err(WhatsAppError::from)
    }
}

/// Launch Chromium on the configured profile and open the chat client.
///
/// `headless` is passed separately so the login helper can force a window.
pub(crate) async fn launch(
    config: &ChannelConfig,
    headless: bool,
) -> Result<BrowserSession, WhatsAppError> {
    let detection = detect::detect_chrome(config.chrome_path.as_deref());
    let Some(executable) = detection.path else {
        return Err(WhatsAppError::BrowserNotFound {
            hint: detection.install_hint,
        });
    };

    let mut builder = CdpBrowserConfig::builder();
    if !headless {
        builder = builder.with_head();
    }
    let cdp_config = builder
        .chrome_executable(&executable)
        .user_data_dir(&config.profile_dir)
        .window_size(WINDOW_WIDTH, WINDOW_HEIGHT)
        .viewport(Viewport {
            width: WINDOW_WIDTH,
            height: WINDOW_HEIGHT,
            device_scale_factor: None,
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        })
        .request_timeout(REQUEST_TIMEOUT)
        .arg("--no-sandbox")
        .arg("--disable-setuid-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-gpu")
        .arg("--no-first-run")
        .build()
        .map_err(|e| WhatsAppError::LaunchFailed(format!("failed to build browser config: {e}")))?;

    info!(
        executable = %executable.display(),
        profile_dir = %config.profile_dir.display(),
        headless,
        "launching browser"
    );
    let (browser, mut handler) = Browser::launch(cdp_config)
        .await
        .map_err(|e| WhatsAppError::LaunchFailed(e.to_string()))?;

    let handler = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            debug!(?event, "browser event");
        }
    });

    let page = match browser.new_page(config.url.as_str()).await {
        Ok(page) => page,
        Err(e) => {
            handler.abort();
            return Err(WhatsAppError::LaunchFailed(format!(
                "failed to open {}: {e}",
                config.url
            )));
        },
    };
    info!(url = %config.url, "chat client loaded");

    Ok(BrowserSession {
        browser,
        page,
        handler,
    })
}

/// Opens the WhatsApp Web channel in a fresh Chromium process.
pub struct WhatsAppWebConnector {
    config: ChannelConfig,
}

impl WhatsAppWebConnector {
    pub fn new(config: ChannelConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ChannelConnector for WhatsAppWebConnector {
    fn kind(&self) -> &str {
        "whatsapp_web"
    }

    async fn connect(&self) -> Result<Box<dyn ChannelAdapter>, ChannelError> {
        let session = launch(&self.config, self.config.headless).await?;
        let channel = WhatsAppWebChannel::new(session, &self.config)?;
        Ok(Box::new(channel))
    }
}
