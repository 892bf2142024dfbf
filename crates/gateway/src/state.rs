use std::sync::Arc;

use {relay_dispatch::DispatchEngine, secrecy::Secret};

/// Shared state behind every route.
pub struct GatewayState {
    pub engine: Arc<DispatchEngine>,
    /// Bearer token required on the send endpoints.
    pub token: Secret<String>,
    pub version: String,
    #[cfg(feature = "metrics")]
    pub metrics_handle: Option<relay_metrics::MetricsHandle>,
}

impl GatewayState {
    pub fn new(engine: Arc<DispatchEngine>, token: Secret<String>) -> Arc<Self> {
        Arc::new(Self {
            engine,
            token,
            version: env!("CARGO_PKG_VERSION").to_string(),
            #[cfg(feature = "metrics")]
            metrics_handle: None,
        })
    }

    #[cfg(feature = "metrics")]
    pub fn with_metrics(
        engine: Arc<DispatchEngine>,
        token: Secret<String>,
        metrics_handle: relay_metrics::MetricsHandle,
    ) -> Arc<Self> {
        Arc::new(Self {
            engine,
            token,
            version: env!("CARGO_PKG_VERSION").to_string(),
            metrics_handle: Some(metrics_handle),
        })
    }
}
