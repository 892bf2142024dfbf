//! Metrics recorder initialization.

use tracing::info;

use crate::error::Result;

/// Handle to the metrics system, providing access to exported metrics.
#[derive(Clone)]
pub struct MetricsHandle {
    #[cfg(feature = "prometheus")]
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl MetricsHandle {
    /// Handle that renders nothing; recording stays a no-op.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            #[cfg(feature = "prometheus")]
            prometheus_handle: None,
        }
    }

    /// Whether a recorder was installed.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        #[cfg(feature = "prometheus")]
        {
            self.prometheus_handle.is_some()
        }
        #[cfg(not(feature = "prometheus"))]
        {
            false
        }
    }

    /// Render metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        #[cfg(feature = "prometheus")]
        {
            self.prometheus_handle
                .as_ref()
                .map(|h| h.render())
                .unwrap_or_default()
        }
        #[cfg(not(feature = "prometheus"))]
        {
            String::new()
        }
    }
}

/// Configuration for the metrics system.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorderConfig {
    pub enabled: bool,
    /// Labels added to every metric (e.g. `("instance", "relay-1")`)
    pub global_labels: Vec<(String, String)>,
}

/// Initialize the metrics system. Call once at startup.
///
/// # Errors
///
/// Returns an error if the Prometheus recorder cannot be installed, e.g.
/// because another global recorder already exists.
pub fn init_metrics(config: MetricsRecorderConfig) -> Result<MetricsHandle> {
    if !config.enabled {
        info!("metrics collection is disabled");
        return Ok(MetricsHandle::disabled());
    }

    #[cfg(feature = "prometheus")]
    {
        let handle = init_prometheus(config)?;
        info!("prometheus metrics recorder installed");
        Ok(MetricsHandle {
            prometheus_handle: Some(handle),
        })
    }

    #[cfg(not(feature = "prometheus"))]
    {
        let _ = config;
        info!("metrics feature not enabled at compile time");
        Ok(MetricsHandle::disabled())
    }
}

#[cfg(feature = "prometheus")]
fn init_prometheus(
    config: MetricsRecorderConfig,
) -> Result<metrics_exporter_prometheus::PrometheusHandle> {
    use {
        crate::{buckets, dispatch, http},
        metrics_exporter_prometheus::{Matcher, PrometheusBuilder},
    };

    let mut builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(http::REQUEST_DURATION_SECONDS.to_string()),
            buckets::HTTP_DURATION,
        )?
        .set_buckets_for_metric(
            Matcher::Full(dispatch::SEND_DURATION_SECONDS.to_string()),
            buckets::SEND_DURATION,
        )?
        .set_buckets_for_metric(
            Matcher::Full(dispatch::PACING_DELAY_SECONDS.to_string()),
            buckets::PACING_DELAY,
        )?;

    for (key, value) in config.global_labels {
        builder = builder.add_global_label(key, value);
    }

    // Installs globally and returns a render handle without spawning an HTTP listener.
    Ok(builder.install_recorder()?)
}
