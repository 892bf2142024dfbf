//! Metrics collection and export for relay.
//!
//! Uses the `metrics` crate facade; recording is a no-op until a recorder is
//! installed. With the `prometheus` feature, [`init_metrics`] installs the
//! Prometheus recorder and [`MetricsHandle::render`] serves `/metrics`.
//!
//! ```rust,ignore
//! use relay_metrics::{counter, dispatch};
//!
//! counter!(dispatch::TASKS_ENQUEUED_TOTAL, "kind" => "text").increment(1);
//! ```

mod definitions;
mod error;
mod recorder;

pub use {
    definitions::*,
    error::{Error, Result},
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
