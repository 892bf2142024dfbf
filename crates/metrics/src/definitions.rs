//! Metric name and label definitions.
//!
//! Every metric the relay records is named here so the exported surface is
//! documented in one place.

/// HTTP request metrics
pub mod http {
    /// Total number of HTTP requests handled
    pub const REQUESTS_TOTAL: &str = "relay_http_requests_total";
    /// Duration of HTTP requests in seconds
    pub const REQUEST_DURATION_SECONDS: &str = "relay_http_request_duration_seconds";
    /// Number of currently in-flight HTTP requests
    pub const REQUESTS_IN_FLIGHT: &str = "relay_http_requests_in_flight";
}

/// Send admission and worker metrics
pub mod dispatch {
    /// Tasks admitted into the queue
    pub const TASKS_ENQUEUED_TOTAL: &str = "relay_tasks_enqueued_total";
    /// Tasks that reached a terminal status, labelled by `status`
    pub const TASKS_COMPLETED_TOTAL: &str = "relay_tasks_completed_total";
    /// Admissions rejected before enqueue, labelled by `reason`
    pub const ADMISSIONS_REJECTED_TOTAL: &str = "relay_admissions_rejected_total";
    /// Tasks currently waiting in the queue
    pub const QUEUE_DEPTH: &str = "relay_queue_depth";
    /// Duration of one adapter send in seconds
    pub const SEND_DURATION_SECONDS: &str = "relay_send_duration_seconds";
    /// Pacing delay slept between consecutive sends
    pub const PACING_DELAY_SECONDS: &str = "relay_pacing_delay_seconds";
}

/// Channel session lifecycle
pub mod session {
    /// Current session state as a numeric code (see `SessionState::code`)
    pub const STATE: &str = "relay_session_state";
    /// Authentication probes issued while waiting for login
    pub const AUTH_PROBES_TOTAL: &str = "relay_session_auth_probes_total";
}

/// Common label keys
pub mod labels {
    pub const ENDPOINT: &str = "endpoint";
    pub const METHOD: &str = "method";
    pub const STATUS: &str = "status";
    pub const KIND: &str = "kind";
    pub const ERROR_TYPE: &str = "error_type";
    pub const REASON: &str = "reason";
}

/// Standard histogram buckets for different metric types
pub mod buckets {
    /// HTTP request duration buckets (in seconds)
    /// Covers 1ms to 60s
    pub const HTTP_DURATION: &[f64] = &[
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
    ];

    /// Browser send duration buckets (in seconds)
    /// Human typing makes long messages slow; covers 250ms to 5 minutes
    pub const SEND_DURATION: &[f64] = &[
        0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 30.0, 60.0, 120.0, 180.0, 300.0,
    ];

    /// Pacing delay buckets (in seconds)
    pub const PACING_DELAY: &[f64] = &[0.0, 15.0, 30.0, 45.0, 60.0, 70.0, 80.0, 90.0, 120.0];
}
