//! HTTP request metrics middleware.

use std::time::Instant;

use {
    axum::{body::Body, extract::MatchedPath, http::Request, middleware::Next, response::Response},
    relay_metrics::{counter, gauge, histogram, http as http_metrics, labels},
};

/// Records request count, duration and in-flight requests per route.
pub async fn http_metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    // Route templates keep task ids and instance names out of the labels.
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| normalize_path(request.uri().path()));

    gauge!(http_metrics::REQUESTS_IN_FLIGHT, labels::ENDPOINT => endpoint.clone(), labels::METHOD => method.clone())
        .increment(1.0);

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    let duration = start.elapsed().as_secs_f64();

    counter!(
        http_metrics::REQUESTS_TOTAL,
        labels::ENDPOINT => endpoint.clone(),
        labels::METHOD => method.clone(),
        labels::STATUS => status.clone()
    )
    .increment(1);

    histogram!(
        http_metrics::REQUEST_DURATION_SECONDS,
        labels::ENDPOINT => endpoint.clone(),
        labels::METHOD => method.clone(),
        labels::STATUS => status
    )
    .record(duration);

    gauge!(http_metrics::REQUESTS_IN_FLIGHT, labels::ENDPOINT => endpoint, labels::METHOD => method)
        .decrement(1.0);

    response
}

/// Fallback label for unmatched requests: the first path segment only.
fn normalize_path(path: &str) -> String {
    match path.trim_start_matches('/').split('/').next() {
        Some(first) if !first.is_empty() => format!("/{first}/*"),
        _ => "/".to_string(),
    }
}
