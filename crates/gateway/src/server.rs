use std::{future::Future, net::SocketAddr, sync::Arc};

use {
    axum::{
        Router,
        extract::State,
        http::{StatusCode, header},
        middleware,
        response::{IntoResponse, Json, Response},
        routing::{get, post},
    },
    relay_dispatch::{SessionState, ShutdownMode},
    tower_http::{
        cors::{Any, CorsLayer},
        trace::TraceLayer,
    },
    tracing::{info, warn},
};

use crate::{
    auth_middleware::require_bearer,
    error::ApiError,
    queue_routes::{queue_status_handler, task_status_handler},
    send_routes::{send_image_handler, send_text_handler},
    state::GatewayState,
};

#[cfg(feature = "metrics")]
use crate::metrics_middleware::http_metrics_middleware;

#[cfg(feature = "prometheus")]
use crate::metrics_routes::prometheus_metrics_handler;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<GatewayState>,
}

// ── Router ───────────────────────────────────────────────────────────────────

/// Build the router. Shared by [`start_gateway`] and the integration tests.
pub fn build_gateway_app(state: Arc<GatewayState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app_state = AppState { gateway: state };

    // Auth runs before the body is looked at, so a bad token wins over a bad body.
    let protected = Router::new()
        .route("/rest/sendMessage/{instance}/text", post(send_text_handler))
        .route("/rest/sendMessage/{instance}/image", post(send_image_handler))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            require_bearer,
        ));

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/qr", get(qr_handler))
        .route("/queue/status", get(queue_status_handler))
        .route("/queue/status/{task_id}", get(task_status_handler))
        .merge(protected);

    #[cfg(feature = "prometheus")]
    let router = router.route("/metrics", get(prometheus_metrics_handler));

    #[cfg(feature = "metrics")]
    let router = router.layer(middleware::from_fn(http_metrics_middleware));

    router
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

// ── Server startup ───────────────────────────────────────────────────────────

/// Serve until Ctrl-C or SIGTERM, then shut the dispatch engine down.
pub async fn start_gateway(
    bind: &str,
    port: u16,
    state: Arc<GatewayState>,
    shutdown_mode: ShutdownMode,
) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "gateway listening");
    serve(listener, state, shutdown_signal(), shutdown_mode).await
}

/// Serve on an already-bound listener until `signal` resolves.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: Arc<GatewayState>,
    signal: impl Future<Output = ()> + Send + 'static,
    shutdown_mode: ShutdownMode,
) -> anyhow::Result<()> {
    let engine = Arc::clone(&state.engine);
    let app = build_gateway_app(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(signal)
        .await?;

    info!(
        ?shutdown_mode,
        queued = engine.queue_size(),
        "http server stopped, shutting down dispatcher"
    );
    engine.shutdown(shutdown_mode).await;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("received SIGTERM"),
                    _ = tokio::signal::ctrl_c() => info!("received Ctrl-C"),
                }
            },
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM, waiting for Ctrl-C only");
                let _ = tokio::signal::ctrl_c().await;
            },
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("received Ctrl-C");
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let engine = &state.gateway.engine;
    let session = engine.session();
    Json(serde_json::json!({
        "status": "online",
        "whatsapp_ready": session.state == SessionState::Ready,
        "session_state": session.state,
        "last_error": session.last_error,
        "session_started_at": session.started_at,
        "queue_size": engine.queue_size(),
        "total_tasks": engine.total_tasks(),
        "version": state.gateway.version,
    }))
}

/// Screenshot of the chat client while it waits for the QR code to be scanned.
async fn qr_handler(State(state): State<AppState>) -> Response {
    let engine = &state.gateway.engine;
    let session = engine.session();

    match session.state {
        SessionState::Ready => {
            return (
                StatusCode::OK,
                Json(serde_json::json!({ "message": "channel already connected" })),
            )
                .into_response();
        },
        SessionState::Failed => {
            let reason = session
                .last_error
                .unwrap_or_else(|| "channel failed to start".into());
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "message": reason })),
            )
                .into_response();
        },
        _ => {},
    }
    if !engine.has_channel() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "message": "channel not initialized" })),
        )
            .into_response();
    }

    match engine.capture_screen().await {
        Ok(png) => ([(header::CONTENT_TYPE, "image/png")], png).into_response(),
        Err(e) => ApiError::internal(format!("failed to capture screen: {e}")).into_response(),
    }
}
