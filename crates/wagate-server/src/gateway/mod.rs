//! HTTP gateway
//!
//! Control API for trusted callers, the viewer WebSocket at `/ws` and a small
//! control panel page at `/`.

pub mod handlers;
pub mod state;
pub mod websocket;

use std::future::Future;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use wagate_core::Coordinator;

use state::AppState;

/// Build the axum router with all gateway routes.
///
/// An empty `cors_origins` list allows any origin.
pub fn build_router(coordinator: Coordinator, cors_origins: &[HeaderValue]) -> Router {
    let allow_origin = if cors_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(cors_origins.iter().cloned())
    };

    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let csp = SetResponseHeaderLayer::overriding(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; script-src 'self' 'unsafe-inline'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; connect-src 'self' ws: wss:",
        ),
    );

    Router::new()
        .route("/", get(handlers::serve_control_panel))
        .route("/ws", get(websocket::ws_handler))
        .route("/status", get(handlers::get_status))
        .route("/qr", get(handlers::get_qr))
        .route("/send-message", post(handlers::send_message))
        .route("/logout", post(handlers::logout))
        .route("/restart", post(handlers::restart))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .concurrency_limit(64)
                .layer(cors)
                .layer(csp),
        )
        .with_state(AppState::new(coordinator))
}

/// Serve the router until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(
            "Gateway listening at http://{} (viewer WebSocket at ws://{}/ws)",
            addr, addr
        );
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
