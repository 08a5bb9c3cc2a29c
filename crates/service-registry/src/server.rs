//! HTTP frontend for the registry
//!
//! `POST /services` admits a JSON registration, `DELETE /services` removes the
//! service whose URL is the raw request body. Other methods get 405.

use crate::{error::Result, models::Registration, registry::Registry};
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::StatusCode,
    routing::post,
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Largest accepted `DELETE /services` body
pub const MAX_DEREGISTRATION_BYTES: usize = 8 * 1024;

/// Build the registry router
pub fn router(registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/services", post(register_service).delete(deregister_service))
        .with_state(registry)
}

/// Serve the registry on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, registry: Arc<Registry>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("Registry listening on {}", listener.local_addr()?);
    axum::serve(listener, router(registry))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn register_service(State(registry): State<Arc<Registry>>, body: Bytes) -> StatusCode {
    debug!("Registration request received");

    let registration: Registration = match serde_json::from_slice(&body) {
        Ok(registration) => registration,
        Err(e) => {
            warn!("Malformed registration: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };

    match registry.add(registration).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            warn!("Registration failed: {}", e);
            StatusCode::BAD_REQUEST
        }
    }
}

async fn deregister_service(State(registry): State<Arc<Registry>>, body: Body) -> StatusCode {
    debug!("Deregistration request received");

    let payload = match axum::body::to_bytes(body, MAX_DEREGISTRATION_BYTES).await {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Failed to read deregistration body: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };
    let url = String::from_utf8_lossy(&payload);
    let url = url.trim();

    info!("Deleting service at URL: {}", url);
    match registry.remove(url).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            warn!("Deregistration failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
