//! HTTP binding: one POST request per RPC call, JSON-RPC envelope in the
//! body, served by axum on a locally built runtime so the rest of the crate
//! stays synchronous. Each request gets its own session.

use super::{PARSE_ERROR, Registry, RpcRequest, RpcResponse, Session, error_response};
use crate::config::Config;
use crate::tags::scan::ScanOptions;
use anyhow::{Context, Result};
use axum::{Json, Router, extract::DefaultBodyLimit, extract::State, routing::post};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

struct HttpState {
    registry: Registry,
    scan: ScanOptions,
}

/// Router serving the RPC endpoint; one POST to `/` per call.
pub fn router(scan: ScanOptions) -> Router {
    let state = Arc::new(HttpState {
        registry: Registry::new(),
        scan,
    });
    Router::new()
        .route("/", post(handle_rpc))
        .layer(DefaultBodyLimit::max(Config::get().http_body_limit))
        .with_state(state)
}

pub fn serve_http(addr: &str, scan: ScanOptions) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("build http runtime")?;
    runtime.block_on(async move {
        let app = router(scan);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("bind {addr}"))?;
        info!(%addr, "http listening");
        axum::serve(listener, app).await.context("http server")
    })
}

async fn handle_rpc(State(state): State<Arc<HttpState>>, body: String) -> Json<RpcResponse> {
    let req = match serde_json::from_str::<RpcRequest>(&body) {
        Ok(req) => req,
        Err(err) => {
            return Json(error_response(
                Value::Null,
                PARSE_ERROR,
                &format!("invalid request: {err}"),
            ));
        }
    };

    // Dispatch runs the external tagging tool; keep it off the async
    // workers.
    let response = tokio::task::spawn_blocking(move || {
        let mut session = Session::new(state.scan);
        state.registry.handle_request(&mut session, req)
    })
    .await
    .unwrap_or_else(|_| {
        error_response(
            Value::Null,
            super::INTERNAL_ERROR,
            "internal error: request worker failed",
        )
    });
    Json(response)
}
