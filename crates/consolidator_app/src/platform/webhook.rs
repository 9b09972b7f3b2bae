//! Local stand-in for the error-report spreadsheet webhook.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use consolidator_client::{
    handle_report_body, service_description, InMemoryWorkbookStore, WebhookResponse,
};
use consolidator_logging::{con_info, con_warn};
use tokio::sync::Mutex;

use super::persistence::{load_store, save_store};

pub struct WebhookState {
    store: Mutex<InMemoryWorkbookStore>,
    store_path: PathBuf,
}

impl WebhookState {
    pub fn open(store_path: PathBuf) -> Self {
        Self {
            store: Mutex::new(load_store(&store_path)),
            store_path,
        }
    }
}

pub async fn serve(bind: SocketAddr, store_path: PathBuf) -> Result<()> {
    let state = Arc::new(WebhookState::open(store_path));
    let app = build_router(state);

    con_info!("webhook listening on {}", bind);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

pub fn build_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/", get(describe).post(receive))
        .with_state(state)
}

async fn describe() -> Json<serde_json::Value> {
    Json(service_description(Utc::now()))
}

/// Always answers 200; failures are reported in the body.
async fn receive(State(state): State<Arc<WebhookState>>, body: String) -> Json<WebhookResponse> {
    // The lock is held until the file is written so saves land in order.
    let mut store = state.store.lock().await;
    let reply = handle_report_body(&mut *store, &body, Utc::now());
    if !reply.success {
        con_warn!("webhook rejected payload: {:?}", reply.error);
        return Json(reply);
    }

    let snapshot = store.clone();
    let path = state.store_path.clone();
    if let Err(err) = tokio::task::spawn_blocking(move || save_store(&path, &snapshot)).await {
        con_warn!("saving workbook store did not finish: {}", err);
    }
    Json(reply)
}
