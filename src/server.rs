use axum::{
    routing::{delete, get, post, put},
    Json, Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    ledger::handlers::{add_transaction, delete_transaction, update_transaction},
    ledger::LedgerRepository,
    middleware::cors::create_cors_layer,
    storage::BillStore,
    vendor::handlers::{create_vendor, delete_vendor, get_vendor, list_vendors, update_vendor},
    vendor::VendorRepository,
};

#[derive(Clone)]
pub struct AppState {
    pub vendors: Arc<VendorRepository>,
    pub ledger: Arc<LedgerRepository>,
    pub bill_store: Arc<dyn BillStore>,
    pub upload_dir: PathBuf,
}

pub async fn create_app(state: AppState) -> Router {
    info!("⚙️ Setting up HTTP routes...");

    let app = Router::new()
        // Public health check endpoint
        .route("/health", get(health_check))
        .nest(
            "/api/v1/vendors",
            Router::new()
                .route("/", post(create_vendor).get(list_vendors))
                .route(
                    "/:id",
                    get(get_vendor).put(update_vendor).delete(delete_vendor),
                )
                .route("/:id/transactions", post(add_transaction))
                .route("/transactions/:transaction_id", put(update_transaction))
                .route(
                    "/:id/transactions/:transaction_id",
                    delete(delete_transaction),
                ),
        )
        .layer(CompressionLayer::new())
        .layer(create_cors_layer())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        // Add request tracing
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("✓ HTTP routes configured");
    app
}

pub async fn run_server(app: Router, bind_address: &str) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("🌐 Server listening on: {}", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
