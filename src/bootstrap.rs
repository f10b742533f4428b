use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{sync::Arc, time::Duration};
use tracing::{error, info, warn};

use crate::{
    config::Config, error::AppResult, ledger::LedgerRepository, server::AppState,
    storage::HttpBillStore, vendor::VendorRepository,
};

pub async fn initialize_app_state(config: &Config) -> AppResult<AppState> {
    info!("Initializing application components ...");

    // Database pool
    let pool = initialize_database(&config.database_url).await?;

    // Core components
    let vendors = Arc::new(VendorRepository::new(pool.clone()));
    let ledger = Arc::new(LedgerRepository::new(pool.clone()));
    info!("✅ Vendor and ledger repositories initialized");

    // Bill attachment store
    let bill_store = Arc::new(HttpBillStore::new(config.bill_store_url.clone()));
    info!("✅ Bill store initialized: {}", config.bill_store_url);

    // Spool directory for incoming bill uploads
    let upload_dir = std::path::PathBuf::from(&config.upload_dir);
    tokio::fs::create_dir_all(&upload_dir)
        .await
        .map_err(|e| crate::error::AppError::Config(format!("Cannot create upload dir: {}", e)))?;
    info!("✅ Upload spool directory ready: {}", upload_dir.display());

    let state = AppState {
        vendors,
        ledger: ledger.clone(),
        bill_store,
        upload_dir,
    };

    // Background audit: periodically re-derive each vendor's pending balance
    // from its ledger and flag any drift from the stored running total.
    let audit_ledger = ledger.clone();
    let interval = Duration::from_secs(config.reconcile_interval_secs);
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;

            match audit_ledger.find_balance_drift().await {
                Ok(drifted) => {
                    for drift in &drifted {
                        warn!(
                            "⚠️ Balance drift on vendor {}: stored pending {} but ledger implies {}",
                            drift.vendor_id,
                            drift.pending_amount,
                            drift.expected_pending()
                        );
                    }
                    if drifted.is_empty() {
                        info!("✓ Balance audit clean");
                    }
                }
                Err(e) => error!("Balance audit failed: {:?}", e),
            }
        }
    });
    info!(
        "✅ Balance audit task started (every {}s)",
        config.reconcile_interval_secs
    );

    Ok(state)
}

async fn initialize_database(database_url: &str) -> AppResult<PgPool> {
    info!("📊 Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(50)
        .min_connections(5)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await?;

    // Run migrations
    info!("🔄 Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    info!("✓ Database initialized");
    Ok(pool)
}
