use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use inventory_service::api::{self, AppState};
use inventory_service::auth::Authenticator;
use inventory_service::config::Args;
use inventory_service::db;
use inventory_service::rate_limit::RateLimiter;
use inventory_service::service::InventoryService;
use inventory_service::store::{InventoryStore, MemoryInventoryStore, PgInventoryStore};
use inventory_service::sweeper::ExpirySweeper;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let store: Arc<dyn InventoryStore> = if args.in_memory {
        info!("Using in-memory inventory store");
        Arc::new(MemoryInventoryStore::new())
    } else {
        db::run_migrations(&args.database_url)?;
        let pool = db::connect(&args.database_url, args.pool_size, args.db_timeout()).await?;
        Arc::new(PgInventoryStore::new(pool, args.db_timeout()))
    };
    let service = InventoryService::with_system_clock(store);

    let sweeper = ExpirySweeper::new(service.clone(), args.sweep_interval());
    tokio::spawn(async move {
        sweeper.run().await;
    });

    let limiter = RateLimiter::new(args.rate_limit_max, args.rate_limit_window());
    let evictor = limiter.clone();
    tokio::spawn(async move {
        evictor.run_eviction().await;
    });

    let app_state = AppState {
        service,
        pagination: args.page_defaults(),
        auth: Authenticator::from_secret(args.jwt_secret.as_deref()),
        limiter,
    };

    let app = api::create_router(app_state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.port)).await?;

    info!("Inventory service web server started on port {}", args.port);
    info!(
        "Inventory service ready to accept HTTP requests at http://0.0.0.0:{}/api/inventory",
        args.port
    );

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
