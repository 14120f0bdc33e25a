use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ledger_engine::config::Config;
use ledger_engine::engine::TransactionEngine;
use ledger_engine::handlers::{self, AppState};
use ledger_engine::seed;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ledger_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    tracing::info!("Starting ledger engine");
    tracing::info!(database_url = %config.database_url, "Database configuration loaded");

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Migrations completed successfully");

    tracing::info!("Seeding asset types and system wallets...");
    let assets = Arc::new(seed::seed(&pool).await?);
    tracing::info!("Seeding completed successfully");

    let engine = TransactionEngine::new(pool, Arc::clone(&assets), &config);
    let state = AppState { engine, assets };

    let app = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/v1/transactions/topup", post(handlers::topup))
        .route("/api/v1/transactions/bonus", post(handlers::bonus))
        .route("/api/v1/transactions/spend", post(handlers::spend))
        .route("/api/v1/wallets/:user_id/balance", get(handlers::get_balance))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Ledger engine listening on {}", addr);
    tracing::info!("  POST   /api/v1/transactions/topup          - Topup (treasury -> user)");
    tracing::info!("  POST   /api/v1/transactions/bonus           - Bonus (marketing -> user)");
    tracing::info!("  POST   /api/v1/transactions/spend           - Spend (user -> revenue)");
    tracing::info!("  GET    /api/v1/wallets/:user_id/balance      - Get balance");
    tracing::info!("  GET    /health                               - Health check");

    axum::serve(listener, app).await?;

    Ok(())
}
