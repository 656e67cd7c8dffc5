use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use energy_service::{
    api::{self, AppState},
    config::AppConfig,
    metrics_server, observability,
    stores::PgStore,
    EnergyService, ReportEngine,
};
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(&cfg.database.uri)
        .await?;

    let store = Arc::new(PgStore::new(pool));
    store.ensure_schema().await?;

    let engine = ReportEngine::new(store.clone(), store.clone(), cfg.pricing);
    let service = Arc::new(EnergyService::new(store.clone(), store, engine));

    let state = AppState {
        service,
        default_anomaly_threshold_pct: cfg.anomaly.default_threshold_pct,
    };
    let app = api::router(state);

    let addr: SocketAddr = cfg
        .http
        .bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid http.bind_addr: {e}"))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "energy service listening");
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
