use std::net::SocketAddr;

use anyhow::Context;
use axum::{routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static RECORDER: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder and serve `GET /metrics` on a dedicated
/// listener, so scrapes never contend with API traffic. Calling this more
/// than once keeps the first recorder and is a no-op.
pub fn init(bind_addr: &str) -> anyhow::Result<()> {
    if RECORDER.get().is_some() {
        return Ok(());
    }

    let addr: SocketAddr = bind_addr.parse().context("invalid metrics bind address")?;
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;
    let _ = RECORDER.set(handle);

    tokio::spawn(async move {
        let app = Router::new().route("/metrics", get(render));
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!(error = %e, %addr, "failed to bind metrics listener");
                return;
            }
        };
        if let Err(e) = axum::serve(listener, app.into_make_service()).await {
            tracing::error!(error = %e, "metrics server exited");
        }
    });

    Ok(())
}

async fn render() -> String {
    RECORDER
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}
