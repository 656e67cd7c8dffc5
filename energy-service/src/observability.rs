use tracing_subscriber::EnvFilter;

/// Structured log output; `RUST_LOG` takes precedence over the built-in
/// default of info-level service logs.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,energy_service=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
