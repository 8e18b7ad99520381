//! Recap agent binary entrypoint.
//! Boots the Axum HTTP server: chat route, metrics, and the exported frontend.

use recap_agent::api::{self, AppState};
use recap_agent::chat::classify::MAX_POST_COUNT;
use recap_agent::config::AppConfig;
use recap_agent::telemetry::Metrics;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - RECAP_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("RECAP_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("recap_agent=debug,info"));

    // the runtime may already have installed a subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    enable_dev_tracing();

    let cfg = AppConfig::load_default()?;
    let state = AppState::from_config(&cfg)?;

    let mut router = api::create_router(state);
    match Metrics::init(MAX_POST_COUNT) {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => tracing::warn!(error = ?e, "metrics disabled"),
    }
    let router = api::with_static_frontend(router, &cfg.static_dir);

    Ok(router.into())
}
