//! Screenshot Extraction Service — Binary Entrypoint
//! Boots the Axum HTTP server: settings, shared state, routes, metrics.
//!
//! See `README.md` for quickstart.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wechat_card_extractor::api;
use wechat_card_extractor::config::Settings;
use wechat_card_extractor::metrics::Metrics;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("wechat_card_extractor=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let settings = Settings::load().context("loading settings")?;
    info!(
        bind = %settings.bind_addr,
        model = %settings.vision.model,
        records = %settings.records_path,
        max_concurrency = settings.max_concurrency,
        "starting card extractor"
    );

    let metrics = Metrics::init(settings.max_concurrency);
    let state = api::AppState::new(&settings);
    let router = api::create_router(state).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("binding {}", settings.bind_addr))?;
    info!("listening on {}", settings.bind_addr);
    axum::serve(listener, router)
        .await
        .context("serving HTTP")?;
    Ok(())
}
