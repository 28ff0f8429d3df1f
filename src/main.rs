mod config;
mod handlers;
mod models;
mod services;
mod web;

use anyhow::{Context, Result};
use dotenv::dotenv;
use std::sync::Arc;

use config::Config;
use services::{GeminiGateway, InferenceGateway};
use web::create_router;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables first so RUST_LOG from .env applies
    dotenv().ok();

    // Initialize logger
    env_logger::init();

    log::info!("🚀 Starting Nutritional Image Analyzer...");

    let config = Config::from_env().context("Error configuring Gemini API")?;
    log::debug!("⚙️ Loaded configuration: {:?}", config);

    let gateway = Arc::new(GeminiGateway::new(&config));

    match gateway.verify_credential().await {
        Ok(()) => log::info!("✅ Gemini API key accepted for model: {}", gateway.model()),
        Err(e) if e.is_authentication() => {
            return Err(anyhow::Error::new(e).context(
                "Error configuring Gemini API. Please ensure your 'Google_API_KEY' is correctly set in your .env file.",
            ));
        }
        Err(e) => log::warn!("⚠️ Could not verify Gemini API key, continuing: {}", e),
    }

    let app = create_router(
        gateway.clone() as Arc<dyn InferenceGateway>,
        config.max_upload_bytes,
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    log::info!("🌐 Server listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    log::info!("🛑 Shutting down...");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("❌ Failed to listen for Ctrl+C: {}", e);
    }
}
