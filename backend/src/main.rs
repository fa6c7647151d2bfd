use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn, Level};

mod config;
mod db;
mod domain;
mod extract;
mod normalize;
mod rest;
mod upload;

use config::AppConfig;
use db::Database;
use domain::ExpenseService;
use extract::ExtractionClient;
use rest::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    // Load .env for local development, then resolve configuration
    dotenv::dotenv().ok();
    let config = AppConfig::from_env()?;
    info!("Running in {:?} mode", config.environment);

    info!("Setting up database");
    let db = Database::connect(&config.database_url).await?;

    // Uploaded receipts live under the configured directory
    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let expenses = ExpenseService::new(db);
    let extraction = config
        .openai_api_key
        .clone()
        .map(|key| Arc::new(ExtractionClient::new(key)));
    if extraction.is_none() {
        warn!("OPENAI_API_KEY not set; receipt extraction is disabled");
    }

    let state = AppState::new(expenses, extraction, config.upload_dir.clone());

    // CORS setup to allow the frontend to make requests
    let cors = match &config.cors_origin {
        Some(origin) => CorsLayer::new().allow_origin(origin.parse::<HeaderValue>()?),
        None => CorsLayer::new().allow_origin(Any),
    }
    .allow_methods([Method::GET, Method::POST, Method::DELETE])
    .allow_headers(Any);

    let app = rest::router(state, &config.static_dir).layer(cors);

    // Start the server
    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
