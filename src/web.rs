#![cfg(not(tarpaulin_include))]

use stock_viewer::{Settings, app};

/// Main entry point for the stock viewer
///
/// Loads `.env` if present, initialises logging and runs the web server.
///
/// # Default Configuration
/// * Listens on `127.0.0.1:8501` unless `BIND_ADDR` says otherwise
/// * Logs at `info` unless `RUST_LOG` says otherwise
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::from_env()?;
    app::run(settings).await
}
