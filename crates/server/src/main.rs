//! Schema migration entry point for the vitrine relationship engine.

use tracing::{info, warn};
use vitrine_common::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv = dotenvy::dotenv();

    let config = Config::load()?;
    vitrine_common::logging::init(&config.logging)?;

    if let Err(e) = dotenv {
        if !e.not_found() {
            warn!(error = %e, "Failed to read .env file");
        }
    }

    info!("Starting vitrine migrations...");

    let db = vitrine_db::init(&config.database).await?;
    info!("Connected to database");

    vitrine_db::migrate(&db).await?;
    info!("Migrations completed");

    Ok(())
}
