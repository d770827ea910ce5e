//! `abwright catalog`: print the merged experiment catalog.

use std::path::Path;

use abwright_catalog::CatalogLoader;
use abwright_core::Environment;
use tracing::{info, warn};

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let loader = CatalogLoader::from_config(&config, Environment::Server);
    let catalog = loader.load().await;

    if catalog.is_empty() {
        warn!("No experiments configured");
    } else {
        info!(count = catalog.len(), remote = loader.has_remote(), "Catalog loaded");
    }
    println!("{}", serde_json::to_string_pretty(&catalog)?);

    Ok(())
}
