//! `abwright serve`: start the HTTP gateway.

use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("abwright gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Cookie: {}", config.assignment.cookie_name);
    println!("   Local experiments: {}", config.experiments.len());
    if config.assignment.has_remote_source() {
        println!("   Remote source: {}", config.assignment.remote_source);
    }

    abwright_gateway::start(config).await?;

    Ok(())
}
