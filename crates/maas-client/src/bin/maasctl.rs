//! Connectivity smoke tool for the MAAS client.
//!
//! Prints the effective configuration, verifies the API key against the
//! version endpoint, and lists the machines MAAS knows about.

use maas_client::{MaasClient, MaasClientTrait, MaasError};
use std::env;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), MaasError> {
    tracing_subscriber::fmt::init();

    let api_url = env::var("MAAS_API_URL")
        .unwrap_or_else(|_| "http://localhost:5240/MAAS".to_string());
    let api_version = env::var("MAAS_API_VERSION").unwrap_or_else(|_| "2.0".to_string());
    let api_key = env::var("MAAS_API_KEY").map_err(|_| {
        MaasError::Authentication("MAAS_API_KEY environment variable is required".to_string())
    })?;

    info!("Configuration:");
    info!("  MAAS URL: {}", api_url);
    info!("  API version: {}", api_version);

    let client = MaasClient::new(api_url, api_version, &api_key)?;

    let version = client.version().await?;
    info!("Connected to MAAS {} ({})", version.version, version.subversion);

    let machines = client.machines(&[]).await?;
    info!("MAAS reports {} machines", machines.len());
    for machine in machines {
        info!(
            "  {} {} {:?} {:?}",
            machine.system_id, machine.hostname, machine.status_name, machine.ip_addresses
        );
    }

    Ok(())
}
