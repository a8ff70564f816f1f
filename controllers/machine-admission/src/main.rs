//! Machine Admission Webhook
//!
//! Mutating admission webhook that provisions a MAAS machine for every
//! Machine object admitted into the cluster, and releases it again when
//! the object is deleted. The provisioning itself (allocate, deploy,
//! verify, bind, with compensation on partial failure) lives in the
//! `provisioner` crate; this binary wires configuration, the MAAS
//! client, the kube-backed binding store and the HTTP server together.

mod binding;
mod config;
mod error;
mod handler;
#[cfg(test)]
mod handler_test;
mod server;

use crate::binding::KubeBindingStore;
use crate::config::Config;
use crate::error::ControllerError;
use crate::handler::AppState;
use crds::Machine;
use kube::{Api, Client};
use maas_client::MaasClient;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt::init();

    info!("Starting Machine Admission Webhook");

    let config = Config::from_env()?;
    info!("Configuration:");
    info!("  MAAS URL: {}", config.maas_api_url);
    info!("  API version: {}", config.maas_api_version);
    info!("  Bind address: {}", config.bind_addr);
    info!(
        "  Namespace: {}",
        config.namespace.as_deref().unwrap_or("default")
    );

    let maas_client = MaasClient::new(
        config.maas_api_url.clone(),
        config.maas_api_version.clone(),
        &config.maas_api_key,
    )?;

    let kube_client = Client::try_default().await?;
    let namespace = config.namespace.as_deref().unwrap_or("default");
    let machine_api: Api<Machine> = Api::namespaced(kube_client, namespace);

    let state = Arc::new(AppState {
        inventory: Arc::new(maas_client),
        bindings: Arc::new(KubeBindingStore::new(machine_api)),
        default_image: config.default_image.clone(),
        call_timeout: config.call_timeout,
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Admission server listening on {}", config.bind_addr);
    axum::serve(listener, server::router(state)).await?;

    Ok(())
}
