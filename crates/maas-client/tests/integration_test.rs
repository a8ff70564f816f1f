//! Integration tests for the MAAS client
//!
//! These tests require a running MAAS instance.
//! Set MAAS_API_URL and MAAS_API_KEY environment variables to run.

use maas_client::{AllocateArgs, MaasClient, MaasClientTrait};

fn client_from_env() -> MaasClient {
    let url = std::env::var("MAAS_API_URL")
        .unwrap_or_else(|_| "http://localhost:5240/MAAS".to_string());
    let version = std::env::var("MAAS_API_VERSION").unwrap_or_else(|_| "2.0".to_string());
    let key = std::env::var("MAAS_API_KEY")
        .expect("MAAS_API_KEY environment variable must be set");

    MaasClient::new(url, version, &key).expect("Failed to create client")
}

#[tokio::test]
#[ignore] // Requires running MAAS instance
async fn test_version() {
    let client = client_from_env();

    let version = client.version().await.expect("Failed to get version");
    println!("MAAS version {} ({})", version.version, version.subversion);
    assert!(!version.version.is_empty());
}

#[tokio::test]
#[ignore]
async fn test_list_machines() {
    let client = client_from_env();

    let machines = client.machines(&[]).await.expect("Failed to list machines");
    println!("Found {} machines", machines.len());
}

#[tokio::test]
#[ignore]
async fn test_allocate_and_release() {
    let client = client_from_env();

    // Allocate any free machine, then return it to the pool untouched.
    let machine = client
        .allocate(&AllocateArgs::default())
        .await
        .expect("Failed to allocate machine");
    println!("Allocated {}", machine.system_id);

    client
        .release(&[machine.system_id.clone()])
        .await
        .expect("Failed to release machine");

    // Release is idempotent from the caller's perspective.
    client
        .release(&[machine.system_id])
        .await
        .expect("Second release should map to success");
}
