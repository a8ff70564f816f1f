//! MAAS REST API Client
//!
//! A Rust client library for the MAAS (Metal as a Service) REST API,
//! covering the machine lifecycle operations the admission webhook needs:
//! allocate, deploy, release and list.
//!
//! # Example
//!
//! ```no_run
//! use maas_client::{MaasClient, MaasClientTrait, AllocateArgs, DeployArgs};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Create a client from an API key of the form consumer:token:secret
//! let client = MaasClient::new(
//!     "http://maas:5240/MAAS".to_string(),
//!     "2.0".to_string(),
//!     "consumer:token:secret",
//! )?;
//!
//! // Allocate a free machine carrying a tag
//! let args = AllocateArgs {
//!     tags: vec!["worker".to_string()],
//!     hostname: None,
//! };
//! let machine = client.allocate(&args).await?;
//!
//! // Deploy it and read back the assigned addresses
//! let deploy = DeployArgs {
//!     distro_series: Some("noble".to_string()),
//!     ..DeployArgs::default()
//! };
//! let deployed = client.deploy(&machine.system_id, &deploy).await?;
//! println!("{} booted with {:?}", deployed.system_id, deployed.ip_addresses);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Machine lifecycle**: allocate, deploy, release, list by system ID
//! - **OAuth 1.0 PLAINTEXT**: the authentication scheme MAAS API keys use
//! - **Mockable**: `MaasClientTrait` seam with an in-memory mock behind the
//!   `test-util` feature

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod maas_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::MaasClient;
pub use error::MaasError;
pub use maas_trait::MaasClientTrait;
pub use models::*;
#[cfg(feature = "test-util")]
pub use mock::MockMaasClient;
