//! MaasClient trait for mocking
//!
//! This trait abstracts the MaasClient to enable mocking in unit tests.
//! The concrete MaasClient implements this trait, and tests can use mock
//! implementations.

use crate::error::MaasError;
use crate::models::*;

/// Trait for MAAS API client operations
///
/// This trait enables mocking of MAAS API calls for unit testing.
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait MaasClientTrait: Send + Sync {
    /// Get the base URL
    fn base_url(&self) -> &str;

    /// Check connectivity and credentials
    async fn version(&self) -> Result<MaasVersion, MaasError>;

    /// Allocate one free machine matching the constraints
    async fn allocate(&self, args: &AllocateArgs) -> Result<Machine, MaasError>;

    /// Deploy an allocated machine with the given image arguments
    async fn deploy(&self, system_id: &str, args: &DeployArgs) -> Result<Machine, MaasError>;

    /// Return machines to the free pool (idempotent for the caller)
    async fn release(&self, system_ids: &[String]) -> Result<(), MaasError>;

    /// List machines by system ID; unknown IDs are absent from the result
    async fn machines(&self, system_ids: &[String]) -> Result<Vec<Machine>, MaasError>;
}
