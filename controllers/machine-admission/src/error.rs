//! Controller-specific error types.
//!
//! This module defines error types specific to the machine admission
//! webhook that are not covered by upstream library errors.

use crate::config::ConfigError;
use kube::Error as KubeError;
use maas_client::MaasError;
use thiserror::Error;

/// Errors that can occur in the machine admission webhook.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// MAAS API error
    #[error("MAAS error: {0}")]
    Maas(#[from] MaasError),

    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Server socket or I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
