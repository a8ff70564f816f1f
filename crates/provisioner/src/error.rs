//! Provisioning error taxonomy.
//!
//! Each variant corresponds to one failure class of the saga and tells the
//! caller whether compensation already ran: `Allocation` reserved nothing,
//! `Deployment` and `BindingConflict` are returned after the allocated
//! machine was released, and `PartialFailure` means that release itself
//! failed and the machine may be leaked.

use crate::binding::BindingError;
use thiserror::Error;

/// Errors surfaced by the provisioning core
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// No machine was available or the inventory was unreachable.
    /// Terminal: nothing was reserved, no compensation ran.
    #[error("allocation failed: {0}")]
    Allocation(String),

    /// Deploy failed or the deployed machine reported no address.
    /// The allocated machine has been released.
    #[error("deployment of {provider_id} failed: {reason}")]
    Deployment {
        /// System ID of the machine that was being deployed
        provider_id: String,
        /// What went wrong
        reason: String,
    },

    /// The binding write was rejected or lost a race.
    /// Any machine allocated by this call has been released.
    #[error("binding conflict: {0}")]
    BindingConflict(String),

    /// A direct release failed; the binding was left in place so the
    /// machine is not lost track of.
    #[error("release of {provider_ids:?} failed: {reason}")]
    Release {
        /// System IDs the release call covered
        provider_ids: Vec<String>,
        /// What went wrong
        reason: String,
    },

    /// Delete was called for a machine that was never bound.
    #[error("machine {0} has not been provisioned")]
    NotProvisioned(String),

    /// The inventory returned more than one record for a single
    /// provider ID.
    #[error("inventory holds {count} machines for provider ID {provider_id}, expected exactly one")]
    AmbiguousState {
        /// The provider ID that was looked up
        provider_id: String,
        /// How many records came back
        count: usize,
    },

    /// Compensation failed after another error: the original failure is in
    /// `source` and the named machine may still be allocated in MAAS.
    #[error("machine {provider_id} may be leaked: release failed ({release_error}) while compensating for: {source}")]
    PartialFailure {
        /// System ID of the possibly leaked machine
        provider_id: String,
        /// The error that triggered compensation
        source: Box<ProvisionError>,
        /// Why the compensating release failed
        release_error: String,
    },

    /// Inventory lookup failed outside the create path (exist check).
    #[error("inventory error: {0}")]
    Inventory(String),
}

impl From<BindingError> for ProvisionError {
    fn from(err: BindingError) -> Self {
        // Every binding store failure mode denies the write; the caller
        // cannot tell a lost race from a stale revision and handles both
        // the same way.
        ProvisionError::BindingConflict(err.to_string())
    }
}
