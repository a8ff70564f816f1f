//! Machine provisioning core
//!
//! Correlates a cluster-managed machine with a bare-metal resource held in
//! MAAS and keeps the two in sync across create and delete under partial
//! failure. The create path is a short saga with compensation: allocate,
//! deploy, verify an address was assigned, then durably bind the MAAS
//! system ID, releasing the machine if any step after allocation fails.
//!
//! The inventory client and the binding store arrive through the
//! [`Provisioner`] constructor, so tests run the full saga against the
//! mock client and an in-memory store.

pub mod binding;
pub mod error;
pub mod models;
pub mod saga;

#[cfg(test)]
mod saga_test;

pub use binding::{BindingError, BindingRecord, BindingStore};
#[cfg(any(test, feature = "test-util"))]
pub use binding::MemoryBindingStore;
pub use error::ProvisionError;
pub use models::{MachineRequest, ProvisioningResult};
pub use saga::Provisioner;
