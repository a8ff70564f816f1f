//! Binding store contract.
//!
//! The durable correlation between a cluster machine identifier and its
//! MAAS system ID lives outside this crate (on the Machine object). The
//! saga only ever touches it through this narrow get/bind/clear contract,
//! which keeps the core testable against an in-memory substitute.

use thiserror::Error;

/// The durable machine-to-provider correlation.
///
/// `revision` is the store's opaque version token as observed by `get`;
/// `bind` uses it for a conditional write so concurrent provisioners
/// cannot both bind the same machine. `None` means the record did not
/// exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingRecord {
    /// Cluster-side machine identifier
    pub machine_id: String,
    /// MAAS system ID, absent while unbound
    pub provider_id: Option<String>,
    /// Opaque store revision backing the conditional write
    pub revision: Option<String>,
}

impl BindingRecord {
    /// An unbound record for a machine the store has never seen
    pub fn unbound(machine_id: impl Into<String>) -> Self {
        Self {
            machine_id: machine_id.into(),
            provider_id: None,
            revision: None,
        }
    }
}

/// Errors from the binding store
#[derive(Debug, Error)]
pub enum BindingError {
    /// No record exists for the machine identifier
    #[error("binding for {0} not found")]
    NotFound(String),

    /// The conditional write lost a race or saw a stale revision
    #[error("binding write conflict: {0}")]
    Conflict(String),

    /// Transport or store-side failure
    #[error("binding store error: {0}")]
    Store(String),
}

/// Narrow contract the saga uses to read and write bindings
#[async_trait::async_trait]
pub trait BindingStore: Send + Sync {
    /// Read the current record (and its revision) for a machine
    async fn get(&self, machine_id: &str) -> Result<BindingRecord, BindingError>;

    /// Write the provider ID, conditional on the record being unchanged
    /// since it was read: still unbound and at the same revision.
    async fn bind(&self, record: &BindingRecord, provider_id: &str) -> Result<(), BindingError>;

    /// Remove the provider ID after a confirmed release
    async fn clear(&self, record: &BindingRecord) -> Result<(), BindingError>;
}

#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryBindingStore;

#[cfg(any(test, feature = "test-util"))]
mod memory {
    use super::{BindingError, BindingRecord, BindingStore};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    struct Entry {
        provider_id: Option<String>,
        revision: u64,
    }

    /// In-memory binding store for saga tests.
    ///
    /// Implements the same compare-and-swap semantics the kube-backed
    /// adapter gets from resourceVersion, and can be told to reject the
    /// next bind as if a concurrent writer won the race.
    #[derive(Debug, Default)]
    pub struct MemoryBindingStore {
        entries: Mutex<HashMap<String, Entry>>,
        conflict_on_bind: Mutex<bool>,
    }

    impl MemoryBindingStore {
        /// Create an empty store
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed a bound record (for test setup)
        pub fn seed(&self, machine_id: &str, provider_id: &str) {
            self.entries.lock().unwrap().insert(
                machine_id.to_string(),
                Entry {
                    provider_id: Some(provider_id.to_string()),
                    revision: 1,
                },
            );
        }

        /// Make every `bind` fail with a conflict, simulating a lost race
        pub fn conflict_on_bind(&self) {
            *self.conflict_on_bind.lock().unwrap() = true;
        }

        /// Current provider ID for a machine, if any
        pub fn provider_id(&self, machine_id: &str) -> Option<String> {
            self.entries
                .lock()
                .unwrap()
                .get(machine_id)
                .and_then(|entry| entry.provider_id.clone())
        }
    }

    #[async_trait::async_trait]
    impl BindingStore for MemoryBindingStore {
        async fn get(&self, machine_id: &str) -> Result<BindingRecord, BindingError> {
            let entries = self.entries.lock().unwrap();
            Ok(match entries.get(machine_id) {
                Some(entry) => BindingRecord {
                    machine_id: machine_id.to_string(),
                    provider_id: entry.provider_id.clone(),
                    revision: Some(entry.revision.to_string()),
                },
                None => BindingRecord::unbound(machine_id),
            })
        }

        async fn bind(&self, record: &BindingRecord, provider_id: &str) -> Result<(), BindingError> {
            if *self.conflict_on_bind.lock().unwrap() {
                return Err(BindingError::Conflict(format!(
                    "binding for {} was modified by a concurrent writer",
                    record.machine_id
                )));
            }

            let mut entries = self.entries.lock().unwrap();
            match entries.get_mut(&record.machine_id) {
                None => {
                    if record.revision.is_some() {
                        return Err(BindingError::Conflict(format!(
                            "binding for {} disappeared",
                            record.machine_id
                        )));
                    }
                    entries.insert(
                        record.machine_id.clone(),
                        Entry {
                            provider_id: Some(provider_id.to_string()),
                            revision: 1,
                        },
                    );
                    Ok(())
                }
                Some(entry) => {
                    let expected = record.revision.as_deref();
                    if expected != Some(entry.revision.to_string().as_str())
                        || entry.provider_id.is_some()
                    {
                        return Err(BindingError::Conflict(format!(
                            "binding for {} changed since it was read",
                            record.machine_id
                        )));
                    }
                    entry.provider_id = Some(provider_id.to_string());
                    entry.revision += 1;
                    Ok(())
                }
            }
        }

        async fn clear(&self, record: &BindingRecord) -> Result<(), BindingError> {
            let mut entries = self.entries.lock().unwrap();
            let entry = entries
                .get_mut(&record.machine_id)
                .ok_or_else(|| BindingError::NotFound(record.machine_id.clone()))?;
            if entry.provider_id != record.provider_id {
                return Err(BindingError::Conflict(format!(
                    "binding for {} changed since it was read",
                    record.machine_id
                )));
            }
            entry.provider_id = None;
            entry.revision += 1;
            Ok(())
        }
    }
}
