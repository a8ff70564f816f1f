//! Kube-backed binding store.
//!
//! Persists the machine-to-provider binding on the Machine object's
//! `spec.providerID` field. Writes go through `replace` carrying the
//! resourceVersion observed at read time, so the API server enforces
//! the compare-and-swap the saga's conditional write contract needs.

use crds::Machine;
use kube::api::{Api, PostParams};
use kube::Error as KubeError;
use provisioner::{BindingError, BindingRecord, BindingStore};

/// Binding store over persisted Machine objects
pub struct KubeBindingStore {
    api: Api<Machine>,
}

impl KubeBindingStore {
    /// Create a store over the given Machine API handle
    pub fn new(api: Api<Machine>) -> Self {
        Self { api }
    }

    fn map_kube(machine_id: &str, err: KubeError) -> BindingError {
        match &err {
            KubeError::Api(response) if response.code == 404 => {
                BindingError::NotFound(machine_id.to_string())
            }
            KubeError::Api(response) if response.code == 409 => {
                BindingError::Conflict(format!(
                    "binding write for {} rejected: {}",
                    machine_id, response.message
                ))
            }
            _ => BindingError::Store(err.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl BindingStore for KubeBindingStore {
    async fn get(&self, machine_id: &str) -> Result<BindingRecord, BindingError> {
        match self.api.get_opt(machine_id).await {
            Ok(Some(obj)) => Ok(BindingRecord {
                machine_id: machine_id.to_string(),
                provider_id: obj.spec.provider_id.clone(),
                revision: obj.metadata.resource_version.clone(),
            }),
            Ok(None) => Ok(BindingRecord::unbound(machine_id)),
            Err(e) => Err(BindingError::Store(e.to_string())),
        }
    }

    async fn bind(&self, record: &BindingRecord, provider_id: &str) -> Result<(), BindingError> {
        let Some(revision) = record.revision.as_deref() else {
            // Not yet persisted: the binding has to travel with the
            // admission patch instead.
            return Err(BindingError::Conflict(format!(
                "machine {} does not exist yet",
                record.machine_id
            )));
        };

        let mut obj = self
            .api
            .get(&record.machine_id)
            .await
            .map_err(|e| Self::map_kube(&record.machine_id, e))?;
        if obj.metadata.resource_version.as_deref() != Some(revision)
            || obj.spec.provider_id.is_some()
        {
            return Err(BindingError::Conflict(format!(
                "binding for {} changed since it was read",
                record.machine_id
            )));
        }

        obj.spec.provider_id = Some(provider_id.to_string());
        self.api
            .replace(&record.machine_id, &PostParams::default(), &obj)
            .await
            .map_err(|e| Self::map_kube(&record.machine_id, e))?;
        Ok(())
    }

    async fn clear(&self, record: &BindingRecord) -> Result<(), BindingError> {
        let mut obj = self
            .api
            .get(&record.machine_id)
            .await
            .map_err(|e| Self::map_kube(&record.machine_id, e))?;
        if obj.spec.provider_id != record.provider_id {
            return Err(BindingError::Conflict(format!(
                "binding for {} changed since it was read",
                record.machine_id
            )));
        }

        obj.spec.provider_id = None;
        self.api
            .replace(&record.machine_id, &PostParams::default(), &obj)
            .await
            .map_err(|e| Self::map_kube(&record.machine_id, e))?;
        Ok(())
    }
}
