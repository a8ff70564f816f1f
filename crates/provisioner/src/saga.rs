//! The provisioning saga.
//!
//! Create runs allocate -> deploy -> verify address -> bind, releasing the
//! allocated machine on any failure after allocation so no orphaned MAAS
//! resource survives a failed call. Delete releases first and only clears
//! the binding once the release is confirmed. Exist demands an exact
//! single inventory match.
//!
//! Durable state is only ever Unbound or Bound; everything in between
//! exists for the duration of a single call.

use crate::binding::{BindingError, BindingStore};
use crate::error::ProvisionError;
use crate::models::{MachineRequest, ProvisioningResult};
use maas_client::{AllocateArgs, DeployArgs, MaasClientTrait, MaasError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Orchestrates machine provisioning against MAAS and the binding store.
///
/// Both collaborators arrive through the constructor; tests substitute the
/// mock client and the in-memory store.
pub struct Provisioner {
    inventory: Arc<dyn MaasClientTrait>,
    bindings: Arc<dyn BindingStore>,
    default_image: Option<String>,
    call_timeout: Duration,
}

impl Provisioner {
    /// Create a provisioner.
    ///
    /// `default_image` is deployed when a request carries no image of its
    /// own; `call_timeout` bounds every external call individually.
    pub fn new(
        inventory: Arc<dyn MaasClientTrait>,
        bindings: Arc<dyn BindingStore>,
        default_image: Option<String>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            inventory,
            bindings,
            default_image,
            call_timeout,
        }
    }

    /// Bound an inventory call by the configured deadline.
    async fn inventory_call<T>(
        &self,
        what: &str,
        fut: impl Future<Output = Result<T, MaasError>>,
    ) -> Result<T, MaasError> {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(MaasError::Api(format!(
                "{} exceeded the {:?} call deadline",
                what, self.call_timeout
            ))),
        }
    }

    /// Bound a binding store call by the configured deadline.
    async fn store_call<T>(
        &self,
        what: &str,
        fut: impl Future<Output = Result<T, BindingError>>,
    ) -> Result<T, BindingError> {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(BindingError::Store(format!(
                "{} exceeded the {:?} call deadline",
                what, self.call_timeout
            ))),
        }
    }

    /// Best-effort release of a machine after a failed step.
    ///
    /// On success the original error passes through unchanged; if the
    /// release itself fails the caller gets `PartialFailure` naming the
    /// machine that may still be allocated.
    async fn compensate(&self, provider_id: &str, original: ProvisionError) -> ProvisionError {
        warn!(
            "Releasing machine {} after failed provisioning: {}",
            provider_id, original
        );
        let ids = vec![provider_id.to_string()];
        match self
            .inventory_call("release", self.inventory.release(&ids))
            .await
        {
            Ok(()) => original,
            Err(release_error) => {
                error!(
                    "Failed to release machine {} during compensation: {}",
                    provider_id, release_error
                );
                ProvisionError::PartialFailure {
                    provider_id: provider_id.to_string(),
                    source: Box::new(original),
                    release_error: release_error.to_string(),
                }
            }
        }
    }

    /// Provision a machine: allocate, deploy, verify it has an address,
    /// then durably bind the MAAS system ID to the machine identifier.
    ///
    /// On any failure after allocation the machine is released before the
    /// call returns. The binding write is conditional on the record being
    /// unchanged since the call started, so two concurrent creates for the
    /// same machine cannot both bind; the loser releases its own machine.
    pub async fn create(
        &self,
        request: &MachineRequest,
    ) -> Result<ProvisioningResult, ProvisionError> {
        info!("Creating machine {}", request.machine_id);

        // The record read here is the token for the conditional write in
        // the final step.
        let record = self
            .store_call("binding get", self.bindings.get(&request.machine_id))
            .await?;
        if let Some(bound) = &record.provider_id {
            return Err(ProvisionError::BindingConflict(format!(
                "machine {} is already bound to {}",
                request.machine_id, bound
            )));
        }

        // Step 1: allocate. Failure is terminal, nothing to compensate.
        let allocate_args = AllocateArgs {
            tags: request.tags.iter().cloned().collect(),
            hostname: None,
        };
        let handle = self
            .inventory_call("allocate", self.inventory.allocate(&allocate_args))
            .await
            .map_err(|e| {
                ProvisionError::Allocation(format!(
                    "error allocating machine {}: {}",
                    request.machine_id, e
                ))
            })?;
        let provider_id = handle.system_id.clone();
        info!(
            "Allocated machine {} ({}) for {}",
            provider_id, handle.hostname, request.machine_id
        );

        // Step 2: deploy. The outcome on error is ambiguous (the machine
        // may be mid-boot), so compensation always runs.
        let deploy_args = DeployArgs {
            distro_series: request
                .desired_image
                .clone()
                .or_else(|| self.default_image.clone()),
            ..DeployArgs::default()
        };
        let deployed = match self
            .inventory_call(
                "deploy",
                self.inventory.deploy(&provider_id, &deploy_args),
            )
            .await
        {
            Ok(machine) => machine,
            Err(e) => {
                let deployment = ProvisionError::Deployment {
                    provider_id: provider_id.clone(),
                    reason: e.to_string(),
                };
                return Err(self.compensate(&provider_id, deployment).await);
            }
        };

        // Step 3: a machine without an address is unusable; no polling or
        // waiting here, the caller retries the whole create instead.
        let Some(ip_address) = deployed.ip_addresses.first().cloned() else {
            let deployment = ProvisionError::Deployment {
                provider_id: provider_id.clone(),
                reason: "no IP address assigned".to_string(),
            };
            return Err(self.compensate(&provider_id, deployment).await);
        };

        // Step 4: conditional binding write. A rejection means another
        // writer got there first; this call's machine must not leak.
        if let Err(e) = self
            .store_call("binding write", self.bindings.bind(&record, &provider_id))
            .await
        {
            let conflict = ProvisionError::BindingConflict(format!(
                "failed to bind machine {} to {}: {}",
                request.machine_id, provider_id, e
            ));
            return Err(self.compensate(&provider_id, conflict).await);
        }

        info!(
            "Created machine {} ({}) with address {}",
            request.machine_id, provider_id, ip_address
        );
        Ok(ProvisioningResult {
            provider_id,
            ip_address,
        })
    }

    /// Release a bound machine and clear its binding.
    ///
    /// The binding is only cleared after the release is confirmed; a
    /// failed release surfaces as an error with the binding intact, so a
    /// later retry can find the machine again.
    pub async fn delete(
        &self,
        request: &MachineRequest,
        provider_id: Option<&str>,
    ) -> Result<(), ProvisionError> {
        let Some(provider_id) = provider_id else {
            warn!(
                "Cannot delete machine {}, no provider ID bound",
                request.machine_id
            );
            return Err(ProvisionError::NotProvisioned(request.machine_id.clone()));
        };

        info!(
            "Deleting machine {} ({})",
            request.machine_id, provider_id
        );

        let ids = vec![provider_id.to_string()];
        self.inventory_call("release", self.inventory.release(&ids))
            .await
            .map_err(|e| ProvisionError::Release {
                provider_ids: ids.clone(),
                reason: e.to_string(),
            })?;

        // Release confirmed; now the binding may go. Only a binding that
        // still names the released machine is cleared.
        let record = self
            .store_call("binding get", self.bindings.get(&request.machine_id))
            .await?;
        if record.provider_id.as_deref() == Some(provider_id) {
            self.store_call("binding clear", self.bindings.clear(&record))
                .await?;
        }

        info!("Deleted machine {} ({})", request.machine_id, provider_id);
        Ok(())
    }

    /// Reserved for future resize/retag operations.
    pub async fn update(&self, _request: &MachineRequest) -> Result<(), ProvisionError> {
        Ok(())
    }

    /// Check whether exactly one inventory record backs the provider ID.
    ///
    /// Zero matches means the machine was externally reclaimed; more than
    /// one is an inventory inconsistency and is never resolved by picking
    /// one.
    pub async fn exist(&self, provider_id: &str) -> Result<bool, ProvisionError> {
        let ids = vec![provider_id.to_string()];
        let machines = self
            .inventory_call("list", self.inventory.machines(&ids))
            .await
            .map_err(|e| {
                ProvisionError::Inventory(format!(
                    "error listing machine {}: {}",
                    provider_id, e
                ))
            })?;

        match machines.len() {
            0 => Ok(false),
            1 => Ok(true),
            count => Err(ProvisionError::AmbiguousState {
                provider_id: provider_id.to_string(),
                count,
            }),
        }
    }
}
