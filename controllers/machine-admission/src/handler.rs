//! Admission request handling.
//!
//! Decodes the incoming AdmissionReview, runs the provisioning saga for
//! CREATE and DELETE operations, and turns the outcome into an allow
//! (with a JSON patch carrying the new binding) or a deny whose reason
//! is the surfaced error text. Other operations pass through untouched.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use crds::{BindingState, Machine, MachineAddress, MachineStatus};
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::core::DynamicObject;
use maas_client::MaasClientTrait;
use provisioner::{BindingError, BindingRecord, BindingStore, MachineRequest, Provisioner};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

/// Shared webhook state, built once at startup and handed to the router
pub struct AppState {
    /// MAAS inventory client
    pub inventory: Arc<dyn MaasClientTrait>,
    /// Binding store over persisted Machine objects (DELETE path)
    pub bindings: Arc<dyn BindingStore>,
    /// Distro series deployed when a Machine names no image
    pub default_image: Option<String>,
    /// Per-call deadline for external calls
    pub call_timeout: Duration,
}

/// Binding store for a single CREATE admission.
///
/// The object being admitted is not persisted yet, so the durable binding
/// write is the admission patch itself; this store stages the provider ID
/// the saga binds and the handler copies it into the patched object. The
/// staged record still honors the conditional-write contract within the
/// call: a second bind without a fresh read is rejected.
struct StagedBinding {
    machine_id: String,
    existing: Option<String>,
    staged: Mutex<Option<String>>,
}

impl StagedBinding {
    fn new(machine_id: &str, existing: Option<String>) -> Self {
        Self {
            machine_id: machine_id.to_string(),
            existing,
            staged: Mutex::new(None),
        }
    }
}

#[async_trait::async_trait]
impl BindingStore for StagedBinding {
    async fn get(&self, machine_id: &str) -> Result<BindingRecord, BindingError> {
        Ok(BindingRecord {
            machine_id: machine_id.to_string(),
            provider_id: self.existing.clone(),
            revision: None,
        })
    }

    async fn bind(&self, _record: &BindingRecord, provider_id: &str) -> Result<(), BindingError> {
        let mut staged = self.staged.lock().unwrap_or_else(|e| e.into_inner());
        if self.existing.is_some() || staged.is_some() {
            return Err(BindingError::Conflict(format!(
                "machine {} is already bound",
                self.machine_id
            )));
        }
        *staged = Some(provider_id.to_string());
        Ok(())
    }

    async fn clear(&self, _record: &BindingRecord) -> Result<(), BindingError> {
        *self.staged.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

/// Mutating admission endpoint for Machine objects
pub async fn mutate(
    State(state): State<Arc<AppState>>,
    Json(review): Json<AdmissionReview<Machine>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let req: AdmissionRequest<Machine> = match review.try_into() {
        Ok(req) => req,
        Err(e) => {
            warn!("Rejecting malformed admission review: {}", e);
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };

    let response = match req.operation {
        Operation::Create => {
            let Some(obj) = req.object.as_ref() else {
                return Json(
                    AdmissionResponse::invalid("CREATE admission carried no object").into_review(),
                );
            };
            let name = obj
                .metadata
                .name
                .clone()
                .unwrap_or_else(|| req.name.clone());
            match create_machine(&state, &name, obj).await {
                Ok(patched) => patch_response(&req, obj, &patched)
                    .unwrap_or_else(|reason| AdmissionResponse::from(&req).deny(reason)),
                Err(reason) => {
                    info!("Denying creation of machine {}: {}", name, reason);
                    AdmissionResponse::from(&req).deny(reason)
                }
            }
        }
        Operation::Delete => {
            let Some(old) = req.old_object.as_ref() else {
                return Json(
                    AdmissionResponse::invalid("DELETE admission carried no old object")
                        .into_review(),
                );
            };
            let name = old
                .metadata
                .name
                .clone()
                .unwrap_or_else(|| req.name.clone());
            match delete_machine(&state, &name, old).await {
                Ok(()) => AdmissionResponse::from(&req),
                Err(reason) => {
                    info!("Denying deletion of machine {}: {}", name, reason);
                    AdmissionResponse::from(&req).deny(reason)
                }
            }
        }
        // Resize/retag would hook in here; nothing to do yet.
        _ => AdmissionResponse::from(&req),
    };

    Json(response.into_review())
}

/// Run the create saga and build the mutated object.
async fn create_machine(
    state: &AppState,
    name: &str,
    obj: &Machine,
) -> Result<Machine, String> {
    // The persisted store is the cluster-level truth; a Machine of this
    // name that already exists means the create is doomed to AlreadyExists
    // and allocating for it would orphan a MAAS machine.
    let persisted = state.bindings.get(name).await.map_err(|e| e.to_string())?;
    if persisted.revision.is_some() && persisted.provider_id.is_none() {
        return Err(format!("machine {} already exists", name));
    }
    let existing = persisted
        .provider_id
        .or_else(|| obj.spec.provider_id.clone());

    let staged = Arc::new(StagedBinding::new(name, existing));
    let saga = Provisioner::new(
        Arc::clone(&state.inventory),
        Arc::clone(&staged) as Arc<dyn BindingStore>,
        state.default_image.clone(),
        state.call_timeout,
    );

    let request = MachineRequest {
        machine_id: name.to_string(),
        desired_image: obj.spec.image.clone(),
        tags: obj.spec.tags.iter().cloned().collect(),
    };
    let result = saga.create(&request).await.map_err(|e| e.to_string())?;

    let mut patched = obj.clone();
    patched.spec.provider_id = Some(result.provider_id.clone());
    // With the status subresource enabled the API server drops this part
    // of the patch; spec.providerID is the part that matters.
    patched.status = Some(MachineStatus {
        addresses: vec![MachineAddress {
            address_type: "InternalIP".to_string(),
            address: result.ip_address.clone(),
        }],
        state: BindingState::Bound,
        last_provisioned: Some(Utc::now()),
        error: None,
    });

    info!(
        "Machine {} provisioned as {} ({})",
        name, result.provider_id, result.ip_address
    );
    Ok(patched)
}

/// Release the bound MAAS machine before the object disappears.
async fn delete_machine(state: &AppState, name: &str, old: &Machine) -> Result<(), String> {
    let saga = Provisioner::new(
        Arc::clone(&state.inventory),
        Arc::clone(&state.bindings),
        state.default_image.clone(),
        state.call_timeout,
    );

    let request = MachineRequest::new(name);
    saga.delete(&request, old.spec.provider_id.as_deref())
        .await
        .map_err(|e| e.to_string())
}

/// Allow the request with a patch transforming `obj` into `patched`.
fn patch_response(
    req: &AdmissionRequest<Machine>,
    obj: &Machine,
    patched: &Machine,
) -> Result<AdmissionResponse, String> {
    let original = serde_json::to_value(obj)
        .map_err(|e| format!("failed to serialize admitted object: {}", e))?;
    let mutated = serde_json::to_value(patched)
        .map_err(|e| format!("failed to serialize mutated object: {}", e))?;
    AdmissionResponse::from(req)
        .with_patch(json_patch::diff(&original, &mutated))
        .map_err(|e| format!("failed to build patch: {}", e))
}
