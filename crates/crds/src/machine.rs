//! Machine CRD
//!
//! Cluster-side record of a bare-metal machine backed by MAAS. The
//! `providerID` field in the spec is the durable binding between this
//! object and the MAAS system ID; it is absent until provisioning
//! completes and is only ever written by the admission webhook.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "provisioning.maas.io",
    version = "v1alpha1",
    kind = "Machine",
    namespaced,
    status = "MachineStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct MachineSpec {
    /// MAAS system ID of the backing machine.
    ///
    /// Absent means not yet provisioned, or provisioning abandoned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,

    /// Image to deploy (MAAS distro series). Opaque to the webhook;
    /// falls back to the controller default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Allocation constraints: the backing machine must carry every
    /// one of these MAAS tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct MachineStatus {
    /// Addresses assigned by MAAS at deploy time
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<MachineAddress>,

    /// Durable binding state
    #[serde(default)]
    pub state: BindingState,

    /// When the binding was last written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_provisioned: Option<DateTime<Utc>>,

    /// Last provisioning error, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Durable binding state of a Machine.
///
/// Transient states of a provisioning attempt (allocating, releasing)
/// never appear here; only the two states that survive a call do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub enum BindingState {
    /// No MAAS machine is bound
    #[default]
    Unbound,
    /// providerID refers to a deployed MAAS machine
    Bound,
}

/// A single address entry, shaped like corev1.NodeAddress
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MachineAddress {
    /// Address kind, e.g. "InternalIP"
    #[serde(rename = "type")]
    pub address_type: String,

    /// The address value
    pub address: String,
}
