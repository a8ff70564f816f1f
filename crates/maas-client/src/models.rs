//! MAAS API models
//!
//! These models match a subset of the MAAS REST API machine serializer.
//! See: maasserver/api/machines.py in the MAAS source tree.

use serde::{Deserialize, Serialize};

/// Machine lifecycle status as reported by MAAS in `status_name`.
///
/// Only the states the provisioning flow cares about are spelled out;
/// anything else (commissioning, rescue mode, ...) maps to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineStatus {
    /// Newly enlisted, not yet commissioned
    New,
    /// Commissioned and in the free pool
    Ready,
    /// Reserved for a caller, not yet deploying
    Allocated,
    /// Deploy in progress
    Deploying,
    /// Booted into the requested image
    Deployed,
    /// Deploy failed
    #[serde(rename = "Failed deployment")]
    Failed,
    /// Being returned to the free pool
    Releasing,
    /// Any status this client does not model
    #[serde(other)]
    Unknown,
}

/// Machine model matching the MAAS machine serializer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Machine {
    /// Stable opaque identifier assigned by MAAS, e.g. "4y3h7n"
    pub system_id: String,
    /// Short hostname
    #[serde(default)]
    pub hostname: String,
    /// Fully qualified domain name
    #[serde(default)]
    pub fqdn: String,
    /// Lifecycle status, e.g. "Ready", "Deployed"
    pub status_name: MachineStatus,
    /// Addresses assigned to the machine, in MAAS interface order
    #[serde(default)]
    pub ip_addresses: Vec<String>,
    /// Current power state ("on", "off", "unknown")
    #[serde(default)]
    pub power_state: String,
    /// Tags attached to the machine
    #[serde(default)]
    pub tag_names: Vec<String>,
    /// Operating system of the deployed image, if any
    #[serde(default)]
    pub osystem: String,
    /// Release series of the deployed image, if any
    #[serde(default)]
    pub distro_series: String,
}

/// Arguments for `op=allocate`
///
/// All constraints are optional; an empty set of arguments allocates
/// any free machine.
#[derive(Debug, Clone, Default)]
pub struct AllocateArgs {
    /// Machine must carry every one of these tags
    pub tags: Vec<String>,
    /// Allocate a specific host by name
    pub hostname: Option<String>,
}

/// Arguments for `op=deploy`
///
/// Mirrors the start arguments the MAAS API accepts; every field is
/// optional and MAAS falls back to its configured defaults.
#[derive(Debug, Clone, Default)]
pub struct DeployArgs {
    /// OS release series to deploy, e.g. "noble"
    pub distro_series: Option<String>,
    /// Cloud-init user data, base64 encoded by the caller if needed
    pub user_data: Option<String>,
    /// Hardware enablement kernel to boot
    pub hwe_kernel: Option<String>,
    /// Free-form event log comment
    pub comment: Option<String>,
}

/// Response of the `version/` endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaasVersion {
    /// MAAS release version string
    #[serde(default)]
    pub version: String,
    /// Packaging subversion
    #[serde(default)]
    pub subversion: String,
    /// API capability identifiers
    #[serde(default)]
    pub capabilities: Vec<String>,
}
