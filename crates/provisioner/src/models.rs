//! Request and result types of the provisioning core.

use std::collections::BTreeSet;

/// One create/delete/exist invocation's view of a machine.
///
/// Built by the caller per call; immutable once constructed.
#[derive(Debug, Clone)]
pub struct MachineRequest {
    /// Cluster-side machine identifier
    pub machine_id: String,
    /// Image to deploy (MAAS distro series); the provisioner default
    /// applies when absent
    pub desired_image: Option<String>,
    /// Allocation constraints: required MAAS tags
    pub tags: BTreeSet<String>,
}

impl MachineRequest {
    /// A request with no image override and no tag constraints
    pub fn new(machine_id: impl Into<String>) -> Self {
        Self {
            machine_id: machine_id.into(),
            desired_image: None,
            tags: BTreeSet::new(),
        }
    }
}

/// Outcome of a successful create.
///
/// Never partially populated: if this struct is returned, the machine is
/// deployed, has at least one address, and the binding is durably written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningResult {
    /// MAAS system ID now bound to the machine
    pub provider_id: String,
    /// First address MAAS assigned at deploy time
    pub ip_address: String,
}
