//! Mock MaasClient for unit testing
//!
//! This module provides a mock implementation of MaasClientTrait that can
//! be used in unit tests without requiring a running MAAS instance.
//!
//! The mock keeps an in-memory machine pool, records every release call,
//! and can be configured to fail individual operations, to deploy
//! machines without assigning an address, or to hang on deploy for
//! deadline tests.

use crate::error::MaasError;
use crate::maas_trait::MaasClientTrait;
use crate::models::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Mock MaasClient for testing
///
/// Machines seeded with [`MockMaasClient::add_ready_machine`] form the free
/// pool; `allocate` hands them out in insertion order. Released machines
/// leave the mock inventory entirely, so a subsequent `machines` lookup
/// finds nothing for their ID.
#[derive(Clone)]
pub struct MockMaasClient {
    base_url: String,
    // Free pool; a Vec so tests can seed duplicate records for
    // inconsistency scenarios
    ready: Arc<Mutex<Vec<Machine>>>,
    // Allocated or deployed machines by system ID
    active: Arc<Mutex<HashMap<String, Machine>>>,
    release_calls: Arc<Mutex<Vec<Vec<String>>>>,
    fail_allocate: Arc<Mutex<Option<String>>>,
    fail_deploy: Arc<Mutex<Option<String>>>,
    fail_release: Arc<Mutex<Option<String>>>,
    fail_list: Arc<Mutex<Option<String>>>,
    withhold_addresses: Arc<Mutex<bool>>,
    hang_deploy: Arc<Mutex<bool>>,
}

/// Build a Ready machine record for test setup
pub fn ready_machine(system_id: &str, hostname: &str, ip_addresses: &[&str]) -> Machine {
    Machine {
        system_id: system_id.to_string(),
        hostname: hostname.to_string(),
        fqdn: format!("{}.maas", hostname),
        status_name: MachineStatus::Ready,
        ip_addresses: ip_addresses.iter().map(|ip| (*ip).to_string()).collect(),
        power_state: "off".to_string(),
        tag_names: Vec::new(),
        osystem: String::new(),
        distro_series: String::new(),
    }
}

impl MockMaasClient {
    /// Create a new mock client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ready: Arc::new(Mutex::new(Vec::new())),
            active: Arc::new(Mutex::new(HashMap::new())),
            release_calls: Arc::new(Mutex::new(Vec::new())),
            fail_allocate: Arc::new(Mutex::new(None)),
            fail_deploy: Arc::new(Mutex::new(None)),
            fail_release: Arc::new(Mutex::new(None)),
            fail_list: Arc::new(Mutex::new(None)),
            withhold_addresses: Arc::new(Mutex::new(false)),
            hang_deploy: Arc::new(Mutex::new(false)),
        }
    }

    /// Add a machine to the free pool (for test setup)
    pub fn add_ready_machine(&self, machine: Machine) {
        self.ready.lock().unwrap().push(machine);
    }

    /// Make every `allocate` call fail with the given message
    pub fn fail_allocate(&self, message: &str) {
        *self.fail_allocate.lock().unwrap() = Some(message.to_string());
    }

    /// Make every `deploy` call fail with the given message
    pub fn fail_deploy(&self, message: &str) {
        *self.fail_deploy.lock().unwrap() = Some(message.to_string());
    }

    /// Make every `release` call fail with the given message
    pub fn fail_release(&self, message: &str) {
        *self.fail_release.lock().unwrap() = Some(message.to_string());
    }

    /// Make every `machines` call fail with the given message
    pub fn fail_list(&self, message: &str) {
        *self.fail_list.lock().unwrap() = Some(message.to_string());
    }

    /// Deploy succeeds but reports no assigned addresses
    pub fn withhold_addresses_on_deploy(&self) {
        *self.withhold_addresses.lock().unwrap() = true;
    }

    /// Make every `deploy` call block forever, for deadline tests
    pub fn hang_on_deploy(&self) {
        *self.hang_deploy.lock().unwrap() = true;
    }

    /// Every `release` invocation observed so far, in call order
    pub fn release_calls(&self) -> Vec<Vec<String>> {
        self.release_calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MaasClientTrait for MockMaasClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn version(&self) -> Result<MaasVersion, MaasError> {
        Ok(MaasVersion {
            version: "3.5.0".to_string(),
            subversion: "mock".to_string(),
            capabilities: Vec::new(),
        })
    }

    async fn allocate(&self, args: &AllocateArgs) -> Result<Machine, MaasError> {
        if let Some(message) = self.fail_allocate.lock().unwrap().clone() {
            return Err(MaasError::Api(message));
        }

        let mut ready = self.ready.lock().unwrap();
        let position = ready.iter().position(|machine| {
            args.tags
                .iter()
                .all(|tag| machine.tag_names.contains(tag))
        });
        let Some(position) = position else {
            return Err(MaasError::Api(
                "No machine matching constraints".to_string(),
            ));
        };

        let mut machine = ready.remove(position);
        machine.status_name = MachineStatus::Allocated;
        self.active
            .lock()
            .unwrap()
            .insert(machine.system_id.clone(), machine.clone());
        Ok(machine)
    }

    async fn deploy(&self, system_id: &str, _args: &DeployArgs) -> Result<Machine, MaasError> {
        let hang = *self.hang_deploy.lock().unwrap();
        if hang {
            std::future::pending::<()>().await;
        }
        if let Some(message) = self.fail_deploy.lock().unwrap().clone() {
            return Err(MaasError::Api(message));
        }

        let mut active = self.active.lock().unwrap();
        let machine = active
            .get_mut(system_id)
            .ok_or_else(|| MaasError::NotFound(format!("Machine {} not found", system_id)))?;

        machine.status_name = MachineStatus::Deployed;
        machine.power_state = "on".to_string();
        if *self.withhold_addresses.lock().unwrap() {
            machine.ip_addresses.clear();
        }
        Ok(machine.clone())
    }

    async fn release(&self, system_ids: &[String]) -> Result<(), MaasError> {
        self.release_calls.lock().unwrap().push(system_ids.to_vec());

        if let Some(message) = self.fail_release.lock().unwrap().clone() {
            return Err(MaasError::Api(message));
        }

        let mut active = self.active.lock().unwrap();
        let mut ready = self.ready.lock().unwrap();
        for system_id in system_ids {
            active.remove(system_id);
            ready.retain(|machine| &machine.system_id != system_id);
        }
        Ok(())
    }

    async fn machines(&self, system_ids: &[String]) -> Result<Vec<Machine>, MaasError> {
        if let Some(message) = self.fail_list.lock().unwrap().clone() {
            return Err(MaasError::Api(message));
        }

        let active = self.active.lock().unwrap();
        let ready = self.ready.lock().unwrap();
        let mut matches: Vec<Machine> = Vec::new();
        for machine in active.values().chain(ready.iter()) {
            if system_ids.contains(&machine.system_id) {
                matches.push(machine.clone());
            }
        }
        Ok(matches)
    }
}
