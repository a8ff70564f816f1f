//! Unit tests for the provisioning saga

#[cfg(test)]
mod tests {
    use crate::binding::MemoryBindingStore;
    use crate::error::ProvisionError;
    use crate::models::MachineRequest;
    use crate::saga::Provisioner;
    use maas_client::mock::{ready_machine, MockMaasClient};
    use std::sync::Arc;
    use std::time::Duration;

    fn provisioner(
        mock: &MockMaasClient,
        store: &Arc<MemoryBindingStore>,
    ) -> Provisioner {
        Provisioner::new(
            Arc::new(mock.clone()),
            Arc::clone(store) as Arc<dyn crate::binding::BindingStore>,
            Some("noble".to_string()),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn create_binds_and_returns_first_address() {
        let mock = MockMaasClient::new("http://test-maas");
        mock.add_ready_machine(ready_machine("h1", "rack1", &["10.0.0.5", "10.0.0.6"]));
        let store = Arc::new(MemoryBindingStore::new());
        let saga = provisioner(&mock, &store);

        let result = saga
            .create(&MachineRequest::new("m1"))
            .await
            .expect("create should succeed");

        assert_eq!(result.provider_id, "h1");
        assert_eq!(result.ip_address, "10.0.0.5");
        assert_eq!(store.provider_id("m1").as_deref(), Some("h1"));
        assert!(mock.release_calls().is_empty());
    }

    #[tokio::test]
    async fn allocation_failure_is_terminal_without_compensation() {
        let mock = MockMaasClient::new("http://test-maas");
        mock.fail_allocate("No machine matching constraints");
        let store = Arc::new(MemoryBindingStore::new());
        let saga = provisioner(&mock, &store);

        let result = saga.create(&MachineRequest::new("m1")).await;

        assert!(matches!(result, Err(ProvisionError::Allocation(_))));
        assert!(mock.release_calls().is_empty());
        assert_eq!(store.provider_id("m1"), None);
    }

    #[tokio::test]
    async fn deploy_failure_releases_exactly_once() {
        let mock = MockMaasClient::new("http://test-maas");
        mock.add_ready_machine(ready_machine("h1", "rack1", &["10.0.0.5"]));
        mock.fail_deploy("transport error");
        let store = Arc::new(MemoryBindingStore::new());
        let saga = provisioner(&mock, &store);

        let result = saga.create(&MachineRequest::new("m1")).await;

        match result {
            Err(ProvisionError::Deployment { provider_id, .. }) => {
                assert_eq!(provider_id, "h1");
            }
            other => panic!("expected Deployment error, got {:?}", other),
        }
        assert_eq!(mock.release_calls(), vec![vec!["h1".to_string()]]);
        assert_eq!(store.provider_id("m1"), None);
    }

    #[tokio::test]
    async fn missing_address_is_a_deploy_failure() {
        let mock = MockMaasClient::new("http://test-maas");
        mock.add_ready_machine(ready_machine("h1", "rack1", &["10.0.0.5"]));
        mock.withhold_addresses_on_deploy();
        let store = Arc::new(MemoryBindingStore::new());
        let saga = provisioner(&mock, &store);

        let result = saga.create(&MachineRequest::new("m1")).await;

        match result {
            Err(ProvisionError::Deployment { reason, .. }) => {
                assert!(reason.contains("no IP address"));
            }
            other => panic!("expected Deployment error, got {:?}", other),
        }
        assert_eq!(mock.release_calls(), vec![vec!["h1".to_string()]]);
        assert_eq!(store.provider_id("m1"), None);
    }

    #[tokio::test]
    async fn deploy_deadline_expiry_is_compensated() {
        let mock = MockMaasClient::new("http://test-maas");
        mock.add_ready_machine(ready_machine("h1", "rack1", &["10.0.0.5"]));
        mock.hang_on_deploy();
        let store = Arc::new(MemoryBindingStore::new());
        // Short deadline so the hanging deploy expires quickly.
        let saga = Provisioner::new(
            Arc::new(mock.clone()),
            Arc::clone(&store) as Arc<dyn crate::binding::BindingStore>,
            Some("noble".to_string()),
            Duration::from_millis(50),
        );

        let result = saga.create(&MachineRequest::new("m1")).await;

        match result {
            Err(ProvisionError::Deployment {
                provider_id,
                reason,
            }) => {
                assert_eq!(provider_id, "h1");
                assert!(reason.contains("deadline"));
            }
            other => panic!("expected Deployment error, got {:?}", other),
        }
        assert_eq!(mock.release_calls(), vec![vec!["h1".to_string()]]);
        assert_eq!(store.provider_id("m1"), None);
    }

    #[tokio::test]
    async fn lost_binding_race_releases_own_machine() {
        let mock = MockMaasClient::new("http://test-maas");
        mock.add_ready_machine(ready_machine("h1", "rack1", &["10.0.0.5"]));
        let store = Arc::new(MemoryBindingStore::new());
        store.conflict_on_bind();
        let saga = provisioner(&mock, &store);

        let result = saga.create(&MachineRequest::new("m1")).await;

        assert!(matches!(result, Err(ProvisionError::BindingConflict(_))));
        assert_eq!(mock.release_calls(), vec![vec!["h1".to_string()]]);
    }

    #[tokio::test]
    async fn failed_compensation_reports_possible_leak() {
        let mock = MockMaasClient::new("http://test-maas");
        mock.add_ready_machine(ready_machine("h1", "rack1", &["10.0.0.5"]));
        mock.fail_deploy("transport error");
        mock.fail_release("maas unreachable");
        let store = Arc::new(MemoryBindingStore::new());
        let saga = provisioner(&mock, &store);

        let result = saga.create(&MachineRequest::new("m1")).await;

        match result {
            Err(ProvisionError::PartialFailure {
                provider_id,
                source,
                ..
            }) => {
                assert_eq!(provider_id, "h1");
                assert!(matches!(*source, ProvisionError::Deployment { .. }));
            }
            other => panic!("expected PartialFailure, got {:?}", other),
        }
        // The release was attempted exactly once even though it failed.
        assert_eq!(mock.release_calls().len(), 1);
    }

    #[tokio::test]
    async fn create_rejects_already_bound_machine_before_allocating() {
        let mock = MockMaasClient::new("http://test-maas");
        // A working allocate here would mean the saga got past the guard.
        mock.fail_allocate("allocate must not be reached");
        let store = Arc::new(MemoryBindingStore::new());
        store.seed("m1", "h9");
        let saga = provisioner(&mock, &store);

        let result = saga.create(&MachineRequest::new("m1")).await;

        assert!(matches!(result, Err(ProvisionError::BindingConflict(_))));
        assert!(mock.release_calls().is_empty());
        assert_eq!(store.provider_id("m1").as_deref(), Some("h9"));
    }

    #[tokio::test]
    async fn delete_without_binding_is_a_contract_error() {
        let mock = MockMaasClient::new("http://test-maas");
        let store = Arc::new(MemoryBindingStore::new());
        let saga = provisioner(&mock, &store);

        let result = saga.delete(&MachineRequest::new("m2"), None).await;

        assert!(matches!(result, Err(ProvisionError::NotProvisioned(_))));
        assert!(mock.release_calls().is_empty());
    }

    #[tokio::test]
    async fn delete_releases_then_clears_binding() {
        let mock = MockMaasClient::new("http://test-maas");
        mock.add_ready_machine(ready_machine("h2", "rack2", &["10.0.0.7"]));
        let store = Arc::new(MemoryBindingStore::new());
        store.seed("m2", "h2");
        let saga = provisioner(&mock, &store);

        saga.delete(&MachineRequest::new("m2"), Some("h2"))
            .await
            .expect("delete should succeed");

        assert_eq!(mock.release_calls(), vec![vec!["h2".to_string()]]);
        assert_eq!(store.provider_id("m2"), None);
        // The released machine is gone from the inventory.
        assert_eq!(saga.exist("h2").await.unwrap(), false);
    }

    #[tokio::test]
    async fn delete_keeps_binding_when_release_fails() {
        let mock = MockMaasClient::new("http://test-maas");
        mock.fail_release("maas unreachable");
        let store = Arc::new(MemoryBindingStore::new());
        store.seed("m2", "h2");
        let saga = provisioner(&mock, &store);

        let result = saga.delete(&MachineRequest::new("m2"), Some("h2")).await;

        assert!(matches!(result, Err(ProvisionError::Release { .. })));
        // Still bound: the machine must not be lost track of.
        assert_eq!(store.provider_id("m2").as_deref(), Some("h2"));
    }

    #[tokio::test]
    async fn exist_is_exact() {
        let mock = MockMaasClient::new("http://test-maas");
        mock.add_ready_machine(ready_machine("h1", "rack1", &["10.0.0.5"]));
        let store = Arc::new(MemoryBindingStore::new());
        let saga = provisioner(&mock, &store);

        assert_eq!(saga.exist("h1").await.unwrap(), true);
        assert_eq!(saga.exist("h9").await.unwrap(), false);
    }

    #[tokio::test]
    async fn exist_refuses_to_pick_among_duplicates() {
        let mock = MockMaasClient::new("http://test-maas");
        mock.add_ready_machine(ready_machine("h3", "rack1", &["10.0.0.5"]));
        mock.add_ready_machine(ready_machine("h3", "rack2", &["10.0.0.6"]));
        let store = Arc::new(MemoryBindingStore::new());
        let saga = provisioner(&mock, &store);

        match saga.exist("h3").await {
            Err(ProvisionError::AmbiguousState { provider_id, count }) => {
                assert_eq!(provider_id, "h3");
                assert_eq!(count, 2);
            }
            other => panic!("expected AmbiguousState, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn update_is_a_no_op() {
        let mock = MockMaasClient::new("http://test-maas");
        let store = Arc::new(MemoryBindingStore::new());
        let saga = provisioner(&mock, &store);

        saga.update(&MachineRequest::new("m1"))
            .await
            .expect("update is reserved and succeeds");
    }
}
