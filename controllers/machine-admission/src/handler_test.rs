//! Unit tests for the admission handler

#[cfg(test)]
mod tests {
    use crate::handler::{mutate, AppState};
    use axum::extract::State;
    use axum::Json;
    use crds::{Machine, MachineSpec};
    use kube::core::admission::AdmissionReview;
    use maas_client::mock::{ready_machine, MockMaasClient};
    use maas_client::{MaasClientTrait, MachineStatus};
    use provisioner::MemoryBindingStore;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    fn test_state(mock: &MockMaasClient, store: Arc<MemoryBindingStore>) -> Arc<AppState> {
        Arc::new(AppState {
            inventory: Arc::new(mock.clone()),
            bindings: store,
            default_image: Some("noble".to_string()),
            call_timeout: Duration::from_secs(5),
        })
    }

    fn machine(name: &str, provider_id: Option<&str>) -> Machine {
        Machine::new(
            name,
            MachineSpec {
                provider_id: provider_id.map(str::to_string),
                image: None,
                tags: Vec::new(),
            },
        )
    }

    fn admission_review(
        operation: &str,
        name: &str,
        object: Value,
        old_object: Value,
    ) -> AdmissionReview<Machine> {
        serde_json::from_value(json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
                "kind": {"group": "provisioning.maas.io", "version": "v1alpha1", "kind": "Machine"},
                "resource": {"group": "provisioning.maas.io", "version": "v1alpha1", "resource": "machines"},
                "operation": operation,
                "name": name,
                "namespace": "default",
                "userInfo": {},
                "object": object,
                "oldObject": old_object,
            }
        }))
        .expect("admission review should deserialize")
    }

    fn patch_paths(patch: &[u8]) -> Vec<String> {
        let ops: Value = serde_json::from_slice(patch).expect("patch should be JSON");
        ops.as_array()
            .expect("patch should be an op array")
            .iter()
            .map(|op| op["path"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    #[tokio::test]
    async fn create_admission_patches_provider_id() {
        let mock = MockMaasClient::new("http://test-maas");
        mock.add_ready_machine(ready_machine("h1", "rack1", &["10.0.0.5"]));
        let state = test_state(&mock, Arc::new(MemoryBindingStore::new()));

        let obj = machine("m1", None);
        let review = admission_review(
            "CREATE",
            "m1",
            serde_json::to_value(&obj).expect("machine serializes"),
            Value::Null,
        );

        let response = mutate(State(state), Json(review))
            .await
            .0
            .response
            .expect("review carries a response");

        assert!(response.allowed);
        let paths = patch_paths(response.patch.as_deref().expect("patch present"));
        assert!(paths.iter().any(|path| path == "/spec/providerID"));
        assert!(paths.iter().any(|path| path.starts_with("/status")));
    }

    #[tokio::test]
    async fn create_admission_denies_on_deploy_failure() {
        let mock = MockMaasClient::new("http://test-maas");
        mock.add_ready_machine(ready_machine("h1", "rack1", &["10.0.0.5"]));
        mock.fail_deploy("transport error");
        let state = test_state(&mock, Arc::new(MemoryBindingStore::new()));

        let obj = machine("m1", None);
        let review = admission_review(
            "CREATE",
            "m1",
            serde_json::to_value(&obj).expect("machine serializes"),
            Value::Null,
        );

        let response = mutate(State(state), Json(review))
            .await
            .0
            .response
            .expect("review carries a response");

        assert!(!response.allowed);
        assert!(response.result.message.contains("deployment"));
        // The allocated machine was released before the deny went out.
        assert_eq!(mock.release_calls(), vec![vec!["h1".to_string()]]);
    }

    #[tokio::test]
    async fn create_admission_denies_duplicate_machine_without_allocating() {
        let mock = MockMaasClient::new("http://test-maas");
        mock.add_ready_machine(ready_machine("h2", "rack2", &["10.0.0.7"]));
        let store = Arc::new(MemoryBindingStore::new());
        // A Machine of the same name is already persisted and bound.
        store.seed("m1", "h1");
        let state = test_state(&mock, Arc::clone(&store));

        let obj = machine("m1", None);
        let review = admission_review(
            "CREATE",
            "m1",
            serde_json::to_value(&obj).expect("machine serializes"),
            Value::Null,
        );

        let response = mutate(State(state), Json(review))
            .await
            .0
            .response
            .expect("review carries a response");

        assert!(!response.allowed);
        assert!(response.result.message.contains("already bound"));
        // The doomed create reserved nothing: no allocation, no release.
        assert!(mock.release_calls().is_empty());
        let pool = mock
            .machines(&["h2".to_string()])
            .await
            .expect("mock lists machines");
        assert_eq!(pool[0].status_name, MachineStatus::Ready);
    }

    #[tokio::test]
    async fn delete_admission_releases_bound_machine() {
        let mock = MockMaasClient::new("http://test-maas");
        mock.add_ready_machine(ready_machine("h2", "rack2", &["10.0.0.7"]));
        let store = Arc::new(MemoryBindingStore::new());
        store.seed("m2", "h2");
        let state = test_state(&mock, Arc::clone(&store));

        let old = machine("m2", Some("h2"));
        let review = admission_review(
            "DELETE",
            "m2",
            Value::Null,
            serde_json::to_value(&old).expect("machine serializes"),
        );

        let response = mutate(State(state), Json(review))
            .await
            .0
            .response
            .expect("review carries a response");

        assert!(response.allowed);
        assert_eq!(mock.release_calls(), vec![vec!["h2".to_string()]]);
        assert_eq!(store.provider_id("m2"), None);
    }

    #[tokio::test]
    async fn delete_admission_denies_unbound_machine() {
        let mock = MockMaasClient::new("http://test-maas");
        let state = test_state(&mock, Arc::new(MemoryBindingStore::new()));

        let old = machine("m2", None);
        let review = admission_review(
            "DELETE",
            "m2",
            Value::Null,
            serde_json::to_value(&old).expect("machine serializes"),
        );

        let response = mutate(State(state), Json(review))
            .await
            .0
            .response
            .expect("review carries a response");

        assert!(!response.allowed);
        assert!(response.result.message.contains("has not been provisioned"));
        assert!(mock.release_calls().is_empty());
    }

    #[tokio::test]
    async fn update_admission_passes_through() {
        let mock = MockMaasClient::new("http://test-maas");
        let state = test_state(&mock, Arc::new(MemoryBindingStore::new()));

        let obj = machine("m1", Some("h1"));
        let review = admission_review(
            "UPDATE",
            "m1",
            serde_json::to_value(&obj).expect("machine serializes"),
            serde_json::to_value(&obj).expect("machine serializes"),
        );

        let response = mutate(State(state), Json(review))
            .await
            .0
            .response
            .expect("review carries a response");

        assert!(response.allowed);
        assert!(response.patch.is_none());
    }
}
