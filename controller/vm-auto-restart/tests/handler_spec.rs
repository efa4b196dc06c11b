//! Integration tests for the restart decision handler
//!
//! Tests cover:
//! - Status gate for running and transitional instances
//! - Exact-match handling of the auto-restart metadata flag
//! - Preemption history scanning and the operations filter
//! - Restart action and fault propagation against a stub compute API

use serde_json::{json, Value};
use std::sync::Arc;
use vm_auto_restart::{
    Config, Decision, HandlerError, HttpComputeClient, Metrics, RestartHandler,
    StaticTokenProvider,
};
use wiremock::{
    matchers::{header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

const INSTANCE_PATH: &str = "/projects/test-project/zones/test-zone/instances/test-vm";
const START_PATH: &str = "/projects/test-project/zones/test-zone/instances/test-vm/start";
const OPERATIONS_PATH: &str = "/projects/test-project/zones/test-zone/operations";
const TARGET_FILTER: &str =
    "targetLink=\"https://www.googleapis.com/compute/v1/projects/test-project/zones/test-zone/instances/test-vm\"";

fn test_config(server: &MockServer) -> Config {
    Config {
        project: "test-project".to_string(),
        zone: "test-zone".to_string(),
        instance: "test-vm".to_string(),
        compute_base_url: server.uri(),
        ..Config::default()
    }
}

fn create_handler(config: Config) -> RestartHandler<StaticTokenProvider, HttpComputeClient> {
    let compute = HttpComputeClient::new(&config).unwrap();
    RestartHandler::new(
        config,
        Arc::new(StaticTokenProvider::new("test-token")),
        Arc::new(compute),
        Metrics,
    )
}

fn instance_body(status: &str, items: Value) -> Value {
    json!({
        "name": "test-vm",
        "status": status,
        "metadata": { "items": items }
    })
}

fn operations_body(types: &[&str]) -> Value {
    let items: Vec<Value> = types
        .iter()
        .map(|t| json!({ "operationType": t, "status": "DONE" }))
        .collect();
    json!({ "items": items })
}

async fn mount_instance(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path(INSTANCE_PATH))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_operations(server: &MockServer, types: &[&str], expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(OPERATIONS_PATH))
        .and(query_param("filter", TARGET_FILTER))
        .and(query_param("maxResults", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(operations_body(types)))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_start(server: &MockServer, status: u16, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(START_PATH))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(status))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_running_and_transitional_statuses_need_no_action() {
    for status in ["RUNNING", "PROVISIONING", "STOPPING"] {
        let server = MockServer::start().await;
        mount_instance(
            &server,
            instance_body(status, json!([{ "key": "auto-restart", "value": "true" }])),
        )
        .await;
        mount_operations(&server, &["compute.instances.preempted"], 0).await;
        mount_start(&server, 200, 0).await;

        let outcome = create_handler(test_config(&server)).handle().await.unwrap();

        assert_eq!(outcome.message, format!("VM is {}, no action needed", status));
        assert!(!outcome.restarted());
    }
}

#[tokio::test]
async fn test_missing_flag_skips() {
    for status in ["TERMINATED", "STOPPED", "SUSPENDED"] {
        let server = MockServer::start().await;
        mount_instance(
            &server,
            instance_body(status, json!([{ "key": "startup-script", "value": "true" }])),
        )
        .await;
        mount_operations(&server, &["compute.instances.preempted"], 0).await;
        mount_start(&server, 200, 0).await;

        let outcome = create_handler(test_config(&server)).handle().await.unwrap();

        assert_eq!(outcome.decision, Decision::AutoRestartDisabled);
        assert_eq!(
            outcome.message,
            "auto-restart metadata is not 'true', skipping"
        );
    }
}

#[tokio::test]
async fn test_flag_value_is_case_sensitive() {
    for value in ["TRUE", "1", "True", ""] {
        let server = MockServer::start().await;
        mount_instance(
            &server,
            instance_body(
                "TERMINATED",
                json!([{ "key": "auto-restart", "value": value }]),
            ),
        )
        .await;
        mount_operations(&server, &["compute.instances.preempted"], 0).await;
        mount_start(&server, 200, 0).await;

        let outcome = create_handler(test_config(&server)).handle().await.unwrap();

        assert_eq!(outcome.decision, Decision::AutoRestartDisabled);
    }
}

#[tokio::test]
async fn test_instance_without_metadata_skips() {
    let server = MockServer::start().await;
    mount_instance(&server, json!({ "status": "STOPPED" })).await;
    mount_operations(&server, &[], 0).await;
    mount_start(&server, 200, 0).await;

    let outcome = create_handler(test_config(&server)).handle().await.unwrap();

    assert_eq!(outcome.decision, Decision::AutoRestartDisabled);
}

#[tokio::test]
async fn test_manual_stop_before_preemption_skips() {
    let server = MockServer::start().await;
    mount_instance(
        &server,
        instance_body("STOPPED", json!([{ "key": "auto-restart", "value": "true" }])),
    )
    .await;
    mount_operations(
        &server,
        &["setMetadata", "stop", "compute.instances.preempted"],
        1,
    )
    .await;
    mount_start(&server, 200, 0).await;

    let outcome = create_handler(test_config(&server)).handle().await.unwrap();

    assert_eq!(outcome.decision, Decision::NotPreempted);
    assert_eq!(
        outcome.message,
        "VM was not preempted (likely manual stop), skipping"
    );
}

#[tokio::test]
async fn test_no_preemption_in_history_skips() {
    let server = MockServer::start().await;
    mount_instance(
        &server,
        instance_body("SUSPENDED", json!([{ "key": "auto-restart", "value": "true" }])),
    )
    .await;
    mount_operations(&server, &["start", "setLabels"], 1).await;
    mount_start(&server, 200, 0).await;

    let outcome = create_handler(test_config(&server)).handle().await.unwrap();

    assert_eq!(outcome.decision, Decision::NotPreempted);
}

#[tokio::test]
async fn test_preempted_instance_is_restarted() {
    let server = MockServer::start().await;
    mount_instance(
        &server,
        instance_body("STOPPED", json!([{ "key": "auto-restart", "value": "true" }])),
    )
    .await;
    mount_operations(&server, &["compute.instances.preempted", "start"], 1).await;
    mount_start(&server, 200, 1).await;

    let outcome = create_handler(test_config(&server)).handle().await.unwrap();

    assert!(outcome.restarted());
    assert_eq!(outcome.message, "VM was preempted, restarting test-vm");
}

#[tokio::test]
async fn test_default_instance_restart_message() {
    let server = MockServer::start().await;
    let config = Config {
        compute_base_url: server.uri(),
        ..Config::default()
    };

    Mock::given(method("GET"))
        .and(path(
            "/projects/onix-ai-oneuptime-production/zones/northamerica-northeast1-a/instances/oneuptime-production",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "TERMINATED",
            "metadata": { "items": [{ "key": "auto-restart", "value": "true" }] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(
            "/projects/onix-ai-oneuptime-production/zones/northamerica-northeast1-a/operations",
        ))
        .and(query_param(
            "filter",
            "targetLink=\"https://www.googleapis.com/compute/v1/projects/onix-ai-oneuptime-production/zones/northamerica-northeast1-a/instances/oneuptime-production\"",
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(operations_body(&["compute.instances.preempted"])),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(
            "/projects/onix-ai-oneuptime-production/zones/northamerica-northeast1-a/instances/oneuptime-production/start",
        ))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = create_handler(config).handle().await.unwrap();

    assert_eq!(
        outcome.message,
        "VM was preempted, restarting oneuptime-production"
    );
}

#[tokio::test]
async fn test_descriptor_fetch_failure_propagates() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(INSTANCE_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
        .expect(1)
        .mount(&server)
        .await;
    mount_operations(&server, &["compute.instances.preempted"], 0).await;
    mount_start(&server, 200, 0).await;

    let result = create_handler(test_config(&server)).handle().await;

    match result {
        Err(HandlerError::RemoteCall {
            operation, status, ..
        }) => {
            assert_eq!(operation, "instances.get");
            assert_eq!(status, 500);
        }
        other => panic!("expected remote call fault, got {:?}", other),
    }
}

#[tokio::test]
async fn test_operations_failure_propagates() {
    let server = MockServer::start().await;
    mount_instance(
        &server,
        instance_body("STOPPED", json!([{ "key": "auto-restart", "value": "true" }])),
    )
    .await;

    Mock::given(method("GET"))
        .and(path(OPERATIONS_PATH))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;
    mount_start(&server, 200, 0).await;

    let result = create_handler(test_config(&server)).handle().await;

    assert!(matches!(
        result,
        Err(HandlerError::RemoteCall { status: 403, .. })
    ));
}

#[tokio::test]
async fn test_start_failure_propagates() {
    let server = MockServer::start().await;
    mount_instance(
        &server,
        instance_body("TERMINATED", json!([{ "key": "auto-restart", "value": "true" }])),
    )
    .await;
    mount_operations(&server, &["compute.instances.preempted"], 1).await;
    mount_start(&server, 409, 1).await;

    let result = create_handler(test_config(&server)).handle().await;

    assert!(matches!(
        result,
        Err(HandlerError::RemoteCall {
            operation: "instances.start",
            status: 409,
            ..
        })
    ));
}

#[tokio::test]
async fn test_malformed_descriptor_is_invalid_response() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(INSTANCE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .expect(1)
        .mount(&server)
        .await;
    mount_start(&server, 200, 0).await;

    let result = create_handler(test_config(&server)).handle().await;

    assert!(matches!(
        result,
        Err(HandlerError::InvalidResponse { .. })
    ));
}

#[tokio::test]
async fn test_dry_run_never_starts() {
    let server = MockServer::start().await;
    mount_instance(
        &server,
        instance_body("TERMINATED", json!([{ "key": "auto-restart", "value": "true" }])),
    )
    .await;
    mount_operations(&server, &["compute.instances.preempted"], 1).await;
    mount_start(&server, 200, 0).await;

    let config = Config {
        dry_run: true,
        ..test_config(&server)
    };
    let outcome = create_handler(config).handle().await.unwrap();

    assert_eq!(outcome.decision, Decision::DryRun);
    assert_eq!(
        outcome.message,
        "VM was preempted, dry-run enabled, not restarting test-vm"
    );
}
