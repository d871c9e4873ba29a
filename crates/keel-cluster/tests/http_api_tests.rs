// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Keel Authors

//! Integration tests for the HTTP management API client.
//!
//! These tests use wiremock to stand in for a node's management API.

use std::time::Duration;

use keel_cluster::{
    wipe_partitions, ApiError, ConnectionError, HttpConnector, NodeConnector, ResetRequest,
};
use keel_core::{ApiConfig, MachineStage};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn connector() -> HttpConnector {
    HttpConnector::new(ApiConfig { request_timeout_secs: 5, ..Default::default() })
}

fn host(server: &MockServer) -> String {
    server.address().to_string()
}

// =============================================================================
// Status
// =============================================================================

#[tokio::test]
async fn test_machine_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/machine/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stage": "maintenance",
            "schematic": "376567988ad370138ad8b2698212367b8edcb69b5fd68c80be1f2ec7d603b4ba",
            "os_version": "v1.9.2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = connector().connect(&host(&server)).await.unwrap();
    let status = client.machine_status().await.unwrap();

    assert_eq!(status.stage, MachineStage::Maintenance);
    assert_eq!(status.os_version, "v1.9.2");
}

#[tokio::test]
async fn test_unknown_stage_and_missing_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/machine/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let client = connector().connect(&host(&server)).await.unwrap();
    let status = client.machine_status().await.unwrap();
    assert_eq!(status.stage, MachineStage::Unknown);
    assert!(status.os_version.is_empty());
}

#[tokio::test]
async fn test_unrecognised_stage_decodes_as_unknown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/machine/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"stage": "rebuilding", "os_version": "v1.10.0"})),
        )
        .mount(&server)
        .await;

    let client = connector().connect(&host(&server)).await.unwrap();
    let status = client.machine_status().await.unwrap();
    assert_eq!(status.stage, MachineStage::Unknown);
    assert_eq!(status.os_version, "v1.10.0");
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/machine/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = connector().connect(&host(&server)).await.unwrap();
    let err = client.machine_status().await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
}

// =============================================================================
// Membership and bootstrap
// =============================================================================

#[tokio::test]
async fn test_etcd_member_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/etcd/members"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [{"members": [{"id": 42, "hostname": "cp-1"}]}]
        })))
        .mount(&server)
        .await;

    let client = connector().connect(&host(&server)).await.unwrap();
    let response = client.etcd_member_list().await.unwrap();
    assert!(response.is_bootstrapped());
    assert_eq!(response.messages[0].members[0].id, 42);
}

#[tokio::test]
async fn test_bootstrap_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/bootstrap"))
        .respond_with(ResponseTemplate::new(409).set_body_string("etcd data directory is not empty\n"))
        .expect(1)
        .mount(&server)
        .await;

    let client = connector().connect(&host(&server)).await.unwrap();
    let err = client.bootstrap().await.unwrap_err();

    match err {
        ApiError::Status { code, message } => {
            assert_eq!(code, 409);
            assert_eq!(message, "etcd data directory is not empty");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_error_body_uses_reason() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/bootstrap"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = connector().connect(&host(&server)).await.unwrap();
    let err = client.bootstrap().await.unwrap_err();
    assert_eq!(err.to_string(), "request rejected with status 503: Service Unavailable");
}

// =============================================================================
// Reset
// =============================================================================

#[tokio::test]
async fn test_reset_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/reset"))
        .and(body_json(json!({
            "system_partitions_to_wipe": [
                {"label": "STATE", "wipe": true},
                {"label": "EPHEMERAL", "wipe": true}
            ],
            "graceful": false,
            "reboot": true
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = connector().connect(&host(&server)).await.unwrap();
    let request =
        ResetRequest { system_partitions_to_wipe: wipe_partitions(false), graceful: false, reboot: true };
    client.reset(&request).await.unwrap();
}

#[tokio::test]
async fn test_full_wipe_sends_empty_set() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/reset"))
        .and(body_json(json!({
            "system_partitions_to_wipe": [],
            "graceful": true,
            "reboot": false
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = connector().connect(&host(&server)).await.unwrap();
    let request =
        ResetRequest { system_partitions_to_wipe: wipe_partitions(true), graceful: true, reboot: false };
    client.reset(&request).await.unwrap();
}

// =============================================================================
// Transport
// =============================================================================

#[tokio::test]
async fn test_unreachable_node_fails_to_connect() {
    // Bind and drop a server so its port is closed
    let address = {
        let server = MockServer::start().await;
        host(&server)
    };

    let err = match connector().connect(&address).await {
        Err(e) => e,
        Ok(_) => panic!("connect to a closed port succeeded"),
    };
    assert!(matches!(err, ConnectionError::Unreachable { ref host, .. } if *host == address));
}

#[tokio::test]
async fn test_scheme_without_default_port_is_invalid() {
    let connector = HttpConnector::new(ApiConfig { scheme: "grpc".to_string(), ..Default::default() });
    let err = match connector.connect("10.0.0.5").await {
        Err(e) => e,
        Ok(_) => panic!("connect without a port succeeded"),
    };
    assert!(matches!(err, ConnectionError::InvalidAddress { .. }));
}

#[tokio::test]
async fn test_server_gone_after_connect_is_transport_error() {
    let server = MockServer::start().await;
    let client = connector().connect(&host(&server)).await.unwrap();
    drop(server);

    let err = client.machine_status().await.unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
}

#[tokio::test]
async fn test_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/machine/status"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let connector =
        HttpConnector::new(ApiConfig { request_timeout_secs: 1, ..Default::default() });
    let client = connector.connect(&host(&server)).await.unwrap();
    let err = client.machine_status().await.unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
}
