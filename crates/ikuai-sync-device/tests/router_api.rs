//! Router API tests against a local mock server
//!
//! Constraints verified:
//! - Login sends the encoded credentials and rejects non-10000 results
//! - show/del/add calls carry the documented func_name, action and param
//! - Result codes other than 30000 surface as device errors

use ikuai_sync_core::config::{DeviceConfig, HttpConfig};
use ikuai_sync_core::traits::{DeviceClient, NewEntry};
use ikuai_sync_core::{Error, ResourceKind};
use ikuai_sync_device::IkuaiClient;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, password: &str) -> IkuaiClient {
    IkuaiClient::new(
        &DeviceConfig {
            addr: server.uri(),
            username: "admin".to_string(),
            password: password.to_string(),
        },
        &HttpConfig::default(),
    )
    .expect("valid settings")
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/Action/login"))
        .and(body_partial_json(json!({
            "username": "admin",
            "passwd": "5ebe2294ecd0e0f08eab7690d2a6ee69",
            "pass": "c2FsdF8xMXNlY3JldA==",
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "sess_key=abc123; path=/")
                .set_body_json(json!({"Result": 10000, "ErrMsg": "Success"})),
        )
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn login_rejected_is_an_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Action/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"Result": 10001, "ErrMsg": "Invalid username or password"})),
        )
        .mount(&server)
        .await;

    let result = client_for(&server, "wrong").login().await;

    match result {
        Err(Error::Authentication(message)) => {
            assert!(message.contains("Invalid username or password"));
            assert!(!message.contains("wrong"), "password must not leak");
        }
        Err(other) => panic!("Expected authentication error, got {:?}", other),
        Ok(_) => panic!("Expected login to fail"),
    }
}

#[tokio::test]
async fn login_http_failure_is_an_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Action/login"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let result = client_for(&server, "secret").login().await;
    assert!(matches!(result, Err(Error::Http(_))));
}

#[tokio::test]
async fn show_returns_entries() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("POST"))
        .and(path("/Action/call"))
        .and(body_partial_json(json!({
            "func_name": "ipgroup",
            "action": "show",
            "param": {"TYPE": "data"},
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Result": 30000,
            "ErrMsg": "Success",
            "Data": {
                "total": 3,
                "data": [
                    {"id": 1, "group_name": "geo", "addr_pool": "1.1.1.1", "comment": ""},
                    {"id": 2, "group_name": "geo", "addr_pool": "1.1.1.2", "comment": ""},
                    {"id": 3, "group_name": "other", "addr_pool": "1.1.1.3", "comment": ""},
                ]
            }
        })))
        .mount(&server)
        .await;

    let session = client_for(&server, "secret").login().await.expect("login succeeds");
    let entries = session.show(ResourceKind::IpGroup).await.expect("show succeeds");

    let names: Vec<_> = entries.iter().map(|e| (e.id, e.name.as_str())).collect();
    assert_eq!(names, vec![(1, "geo"), (2, "geo"), (3, "other")]);
}

#[tokio::test]
async fn delete_sends_comma_joined_ids() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("POST"))
        .and(path("/Action/call"))
        .and(body_partial_json(json!({
            "func_name": "custom_isp",
            "action": "del",
            "param": {"id": "4,5,9"},
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"Result": 30000, "ErrMsg": "Success"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let session = client_for(&server, "secret").login().await.expect("login succeeds");
    session
        .delete(ResourceKind::CustomIsp, &[4, 5, 9])
        .await
        .expect("delete succeeds");
}

#[tokio::test]
async fn add_sends_stream_domain_rule() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("POST"))
        .and(path("/Action/call"))
        .and(body_partial_json(json!({
            "func_name": "stream_domain",
            "action": "add",
            "param": {
                "interface": "wan2",
                "src_addr": "",
                "domain": "example.com,example.net",
                "comment": "proxy",
                "week": "1234567",
                "time": "00:00-23:59",
                "enabled": "yes",
            },
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"Result": 30000, "ErrMsg": "Success"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let members = vec!["example.com".to_string(), "example.net".to_string()];
    let interfaces = vec!["wan2".to_string()];
    let session = client_for(&server, "secret").login().await.expect("login succeeds");
    session
        .add(
            ResourceKind::StreamDomain,
            NewEntry {
                name: "",
                members: &members,
                comment: "proxy",
                interfaces: &interfaces,
                src_addr: "",
            },
        )
        .await
        .expect("add succeeds");
}

#[tokio::test]
async fn non_success_result_is_a_device_error() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("POST"))
        .and(path("/Action/call"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Result": 30001,
            "ErrMsg": "group name already exists",
        })))
        .mount(&server)
        .await;

    let members = vec!["1.1.1.1".to_string()];
    let session = client_for(&server, "secret").login().await.expect("login succeeds");
    let err = session
        .add(
            ResourceKind::IpGroup,
            NewEntry {
                name: "geo",
                members: &members,
                comment: "ikuai-sync",
                interfaces: &[],
                src_addr: "",
            },
        )
        .await
        .expect_err("add fails");

    match err {
        Error::Device {
            action,
            kind,
            code,
            message,
        } => {
            assert_eq!(action, "add");
            assert_eq!(kind, ResourceKind::IpGroup);
            assert_eq!(code, 30001);
            assert_eq!(message, "group name already exists");
        }
        other => panic!("Expected device error, got {:?}", other),
    }
}
