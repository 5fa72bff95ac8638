//! End-to-end tests of the client against a mock VMmanager.

use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vmmanager_client::{NewVmConfig, ReinstallConfig, Sleeper, UpdateConfig, VmManagerClient};
use vmmanager_core::{AccountId, ClientConfig, Error, TaskId, VmId, VmRef};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Sleeper that records requested delays and returns immediately.
#[derive(Debug, Default)]
struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

fn client_for(server: &MockServer) -> (VmManagerClient, Arc<RecordingSleeper>) {
    let config = ClientConfig::new(format!("{}/vm/v3", server.uri()))
        .unwrap()
        .with_api_token("test-token")
        .with_task_timeout(60);
    let sleeper = Arc::new(RecordingSleeper::default());
    let client = VmManagerClient::builder(config)
        .with_sleeper(sleeper.clone())
        .build()
        .unwrap();
    (client, sleeper)
}

fn new_vm() -> NewVmConfig {
    NewVmConfig {
        name: "web-01".into(),
        cluster: 1,
        account: AccountId::new(3),
        os: 12,
        password: "s3cret!!".into(),
        cpu_number: 2,
        ram_mib: 2048,
        hdd_mib: 20480,
        ipv4_number: Some(1),
        ipv4_pool: None,
        node: None,
        preset: None,
        domain: None,
        comment: None,
    }
}

#[tokio::test]
async fn create_vm_waits_for_deferred_task() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/vm/v3/host"))
        .and(header("x-xsrf-token", "test-token"))
        .and(body_json(serde_json::to_value(new_vm()).unwrap()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7, "task": 42})))
        .expect(1)
        .mount(&server)
        .await;

    // First poll: the task is not visible yet.
    Mock::given(method("GET"))
        .and(path("/vm/v3/task"))
        .and(query_param("where", "consul_id EQ 42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"list": []})))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/vm/v3/task"))
        .and(query_param("where", "consul_id EQ 42"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"list": [{"id": 1, "status": "complete"}]})),
        )
        .mount(&server)
        .await;

    let (client, sleeper) = client_for(&server);
    let id = client.create_vm(&new_vm()).await.unwrap();

    assert_eq!(id, VmId::new(7));
    assert_eq!(sleeper.slept(), vec![Duration::from_secs(5)]);
}

#[tokio::test]
async fn delete_vm_with_empty_response_fails() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/vm/v3/host/5"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/vm/v3/task"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"list": []})))
        .expect(0)
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);
    let err = client.delete_vm(VmRef::new(5)).await.unwrap_err();

    match err {
        Error::EmptyResponse(what) => assert!(what.contains('5'), "{what}"),
        other => panic!("expected EmptyResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn remote_error_is_reported_without_polling() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/vm/v3/host/5/reinstall"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"error": {"msg": "os not found"}})),
        )
        .mount(&server)
        .await;

    let (client, sleeper) = client_for(&server);
    let config = ReinstallConfig {
        os: 99,
        password: None,
        send_email_mode: None,
    };
    let err = client.reinstall(VmRef::new(5), &config).await.unwrap_err();

    match err {
        Error::RemoteTaskError(detail) => assert!(detail.contains("os not found")),
        other => panic!("expected RemoteTaskError, got {other:?}"),
    }
    assert!(sleeper.slept().is_empty());
}

#[tokio::test]
async fn task_that_never_completes_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/vm/v3/host/5/resource"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task": 11})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/vm/v3/task"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"list": [{"status": "failed"}]})),
        )
        .mount(&server)
        .await;

    let (client, sleeper) = client_for(&server);
    let err = client
        .update_resources(VmRef::new(5), &Default::default())
        .await
        .unwrap_err();

    // Real round-trips to the mock server also count towards the budget.
    match err {
        Error::TaskTimeout { task, waited } => {
            assert_eq!(task, TaskId::new(11));
            assert!(waited >= Duration::from_secs(60), "{waited:?}");
            assert!(waited < Duration::from_secs(65), "{waited:?}");
        }
        other => panic!("expected TaskTimeout, got {other:?}"),
    }
    assert_eq!(sleeper.slept().len(), 12);
}

#[tokio::test]
async fn update_config_does_not_poll() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/vm/v3/host/8"))
        .and(body_json(json!({"comment": "renamed"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 8, "task": 3})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/vm/v3/task"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"list": []})))
        .expect(0)
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);
    let config = UpdateConfig {
        comment: Some("renamed".into()),
        ..UpdateConfig::default()
    };
    client.update_config(VmRef::new(8), &config).await.unwrap();
}

#[tokio::test]
async fn get_vm_info_and_state() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/vm/v3/host"))
        .and(query_param("where", "id EQ 12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "list": [{"id": 12, "name": "web-01", "state": "active", "cpu_number": 2}],
            "size": 1
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/vm/v3/host"))
        .and(query_param("where", "id EQ 13"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"list": []})))
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);

    let info = client.get_vm_info(VmRef::new(12)).await.unwrap();
    assert_eq!(info.id, VmId::new(12));
    assert_eq!(info.extra.get("cpu_number"), Some(&json!(2)));
    assert_eq!(client.get_vm_state(VmRef::new(12)).await.unwrap(), "active");

    let err = client.get_vm_info(VmRef::new(13)).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn reads_retry_on_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/vm/v3/node"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/vm/v3/node"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"list": [{"id": 1, "name": "node-a", "state": "active"}]})),
        )
        .mount(&server)
        .await;

    let (client, sleeper) = client_for(&server);
    let nodes = client.list_nodes().await.unwrap();

    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].name.as_deref(), Some("node-a"));
    assert_eq!(
        sleeper.slept(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
}

#[tokio::test]
async fn reads_give_up_after_configured_attempts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/vm/v3/host"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .expect(3)
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);
    let err = client.list_vms().await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn item_config_reads_data_member() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/vm/v3/cluster/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": ["a", "b"]})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/vm/v3/cluster/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "x"})))
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);

    let items = client
        .get_item_config_array("cluster/1", "cluster")
        .await
        .unwrap();
    assert_eq!(items, vec![json!("a"), json!("b")]);

    let err = client.get_item_config("cluster/2", "cluster").await.unwrap_err();
    assert_eq!(err.to_string(), "cluster CONFIG not readable");
}

#[tokio::test]
async fn connect_logs_in_with_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v4/public/token"))
        .and(body_json(json!({"email": "admin@example.com", "password": "pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "issued"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/vm/v3/node"))
        .and(header("x-xsrf-token", "issued"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"list": []})))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig::new(format!("{}/vm/v3", server.uri()))
        .unwrap()
        .with_credentials("admin@example.com", "pw");
    let client = VmManagerClient::connect(config).await.unwrap();

    assert_eq!(client.username().as_deref(), Some("admin@example.com"));
    assert!(client.list_nodes().await.unwrap().is_empty());
}
