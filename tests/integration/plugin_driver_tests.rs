//! HTTP plugin driver tests against a wiremock endpoint

use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{basic_auth, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use nimbus::config::{AppConfig, PluginConfig};
use nimbus::models::{derive_node_uuid, NewProvider, NodeState, Provider};
use nimbus::services::drivers::HttpDriverFactory;
use nimbus::services::{Credentials, DriverFactory, NodeDriver, ProviderConnection};
use nimbus::AppState;

use crate::common::{node_form, test_database_config};

const USER: &str = "ops";
const PASS: &str = "s3cret";

fn plugin(endpoint: &str) -> PluginConfig {
    PluginConfig {
        provider_type: "ACME".to_string(),
        display_name: Some("Acme Cloud".to_string()),
        endpoint: format!("{}/", endpoint),
        timeout_secs: 5,
        access_key_label: Some("Username".to_string()),
        secret_key_label: Some("Password".to_string()),
        supported_actions: vec!["list".to_string(), "create".to_string(), "destroy".to_string()],
        extra_param: None,
        features: vec![],
    }
}

fn credentials() -> Credentials {
    Credentials::Pair(USER.to_string(), PASS.to_string())
}

async fn mount_json(server: &MockServer, verb: &str, route: &str, body: serde_json::Value) {
    Mock::given(method(verb))
        .and(path(route))
        .and(basic_auth(USER, PASS))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_inventory(server: &MockServer) {
    mount_json(
        server,
        "GET",
        "/nodes",
        json!([
            {"id": "srv/1", "name": "web", "state": 0, "public_ips": ["203.0.113.5"]},
            {"id": "srv-2", "uuid": "fixed-uuid", "name": "db"}
        ]),
    )
    .await;
    mount_json(server, "GET", "/images", json!([{"id": "img-1", "name": "Debian"}])).await;
    mount_json(server, "GET", "/sizes", json!([{"id": "small", "name": "Small", "ram": 1024}])).await;
    mount_json(server, "GET", "/locations", json!([{"id": "eu-1", "name": "Frankfurt"}])).await;
}

async fn connect(server: &MockServer) -> Box<dyn NodeDriver> {
    HttpDriverFactory::new(&plugin(&server.uri()))
        .connect("ACME", &credentials())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_connect_rejects_bad_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/nodes"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = HttpDriverFactory::new(&plugin(&server.uri()))
        .connect("ACME", &credentials())
        .await
        .err()
        .unwrap();
    assert!(format!("{:#}", err).contains("401"));
}

#[tokio::test]
async fn test_listings_decode_and_derive_uuids() {
    let server = MockServer::start().await;
    mount_inventory(&server).await;
    let driver = connect(&server).await;

    let nodes = driver.list_nodes().await.unwrap();
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].uuid, derive_node_uuid("srv/1", "ACME"));
    assert_eq!(nodes[0].primary_public_ip(), "203.0.113.5");
    assert_eq!(nodes[1].uuid, "fixed-uuid");
    assert_eq!(nodes[1].state, 4);

    let sizes = driver.list_sizes().await.unwrap();
    assert_eq!(sizes[0].ram, Some(1024));
    let locations = driver.list_locations().await.unwrap();
    assert_eq!(locations[0].country, "");
}

#[tokio::test]
async fn test_create_posts_request_body() {
    let server = MockServer::start().await;
    mount_inventory(&server).await;
    Mock::given(method("POST"))
        .and(path("/nodes"))
        .and(basic_auth(USER, PASS))
        .and(body_partial_json(json!({
            "name": "web",
            "image": {"id": "img-1"},
            "size": {"id": "small"},
            "location": {"id": "eu-1"},
            "extra": {"ex_tier": "gold"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "srv-9",
            "name": "web",
            "state": 3,
            "public_ips": ["203.0.113.9"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = Provider::new("acme", "ACME", USER, PASS);
    let conn = ProviderConnection::with_driver(&provider, connect(&server).await, None, 15);
    let mut form = node_form("web");
    form.extra.insert("ex_tier".to_string(), "gold".to_string());

    let spawned = conn.create_node(&form).await.unwrap();
    assert_eq!(spawned.uuid, derive_node_uuid("srv-9", "ACME"));
    assert_eq!(spawned.public_ip, "203.0.113.9");
    assert_eq!(spawned.state, NodeState::Pending);
}

#[tokio::test]
async fn test_operations_use_encoded_node_path() {
    let server = MockServer::start().await;
    mount_inventory(&server).await;
    mount_json(&server, "POST", "/nodes/srv%2F1/reboot", json!({"success": true})).await;
    mount_json(&server, "DELETE", "/nodes/srv-2", json!({"success": false})).await;

    let driver = connect(&server).await;
    let nodes = driver.list_nodes().await.unwrap();

    assert!(driver.reboot_node(&nodes[0]).await.unwrap());
    assert!(!driver.destroy_node(&nodes[1]).await.unwrap());
}

#[tokio::test]
async fn test_error_status_carries_body() {
    let server = MockServer::start().await;
    mount_inventory(&server).await;
    Mock::given(method("POST"))
        .and(path("/nodes"))
        .respond_with(ResponseTemplate::new(503).set_body_string("capacity exhausted"))
        .mount(&server)
        .await;

    let provider = Provider::new("acme", "ACME", USER, PASS);
    let conn = ProviderConnection::with_driver(&provider, connect(&server).await, None, 15);

    let err = conn.create_node(&node_form("web")).await.unwrap_err();
    assert_eq!(err.error_type(), "vendor_error");
    assert!(err.to_string().contains("capacity exhausted"));
}

#[tokio::test]
async fn test_plugin_provider_end_to_end() {
    let server = MockServer::start().await;
    mount_inventory(&server).await;

    let db_path = std::env::temp_dir().join(format!("nimbus_plugin_{}.db", Uuid::new_v4()));
    let mut config = AppConfig::default();
    config.database = test_database_config(&db_path.to_string_lossy());
    config.plugins = vec![plugin(&server.uri())];

    let state = AppState::init(config).await.unwrap();
    let mut session = state
        .providers
        .create_provider(NewProvider {
            name: "acme".to_string(),
            provider_type: "ACME".to_string(),
            access_key: USER.to_string(),
            secret_key: PASS.to_string(),
        })
        .await
        .ok()
        .unwrap();
    assert_eq!(session.provider().actions, vec!["list", "create", "destroy"]);

    let report = session.import_nodes().await.unwrap();
    assert_eq!(report.added, 2);
    session.import_catalog().await.unwrap();
    assert_eq!(session.get_images().await.unwrap().len(), 1);

    drop(session);
    drop(state);
    let _ = std::fs::remove_file(&db_path);
}
