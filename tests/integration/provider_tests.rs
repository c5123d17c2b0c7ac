//! Provider registration, sync and status tests

use nimbus::db::{NodeRepository, ProviderRepository};
use nimbus::models::{Environment, NewProvider, Node, NodeForm, SyncOutcome};

use crate::common::{images, new_provider, MockError, TestApp, MOCK};

#[tokio::test]
async fn test_create_provider_derives_capabilities() {
    let app = TestApp::new().await;
    let session = app.provider("acme").await;

    let provider = session.provider();
    assert_eq!(provider.provider_type, MOCK);
    assert_eq!(provider.actions, vec!["list", "create", "reboot", "destroy"]);
    let param = provider.extra_param.as_ref().unwrap();
    assert_eq!((param.name.as_str(), param.value.as_str()), ("ex_project", "nimbus-test"));

    let stored = app.service.open("acme").await.unwrap();
    assert_eq!(stored.provider().id, provider.id);
    assert_eq!(stored.provider().actions.len(), 4);
    assert_eq!(app.vendor.connects(), 1);
}

#[tokio::test]
async fn test_open_unknown_provider() {
    let app = TestApp::new().await;
    let err = app.service.open("nope").await.err().unwrap();
    assert_eq!(err.error_type(), "not_found");
}

#[tokio::test]
async fn test_duplicate_credentials_conflict() {
    let app = TestApp::new().await;
    app.provider("acme").await;

    let mut input = new_provider("acme-two", MOCK);
    input.access_key = "key-acme".to_string();
    let err = app.service.create_provider(input).await.err().unwrap();
    assert_eq!(err.error_type(), "conflict");

    let err = app
        .service
        .create_provider(new_provider("acme", MOCK))
        .await
        .err()
        .unwrap();
    assert_eq!(err.error_type(), "conflict");
    assert_eq!(app.service.list_providers().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_provider_type_is_config_error() {
    let app = TestApp::new().await;
    let err = app
        .service
        .create_provider(new_provider("acme", "ACME"))
        .await
        .err()
        .unwrap();
    assert_eq!(err.error_type(), "config_error");
}

#[tokio::test]
async fn test_capability_without_driver_is_unknown_provider() {
    let app = TestApp::new().await;
    let err = app
        .service
        .create_provider(new_provider("linode", "LINODE"))
        .await
        .err()
        .unwrap();
    assert_eq!(err.error_type(), "unknown_provider");
    assert!(app.service.list_providers().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_connect_failure_persists_nothing() {
    let app = TestApp::new().await;
    app.vendor.set_error_mode(MockError::ConnectionRefused);

    let err = app
        .service
        .create_provider(new_provider("acme", MOCK))
        .await
        .err()
        .unwrap();
    assert_eq!(err.error_type(), "connection_error");
    assert!(app.service.list_providers().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_secret_key_is_rejected() {
    let app = TestApp::new().await;
    let mut input = new_provider("aws", "EC2_US_EAST");
    input.secret_key = String::new();

    let err = app.service.create_provider(input).await.err().unwrap();
    assert_eq!(err.error_type(), "validation_error");
    assert_eq!(app.vendor.connects(), 0);
}

#[tokio::test]
async fn test_invalid_provider_name_is_rejected() {
    let app = TestApp::new().await;
    let err = app
        .service
        .create_provider(new_provider("-acme", MOCK))
        .await
        .err()
        .unwrap();
    assert_eq!(err.error_type(), "validation_error");
}

#[tokio::test]
async fn test_node_uuid_is_unique_per_provider() {
    let app = TestApp::new().await;
    let session = app.provider("acme").await;
    let nodes = NodeRepository::new(app.pool.clone());
    let provider_id = &session.provider().id;

    nodes
        .save(&Node::new(provider_id, "web-a", "uuid-1", "alice"))
        .await
        .unwrap();
    let err = nodes
        .save(&Node::new(provider_id, "web-b", "uuid-1", "alice"))
        .await
        .unwrap_err();
    assert_eq!(err.error_type(), "conflict");
}

#[tokio::test]
async fn test_delete_provider_cascades() {
    let app = TestApp::new().await;
    let mut session = app.provider("acme").await;
    app.vendor.set_images(images(2));
    app.vendor.add_node("1", "web");
    session.import_images().await.unwrap();
    session.import_nodes().await.unwrap();

    app.service.delete_provider("acme").await.unwrap();

    let (nodes, images): (i64, i64) = sqlx::query_as(
        "SELECT (SELECT COUNT(*) FROM nodes), (SELECT COUNT(*) FROM images)",
    )
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!((nodes, images), (0, 0));

    let err = app.service.delete_provider("acme").await.unwrap_err();
    assert_eq!(err.error_type(), "not_found");
}

#[tokio::test]
async fn test_connection_is_cached_until_reset() {
    let app = TestApp::new().await;
    let mut session = app.provider("acme").await;
    assert_eq!(app.vendor.connects(), 1);

    session.import_nodes().await.unwrap();
    session.import_nodes().await.unwrap();
    assert_eq!(app.vendor.connects(), 1);

    session.reset_connection();
    session.import_nodes().await.unwrap();
    assert_eq!(app.vendor.connects(), 2);

    session.update().await.unwrap();
    assert_eq!(app.vendor.connects(), 2);
}

#[tokio::test]
async fn test_update_keeps_connection_state() {
    let app = TestApp::new().await;
    let mut session = match app.service.create_provider(new_provider("sandbox", "DUMMY")).await {
        Ok(session) => session,
        Err(e) => panic!("Failed to create provider: {}", e),
    };
    session.update().await.unwrap();

    let form = NodeForm {
        name: "web1".to_string(),
        image: "1".to_string(),
        flavor: "1".to_string(),
        realm: Some("1".to_string()),
        extra: Default::default(),
    };
    session.create_node(&form, "alice").await.unwrap();
    session.import_nodes().await.unwrap();

    let report = session.update().await.unwrap();
    assert_eq!((report.updated, report.decommissioned), (3, 0));
    let node = session.find_node("web1").await.unwrap();
    assert_eq!(node.environment, Environment::Production);
}

#[tokio::test]
async fn test_sync_all_continues_past_failing_provider() {
    let app = TestApp::new().await;
    app.provider("acme").await;
    app.service
        .create_provider(NewProvider {
            name: "sandbox".to_string(),
            provider_type: "DUMMY".to_string(),
            access_key: "3".to_string(),
            secret_key: String::new(),
        })
        .await
        .unwrap();
    app.vendor.set_error_mode(MockError::ConnectionRefused);

    let outcomes = app.service.sync_all().await.unwrap();
    assert_eq!(outcomes.len(), 2);

    match &outcomes[0] {
        SyncOutcome::Failed { provider, error } => {
            assert_eq!(provider, "acme");
            assert!(error.contains("connection refused"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    match &outcomes[1] {
        SyncOutcome::Synced(report) => {
            assert_eq!(report.provider, "sandbox");
            assert_eq!(report.added, 3);
        }
        other => panic!("expected sync, got {:?}", other),
    }
    assert!(outcomes[0].is_failed());
    assert!(!outcomes[1].is_failed());
}

#[tokio::test]
async fn test_status_counts_nodes() {
    let app = TestApp::new().await;
    let mut session = app.provider("acme").await;
    app.vendor.add_node("1", "web-a");
    app.vendor.add_node("2", "web-b");
    session.import_nodes().await.unwrap();
    app.vendor.remove_node("2");
    session.import_nodes().await.unwrap();

    let status = app.service.status().await.unwrap();
    assert!(status.schema_version.is_some());
    assert_eq!(status.providers.len(), 1);

    let acme = &status.providers[0];
    assert_eq!(acme.name, "acme");
    assert_eq!((acme.active_nodes, acme.decommissioned_nodes), (1, 1));

    let nodes = session.nodes().await.unwrap();
    assert_eq!(
        nodes
            .iter()
            .filter(|n| n.environment == Environment::Decommissioned)
            .count(),
        1
    );
}

#[tokio::test]
async fn test_action_table_is_seeded() {
    let app = TestApp::new().await;
    let actions = ProviderRepository::new(app.pool.clone())
        .list_actions()
        .await
        .unwrap();

    let names: Vec<_> = actions.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["list", "create", "reboot", "destroy"]);
    assert!(!actions[0].show);
    assert!(actions[1..].iter().all(|a| a.show));
}
