//! Catalog import tests

use nimbus::db::CatalogRepository;
use nimbus::models::{CatalogKind, VendorImage};

use crate::common::{images, locations, sizes, MockCall, MockError, TestApp};

#[tokio::test]
async fn test_import_catalog_upserts_every_kind() {
    let app = TestApp::new().await;
    let mut session = app.provider("acme").await;
    app.vendor.set_images(images(3));
    app.vendor.set_locations(locations());
    app.vendor.set_sizes(sizes());

    let imports = session.import_catalog().await.unwrap();
    let summary: Vec<_> = imports.iter().map(|i| (i.kind, i.upserted)).collect();
    assert_eq!(
        summary,
        vec![
            (CatalogKind::Images, 3),
            (CatalogKind::Locations, 2),
            (CatalogKind::Sizes, 2)
        ]
    );

    let stored = session.get_sizes().await.unwrap();
    let large = stored.iter().find(|s| s.size_id == "large").unwrap();
    assert_eq!(large.ram, Some(8192));
    assert_eq!(large.bandwidth, Some(5000));

    let stored = session.get_locations().await.unwrap();
    let eu = stored.iter().find(|l| l.location_id == "eu-1").unwrap();
    assert_eq!(eu.country, "DE");
}

#[tokio::test]
async fn test_failed_import_commits_nothing() {
    let app = TestApp::new().await;
    let mut session = app.provider("acme").await;
    let mut batch = images(100);
    batch[49].id = String::new();
    app.vendor.set_images(batch);

    let err = session.import_images().await.unwrap_err();
    assert_eq!(err.error_type(), "conflict");

    let catalog = CatalogRepository::new(app.pool.clone());
    let count = catalog
        .count(&session.provider().id, CatalogKind::Images)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_reimport_updates_in_place_and_keeps_removed_entries() {
    let app = TestApp::new().await;
    let mut session = app.provider("acme").await;
    app.vendor.set_images(images(3));
    session.import_images().await.unwrap();
    let before = session.get_images().await.unwrap();

    app.vendor.set_images(vec![
        VendorImage {
            id: "img-1".to_string(),
            name: "Image 1 (patched)".to_string(),
        },
        VendorImage {
            id: "img-2".to_string(),
            name: "Image 2".to_string(),
        },
    ]);
    let import = session.import_images().await.unwrap();
    assert_eq!(import.upserted, 2);

    let after = session.get_images().await.unwrap();
    assert_eq!(after.len(), 3);

    let patched = after.iter().find(|i| i.image_id == "img-1").unwrap();
    assert_eq!(patched.name, "Image 1 (patched)");
    let original = before.iter().find(|i| i.image_id == "img-1").unwrap();
    assert_eq!(patched.id, original.id);

    assert!(after.iter().any(|i| i.image_id == "img-3"));
}

#[tokio::test]
async fn test_ec2_imports_machine_images_only() {
    let app = TestApp::new().await;
    let mut session = app.provider_of_type("aws", "EC2_US_EAST").await;
    app.vendor.set_images(vec![
        VendorImage {
            id: "ami-0001".to_string(),
            name: "ubuntu".to_string(),
        },
        VendorImage {
            id: "aki-0002".to_string(),
            name: "kernel".to_string(),
        },
        VendorImage {
            id: "ari-0003".to_string(),
            name: "ramdisk".to_string(),
        },
    ]);

    let import = session.import_images().await.unwrap();
    assert_eq!(import.upserted, 1);

    let stored = session.get_images().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].image_id, "ami-0001");
}

#[tokio::test]
async fn test_catalogs_are_scoped_per_provider() {
    let app = TestApp::new().await;
    let mut acme = app.provider("acme").await;
    let other = app.provider("other").await;
    app.vendor.set_images(images(2));

    acme.import_images().await.unwrap();

    assert_eq!(acme.get_images().await.unwrap().len(), 2);
    assert!(other.get_images().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_listing_failure_aborts_import() {
    let app = TestApp::new().await;
    let mut session = app.provider("acme").await;
    app.vendor.set_sizes(sizes());
    app.vendor.set_error_mode(MockError::ListingFails);

    let err = session.import_sizes().await.unwrap_err();
    assert_eq!(err.error_type(), "vendor_error");
    assert!(session.get_sizes().await.unwrap().is_empty());
    assert!(app.vendor.calls().contains(&MockCall::ListSizes));
}
