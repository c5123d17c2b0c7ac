//! Node lifecycle step definitions

use cucumber::{given, then, when};

use crate::common::{images, locations, node_form, sizes, MockError};
use crate::features::support::TestWorld;

#[given(expr = "the vendor offers the standard catalog")]
async fn vendor_catalog(world: &mut TestWorld) {
    let vendor = world.vendor();
    vendor.set_images(images(2));
    vendor.set_locations(locations());
    vendor.set_sizes(sizes());
}

#[given(expr = "the vendor refuses node operations")]
async fn vendor_refuses(world: &mut TestWorld) {
    world.vendor().set_error_mode(MockError::RejectOperations);
}

#[when(expr = "I spawn a node named {string}")]
async fn spawn_node(world: &mut TestWorld, name: String) {
    let result = world.session().create_node(&node_form(&name), "operator").await;
    if let Err(e) = result {
        world.last_error = Some(e.error_type().to_string());
    }
}

#[when(expr = "I destroy node {string}")]
async fn destroy_node(world: &mut TestWorld, name: String) {
    let session = world.session();
    let mut node = session.find_node(&name).await.unwrap();
    let result = session.destroy_node(&mut node).await;
    if let Err(e) = result {
        world.last_error = Some(e.error_type().to_string());
    }
}

#[then(expr = "node {string} is in state {string}")]
async fn node_in_state(world: &mut TestWorld, name: String, state: String) {
    let node = world.session().find_node(&name).await.unwrap();
    assert_eq!(node.state.as_str(), state);
}

#[then(expr = "the operation fails with {string}")]
async fn operation_fails(world: &mut TestWorld, error_type: String) {
    assert_eq!(world.last_error.as_deref(), Some(error_type.as_str()));
}

#[then(expr = "the operation succeeds")]
async fn operation_succeeds(world: &mut TestWorld) {
    assert_eq!(world.last_error, None);
}
