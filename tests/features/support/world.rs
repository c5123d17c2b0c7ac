//! Test world for Cucumber scenarios

use cucumber::World;

use nimbus::models::SyncReport;
use nimbus::ProviderSession;

use crate::common::TestApp;

/// Test world that maintains state across scenario steps
#[derive(Default, World)]
pub struct TestWorld {
    /// Database, service and mock vendor of the scenario
    pub app: Option<TestApp>,

    /// Provider the scenario operates on
    pub session: Option<ProviderSession>,

    /// Report of the last sync
    pub last_report: Option<SyncReport>,

    /// Error type of the last failed operation
    pub last_error: Option<String>,
}

impl std::fmt::Debug for TestWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestWorld")
            .field("provider", &self.session.as_ref().map(|s| &s.provider().name))
            .field("last_report", &self.last_report)
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl TestWorld {
    /// Test application, created on first use
    pub async fn app(&mut self) -> &TestApp {
        if self.app.is_none() {
            self.app = Some(TestApp::new().await);
        }
        self.app.as_ref().expect("test app initialized")
    }

    pub fn session(&mut self) -> &mut ProviderSession {
        self.session.as_mut().expect("No provider registered in this scenario")
    }

    pub fn vendor(&self) -> &crate::common::MockVendor {
        &self.app.as_ref().expect("No provider registered in this scenario").vendor
    }
}
