//! Test factories for generating test data
//!
//! Factories create randomized vendor records, useful when a test needs many
//! distinct nodes and does not care about their names.

use std::sync::atomic::{AtomicU64, Ordering};

use fake::faker::internet::en::IPv4;
use fake::faker::lorem::en::Word;
use fake::Fake;

use nimbus::models::{ExtraData, VendorNode};

/// Factory for live vendor nodes with unique ids and names
pub struct VendorNodeFactory {
    counter: AtomicU64,
}

impl Default for VendorNodeFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl VendorNodeFactory {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// A running node named `{word}-{n}`
    pub fn create(&self) -> VendorNode {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let word: String = Word().fake();
        let id = format!("f-{}", n);

        VendorNode {
            uuid: format!("mock-{}", id),
            name: format!("{}-{}", word.to_lowercase(), n),
            state: 0,
            public_ips: vec![IPv4().fake()],
            private_ips: vec![format!("172.16.0.{}", n % 250 + 1)],
            extra: ExtraData::new(),
            id,
        }
    }

    pub fn create_many(&self, count: usize) -> Vec<VendorNode> {
        (0..count).map(|_| self.create()).collect()
    }
}
