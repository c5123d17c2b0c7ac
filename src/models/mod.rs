//! Data models

mod catalog;
mod node;
mod provider;
mod sync;
mod vendor;

pub use catalog::*;
pub use node::*;
pub use provider::*;
pub use sync::*;
pub use vendor::*;
