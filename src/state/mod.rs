//! Stack state storage.
//!
//! Every deployment records what it applied and what the stack exports.
//! Cross-stack references read exports from here.

mod local;
mod store;
mod types;

pub use local::LocalStackStore;
pub use store::StackStore;
pub use types::{
    DeploymentHistoryEntry, ResourceRecord, STATE_VERSION, StackState, StoredOutput,
};
