//! Stack store trait definition.
//!
//! This module defines the common interface for stack state backends.

use async_trait::async_trait;

use crate::config::StackKey;
use crate::error::Result;

use super::types::StackState;

/// Trait for stack state backends.
#[async_trait]
pub trait StackStore: Send + Sync {
    /// Loads the state of a stack.
    ///
    /// Returns `None` if the stack has never been deployed.
    async fn load(&self, key: &StackKey) -> Result<Option<StackState>>;

    /// Saves the state of a stack.
    async fn save(&self, state: &StackState) -> Result<()>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}

