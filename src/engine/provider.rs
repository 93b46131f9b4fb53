//! Resource provider trait definition.
//!
//! A provider creates or updates one resource from fully resolved inputs
//! and reports the remote attributes other resources may read.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::Result;
use crate::graph::{ResourceKind, Urn};
use crate::output::REDACTED;

/// A resource ready for submission.
#[derive(Clone)]
pub struct ApplyRequest {
    /// Resource URN.
    pub urn: Urn,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Plaintext inputs.
    pub inputs: Map<String, Value>,
    /// Inputs that must not be logged.
    pub secret_keys: BTreeSet<String>,
}

impl ApplyRequest {
    /// Returns the inputs with secrets masked.
    #[must_use]
    pub fn redacted_inputs(&self) -> Map<String, Value> {
        self.inputs
            .iter()
            .map(|(key, value)| {
                let value = if self.secret_keys.contains(key) {
                    Value::from(REDACTED)
                } else {
                    value.clone()
                };
                (key.clone(), value)
            })
            .collect()
    }

    /// Returns a string input by key.
    #[must_use]
    pub fn input_str(&self, key: &str) -> Option<&str> {
        self.inputs.get(key).and_then(Value::as_str)
    }
}

impl fmt::Debug for ApplyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplyRequest")
            .field("urn", &self.urn.to_string())
            .field("kind", &self.kind)
            .field("inputs", &self.redacted_inputs())
            .finish()
    }
}

/// A resource as the provider reports it after applying.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppliedResource {
    /// Provider-side identifier.
    pub resource_id: String,
    /// Flattened remote attributes.
    pub attributes: Map<String, Value>,
}

/// Trait for cloud resource providers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Creates or updates a resource and waits until it is provisioned.
    async fn apply(&self, request: &ApplyRequest) -> Result<AppliedResource>;

    /// Gets the provider name.
    fn name(&self) -> &'static str;
}
