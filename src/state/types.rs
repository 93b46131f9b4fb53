//! State types for deployed stacks.
//!
//! A stack's state records the remote attributes of every resource the last
//! deployment applied, the stack's exports, and a short history of runs.
//! Exports are what cross-stack references read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::config::StackKey;
use crate::graph::ResourceKind;
use crate::output::REDACTED;

/// Current version of the state format.
pub const STATE_VERSION: &str = "1.0";

/// Number of history entries kept per stack.
const MAX_HISTORY: usize = 100;

/// The recorded state of one stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackState {
    /// State format version.
    pub version: String,
    /// Stack identity.
    pub key: StackKey,
    /// Fingerprint of the last applied configuration.
    pub config_hash: String,
    /// Applied resources, keyed by URN.
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceRecord>,
    /// Stack exports, keyed by name.
    #[serde(default)]
    pub outputs: BTreeMap<String, StoredOutput>,
    /// When the state was last updated.
    pub last_updated: DateTime<Utc>,
    /// Deployment history (recent entries).
    #[serde(default)]
    pub history: Vec<DeploymentHistoryEntry>,
}

/// A resource as the provider last reported it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Resource URN.
    pub urn: String,
    /// Resource kind.
    pub kind: ResourceKind,
    /// ARM resource id.
    pub resource_id: String,
    /// Remote attributes.
    #[serde(default)]
    pub attributes: Map<String, Value>,
    /// When the resource was last applied.
    pub updated_at: DateTime<Utc>,
}

/// A stack export.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredOutput {
    /// Export value.
    pub value: Value,
    /// Whether the value must be masked when displayed.
    #[serde(default)]
    pub secret: bool,
}

impl StoredOutput {
    /// Creates a plain export.
    #[must_use]
    pub const fn plain(value: Value) -> Self {
        Self {
            value,
            secret: false,
        }
    }

    /// Creates a secret export.
    #[must_use]
    pub const fn secret(value: Value) -> Self {
        Self {
            value,
            secret: true,
        }
    }

    /// Returns the value, masked if secret.
    #[must_use]
    pub fn display_value(&self) -> Value {
        if self.secret {
            Value::from(REDACTED)
        } else {
            self.value.clone()
        }
    }
}

impl std::fmt::Debug for StoredOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredOutput")
            .field("value", &self.display_value())
            .field("secret", &self.secret)
            .finish()
    }
}

/// A single entry in the deployment history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentHistoryEntry {
    /// Run identifier.
    pub run_id: Uuid,
    /// When the deployment finished.
    pub timestamp: DateTime<Utc>,
    /// Configuration fingerprint at time of deployment.
    pub config_hash: String,
    /// Resources applied during the run.
    pub resources: Vec<String>,
    /// Whether the deployment succeeded.
    pub success: bool,
    /// Optional error message.
    #[serde(default)]
    pub error: Option<String>,
}

impl StackState {
    /// Creates a new empty stack state.
    #[must_use]
    pub fn new(key: StackKey) -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            key,
            config_hash: String::new(),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
            last_updated: Utc::now(),
            history: Vec::new(),
        }
    }

    /// Gets a resource by URN.
    #[must_use]
    pub fn resource(&self, urn: &str) -> Option<&ResourceRecord> {
        self.resources.get(urn)
    }

    /// Adds or updates a resource.
    pub fn set_resource(&mut self, record: ResourceRecord) {
        self.resources.insert(record.urn.clone(), record);
        self.last_updated = Utc::now();
    }

    /// Drops resources that are no longer declared.
    ///
    /// The remote resources are left alone; only the record goes.
    pub fn retain_resources(&mut self, declared: &[String]) {
        self.resources.retain(|urn, _| declared.contains(urn));
    }

    /// Gets an export by name.
    #[must_use]
    pub fn output(&self, name: &str) -> Option<&StoredOutput> {
        self.outputs.get(name)
    }

    /// Replaces every export.
    pub fn set_outputs(&mut self, outputs: BTreeMap<String, StoredOutput>) {
        self.outputs = outputs;
        self.last_updated = Utc::now();
    }

    /// Adds a history entry.
    pub fn add_history(&mut self, entry: DeploymentHistoryEntry) {
        if self.history.len() >= MAX_HISTORY {
            self.history.remove(0);
        }
        self.history.push(entry);
    }

    /// Returns the most recent successful run.
    #[must_use]
    pub fn last_success(&self) -> Option<&DeploymentHistoryEntry> {
        self.history.iter().rev().find(|entry| entry.success)
    }
}

impl DeploymentHistoryEntry {
    /// Creates a successful history entry.
    #[must_use]
    pub fn new(run_id: Uuid, config_hash: &str, resources: Vec<String>) -> Self {
        Self {
            run_id,
            timestamp: Utc::now(),
            config_hash: config_hash.to_string(),
            resources,
            success: true,
            error: None,
        }
    }

    /// Creates a failed history entry.
    #[must_use]
    pub fn failed(run_id: Uuid, config_hash: &str, resources: Vec<String>, error: &str) -> Self {
        Self {
            run_id,
            timestamp: Utc::now(),
            config_hash: config_hash.to_string(),
            resources,
            success: false,
            error: Some(error.to_string()),
        }
    }
}
