//! Deployment plan types and construction.
//!
//! A plan is the display-safe view of a composed stack: every resource in
//! submission order with its inputs rendered, deferred values shown as
//! placeholders and secrets masked. It also says which resources the last
//! deployment already applied.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

use crate::config::StackKey;
use crate::error::Result;
use crate::graph::{ResourceKind, UNKNOWN_PLACEHOLDER};
use crate::output::{NoAttributes, REDACTED, Resolved};
use crate::stack::Composition;
use crate::state::StackState;

/// A complete deployment plan.
#[derive(Debug, Serialize)]
pub struct DeploymentPlan {
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// Stack the plan applies to.
    pub stack: StackKey,
    /// Configuration hash this plan is based on.
    pub config_hash: String,
    /// Configuration hash of the last deployment, if any.
    pub previous_hash: Option<String>,
    /// Planned actions in submission order.
    pub actions: Vec<PlannedAction>,
    /// Exports with their preview values.
    pub exports: Vec<PlannedExport>,
}

/// A single planned action.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedAction {
    /// Action type.
    pub action_type: ActionType,
    /// Resource URN.
    pub urn: String,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Logical name.
    pub logical_name: String,
    /// URNs that must be applied first.
    pub dependencies: Vec<String>,
    /// Display-safe inputs.
    pub inputs: Map<String, Value>,
}

/// Types of actions in a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// The resource has never been applied.
    Create,
    /// The resource was applied before and is submitted again.
    Update,
    /// The resource is no longer declared; its record is dropped.
    Untrack,
}

/// An export as it will look after deployment.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedExport {
    /// Export name.
    pub name: String,
    /// Display-safe value.
    pub value: Value,
    /// Whether the export is secret.
    pub secret: bool,
}

impl DeploymentPlan {
    /// Creates a plan from a composed stack and its previous state.
    ///
    /// # Errors
    ///
    /// Returns an error if a known input fails to evaluate.
    pub fn from_composition(composition: &Composition, previous: Option<&StackState>) -> Result<Self> {
        let graph = &composition.graph;
        let mut declared = BTreeSet::new();
        let mut actions = Vec::with_capacity(graph.len());

        for resource in graph.resources() {
            let urn = resource.urn.to_string();
            let action_type = if previous.is_some_and(|state| state.resource(&urn).is_some()) {
                ActionType::Update
            } else {
                ActionType::Create
            };
            let inputs = resource.inputs.resolve(&NoAttributes)?.redacted();
            actions.push(PlannedAction {
                action_type,
                urn: urn.clone(),
                kind: resource.kind,
                logical_name: resource.logical_name.clone(),
                dependencies: resource
                    .all_dependencies()
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
                inputs,
            });
            declared.insert(urn);
        }

        if let Some(state) = previous {
            for (urn, record) in &state.resources {
                if !declared.contains(urn) {
                    actions.push(PlannedAction {
                        action_type: ActionType::Untrack,
                        urn: urn.clone(),
                        kind: record.kind,
                        logical_name: urn.rsplit("::").next().unwrap_or(urn).to_string(),
                        dependencies: vec![],
                        inputs: Map::new(),
                    });
                }
            }
        }

        let exports = graph
            .exports()
            .iter()
            .map(|export| {
                let value = if export.value.is_secret() {
                    Value::from(REDACTED)
                } else {
                    match export.value.resolve(&NoAttributes)? {
                        Resolved::Known(value) => value,
                        Resolved::Unknown => Value::from(UNKNOWN_PLACEHOLDER),
                    }
                };
                Ok(PlannedExport {
                    name: export.name.clone(),
                    value,
                    secret: export.value.is_secret(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            created_at: Utc::now(),
            stack: composition.key.clone(),
            config_hash: composition.config_hash.clone(),
            previous_hash: previous.map(|state| state.config_hash.clone()),
            actions,
            exports,
        })
    }

    /// Returns true if the configuration differs from the last deployment.
    #[must_use]
    pub fn config_changed(&self) -> bool {
        self.previous_hash.as_deref() != Some(self.config_hash.as_str())
    }

    /// Returns true if the plan is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Returns the number of actions.
    #[must_use]
    pub const fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Returns the number of actions of one type.
    #[must_use]
    pub fn count(&self, action_type: ActionType) -> usize {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .count()
    }
}

impl PlannedAction {
    /// Returns a human-readable description of the action.
    #[must_use]
    pub fn description(&self) -> String {
        match self.action_type {
            ActionType::Create => format!("Create {} '{}'", self.kind, self.logical_name),
            ActionType::Update => format!("Update {} '{}'", self.kind, self.logical_name),
            ActionType::Untrack => format!("Stop tracking {} '{}'", self.kind, self.logical_name),
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Untrack => "untrack",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.action_type, self.kind, self.logical_name)
    }
}

impl fmt::Display for DeploymentPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.actions.is_empty() {
            return write!(f, "No resources declared");
        }

        writeln!(f, "Deployment Plan for {} ({} actions):", self.stack, self.actions.len())?;
        for (i, action) in self.actions.iter().enumerate() {
            writeln!(f, "  {i}. {action}")?;
        }

        if !self.exports.is_empty() {
            writeln!(f, "\nOutputs:")?;
            for export in &self.exports {
                writeln!(f, "  {}: {}", export.name, export.value)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigResolver, Environment, StackSettings};
    use crate::output::{Output, Secret};
    use crate::stack::{SharedStackOutputs, build_environment};
    use crate::state::ResourceRecord;

    fn prod() -> Composition {
        let settings = StackSettings {
            location: Some(String::from("westeurope")),
            ..StackSettings::default()
        };
        let shared = SharedStackOutputs {
            resource_group_name: Output::known(String::from("rg-infusethink-shared")),
            postgres_server_name: Output::known(String::from("psql-infusethink")),
            postgres_server_fqdn: Output::known(String::from("db.example")),
            postgres_admin_password: Output::secret(Secret::new(String::from("p@ss"))),
        };
        let record = ConfigResolver::new().for_environment(Environment::Prod);
        build_environment(&record, &settings, Some(shared)).unwrap()
    }

    #[test]
    fn test_fresh_stack_creates_everything() {
        let composition = prod();
        let plan = DeploymentPlan::from_composition(&composition, None).unwrap();

        assert_eq!(plan.action_count(), composition.graph.len());
        assert_eq!(plan.count(ActionType::Create), plan.action_count());
        assert!(plan.config_changed());
    }

    #[test]
    fn test_preview_masks_secrets_and_defers_unknowns() {
        let composition = prod();
        let plan = DeploymentPlan::from_composition(&composition, None).unwrap();
        let rendered = serde_json::to_string(&plan).unwrap();
        assert!(!rendered.contains("p@ss"));

        let connection = plan
            .exports
            .iter()
            .find(|e| e.name == "database_connection_string")
            .unwrap();
        assert_eq!(connection.value, Value::from(REDACTED));

        let url = plan.exports.iter().find(|e| e.name == "frontend_url").unwrap();
        assert_eq!(url.value, Value::from(UNKNOWN_PLACEHOLDER));

        let app = plan
            .actions
            .iter()
            .find(|a| a.logical_name == "infusethink-app")
            .unwrap();
        assert_eq!(app.inputs["properties.serverFarmId"], Value::from(UNKNOWN_PLACEHOLDER));
        assert_eq!(app.inputs["name"], Value::from("infusethink-app"));
    }

    #[test]
    fn test_previous_state_marks_updates_and_untracks() {
        let composition = prod();
        let first = &composition.graph.resources()[0];

        let mut state = StackState::new(composition.key.clone());
        state.config_hash.clone_from(&composition.config_hash);
        for (urn, kind) in [
            (first.urn.to_string(), first.kind),
            (String::from("urn:infusethink:prod::azure:dns:RecordSet::old"), ResourceKind::RecordSet),
        ] {
            state.set_resource(ResourceRecord {
                urn,
                kind,
                resource_id: String::from("/id"),
                attributes: Map::new(),
                updated_at: Utc::now(),
            });
        }

        let plan = DeploymentPlan::from_composition(&composition, Some(&state)).unwrap();
        assert_eq!(plan.count(ActionType::Update), 1);
        assert_eq!(plan.count(ActionType::Untrack), 1);
        assert!(!plan.config_changed());

        let untrack = plan.actions.last().unwrap();
        assert_eq!(untrack.logical_name, "old");
        assert!(plan.to_string().contains("untrack"));
    }
}
