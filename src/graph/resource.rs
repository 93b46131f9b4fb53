//! Resource declarations and their inputs.
//!
//! A declaration is what a module hands to the graph builder: the resource
//! kind, its logical name, a map of deferred inputs and any explicit
//! ordering constraints. Nothing here talks to Azure.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::Result;
use crate::output::{AttributeSource, Output, REDACTED, Resolved};

use super::urn::Urn;

/// Placeholder rendered for inputs that resolve at deploy time.
pub const UNKNOWN_PLACEHOLDER: &str = "(known after deploy)";

/// Input keys that locate a resource rather than describe it.
///
/// Every other key is a dotted path into the resource body, so
/// `properties.siteConfig.alwaysOn` becomes a nested field.
pub const ADDRESS_KEYS: [&str; 4] = ["name", "resourceGroupName", "parentName", "recordType"];

/// Kinds of Azure resources this tool declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Resource group.
    ResourceGroup,
    /// App Service plan.
    AppServicePlan,
    /// App Service web app.
    WebApp,
    /// Custom hostname binding on a web app.
    HostNameBinding,
    /// App Service managed certificate.
    Certificate,
    /// PostgreSQL flexible server.
    PostgresServer,
    /// PostgreSQL firewall rule.
    FirewallRule,
    /// PostgreSQL database.
    Database,
    /// Public DNS zone.
    DnsZone,
    /// DNS record set.
    RecordSet,
}

impl ResourceKind {
    /// Returns the provider type token for this kind.
    #[must_use]
    pub const fn type_token(self) -> &'static str {
        match self {
            Self::ResourceGroup => "azure:resources:ResourceGroup",
            Self::AppServicePlan => "azure:web:AppServicePlan",
            Self::WebApp => "azure:web:WebApp",
            Self::HostNameBinding => "azure:web:WebAppHostNameBinding",
            Self::Certificate => "azure:web:Certificate",
            Self::PostgresServer => "azure:dbforpostgresql:Server",
            Self::FirewallRule => "azure:dbforpostgresql:FirewallRule",
            Self::Database => "azure:dbforpostgresql:Database",
            Self::DnsZone => "azure:dns:Zone",
            Self::RecordSet => "azure:dns:RecordSet",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_token())
    }
}

/// Ordered map of deferred resource inputs.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    entries: BTreeMap<String, Output<Value>>,
}

impl Properties {
    /// Creates an empty property map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a deferred input.
    #[must_use]
    pub fn set<T>(mut self, key: &str, value: Output<T>) -> Self
    where
        T: Serialize + Send + Sync + 'static,
    {
        self.entries.insert(key.to_string(), value.into_value());
        self
    }

    /// Sets an input whose value is known now.
    #[must_use]
    pub fn set_value(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.entries
            .insert(key.to_string(), Output::known(value.into()));
        self
    }

    /// Returns an input by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Output<Value>> {
        self.entries.get(key)
    }

    /// Returns the number of inputs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no inputs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns every resource the inputs are derived from.
    #[must_use]
    pub fn dependencies(&self) -> BTreeSet<Urn> {
        self.entries
            .values()
            .flat_map(|output| output.dependencies().iter().cloned())
            .collect()
    }

    /// Evaluates all inputs against an attribute source.
    ///
    /// # Errors
    ///
    /// Returns an error if any input fails to resolve.
    pub fn resolve(&self, source: &dyn AttributeSource) -> Result<ResolvedInputs> {
        let mut values = BTreeMap::new();
        let mut secret_keys = BTreeSet::new();

        for (key, output) in &self.entries {
            if output.is_secret() {
                secret_keys.insert(key.clone());
            }
            values.insert(key.clone(), output.resolve(source)?);
        }

        Ok(ResolvedInputs {
            values,
            secret_keys,
        })
    }
}

/// Explicit per-resource options.
#[derive(Debug, Clone, Default)]
pub struct ResourceOptions {
    /// Resources that must exist before this one, without a data dependency.
    pub depends_on: Vec<Urn>,
}

impl ResourceOptions {
    /// Creates options with no constraints.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an ordering-only dependency.
    #[must_use]
    pub fn depends_on(mut self, urn: &Urn) -> Self {
        self.depends_on.push(urn.clone());
        self
    }
}

/// A resource registered with the graph builder.
#[derive(Debug, Clone)]
pub struct ResourceDeclaration {
    /// Unique resource identifier.
    pub urn: Urn,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Logical name chosen by the declaring module.
    pub logical_name: String,
    /// Deferred inputs.
    pub inputs: Properties,
    /// Ordering-only dependencies.
    pub depends_on: BTreeSet<Urn>,
}

impl ResourceDeclaration {
    /// Returns data-flow dependencies.
    #[must_use]
    pub fn data_dependencies(&self) -> BTreeSet<Urn> {
        let mut dependencies = self.inputs.dependencies();
        dependencies.remove(&self.urn);
        dependencies
    }

    /// Returns data-flow and ordering dependencies together.
    #[must_use]
    pub fn all_dependencies(&self) -> BTreeSet<Urn> {
        let mut dependencies = self.data_dependencies();
        dependencies.extend(self.depends_on.iter().cloned());
        dependencies
    }
}

/// Inputs of one resource after evaluation.
#[derive(Clone)]
pub struct ResolvedInputs {
    values: BTreeMap<String, Resolved<Value>>,
    secret_keys: BTreeSet<String>,
}

impl ResolvedInputs {
    /// Returns the first input that is still unknown.
    #[must_use]
    pub fn first_unknown(&self) -> Option<&str> {
        self.values
            .iter()
            .find(|(_, value)| !value.is_known())
            .map(|(key, _)| key.as_str())
    }

    /// Returns true if every input is known.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.first_unknown().is_none()
    }

    /// Returns true if the input is secret.
    #[must_use]
    pub fn is_secret(&self, key: &str) -> bool {
        self.secret_keys.contains(key)
    }

    /// Returns a resolved input by key, if known.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self.values.get(key) {
            Some(Resolved::Known(value)) => Some(value),
            _ => None,
        }
    }

    /// Returns the plaintext inputs, or `None` if any is unknown.
    #[must_use]
    pub fn into_known(self) -> Option<Map<String, Value>> {
        let mut map = Map::new();
        for (key, value) in self.values {
            map.insert(key, value.known()?);
        }
        Some(map)
    }

    /// Returns a display-safe rendering with secrets and unknowns replaced.
    #[must_use]
    pub fn redacted(&self) -> Map<String, Value> {
        self.values
            .iter()
            .map(|(key, value)| {
                let rendered = if self.secret_keys.contains(key) {
                    Value::from(REDACTED)
                } else {
                    match value {
                        Resolved::Known(v) => v.clone(),
                        Resolved::Unknown => Value::from(UNKNOWN_PLACEHOLDER),
                    }
                };
                (key.clone(), rendered)
            })
            .collect()
    }
}

impl fmt::Debug for ResolvedInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.redacted()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{NoAttributes, Secret};

    #[test]
    fn test_properties_collect_dependencies() {
        let plan = Urn::new("dev", ResourceKind::AppServicePlan, "asp-infusethink-trials");
        let props = Properties::new()
            .set_value("name", "infusethink-trials")
            .set("serverFarmId", Output::<String>::attribute(&plan, "id"));

        assert_eq!(props.len(), 2);
        assert!(props.dependencies().contains(&plan));
    }

    #[test]
    fn test_redacted_masks_secrets_and_unknowns() {
        let plan = Urn::new("dev", ResourceKind::AppServicePlan, "asp-infusethink-trials");
        let password = Output::secret(Secret::new(String::from("p@ss"))).map(Secret::into_inner);
        let props = Properties::new()
            .set_value("name", "infusethink-trials")
            .set("password", password)
            .set("serverFarmId", Output::<String>::attribute(&plan, "id"));

        let resolved = props.resolve(&NoAttributes).unwrap();
        let redacted = resolved.redacted();

        assert_eq!(redacted["name"], "infusethink-trials");
        assert_eq!(redacted["password"], REDACTED);
        assert_eq!(redacted["serverFarmId"], UNKNOWN_PLACEHOLDER);
        assert!(!format!("{resolved:?}").contains("p@ss"));
        assert_eq!(resolved.first_unknown(), Some("serverFarmId"));
        assert!(resolved.into_known().is_none());
    }

    #[test]
    fn test_all_dependencies_include_explicit_edges() {
        let zone = Urn::new("prod", ResourceKind::DnsZone, "infuseth-ink");
        let txt = Urn::new("prod", ResourceKind::RecordSet, "asuid-www");
        let declaration = ResourceDeclaration {
            urn: Urn::new("prod", ResourceKind::HostNameBinding, "www-binding"),
            kind: ResourceKind::HostNameBinding,
            logical_name: String::from("www-binding"),
            inputs: Properties::new().set("zone", Output::known_from(&zone, String::from("z"))),
            depends_on: BTreeSet::from([txt.clone()]),
        };

        let deps = declaration.all_dependencies();
        assert!(deps.contains(&zone));
        assert!(deps.contains(&txt));
        assert_eq!(declaration.data_dependencies().len(), 1);
    }
}
