//! Deployer for composed stacks.
//!
//! Submits every resource of a graph in order, resolving each resource's
//! deferred inputs against the attributes of resources applied earlier in
//! the run. Once all resources are applied the exports are resolved and the
//! stack state is saved. There are no retries; the first failure ends the
//! run and is recorded in the stack's history.

use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::{DeployError, Result};
use crate::graph::{ResourceDeclaration, StackGraph, Urn};
use crate::output::Resolved;
use crate::stack::Composition;
use crate::state::{DeploymentHistoryEntry, ResourceRecord, StackState, StackStore, StoredOutput};

use super::provider::{ApplyRequest, ResourceProvider};

/// Result of a successful deployment.
#[derive(Debug)]
pub struct DeploymentReport {
    /// Run identifier.
    pub run_id: Uuid,
    /// URNs applied, in order.
    pub applied: Vec<String>,
    /// Stack exports.
    pub outputs: BTreeMap<String, StoredOutput>,
}

/// Deployer for composed stacks.
pub struct Deployer<'a> {
    /// Resource provider.
    provider: &'a dyn ResourceProvider,
    /// Stack store.
    store: &'a dyn StackStore,
}

impl std::fmt::Debug for Deployer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deployer")
            .field("provider", &self.provider.name())
            .field("store", &self.store.backend_type())
            .finish()
    }
}

impl<'a> Deployer<'a> {
    /// Creates a new deployer.
    #[must_use]
    pub const fn new(provider: &'a dyn ResourceProvider, store: &'a dyn StackStore) -> Self {
        Self { provider, store }
    }

    /// Deploys a composed stack.
    ///
    /// # Errors
    ///
    /// Returns an error if an input or export is still unresolved when it is
    /// needed, if the provider fails, or if the state cannot be saved.
    pub async fn deploy(&self, composition: &Composition) -> Result<DeploymentReport> {
        let run_id = Uuid::new_v4();
        let graph = &composition.graph;
        info!(
            "Deploying {} ({} resources) via {}, run {run_id}",
            composition.key,
            graph.len(),
            self.provider.name()
        );

        let mut state = self
            .store
            .load(&composition.key)
            .await?
            .unwrap_or_else(|| StackState::new(composition.key.clone()));

        let mut attributes: BTreeMap<Urn, Map<String, Value>> = BTreeMap::new();
        let mut applied = Vec::with_capacity(graph.len());

        let outcome = self
            .apply_all(graph, &mut state, &mut attributes, &mut applied)
            .await
            .and_then(|()| resolve_exports(graph, &attributes));

        let outputs = match outcome {
            Ok(outputs) => outputs,
            Err(e) => {
                error!("Deployment of {} failed: {e}", composition.key);
                state.add_history(DeploymentHistoryEntry::failed(
                    run_id,
                    &composition.config_hash,
                    applied,
                    &e.to_string(),
                ));
                if let Err(save_err) = self.store.save(&state).await {
                    error!("Failed to record the failed run of {}: {save_err}", composition.key);
                }
                return Err(e);
            }
        };

        let declared: Vec<String> = graph.resources().iter().map(|r| r.urn.to_string()).collect();
        state.retain_resources(&declared);
        state.config_hash.clone_from(&composition.config_hash);
        state.set_outputs(outputs.clone());
        state.add_history(DeploymentHistoryEntry::new(
            run_id,
            &composition.config_hash,
            applied.clone(),
        ));
        self.store.save(&state).await?;

        info!("Deployed {} resources to {}", applied.len(), composition.key);
        Ok(DeploymentReport {
            run_id,
            applied,
            outputs,
        })
    }

    async fn apply_all(
        &self,
        graph: &StackGraph,
        state: &mut StackState,
        attributes: &mut BTreeMap<Urn, Map<String, Value>>,
        applied: &mut Vec<String>,
    ) -> Result<()> {
        for resource in graph.resources() {
            let request = prepare(resource, attributes)?;
            debug!("Submitting {}", resource.urn);

            let result = self.provider.apply(&request).await?;
            state.set_resource(ResourceRecord {
                urn: resource.urn.to_string(),
                kind: resource.kind,
                resource_id: result.resource_id,
                attributes: result.attributes.clone(),
                updated_at: Utc::now(),
            });
            attributes.insert(resource.urn.clone(), result.attributes);
            applied.push(resource.urn.to_string());
        }
        Ok(())
    }
}

/// Resolves a resource's inputs into a submission request.
fn prepare(
    resource: &ResourceDeclaration,
    attributes: &BTreeMap<Urn, Map<String, Value>>,
) -> Result<ApplyRequest> {
    let resolved = resource.inputs.resolve(attributes)?;
    if let Some(input) = resolved.first_unknown() {
        return Err(DeployError::UnresolvedInput {
            urn: resource.urn.to_string(),
            input: input.to_string(),
        }
        .into());
    }

    let inputs = resolved.clone().into_known().unwrap_or_default();
    let secret_keys: BTreeSet<String> = inputs
        .keys()
        .filter(|key| resolved.is_secret(key))
        .cloned()
        .collect();

    Ok(ApplyRequest {
        urn: resource.urn.clone(),
        kind: resource.kind,
        inputs,
        secret_keys,
    })
}

fn resolve_exports(
    graph: &StackGraph,
    attributes: &BTreeMap<Urn, Map<String, Value>>,
) -> Result<BTreeMap<String, StoredOutput>> {
    graph
        .exports()
        .iter()
        .map(|export| match export.value.resolve(attributes)? {
            Resolved::Known(value) => {
                let stored = if export.value.is_secret() {
                    StoredOutput::secret(value)
                } else {
                    StoredOutput::plain(value)
                };
                Ok((export.name.clone(), stored))
            }
            Resolved::Unknown => Err(DeployError::UnresolvedExport {
                name: export.name.clone(),
            }
            .into()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigResolver, StackKey, StackSettings};
    use crate::engine::provider::{AppliedResource, MockResourceProvider};
    use crate::error::{AzureError, InfraError, StateError};
    use crate::graph::{Properties, ResourceKind, ResourceOptions, StackBuilder};
    use crate::output::{Output, Secret};
    use crate::stack::compose_shared;
    use crate::state::LocalStackStore;
    use mockall::predicate::always;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn applied_with(request: &ApplyRequest) -> AppliedResource {
        let name = request.input_str("name").unwrap_or_default().to_string();
        let mut attributes = Map::new();
        attributes.insert(String::from("id"), Value::from(format!("/ids/{name}")));
        attributes.insert(String::from("name"), Value::from(name.clone()));
        attributes.insert(
            String::from("fullyQualifiedDomainName"),
            Value::from(format!("{name}.postgres.database.azure.com")),
        );
        AppliedResource {
            resource_id: format!("/ids/{name}"),
            attributes,
        }
    }

    fn shared_settings() -> StackSettings {
        StackSettings {
            location: Some(String::from("westeurope")),
            db_admin_username: Some(String::from("infusethink_admin")),
            db_admin_password: Some(Secret::new(String::from("p@ss"))),
            ..StackSettings::default()
        }
    }

    #[tokio::test]
    async fn test_deploy_shared_stack_stores_exports() {
        let temp = TempDir::new().unwrap();
        let store = LocalStackStore::with_base_dir(temp.path());
        let composition = compose_shared(&ConfigResolver::new().shared(), &shared_settings()).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let mut provider = MockResourceProvider::new();
        provider.expect_name().return_const("mock");
        provider
            .expect_apply()
            .with(always())
            .times(4)
            .returning(move |request| {
                recorder.lock().unwrap().push(request.clone());
                Ok(applied_with(request))
            });

        let report = Deployer::new(&provider, &store).deploy(&composition).await.unwrap();
        assert_eq!(report.applied.len(), 4);

        let requests = seen.lock().unwrap();
        assert_eq!(requests[0].kind, ResourceKind::ResourceGroup);
        let server = &requests[1];
        assert_eq!(server.kind, ResourceKind::PostgresServer);
        assert_eq!(server.input_str("properties.administratorLoginPassword"), Some("p@ss"));
        assert!(server.secret_keys.contains("properties.administratorLoginPassword"));
        assert_eq!(requests[2].input_str("parentName"), Some("psql-infusethink"));

        assert_eq!(
            report.outputs["postgres_server_fqdn"].value,
            "psql-infusethink.postgres.database.azure.com"
        );
        assert!(report.outputs["postgres_admin_password"].secret);

        let state = store.load(&composition.key).await.unwrap().unwrap();
        assert_eq!(state.resources.len(), 4);
        assert_eq!(state.config_hash, composition.config_hash);
        assert_eq!(state.last_success().unwrap().run_id, report.run_id);
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_stops_the_run() {
        let temp = TempDir::new().unwrap();
        let store = LocalStackStore::with_base_dir(temp.path());
        let composition = compose_shared(&ConfigResolver::new().shared(), &shared_settings()).unwrap();

        let mut provider = MockResourceProvider::new();
        provider.expect_name().return_const("mock");
        let mut calls = 0;
        provider.expect_apply().times(2).returning(move |request| {
            calls += 1;
            if calls == 1 {
                Ok(applied_with(request))
            } else {
                Err(AzureError::api_error(409, "quota exceeded").into())
            }
        });

        let err = Deployer::new(&provider, &store).deploy(&composition).await.unwrap_err();
        assert!(matches!(err, InfraError::Azure(AzureError::ApiRequestFailed { .. })));

        let state = store.load(&composition.key).await.unwrap().unwrap();
        let entry = state.history.last().unwrap();
        assert!(!entry.success);
        assert_eq!(entry.resources.len(), 1);
        assert!(state.outputs.is_empty());
    }

    struct UnwritableStore;

    #[async_trait::async_trait]
    impl StackStore for UnwritableStore {
        async fn load(&self, _key: &StackKey) -> Result<Option<StackState>> {
            Ok(None)
        }

        async fn save(&self, _state: &StackState) -> Result<()> {
            Err(StateError::write_failed("disk full").into())
        }

        fn backend_type(&self) -> &'static str {
            "unwritable"
        }
    }

    #[tokio::test]
    async fn test_provider_error_survives_failed_state_write() {
        let composition = compose_shared(&ConfigResolver::new().shared(), &shared_settings()).unwrap();

        let mut provider = MockResourceProvider::new();
        provider.expect_name().return_const("mock");
        provider
            .expect_apply()
            .times(1)
            .returning(|_| Err(AzureError::api_error(409, "quota exceeded").into()));

        let err = Deployer::new(&provider, &UnwritableStore)
            .deploy(&composition)
            .await
            .unwrap_err();
        assert!(matches!(err, InfraError::Azure(AzureError::ApiRequestFailed { .. })));
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_unresolvable_input_fails_before_submission() {
        let temp = TempDir::new().unwrap();
        let store = LocalStackStore::with_base_dir(temp.path());

        let mut builder = StackBuilder::new("dev");
        let plan = builder
            .register(
                ResourceKind::AppServicePlan,
                "asp",
                Properties::new().set_value("name", "asp").set_value("resourceGroupName", "rg"),
                ResourceOptions::new(),
            )
            .unwrap();
        builder
            .register(
                ResourceKind::WebApp,
                "app",
                Properties::new()
                    .set_value("name", "app")
                    .set_value("resourceGroupName", "rg")
                    .set("properties.serverFarmId", Output::<String>::attribute(&plan, "missing")),
                ResourceOptions::new(),
            )
            .unwrap();
        let composition = Composition {
            key: StackKey::new("infusethink", "infusethink", "dev"),
            config_hash: String::from("hash"),
            graph: builder.finish().unwrap(),
        };

        let mut provider = MockResourceProvider::new();
        provider.expect_name().return_const("mock");
        provider
            .expect_apply()
            .times(1)
            .returning(|request| Ok(applied_with(request)));

        let err = Deployer::new(&provider, &store).deploy(&composition).await.unwrap_err();
        assert!(matches!(
            err,
            InfraError::Deploy(DeployError::UnresolvedInput { ref input, .. })
                if input == "properties.serverFarmId"
        ));
    }

    #[test]
    fn test_prepare_resolves_against_applied_attributes() {
        let mut builder = StackBuilder::new("dev");
        let plan = builder
            .register(
                ResourceKind::AppServicePlan,
                "asp",
                Properties::new().set_value("name", "asp"),
                ResourceOptions::new(),
            )
            .unwrap();
        builder
            .register(
                ResourceKind::WebApp,
                "app",
                Properties::new()
                    .set_value("name", "app")
                    .set("properties.serverFarmId", Output::<String>::attribute(&plan, "id"))
                    .set("secret", Output::secret(String::from("hidden"))),
                ResourceOptions::new(),
            )
            .unwrap();
        let graph = builder.finish().unwrap();
        let app = &graph.resources()[1];

        let attributes = BTreeMap::from([(
            plan.clone(),
            json!({ "id": "/plans/asp" }).as_object().cloned().unwrap(),
        )]);
        let request = prepare(app, &attributes).unwrap();
        assert_eq!(request.input_str("properties.serverFarmId"), Some("/plans/asp"));
        assert_eq!(request.secret_keys, BTreeSet::from([String::from("secret")]));
    }
}
