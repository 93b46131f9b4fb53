//! Shared stack composition.
//!
//! The shared stack owns the PostgreSQL server every environment stores its
//! database in. It is deployed on its own and publishes the exports
//! environment stacks reference.

use tracing::info;

use crate::config::{ConfigHasher, SharedInfraConfig, StackSettings};
use crate::error::Result;
use crate::graph::{Properties, ResourceKind, ResourceOptions, StackBuilder};
use crate::modules::{ResourceGroupHandle, ServerArgs, declare_server};
use crate::output::{Output, Secret};

use super::composition::Composition;
use super::reference::SharedStackOutputs;

/// Composes the shared stack.
///
/// # Errors
///
/// Returns an error if the location, administrator login or administrator
/// password is missing, or if the graph cannot be built.
pub fn compose_shared(shared: &SharedInfraConfig, settings: &StackSettings) -> Result<Composition> {
    let location = settings.require_location()?;
    let admin_username = settings.require_admin_username()?;
    let admin_password = settings.require_admin_password()?.clone();
    let mut builder = StackBuilder::new(&settings.shared_stack);

    // The shared group keeps its fixed name rather than the per-environment
    // naming scheme.
    let group_name = shared.resource_group_name.as_str();
    let inputs = Properties::new()
        .set_value("name", group_name)
        .set_value("location", location)
        .set_value("tags", &shared.tags);
    let urn = builder.register(
        ResourceKind::ResourceGroup,
        group_name,
        inputs,
        ResourceOptions::new(),
    )?;
    let resource_group = ResourceGroupHandle {
        name: Output::known_from(&urn, group_name.to_string()),
        location: location.to_string(),
        urn,
    };

    let server = declare_server(
        &mut builder,
        ServerArgs {
            resource_group: &resource_group,
            location,
            config: shared,
            admin_username,
            admin_password: Output::secret(admin_password.clone()),
            tags: &shared.tags,
        },
    )?;

    builder.export(SharedStackOutputs::RESOURCE_GROUP_NAME, resource_group.name.clone())?;
    builder.export(SharedStackOutputs::SERVER_NAME, server.name.clone())?;
    builder.export(SharedStackOutputs::SERVER_FQDN, server.fqdn.clone())?;
    builder.export(
        SharedStackOutputs::ADMIN_USERNAME,
        Output::known(admin_username.to_string()),
    )?;
    builder.export(
        SharedStackOutputs::ADMIN_PASSWORD,
        Output::secret(admin_password).map(Secret::into_inner),
    )?;

    let graph = builder.finish()?;
    info!(
        "Composed shared stack with {} resources and {} exports",
        graph.len(),
        graph.exports().len()
    );

    Ok(Composition {
        key: settings.shared_stack_key(),
        config_hash: ConfigHasher::new().hash_shared(shared, settings),
        graph,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigResolver;
    use crate::error::{ConfigError, InfraError};
    use crate::output::NoAttributes;
    use serde_json::{Map, Value};
    use std::collections::BTreeMap;

    fn settings() -> StackSettings {
        StackSettings {
            location: Some(String::from("westeurope")),
            db_admin_username: Some(String::from("infusethink_admin")),
            db_admin_password: Some(Secret::new(String::from("p@ss"))),
            ..StackSettings::default()
        }
    }

    #[test]
    fn test_shared_resources() {
        let composition = compose_shared(&ConfigResolver::new().shared(), &settings()).unwrap();
        let graph = &composition.graph;

        assert_eq!(composition.key.stack, "shared");
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.resources()[0].urn.name(), "rg-infusethink-shared");
        assert_eq!(graph.of_kind(ResourceKind::PostgresServer).count(), 1);
        assert_eq!(graph.of_kind(ResourceKind::FirewallRule).count(), 2);
    }

    #[test]
    fn test_shared_exports() {
        let composition = compose_shared(&ConfigResolver::new().shared(), &settings()).unwrap();
        let graph = &composition.graph;

        let names: Vec<&str> = graph.exports().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "resource_group_name",
                "postgres_server_name",
                "postgres_server_fqdn",
                "postgres_admin_username",
                "postgres_admin_password",
            ]
        );

        let password = graph.export("postgres_admin_password").unwrap();
        assert!(password.value.is_secret());
        // The stored value is the plaintext; masking happens on display.
        assert_eq!(
            password.value.resolve(&NoAttributes).unwrap().known(),
            Some(Value::from("p@ss"))
        );

        let server = graph.of_kind(ResourceKind::PostgresServer).next().unwrap();
        let fqdn = graph.export("postgres_server_fqdn").unwrap();
        assert!(!fqdn.value.resolve(&NoAttributes).unwrap().is_known());
        let mut attributes = Map::new();
        attributes.insert(String::from("fullyQualifiedDomainName"), Value::from("db.example"));
        let source = BTreeMap::from([(server.urn.clone(), attributes)]);
        assert_eq!(
            fqdn.value.resolve(&source).unwrap().known(),
            Some(Value::from("db.example"))
        );
    }

    #[test]
    fn test_password_required() {
        let settings = StackSettings {
            db_admin_password: None,
            ..settings()
        };
        let err = compose_shared(&ConfigResolver::new().shared(), &settings).unwrap_err();
        assert!(matches!(err, InfraError::Config(ConfigError::MissingEnvVar { .. })));
    }
}
