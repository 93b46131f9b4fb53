//! PostgreSQL flexible server and per-environment databases.
//!
//! The server is declared once, by the shared stack. Environment stacks
//! declare a database inside it and derive the connection string from the
//! shared stack's outputs.

use serde_json::json;

use crate::config::{DatabaseConfig, SharedInfraConfig, TagSet};
use crate::error::Result;
use crate::graph::{Properties, ResourceKind, ResourceOptions, StackBuilder, Urn};
use crate::output::{Output, Secret};

use super::APPLICATION;
use super::resource_group::ResourceGroupHandle;

/// PostgreSQL port used in connection strings.
pub const POSTGRES_PORT: u16 = 5432;

/// Firewall rule admitting Azure services.
pub const ALLOW_AZURE_RULE: &str = "AllowAllAzureServicesAndResourcesWithinAzureIps";

/// Firewall rule admitting every address.
pub const ALLOW_ALL_RULE: &str = "AllowAllIPs";

/// Arguments for [`declare_server`].
#[derive(Debug, Clone)]
pub struct ServerArgs<'a> {
    /// Resource group to deploy into.
    pub resource_group: &'a ResourceGroupHandle,
    /// Azure region.
    pub location: &'a str,
    /// Server name, SKU, storage and version.
    pub config: &'a SharedInfraConfig,
    /// Administrator login.
    pub admin_username: &'a str,
    /// Administrator password.
    pub admin_password: Output<Secret<String>>,
    /// Caller tags, merged over the defaults.
    pub tags: &'a TagSet,
}

/// A declared PostgreSQL server.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    /// Resource identifier.
    pub urn: Urn,
    /// Server name.
    pub name: Output<String>,
    /// Fully qualified domain name.
    pub fqdn: Output<String>,
    /// Firewall rules declared with the server.
    pub firewall_rules: Vec<Urn>,
}

/// Declares a flexible server with its two firewall rules.
///
/// One rule admits Azure services; the other is open to every address and
/// relies on credentials and TLS alone.
///
/// # Errors
///
/// Returns an error if the server was already declared.
pub fn declare_server(builder: &mut StackBuilder, args: ServerArgs<'_>) -> Result<ServerHandle> {
    let config = args.config;
    let server_name = format!("psql-{}", config.server_name);
    let tier = if config.sku_name.starts_with("Standard_B") {
        "Burstable"
    } else {
        "GeneralPurpose"
    };

    let defaults = TagSet::new()
        .with("Component", "Database-Server")
        .with("Application", APPLICATION);
    let tags = TagSet::merge(&defaults, args.tags);

    let password = args.admin_password.map(Secret::into_inner);
    let inputs = Properties::new()
        .set_value("name", server_name.as_str())
        .set("resourceGroupName", args.resource_group.name.clone())
        .set_value("location", args.location)
        .set_value("tags", &tags)
        .set_value("sku", json!({ "name": config.sku_name, "tier": tier }))
        .set_value("properties.version", config.postgresql_version.as_str())
        .set_value("properties.administratorLogin", args.admin_username)
        .set("properties.administratorLoginPassword", password)
        .set_value(
            "properties.storage",
            json!({ "storageSizeGB": config.storage_size_gb }),
        )
        .set_value(
            "properties.backup",
            json!({ "backupRetentionDays": 7, "geoRedundantBackup": "Disabled" }),
        )
        .set_value("properties.highAvailability", json!({ "mode": "Disabled" }));

    let urn = builder.register(
        ResourceKind::PostgresServer,
        &server_name,
        inputs,
        ResourceOptions::new(),
    )?;
    let name = Output::known_from(&urn, server_name.clone());

    let firewall_rules = [
        ("allow-azure", ALLOW_AZURE_RULE, "0.0.0.0"),
        ("allow-all", ALLOW_ALL_RULE, "255.255.255.255"),
    ]
    .into_iter()
    .map(|(suffix, rule, end)| {
        let inputs = Properties::new()
            .set_value("name", rule)
            .set("parentName", name.clone())
            .set("resourceGroupName", args.resource_group.name.clone())
            .set_value("properties.startIpAddress", "0.0.0.0")
            .set_value("properties.endIpAddress", end);
        builder.register(
            ResourceKind::FirewallRule,
            &format!("{server_name}-{suffix}"),
            inputs,
            ResourceOptions::new(),
        )
    })
    .collect::<Result<Vec<_>>>()?;

    Ok(ServerHandle {
        name,
        fqdn: Output::attribute(&urn, "fullyQualifiedDomainName"),
        firewall_rules,
        urn,
    })
}

/// Arguments for [`declare_database`].
#[derive(Debug, Clone)]
pub struct DatabaseArgs<'a> {
    /// Resource group of the server.
    pub resource_group_name: Output<String>,
    /// Server name.
    pub server_name: Output<String>,
    /// Server hostname.
    pub server_fqdn: Output<String>,
    /// Database name, login and driver.
    pub config: &'a DatabaseConfig,
    /// Administrator password.
    pub admin_password: Output<Secret<String>>,
}

/// A declared database.
#[derive(Debug, Clone)]
pub struct DatabaseHandle {
    /// Resource identifier.
    pub urn: Urn,
    /// Database name.
    pub name: Output<String>,
}

/// Declares a database on an existing server and derives its connection
/// string.
///
/// The connection string has the form
/// `postgresql+<driver>://<user>:<password>@<host>:5432/<database>?sslmode=require`
/// and is secret.
///
/// # Errors
///
/// Returns an error if the database was already declared.
pub fn declare_database(
    builder: &mut StackBuilder,
    args: DatabaseArgs<'_>,
) -> Result<(DatabaseHandle, Output<Secret<String>>)> {
    let config = args.config;
    let inputs = Properties::new()
        .set_value("name", config.database_name.as_str())
        .set("parentName", args.server_name)
        .set("resourceGroupName", args.resource_group_name)
        .set_value("properties.charset", "UTF8")
        .set_value("properties.collation", "en_US.utf8");

    let urn = builder.register(
        ResourceKind::Database,
        &format!("psqldb-{}", config.database_name),
        inputs,
        ResourceOptions::new(),
    )?;
    let name = Output::known_from(&urn, config.database_name.clone());

    let driver = config.driver.clone();
    let connection_string = args
        .server_fqdn
        .zip(Output::known(config.admin_username.clone()))
        .zip(args.admin_password)
        .zip(name.clone())
        .map(move |(((host, user), password), database)| {
            Secret::new(format!(
                "postgresql+{driver}://{user}:{}@{host}:{POSTGRES_PORT}/{database}?sslmode=require",
                password.expose()
            ))
        })
        .into_secret();

    Ok((DatabaseHandle { urn, name }, connection_string))
}
