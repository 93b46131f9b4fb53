//! Environment stack composition.
//!
//! Turns a resolved [`ConfigurationRecord`] into the resource graph of one
//! environment: resource group, hosting, the environment database inside
//! the shared server, and in production the DNS zone with its mail and
//! custom-domain records.

use tracing::{debug, info};

use crate::config::{
    ConfigHasher, ConfigurationRecord, DnsConfig, EmailConfig, Environment, StackKey,
    StackSettings, TagSet,
};
use crate::error::{GraphError, Result, StackError};
use crate::graph::{StackBuilder, StackGraph};
use crate::modules::{
    AppHandle, CustomDomainArgs, DatabaseArgs, HostingArgs, HostingRole, RecordArgs,
    ResourceGroupArgs, ResourceGroupHandle, UpstreamSetting, ZoneArgs, ZoneHandle,
    bind_custom_domain, cname_record, declare_database, declare_hosting, declare_resource_group,
    declare_zone, mx_record, slug, txt_record,
};
use crate::output::{Output, Secret};
use crate::state::StackStore;

use super::reference::SharedStackOutputs;

/// App setting carrying the database connection string.
pub const DATABASE_URL_SETTING: &str = "DATABASE_URL";

/// Record name of the DKIM selector.
pub const DKIM_SELECTOR: &str = "default._domainkey";

/// Record name of the DMARC policy.
pub const DMARC_NAME: &str = "_dmarc";

/// A stack's resource graph with its identity and fingerprint.
#[derive(Debug)]
pub struct Composition {
    /// Stack identity.
    pub key: StackKey,
    /// Fingerprint of the configuration the graph was built from.
    pub config_hash: String,
    /// Ordered resource graph with exports.
    pub graph: StackGraph,
}

/// Composes an environment stack, reading the shared stack when the
/// environment has a database.
///
/// # Errors
///
/// Returns an error if the shared stack is needed but not deployed or
/// incomplete, or if the graph cannot be built.
pub async fn compose_environment(
    record: &ConfigurationRecord,
    settings: &StackSettings,
    store: &dyn StackStore,
) -> Result<Composition> {
    let shared = if record.database.is_some() {
        let key = settings.shared_stack_key();
        info!("Referencing shared stack {key}");
        Some(SharedStackOutputs::load(store, &key).await?)
    } else {
        None
    };
    build_environment(record, settings, shared)
}

/// Builds an environment stack from already resolved shared outputs.
///
/// # Errors
///
/// Returns an error if the record needs a database but `shared` is absent,
/// if the location setting is missing, or if the graph cannot be built.
pub fn build_environment(
    record: &ConfigurationRecord,
    settings: &StackSettings,
    shared: Option<SharedStackOutputs>,
) -> Result<Composition> {
    let location = settings.require_location()?;
    let environment = record.environment;
    let tags = &record.shared.tags;
    let mut builder = StackBuilder::new(environment.as_str());

    let resource_group = declare_resource_group(
        &mut builder,
        ResourceGroupArgs {
            logical_name: "infusethink",
            location,
            environment: environment.as_str(),
            tags,
        },
    )?;
    debug!("Declared resource group {}", resource_group.urn);

    let database = match (&record.database, shared) {
        (Some(config), Some(shared)) => {
            let (database, connection_string) = declare_database(
                &mut builder,
                DatabaseArgs {
                    resource_group_name: shared.resource_group_name.clone(),
                    server_name: shared.postgres_server_name.clone(),
                    server_fqdn: shared.postgres_server_fqdn.clone(),
                    config,
                    admin_password: shared.postgres_admin_password.clone(),
                },
            )?;
            Some((shared, database.name, connection_string))
        }
        (Some(_), None) => {
            return Err(StackError::NotDeployed {
                stack: settings.shared_stack_key().to_string(),
            }
            .into());
        }
        (None, _) => None,
    };

    let (frontend_plan, frontend) = declare_hosting(
        &mut builder,
        HostingArgs {
            role: HostingRole::Frontend,
            resource_group: &resource_group,
            location,
            environment,
            config: &record.frontend,
            shared_plan: None,
            upstream: None,
            tags,
        },
    )?;

    let (backend_plan, backend) = declare_hosting(
        &mut builder,
        HostingArgs {
            role: HostingRole::Backend,
            resource_group: &resource_group,
            location,
            environment,
            config: &record.backend,
            shared_plan: record.shared.share_app_service_plan.then_some(&frontend_plan),
            upstream: database.as_ref().map(|(_, _, connection_string)| UpstreamSetting {
                name: DATABASE_URL_SETTING.to_string(),
                value: connection_string.clone(),
            }),
            tags,
        },
    )?;

    let zone = match &record.dns {
        Some(dns) if environment == Environment::Prod => Some(declare_dns(
            &mut builder,
            &resource_group,
            dns,
            &[&frontend, &backend],
            location,
            tags,
        )?),
        Some(_) => {
            debug!("Skipping DNS outside production");
            None
        }
        None => None,
    };

    builder.export("environment", Output::known(environment.as_str().to_string()))?;
    builder.export("resource_group_name", resource_group.name.clone())?;
    builder.export("frontend_app_service_plan_name", frontend_plan.name.clone())?;
    builder.export("frontend_url", frontend.url())?;
    builder.export("backend_app_service_plan_name", backend_plan.name.clone())?;
    builder.export("backend_url", backend.url())?;
    if let Some((shared, database_name, connection_string)) = database {
        builder.export("database_server_name", shared.postgres_server_name)?;
        builder.export("database_host", shared.postgres_server_fqdn)?;
        builder.export("database_name", database_name)?;
        builder.export(
            "database_connection_string",
            connection_string.map(Secret::into_inner),
        )?;
    }
    if let Some(zone) = &zone {
        builder.export("dns_zone_name", zone.name.clone())?;
    }

    let graph = builder.finish()?;
    info!(
        "Composed stack {} with {} resources and {} exports",
        environment,
        graph.len(),
        graph.exports().len()
    );

    Ok(Composition {
        key: settings.stack_key(environment.as_str()),
        config_hash: ConfigHasher::new().hash_record(record, settings),
        graph,
    })
}

/// Declares the zone, its mail records and every custom domain that lives
/// inside it.
fn declare_dns(
    builder: &mut StackBuilder,
    resource_group: &ResourceGroupHandle,
    dns: &DnsConfig,
    apps: &[&AppHandle],
    location: &str,
    tags: &TagSet,
) -> Result<ZoneHandle> {
    let zone_name = slug(&dns.domain_name);
    let zone = declare_zone(
        builder,
        ZoneArgs {
            logical_name: &zone_name,
            resource_group,
            domain_name: &dns.domain_name,
            tags,
        },
    )?;

    declare_email_records(builder, resource_group, &zone, &zone_name, &dns.email)?;

    for app in apps {
        if let Some(hostname) = &app.custom_domain {
            declare_custom_domain(builder, resource_group, &zone, app, hostname, location, tags)?;
        }
    }

    Ok(zone)
}

fn declare_email_records(
    builder: &mut StackBuilder,
    resource_group: &ResourceGroupHandle,
    zone: &ZoneHandle,
    zone_name: &str,
    email: &EmailConfig,
) -> Result<()> {
    let mx = format!("{zone_name}-mx");
    mx_record(
        builder,
        RecordArgs::new(&mx, resource_group, zone, "@"),
        &email.mx_records,
    )?;

    let spf = format!("{zone_name}-spf");
    txt_record(
        builder,
        RecordArgs::new(&spf, resource_group, zone, "@"),
        email.spf.as_str(),
    )?;

    let dkim = format!("{zone_name}-dkim");
    txt_record(
        builder,
        RecordArgs::new(&dkim, resource_group, zone, DKIM_SELECTOR),
        email.dkim.clone(),
    )?;

    let dmarc = format!("{zone_name}-dmarc");
    txt_record(
        builder,
        RecordArgs::new(&dmarc, resource_group, zone, DMARC_NAME),
        email.dmarc.as_str(),
    )?;

    Ok(())
}

/// Declares the CNAME and `asuid` records for a hostname, then binds it.
fn declare_custom_domain(
    builder: &mut StackBuilder,
    resource_group: &ResourceGroupHandle,
    zone: &ZoneHandle,
    app: &AppHandle,
    hostname: &str,
    location: &str,
    tags: &TagSet,
) -> Result<()> {
    let relative = hostname
        .strip_suffix(&zone.domain_name)
        .and_then(|prefix| prefix.strip_suffix('.'))
        .filter(|prefix| !prefix.is_empty())
        .ok_or_else(|| GraphError::InvalidInput {
            resource: hostname.to_string(),
            message: format!("{hostname} is not a subdomain of {}", zone.domain_name),
        })?;
    let host = slug(hostname);

    let cname_name = format!("{host}-cname");
    let cname = cname_record(
        builder,
        RecordArgs::new(&cname_name, resource_group, zone, relative),
        app.default_host_name.clone(),
    )?;

    let asuid_name = format!("{host}-asuid");
    let asuid_relative = format!("asuid.{relative}");
    let verification = txt_record(
        builder,
        RecordArgs::new(&asuid_name, resource_group, zone, &asuid_relative),
        app.custom_domain_verification_id.clone(),
    )?;

    bind_custom_domain(
        builder,
        CustomDomainArgs {
            app,
            resource_group,
            location,
            hostname,
            validated_by: &[cname.urn, verification.urn],
            tags,
        },
    )?;
    Ok(())
}
