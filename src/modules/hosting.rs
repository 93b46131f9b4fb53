//! App Service hosting for the frontend and the backend.
//!
//! Both apps are Linux web apps on an App Service plan. They differ only in
//! runtime stack, start-up command and base app settings, which
//! [`HostingRole`] captures. A plan can be shared: passing an existing
//! [`PlanHandle`] declares the app alone.
//!
//! Custom domains are bound separately with [`bind_custom_domain`], once the
//! DNS records proving ownership have been declared.

use serde_json::{Value, json};

use crate::config::{Environment, HostingConfig, TagSet};
use crate::error::Result;
use crate::graph::{Properties, ResourceKind, ResourceOptions, StackBuilder, Urn};
use crate::output::{Output, Secret};

use super::resource_group::ResourceGroupHandle;
use super::{APPLICATION, slug};

/// Which app a hosting declaration is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostingRole {
    /// Static web frontend served by Node.
    Frontend,
    /// Python API backend.
    Backend,
}

impl HostingRole {
    /// Returns the component tag value.
    #[must_use]
    pub const fn component(self) -> &'static str {
        match self {
            Self::Frontend => "Frontend",
            Self::Backend => "Backend",
        }
    }

    /// Returns the Linux runtime stack.
    #[must_use]
    pub const fn runtime_stack(self) -> &'static str {
        match self {
            Self::Frontend => "NODE|22-lts",
            Self::Backend => "PYTHON|3.13",
        }
    }

    /// Returns the start-up command.
    #[must_use]
    pub const fn startup_command(self) -> &'static str {
        match self {
            Self::Frontend => "npx serve ./web -s -p $PORT",
            Self::Backend => {
                "gunicorn -w 2 -k uvicorn.workers.UvicornWorker -b 0.0.0.0:$PORT src.main:app"
            }
        }
    }

    /// Returns the app settings every instance of this role carries.
    #[must_use]
    pub const fn base_settings(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Frontend => &[
                ("WEBSITE_NODE_DEFAULT_VERSION", "22-lts"),
                ("SCM_DO_BUILD_DURING_DEPLOYMENT", "false"),
                ("WEBSITE_RUN_FROM_PACKAGE", "1"),
            ],
            Self::Backend => &[
                ("SCM_DO_BUILD_DURING_DEPLOYMENT", "true"),
                ("POST_BUILD_COMMAND", "alembic upgrade head"),
            ],
        }
    }

    /// Returns the default documents, if the role serves static files.
    #[must_use]
    pub const fn default_documents(self) -> &'static [&'static str] {
        match self {
            Self::Frontend => &["index.html"],
            Self::Backend => &[],
        }
    }
}

/// An app setting whose value comes from another resource.
#[derive(Debug, Clone)]
pub struct UpstreamSetting {
    /// Setting name.
    pub name: String,
    /// Setting value, kept secret.
    pub value: Output<Secret<String>>,
}

/// Arguments for [`declare_hosting`].
#[derive(Debug, Clone)]
pub struct HostingArgs<'a> {
    /// Which app this is.
    pub role: HostingRole,
    /// Resource group to deploy into.
    pub resource_group: &'a ResourceGroupHandle,
    /// Azure region.
    pub location: &'a str,
    /// Environment the app belongs to.
    pub environment: Environment,
    /// App name and SKU.
    pub config: &'a HostingConfig,
    /// Existing plan to reuse instead of declaring one.
    pub shared_plan: Option<&'a PlanHandle>,
    /// Optional setting wired from another resource.
    pub upstream: Option<UpstreamSetting>,
    /// Caller tags, merged over the defaults.
    pub tags: &'a TagSet,
}

/// A declared App Service plan.
#[derive(Debug, Clone)]
pub struct PlanHandle {
    /// Resource identifier.
    pub urn: Urn,
    /// Plan name.
    pub name: Output<String>,
    /// ARM resource id.
    pub id: Output<String>,
}

/// A declared web app.
#[derive(Debug, Clone)]
pub struct AppHandle {
    /// Resource identifier.
    pub urn: Urn,
    /// App name.
    pub name: Output<String>,
    /// Generated `*.azurewebsites.net` hostname.
    pub default_host_name: Output<String>,
    /// Token proving domain ownership in `asuid` TXT records.
    pub custom_domain_verification_id: Output<String>,
    /// Plan the app runs on.
    pub plan: PlanHandle,
    /// Custom domain from the configuration.
    pub custom_domain: Option<String>,
}

impl AppHandle {
    /// Returns the public HTTPS URL on the generated hostname.
    #[must_use]
    pub fn url(&self) -> Output<String> {
        self.default_host_name.clone().map(|host| format!("https://{host}"))
    }
}

/// Declares an App Service plan, unless one is shared, and a web app.
///
/// # Errors
///
/// Returns an error if a resource with the same name was already declared.
pub fn declare_hosting(
    builder: &mut StackBuilder,
    args: HostingArgs<'_>,
) -> Result<(PlanHandle, AppHandle)> {
    let plan = match args.shared_plan {
        Some(plan) => plan.clone(),
        None => declare_plan(builder, &args)?,
    };

    let role = args.role;
    let app_name = args.config.app_name.as_str();
    let defaults = component_tags(args.environment, role.component());
    let tags = TagSet::merge(&defaults, args.tags);

    let mut app_settings: Vec<Output<Value>> = role
        .base_settings()
        .iter()
        .map(|(name, value)| Output::known(json!({ "name": name, "value": value })))
        .collect();
    if let Some(upstream) = args.upstream {
        let name = upstream.name;
        app_settings.push(upstream.value.map(move |secret| {
            json!({ "name": name.clone(), "value": secret.into_inner() })
        }));
    }

    let mut inputs = Properties::new()
        .set_value("name", app_name)
        .set("resourceGroupName", args.resource_group.name.clone())
        .set_value("location", args.location)
        .set_value("kind", "app,linux")
        .set_value("tags", &tags)
        .set("properties.serverFarmId", plan.id.clone())
        .set_value("properties.httpsOnly", true)
        .set_value("properties.siteConfig.linuxFxVersion", role.runtime_stack())
        .set_value("properties.siteConfig.appCommandLine", role.startup_command())
        .set_value("properties.siteConfig.http20Enabled", true)
        .set_value("properties.siteConfig.alwaysOn", args.config.sku_tier.always_on())
        .set("properties.siteConfig.appSettings", Output::all(app_settings));
    if !role.default_documents().is_empty() {
        inputs = inputs.set_value(
            "properties.siteConfig.defaultDocuments",
            role.default_documents().to_vec(),
        );
    }

    let urn = builder.register(ResourceKind::WebApp, app_name, inputs, ResourceOptions::new())?;

    let app = AppHandle {
        name: Output::known_from(&urn, app_name.to_string()),
        default_host_name: Output::attribute(&urn, "defaultHostName"),
        custom_domain_verification_id: Output::attribute(&urn, "customDomainVerificationId"),
        plan: plan.clone(),
        custom_domain: args.config.custom_domain.clone(),
        urn,
    };

    Ok((plan, app))
}

fn declare_plan(builder: &mut StackBuilder, args: &HostingArgs<'_>) -> Result<PlanHandle> {
    let plan_name = format!("asp-{}", args.config.app_name);
    let sku = &args.config.sku_tier;
    let defaults = component_tags(args.environment, &format!("{}-Plan", args.role.component()));
    let tags = TagSet::merge(&defaults, args.tags);

    let inputs = Properties::new()
        .set_value("name", plan_name.as_str())
        .set("resourceGroupName", args.resource_group.name.clone())
        .set_value("location", args.location)
        .set_value("kind", "linux")
        .set_value("tags", &tags)
        .set_value(
            "sku",
            json!({ "name": sku.as_str(), "tier": sku.pricing_category().as_str() }),
        )
        .set_value("properties.reserved", true);

    let urn = builder.register(
        ResourceKind::AppServicePlan,
        &plan_name,
        inputs,
        ResourceOptions::new(),
    )?;

    Ok(PlanHandle {
        name: Output::known_from(&urn, plan_name),
        id: Output::attribute(&urn, "id"),
        urn,
    })
}

fn component_tags(environment: Environment, component: &str) -> TagSet {
    TagSet::new()
        .with("Environment", environment.as_str())
        .with("Component", component)
        .with("Application", APPLICATION)
}

/// Arguments for [`bind_custom_domain`].
#[derive(Debug, Clone)]
pub struct CustomDomainArgs<'a> {
    /// App receiving the domain.
    pub app: &'a AppHandle,
    /// Resource group of the app.
    pub resource_group: &'a ResourceGroupHandle,
    /// Azure region.
    pub location: &'a str,
    /// Fully qualified custom hostname.
    pub hostname: &'a str,
    /// DNS records that must exist before the domain is bound.
    pub validated_by: &'a [Urn],
    /// Caller tags for the certificate.
    pub tags: &'a TagSet,
}

/// A declared hostname binding.
#[derive(Debug, Clone)]
pub struct BindingHandle {
    /// Resource identifier.
    pub urn: Urn,
    /// Bound hostname.
    pub hostname: String,
}

/// A declared managed certificate.
#[derive(Debug, Clone)]
pub struct CertificateHandle {
    /// Resource identifier.
    pub urn: Urn,
    /// Certificate thumbprint.
    pub thumbprint: Output<String>,
}

/// Resources declared for one custom domain.
#[derive(Debug, Clone)]
pub struct CustomDomainHandles {
    /// Hostname binding without TLS.
    pub binding: BindingHandle,
    /// Managed certificate for the hostname.
    pub certificate: CertificateHandle,
    /// Hostname binding with SNI TLS.
    pub ssl_binding: BindingHandle,
}

/// Binds a custom domain to an app with a managed certificate.
///
/// Declares the hostname binding, then the certificate, then the SNI
/// binding. The first two wait for every record in `validated_by`, since
/// App Service checks the CNAME and `asuid` TXT records when binding.
///
/// # Errors
///
/// Returns an error if the domain was already bound.
pub fn bind_custom_domain(
    builder: &mut StackBuilder,
    args: CustomDomainArgs<'_>,
) -> Result<CustomDomainHandles> {
    let hostname = args.hostname;
    let slug = slug(hostname);
    let validation = args
        .validated_by
        .iter()
        .fold(ResourceOptions::new(), |options, urn| options.depends_on(urn));

    let binding_inputs = Properties::new()
        .set_value("name", hostname)
        .set("parentName", args.app.name.clone())
        .set("resourceGroupName", args.resource_group.name.clone())
        .set("properties.siteName", args.app.name.clone())
        .set_value("properties.hostNameType", "Verified")
        .set_value("properties.customHostNameDnsRecordType", "CName");
    let binding_urn = builder.register(
        ResourceKind::HostNameBinding,
        &format!("{slug}-binding"),
        binding_inputs,
        validation.clone(),
    )?;

    let defaults = TagSet::new()
        .with("Component", "Certificate")
        .with("Domain", hostname)
        .with("Application", APPLICATION);
    let certificate_inputs = Properties::new()
        .set_value("name", format!("cert-{slug}"))
        .set("resourceGroupName", args.resource_group.name.clone())
        .set_value("location", args.location)
        .set_value("tags", &TagSet::merge(&defaults, args.tags))
        .set_value("properties.canonicalName", hostname)
        .set("properties.serverFarmId", args.app.plan.id.clone());
    let certificate_urn = builder.register(
        ResourceKind::Certificate,
        &format!("{slug}-cert"),
        certificate_inputs,
        validation.depends_on(&binding_urn),
    )?;
    let certificate = CertificateHandle {
        thumbprint: Output::attribute(&certificate_urn, "thumbprint"),
        urn: certificate_urn,
    };

    let ssl_inputs = Properties::new()
        .set_value("name", hostname)
        .set("parentName", args.app.name.clone())
        .set("resourceGroupName", args.resource_group.name.clone())
        .set("properties.siteName", args.app.name.clone())
        .set_value("properties.hostNameType", "Verified")
        .set_value("properties.customHostNameDnsRecordType", "CName")
        .set_value("properties.sslState", "SniEnabled")
        .set("properties.thumbprint", certificate.thumbprint.clone());
    let ssl_urn = builder.register(
        ResourceKind::HostNameBinding,
        &format!("{slug}-ssl"),
        ssl_inputs,
        ResourceOptions::new(),
    )?;

    Ok(CustomDomainHandles {
        binding: BindingHandle {
            urn: binding_urn,
            hostname: hostname.to_string(),
        },
        certificate,
        ssl_binding: BindingHandle {
            urn: ssl_urn,
            hostname: hostname.to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SkuTier;
    use crate::modules::resource_group::{ResourceGroupArgs, declare_resource_group};
    use crate::output::{NoAttributes, Resolved};

    fn setup(stack: &str) -> (StackBuilder, ResourceGroupHandle) {
        let mut builder = StackBuilder::new(stack);
        let rg = declare_resource_group(
            &mut builder,
            ResourceGroupArgs {
                logical_name: "infusethink",
                location: "westeurope",
                environment: stack,
                tags: &TagSet::new(),
            },
        )
        .unwrap();
        (builder, rg)
    }

    fn hosting(app_name: &str, sku: &str, domain: Option<&str>) -> HostingConfig {
        HostingConfig {
            app_name: app_name.to_string(),
            sku_tier: SkuTier::new(sku),
            custom_domain: domain.map(str::to_string),
        }
    }

    fn args<'a>(
        role: HostingRole,
        rg: &'a ResourceGroupHandle,
        config: &'a HostingConfig,
        tags: &'a TagSet,
    ) -> HostingArgs<'a> {
        HostingArgs {
            role,
            resource_group: rg,
            location: "westeurope",
            environment: Environment::Dev,
            config,
            shared_plan: None,
            upstream: None,
            tags,
        }
    }

    #[test]
    fn test_declares_one_plan_without_shared_plan() {
        let (mut builder, rg) = setup("dev");
        let tags = TagSet::new();
        let config = hosting("infusethink-trials", "F1", None);

        let (plan, app) =
            declare_hosting(&mut builder, args(HostingRole::Frontend, &rg, &config, &tags)).unwrap();

        assert_eq!(plan.urn.name(), "asp-infusethink-trials");
        assert!(app.plan.urn == plan.urn);
        let graph = builder.finish().unwrap();
        assert_eq!(graph.of_kind(ResourceKind::AppServicePlan).count(), 1);
        assert!(graph.position(&plan.urn).unwrap() < graph.position(&app.urn).unwrap());
    }

    #[test]
    fn test_shared_plan_declares_no_plan() {
        let (mut builder, rg) = setup("dev");
        let tags = TagSet::new();
        let frontend = hosting("infusethink-trials", "B1", None);
        let backend = hosting("infusethink-labs", "B1", None);

        let (plan, _) =
            declare_hosting(&mut builder, args(HostingRole::Frontend, &rg, &frontend, &tags)).unwrap();

        let mut backend_args = args(HostingRole::Backend, &rg, &backend, &tags);
        backend_args.shared_plan = Some(&plan);
        let (reused, app) = declare_hosting(&mut builder, backend_args).unwrap();

        assert!(builder.contains(&app.urn));
        assert!(!builder.contains(&builder.urn(ResourceKind::AppServicePlan, "asp-infusethink-labs")));
        assert_eq!(reused.urn, plan.urn);
        let graph = builder.finish().unwrap();
        assert_eq!(graph.of_kind(ResourceKind::AppServicePlan).count(), 1);
    }

    #[test]
    fn test_sku_drives_tier_and_always_on() {
        for (sku, tier, always_on) in [
            ("F1", "Free", false),
            ("B1", "Basic", true),
            ("S1", "Standard", true),
            ("P1v3", "Premium", true),
        ] {
            let (mut builder, rg) = setup("dev");
            let tags = TagSet::new();
            let config = hosting("infusethink-labs", sku, None);
            let (plan, app) =
                declare_hosting(&mut builder, args(HostingRole::Backend, &rg, &config, &tags)).unwrap();
            let graph = builder.finish().unwrap();

            let plan_inputs = graph.get(&plan.urn).unwrap().inputs.resolve(&NoAttributes).unwrap();
            assert_eq!(plan_inputs.get("sku").unwrap()["tier"], tier);

            let app_inputs = graph.get(&app.urn).unwrap().inputs.resolve(&NoAttributes).unwrap();
            assert_eq!(
                app_inputs.get("properties.siteConfig.alwaysOn"),
                Some(&Value::Bool(always_on))
            );
        }
    }

    #[test]
    fn test_always_on_follows_app_tier_on_shared_plan() {
        let (mut builder, rg) = setup("dev");
        let tags = TagSet::new();
        let frontend = hosting("infusethink-trials", "F1", None);
        let backend = hosting("infusethink-labs", "B1", None);

        let (plan, frontend_app) =
            declare_hosting(&mut builder, args(HostingRole::Frontend, &rg, &frontend, &tags)).unwrap();
        let mut backend_args = args(HostingRole::Backend, &rg, &backend, &tags);
        backend_args.shared_plan = Some(&plan);
        let (_, backend_app) = declare_hosting(&mut builder, backend_args).unwrap();
        let graph = builder.finish().unwrap();

        let always_on = |urn: &Urn| {
            let inputs = graph.get(urn).unwrap().inputs.resolve(&NoAttributes).unwrap();
            inputs.get("properties.siteConfig.alwaysOn").cloned()
        };
        assert_eq!(always_on(&frontend_app.urn), Some(Value::Bool(false)));
        assert_eq!(always_on(&backend_app.urn), Some(Value::Bool(true)));
    }

    #[test]
    fn test_upstream_setting_is_secret() {
        let (mut builder, rg) = setup("prod");
        let tags = TagSet::new();
        let config = hosting("infusethink-api", "F1", None);
        let mut backend_args = args(HostingRole::Backend, &rg, &config, &tags);
        backend_args.upstream = Some(UpstreamSetting {
            name: String::from("DATABASE_URL"),
            value: Output::secret(Secret::new(String::from("postgresql+psycopg://u:p@h:5432/d"))),
        });

        let (_, app) = declare_hosting(&mut builder, backend_args).unwrap();
        let graph = builder.finish().unwrap();
        let inputs = graph.get(&app.urn).unwrap().inputs.resolve(&NoAttributes).unwrap();

        assert!(inputs.is_secret("properties.siteConfig.appSettings"));
        assert!(!inputs.is_secret("properties.siteConfig.linuxFxVersion"));
        let settings = inputs.get("properties.siteConfig.appSettings").unwrap();
        let names: Vec<&str> = settings
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|s| s["name"].as_str())
            .collect();
        assert_eq!(
            names,
            vec!["SCM_DO_BUILD_DURING_DEPLOYMENT", "POST_BUILD_COMMAND", "DATABASE_URL"]
        );
    }

    #[test]
    fn test_no_upstream_setting_when_absent() {
        let (mut builder, rg) = setup("dev");
        let tags = TagSet::new();
        let config = hosting("infusethink-labs", "F1", None);
        let (_, app) =
            declare_hosting(&mut builder, args(HostingRole::Backend, &rg, &config, &tags)).unwrap();
        let graph = builder.finish().unwrap();
        let inputs = graph.get(&app.urn).unwrap().inputs.resolve(&NoAttributes).unwrap();

        assert!(!inputs.is_secret("properties.siteConfig.appSettings"));
        let settings = inputs.get("properties.siteConfig.appSettings").unwrap();
        assert_eq!(settings.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_url_is_deferred() {
        let (mut builder, rg) = setup("dev");
        let tags = TagSet::new();
        let config = hosting("infusethink-trials", "F1", None);
        let (_, app) =
            declare_hosting(&mut builder, args(HostingRole::Frontend, &rg, &config, &tags)).unwrap();
        assert_eq!(app.url().resolve(&NoAttributes).unwrap(), Resolved::Unknown);
    }

    #[test]
    fn test_custom_domain_waits_for_records() {
        let (mut builder, rg) = setup("prod");
        let tags = TagSet::new();
        let config = hosting("infusethink-app", "B1", Some("www.infuseth.ink"));
        let (_, app) =
            declare_hosting(&mut builder, args(HostingRole::Frontend, &rg, &config, &tags)).unwrap();
        let cname = builder
            .register(
                ResourceKind::RecordSet,
                "www-cname",
                Properties::new().set_value("name", "www"),
                ResourceOptions::new(),
            )
            .unwrap();
        let txt = builder
            .register(
                ResourceKind::RecordSet,
                "asuid-www-txt",
                Properties::new().set_value("name", "asuid.www"),
                ResourceOptions::new(),
            )
            .unwrap();

        let records = [cname.clone(), txt.clone()];
        let handles = bind_custom_domain(
            &mut builder,
            CustomDomainArgs {
                app: &app,
                resource_group: &rg,
                location: "westeurope",
                hostname: "www.infuseth.ink",
                validated_by: &records,
                tags: &tags,
            },
        )
        .unwrap();

        let graph = builder.finish().unwrap();
        let binding = graph.get(&handles.binding.urn).unwrap();
        assert!(binding.depends_on.contains(&cname));
        assert!(binding.depends_on.contains(&txt));

        let certificate = graph.get(&handles.certificate.urn).unwrap();
        assert!(certificate.depends_on.contains(&cname));
        assert!(certificate.depends_on.contains(&handles.binding.urn));

        let position = |urn: &Urn| graph.position(urn).unwrap();
        assert!(position(&txt) < position(&handles.binding.urn));
        assert!(position(&handles.binding.urn) < position(&handles.certificate.urn));
        assert!(position(&handles.certificate.urn) < position(&handles.ssl_binding.urn));
    }
}
