//! Static environment configuration.
//!
//! Each supported environment has exactly one definition, compiled into the
//! binary. Resolution is deterministic and never reads the filesystem.

use tracing::debug;

use crate::error::Result;

use super::environment::Environment;
use super::spec::{
    ConfigurationRecord, DatabaseConfig, DnsConfig, EmailConfig, HostingConfig, MailExchange,
    SharedConfig, SharedInfraConfig, SkuTier,
};
use super::tags::TagSet;

/// First DKIM segment, split to stay under the 255 character TXT limit.
const DKIM_SEGMENT_1: &str = "v=DKIM1;k=rsa;p=MIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEAqHfS1n3GDYIg+/WlerdvooNBs/1XeFtm1nh3cCxFFktUbXoYNkDMTLHITpT8ngk6CZ7s+qHegqPzh6O7i0jKTCMfPrK7FbZBTPXMctzY6FSWe0xGYK+LakLtvXktnZd90SAtKyBnUe62hqB9EXNpvRF2vHQlavCIuLEj2Ci8MeO";

/// Second DKIM segment.
const DKIM_SEGMENT_2: &str = "HLx9jNvZH6CaTEtb/AxxMQPrwwFOZ5at4ta83RxQNKQtlAPBIfrDt1i/E+yC6yskVK1CC2UEYZINQrFuz3CFPX1Et0ES60gL/H4tLtZ8N3bnfthS3qWPCt79a+lsSCmrIwggjZjA2+oVPMmiOATZCeCZVze33T++xDnJNj3pN+wIDAQAB";

/// Resolves environment identifiers to configuration records.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigResolver;

impl ConfigResolver {
    /// Creates a resolver.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Resolves an environment identifier.
    ///
    /// # Errors
    ///
    /// Returns `UnknownEnvironment` for any identifier outside the
    /// supported set.
    pub fn resolve(&self, environment_id: &str) -> Result<ConfigurationRecord> {
        let environment: Environment = environment_id.parse()?;
        debug!("Resolving configuration for {}", environment);
        Ok(self.for_environment(environment))
    }

    /// Returns the record for a parsed environment.
    #[must_use]
    pub fn for_environment(&self, environment: Environment) -> ConfigurationRecord {
        match environment {
            Environment::Dev => dev(),
            Environment::Prod => prod(),
        }
    }

    /// Returns the configuration of the shared stack.
    #[must_use]
    pub fn shared(&self) -> SharedInfraConfig {
        SharedInfraConfig {
            resource_group_name: String::from("rg-infusethink-shared"),
            server_name: String::from("infusethink"),
            sku_name: String::from("Standard_B1ms"),
            storage_size_gb: 32,
            postgresql_version: String::from("17"),
            tags: TagSet::new()
                .with("Environment", "Shared")
                .with("Application", "Infusethink")
                .with("ManagedBy", "infusethink")
                .with("Purpose", "Shared PostgreSQL server for all environments"),
        }
    }
}

fn dev() -> ConfigurationRecord {
    ConfigurationRecord {
        environment: Environment::Dev,
        frontend: HostingConfig {
            app_name: String::from("infusethink-trials"),
            sku_tier: SkuTier::new("F1"),
            custom_domain: None,
        },
        backend: HostingConfig {
            app_name: String::from("infusethink-labs"),
            sku_tier: SkuTier::new("F1"),
            custom_domain: None,
        },
        database: None,
        dns: None,
        shared: SharedConfig {
            tags: TagSet::new()
                .with("Purpose", "Development testing and experimentation")
                .with("CostCenter", "Engineering")
                .with("Owner", "Development Team"),
            share_app_service_plan: false,
        },
    }
}

fn prod() -> ConfigurationRecord {
    ConfigurationRecord {
        environment: Environment::Prod,
        frontend: HostingConfig {
            app_name: String::from("infusethink-app"),
            sku_tier: SkuTier::new("F1"),
            custom_domain: Some(String::from("www.infuseth.ink")),
        },
        backend: HostingConfig {
            app_name: String::from("infusethink-api"),
            sku_tier: SkuTier::new("F1"),
            custom_domain: Some(String::from("api.infuseth.ink")),
        },
        database: Some(DatabaseConfig {
            database_name: String::from("infusethink_prod"),
            admin_username: String::from("infusethink_admin"),
            driver: String::from("psycopg"),
        }),
        dns: Some(DnsConfig {
            domain_name: String::from("infuseth.ink"),
            email: EmailConfig {
                mx_records: vec![
                    MailExchange::new("mx1.privateemail.com.", 10),
                    MailExchange::new("mx2.privateemail.com.", 10),
                ],
                spf: String::from("v=spf1 include:spf.privateemail.com ~all"),
                dkim: vec![DKIM_SEGMENT_1.to_string(), DKIM_SEGMENT_2.to_string()],
                dmarc: String::from("v=DMARC1; p=none; rua=mailto:dmarc@infuseth.ink"),
            },
        }),
        shared: SharedConfig {
            tags: TagSet::new()
                .with("Purpose", "Production")
                .with("CostCenter", "Operations")
                .with("Owner", "Platform Team"),
            share_app_service_plan: false,
        },
    }
}
