//! Configuration record types.
//!
//! A [`ConfigurationRecord`] fully describes one environment: the two hosted
//! apps, the optional per-environment database, the optional DNS zone and
//! the tags shared by every resource. Records are built once by the
//! resolver and only ever handed out by reference.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::environment::Environment;
use super::tags::TagSet;

/// The resolved configuration for one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationRecord {
    /// Environment this record describes.
    pub environment: Environment,
    /// Frontend hosting.
    pub frontend: HostingConfig,
    /// Backend hosting.
    pub backend: HostingConfig,
    /// Per-environment database, absent when the environment has none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseConfig>,
    /// DNS zone and mail records, absent outside production.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<DnsConfig>,
    /// Settings shared by every component.
    pub shared: SharedConfig,
}

/// Hosting configuration for one app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostingConfig {
    /// App Service name, also its default hostname prefix.
    pub app_name: String,
    /// App Service plan SKU.
    pub sku_tier: SkuTier,
    /// Custom domain bound to the app.
    #[serde(default)]
    pub custom_domain: Option<String>,
}

/// App Service plan SKU, such as `F1`, `B1` or `P1v3`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkuTier(String);

/// App Service pricing category derived from a SKU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PricingCategory {
    /// Free shared compute.
    Free,
    /// Basic dedicated compute.
    Basic,
    /// Standard dedicated compute.
    Standard,
    /// Premium dedicated compute.
    Premium,
}

impl SkuTier {
    /// The free SKU.
    pub const FREE: &'static str = "F1";

    /// SKUs with a known pricing category.
    pub const KNOWN: &'static [&'static str] = &[
        "F1", "B1", "B2", "B3", "S1", "S2", "S3", "P1", "P2", "P3", "P1v3", "P2v3", "P3v3",
    ];

    /// Creates a SKU from its name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    /// Returns the SKU name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the free SKU.
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.0 == Self::FREE
    }

    /// Returns true if the SKU is in the known list.
    #[must_use]
    pub fn is_known(&self) -> bool {
        Self::KNOWN.contains(&self.0.as_str())
    }

    /// Maps the SKU to its pricing category.
    ///
    /// Exactly `F1` is Free, a `B` prefix is Basic, an `S` prefix is
    /// Standard, and anything else is Premium.
    #[must_use]
    pub fn pricing_category(&self) -> PricingCategory {
        if self.is_free() {
            PricingCategory::Free
        } else if self.0.starts_with('B') {
            PricingCategory::Basic
        } else if self.0.starts_with('S') {
            PricingCategory::Standard
        } else {
            PricingCategory::Premium
        }
    }

    /// Returns true if apps on this SKU should keep the process warm.
    #[must_use]
    pub fn always_on(&self) -> bool {
        !self.is_free()
    }
}

impl fmt::Display for SkuTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PricingCategory {
    /// Returns the category name as Azure expects it.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "Free",
            Self::Basic => "Basic",
            Self::Standard => "Standard",
            Self::Premium => "Premium",
        }
    }
}

impl fmt::Display for PricingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-environment database on the shared server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database name.
    pub database_name: String,
    /// Administrator login, matching the shared server.
    pub admin_username: String,
    /// SQLAlchemy driver used in the connection string scheme.
    #[serde(default = "default_driver")]
    pub driver: String,
}

/// DNS zone configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Apex domain served by the zone.
    pub domain_name: String,
    /// Mail records.
    pub email: EmailConfig,
}

/// Mail routing and sender authentication records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Mail exchangers in priority order.
    pub mx_records: Vec<MailExchange>,
    /// SPF policy.
    pub spf: String,
    /// DKIM public key, already split into segments.
    pub dkim: Vec<String>,
    /// DMARC policy.
    pub dmarc: String,
}

/// A mail exchanger and its preference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailExchange {
    /// Exchanger hostname.
    pub exchange: String,
    /// Preference, lower is tried first.
    pub preference: u16,
}

impl MailExchange {
    /// Creates a mail exchanger entry.
    #[must_use]
    pub fn new(exchange: &str, preference: u16) -> Self {
        Self {
            exchange: exchange.to_string(),
            preference,
        }
    }
}

/// Settings shared by every component of an environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Tags applied to every resource.
    pub tags: TagSet,
    /// Reuse the frontend plan for the backend.
    #[serde(default)]
    pub share_app_service_plan: bool,
}

/// Configuration of the shared stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedInfraConfig {
    /// Resource group holding the shared server.
    pub resource_group_name: String,
    /// Server name, prefixed with `psql-` when declared.
    pub server_name: String,
    /// Server SKU.
    pub sku_name: String,
    /// Storage size in GB.
    pub storage_size_gb: u32,
    /// PostgreSQL major version.
    pub postgresql_version: String,
    /// Tags applied to the resource group.
    pub tags: TagSet,
}

fn default_driver() -> String {
    String::from("psycopg")
}
