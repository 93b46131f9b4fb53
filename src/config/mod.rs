//! Configuration module for the Infusethink infrastructure.
//!
//! This module handles all configuration-related functionality:
//! - Static per-environment configuration records
//! - Stack settings from `Infusethink.<stack>.yaml` and the environment
//! - Validation of records and settings
//! - Configuration fingerprints for change detection

mod environment;
mod hash;
mod resolver;
mod settings;
mod spec;
mod tags;
mod validator;

pub use environment::Environment;
pub use hash::ConfigHasher;
pub use resolver::ConfigResolver;
pub use settings::{
    ACCESS_TOKEN_VAR, DB_ADMIN_PASSWORD_VAR, SUBSCRIPTION_VAR, SettingsParser, StackKey,
    StackSettings,
};
pub use spec::{
    ConfigurationRecord, DatabaseConfig, DnsConfig, EmailConfig, HostingConfig, MailExchange,
    PricingCategory, SharedConfig, SharedInfraConfig, SkuTier,
};
pub use tags::TagSet;
pub use validator::{ConfigValidator, TXT_SEGMENT_LIMIT, ValidationError, ValidationResult};
