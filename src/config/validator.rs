//! Configuration validation.
//!
//! This module checks a resolved configuration record and the stack
//! settings before anything is declared, so that naming mistakes and
//! record-length violations surface locally instead of as provider errors
//! halfway through a deployment.

use crate::error::{ConfigError, InfraError, Result};
use tracing::debug;

use super::settings::StackSettings;
use super::spec::{
    ConfigurationRecord, DatabaseConfig, DnsConfig, HostingConfig, SharedInfraConfig,
};
use super::tags::TagSet;

/// Maximum length of one TXT string.
pub const TXT_SEGMENT_LIMIT: usize = 255;

/// Maximum length of an App Service name.
const APP_NAME_LIMIT: usize = 60;

/// Maximum length of a PostgreSQL identifier.
const DATABASE_NAME_LIMIT: usize = 63;

/// Maximum length of a tag name.
const TAG_NAME_LIMIT: usize = 512;

/// Maximum length of a tag value.
const TAG_VALUE_LIMIT: usize = 256;

/// Minimum storage of a flexible server in GB.
const MIN_STORAGE_GB: u32 = 32;

/// Validator for configuration records and stack settings.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates an environment record together with its stack settings.
    ///
    /// # Errors
    ///
    /// Returns the first error if validation fails.
    pub fn validate(
        &self,
        record: &ConfigurationRecord,
        settings: &StackSettings,
    ) -> Result<ValidationResult> {
        let mut result = self.check(record);
        Self::validate_settings(settings, &mut result);
        Self::into_outcome(result)
    }

    /// Validates the shared stack configuration together with its settings.
    ///
    /// # Errors
    ///
    /// Returns the first error if validation fails.
    pub fn validate_shared(
        &self,
        shared: &SharedInfraConfig,
        settings: &StackSettings,
    ) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        if !is_valid_name(&shared.server_name) {
            result.error(
                "shared.server_name",
                format!("Server name '{}' is invalid", shared.server_name),
            );
        }
        if shared.storage_size_gb < MIN_STORAGE_GB {
            result.error(
                "shared.storage_size_gb",
                format!("Storage must be at least {MIN_STORAGE_GB} GB"),
            );
        }
        Self::validate_tags("shared.tags", &shared.tags, &mut result);
        Self::validate_settings(settings, &mut result);

        if settings.require_admin_username().is_err() {
            result.error(
                "db_admin_username",
                String::from("The shared stack needs an administrator login"),
            );
        }

        Self::into_outcome(result)
    }

    /// Checks a record without failing on errors.
    #[must_use]
    pub fn check(&self, record: &ConfigurationRecord) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_hosting("frontend", &record.frontend, &mut result);
        Self::validate_hosting("backend", &record.backend, &mut result);

        if record.frontend.app_name == record.backend.app_name {
            result.error(
                "backend.app_name",
                String::from("Frontend and backend must use different app names"),
            );
        }

        if record.shared.share_app_service_plan
            && record.frontend.sku_tier != record.backend.sku_tier
        {
            result.warnings.push(format!(
                "Backend shares the frontend plan, so its SKU '{}' is ignored in favor of '{}'",
                record.backend.sku_tier, record.frontend.sku_tier
            ));
        }

        if let Some(database) = &record.database {
            Self::validate_database(database, &mut result);
        }

        if let Some(dns) = &record.dns {
            Self::validate_dns(dns, &mut result);
            for (component, hosting) in [("frontend", &record.frontend), ("backend", &record.backend)]
            {
                if let Some(domain) = &hosting.custom_domain
                    && !is_subdomain_of(domain, &dns.domain_name)
                {
                    result.error(
                        &format!("{component}.custom_domain"),
                        format!("'{domain}' is not inside zone '{}'", dns.domain_name),
                    );
                }
            }
        } else {
            for (component, hosting) in [("frontend", &record.frontend), ("backend", &record.backend)]
            {
                if hosting.custom_domain.is_some() {
                    result.warnings.push(format!(
                        "{component} has a custom domain but no DNS zone is configured; no records will be created"
                    ));
                }
            }
        }

        Self::validate_tags("shared.tags", &record.shared.tags, &mut result);

        result
    }

    fn into_outcome(result: ValidationResult) -> Result<ValidationResult> {
        match result.errors.first() {
            None => {
                debug!("Configuration validation passed");
                Ok(result)
            }
            Some(first_error) => Err(InfraError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            })),
        }
    }

    /// Validates one hosted app.
    fn validate_hosting(component: &str, hosting: &HostingConfig, result: &mut ValidationResult) {
        let field = format!("{component}.app_name");
        if hosting.app_name.is_empty() {
            result.error(&field, String::from("App name cannot be empty"));
        } else if !is_valid_name(&hosting.app_name) {
            result.error(
                &field,
                format!(
                    "App name '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                    hosting.app_name
                ),
            );
        } else if hosting.app_name.len() > APP_NAME_LIMIT {
            result.error(
                &field,
                format!("App name must be at most {APP_NAME_LIMIT} characters"),
            );
        }

        if !hosting.sku_tier.is_known() {
            result.warnings.push(format!(
                "{component}: unknown SKU '{}' is billed as {}",
                hosting.sku_tier,
                hosting.sku_tier.pricing_category()
            ));
        }

        if let Some(domain) = &hosting.custom_domain {
            if !is_valid_hostname(domain) {
                result.error(
                    &format!("{component}.custom_domain"),
                    format!("'{domain}' is not a valid hostname"),
                );
            }
            if hosting.sku_tier.is_free() {
                result.warnings.push(format!(
                    "{component}: custom domain '{domain}' needs a managed certificate, which the F1 tier does not support"
                ));
            }
        }
    }

    /// Validates the per-environment database.
    fn validate_database(database: &DatabaseConfig, result: &mut ValidationResult) {
        if !is_valid_identifier(&database.database_name) {
            result.error(
                "database.database_name",
                format!(
                    "Database name '{}' must be lowercase alphanumeric with underscores",
                    database.database_name
                ),
            );
        }
        if database.admin_username.is_empty() {
            result.error(
                "database.admin_username",
                String::from("Administrator login cannot be empty"),
            );
        }
        if database.driver.is_empty() {
            result.error("database.driver", String::from("Driver cannot be empty"));
        }
    }

    /// Validates the DNS zone and mail records.
    fn validate_dns(dns: &DnsConfig, result: &mut ValidationResult) {
        if !is_valid_hostname(&dns.domain_name) || !dns.domain_name.contains('.') {
            result.error(
                "dns.domain_name",
                format!("'{}' is not a valid domain", dns.domain_name),
            );
        }

        if dns.email.mx_records.is_empty() {
            result.error("dns.email.mx_records", String::from("At least one MX record is required"));
        }
        for (i, mx) in dns.email.mx_records.iter().enumerate() {
            if mx.exchange.is_empty() {
                result.error(
                    &format!("dns.email.mx_records[{i}].exchange"),
                    String::from("Exchange cannot be empty"),
                );
            }
        }

        if !dns.email.spf.starts_with("v=spf1") {
            result.error("dns.email.spf", String::from("SPF record must start with 'v=spf1'"));
        }
        if !dns.email.dmarc.starts_with("v=DMARC1") {
            result.error(
                "dns.email.dmarc",
                String::from("DMARC record must start with 'v=DMARC1'"),
            );
        }

        if dns.email.dkim.is_empty() {
            result.error("dns.email.dkim", String::from("DKIM record cannot be empty"));
        }
        for (i, segment) in dns.email.dkim.iter().enumerate() {
            if segment.len() > TXT_SEGMENT_LIMIT {
                result.error(
                    &format!("dns.email.dkim[{i}]"),
                    format!(
                        "Segment is {} characters, the limit is {TXT_SEGMENT_LIMIT}",
                        segment.len()
                    ),
                );
            }
        }
    }

    /// Validates a tag set.
    fn validate_tags(field: &str, tags: &TagSet, result: &mut ValidationResult) {
        for (key, value) in tags.iter() {
            if key.is_empty() || key.len() > TAG_NAME_LIMIT {
                result.error(
                    &format!("{field}.{key}"),
                    format!("Tag names must be 1 to {TAG_NAME_LIMIT} characters"),
                );
            }
            if value.len() > TAG_VALUE_LIMIT {
                result.error(
                    &format!("{field}.{key}"),
                    format!("Tag values must be at most {TAG_VALUE_LIMIT} characters"),
                );
            }
        }
    }

    /// Validates stack settings.
    fn validate_settings(settings: &StackSettings, result: &mut ValidationResult) {
        if settings.require_location().is_err() {
            result.error("location", String::from("An Azure location is required"));
        }
        for (field, value) in [
            ("organization", &settings.organization),
            ("project", &settings.project),
            ("shared_stack", &settings.shared_stack),
        ] {
            if !is_valid_name(value) {
                result.error(field, format!("'{value}' is not a valid name"));
            }
        }
    }
}

/// Validates that a name follows the naming convention.
/// Names must be lowercase alphanumeric with hyphens, starting with a letter.
fn is_valid_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }

    let mut chars = name.chars();

    // First character must be a letter
    if let Some(first) = chars.next()
        && !first.is_ascii_lowercase() {
            return false;
        }

    // Rest must be lowercase alphanumeric or hyphen
    for c in chars {
        if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
            return false;
        }
    }

    // Cannot end with hyphen
    if name.ends_with('-') {
        return false;
    }

    // Cannot have consecutive hyphens
    if name.contains("--") {
        return false;
    }

    true
}

/// Validates a PostgreSQL identifier.
fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= DATABASE_NAME_LIMIT
        && name.starts_with(|c: char| c.is_ascii_lowercase())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Validates a DNS hostname.
fn is_valid_hostname(host: &str) -> bool {
    !host.is_empty()
        && host.len() <= 253
        && host.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        })
}

/// Returns true if `host` is strictly inside `zone`.
fn is_subdomain_of(host: &str, zone: &str) -> bool {
    host.strip_suffix(zone)
        .and_then(|prefix| prefix.strip_suffix('.'))
        .is_some_and(|label| !label.is_empty())
}

impl ValidationResult {
    fn error(&mut self, field: &str, message: String) {
        self.errors.push(ValidationError {
            field: field.to_string(),
            message,
        });
    }

    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigResolver;
    use crate::config::spec::SkuTier;

    fn settings() -> StackSettings {
        StackSettings {
            location: Some(String::from("westeurope")),
            ..StackSettings::default()
        }
    }

    #[test]
    fn test_valid_name() {
        assert!(is_valid_name("infusethink-api"));
        assert!(is_valid_name("app-123"));
        assert!(is_valid_name("a"));
    }

    #[test]
    fn test_invalid_name() {
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("Infusethink")); // uppercase
        assert!(!is_valid_name("123-app")); // starts with number
        assert!(!is_valid_name("app_name")); // underscore
        assert!(!is_valid_name("app-")); // ends with hyphen
        assert!(!is_valid_name("app--name")); // consecutive hyphens
    }

    #[test]
    fn test_subdomain() {
        assert!(is_subdomain_of("www.infuseth.ink", "infuseth.ink"));
        assert!(!is_subdomain_of("infuseth.ink", "infuseth.ink"));
        assert!(!is_subdomain_of("wwwinfuseth.ink", "infuseth.ink"));
        assert!(!is_subdomain_of("www.example.com", "infuseth.ink"));
    }

    #[test]
    fn test_builtin_records_are_valid() {
        let resolver = ConfigResolver::new();
        let validator = ConfigValidator::new();
        for id in ["dev", "prod"] {
            let record = resolver.resolve(id).unwrap();
            assert!(validator.validate(&record, &settings()).is_ok(), "{id} should be valid");
        }
    }

    #[test]
    fn test_prod_warns_about_free_tier_domains() {
        let record = ConfigResolver::new().resolve("prod").unwrap();
        let result = ConfigValidator::new().check(&record);
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 2);
    }

    #[test]
    fn test_missing_location_is_an_error() {
        let record = ConfigResolver::new().resolve("dev").unwrap();
        let result = ConfigValidator::new().validate(&record, &StackSettings::default());
        assert!(matches!(
            result,
            Err(InfraError::Config(ConfigError::ValidationError { .. }))
        ));
    }

    #[test]
    fn test_oversized_dkim_segment_rejected() {
        let mut record = ConfigResolver::new().resolve("prod").unwrap();
        if let Some(dns) = record.dns.as_mut() {
            dns.email.dkim = vec!["x".repeat(300)];
        }
        let result = ConfigValidator::new().check(&record);
        assert!(result.errors.iter().any(|e| e.field == "dns.email.dkim[0]"));
    }

    #[test]
    fn test_domain_outside_zone_rejected() {
        let mut record = ConfigResolver::new().resolve("prod").unwrap();
        record.backend.custom_domain = Some(String::from("api.example.com"));
        let result = ConfigValidator::new().check(&record);
        assert!(result.errors.iter().any(|e| e.field == "backend.custom_domain"));
    }

    #[test]
    fn test_unknown_sku_and_shared_plan_warn() {
        let mut record = ConfigResolver::new().resolve("dev").unwrap();
        record.backend.sku_tier = SkuTier::new("X1");
        record.shared.share_app_service_plan = true;
        let result = ConfigValidator::new().check(&record);
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 2);
    }

    #[test]
    fn test_shared_requires_admin_login() {
        let shared = ConfigResolver::new().shared();
        let validator = ConfigValidator::new();
        assert!(validator.validate_shared(&shared, &settings()).is_err());

        let with_login = StackSettings {
            db_admin_username: Some(String::from("infusethink_admin")),
            ..settings()
        };
        assert!(validator.validate_shared(&shared, &with_login).is_ok());
    }
}
