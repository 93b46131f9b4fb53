//! Configuration fingerprints.
//!
//! A fingerprint is a SHA-256 over the resolved configuration and the
//! settings that shape the resource graph. It is stored with every
//! deployment so that `preview` can say whether the configuration changed
//! since the last `up`.

use sha2::{Digest, Sha256};

use super::settings::StackSettings;
use super::spec::{ConfigurationRecord, HostingConfig, SharedInfraConfig};
use super::tags::TagSet;

/// Hasher for computing configuration fingerprints.
#[derive(Debug, Default)]
pub struct ConfigHasher;

impl ConfigHasher {
    /// Creates a new configuration hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the fingerprint of an environment record and its settings.
    #[must_use]
    pub fn hash_record(&self, record: &ConfigurationRecord, settings: &StackSettings) -> String {
        let mut hasher = Sha256::new();

        Self::update_field(&mut hasher, record.environment.as_str().as_bytes());
        Self::update_field(&mut hasher, self.hash_hosting(&record.frontend).as_bytes());
        Self::update_field(&mut hasher, self.hash_hosting(&record.backend).as_bytes());

        if let Some(database) = &record.database {
            hasher.update(b"database");
            Self::update_field(&mut hasher, database.database_name.as_bytes());
            Self::update_field(&mut hasher, database.admin_username.as_bytes());
            Self::update_field(&mut hasher, database.driver.as_bytes());
        }

        if let Some(dns) = &record.dns {
            hasher.update(b"dns");
            Self::update_field(&mut hasher, dns.domain_name.as_bytes());
            for mx in &dns.email.mx_records {
                Self::update_field(&mut hasher, mx.exchange.as_bytes());
                hasher.update(mx.preference.to_be_bytes());
            }
            Self::update_field(&mut hasher, dns.email.spf.as_bytes());
            for segment in &dns.email.dkim {
                Self::update_field(&mut hasher, segment.as_bytes());
            }
            Self::update_field(&mut hasher, dns.email.dmarc.as_bytes());
        }

        Self::update_tags(&mut hasher, &record.shared.tags);
        hasher.update([u8::from(record.shared.share_app_service_plan)]);
        Self::update_settings(&mut hasher, settings);

        hex::encode(hasher.finalize())
    }

    /// Computes the fingerprint of the shared stack configuration.
    #[must_use]
    pub fn hash_shared(&self, shared: &SharedInfraConfig, settings: &StackSettings) -> String {
        let mut hasher = Sha256::new();

        Self::update_field(&mut hasher, shared.resource_group_name.as_bytes());
        Self::update_field(&mut hasher, shared.server_name.as_bytes());
        Self::update_field(&mut hasher, shared.sku_name.as_bytes());
        hasher.update(shared.storage_size_gb.to_be_bytes());
        Self::update_field(&mut hasher, shared.postgresql_version.as_bytes());
        Self::update_tags(&mut hasher, &shared.tags);
        Self::update_settings(&mut hasher, settings);
        Self::update_optional(&mut hasher, settings.db_admin_username.as_deref());

        hex::encode(hasher.finalize())
    }

    /// Computes a hash for one hosted app.
    #[must_use]
    pub fn hash_hosting(&self, hosting: &HostingConfig) -> String {
        let mut hasher = Sha256::new();

        Self::update_field(&mut hasher, hosting.app_name.as_bytes());
        Self::update_field(&mut hasher, hosting.sku_tier.as_str().as_bytes());
        Self::update_optional(&mut hasher, hosting.custom_domain.as_deref());

        hex::encode(hasher.finalize())
    }

    // Fields are length-prefixed.
    fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
        hasher.update((bytes.len() as u64).to_be_bytes());
        hasher.update(bytes);
    }

    fn update_optional(hasher: &mut Sha256, value: Option<&str>) {
        match value {
            Some(value) => {
                hasher.update([1]);
                Self::update_field(hasher, value.as_bytes());
            }
            None => hasher.update([0]),
        }
    }

    // Tags iterate in key order, so no sorting is needed.
    fn update_tags(hasher: &mut Sha256, tags: &TagSet) {
        for (key, value) in tags.iter() {
            Self::update_field(hasher, key.as_bytes());
            Self::update_field(hasher, value.as_bytes());
        }
    }

    // The password is not hashed.
    fn update_settings(hasher: &mut Sha256, settings: &StackSettings) {
        Self::update_field(hasher, settings.organization.as_bytes());
        Self::update_field(hasher, settings.project.as_bytes());
        Self::update_field(hasher, settings.shared_stack.as_bytes());
        Self::update_optional(hasher, settings.location.as_deref());
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }

    /// Compares two hashes to determine if they are equal.
    #[must_use]
    pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
        if hash1.len() != hash2.len() {
            return false;
        }

        hash1
            .bytes()
            .zip(hash2.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigResolver, SkuTier};

    fn settings() -> StackSettings {
        StackSettings {
            location: Some(String::from("westeurope")),
            ..StackSettings::default()
        }
    }

    #[test]
    fn test_record_hash_deterministic() {
        let hasher = ConfigHasher::new();
        let record = ConfigResolver::new().resolve("prod").unwrap();

        assert_eq!(
            hasher.hash_record(&record, &settings()),
            hasher.hash_record(&record, &settings())
        );
    }

    #[test]
    fn test_environments_hash_differently() {
        let hasher = ConfigHasher::new();
        let resolver = ConfigResolver::new();
        let dev = resolver.resolve("dev").unwrap();
        let prod = resolver.resolve("prod").unwrap();

        assert_ne!(
            hasher.hash_record(&dev, &settings()),
            hasher.hash_record(&prod, &settings())
        );
    }

    #[test]
    fn test_location_changes_hash() {
        let hasher = ConfigHasher::new();
        let record = ConfigResolver::new().resolve("dev").unwrap();
        let moved = StackSettings {
            location: Some(String::from("northeurope")),
            ..StackSettings::default()
        };

        assert_ne!(
            hasher.hash_record(&record, &settings()),
            hasher.hash_record(&record, &moved)
        );
    }

    #[test]
    fn test_field_boundaries_change_hash() {
        let hasher = ConfigHasher::new();
        let app = |name: &str, sku: &str| HostingConfig {
            app_name: name.to_string(),
            sku_tier: SkuTier::new(sku),
            custom_domain: None,
        };
        assert_ne!(hasher.hash_hosting(&app("ab", "c")), hasher.hash_hosting(&app("a", "bc")));

        let shared = ConfigResolver::new().shared();
        let only_location = StackSettings {
            location: Some(String::from("admin")),
            db_admin_username: None,
            ..StackSettings::default()
        };
        let only_username = StackSettings {
            location: None,
            db_admin_username: Some(String::from("admin")),
            ..StackSettings::default()
        };
        assert_ne!(
            hasher.hash_shared(&shared, &only_location),
            hasher.hash_shared(&shared, &only_username)
        );
    }

    #[test]
    fn test_short_hash() {
        let hasher = ConfigHasher::new();
        let full_hash = "abcdef1234567890abcdef1234567890";
        let short = hasher.short_hash(full_hash);

        assert_eq!(short, "abcdef12");
        assert_eq!(short.len(), 8);
    }

    #[test]
    fn test_hashes_match() {
        assert!(ConfigHasher::hashes_match("abc123", "abc123"));
        assert!(!ConfigHasher::hashes_match("abc123", "abc124"));
        assert!(!ConfigHasher::hashes_match("abc123", "abc12"));
    }
}
