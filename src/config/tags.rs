//! Resource tag sets.
//!
//! Every module builds its tags the same way: component defaults first,
//! then the caller's tags merged over them with [`TagSet::merge`]. On a key
//! collision the caller's value wins.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Ordered map of resource tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeMap<String, String>);

impl TagSet {
    /// Creates an empty tag set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tag, replacing any previous value.
    #[must_use]
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }

    /// Returns a tag value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Merges caller tags over defaults. Caller values win on collision.
    #[must_use]
    pub fn merge(defaults: &Self, caller: &Self) -> Self {
        let mut merged = defaults.0.clone();
        merged.extend(caller.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self(merged)
    }

    /// Iterates over tags in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no tags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

impl From<&TagSet> for Value {
    fn from(tags: &TagSet) -> Self {
        Self::Object(
            tags.0
                .iter()
                .map(|(k, v)| (k.clone(), Self::from(v.as_str())))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_overrides_defaults() {
        let defaults = TagSet::new()
            .with("Environment", "prod")
            .with("ManagedBy", "infusethink");
        let caller = TagSet::new()
            .with("ManagedBy", "Platform Team")
            .with("Owner", "Platform Team");

        let merged = TagSet::merge(&defaults, &caller);

        assert_eq!(merged.get("Environment"), Some("prod"));
        assert_eq!(merged.get("ManagedBy"), Some("Platform Team"));
        assert_eq!(merged.get("Owner"), Some("Platform Team"));
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_merge_with_empty_caller_keeps_defaults() {
        let defaults = TagSet::new().with("Component", "DNS");
        assert_eq!(TagSet::merge(&defaults, &TagSet::new()), defaults);
    }

    #[test]
    fn test_into_json_object() {
        let tags: TagSet = [("Application", "Infusethink")].into_iter().collect();
        let value = Value::from(&tags);
        assert_eq!(value["Application"], "Infusethink");
    }
}
