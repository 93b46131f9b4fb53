//! Deployment environments.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, InfraError};

/// A supported deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development environment.
    Dev,
    /// Production environment.
    Prod,
}

impl Environment {
    /// Every supported environment, in display order.
    pub const ALL: [Self; 2] = [Self::Dev, Self::Prod];

    /// Returns the environment identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Prod => "prod",
        }
    }

    /// Returns true for the production environment.
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Prod)
    }

    /// Returns the supported identifiers as a comma-separated list.
    #[must_use]
    pub fn supported() -> String {
        Self::ALL
            .iter()
            .map(|e| e.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = InfraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| {
                ConfigError::UnknownEnvironment {
                    environment: s.to_string(),
                    supported: Self::supported(),
                }
                .into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_supported() {
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Dev);
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Prod);
    }

    #[test]
    fn test_parse_is_exact() {
        for rejected in ["staging", "Prod", " dev", ""] {
            assert!(matches!(
                rejected.parse::<Environment>(),
                Err(InfraError::Config(ConfigError::UnknownEnvironment { .. }))
            ));
        }
    }

    #[test]
    fn test_only_prod_is_production() {
        assert!(Environment::Prod.is_production());
        assert!(!Environment::Dev.is_production());
    }
}
