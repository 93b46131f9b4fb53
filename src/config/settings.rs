//! Stack settings loading.
//!
//! Settings that are not part of the static environment definitions live in
//! `Infusethink.<stack>.yaml` next to the binary's working directory: the
//! Azure location, the subscription, and the identity of the shared stack.
//! Any of them can be overridden by `INFUSETHINK_*` variables, optionally
//! loaded from a `.env` file. The database administrator password is only
//! ever read from the environment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ConfigError, InfraError, Result};
use crate::output::Secret;

/// Variable holding the database administrator password.
pub const DB_ADMIN_PASSWORD_VAR: &str = "INFUSETHINK_DB_ADMIN_PASSWORD";

/// Variable holding the ARM bearer token.
pub const ACCESS_TOKEN_VAR: &str = "AZURE_ACCESS_TOKEN";

/// Variable holding the Azure subscription id.
pub const SUBSCRIPTION_VAR: &str = "AZURE_SUBSCRIPTION_ID";

/// Fully qualified identity of a stack.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StackKey {
    /// Organization owning the project.
    pub organization: String,
    /// Project name.
    pub project: String,
    /// Stack name.
    pub stack: String,
}

impl StackKey {
    /// Creates a stack key.
    #[must_use]
    pub fn new(organization: &str, project: &str, stack: &str) -> Self {
        Self {
            organization: organization.to_string(),
            project: project.to_string(),
            stack: stack.to_string(),
        }
    }
}

impl fmt::Display for StackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.organization, self.project, self.stack)
    }
}

/// Per-stack settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackSettings {
    /// Organization owning the project.
    #[serde(default = "default_organization")]
    pub organization: String,
    /// Project name.
    #[serde(default = "default_project")]
    pub project: String,
    /// Azure region for regional resources.
    #[serde(default)]
    pub location: Option<String>,
    /// Azure subscription id.
    #[serde(default)]
    pub subscription_id: Option<String>,
    /// Name of the stack exporting the shared database server.
    #[serde(default = "default_shared_stack")]
    pub shared_stack: String,
    /// Database administrator login, used by the shared stack.
    #[serde(default)]
    pub db_admin_username: Option<String>,
    /// Database administrator password, never read from the settings file.
    #[serde(skip)]
    pub db_admin_password: Option<Secret<String>>,
}

impl Default for StackSettings {
    fn default() -> Self {
        Self {
            organization: default_organization(),
            project: default_project(),
            location: None,
            subscription_id: None,
            shared_stack: default_shared_stack(),
            db_admin_username: None,
            db_admin_password: None,
        }
    }
}

fn default_organization() -> String {
    String::from("infusethink")
}

fn default_project() -> String {
    String::from("infusethink")
}

fn default_shared_stack() -> String {
    String::from("shared")
}

impl StackSettings {
    /// Returns the key of a stack in this project.
    #[must_use]
    pub fn stack_key(&self, stack: &str) -> StackKey {
        StackKey::new(&self.organization, &self.project, stack)
    }

    /// Returns the key of the shared stack.
    #[must_use]
    pub fn shared_stack_key(&self) -> StackKey {
        self.stack_key(&self.shared_stack)
    }

    /// Returns the Azure location.
    ///
    /// # Errors
    ///
    /// Returns an error if no location is configured.
    pub fn require_location(&self) -> Result<&str> {
        self.location
            .as_deref()
            .filter(|l| !l.is_empty())
            .ok_or_else(|| ConfigError::missing_setting("location").into())
    }

    /// Returns the subscription id.
    ///
    /// # Errors
    ///
    /// Returns an error if no subscription is configured.
    pub fn require_subscription(&self) -> Result<&str> {
        self.subscription_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::missing_setting("subscription_id").into())
    }

    /// Returns the database administrator login.
    ///
    /// # Errors
    ///
    /// Returns an error if no login is configured.
    pub fn require_admin_username(&self) -> Result<&str> {
        self.db_admin_username
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ConfigError::missing_setting("db_admin_username").into())
    }

    /// Returns the database administrator password.
    ///
    /// # Errors
    ///
    /// Returns an error if the password variable is not set.
    pub fn require_admin_password(&self) -> Result<&Secret<String>> {
        self.db_admin_password.as_ref().ok_or_else(|| {
            ConfigError::MissingEnvVar {
                name: DB_ADMIN_PASSWORD_VAR.to_string(),
            }
            .into()
        })
    }
}

/// Loader for stack settings.
#[derive(Debug, Default)]
pub struct SettingsParser {
    /// Directory holding the settings files.
    base_path: Option<PathBuf>,
}

impl SettingsParser {
    /// Creates a parser reading from the working directory.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the directory holding the settings files.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Returns the settings file name for a stack.
    #[must_use]
    pub fn file_name(stack: &str) -> String {
        format!("Infusethink.{stack}.yaml")
    }

    fn resolve_path(&self, relative: &str) -> PathBuf {
        self.base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(relative), |p| p.join(relative))
    }

    /// Loads settings for a stack, applying environment overrides.
    ///
    /// A missing settings file is not an error; every value can come from
    /// the environment instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the stack name or a loaded stack identity is not
    /// a plain path segment, or if the settings file exists but cannot be
    /// parsed.
    pub fn load(&self, stack: &str) -> Result<StackSettings> {
        check_segment("stack name", stack)?;
        let path = self.resolve_path(&Self::file_name(stack));
        let mut settings = if path.exists() {
            self.load_file(&path)?
        } else {
            debug!("No settings file at {}, using defaults", path.display());
            StackSettings::default()
        };

        Self::apply_overrides(&mut settings, |name| std::env::var(name).ok());
        check_segment("organization", &settings.organization)?;
        check_segment("project", &settings.project)?;
        check_segment("shared stack", &settings.shared_stack)?;
        Ok(settings)
    }

    /// Loads settings from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<StackSettings> {
        let path = path.as_ref();
        info!("Loading stack settings from: {}", path.display());

        if !path.exists() {
            return Err(InfraError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            InfraError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses settings from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<StackSettings> {
        debug!("Parsing YAML settings");

        // An empty file is a valid, all-defaults settings file.
        if content.trim().is_empty() {
            return Ok(StackSettings::default());
        }

        serde_yaml::from_str(content).map_err(|e| {
            InfraError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            })
        })
    }

    /// Applies overrides from a variable lookup.
    ///
    /// Recognized variables: `INFUSETHINK_ORGANIZATION`,
    /// `INFUSETHINK_PROJECT`, `INFUSETHINK_LOCATION`,
    /// `INFUSETHINK_SHARED_STACK`, `INFUSETHINK_DB_ADMIN_USERNAME`,
    /// `INFUSETHINK_DB_ADMIN_PASSWORD` and `AZURE_SUBSCRIPTION_ID`.
    pub fn apply_overrides(settings: &mut StackSettings, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(organization) = lookup("INFUSETHINK_ORGANIZATION") {
            debug!("Overriding organization from environment");
            settings.organization = organization;
        }

        if let Some(project) = lookup("INFUSETHINK_PROJECT") {
            debug!("Overriding project from environment");
            settings.project = project;
        }

        if let Some(location) = lookup("INFUSETHINK_LOCATION") {
            debug!("Overriding location from environment");
            settings.location = Some(location);
        }

        if let Some(shared_stack) = lookup("INFUSETHINK_SHARED_STACK") {
            debug!("Overriding shared_stack from environment");
            settings.shared_stack = shared_stack;
        }

        if let Some(username) = lookup("INFUSETHINK_DB_ADMIN_USERNAME") {
            debug!("Overriding db_admin_username from environment");
            settings.db_admin_username = Some(username);
        }

        if settings.subscription_id.is_none()
            && let Some(subscription) = lookup(SUBSCRIPTION_VAR)
        {
            debug!("Using subscription from {}", SUBSCRIPTION_VAR);
            settings.subscription_id = Some(subscription);
        }

        if let Some(password) = lookup(DB_ADMIN_PASSWORD_VAR) {
            settings.db_admin_password = Some(Secret::new(password));
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self.resolve_path(".env");

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                InfraError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Gets the ARM bearer token from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not set.
    pub fn access_token() -> Result<Secret<String>> {
        std::env::var(ACCESS_TOKEN_VAR).map(Secret::new).map_err(|_| {
            InfraError::Config(ConfigError::MissingEnvVar {
                name: ACCESS_TOKEN_VAR.to_string(),
            })
        })
    }
}

/// Rejects values that would leave their directory when joined into a path.
fn check_segment(field: &str, value: &str) -> Result<()> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.');
    if value.is_empty() || value == "." || value == ".." || !value.chars().all(allowed) {
        return Err(ConfigError::InvalidName {
            field: field.to_string(),
            value: value.to_string(),
        }
        .into());
    }
    Ok(())
}
