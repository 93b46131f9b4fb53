//! Error types for the Infusethink infrastructure tool.
//!
//! This module provides the error hierarchy for every stage of a run:
//! configuration resolution, graph construction, deferred value resolution,
//! cross-stack references, stack state, and submission to Azure.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the infrastructure tool.
#[derive(Debug, Error)]
pub enum InfraError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Cross-stack reference errors.
    #[error("Stack reference error: {0}")]
    Stack(#[from] StackError),

    /// Resource graph construction errors.
    #[error("Resource graph error: {0}")]
    Graph(#[from] GraphError),

    /// Deferred value resolution errors.
    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    /// Stack state errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Azure Resource Manager errors.
    #[error("Azure error: {0}")]
    Azure(#[from] AzureError),

    /// Deployment errors.
    #[error("Deployment error: {0}")]
    Deploy(#[from] DeployError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The environment identifier is outside the supported set.
    #[error("Unknown environment: {environment}. Supported environments: {supported}")]
    UnknownEnvironment {
        /// The rejected identifier.
        environment: String,
        /// Comma-separated list of supported identifiers.
        supported: String,
    },

    /// A settings file was not found.
    #[error("Settings file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// A settings file could not be parsed.
    #[error("Failed to parse settings: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// A required stack setting is missing.
    #[error("Missing required setting: {name}")]
    MissingSetting {
        /// Name of the missing setting.
        name: String,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// A stack identity component cannot be used as a path segment.
    #[error("Invalid {field} '{value}': use letters, digits, '-', '_' or '.'")]
    InvalidName {
        /// Which component was rejected.
        field: String,
        /// The rejected value.
        value: String,
    },
}

/// Cross-stack reference errors.
#[derive(Debug, Error)]
pub enum StackError {
    /// The referenced stack has never been deployed.
    #[error("Stack {stack} has not been deployed; deploy it before referencing its outputs")]
    NotDeployed {
        /// Fully qualified stack key.
        stack: String,
    },

    /// The referenced stack lacks a required output.
    #[error("Stack {stack} does not export required output '{output}'")]
    MissingCrossStackOutput {
        /// Fully qualified stack key.
        stack: String,
        /// Name of the missing output.
        output: String,
    },

    /// The referenced output has an unexpected shape.
    #[error("Output '{output}' of stack {stack} is not a {expected}")]
    OutputTypeMismatch {
        /// Fully qualified stack key.
        stack: String,
        /// Name of the output.
        output: String,
        /// Expected JSON type.
        expected: String,
    },
}

/// Resource graph construction errors.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Two resources share a URN.
    #[error("Duplicate resource: {urn}")]
    DuplicateResource {
        /// The duplicated URN.
        urn: String,
    },

    /// A resource depends on something that was never declared.
    #[error("Resource {urn} depends on undeclared resource {dependency}")]
    UnknownDependency {
        /// The dependent resource.
        urn: String,
        /// The missing dependency.
        dependency: String,
    },

    /// Dependencies form a cycle.
    #[error("Circular dependency detected: {cycle}")]
    CircularDependency {
        /// Description of the cycle.
        cycle: String,
    },

    /// Two exports share a name.
    #[error("Duplicate export: {name}")]
    DuplicateExport {
        /// The duplicated export name.
        name: String,
    },

    /// A module was given an input it cannot use.
    #[error("Invalid input for {resource}: {message}")]
    InvalidInput {
        /// Logical resource name.
        resource: String,
        /// Description of the problem.
        message: String,
    },
}

/// Deferred value resolution errors.
#[derive(Debug, Error)]
pub enum OutputError {
    /// A resolved attribute could not be converted to the requested type.
    #[error("Attribute '{attribute}' of {urn} has an unexpected type: {message}")]
    AttributeType {
        /// Resource URN.
        urn: String,
        /// Attribute name.
        attribute: String,
        /// Conversion failure.
        message: String,
    },

    /// A value could not be serialized into a resource input.
    #[error("Failed to serialize input value: {message}")]
    Serialization {
        /// Description of the failure.
        message: String,
    },

    /// A deferred transformation rejected its input.
    #[error("Deferred transformation failed: {message}")]
    Transform {
        /// Description of the failure.
        message: String,
    },
}

/// Stack state errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// State is corrupted.
    #[error("State is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// State could not be written.
    #[error("Failed to write state: {message}")]
    WriteFailed {
        /// Description of the failure.
        message: String,
    },

    /// Serialization error.
    #[error("State serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// State version mismatch.
    #[error("State version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected state version.
        expected: String,
        /// Found state version.
        found: String,
    },
}

/// Azure Resource Manager errors.
#[derive(Debug, Error)]
pub enum AzureError {
    /// Authentication failed.
    #[error("Azure authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed.
    #[error("Azure API request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from API.
        message: String,
    },

    /// Network error.
    #[error("Network error communicating with Azure: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from API.
    #[error("Invalid response from Azure: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },

    /// The resource reached a terminal failure state.
    #[error("Provisioning of {resource} ended in state {state}")]
    ProvisioningFailed {
        /// Resource path.
        resource: String,
        /// Terminal provisioning state.
        state: String,
    },

    /// The resource did not reach a terminal state in time.
    #[error("Timed out waiting for {resource} to finish provisioning")]
    ProvisioningTimeout {
        /// Resource path.
        resource: String,
    },
}

/// Deployment errors.
#[derive(Debug, Error)]
pub enum DeployError {
    /// An input was still unknown when its resource was due.
    #[error("Input '{input}' of {urn} is unresolved at deploy time")]
    UnresolvedInput {
        /// Resource URN.
        urn: String,
        /// Input key.
        input: String,
    },

    /// An export was still unknown after all resources were applied.
    #[error("Export '{name}' is unresolved after deployment")]
    UnresolvedExport {
        /// Export name.
        name: String,
    },

    /// Deployment was cancelled by the operator.
    #[error("Deployment aborted: {reason}")]
    Aborted {
        /// Reason for abort.
        reason: String,
    },
}

/// Result type alias for infrastructure operations.
pub type Result<T> = std::result::Result<T, InfraError>;

impl InfraError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a missing setting error.
    #[must_use]
    pub fn missing_setting(name: impl Into<String>) -> Self {
        Self::MissingSetting { name: name.into() }
    }
}

impl StateError {
    /// Creates a corruption error with the given message.
    #[must_use]
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Creates a write error with the given message.
    #[must_use]
    pub fn write_failed(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
        }
    }
}

impl AzureError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }
}

impl OutputError {
    /// Creates a transform error.
    #[must_use]
    pub fn transform(message: impl Into<String>) -> Self {
        Self::Transform {
            message: message.into(),
        }
    }
}
