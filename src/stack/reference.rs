//! Cross-stack references.
//!
//! A reference reads another stack's exports from the stack store. The
//! referenced stack must have been deployed and must export every value the
//! caller requires; there are no fallbacks.

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::StackKey;
use crate::error::{Result, StackError};
use crate::output::{Output, Secret};
use crate::state::{StackState, StackStore, StoredOutput};

/// Read access to a deployed stack's exports.
#[derive(Debug, Clone)]
pub struct StackReference {
    key: StackKey,
    state: StackState,
}

impl StackReference {
    /// Loads the referenced stack's state.
    ///
    /// # Errors
    ///
    /// Returns [`StackError::NotDeployed`] if the stack has no state, or a
    /// state error if the store cannot be read.
    pub async fn load(store: &dyn StackStore, key: &StackKey) -> Result<Self> {
        debug!("Resolving stack reference {key} from {} store", store.backend_type());
        let state = store.load(key).await?.ok_or_else(|| StackError::NotDeployed {
            stack: key.to_string(),
        })?;
        Ok(Self::from_state(state))
    }

    /// Wraps an already loaded state.
    #[must_use]
    pub fn from_state(state: StackState) -> Self {
        Self {
            key: state.key.clone(),
            state,
        }
    }

    /// Returns the referenced stack's key.
    #[must_use]
    pub const fn key(&self) -> &StackKey {
        &self.key
    }

    /// Returns a required export converted to `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if the export is absent or has another shape.
    pub fn require<T>(&self, name: &str, expected: &str) -> Result<Output<T>>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let stored = self.stored(name)?;
        let typed: T = serde_json::from_value(stored.value.clone()).map_err(|_| {
            StackError::OutputTypeMismatch {
                stack: self.key.to_string(),
                output: name.to_string(),
                expected: expected.to_string(),
            }
        })?;
        let typed = Output::known(typed);
        Ok(if stored.secret { typed.into_secret() } else { typed })
    }

    fn stored(&self, name: &str) -> Result<&StoredOutput> {
        self.state.output(name).ok_or_else(|| {
            StackError::MissingCrossStackOutput {
                stack: self.key.to_string(),
                output: name.to_string(),
            }
            .into()
        })
    }

    /// Returns a required string export.
    ///
    /// # Errors
    ///
    /// Returns an error if the export is absent or not a string.
    pub fn require_string(&self, name: &str) -> Result<Output<String>> {
        self.require(name, "string")
    }

    /// Returns a required string export wrapped as a secret.
    ///
    /// # Errors
    ///
    /// Returns an error if the export is absent or not a string.
    pub fn require_secret_string(&self, name: &str) -> Result<Output<Secret<String>>> {
        Ok(self.require_string(name)?.map(Secret::new).into_secret())
    }
}

/// Exports the shared stack publishes for environment stacks.
#[derive(Debug, Clone)]
pub struct SharedStackOutputs {
    /// Resource group holding the server.
    pub resource_group_name: Output<String>,
    /// Server name.
    pub postgres_server_name: Output<String>,
    /// Server hostname.
    pub postgres_server_fqdn: Output<String>,
    /// Administrator password.
    pub postgres_admin_password: Output<Secret<String>>,
}

impl SharedStackOutputs {
    /// Export name of the shared resource group.
    pub const RESOURCE_GROUP_NAME: &'static str = "resource_group_name";
    /// Export name of the server name.
    pub const SERVER_NAME: &'static str = "postgres_server_name";
    /// Export name of the server hostname.
    pub const SERVER_FQDN: &'static str = "postgres_server_fqdn";
    /// Export name of the administrator login.
    pub const ADMIN_USERNAME: &'static str = "postgres_admin_username";
    /// Export name of the administrator password.
    pub const ADMIN_PASSWORD: &'static str = "postgres_admin_password";

    /// Reads every required export from a reference.
    ///
    /// # Errors
    ///
    /// Returns [`StackError::MissingCrossStackOutput`] for the first missing
    /// export.
    pub fn from_reference(reference: &StackReference) -> Result<Self> {
        Ok(Self {
            resource_group_name: reference.require_string(Self::RESOURCE_GROUP_NAME)?,
            postgres_server_name: reference.require_string(Self::SERVER_NAME)?,
            postgres_server_fqdn: reference.require_string(Self::SERVER_FQDN)?,
            postgres_admin_password: reference.require_secret_string(Self::ADMIN_PASSWORD)?,
        })
    }

    /// Loads the shared stack and reads its exports.
    ///
    /// # Errors
    ///
    /// Returns an error if the stack is not deployed or lacks an export.
    pub async fn load(store: &dyn StackStore, key: &StackKey) -> Result<Self> {
        let reference = StackReference::load(store, key).await?;
        Self::from_reference(&reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InfraError;
    use crate::output::NoAttributes;
    use serde_json::Value;
    use crate::state::LocalStackStore;
    use tempfile::TempDir;

    fn shared_key() -> StackKey {
        StackKey::new("infusethink", "infusethink", "shared")
    }

    fn shared_state() -> StackState {
        let mut state = StackState::new(shared_key());
        for (name, value) in [
            (SharedStackOutputs::RESOURCE_GROUP_NAME, "rg-infusethink-shared"),
            (SharedStackOutputs::SERVER_NAME, "psql-infusethink"),
            (
                SharedStackOutputs::SERVER_FQDN,
                "psql-infusethink.postgres.database.azure.com",
            ),
        ] {
            state
                .outputs
                .insert(name.to_string(), StoredOutput::plain(Value::from(value)));
        }
        state.outputs.insert(
            SharedStackOutputs::ADMIN_PASSWORD.to_string(),
            StoredOutput::secret(Value::from("p@ss")),
        );
        state
    }

    #[test]
    fn test_shared_outputs_resolve() {
        let reference = StackReference::from_state(shared_state());
        let outputs = SharedStackOutputs::from_reference(&reference).unwrap();

        let fqdn = outputs.postgres_server_fqdn.resolve(&NoAttributes).unwrap().known();
        assert_eq!(fqdn.as_deref(), Some("psql-infusethink.postgres.database.azure.com"));
        assert!(outputs.postgres_server_fqdn.dependencies().is_empty());

        assert!(outputs.postgres_admin_password.is_secret());
        let password = outputs.postgres_admin_password.resolve(&NoAttributes).unwrap().known().unwrap();
        assert_eq!(password.expose(), "p@ss");
    }

    #[test]
    fn test_missing_output_fails() {
        let mut state = shared_state();
        state.outputs.remove(SharedStackOutputs::SERVER_FQDN);
        let reference = StackReference::from_state(state);

        let err = SharedStackOutputs::from_reference(&reference).unwrap_err();
        assert!(matches!(
            err,
            InfraError::Stack(StackError::MissingCrossStackOutput { ref output, .. })
                if output == SharedStackOutputs::SERVER_FQDN
        ));
    }

    #[test]
    fn test_type_mismatch_fails() {
        let mut state = shared_state();
        state.outputs.insert(
            SharedStackOutputs::SERVER_NAME.to_string(),
            StoredOutput::plain(Value::from(42)),
        );
        let reference = StackReference::from_state(state);

        let err = reference.require_string(SharedStackOutputs::SERVER_NAME).unwrap_err();
        assert!(matches!(err, InfraError::Stack(StackError::OutputTypeMismatch { .. })));
    }

    #[test]
    fn test_secret_flag_survives_typed_read() {
        let reference = StackReference::from_state(shared_state());
        assert!(reference.require_string(SharedStackOutputs::ADMIN_PASSWORD).unwrap().is_secret());
        assert!(!reference.require_string(SharedStackOutputs::SERVER_NAME).unwrap().is_secret());
    }

    #[tokio::test]
    async fn test_undeployed_stack_fails() {
        let temp = TempDir::new().unwrap();
        let store = LocalStackStore::with_base_dir(temp.path());

        let err = SharedStackOutputs::load(&store, &shared_key()).await.unwrap_err();
        assert!(matches!(err, InfraError::Stack(StackError::NotDeployed { .. })));
    }

    #[tokio::test]
    async fn test_load_from_store() {
        let temp = TempDir::new().unwrap();
        let store = LocalStackStore::with_base_dir(temp.path());
        store.save(&shared_state()).await.unwrap();

        let outputs = SharedStackOutputs::load(&store, &shared_key()).await.unwrap();
        let name = outputs.postgres_server_name.resolve(&NoAttributes).unwrap().known();
        assert_eq!(name.as_deref(), Some("psql-infusethink"));
    }
}
