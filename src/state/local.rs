//! Local file-based stack store.
//!
//! Each stack is one JSON file under `.infusethink/<organization>/<project>/`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::StackKey;
use crate::error::{InfraError, Result, StateError};

use super::store::StackStore;
use super::types::{STATE_VERSION, StackState};

/// Default state directory name.
const STATE_DIR: &str = ".infusethink";

/// Local file-based stack store.
#[derive(Debug, Clone)]
pub struct LocalStackStore {
    /// Base directory for state files.
    base_dir: PathBuf,
}

impl LocalStackStore {
    /// Creates a new local stack store under the current directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory cannot be determined.
    pub fn new() -> Result<Self> {
        let base_dir = std::env::current_dir()
            .map_err(|e| InfraError::internal(format!("Cannot determine current directory: {e}")))?
            .join(STATE_DIR);

        Ok(Self::with_base_dir(base_dir))
    }

    /// Creates a new local stack store with a custom base directory.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Returns the base directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Returns the state file of a stack.
    #[must_use]
    pub fn state_path(&self, key: &StackKey) -> PathBuf {
        self.base_dir
            .join(&key.organization)
            .join(&key.project)
            .join(format!("{}.json", key.stack))
    }

    /// Ensures a directory exists.
    async fn ensure_dir(dir: &Path) -> Result<()> {
        if !dir.exists() {
            debug!("Creating state directory: {}", dir.display());
            fs::create_dir_all(dir).await.map_err(|e| {
                StateError::write_failed(format!("Failed to create state directory: {e}"))
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl StackStore for LocalStackStore {
    async fn load(&self, key: &StackKey) -> Result<Option<StackState>> {
        let path = self.state_path(key);
        if !path.exists() {
            debug!("State file does not exist: {}", path.display());
            return Ok(None);
        }

        info!("Loading state of {key} from: {}", path.display());

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| StateError::corrupted(format!("Failed to read state file: {e}")))?;

        let state: StackState = serde_json::from_str(&content)
            .map_err(|e| StateError::corrupted(format!("Failed to parse state file: {e}")))?;

        if state.version != STATE_VERSION {
            return Err(StateError::VersionMismatch {
                expected: STATE_VERSION.to_string(),
                found: state.version,
            }
            .into());
        }

        Ok(Some(state))
    }

    async fn save(&self, state: &StackState) -> Result<()> {
        let path = self.state_path(&state.key);
        if let Some(parent) = path.parent() {
            Self::ensure_dir(parent).await?;
        }

        info!("Saving state of {} to: {}", state.key, path.display());

        let content = serde_json::to_string_pretty(state).map_err(|e| StateError::SerializationError {
            message: format!("Failed to serialize state: {e}"),
        })?;

        // Write to a temporary file first, then rename
        let temp_path = path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| StateError::write_failed(format!("Failed to create temp state file: {e}")))?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| StateError::write_failed(format!("Failed to write state file: {e}")))?;

        file.sync_all()
            .await
            .map_err(|e| StateError::write_failed(format!("Failed to sync state file: {e}")))?;

        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| StateError::write_failed(format!("Failed to rename state file: {e}")))?;

        debug!("State saved successfully");
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}
