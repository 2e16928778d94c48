use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use smsward_common::{internal, state::QueueState};

use crate::{Result, SerializationError, StateStore, StoreError, ValidationError};

/// File-based state store
///
/// Persists the whole queue state as a single bincode snapshot file.
///
/// # Atomicity
/// Every save writes to a temporary sibling file and renames it over the
/// snapshot, so a crash mid-write never leaves a truncated snapshot behind.
///
/// # Security
/// - The configured path must be absolute and free of `..` components
/// - Orphaned temporary files from a previous crash are removed on `init()`
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl Default for FileStateStore {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/smsward/queue.bin"),
        }
    }
}

// Custom Deserialize implementation with path validation
impl<'de> Deserialize<'de> for FileStateStore {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct FileStateStoreHelper {
            path: PathBuf,
        }

        let helper = FileStateStoreHelper::deserialize(deserializer)?;
        Self::validate_path(&helper.path).map_err(serde::de::Error::custom)?;

        Ok(Self { path: helper.path })
    }
}

impl FileStateStore {
    /// Create a store at `path`
    ///
    /// # Errors
    /// Returns an error if the path is relative or contains `..` components
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        Self::validate_path(&path)?;
        Ok(Self { path })
    }

    /// The snapshot file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn validate_path(path: &Path) -> std::result::Result<(), ValidationError> {
        for component in path.components() {
            if component == std::path::Component::ParentDir {
                return Err(ValidationError::Traversal(path.display().to_string()));
            }
        }

        if !path.is_absolute() {
            return Err(ValidationError::NotAbsolute(path.display().to_string()));
        }

        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Initialize the file-backed store
    ///
    /// Creates the parent directory if it doesn't exist, validates that the
    /// snapshot path is not a directory, and removes any orphaned temporary
    /// file left by an interrupted save.
    ///
    /// This should be called during application startup to fail fast on
    /// permission problems with the state directory.
    pub fn init(&self) -> Result<()> {
        internal!("Initialising state store at {:?} ...", self.path);

        if self.path.is_dir() {
            return Err(ValidationError::IsDirectory(self.path.display().to_string()).into());
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.try_exists()?
        {
            internal!("{:#?} does not exist, creating...", parent);
            std::fs::create_dir_all(parent)?;
        }

        let temp = self.temp_path();
        if temp.try_exists()? {
            internal!(
                level = INFO,
                "Removing orphaned temporary snapshot {:?}",
                temp
            );
            std::fs::remove_file(&temp)?;
        }

        Ok(())
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> Result<Option<QueueState>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(e)),
        };

        let (state, _) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
                .map_err(SerializationError::from)?;

        Ok(Some(state))
    }

    async fn save(&self, state: &QueueState) -> Result<()> {
        let bytes = bincode::serde::encode_to_vec(state, bincode::config::standard())
            .map_err(SerializationError::from)?;

        // Write-to-temp-then-rename keeps the previous snapshot intact until
        // the new one is fully on disk
        let temp = self.temp_path();
        tokio::fs::write(&temp, &bytes).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        Ok(())
    }
}
