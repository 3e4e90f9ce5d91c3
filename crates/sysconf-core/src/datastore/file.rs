// # File Datastore
//
// File-based implementation of Datastore with crash recovery.
//
// ## Crash Recovery
//
// - Atomic writes: the new document is written to a `.tmp` sibling, then
//   renamed over the datastore file
// - Backup: the previous document is copied to `.backup` before each write
// - Recovery: a document that fails to parse is replaced by the backup
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "updated": "2026-01-09T12:00:00Z",
//   "config": {
//     "hostname": "edge-01",
//     "clock": { "timezone-name": "Europe/Berlin" },
//     "dns-resolver": { "search": ["corp.example"], "server": [], "options": { "timeout": 5, "attempts": 2 } }
//   }
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::model::SystemConfig;
use crate::traits::Datastore;

/// Datastore file format version
const DATASTORE_FILE_VERSION: &str = "1.0";

/// File-based datastore
///
/// Every commit is written through to disk before it returns, so `flush` only
/// has work to do after a write failed.
#[derive(Debug)]
pub struct FileDatastore {
    path: PathBuf,
    state: RwLock<FileState>,
}

#[derive(Debug)]
struct FileState {
    config: SystemConfig,
    dirty: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct DatastoreFile {
    version: String,
    updated: DateTime<Utc>,
    config: SystemConfig,
}

/// Why a datastore file could not be loaded
enum LoadError {
    /// File exists but is not a valid document
    Corrupt(String),
    /// File could not be read at all
    Unreadable(Error),
}

impl FileDatastore {
    /// Open or create a file datastore
    ///
    /// 1. Load the datastore file
    /// 2. If it is corrupt, fall back to the backup and restore it
    /// 3. If both are unusable, start from the default configuration
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create datastore directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let config = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: RwLock::new(FileState {
                config,
                dirty: false,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_with_recovery(path: &Path) -> Result<SystemConfig, Error> {
        let reason = match Self::load(path).await {
            Ok(config) => {
                tracing::debug!("Loaded datastore from {}", path.display());
                return Ok(config);
            }
            Err(LoadError::Unreadable(e)) => return Err(e),
            Err(LoadError::Corrupt(reason)) => reason,
        };

        tracing::warn!(
            "Datastore file {} is corrupted: {}. Attempting recovery from backup.",
            path.display(),
            reason
        );

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            tracing::warn!("No backup file found. Starting from the default configuration.");
            return Ok(SystemConfig::default());
        }

        match Self::load(&backup_path).await {
            Ok(config) => {
                tracing::info!("Recovered datastore from {}", backup_path.display());
                if let Err(e) = fs::copy(&backup_path, path).await {
                    tracing::error!("Failed to restore datastore file from backup: {}", e);
                }
                Ok(config)
            }
            Err(LoadError::Corrupt(e)) => {
                tracing::error!(
                    "Backup also corrupted: {}. Starting from the default configuration.",
                    e
                );
                Ok(SystemConfig::default())
            }
            Err(LoadError::Unreadable(e)) => Err(e),
        }
    }

    async fn load(path: &Path) -> Result<SystemConfig, LoadError> {
        if !path.exists() {
            tracing::debug!("Datastore file does not exist: {}", path.display());
            return Ok(SystemConfig::default());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            LoadError::Unreadable(Error::datastore(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        })?;

        let file: DatastoreFile =
            serde_json::from_str(&content).map_err(|e| LoadError::Corrupt(e.to_string()))?;

        if file.version != DATASTORE_FILE_VERSION {
            tracing::warn!(
                "Datastore file version mismatch: expected {}, got {}. Loading anyway.",
                DATASTORE_FILE_VERSION,
                file.version
            );
        }

        Ok(file.config)
    }

    /// Write `config` atomically
    async fn write(&self, config: &SystemConfig) -> Result<(), Error> {
        let document = DatastoreFile {
            version: DATASTORE_FILE_VERSION.to_string(),
            updated: Utc::now(),
            config: config.clone(),
        };
        let json = serde_json::to_string_pretty(&document)?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::datastore(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::datastore(format!(
                    "Failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.sync_all().await.map_err(|e| {
                Error::datastore(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            if let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await {
                tracing::warn!("Failed to create datastore backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::datastore(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Datastore written to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl Datastore for FileDatastore {
    async fn running(&self) -> Result<SystemConfig, Error> {
        Ok(self.state.read().await.config.clone())
    }

    async fn commit(&self, config: &SystemConfig) -> Result<(), Error> {
        let mut state = self.state.write().await;
        match self.write(config).await {
            Ok(()) => {
                state.config = config.clone();
                state.dirty = false;
                Ok(())
            }
            Err(e) => {
                state.dirty = true;
                Err(e)
            }
        }
    }

    async fn flush(&self) -> Result<(), Error> {
        let mut state = self.state.write().await;
        if state.dirty {
            self.write(&state.config).await?;
            state.dirty = false;
        }
        Ok(())
    }
}
