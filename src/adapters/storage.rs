//! Blob storage adapters
//!
//! `LocalFileStorage` writes uploads under a root directory; `InMemoryStorage`
//! keeps them in a concurrent map.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, instrument};

use crate::domain::ports::StorageService;
use crate::error::{Error, Result};

/// Configuration for local blob storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory uploads are written under
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./media"),
        }
    }
}

// =============================================================================
// Local File Storage
// =============================================================================

/// Stores blobs as files below a root directory.
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            root: config.root.clone(),
        }
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if name.is_empty() || escapes {
            return Err(Error::Storage(format!("Invalid blob name: '{}'", name)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl StorageService for LocalFileStorage {
    #[instrument(skip(self, content), fields(bytes = content.len()))]
    async fn upload(&self, name: &str, content: Bytes, content_type: &str) -> Result<String> {
        let path = self.resolve(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, &content).await?;
        debug!(path = %path.display(), content_type, "Stored blob");
        Ok(name.to_string())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let path = self.resolve(path)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// In-Memory Storage
// =============================================================================

/// A stored blob.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub content: Bytes,
    pub content_type: String,
}

/// Blob storage kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    blobs: DashMap<String, StoredBlob>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.blobs.contains_key(path)
    }

    pub fn get(&self, path: &str) -> Option<StoredBlob> {
        self.blobs.get(path).map(|b| b.value().clone())
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl StorageService for InMemoryStorage {
    async fn upload(&self, name: &str, content: Bytes, content_type: &str) -> Result<String> {
        self.blobs.insert(
            name.to_string(),
            StoredBlob {
                content,
                content_type: content_type.to_string(),
            },
        );
        Ok(name.to_string())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.blobs.remove(path);
        Ok(())
    }
}
