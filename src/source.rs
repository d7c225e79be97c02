//! Directory Source
//!
//! A [`Getter`] serving each key from the file of the same name in a
//! directory. The binary uses it as the source of truth behind its group.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use async_trait::async_trait;
use tracing::debug;

use crate::group::Getter;

#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolves `key` to a file directly inside the directory.
    fn path_for(&self, key: &str) -> anyhow::Result<PathBuf> {
        if key.is_empty() || key.contains(|c: char| c == '/' || c == '\\') || key.contains("..") {
            bail!("invalid key '{}'", key);
        }
        Ok(self.dir.join(key))
    }
}

#[async_trait]
impl Getter for DirectorySource {
    async fn get(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        let path = self.path_for(key)?;
        debug!("Reading '{}' from {}", key, path.display());
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))
    }
}
