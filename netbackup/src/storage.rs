//! Persistence of captured configurations.

use std::future::Future;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{Result, StorageError};

/// Destination for captured configuration text.
pub trait ConfigStore: Send + Sync {
    /// Store `text` as the configuration of device `name` and return where
    /// it went.
    fn save(&self, name: &str, text: &str) -> impl Future<Output = Result<PathBuf>> + Send;
}

/// Writes `<dir>/<name>.cfg` files.
#[derive(Debug, Clone)]
pub struct FsConfigStore {
    dir: PathBuf,
}

impl FsConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File a device's configuration is written to.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.cfg"))
    }
}

impl ConfigStore for FsConfigStore {
    async fn save(&self, name: &str, text: &str) -> Result<PathBuf> {
        let path = self.path_for(name);
        let write_error = |source| StorageError::Write {
            path: path.clone(),
            source,
        };

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(write_error)?;

        let mut body = text.replace('\r', "");
        body.push('\n');

        tokio::fs::write(&path, body).await.map_err(write_error)?;
        debug!("wrote {} bytes to {}", text.len(), path.display());
        Ok(path)
    }
}
