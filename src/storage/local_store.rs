use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::StorageError;
use crate::storage::blob_store::{BlobKind, BlobStore};

/// 本地目录存储，返回 `file://` URL
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 拒绝绝对路径和 `..`
    fn target(&self, kind: BlobKind, name: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(name);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::UploadFailed {
                name: name.to_string(),
                reason: "name must be a relative path".to_string(),
            });
        }
        Ok(self.root.join(kind.prefix()).join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, kind: BlobKind, bytes: Vec<u8>, name: &str) -> Result<String, StorageError> {
        let target = self.target(kind, name)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;

        let absolute = if target.is_absolute() {
            target
        } else {
            std::env::current_dir()?.join(target)
        };
        debug!("已保存产物: {}", absolute.display());
        Ok(format!("file://{}", absolute.display()))
    }
}
