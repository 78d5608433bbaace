use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// 产物类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlobKind {
    Log,
    Screenshot,
    Document,
}

impl BlobKind {
    /// 存储路径的顶层目录
    pub fn prefix(self) -> &'static str {
        match self {
            BlobKind::Log => "logs",
            BlobKind::Screenshot => "screenshots",
            BlobKind::Document => "documents",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            BlobKind::Log | BlobKind::Document => "text/plain; charset=utf-8",
            BlobKind::Screenshot => "image/png",
        }
    }
}

/// "存一个 blob，拿回 URL"
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// `name` 是相对路径（可含 `/`），返回可访问的 URL
    async fn put(&self, kind: BlobKind, bytes: Vec<u8>, name: &str) -> Result<String, StorageError>;
}
