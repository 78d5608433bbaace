//! 产物发布（边界层）
//!
//! 执行结束后把日志、截图、下载的文档交给 BlobStore。
//! 单个产物上传失败只记录日志，不影响其他产物。

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::StorageError;
use crate::models::{ExecutionReport, JobStatus};
use crate::storage::blob_store::{BlobKind, BlobStore};

/// 已发布产物的 URL
#[derive(Debug, Clone, Default, Serialize)]
pub struct PublishedArtifacts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_url: Option<String>,
    pub screenshot_urls: Vec<String>,
    /// `<供应商>/<发票号>` → 文档 URL
    pub document_urls: BTreeMap<String, String>,
    pub failed_uploads: usize,
}

pub async fn publish_report(store: &dyn BlobStore, report: &ExecutionReport) -> PublishedArtifacts {
    let date = report.started_at.format("%Y-%m-%d").to_string();
    let mut published = PublishedArtifacts::default();

    if let Some(log_path) = &report.log_reference {
        let name = format!("{}/{}", date, file_name(log_path));
        match upload_file(store, BlobKind::Log, log_path, &name).await {
            Ok(url) => published.log_url = Some(url),
            Err(e) => {
                warn!("⚠️ 执行日志上传失败: {}", e);
                published.failed_uploads += 1;
            }
        }
    }

    for outcome in &report.details {
        if let Some(shot) = &outcome.screenshot_reference {
            let name = format!("{}/{}/{}", date, outcome.provider.slug(), file_name(shot));
            match upload_file(store, BlobKind::Screenshot, shot, &name).await {
                Ok(url) => published.screenshot_urls.push(url),
                Err(e) => {
                    warn!("⚠️ 截图上传失败 {}: {}", shot.display(), e);
                    published.failed_uploads += 1;
                }
            }
        }

        if outcome.status != JobStatus::Success {
            continue;
        }
        let Some(document) = &outcome.artifact_path else {
            continue;
        };
        let slug = outcome.provider.slug();
        let name = format!("{}/{}/{}", date, slug, file_name(document));
        match upload_file(store, BlobKind::Document, document, &name).await {
            Ok(url) => {
                published
                    .document_urls
                    .insert(format!("{}/{}", slug, outcome.invoice_number), url);
            }
            Err(e) => {
                warn!("⚠️ 文档上传失败 {}: {}", document.display(), e);
                published.failed_uploads += 1;
            }
        }
    }

    info!(
        "✓ 产物发布完成: 文档 {} 个, 截图 {} 个, 失败 {} 个",
        published.document_urls.len(),
        published.screenshot_urls.len(),
        published.failed_uploads
    );
    published
}

async fn upload_file(
    store: &dyn BlobStore,
    kind: BlobKind,
    path: &Path,
    name: &str,
) -> Result<String, StorageError> {
    let bytes = tokio::fs::read(path).await?;
    store.put(kind, bytes, name).await
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "artifact".to_string())
}
