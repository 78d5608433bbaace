use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::StorageError;
use crate::storage::blob_store::{BlobKind, BlobStore};

/// HTTP 对象存储：`PUT <base>/<prefix>/<name>`
pub struct HttpBlobStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpBlobStore {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, StorageError> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn object_url(&self, kind: BlobKind, name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            kind.prefix(),
            name.trim_start_matches('/')
        )
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn put(&self, kind: BlobKind, bytes: Vec<u8>, name: &str) -> Result<String, StorageError> {
        let url = self.object_url(kind, name);
        debug!("上传 {} ({} bytes)", url, bytes.len());

        let request = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, kind.content_type())
            .body(bytes);
        let response = self.apply_auth(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::UploadFailed {
                name: name.to_string(),
                reason: format!("HTTP {}: {}", status, body),
            });
        }
        Ok(url)
    }
}
