//! 供应商适配器能力接口
//!
//! 每个门户一个实现，只描述"我能做什么"：login / search_invoice / download_document。
//! 不持有会话，会话句柄由编排层传入。

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{AdapterError, AdapterResult, DriverError, DriverResult};
use crate::infrastructure::{Selector, SessionDriver, SessionHandle};
use crate::models::{Credentials, ProviderId};

/// 搜索命中的行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowReference {
    pub invoice_number: String,
    /// 结果表中该发票所在行
    pub row_selector: Selector,
}

impl RowReference {
    pub fn new(invoice_number: impl Into<String>, row_selector: Selector) -> Self {
        Self {
            invoice_number: invoice_number.into(),
            row_selector,
        }
    }
}

/// 搜索结果；`NotFound` 是正常的业务结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchResult {
    Found(RowReference),
    NotFound,
}

/// 供应商门户适配器
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> ProviderId;

    /// 登录状态是否跨执行保存（避免每次登录都触发验证码）
    fn persists_session(&self) -> bool {
        false
    }

    /// 登录
    ///
    /// 提交前缺少元素 → `LoginUnavailable`；提交后没有成功标志 → `LoginFailed`
    async fn login(
        &self,
        driver: &dyn SessionDriver,
        handle: &SessionHandle,
        credentials: &Credentials,
    ) -> AdapterResult<()>;

    async fn search_invoice(
        &self,
        driver: &dyn SessionDriver,
        handle: &SessionHandle,
        invoice_number: &str,
    ) -> AdapterResult<SearchResult>;

    /// 下载文档，返回本地路径
    async fn download_document(
        &self,
        driver: &dyn SessionDriver,
        handle: &SessionHandle,
        row: &RowReference,
    ) -> AdapterResult<PathBuf>;
}

/// 返回第一个当前可见的选择器
pub(crate) async fn first_visible<'a>(
    driver: &dyn SessionDriver,
    handle: &SessionHandle,
    candidates: &'a [Selector],
) -> DriverResult<Option<&'a Selector>> {
    for selector in candidates {
        if driver.is_visible(handle, selector).await? {
            return Ok(Some(selector));
        }
    }
    Ok(None)
}

/// 提交凭据之前的失败：浏览器崩溃照常上抛，其余都算门户不可用
pub(crate) fn before_submit(err: DriverError) -> AdapterError {
    if err.is_fatal() {
        err.into()
    } else {
        AdapterError::login_unavailable(err.to_string())
    }
}

/// 门户操作之间的停顿
pub(crate) async fn settle(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// 把下载文件重命名为 `<发票号>.txt`
pub(crate) async fn save_as_txt(downloaded: &Path, invoice_number: &str) -> AdapterResult<PathBuf> {
    let dir = downloaded.parent().unwrap_or_else(|| Path::new("."));
    let target = dir.join(format!("{}.txt", invoice_number));

    if downloaded == target {
        return Ok(target);
    }

    let size = tokio::fs::metadata(downloaded)
        .await
        .map_err(|e| AdapterError::download_failed(format!("downloaded file missing: {}", e)))?
        .len();
    if size == 0 {
        return Err(AdapterError::download_failed("downloaded file is empty"));
    }

    tokio::fs::rename(downloaded, &target)
        .await
        .map_err(|e| AdapterError::download_failed(format!("cannot rename download: {}", e)))?;
    debug!("文件已保存: {}", target.display());
    Ok(target)
}
