//! 作业处理流程 - 流程层
//!
//! 定义"一个作业"在已登录会话上的处理顺序：
//! 1. search_invoice → NotFound 直接结束
//! 2. dry-run 命中 → Found，不下载
//! 3. download_document → 本地文件
//!
//! 查询 + 下载算一次尝试；瞬时错误（导航 / 元素 / 下载超时）在同一会话内重试。

use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::AdapterError;
use crate::infrastructure::{SessionDriver, SessionHandle};
use crate::services::{ProviderAdapter, SearchResult};
use crate::workflow::job_ctx::JobCtx;

/// 流程结果
#[derive(Debug)]
pub enum FlowResult {
    Downloaded(PathBuf),
    /// dry-run 命中
    Found,
    NotFound,
    Failed(AdapterError),
}

/// 流程结果 + 消耗的重试次数
#[derive(Debug)]
pub struct FlowReport {
    pub result: FlowResult,
    pub retries: u32,
}

/// 单个作业的处理流程
///
/// 不持有会话，也不关心登录
pub struct JobFlow {
    max_retries: u32,
    retry_delay: Duration,
}

impl JobFlow {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }

    pub async fn run(
        &self,
        driver: &dyn SessionDriver,
        adapter: &dyn ProviderAdapter,
        handle: &SessionHandle,
        invoice_number: &str,
        dry_run: bool,
        ctx: &JobCtx,
    ) -> FlowReport {
        let mut retries = 0;

        loop {
            match self
                .attempt(driver, adapter, handle, invoice_number, dry_run, ctx)
                .await
            {
                Ok(result) => return FlowReport { result, retries },
                Err(e) if e.is_transient() && retries < self.max_retries => {
                    retries += 1;
                    warn!(
                        "{} ⚠️ {}，第 {}/{} 次重试",
                        ctx, e, retries, self.max_retries
                    );
                    if !self.retry_delay.is_zero() {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
                Err(e) => {
                    return FlowReport {
                        result: FlowResult::Failed(e),
                        retries,
                    }
                }
            }
        }
    }

    async fn attempt(
        &self,
        driver: &dyn SessionDriver,
        adapter: &dyn ProviderAdapter,
        handle: &SessionHandle,
        invoice_number: &str,
        dry_run: bool,
        ctx: &JobCtx,
    ) -> Result<FlowResult, AdapterError> {
        info!("{} 🔍 查询发票...", ctx);
        let row = match adapter.search_invoice(driver, handle, invoice_number).await? {
            SearchResult::Found(row) => row,
            SearchResult::NotFound => return Ok(FlowResult::NotFound),
        };

        if dry_run {
            info!("{} ✓ 已找到（dry-run，不下载）", ctx);
            return Ok(FlowResult::Found);
        }

        info!("{} 📥 下载文档...", ctx);
        let path = adapter.download_document(driver, handle, &row).await?;
        Ok(FlowResult::Downloaded(path))
    }
}
