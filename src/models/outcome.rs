use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::models::job::Job;
use crate::models::provider::ProviderId;

/// 单个作业的终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// 已下载，artifact_path 必有值
    Success,
    /// dry-run：已在门户中找到，未下载
    Found,
    /// 门户中不存在该发票（正常业务结果）
    NotFound,
    LoginFailed,
    DownloadFailed,
    Skipped,
}

impl JobStatus {
    /// 计入 `failed` 的状态
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            JobStatus::LoginFailed | JobStatus::DownloadFailed | JobStatus::Skipped
        )
    }
}

/// 单个作业的处理结果，创建后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub provider: ProviderId,
    pub invoice_number: String,
    pub raw_row_reference: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_reference: Option<PathBuf>,
    pub retries: u32,
    pub duration_ms: u64,
}

impl JobOutcome {
    /// 下载成功
    pub fn success(job: &Job, artifact_path: PathBuf, retries: u32, duration: Duration) -> Self {
        Self {
            provider: job.provider,
            invoice_number: job.invoice_number.clone(),
            raw_row_reference: job.raw_row_reference.clone(),
            status: JobStatus::Success,
            error_kind: None,
            artifact_path: Some(artifact_path),
            error_detail: None,
            screenshot_reference: None,
            retries,
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// 非成功结果；detail 为空时使用分类的默认描述
    pub fn unsuccessful(
        job: &Job,
        status: JobStatus,
        kind: ErrorKind,
        detail: impl Into<String>,
        retries: u32,
        duration: Duration,
    ) -> Self {
        debug_assert!(status != JobStatus::Success);
        let detail = detail.into();
        let detail = if detail.trim().is_empty() {
            kind.describe().to_string()
        } else {
            detail
        };

        Self {
            provider: job.provider,
            invoice_number: job.invoice_number.clone(),
            raw_row_reference: job.raw_row_reference.clone(),
            status,
            error_kind: Some(kind),
            artifact_path: None,
            error_detail: Some(detail),
            screenshot_reference: None,
            retries,
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// dry-run 命中：只分析，不下载，也不带错误分类
    pub fn found(job: &Job, retries: u32, duration: Duration) -> Self {
        Self {
            provider: job.provider,
            invoice_number: job.invoice_number.clone(),
            raw_row_reference: job.raw_row_reference.clone(),
            status: JobStatus::Found,
            error_kind: None,
            artifact_path: None,
            error_detail: Some("dry run: invoice found, download skipped".to_string()),
            screenshot_reference: None,
            retries,
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// 未执行的作业
    pub fn skipped(job: &Job, reason: impl Into<String>) -> Self {
        Self::unsuccessful(
            job,
            JobStatus::Skipped,
            ErrorKind::Skipped,
            reason,
            0,
            Duration::ZERO,
        )
    }

    /// 附加失败截图（只在构造阶段使用）
    pub fn with_screenshot(mut self, screenshot: Option<PathBuf>) -> Self {
        if self.status != JobStatus::Success {
            self.screenshot_reference = screenshot;
        }
        self
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// 检查结果不变量：成功必有产物，非成功必有错误描述
    pub fn is_consistent(&self) -> bool {
        match self.status {
            JobStatus::Success => {
                self.artifact_path
                    .as_ref()
                    .is_some_and(|p| !p.as_os_str().is_empty())
                    && self.error_detail.is_none()
            }
            _ => {
                self.artifact_path.is_none()
                    && self
                        .error_detail
                        .as_ref()
                        .is_some_and(|d| !d.trim().is_empty())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new(ProviderId::Suizo, "12345678", "row 3: A-0001-12345678")
    }

    #[test]
    fn test_unsuccessful_uses_default_detail() {
        let outcome = JobOutcome::unsuccessful(
            &job(),
            JobStatus::NotFound,
            ErrorKind::NotFound,
            "  ",
            0,
            Duration::from_millis(1500),
        );
        assert_eq!(outcome.error_detail.as_deref(), Some("invoice not found in portal"));
        assert_eq!(outcome.duration_ms, 1500);
        assert!(outcome.is_consistent());
    }

    #[test]
    fn test_success_ignores_screenshot() {
        let outcome = JobOutcome::success(&job(), PathBuf::from("/tmp/12345678.txt"), 1, Duration::ZERO)
            .with_screenshot(Some(PathBuf::from("/tmp/shot.png")));
        assert!(outcome.screenshot_reference.is_none());
        assert!(outcome.is_consistent());
    }
}
