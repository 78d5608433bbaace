use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::models::outcome::{JobOutcome, JobStatus};
use crate::models::provider::ProviderId;

/// 整次执行的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// 没有失败的作业
    Completed,
    /// 至少一个作业失败
    Partial,
    /// 触发执行级超时，剩余作业被跳过
    TimedOut,
    /// 会话驱动崩溃，剩余作业被跳过
    Aborted,
}

/// 计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub processed: usize,
    pub successful: usize,
    /// dry-run 中找到的发票
    pub analyzed: usize,
    pub not_found: usize,
    pub failed: usize,
}

impl OutcomeCounts {
    pub fn tally<'a>(outcomes: impl IntoIterator<Item = &'a JobOutcome>) -> Self {
        let mut counts = Self::default();
        for outcome in outcomes {
            counts.processed += 1;
            match outcome.status {
                JobStatus::Success => counts.successful += 1,
                JobStatus::Found => counts.analyzed += 1,
                JobStatus::NotFound => counts.not_found += 1,
                JobStatus::LoginFailed | JobStatus::DownloadFailed | JobStatus::Skipped => {
                    counts.failed += 1
                }
            }
        }
        counts
    }
}

/// 一次执行的汇总报告，由 Job Runner 完成后产出，之后不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// `YYYYMMDD_HHMMSS`
    pub execution_id: String,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub processed: usize,
    pub successful: usize,
    pub analyzed: usize,
    pub not_found: usize,
    pub failed: usize,
    pub by_provider: BTreeMap<ProviderId, OutcomeCounts>,
    /// 顺序 = 作业处理顺序
    pub details: Vec<JobOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_reference: Option<PathBuf>,
    pub screenshot_references: Vec<PathBuf>,
}

impl ExecutionReport {
    /// 计数不变量
    pub fn is_consistent(&self) -> bool {
        self.processed == self.details.len()
            && self.successful + self.analyzed + self.not_found + self.failed == self.processed
            && self.details.iter().all(JobOutcome::is_consistent)
    }

    /// 成功率（百分比字符串，供前端展示）
    pub fn success_rate(&self) -> String {
        if self.processed == 0 {
            return "0%".to_string();
        }
        format!(
            "{:.1}%",
            self.successful as f64 / self.processed as f64 * 100.0
        )
    }

    /// 失败作业的发票号
    pub fn failed_invoices(&self) -> Vec<&str> {
        self.details
            .iter()
            .filter(|d| d.status.is_failure())
            .map(|d| d.invoice_number.as_str())
            .collect()
    }
}
