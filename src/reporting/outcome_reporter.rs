//! 结果汇总
//!
//! 收集每个作业的 JobOutcome，维护执行日志，最后生成 ExecutionReport。
//! 不负责持久化产物，只给出本地路径，由存储层转换成 URL。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::warn;

use crate::models::{
    ExecutionReport, ExecutionStatus, JobOutcome, JobStatus, OutcomeCounts, ProviderId,
};
use crate::reporting::execution_log::{ExecutionLog, LogLevel};

/// 由开始时间生成执行 ID：`YYYYMMDD_HHMMSS`
pub fn execution_id_for(started_at: &DateTime<Local>) -> String {
    started_at.format("%Y%m%d_%H%M%S").to_string()
}

pub struct OutcomeReporter {
    execution_id: String,
    started_at: DateTime<Local>,
    work_dir: PathBuf,
    outcomes: Vec<JobOutcome>,
    log: ExecutionLog,
}

impl OutcomeReporter {
    pub fn start(work_dir: impl Into<PathBuf>) -> Self {
        let started_at = Local::now();
        let mut reporter = Self {
            execution_id: execution_id_for(&started_at),
            started_at,
            work_dir: work_dir.into(),
            outcomes: Vec::new(),
            log: ExecutionLog::new(),
        };
        let id = reporter.execution_id.clone();
        reporter.info(None, format!("execution {} started", id));
        reporter
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn info(&mut self, scope: Option<ProviderId>, message: impl AsRef<str>) {
        self.log.push(LogLevel::Info, scope, message);
    }

    pub fn warn(&mut self, scope: Option<ProviderId>, message: impl AsRef<str>) {
        self.log.push(LogLevel::Warn, scope, message);
    }

    pub fn error(&mut self, scope: Option<ProviderId>, message: impl AsRef<str>) {
        self.log.push(LogLevel::Error, scope, message);
    }

    /// 记录一个作业的终态（顺序即处理顺序）
    pub fn record(&mut self, outcome: JobOutcome) {
        let scope = Some(outcome.provider);
        let line = match outcome.status {
            JobStatus::Success => format!(
                "invoice {}: success ({})",
                outcome.invoice_number,
                outcome
                    .artifact_path
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            ),
            JobStatus::Found => format!("invoice {}: found (dry run)", outcome.invoice_number),
            status => format!(
                "invoice {}: {:?} - {}",
                outcome.invoice_number,
                status,
                outcome.error_detail.as_deref().unwrap_or_default()
            ),
        };

        if outcome.status.is_failure() {
            self.error(scope, line);
        } else {
            self.info(scope, line);
        }
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[JobOutcome] {
        &self.outcomes
    }

    pub fn counts(&self) -> OutcomeCounts {
        OutcomeCounts::tally(&self.outcomes)
    }

    /// 生成最终报告并写出执行日志
    pub async fn finish(mut self, status: ExecutionStatus) -> ExecutionReport {
        let counts = self.counts();
        let summary = format!(
            "execution {} finished: {:?}, processed={} successful={} analyzed={} not_found={} failed={}",
            self.execution_id,
            status,
            counts.processed,
            counts.successful,
            counts.analyzed,
            counts.not_found,
            counts.failed
        );
        self.info(None, summary);

        let mut by_provider: BTreeMap<ProviderId, OutcomeCounts> = BTreeMap::new();
        for provider in self.outcomes.iter().map(|o| o.provider) {
            by_provider.entry(provider).or_insert_with(|| {
                OutcomeCounts::tally(self.outcomes.iter().filter(|o| o.provider == provider))
            });
        }

        let screenshot_references = self
            .outcomes
            .iter()
            .filter_map(|o| o.screenshot_reference.clone())
            .collect();

        let log_reference = self.write_log().await;

        ExecutionReport {
            execution_id: self.execution_id,
            status,
            started_at: self.started_at,
            finished_at: Local::now(),
            processed: counts.processed,
            successful: counts.successful,
            analyzed: counts.analyzed,
            not_found: counts.not_found,
            failed: counts.failed,
            by_provider,
            details: self.outcomes,
            log_reference,
            screenshot_references,
        }
    }

    /// 同一秒内启动的执行共用 ID，日志文件名追加序号避免覆盖
    async fn write_log(&self) -> Option<PathBuf> {
        let path = unused_log_path(&self.work_dir, &self.execution_id).await;
        match self.log.write_to(&path).await {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("写入执行日志失败 {}: {}", path.display(), e);
                None
            }
        }
    }
}

async fn unused_log_path(dir: &Path, execution_id: &str) -> PathBuf {
    let mut path = dir.join(format!("execution_{}.log", execution_id));
    let mut n = 2;
    while tokio::fs::try_exists(&path).await.unwrap_or(false) {
        path = dir.join(format!("execution_{}_{}.log", execution_id, n));
        n += 1;
    }
    path
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::ErrorKind;
    use crate::models::Job;

    #[test]
    fn test_execution_id_format() {
        let at = Local::now();
        let id = execution_id_for(&at);
        assert_eq!(id.len(), 15);
        assert_eq!(&id[8..9], "_");
        assert!(id.chars().filter(|c| *c != '_').all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_finish_builds_consistent_report() {
        let dir = tempfile::tempdir().unwrap();
        let mut reporter = OutcomeReporter::start(dir.path());

        let ok = Job::new(ProviderId::Suizo, "1", "row 1: A-0001-1");
        let miss = Job::new(ProviderId::Monroe, "2", "row 2: A-0001-2");
        let bad = Job::new(ProviderId::Monroe, "3", "row 3: A-0001-3");
        reporter.record(JobOutcome::success(&ok, dir.path().join("1.txt"), 0, Duration::ZERO));
        reporter.record(JobOutcome::unsuccessful(
            &miss,
            JobStatus::NotFound,
            ErrorKind::NotFound,
            "",
            0,
            Duration::ZERO,
        ));
        reporter.record(
            JobOutcome::unsuccessful(
                &bad,
                JobStatus::DownloadFailed,
                ErrorKind::DownloadTimeout,
                "timed out",
                2,
                Duration::ZERO,
            )
            .with_screenshot(Some(dir.path().join("shot.png"))),
        );

        let report = reporter.finish(ExecutionStatus::Partial).await;

        assert!(report.is_consistent());
        assert_eq!((report.successful, report.not_found, report.failed), (1, 1, 1));
        assert_eq!(report.by_provider[&ProviderId::Monroe].processed, 2);
        assert_eq!(report.screenshot_references, vec![dir.path().join("shot.png")]);

        let log_path = report.log_reference.unwrap();
        let text = tokio::fs::read_to_string(&log_path).await.unwrap();
        assert!(text.contains("[ERROR] [Monroe] invoice 3"));
    }

    #[tokio::test]
    async fn test_log_file_names_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("execution_20240101_000000.log"), "")
            .await
            .unwrap();
        let path = unused_log_path(dir.path(), "20240101_000000").await;
        assert_eq!(path, dir.path().join("execution_20240101_000000_2.log"));
    }
}
