//! 作业文件加载
//!
//! 表格导出的行（供应商、单据、备注）→ `Vec<Job>`

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use tokio::fs;
use tracing::{info, warn};

use crate::error::JobFileError;
use crate::models::job::Job;
use crate::models::provider::ProviderId;

/// 需要下载 TXT 的行的备注值
const OBSERVATION_FILTER: &str = "Cargar txt";

/// 作业文件中的一行
#[derive(Debug, Clone, Deserialize)]
pub struct JobRow {
    pub provider: String,
    /// 完整单据号，例如 `A-0012-00045678`
    pub document: String,
    #[serde(default)]
    pub observation: String,
    /// 表格中的行号
    #[serde(default)]
    pub row: Option<usize>,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Deserialize)]
struct JobFile {
    #[serde(default)]
    rows: Vec<JobRow>,
}

fn document_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Z]-\d{4}-(\d+)$").ok())
        .as_ref()
}

/// 从单据号中提取发票号
///
/// `A-XXXX-YYYYYYYY` → `YYYYYYYY`；格式不符时，若至少有三段则取最后一段。
/// 结果必须全部是数字。
pub fn extract_invoice_number(document: &str) -> Option<String> {
    let document = document.trim();
    if document.is_empty() {
        return None;
    }

    let candidate = match document_pattern().and_then(|re| re.captures(document)) {
        Some(caps) => caps.get(1).map(|m| m.as_str().to_string()),
        None => {
            let parts: Vec<&str> = document.split('-').collect();
            if parts.len() >= 3 {
                parts.last().map(|s| s.trim().to_string())
            } else {
                None
            }
        }
    }?;

    if !candidate.is_empty() && candidate.chars().all(|c| c.is_ascii_digit()) {
        Some(candidate)
    } else {
        None
    }
}

/// 将行转换为作业，过滤掉不需要处理或无法解析的行
pub fn rows_to_jobs(rows: &[JobRow]) -> Vec<Job> {
    let mut jobs = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        let row_number = row.row.unwrap_or(index + 1);

        if !row
            .observation
            .trim()
            .eq_ignore_ascii_case(OBSERVATION_FILTER)
        {
            continue;
        }

        let Some(provider) = ProviderId::from_name(&row.provider) else {
            warn!("跳过第 {} 行: 未知供应商 '{}'", row_number, row.provider);
            continue;
        };

        let Some(invoice_number) = extract_invoice_number(&row.document) else {
            warn!("跳过第 {} 行: 单据格式无效 '{}'", row_number, row.document);
            continue;
        };

        let reference = format!("row {}: {}", row_number, row.document.trim());
        jobs.push(Job::new(provider, invoice_number, reference).with_dry_run(row.dry_run));
    }

    jobs
}

/// 解析作业文件内容
pub fn parse_job_file(content: &str, path: &Path) -> Result<Vec<Job>, JobFileError> {
    let file: JobFile = toml::from_str(content).map_err(|source| JobFileError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(rows_to_jobs(&file.rows))
}

/// 从 TOML 作业文件加载作业列表
pub async fn load_jobs(path: &Path) -> Result<Vec<Job>, JobFileError> {
    if !path.exists() {
        return Err(JobFileError::NotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path)
        .await
        .map_err(|source| JobFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let jobs = parse_job_file(&content, path)?;

    info!(
        "✓ 作业文件 {} 解析完成: {} 个作业",
        path.file_name().unwrap_or_default().to_string_lossy(),
        jobs.len()
    );
    for provider in ProviderId::ALL {
        let count = jobs.iter().filter(|j| j.provider == provider).count();
        if count > 0 {
            info!("  - {}: {} 张发票", provider, count);
        }
    }

    Ok(jobs)
}
