//! 作业处理上下文
//!
//! 封装"我正在处理第几个作业、哪家供应商的哪张发票"

use std::fmt::Display;

use crate::models::{Job, ProviderId};

/// 作业处理上下文（仅用于日志与截图命名）
#[derive(Debug, Clone)]
pub struct JobCtx {
    /// 在本次执行中的序号（从1开始）
    pub index: usize,
    pub total: usize,
    pub provider: ProviderId,
    pub invoice_number: String,
}

impl JobCtx {
    pub fn new(index: usize, total: usize, job: &Job) -> Self {
        Self {
            index,
            total,
            provider: job.provider,
            invoice_number: job.invoice_number.clone(),
        }
    }

    /// 截图文件名中使用的标签
    pub fn label(&self) -> String {
        format!("{}_{}", self.provider.slug(), self.invoice_number)
    }
}

impl Display for JobCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[作业 {}/{} {} #{}]",
            self.index, self.total, self.provider, self.invoice_number
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_label() {
        let job = Job::new(ProviderId::DelSud, "4521", "row 2: B-0003-4521");
        let ctx = JobCtx::new(2, 5, &job);
        assert_eq!(ctx.label(), "del_sud_4521");
        assert!(ctx.to_string().starts_with("[作业 2/5 "));
    }
}
