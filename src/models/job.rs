use serde::{Deserialize, Serialize};

use crate::models::provider::ProviderId;

/// 单个作业的开关
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFlags {
    /// 只登录 + 查询，不下载
    #[serde(default)]
    pub dry_run: bool,
}

/// 一个作业：某供应商的一张发票
///
/// 由表格解析产生，创建后不可变，只会被 Job Runner 消费一次
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub provider: ProviderId,
    /// 只含数字的发票号
    pub invoice_number: String,
    /// 原始行引用，用于追溯
    pub raw_row_reference: String,
    #[serde(default)]
    pub flags: JobFlags,
}

impl Job {
    pub fn new(
        provider: ProviderId,
        invoice_number: impl Into<String>,
        raw_row_reference: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            invoice_number: invoice_number.into(),
            raw_row_reference: raw_row_reference.into(),
            flags: JobFlags::default(),
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.flags.dry_run = dry_run;
        self
    }
}
