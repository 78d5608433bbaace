//! # Arg TXT Downloader
//!
//! 从医药供应商门户（Suizo、Del Sud、Monroe）自动下载发票 TXT 文件
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Browser / Page），只暴露导航原语
//! - `SessionDriver` - open / navigate / fill / click / wait_for / download / screenshot / close
//! - `ChromeDriver` - 基于 chromiumoxide 的实现
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 每个门户一个 `ProviderAdapter`：login / search_invoice / download_document
//! - `CredentialProvider` - 只读凭据
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个作业"的处理流程（search → download，瞬时错误重试）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/job_runner` - 核心入口 `process(jobs, options) -> ExecutionReport`
//! - `orchestrator/app` - 应用外壳：浏览器、作业文件、产物发布
//!
//! ### ⑤ 结果与存储
//! - `reporting/` - 结果分类、执行日志、失败截图
//! - `storage/` - BlobStore（本地目录 / HTTP）
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod reporting;
pub mod services;
pub mod storage;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AdapterError, AppError, DriverError, ErrorKind};
pub use infrastructure::{ChromeDriver, Selector, SessionDriver, SessionHandle};
pub use models::{ExecutionReport, ExecutionStatus, Job, JobOutcome, JobStatus, ProviderId};
pub use orchestrator::{App, JobRunner, ProcessOptions, RunPolicy};
pub use services::{AdapterRegistry, CredentialProvider, ProviderAdapter, SearchResult};
