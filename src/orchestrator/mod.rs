//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `app` - 应用外壳
//! - 管理应用生命周期（初始化、运行、清理）
//! - 唯一持有浏览器（ChromeDriver）
//! - 加载作业文件，发布产物，写出报告
//!
//! ### `job_runner` - 作业执行器
//! - 遍历作业列表，按供应商选择适配器
//! - 执行重试 / 超时策略
//! - 汇总 JobOutcome 生成 ExecutionReport
//!
//! ### `session_set` - 执行范围内的会话表
//! - 每个供应商一个会话，登录状态 NotStarted / Authenticated / Failed
//!
//! ## 层次关系
//!
//! ```text
//! app (作业文件 → 报告)
//!     ↓
//! job_runner (处理 Vec<Job>)
//!     ↓
//! workflow::JobFlow (处理单个 Job)
//!     ↓
//! services (能力层：ProviderAdapter)
//!     ↓
//! infrastructure (基础设施：SessionDriver)
//! ```

pub mod app;
pub mod job_runner;
pub mod session_set;

// 重新导出主要类型
pub use app::App;
pub use job_runner::{JobRunner, ProcessOptions, RunPolicy, EXECUTION_TIMED_OUT, PROVIDER_UNAVAILABLE};
pub use session_set::{AuthState, SessionSet};
