//! 结果层：作业结果分类、执行日志、失败截图

pub mod execution_log;
pub mod failure_capture;
pub mod outcome_reporter;

pub use execution_log::{ExecutionLog, LogLevel};
pub use failure_capture::{FailureCapture, ScreenshotCapture};
pub use outcome_reporter::{execution_id_for, OutcomeReporter};
