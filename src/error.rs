use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::provider::ProviderId;

/// 对外可见的错误分类
///
/// `NotFound` 与 `Skipped` 不是错误，但同样出现在报告的 `error_kind` 中
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    LoginFailed,
    LoginUnavailable,
    NotFound,
    DownloadFailed,
    DownloadTimeout,
    ElementNotFound,
    NavigationTimeout,
    CredentialsMissing,
    Skipped,
}

impl ErrorKind {
    /// 默认描述，保证非成功结果总有 error_detail
    pub fn describe(self) -> &'static str {
        match self {
            ErrorKind::LoginFailed => "portal rejected the login",
            ErrorKind::LoginUnavailable => "portal login unavailable",
            ErrorKind::NotFound => "invoice not found in portal",
            ErrorKind::DownloadFailed => "document download failed",
            ErrorKind::DownloadTimeout => "document download timed out",
            ErrorKind::ElementNotFound => "expected page element not found",
            ErrorKind::NavigationTimeout => "page navigation timed out",
            ErrorKind::CredentialsMissing => "credentials not configured",
            ErrorKind::Skipped => "job skipped",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        write!(f, "{}", text)
    }
}

/// 会话驱动错误（浏览器层）
#[derive(Debug, Error)]
pub enum DriverError {
    /// 选择器在超时内未解析到元素
    #[error("element not found: {selector}")]
    ElementNotFound { selector: String },

    /// 页面未能在超时内稳定
    #[error("navigation timed out: {url}")]
    NavigationTimeout { url: String },

    /// 下载未在超时内完成
    #[error("download did not complete within {waited_secs}s")]
    DownloadTimeout { waited_secs: u64 },

    /// 会话已关闭或从未打开
    #[error("session {session} is closed")]
    SessionClosed { session: u64 },

    /// 浏览器连接断开 / 进程崩溃
    #[error("browser crashed: {0}")]
    Crashed(String),

    /// CDP 协议层错误
    #[error("browser protocol error: {0}")]
    Protocol(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriverError {
    /// 可在同一会话内重试的错误
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DriverError::ElementNotFound { .. }
                | DriverError::NavigationTimeout { .. }
                | DriverError::DownloadTimeout { .. }
        )
    }

    /// 会话不可恢复，整个执行需要中止
    pub fn is_fatal(&self) -> bool {
        matches!(self, DriverError::Crashed(_) | DriverError::SessionClosed { .. })
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DriverError::ElementNotFound { .. } => ErrorKind::ElementNotFound,
            DriverError::NavigationTimeout { .. } => ErrorKind::NavigationTimeout,
            DriverError::DownloadTimeout { .. } => ErrorKind::DownloadTimeout,
            _ => ErrorKind::DownloadFailed,
        }
    }
}

impl From<chromiumoxide::error::CdpError> for DriverError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        use chromiumoxide::error::CdpError;
        match err {
            CdpError::Ws(e) => DriverError::Crashed(e.to_string()),
            CdpError::ChannelSendError(e) => DriverError::Crashed(e.to_string()),
            CdpError::NoResponse => DriverError::Crashed("no response from browser".to_string()),
            CdpError::Io(e) => DriverError::Io(e),
            other => DriverError::Protocol(other.to_string()),
        }
    }
}

/// 供应商适配器错误
#[derive(Debug, Error)]
pub enum AdapterError {
    /// 凭据被拒绝（提交后未出现登录成功标志）
    #[error("login failed: {reason}")]
    LoginFailed { reason: String },

    /// 门户不可达或结构变化（提交前就缺少元素）
    #[error("login unavailable: {reason}")]
    LoginUnavailable { reason: String },

    /// 文件没有生成，或门户表示没有 TXT
    #[error("download failed: {reason}")]
    DownloadFailed { reason: String },

    /// 会话已失效（被重定向回登录页）
    #[error("portal session is no longer valid")]
    SessionInvalid,

    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl AdapterError {
    pub fn login_failed(reason: impl Into<String>) -> Self {
        AdapterError::LoginFailed {
            reason: reason.into(),
        }
    }

    pub fn login_unavailable(reason: impl Into<String>) -> Self {
        AdapterError::LoginUnavailable {
            reason: reason.into(),
        }
    }

    pub fn download_failed(reason: impl Into<String>) -> Self {
        AdapterError::DownloadFailed {
            reason: reason.into(),
        }
    }

    /// 搜索 / 下载阶段可以重试
    pub fn is_transient(&self) -> bool {
        matches!(self, AdapterError::Driver(e) if e.is_transient())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, AdapterError::Driver(e) if e.is_fatal())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AdapterError::LoginFailed { .. } => ErrorKind::LoginFailed,
            AdapterError::LoginUnavailable { .. } => ErrorKind::LoginUnavailable,
            AdapterError::DownloadFailed { .. } => ErrorKind::DownloadFailed,
            AdapterError::SessionInvalid => ErrorKind::LoginUnavailable,
            AdapterError::Driver(e) => e.kind(),
        }
    }
}

/// 凭据未配置
#[derive(Debug, Clone, Error)]
#[error("credentials missing for {provider}")]
pub struct CredentialsMissing {
    pub provider: ProviderId,
}

/// 产物存储错误
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("upload of {name} failed: {reason}")]
    UploadFailed { name: String, reason: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// 作业文件错误
#[derive(Debug, Error)]
pub enum JobFileError {
    #[error("job file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("cannot read job file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse job file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// 应用层错误
#[derive(Debug, Error)]
pub enum AppError {
    #[error("浏览器错误: {0}")]
    Browser(#[from] DriverError),

    #[error("作业文件错误: {0}")]
    Jobs(#[from] JobFileError),

    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),

    #[error("配置错误: {0}")]
    Config(String),
}

/// 驱动层结果类型
pub type DriverResult<T> = Result<T, DriverError>;

/// 适配器结果类型
pub type AdapterResult<T> = Result<T, AdapterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let timeout = AdapterError::from(DriverError::DownloadTimeout { waited_secs: 60 });
        assert!(timeout.is_transient());
        assert_eq!(timeout.kind(), ErrorKind::DownloadTimeout);

        let crashed = AdapterError::from(DriverError::Crashed("ws closed".into()));
        assert!(!crashed.is_transient());
        assert!(crashed.is_fatal());

        assert!(!AdapterError::download_failed("no txt").is_transient());
        assert!(!AdapterError::login_failed("bad password").is_transient());
    }

    #[test]
    fn test_error_kind_display_is_snake_case() {
        assert_eq!(ErrorKind::CredentialsMissing.to_string(), "credentials_missing");
        assert_eq!(ErrorKind::NotFound.to_string(), "not_found");
    }
}
