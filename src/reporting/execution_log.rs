//! 执行日志
//!
//! 整次执行的文字日志，同时输出到 tracing。
//! 行格式：`[<rfc3339>] [<LEVEL>] [<provider|core>] <message>`

use std::path::Path;

use chrono::Local;
use tracing::{error, info, warn};

use crate::models::ProviderId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ExecutionLog {
    lines: Vec<String>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, level: LogLevel, scope: Option<ProviderId>, message: impl AsRef<str>) {
        let message = message.as_ref();
        let scope = scope.map(|p| p.name()).unwrap_or("core");

        match level {
            LogLevel::Info => info!("[{}] {}", scope, message),
            LogLevel::Warn => warn!("[{}] {}", scope, message),
            LogLevel::Error => error!("[{}] {}", scope, message),
        }

        self.lines.push(format!(
            "[{}] [{}] [{}] {}",
            Local::now().to_rfc3339(),
            level.as_str(),
            scope,
            message
        ));
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }

    pub async fn write_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, self.render()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_format() {
        let mut log = ExecutionLog::new();
        log.push(LogLevel::Warn, Some(ProviderId::Monroe), "session expired");
        log.push(LogLevel::Info, None, "done");

        let first = &log.lines()[0];
        assert!(first.starts_with('['));
        assert!(first.ends_with("] [WARN] [Monroe] session expired"));
        assert!(log.lines()[1].ends_with("[INFO] [core] done"));
    }
}
