//! 失败截图
//!
//! Job Runner 在失败转移时调用；截图失败只记录，不影响作业结果。

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Local;
use tracing::debug;

use crate::error::DriverResult;
use crate::infrastructure::{SessionDriver, SessionHandle};

#[async_trait]
pub trait FailureCapture: Send + Sync {
    /// 截图并返回保存位置
    async fn capture(
        &self,
        driver: &dyn SessionDriver,
        handle: &SessionHandle,
        label: &str,
    ) -> DriverResult<PathBuf>;
}

/// 将 PNG 截图写入执行目录
pub struct ScreenshotCapture {
    dir: PathBuf,
}

impl ScreenshotCapture {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_name(label: &str) -> String {
        let safe: String = label
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        format!("screenshot_{}_{}.png", safe, Local::now().format("%Y%m%d_%H%M%S%3f"))
    }
}

#[async_trait]
impl FailureCapture for ScreenshotCapture {
    async fn capture(
        &self,
        driver: &dyn SessionDriver,
        handle: &SessionHandle,
        label: &str,
    ) -> DriverResult<PathBuf> {
        let bytes = driver.screenshot(handle).await?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.dir.join(Self::file_name(label));
        tokio::fs::write(&path, bytes).await?;
        debug!("截图已保存: {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_is_sanitized() {
        let name = ScreenshotCapture::file_name("suizo_123/45 x");
        assert!(name.starts_with("screenshot_suizo_123_45_x_"));
        assert!(name.ends_with(".png"));
    }
}
