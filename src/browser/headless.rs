use std::path::{Path, PathBuf};

use chromiumoxide::{Browser, BrowserConfig};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::browser::connection::spawn_handler;
use crate::error::{DriverError, DriverResult};

/// 启动参数
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub chrome_executable: Option<PathBuf>,
    /// 独立的用户数据目录，保证并发执行之间不共享浏览器状态
    pub user_data_dir: PathBuf,
}

/// 启动一个新的浏览器实例
pub async fn launch_browser(options: &LaunchOptions) -> DriverResult<(Browser, JoinHandle<()>)> {
    info!("🚀 启动浏览器 (headless={})...", options.headless);

    let mut builder = BrowserConfig::builder()
        .user_data_dir(&options.user_data_dir)
        .window_size(1920, 1080)
        .args(vec![
            "--disable-blink-features=AutomationControlled",
            "--disable-dev-shm-usage", // 防止共享内存不足
            "--no-sandbox",            // 容器内没有沙盒权限
            "--disable-gpu",
        ]);

    builder = if options.headless {
        builder.new_headless_mode()
    } else {
        builder.with_head()
    };

    if let Some(path) = options.chrome_executable.as_deref() {
        debug!("使用浏览器: {}", path.display());
        builder = builder.chrome_executable(Path::new(path));
    }

    let config = builder.build().map_err(|e| {
        error!("配置浏览器失败: {}", e);
        DriverError::Protocol(format!("invalid browser config: {}", e))
    })?;

    let (browser, handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动浏览器失败: {}", e);
        DriverError::Crashed(format!("cannot launch browser: {}", e))
    })?;
    debug!("浏览器启动成功");

    let task = spawn_handler(handler);

    // 添加短暂延迟以等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    Ok((browser, task))
}
