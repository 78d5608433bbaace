use chromiumoxide::Browser;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::error::{DriverError, DriverResult};

/// 在后台处理浏览器事件，返回任务句柄
pub(crate) fn spawn_handler(mut handler: chromiumoxide::handler::Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                debug!("浏览器事件循环结束");
                break;
            }
        }
    })
}

/// 连接到已经运行的浏览器（带 `--remote-debugging-port` 启动）
///
/// 用于复用用户已登录的 Chrome 配置（Monroe 的验证码场景）
pub async fn connect_to_browser(port: u16) -> DriverResult<(Browser, JoinHandle<()>)> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);

    let (browser, handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        DriverError::Crashed(format!("cannot connect to {}: {}", browser_url, e))
    })?;
    debug!("浏览器连接成功");

    let task = spawn_handler(handler);

    // 添加短暂延迟以等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    Ok((browser, task))
}
