//! Chrome 会话驱动 - 基础设施层
//!
//! 唯一持有 Browser / Page 的地方。每个会话一个页面，一个下载目录。

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::network::{
    Cookie, CookieParam, SetCookiesParams, TimeSinceEpoch,
};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, Page};
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::browser::{self, LaunchOptions};
use crate::error::{DriverError, DriverResult};
use crate::infrastructure::session_driver::{Selector, SessionDriver, SessionHandle};
use crate::models::provider::ProviderId;

/// 驱动层超时设置
#[derive(Debug, Clone, Copy)]
pub struct DriverTimings {
    pub navigation_timeout: Duration,
    pub element_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for DriverTimings {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(60),
            element_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(250),
        }
    }
}

struct DriverSession {
    page: Page,
    download_dir: PathBuf,
}

/// 基于 chromiumoxide 的会话驱动
pub struct ChromeDriver {
    browser: Browser,
    handler_task: JoinHandle<()>,
    /// 自己启动的浏览器在结束时关闭；连接的浏览器保持运行
    owns_browser: bool,
    sessions: Mutex<HashMap<u64, DriverSession>>,
    next_id: AtomicU64,
    work_dir: PathBuf,
    timings: DriverTimings,
}

impl ChromeDriver {
    /// 启动新的浏览器
    pub async fn launch(
        options: &LaunchOptions,
        work_dir: impl Into<PathBuf>,
        timings: DriverTimings,
    ) -> DriverResult<Self> {
        let (browser, handler_task) = browser::launch_browser(options).await?;
        Ok(Self::new(browser, handler_task, true, work_dir.into(), timings))
    }

    /// 连接到调试端口上的浏览器
    pub async fn connect(
        port: u16,
        work_dir: impl Into<PathBuf>,
        timings: DriverTimings,
    ) -> DriverResult<Self> {
        let (browser, handler_task) = browser::connect_to_browser(port).await?;
        Ok(Self::new(browser, handler_task, false, work_dir.into(), timings))
    }

    fn new(
        browser: Browser,
        handler_task: JoinHandle<()>,
        owns_browser: bool,
        work_dir: PathBuf,
        timings: DriverTimings,
    ) -> Self {
        Self {
            browser,
            handler_task,
            owns_browser,
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            work_dir,
            timings,
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// 关闭所有页面并释放浏览器
    pub async fn shutdown(mut self) {
        let sessions: Vec<DriverSession> = self.sessions.get_mut().drain().map(|(_, s)| s).collect();
        for session in sessions {
            if let Err(e) = session.page.close().await {
                debug!("关闭页面失败: {}", e);
            }
        }

        if self.owns_browser {
            if let Err(e) = self.browser.close().await {
                warn!("关闭浏览器失败: {}", e);
            }
            if let Err(e) = self.browser.wait().await {
                warn!("等待浏览器退出失败: {}", e);
            }
        }
        self.handler_task.abort();
        info!("浏览器资源已释放");
    }

    async fn session(&self, handle: &SessionHandle) -> DriverResult<(Page, PathBuf)> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(&handle.id)
            .map(|s| (s.page.clone(), s.download_dir.clone()))
            .ok_or(DriverError::SessionClosed { session: handle.id })
    }

    async fn page(&self, handle: &SessionHandle) -> DriverResult<Page> {
        Ok(self.session(handle).await?.0)
    }

    async fn find(page: &Page, selector: &Selector) -> Result<Element, CdpError> {
        match selector {
            Selector::Css(css) => page.find_element(css.as_str()).await,
            Selector::XPath(xpath) => page.find_xpath(xpath.as_str()).await,
        }
    }

    /// 轮询直到元素出现
    async fn wait_element(
        &self,
        page: &Page,
        selector: &Selector,
        wait: Duration,
    ) -> DriverResult<Element> {
        let deadline = Instant::now() + wait;
        loop {
            match Self::find(page, selector).await {
                Ok(element) => return Ok(element),
                Err(e) => {
                    let err = DriverError::from(e);
                    if err.is_fatal() {
                        return Err(err);
                    }
                }
            }
            if Instant::now() >= deadline {
                return Err(DriverError::ElementNotFound {
                    selector: selector.to_string(),
                });
            }
            sleep(self.timings.poll_interval).await;
        }
    }

    /// 生成在页面里解析选择器的 JS 表达式
    fn resolve_js(selector: &Selector) -> String {
        let literal = serde_json::to_string(selector.as_str()).unwrap_or_else(|_| "\"\"".into());
        match selector {
            Selector::Css(_) => format!("document.querySelector({})", literal),
            Selector::XPath(_) => format!(
                "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
                literal
            ),
        }
    }

    async fn eval(page: &Page, script: String) -> DriverResult<JsonValue> {
        let result = page.evaluate(script).await?;
        Ok(result.value().cloned().unwrap_or(JsonValue::Null))
    }
}

#[async_trait]
impl SessionDriver for ChromeDriver {
    async fn open(&self, provider: ProviderId) -> DriverResult<SessionHandle> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let download_dir = self
            .work_dir
            .join(format!("{}_{}", provider.slug(), id));
        tokio::fs::create_dir_all(&download_dir).await?;

        let page = self.browser.new_page("about:blank").await?;
        debug!("[{}] 新页面已创建, 下载目录: {}", provider, download_dir.display());

        self.sessions
            .lock()
            .await
            .insert(id, DriverSession { page, download_dir });

        Ok(SessionHandle { id, provider })
    }

    async fn navigate(&self, handle: &SessionHandle, url: &str) -> DriverResult<()> {
        let page = self.page(handle).await?;
        debug!("[{}] 导航到 {}", handle, url);

        match timeout(self.timings.navigation_timeout, page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(CdpError::Timeout)) | Err(_) => Err(DriverError::NavigationTimeout {
                url: url.to_string(),
            }),
            Ok(Err(e)) => Err(e.into()),
        }
    }

    async fn fill(
        &self,
        handle: &SessionHandle,
        selector: &Selector,
        value: &str,
    ) -> DriverResult<()> {
        let page = self.page(handle).await?;
        let element = self
            .wait_element(&page, selector, self.timings.element_timeout)
            .await?;

        element
            .call_js_fn(
                "function() { this.value = ''; this.dispatchEvent(new Event('input', { bubbles: true })); }",
                false,
            )
            .await?;
        element.click().await?;
        element.type_str(value).await?;
        Ok(())
    }

    async fn click(&self, handle: &SessionHandle, selector: &Selector) -> DriverResult<()> {
        let page = self.page(handle).await?;
        let element = self
            .wait_element(&page, selector, self.timings.element_timeout)
            .await?;
        element.click().await?;
        Ok(())
    }

    async fn wait_for(
        &self,
        handle: &SessionHandle,
        selector: &Selector,
        wait: Duration,
    ) -> DriverResult<()> {
        let page = self.page(handle).await?;
        self.wait_element(&page, selector, wait).await.map(|_| ())
    }

    async fn is_visible(&self, handle: &SessionHandle, selector: &Selector) -> DriverResult<bool> {
        let page = self.page(handle).await?;
        let script = format!(
            r#"(() => {{
                const el = {};
                if (!el) return false;
                const rect = el.getBoundingClientRect();
                const style = window.getComputedStyle(el);
                return rect.width > 0 && rect.height > 0
                    && style.visibility !== 'hidden' && style.display !== 'none';
            }})()"#,
            Self::resolve_js(selector)
        );
        Ok(Self::eval(&page, script).await?.as_bool().unwrap_or(false))
    }

    async fn select_option(
        &self,
        handle: &SessionHandle,
        selector: &Selector,
        label: &str,
    ) -> DriverResult<()> {
        let page = self.page(handle).await?;
        self.wait_element(&page, selector, self.timings.element_timeout)
            .await?;

        let label_literal = serde_json::to_string(label).unwrap_or_else(|_| "\"\"".into());
        let script = format!(
            r#"(() => {{
                const select = {};
                if (!select) return false;
                const option = Array.from(select.options).find(o => o.text.trim() === {});
                if (!option) return false;
                select.value = option.value;
                select.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()"#,
            Self::resolve_js(selector),
            label_literal
        );

        if Self::eval(&page, script).await?.as_bool().unwrap_or(false) {
            Ok(())
        } else {
            Err(DriverError::ElementNotFound {
                selector: format!("{} option '{}'", selector, label),
            })
        }
    }

    async fn evaluate(&self, handle: &SessionHandle, script: &str) -> DriverResult<JsonValue> {
        let page = self.page(handle).await?;
        Self::eval(&page, script.to_string()).await
    }

    async fn current_url(&self, handle: &SessionHandle) -> DriverResult<String> {
        let page = self.page(handle).await?;
        Ok(page.url().await?.unwrap_or_default())
    }

    async fn download(
        &self,
        handle: &SessionHandle,
        trigger: &Selector,
        wait: Duration,
    ) -> DriverResult<PathBuf> {
        let (page, download_dir) = self.session(handle).await?;
        tokio::fs::create_dir_all(&download_dir).await?;
        let before = list_files(&download_dir).await?;

        // 下载目录是浏览器级别的设置，每次下载前重新指向当前会话
        let params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(download_dir.to_string_lossy().to_string())
            .build()
            .map_err(DriverError::Protocol)?;
        page.execute(params).await?;

        self.click(handle, trigger).await?;
        debug!("[{}] 已触发下载, 等待文件...", handle);

        let deadline = Instant::now() + wait;
        loop {
            if let Some(path) = completed_download(&download_dir, &before).await? {
                debug!("[{}] 下载完成: {}", handle, path.display());
                return Ok(path);
            }
            if Instant::now() >= deadline {
                return Err(DriverError::DownloadTimeout {
                    waited_secs: wait.as_secs(),
                });
            }
            sleep(self.timings.poll_interval).await;
        }
    }

    async fn screenshot(&self, handle: &SessionHandle) -> DriverResult<Vec<u8>> {
        let page = self.page(handle).await?;
        let bytes = page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await?;
        Ok(bytes)
    }

    async fn export_cookies(&self, handle: &SessionHandle) -> DriverResult<JsonValue> {
        let page = self.page(handle).await?;
        let cookies = page.get_cookies().await?;
        debug!("[{}] 导出 {} 个 cookies", handle, cookies.len());
        serde_json::to_value(cookies).map_err(|e| DriverError::Protocol(e.to_string()))
    }

    async fn import_cookies(&self, handle: &SessionHandle, cookies: &JsonValue) -> DriverResult<()> {
        let cookies: Vec<Cookie> = serde_json::from_value(cookies.clone())
            .map_err(|e| DriverError::Protocol(format!("invalid saved cookies: {}", e)))?;
        let params = cookies
            .into_iter()
            .map(cookie_param)
            .collect::<Result<Vec<_>, _>>()
            .map_err(DriverError::Protocol)?;
        if params.is_empty() {
            return Ok(());
        }

        let page = self.page(handle).await?;
        let count = params.len();
        page.execute(SetCookiesParams::new(params)).await?;
        debug!("[{}] 写入 {} 个 cookies", handle, count);
        Ok(())
    }

    async fn close(&self, handle: &SessionHandle) -> DriverResult<()> {
        let session = self.sessions.lock().await.remove(&handle.id);
        if let Some(session) = session {
            session.page.close().await?;
            debug!("[{}] 会话已关闭", handle);
        }
        Ok(())
    }
}

/// 导出的 cookie → 写入参数；会话 cookie（expires <= 0）不带过期时间
fn cookie_param(cookie: Cookie) -> Result<CookieParam, String> {
    let mut builder = CookieParam::builder()
        .name(cookie.name)
        .value(cookie.value)
        .domain(cookie.domain)
        .path(cookie.path)
        .secure(cookie.secure)
        .http_only(cookie.http_only);
    if let Some(same_site) = cookie.same_site {
        builder = builder.same_site(same_site);
    }
    if cookie.expires > 0.0 {
        builder = builder.expires(TimeSinceEpoch::new(cookie.expires));
    }
    builder.build()
}

async fn list_files(dir: &Path) -> DriverResult<HashSet<PathBuf>> {
    let mut files = HashSet::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        files.insert(entry.path());
    }
    Ok(files)
}

/// 新出现且已写完的文件；仍有 `.crdownload` 时视为未完成
async fn completed_download(dir: &Path, before: &HashSet<PathBuf>) -> DriverResult<Option<PathBuf>> {
    let current = list_files(dir).await?;
    let fresh: Vec<PathBuf> = current.difference(before).cloned().collect();

    if fresh
        .iter()
        .any(|p| p.extension().is_some_and(|ext| ext == "crdownload"))
    {
        return Ok(None);
    }
    Ok(fresh.into_iter().next())
}
