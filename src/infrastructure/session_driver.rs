//! 会话驱动 - 基础设施层
//!
//! 每个供应商每次执行一个浏览器会话，只暴露导航原语：
//! goto / fill / click / wait_for / download / screenshot / close，
//! 以及用于跨执行复用登录状态的 cookies 导出 / 写入。
//! 不认识发票，也不认识门户。

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::DriverResult;
use crate::models::provider::ProviderId;

/// 元素选择器
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    Css(String),
    XPath(String),
}

impl Selector {
    pub fn css(selector: impl Into<String>) -> Self {
        Selector::Css(selector.into())
    }

    pub fn xpath(selector: impl Into<String>) -> Self {
        Selector::XPath(selector.into())
    }

    /// 按可见文本查找 `tag` 元素（包含匹配，忽略多余空白）
    pub fn text(tag: &str, text: &str) -> Self {
        Selector::XPath(format!(
            "//{}[contains(normalize-space(.), {})]",
            tag,
            xpath_literal(text)
        ))
    }

    /// 自身文本恰好为 `text` 的任意元素（相当于 `text="..."`）
    pub fn exact_text(text: &str) -> Self {
        Selector::XPath(format!("//*[normalize-space(text())={}]", xpath_literal(text)))
    }

    /// 包含 `text` 的表格行
    pub fn row_containing(text: &str) -> Self {
        Selector::XPath(format!(
            "//tr[td[contains(normalize-space(.), {})]]",
            xpath_literal(text)
        ))
    }

    /// 在当前选择器（必须是行等容器）下查找后代
    pub fn descendant(&self, css_like_tag: &str) -> Self {
        match self {
            Selector::XPath(base) => Selector::XPath(format!("{}//{}", base, css_like_tag)),
            Selector::Css(base) => Selector::Css(format!("{} {}", base, css_like_tag)),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Selector::Css(s) | Selector::XPath(s) => s,
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Css(s) => write!(f, "css={}", s),
            Selector::XPath(s) => write!(f, "xpath={}", s),
        }
    }
}

/// XPath 字符串字面量（处理引号）
fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        format!("'{}'", text)
    } else if !text.contains('"') {
        format!("\"{}\"", text)
    } else {
        let parts: Vec<String> = text.split('\'').map(|p| format!("'{}'", p)).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

/// 会话句柄
///
/// 由 `SessionDriver::open` 创建，只在创建它的执行内有效
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    pub id: u64,
    pub provider: ProviderId,
}

impl std::fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.provider.slug(), self.id)
    }
}

/// 会话驱动
///
/// 职责：
/// - 持有浏览器资源（页面、下载目录）
/// - 找不到元素 → `ElementNotFound`；页面不稳定 → `NavigationTimeout`
/// - 下载未完成 → `DownloadTimeout`
/// - 所有退出路径都必须调用 `close`
#[async_trait]
pub trait SessionDriver: Send + Sync {
    /// 为供应商打开一个隔离的浏览器会话
    async fn open(&self, provider: ProviderId) -> DriverResult<SessionHandle>;

    async fn navigate(&self, handle: &SessionHandle, url: &str) -> DriverResult<()>;

    /// 清空后输入
    async fn fill(&self, handle: &SessionHandle, selector: &Selector, value: &str)
        -> DriverResult<()>;

    async fn click(&self, handle: &SessionHandle, selector: &Selector) -> DriverResult<()>;

    /// 等待元素出现，超时返回 `ElementNotFound`
    async fn wait_for(
        &self,
        handle: &SessionHandle,
        selector: &Selector,
        timeout: Duration,
    ) -> DriverResult<()>;

    /// 立即检查元素是否可见（不等待、不报错）
    async fn is_visible(&self, handle: &SessionHandle, selector: &Selector) -> DriverResult<bool>;

    /// 按标签文本选择下拉框选项
    async fn select_option(
        &self,
        handle: &SessionHandle,
        selector: &Selector,
        label: &str,
    ) -> DriverResult<()>;

    /// 执行 JS 并返回 JSON 结果
    async fn evaluate(&self, handle: &SessionHandle, script: &str) -> DriverResult<JsonValue>;

    async fn current_url(&self, handle: &SessionHandle) -> DriverResult<String>;

    /// 点击触发元素并等待文件传输完成，返回本地文件路径
    async fn download(
        &self,
        handle: &SessionHandle,
        trigger: &Selector,
        timeout: Duration,
    ) -> DriverResult<PathBuf>;

    /// PNG 截图
    async fn screenshot(&self, handle: &SessionHandle) -> DriverResult<Vec<u8>>;

    /// 导出会话的 cookies（JSON 数组）
    async fn export_cookies(&self, handle: &SessionHandle) -> DriverResult<JsonValue>;

    /// 写入之前导出的 cookies
    async fn import_cookies(&self, handle: &SessionHandle, cookies: &JsonValue) -> DriverResult<()>;

    async fn close(&self, handle: &SessionHandle) -> DriverResult<()>;
}
