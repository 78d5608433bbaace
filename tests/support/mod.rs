#![allow(dead_code)]

//! 测试替身：脚本化的 SessionDriver 与 ProviderAdapter

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arg_txt_downloader::error::{AdapterError, AdapterResult, DriverError, DriverResult};
use arg_txt_downloader::infrastructure::{Selector, SessionDriver, SessionHandle};
use arg_txt_downloader::models::{Credentials, ProviderId};
use arg_txt_downloader::services::{ProviderAdapter, RowReference, SearchResult};
use arg_txt_downloader::services::{AdapterRegistry, StaticCredentials};
use async_trait::async_trait;
use serde_json::Value as JsonValue;

/// 记录所有调用的驱动
///
/// - `present` 中的选择器可以被找到 / 可见
/// - `missing` 中的选择器在 fill / click 时报 ElementNotFound
/// - `urls` 依次作为 `current_url` 的返回值（最后一个保持不变）
/// - `download` 在下载目录写一个文件
#[derive(Default)]
pub struct MockDriver {
    pub download_dir: PathBuf,
    present: Mutex<HashSet<String>>,
    missing: Mutex<HashSet<String>>,
    /// 浏览器里的 cookies
    cookies: Mutex<Vec<JsonValue>>,
    urls: Mutex<VecDeque<String>>,
    pub actions: Mutex<Vec<String>>,
    next_id: AtomicU64,
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub screenshots: AtomicUsize,
    pub fail_screenshots: bool,
    /// `open` 返回崩溃
    pub crash_on_open: bool,
    /// 每次下载前等待（用于执行超时）
    pub download_delay: Duration,
}

impl MockDriver {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_present(self, selectors: &[Selector]) -> Self {
        self.present
            .lock()
            .unwrap()
            .extend(selectors.iter().map(|s| s.as_str().to_string()));
        self
    }

    pub fn with_missing(self, selectors: &[Selector]) -> Self {
        self.missing
            .lock()
            .unwrap()
            .extend(selectors.iter().map(|s| s.as_str().to_string()));
        self
    }

    pub fn with_cookies(self, cookies: JsonValue) -> Self {
        if let JsonValue::Array(items) = cookies {
            self.cookies.lock().unwrap().extend(items);
        }
        self
    }

    pub fn cookies(&self) -> Vec<JsonValue> {
        self.cookies.lock().unwrap().clone()
    }

    pub fn with_urls(self, urls: &[&str]) -> Self {
        self.urls
            .lock()
            .unwrap()
            .extend(urls.iter().map(|u| u.to_string()));
        self
    }

    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }

    fn record(&self, action: String) {
        self.actions.lock().unwrap().push(action);
    }

    fn has(&self, selector: &Selector) -> bool {
        self.present.lock().unwrap().contains(selector.as_str())
    }

    fn interactable(&self, selector: &Selector) -> DriverResult<()> {
        if self.missing.lock().unwrap().contains(selector.as_str()) {
            Err(DriverError::ElementNotFound {
                selector: selector.to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SessionDriver for MockDriver {
    async fn open(&self, provider: ProviderId) -> DriverResult<SessionHandle> {
        if self.crash_on_open {
            return Err(DriverError::Crashed("browser exited".into()));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.record(format!("open {}", provider.slug()));
        Ok(SessionHandle { id, provider })
    }

    async fn navigate(&self, _handle: &SessionHandle, url: &str) -> DriverResult<()> {
        self.record(format!("navigate {}", url));
        Ok(())
    }

    async fn fill(&self, _handle: &SessionHandle, selector: &Selector, value: &str) -> DriverResult<()> {
        self.interactable(selector)?;
        self.record(format!("fill {} = {}", selector.as_str(), value));
        Ok(())
    }

    async fn click(&self, _handle: &SessionHandle, selector: &Selector) -> DriverResult<()> {
        self.interactable(selector)?;
        self.record(format!("click {}", selector.as_str()));
        Ok(())
    }

    async fn wait_for(
        &self,
        _handle: &SessionHandle,
        selector: &Selector,
        _timeout: Duration,
    ) -> DriverResult<()> {
        if self.has(selector) {
            Ok(())
        } else {
            Err(DriverError::ElementNotFound {
                selector: selector.to_string(),
            })
        }
    }

    async fn is_visible(&self, _handle: &SessionHandle, selector: &Selector) -> DriverResult<bool> {
        Ok(self.has(selector))
    }

    async fn select_option(
        &self,
        _handle: &SessionHandle,
        selector: &Selector,
        label: &str,
    ) -> DriverResult<()> {
        self.record(format!("select {} = {}", selector.as_str(), label));
        Ok(())
    }

    async fn evaluate(&self, _handle: &SessionHandle, _script: &str) -> DriverResult<JsonValue> {
        Ok(JsonValue::Null)
    }

    async fn current_url(&self, _handle: &SessionHandle) -> DriverResult<String> {
        let mut urls = self.urls.lock().unwrap();
        let url = if urls.len() > 1 {
            urls.pop_front().unwrap_or_default()
        } else {
            urls.front().cloned().unwrap_or_default()
        };
        Ok(url)
    }

    async fn download(
        &self,
        handle: &SessionHandle,
        trigger: &Selector,
        _timeout: Duration,
    ) -> DriverResult<PathBuf> {
        if !self.download_delay.is_zero() {
            tokio::time::sleep(self.download_delay).await;
        }
        self.record(format!("download {}", trigger.as_str()));
        let path = self
            .download_dir
            .join(format!("export_{}_{}.txt", handle.provider.slug(), handle.id));
        tokio::fs::write(&path, b"A;0001;TXT").await?;
        Ok(path)
    }

    async fn screenshot(&self, _handle: &SessionHandle) -> DriverResult<Vec<u8>> {
        self.screenshots.fetch_add(1, Ordering::SeqCst);
        if self.fail_screenshots {
            return Err(DriverError::Protocol("capture failed".into()));
        }
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn export_cookies(&self, _handle: &SessionHandle) -> DriverResult<JsonValue> {
        Ok(JsonValue::Array(self.cookies()))
    }

    async fn import_cookies(&self, _handle: &SessionHandle, cookies: &JsonValue) -> DriverResult<()> {
        let items = cookies.as_array().cloned().unwrap_or_default();
        self.record(format!("import_cookies {}", items.len()));
        self.cookies.lock().unwrap().extend(items);
        Ok(())
    }

    async fn close(&self, handle: &SessionHandle) -> DriverResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.record(format!("close {}", handle));
        Ok(())
    }
}

/// 下载一步的脚本
#[derive(Debug, Clone)]
pub enum DownloadStep {
    Ok,
    Timeout,
    NoTxt,
    SessionInvalid,
}

/// 搜索一步的脚本；`Lookup` 按 `invoices` 判断是否找到
#[derive(Debug, Clone)]
pub enum SearchStep {
    Lookup,
    ElementMissing,
    SessionInvalid,
}

/// 脚本化适配器：不访问驱动的导航原语，只走会话句柄
pub struct ScriptedAdapter {
    provider: ProviderId,
    /// 前几次登录成功，之后被拒绝；None 表示一直成功
    pub logins_allowed: Option<usize>,
    pub persist_session: bool,
    /// 找得到的发票
    pub invoices: HashSet<String>,
    download_steps: Mutex<VecDeque<DownloadStep>>,
    search_steps: Mutex<VecDeque<SearchStep>>,
    pub download_dir: PathBuf,
    pub logins: AtomicUsize,
    pub searches: AtomicUsize,
    pub downloads: AtomicUsize,
    /// 登录时休眠（用于执行超时）
    pub login_delay: Duration,
}

impl ScriptedAdapter {
    pub fn new(provider: ProviderId, download_dir: &Path) -> Self {
        Self {
            provider,
            logins_allowed: None,
            persist_session: false,
            invoices: HashSet::new(),
            download_steps: Mutex::new(VecDeque::new()),
            search_steps: Mutex::new(VecDeque::new()),
            download_dir: download_dir.to_path_buf(),
            logins: AtomicUsize::new(0),
            searches: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
            login_delay: Duration::ZERO,
        }
    }

    pub fn with_invoices(mut self, invoices: &[&str]) -> Self {
        self.invoices.extend(invoices.iter().map(|i| i.to_string()));
        self
    }

    pub fn failing_login(self) -> Self {
        self.failing_login_after(0)
    }

    /// 前 `n` 次登录成功，之后一律被拒绝
    pub fn failing_login_after(mut self, n: usize) -> Self {
        self.logins_allowed = Some(n);
        self
    }

    pub fn persisting_session(mut self) -> Self {
        self.persist_session = true;
        self
    }

    /// 按顺序消费；脚本用完后按 `invoices` 查找
    pub fn with_search_steps(self, steps: &[SearchStep]) -> Self {
        self.search_steps.lock().unwrap().extend(steps.iter().cloned());
        self
    }

    /// 按顺序消费；脚本用完后一律成功
    pub fn with_download_steps(self, steps: &[DownloadStep]) -> Self {
        self.download_steps.lock().unwrap().extend(steps.iter().cloned());
        self
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn provider(&self) -> ProviderId {
        self.provider
    }

    fn persists_session(&self) -> bool {
        self.persist_session
    }

    async fn login(
        &self,
        _driver: &dyn SessionDriver,
        _handle: &SessionHandle,
        _credentials: &Credentials,
    ) -> AdapterResult<()> {
        let attempt = self.logins.fetch_add(1, Ordering::SeqCst);
        if !self.login_delay.is_zero() {
            tokio::time::sleep(self.login_delay).await;
        }
        match self.logins_allowed {
            Some(allowed) if attempt >= allowed => {
                Err(AdapterError::login_failed("invalid credentials"))
            }
            _ => Ok(()),
        }
    }

    async fn search_invoice(
        &self,
        _driver: &dyn SessionDriver,
        _handle: &SessionHandle,
        invoice_number: &str,
    ) -> AdapterResult<SearchResult> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        let step = self
            .search_steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(SearchStep::Lookup);

        match step {
            SearchStep::Lookup => {}
            SearchStep::ElementMissing => {
                return Err(DriverError::ElementNotFound {
                    selector: "#tabla-comprobantes".to_string(),
                }
                .into())
            }
            SearchStep::SessionInvalid => return Err(AdapterError::SessionInvalid),
        }

        if self.invoices.contains(invoice_number) {
            Ok(SearchResult::Found(RowReference::new(
                invoice_number,
                Selector::row_containing(invoice_number),
            )))
        } else {
            Ok(SearchResult::NotFound)
        }
    }

    async fn download_document(
        &self,
        driver: &dyn SessionDriver,
        handle: &SessionHandle,
        row: &RowReference,
    ) -> AdapterResult<PathBuf> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let step = self
            .download_steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(DownloadStep::Ok);

        match step {
            DownloadStep::Ok => {
                let downloaded = driver
                    .download(handle, &Selector::text("button", "Descargar"), Duration::from_secs(1))
                    .await?;
                let target = self.download_dir.join(format!("{}.txt", row.invoice_number));
                tokio::fs::rename(&downloaded, &target)
                    .await
                    .map_err(|e| AdapterError::download_failed(e.to_string()))?;
                Ok(target)
            }
            DownloadStep::Timeout => Err(DriverError::DownloadTimeout { waited_secs: 1 }.into()),
            DownloadStep::NoTxt => Err(AdapterError::download_failed("no TXT available")),
            DownloadStep::SessionInvalid => Err(AdapterError::SessionInvalid),
        }
    }
}

pub fn credentials_for(providers: &[ProviderId]) -> StaticCredentials {
    providers.iter().fold(StaticCredentials::new(), |creds, p| {
        creds.with(*p, Credentials::new(format!("user-{}", p.slug()), "secret"))
    })
}

pub fn registry_of(adapters: &[Arc<ScriptedAdapter>]) -> AdapterRegistry {
    adapters.iter().fold(AdapterRegistry::new(), |registry, adapter| {
        registry.register(adapter.clone() as Arc<dyn ProviderAdapter>)
    })
}
