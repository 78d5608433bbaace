use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::infrastructure::DriverTimings;
use crate::models::ProviderId;
use crate::orchestrator::RunPolicy;
use crate::services::PortalSettings;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 连接已运行的浏览器（复用用户登录状态），None 时自行启动
    pub browser_debug_port: Option<u16>,
    pub headless: bool,
    pub chrome_executable: Option<PathBuf>,
    /// 每次执行在此目录下建立独立工作目录
    pub download_dir: PathBuf,
    pub jobs_file: PathBuf,
    pub report_file: PathBuf,
    // --- 重试与超时 ---
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub execution_timeout_secs: u64,
    pub navigation_timeout_secs: u64,
    pub element_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub capture_timeout_secs: u64,
    /// 只登录 + 查询
    pub dry_run: bool,
    pub provider_filter: Option<HashSet<ProviderId>>,
    // --- 门户地址 ---
    pub suizo_portal_url: String,
    pub monroe_portal_url: String,
    pub monroe_dashboard_url: String,
    pub delsud_portal_url: Option<String>,
    // --- 产物存储 ---
    pub blob_store_url: Option<String>,
    pub blob_store_token: Option<String>,
    pub artifact_dir: PathBuf,
    /// 跨执行保存的登录状态
    pub session_dir: PathBuf,
    /// 发布完成后删除整个工作目录（浏览器配置目录总是删除）
    pub cleanup_work_dir: bool,
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        let portals = PortalSettings::default();
        Self {
            browser_debug_port: None,
            headless: true,
            chrome_executable: None,
            download_dir: PathBuf::from("./downloads"),
            jobs_file: PathBuf::from("jobs.toml"),
            report_file: PathBuf::from("execution_report.json"),
            max_retries: 2,
            retry_delay_ms: 2000,
            execution_timeout_secs: 1800,
            navigation_timeout_secs: 60,
            element_timeout_secs: 30,
            download_timeout_secs: 60,
            capture_timeout_secs: 10,
            dry_run: false,
            provider_filter: None,
            suizo_portal_url: portals.suizo_login_url,
            monroe_portal_url: portals.monroe_login_url,
            monroe_dashboard_url: portals.monroe_dashboard_url,
            delsud_portal_url: None,
            blob_store_url: None,
            blob_store_token: None,
            artifact_dir: PathBuf::from("./artifacts"),
            session_dir: PathBuf::from("./sessions"),
            cleanup_work_dir: true,
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源读取；无法解析的值回退到默认值
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        // 虚拟显示器 :99 上运行时必须有界面
        let headless = match get("DISPLAY").as_deref() {
            Some(":99") => false,
            _ => parse_or(get("HEADLESS"), default.headless),
        };

        Self {
            browser_debug_port: get("BROWSER_DEBUG_PORT").and_then(|v| v.parse().ok()),
            headless,
            chrome_executable: get("CHROME_EXECUTABLE").map(PathBuf::from),
            download_dir: get("DOWNLOAD_PATH").map(PathBuf::from).unwrap_or(default.download_dir),
            jobs_file: get("JOBS_FILE").map(PathBuf::from).unwrap_or(default.jobs_file),
            report_file: get("REPORT_FILE").map(PathBuf::from).unwrap_or(default.report_file),
            max_retries: parse_or(get("MAX_RETRIES"), default.max_retries),
            retry_delay_ms: parse_or(get("RETRY_DELAY_MS"), default.retry_delay_ms),
            execution_timeout_secs: parse_or(get("EXECUTION_TIMEOUT_SECS"), default.execution_timeout_secs),
            navigation_timeout_secs: parse_or(get("NAVIGATION_TIMEOUT_SECS"), default.navigation_timeout_secs),
            element_timeout_secs: parse_or(get("ELEMENT_TIMEOUT_SECS"), default.element_timeout_secs),
            download_timeout_secs: parse_or(get("DOWNLOAD_TIMEOUT_SECS"), default.download_timeout_secs),
            capture_timeout_secs: parse_or(get("CAPTURE_TIMEOUT_SECS"), default.capture_timeout_secs),
            dry_run: parse_or(get("DRY_RUN"), default.dry_run),
            provider_filter: get("PROVIDER_FILTER").and_then(|v| parse_provider_filter(&v)),
            suizo_portal_url: get("SUIZO_PORTAL_URL").unwrap_or(default.suizo_portal_url),
            monroe_portal_url: get("MONROE_PORTAL_URL").unwrap_or(default.monroe_portal_url),
            monroe_dashboard_url: get("MONROE_DASHBOARD_URL").unwrap_or(default.monroe_dashboard_url),
            delsud_portal_url: get("DELSUD_PORTAL_URL"),
            blob_store_url: get("BLOB_STORE_URL"),
            blob_store_token: get("BLOB_STORE_TOKEN"),
            artifact_dir: get("ARTIFACT_DIR").map(PathBuf::from).unwrap_or(default.artifact_dir),
            session_dir: get("SESSION_STATE_DIR").map(PathBuf::from).unwrap_or(default.session_dir),
            cleanup_work_dir: parse_or(get("CLEANUP_WORK_DIR"), default.cleanup_work_dir),
            verbose_logging: parse_or(get("VERBOSE_LOGGING"), default.verbose_logging),
        }
    }

    pub fn run_policy(&self) -> RunPolicy {
        RunPolicy {
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            execution_timeout: Duration::from_secs(self.execution_timeout_secs),
            capture_timeout: Duration::from_secs(self.capture_timeout_secs),
        }
    }

    pub fn portal_settings(&self) -> PortalSettings {
        PortalSettings {
            suizo_login_url: self.suizo_portal_url.clone(),
            monroe_login_url: self.monroe_portal_url.clone(),
            monroe_dashboard_url: self.monroe_dashboard_url.clone(),
            delsud_portal_url: self.delsud_portal_url.clone(),
            element_timeout: Duration::from_secs(self.element_timeout_secs),
            download_timeout: Duration::from_secs(self.download_timeout_secs),
            ..PortalSettings::default()
        }
    }

    pub fn driver_timings(&self) -> DriverTimings {
        DriverTimings {
            navigation_timeout: Duration::from_secs(self.navigation_timeout_secs),
            element_timeout: Duration::from_secs(self.element_timeout_secs),
            ..DriverTimings::default()
        }
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// 逗号分隔的供应商名称；全部无法识别时返回 None（不过滤）
pub fn parse_provider_filter(raw: &str) -> Option<HashSet<ProviderId>> {
    let mut providers = HashSet::new();
    for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        match ProviderId::from_name(name) {
            Some(provider) => {
                providers.insert(provider);
            }
            None => warn!("⚠️ 未知的供应商过滤项: {}", name),
        }
    }
    (!providers.is_empty()).then_some(providers)
}
