//! 应用外壳 - 编排层
//!
//! 1. **初始化**：建立本次执行的工作目录，启动或连接浏览器，读取凭据
//! 2. **加载作业**：读取作业文件
//! 3. **执行**：交给 JobRunner
//! 4. **收尾**：关闭浏览器，发布产物，写出报告 JSON，清理工作目录
//!
//! 唯一持有浏览器的模块

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use serde_json::json;
use tracing::{info, warn};

use crate::browser::LaunchOptions;
use crate::config::Config;
use crate::error::AppError;
use crate::infrastructure::{ChromeDriver, SessionDriver};
use crate::models::{load_jobs, ExecutionReport};
use crate::orchestrator::job_runner::{JobRunner, ProcessOptions};
use crate::reporting::ScreenshotCapture;
use crate::services::{AdapterRegistry, EnvCredentials};
use crate::storage::{
    publish_report, BlobStore, HttpBlobStore, LocalBlobStore, SessionStateStore,
};
use crate::utils::logging::{log_startup, print_final_stats};

/// 应用主结构
pub struct App {
    config: Config,
    driver: Arc<ChromeDriver>,
    runner: JobRunner,
    store: Box<dyn BlobStore>,
    work_dir: PathBuf,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        if config.execution_timeout_secs == 0 {
            return Err(AppError::Config("EXECUTION_TIMEOUT_SECS 必须大于 0".to_string()).into());
        }

        // 每次执行独立的工作目录（下载、截图、日志、浏览器配置）
        let work_dir = config
            .download_dir
            .join(format!("run_{}", Local::now().format("%Y%m%d_%H%M%S")));
        tokio::fs::create_dir_all(&work_dir)
            .await
            .with_context(|| format!("无法创建工作目录 {}", work_dir.display()))?;
        info!("📁 工作目录: {}", work_dir.display());

        let timings = config.driver_timings();
        let driver = match config.browser_debug_port {
            Some(port) => ChromeDriver::connect(port, &work_dir, timings)
                .await
                .map_err(AppError::Browser)
                .with_context(|| format!("无法连接浏览器调试端口 {}", port))?,
            None => {
                let options = LaunchOptions {
                    headless: config.headless,
                    chrome_executable: config.chrome_executable.clone(),
                    user_data_dir: work_dir.join("profile"),
                };
                ChromeDriver::launch(&options, &work_dir, timings)
                    .await
                    .map_err(AppError::Browser)
                    .context("无法启动浏览器")?
            }
        };
        let driver = Arc::new(driver);

        let credentials = EnvCredentials::from_env();
        info!("🔑 已配置凭据的供应商: {}", credentials.configured());

        let adapters = AdapterRegistry::with_defaults(&config.portal_settings());
        let runner = JobRunner::new(
            driver.clone() as Arc<dyn SessionDriver>,
            adapters,
            Arc::new(credentials),
            &work_dir,
        )
        .with_policy(config.run_policy())
        .with_failure_capture(Arc::new(ScreenshotCapture::new(&work_dir)))
        .with_session_store(Arc::new(SessionStateStore::new(config.session_dir.clone())));

        let store: Box<dyn BlobStore> = match &config.blob_store_url {
            Some(url) => {
                info!("☁️ 产物上传到 {}", url);
                Box::new(HttpBlobStore::new(url.clone(), config.blob_store_token.clone())
                    .map_err(AppError::Storage)?)
            }
            None => {
                info!("💾 产物保存到 {}", config.artifact_dir.display());
                Box::new(LocalBlobStore::new(config.artifact_dir.clone()))
            }
        };

        Ok(Self {
            config,
            driver,
            runner,
            store,
            work_dir,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(self) -> Result<ExecutionReport> {
        let jobs = match load_jobs(&self.config.jobs_file).await {
            Ok(jobs) => jobs,
            Err(e) => {
                let work_dir = self.work_dir.clone();
                let remove_all = self.config.cleanup_work_dir;
                self.shutdown_browser().await;
                clean_work_dir(&work_dir, remove_all, 0).await;
                return Err(AppError::Jobs(e)).context("加载作业文件失败");
            }
        };
        if jobs.is_empty() {
            warn!("⚠️ 作业文件中没有需要处理的行");
        }

        let options = ProcessOptions {
            dry_run: self.config.dry_run,
            provider_filter: self.config.provider_filter.clone(),
        };
        let report = self.runner.process(&jobs, &options).await;

        let App {
            config,
            driver,
            runner,
            store,
            work_dir,
        } = self;
        drop(runner);
        shutdown(driver).await;

        let published = publish_report(store.as_ref(), &report).await;

        let body = serde_json::to_string_pretty(&json!({
            "report": &report,
            "artifacts": &published,
        }))?;
        tokio::fs::write(&config.report_file, body)
            .await
            .with_context(|| format!("无法写入报告 {}", config.report_file.display()))?;

        print_final_stats(&report, &config.report_file.display().to_string());

        clean_work_dir(&work_dir, config.cleanup_work_dir, published.failed_uploads).await;

        Ok(report)
    }

    async fn shutdown_browser(self) {
        drop(self.runner);
        shutdown(self.driver).await;
    }
}

async fn shutdown(driver: Arc<ChromeDriver>) {
    match Arc::try_unwrap(driver) {
        Ok(driver) => driver.shutdown().await,
        Err(_) => warn!("浏览器仍被引用，跳过关闭"),
    }
}

/// 发布之后清理本次执行的工作目录
///
/// 浏览器配置目录总是删除。`remove_all` 时删除整个目录，
/// 但有产物没能发布时保留下载和截图。返回工作目录是否已被整体删除
pub(crate) async fn clean_work_dir(work_dir: &Path, remove_all: bool, failed_uploads: usize) -> bool {
    let profile = work_dir.join("profile");
    if let Err(e) = tokio::fs::remove_dir_all(&profile).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("清理浏览器配置目录失败 {}: {}", profile.display(), e);
        }
    }

    if !remove_all {
        return false;
    }
    if failed_uploads > 0 {
        warn!(
            "⚠️ {} 个产物未能发布，保留工作目录 {}",
            failed_uploads,
            work_dir.display()
        );
        return false;
    }

    match tokio::fs::remove_dir_all(work_dir).await {
        Ok(()) => {
            info!("🧹 已清理工作目录 {}", work_dir.display());
            true
        }
        Err(e) => {
            warn!("清理工作目录失败: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn populated_work_dir(root: &Path) -> PathBuf {
        let work_dir = root.join("run_20240315_101500");
        tokio::fs::create_dir_all(work_dir.join("profile/Default")).await.unwrap();
        tokio::fs::write(work_dir.join("profile/Default/Cookies"), b"x").await.unwrap();
        tokio::fs::write(work_dir.join("12345678.txt"), b"A;0001;TXT").await.unwrap();
        work_dir
    }

    #[tokio::test]
    async fn test_cleanup_removes_whole_work_dir() {
        let root = tempfile::tempdir().unwrap();
        let work_dir = populated_work_dir(root.path()).await;

        assert!(clean_work_dir(&work_dir, true, 0).await);
        assert!(!work_dir.exists());
    }

    #[tokio::test]
    async fn test_profile_removed_even_when_keeping_downloads() {
        let root = tempfile::tempdir().unwrap();
        let work_dir = populated_work_dir(root.path()).await;

        assert!(!clean_work_dir(&work_dir, false, 0).await);
        assert!(!work_dir.join("profile").exists());
        assert!(work_dir.join("12345678.txt").exists());
    }

    #[tokio::test]
    async fn test_unpublished_artifacts_are_kept() {
        let root = tempfile::tempdir().unwrap();
        let work_dir = populated_work_dir(root.path()).await;

        assert!(!clean_work_dir(&work_dir, true, 2).await);
        assert!(!work_dir.join("profile").exists());
        assert!(work_dir.join("12345678.txt").exists());
    }
}
