//! 作业执行器 - 编排层
//!
//! 核心入口 `JobRunner::process`：
//! 1. 按供应商过滤作业（被过滤的作业不出现在报告中）
//! 2. 每个供应商首次出现时打开会话并登录，之后复用
//! 3. 登录失败：该作业 LoginFailed，同一供应商后续作业 Skipped
//! 4. 逐个作业运行 JobFlow；失败截图在作业结束后单独限时执行
//! 5. 执行级超时或驱动崩溃：剩余作业 Skipped，仍然返回部分报告
//! 6. 无论结果如何，关闭本次执行的所有会话

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{AdapterError, ErrorKind};
use crate::infrastructure::{SessionDriver, SessionHandle};
use crate::models::{
    Credentials, ExecutionReport, ExecutionStatus, Job, JobOutcome, JobStatus, ProviderId,
};
use crate::orchestrator::session_set::{AuthState, SessionSet};
use crate::reporting::{FailureCapture, OutcomeReporter};
use crate::services::{AdapterRegistry, CredentialProvider, ProviderAdapter};
use crate::storage::SessionStateStore;
use crate::workflow::{FlowResult, JobCtx, JobFlow};

pub const PROVIDER_UNAVAILABLE: &str = "provider session unavailable";
pub const EXECUTION_TIMED_OUT: &str = "execution timed out";

/// 重试与超时策略
#[derive(Debug, Clone, Copy)]
pub struct RunPolicy {
    /// 每个作业的最大重试次数（不含首次尝试）
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// 整次执行的上限
    pub execution_timeout: Duration,
    /// 单次失败截图的上限
    pub capture_timeout: Duration,
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay: Duration::from_millis(2000),
            execution_timeout: Duration::from_secs(1800),
            capture_timeout: Duration::from_secs(10),
        }
    }
}

/// 调用参数
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    pub dry_run: bool,
    /// None = 全部供应商
    pub provider_filter: Option<HashSet<ProviderId>>,
}

impl ProcessOptions {
    pub fn includes(&self, provider: ProviderId) -> bool {
        self.provider_filter
            .as_ref()
            .map_or(true, |filter| filter.contains(&provider))
    }
}

/// 作业终态，以及需要截图的会话（失败时）
struct Finished {
    outcome: JobOutcome,
    capture_on: Option<SessionHandle>,
}

impl Finished {
    fn done(outcome: JobOutcome) -> Self {
        Self {
            outcome,
            capture_on: None,
        }
    }

    fn failed(outcome: JobOutcome, handle: &SessionHandle) -> Self {
        Self {
            outcome,
            capture_on: Some(handle.clone()),
        }
    }
}

/// 会话准备结果
enum SessionReady {
    Ready(SessionHandle),
    /// 无法使用该供应商，作业已有终态
    Unavailable(Finished),
}

/// 驱动崩溃的描述，整次执行中止
type Crash = String;

pub struct JobRunner {
    driver: Arc<dyn SessionDriver>,
    adapters: AdapterRegistry,
    credentials: Arc<dyn CredentialProvider>,
    capture: Option<Arc<dyn FailureCapture>>,
    session_store: Option<Arc<SessionStateStore>>,
    policy: RunPolicy,
    work_dir: PathBuf,
}

impl JobRunner {
    pub fn new(
        driver: Arc<dyn SessionDriver>,
        adapters: AdapterRegistry,
        credentials: Arc<dyn CredentialProvider>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            driver,
            adapters,
            credentials,
            capture: None,
            session_store: None,
            policy: RunPolicy::default(),
            work_dir: work_dir.into(),
        }
    }

    pub fn with_policy(mut self, policy: RunPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_failure_capture(mut self, capture: Arc<dyn FailureCapture>) -> Self {
        self.capture = Some(capture);
        self
    }

    /// 跨执行保存登录状态（只对声明 `persists_session` 的门户生效）
    pub fn with_session_store(mut self, store: Arc<SessionStateStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    pub fn policy(&self) -> &RunPolicy {
        &self.policy
    }

    /// 处理作业列表，总是返回报告
    pub async fn process(&self, jobs: &[Job], options: &ProcessOptions) -> ExecutionReport {
        let mut reporter = OutcomeReporter::start(&self.work_dir);

        let dispatched: Vec<&Job> = jobs.iter().filter(|j| options.includes(j.provider)).collect();
        let omitted = jobs.len() - dispatched.len();
        if omitted > 0 {
            reporter.info(None, format!("{} jobs omitted by provider filter", omitted));
        }
        reporter.info(
            None,
            format!(
                "{} jobs to process (dry_run={}, max_retries={})",
                dispatched.len(),
                options.dry_run,
                self.policy.max_retries
            ),
        );

        let deadline = tokio::time::Instant::now() + self.policy.execution_timeout;
        let mut sessions = SessionSet::new();
        let mut interrupted: Option<(ExecutionStatus, String)> = None;
        let total = dispatched.len();

        for (i, job) in dispatched.into_iter().enumerate() {
            if let Some((_, reason)) = &interrupted {
                reporter.record(JobOutcome::skipped(job, reason.clone()));
                continue;
            }

            let ctx = JobCtx::new(i + 1, total, job);
            let dry_run = options.dry_run || job.flags.dry_run;

            let step = tokio::time::timeout_at(
                deadline,
                self.run_job(&mut sessions, &mut reporter, job, &ctx, dry_run),
            )
            .await;

            match step {
                Ok(Ok(finished)) => {
                    // 截图不受执行期限约束，作业终态已经确定
                    let outcome = match &finished.capture_on {
                        Some(handle) => {
                            self.capture_failure(finished.outcome, handle, &ctx, &mut reporter)
                                .await
                        }
                        None => finished.outcome,
                    };
                    reporter.record(outcome);
                }
                Ok(Err(crash)) => {
                    let reason = format!("session driver crashed: {}", crash);
                    reporter.error(Some(job.provider), format!("{} {}", ctx, reason));
                    reporter.record(JobOutcome::skipped(job, reason.clone()));
                    interrupted = Some((ExecutionStatus::Aborted, reason));
                }
                Err(_) => {
                    reporter.error(
                        None,
                        format!(
                            "{} execution timed out after {}s",
                            ctx,
                            self.policy.execution_timeout.as_secs()
                        ),
                    );
                    reporter.record(JobOutcome::skipped(job, EXECUTION_TIMED_OUT));
                    interrupted = Some((ExecutionStatus::TimedOut, EXECUTION_TIMED_OUT.to_string()));
                }
            }
        }

        let closed = sessions.close_all(self.driver.as_ref()).await;
        reporter.info(None, format!("{} browser sessions closed", closed));

        let status = match interrupted {
            Some((status, _)) => status,
            None if reporter.counts().failed > 0 => ExecutionStatus::Partial,
            None => ExecutionStatus::Completed,
        };
        reporter.finish(status).await
    }

    async fn run_job(
        &self,
        sessions: &mut SessionSet,
        reporter: &mut OutcomeReporter,
        job: &Job,
        ctx: &JobCtx,
        dry_run: bool,
    ) -> Result<Finished, Crash> {
        let started = Instant::now();
        let provider = job.provider;

        let Some(adapter) = self.adapters.get(provider) else {
            sessions.mark_failed(provider);
            return Ok(Finished::done(JobOutcome::unsuccessful(
                job,
                JobStatus::LoginFailed,
                ErrorKind::LoginUnavailable,
                format!("no adapter registered for {}", provider),
                0,
                started.elapsed(),
            )));
        };

        let handle = match self
            .ensure_session(sessions, reporter, adapter.as_ref(), job, ctx, started)
            .await?
        {
            SessionReady::Ready(handle) => handle,
            SessionReady::Unavailable(finished) => return Ok(finished),
        };

        let flow = JobFlow::new(self.policy.max_retries, self.policy.retry_delay);
        let mut report = flow
            .run(
                self.driver.as_ref(),
                adapter.as_ref(),
                &handle,
                &job.invoice_number,
                dry_run,
                ctx,
            )
            .await;
        let mut retries = report.retries;

        // 会话失效：每个作业最多重新登录一次
        if matches!(report.result, FlowResult::Failed(AdapterError::SessionInvalid)) {
            reporter.warn(Some(provider), format!("{} session invalid, logging in again", ctx));

            let relogin = match self.credentials.get(provider) {
                Ok(credentials) => self.login(adapter.as_ref(), &handle, &credentials).await,
                Err(e) => Err(AdapterError::login_unavailable(e.to_string())),
            };
            if let Err(e) = relogin {
                if e.is_fatal() {
                    return Err(e.to_string());
                }
                sessions.mark_failed(provider);
                reporter.error(Some(provider), format!("{} re-login failed: {}", ctx, e));
                let outcome = JobOutcome::unsuccessful(
                    job,
                    JobStatus::LoginFailed,
                    e.kind(),
                    e.to_string(),
                    retries,
                    started.elapsed(),
                );
                return Ok(Finished::failed(outcome, &handle));
            }

            report = flow
                .run(
                    self.driver.as_ref(),
                    adapter.as_ref(),
                    &handle,
                    &job.invoice_number,
                    dry_run,
                    ctx,
                )
                .await;
            retries += report.retries;
        }

        let finished = match report.result {
            FlowResult::Downloaded(path) => {
                Finished::done(JobOutcome::success(job, path, retries, started.elapsed()))
            }
            FlowResult::Found => Finished::done(JobOutcome::found(job, retries, started.elapsed())),
            FlowResult::NotFound => Finished::done(JobOutcome::unsuccessful(
                job,
                JobStatus::NotFound,
                ErrorKind::NotFound,
                format!("invoice {} not found in {} portal", job.invoice_number, provider),
                retries,
                started.elapsed(),
            )),
            FlowResult::Failed(e) if e.is_fatal() => return Err(e.to_string()),
            // 重新登录后仍然失效：按登录失败处理，供应商不再可用
            FlowResult::Failed(e @ AdapterError::SessionInvalid) => {
                sessions.mark_failed(provider);
                reporter.error(
                    Some(provider),
                    format!("{} session still invalid after re-login", ctx),
                );
                let outcome = JobOutcome::unsuccessful(
                    job,
                    JobStatus::LoginFailed,
                    ErrorKind::LoginFailed,
                    format!("{} after re-login", e),
                    retries,
                    started.elapsed(),
                );
                Finished::failed(outcome, &handle)
            }
            FlowResult::Failed(e) => {
                let outcome = JobOutcome::unsuccessful(
                    job,
                    JobStatus::DownloadFailed,
                    e.kind(),
                    e.to_string(),
                    retries,
                    started.elapsed(),
                );
                Finished::failed(outcome, &handle)
            }
        };
        Ok(finished)
    }

    /// 取得已认证的会话；首次使用时打开并登录
    async fn ensure_session(
        &self,
        sessions: &mut SessionSet,
        reporter: &mut OutcomeReporter,
        adapter: &dyn ProviderAdapter,
        job: &Job,
        ctx: &JobCtx,
        started: Instant,
    ) -> Result<SessionReady, Crash> {
        let provider = job.provider;
        match sessions.state(provider) {
            AuthState::Failed => {
                return Ok(SessionReady::Unavailable(Finished::done(JobOutcome::skipped(
                    job,
                    PROVIDER_UNAVAILABLE,
                ))))
            }
            AuthState::Authenticated => {
                if let Some(handle) = sessions.handle(provider) {
                    return Ok(SessionReady::Ready(handle.clone()));
                }
            }
            AuthState::NotStarted => {}
        }

        // 凭据缺失在打开会话之前就判定
        let credentials = match self.credentials.get(provider) {
            Ok(credentials) => credentials,
            Err(e) => {
                sessions.mark_failed(provider);
                reporter.error(Some(provider), format!("{} {}", ctx, e));
                return Ok(SessionReady::Unavailable(Finished::done(JobOutcome::unsuccessful(
                    job,
                    JobStatus::LoginFailed,
                    ErrorKind::CredentialsMissing,
                    e.to_string(),
                    0,
                    started.elapsed(),
                ))));
            }
        };

        let handle = match self.driver.open(provider).await {
            Ok(handle) => handle,
            Err(e) if e.is_fatal() => return Err(e.to_string()),
            Err(e) => {
                sessions.mark_failed(provider);
                reporter.error(Some(provider), format!("{} cannot open session: {}", ctx, e));
                return Ok(SessionReady::Unavailable(Finished::done(JobOutcome::unsuccessful(
                    job,
                    JobStatus::LoginFailed,
                    ErrorKind::LoginUnavailable,
                    format!("cannot open browser session: {}", e),
                    0,
                    started.elapsed(),
                ))));
            }
        };
        sessions.opened(handle.clone());

        if adapter.persists_session() {
            self.restore_session(&handle, reporter).await;
        }

        reporter.info(Some(provider), format!("{} logging in", ctx));
        match self.login(adapter, &handle, &credentials).await {
            Ok(()) => {
                sessions.mark_authenticated(provider);
                reporter.info(Some(provider), "login succeeded");
                if adapter.persists_session() {
                    self.save_session(&handle, reporter).await;
                }
                Ok(SessionReady::Ready(handle))
            }
            Err(e) if e.is_fatal() => Err(e.to_string()),
            Err(e) => {
                sessions.mark_failed(provider);
                reporter.error(Some(provider), format!("{} login failed: {}", ctx, e));
                let outcome = JobOutcome::unsuccessful(
                    job,
                    JobStatus::LoginFailed,
                    e.kind(),
                    e.to_string(),
                    0,
                    started.elapsed(),
                );
                Ok(SessionReady::Unavailable(Finished::failed(outcome, &handle)))
            }
        }
    }

    async fn login(
        &self,
        adapter: &dyn ProviderAdapter,
        handle: &SessionHandle,
        credentials: &Credentials,
    ) -> Result<(), AdapterError> {
        adapter
            .login(self.driver.as_ref(), handle, credentials)
            .await
    }

    /// 载入上次保存的 cookies；失败只记日志
    async fn restore_session(&self, handle: &SessionHandle, reporter: &mut OutcomeReporter) {
        let Some(store) = &self.session_store else {
            return;
        };
        let Some(cookies) = store.load(handle.provider).await else {
            return;
        };

        match self.driver.import_cookies(handle, &cookies).await {
            Ok(()) => reporter.info(Some(handle.provider), "saved session restored"),
            Err(e) => reporter.warn(
                Some(handle.provider),
                format!("cannot restore saved session: {}", e),
            ),
        }
    }

    /// 登录成功后保存 cookies，供下次执行复用
    async fn save_session(&self, handle: &SessionHandle, reporter: &mut OutcomeReporter) {
        let Some(store) = &self.session_store else {
            return;
        };

        let saved = match self.driver.export_cookies(handle).await {
            Ok(cookies) => store
                .save(handle.provider, cookies)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match saved {
            Ok(path) => reporter.info(
                Some(handle.provider),
                format!("session saved to {}", path.display()),
            ),
            Err(e) => reporter.warn(Some(handle.provider), format!("cannot save session: {}", e)),
        }
    }

    /// 失败截图；截图失败或超时只记日志，作业结果不变
    async fn capture_failure(
        &self,
        outcome: JobOutcome,
        handle: &SessionHandle,
        ctx: &JobCtx,
        reporter: &mut OutcomeReporter,
    ) -> JobOutcome {
        let Some(capture) = &self.capture else {
            return outcome;
        };

        let captured = tokio::time::timeout(
            self.policy.capture_timeout,
            capture.capture(self.driver.as_ref(), handle, &ctx.label()),
        )
        .await;

        match captured {
            Ok(Ok(path)) => {
                reporter.info(
                    Some(handle.provider),
                    format!("{} screenshot saved: {}", ctx, path.display()),
                );
                outcome.with_screenshot(Some(path))
            }
            Ok(Err(e)) => {
                reporter.warn(
                    Some(handle.provider),
                    format!("{} screenshot capture failed: {}", ctx, e),
                );
                outcome
            }
            Err(_) => {
                reporter.warn(
                    Some(handle.provider),
                    format!(
                        "{} screenshot capture timed out after {}ms",
                        ctx,
                        self.policy.capture_timeout.as_millis()
                    ),
                );
                outcome
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_filter() {
        let all = ProcessOptions::default();
        assert!(all.includes(ProviderId::DelSud));

        let only_suizo = ProcessOptions {
            dry_run: false,
            provider_filter: Some([ProviderId::Suizo].into_iter().collect()),
        };
        assert!(only_suizo.includes(ProviderId::Suizo));
        assert!(!only_suizo.includes(ProviderId::Monroe));
    }
}
