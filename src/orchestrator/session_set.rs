//! 执行范围内的会话表
//!
//! 每次执行一个实例，显式传给 Job Runner；每个供应商最多一个存活会话。

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, warn};

use crate::infrastructure::{SessionDriver, SessionHandle};
use crate::models::ProviderId;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// 会话认证状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    NotStarted,
    Authenticated,
    /// 本次执行内不再尝试登录
    Failed,
}

#[derive(Debug)]
struct ProviderSession {
    handle: Option<SessionHandle>,
    state: AuthState,
}

#[derive(Debug, Default)]
pub struct SessionSet {
    sessions: HashMap<ProviderId, ProviderSession>,
}

impl SessionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, provider: ProviderId) -> AuthState {
        self.sessions
            .get(&provider)
            .map(|s| s.state)
            .unwrap_or(AuthState::NotStarted)
    }

    pub fn handle(&self, provider: ProviderId) -> Option<&SessionHandle> {
        self.sessions.get(&provider).and_then(|s| s.handle.as_ref())
    }

    /// 登记刚打开、尚未认证的会话
    pub fn opened(&mut self, handle: SessionHandle) {
        self.sessions.insert(
            handle.provider,
            ProviderSession {
                handle: Some(handle),
                state: AuthState::NotStarted,
            },
        );
    }

    pub fn mark_authenticated(&mut self, provider: ProviderId) {
        if let Some(session) = self.sessions.get_mut(&provider) {
            session.state = AuthState::Authenticated;
        }
    }

    /// 登录失败或凭据缺失；已打开的会话保留到执行结束再关闭
    pub fn mark_failed(&mut self, provider: ProviderId) {
        self.sessions
            .entry(provider)
            .or_insert(ProviderSession {
                handle: None,
                state: AuthState::NotStarted,
            })
            .state = AuthState::Failed;
    }

    pub fn open_count(&self) -> usize {
        self.sessions.values().filter(|s| s.handle.is_some()).count()
    }

    /// 关闭全部会话，返回成功关闭的数量
    pub async fn close_all(&mut self, driver: &dyn SessionDriver) -> usize {
        let mut closed = 0;
        for (provider, session) in self.sessions.iter_mut() {
            let Some(handle) = session.handle.take() else {
                continue;
            };
            match tokio::time::timeout(CLOSE_TIMEOUT, driver.close(&handle)).await {
                Ok(Ok(())) => {
                    debug!("[{}] 会话 {} 已关闭", provider, handle);
                    closed += 1;
                }
                Ok(Err(e)) => warn!("[{}] 关闭会话失败: {}", provider, e),
                Err(_) => warn!("[{}] 关闭会话超时", provider),
            }
        }
        closed
    }
}
