use std::collections::HashMap;

use tracing::debug;

use crate::error::CredentialsMissing;
use crate::models::{Credentials, ProviderId};

/// 凭据来源，执行期间只读
pub trait CredentialProvider: Send + Sync {
    fn get(&self, provider: ProviderId) -> Result<Credentials, CredentialsMissing>;
}

/// 固定凭据表
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    entries: HashMap<ProviderId, Credentials>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: ProviderId, credentials: Credentials) -> Self {
        self.entries.insert(provider, credentials);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CredentialProvider for StaticCredentials {
    fn get(&self, provider: ProviderId) -> Result<Credentials, CredentialsMissing> {
        self.entries
            .get(&provider)
            .cloned()
            .ok_or(CredentialsMissing { provider })
    }
}

/// 启动时从环境变量 `<PREFIX>_USERNAME` / `<PREFIX>_PASSWORD` 读取一次
#[derive(Debug, Clone, Default)]
pub struct EnvCredentials {
    inner: StaticCredentials,
}

impl EnvCredentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 通过任意查找函数读取（便于测试）
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut inner = StaticCredentials::new();
        for provider in ProviderId::ALL {
            let prefix = provider.env_prefix();
            let username = lookup(&format!("{}_USERNAME", prefix)).filter(|v| !v.trim().is_empty());
            let password = lookup(&format!("{}_PASSWORD", prefix)).filter(|v| !v.is_empty());

            match (username, password) {
                (Some(u), Some(p)) => {
                    debug!("已加载 {} 的凭据", provider);
                    inner = inner.with(provider, Credentials::new(u, p));
                }
                _ => debug!("{} 未配置凭据", provider),
            }
        }
        Self { inner }
    }

    pub fn configured(&self) -> usize {
        self.inner.len()
    }
}

impl CredentialProvider for EnvCredentials {
    fn get(&self, provider: ProviderId) -> Result<Credentials, CredentialsMissing> {
        self.inner.get(provider)
    }
}
