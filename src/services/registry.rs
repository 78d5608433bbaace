use std::collections::HashMap;
use std::sync::Arc;

use crate::models::ProviderId;
use crate::services::adapter::ProviderAdapter;
use crate::services::del_sud::DelSudAdapter;
use crate::services::monroe::MonroeAdapter;
use crate::services::portal::PortalSettings;
use crate::services::suizo::SuizoAdapter;

/// 供应商 → 适配器
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<ProviderId, Arc<dyn ProviderAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 三个门户的默认适配器
    pub fn with_defaults(settings: &PortalSettings) -> Self {
        Self::new()
            .register(Arc::new(SuizoAdapter::new(settings)))
            .register(Arc::new(DelSudAdapter::new(settings)))
            .register(Arc::new(MonroeAdapter::new(settings)))
    }

    /// 注册（同一供应商后注册的覆盖先注册的）
    pub fn register(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(adapter.provider(), adapter);
        self
    }

    pub fn get(&self, provider: ProviderId) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&provider).cloned()
    }

    pub fn providers(&self) -> Vec<ProviderId> {
        let mut providers: Vec<ProviderId> = self.adapters.keys().copied().collect();
        providers.sort();
        providers
    }
}
