//! 登录状态持久化
//!
//! 每个供应商一个 `<slug>_session.json`：保存时间、过期时间和 cookies。
//! 过期时间取 cookies 中最晚的过期时间，没有时默认 7 天。

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration as ChronoDuration, Local, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::error::StorageError;
use crate::models::ProviderId;

const DEFAULT_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedSession {
    pub provider: ProviderId,
    pub saved_at: DateTime<Local>,
    pub expires_at: DateTime<Local>,
    pub cookies: JsonValue,
}

impl SavedSession {
    pub fn new(provider: ProviderId, cookies: JsonValue, now: DateTime<Local>) -> Self {
        let expires_at = latest_cookie_expiry(&cookies)
            .unwrap_or_else(|| now + ChronoDuration::days(DEFAULT_TTL_DAYS));
        Self {
            provider,
            saved_at: now,
            expires_at,
            cookies,
        }
    }

    pub fn is_expired(&self, now: DateTime<Local>) -> bool {
        now > self.expires_at
    }

    pub fn cookie_count(&self) -> usize {
        self.cookies.as_array().map_or(0, Vec::len)
    }
}

/// cookies 中最晚的 `expires`（秒级时间戳，<= 0 为会话 cookie）
fn latest_cookie_expiry(cookies: &JsonValue) -> Option<DateTime<Local>> {
    cookies
        .as_array()?
        .iter()
        .filter_map(|c| c.get("expires").and_then(JsonValue::as_f64))
        .filter(|exp| *exp > 0.0)
        .fold(None, |latest: Option<f64>, exp| Some(latest.map_or(exp, |l| l.max(exp))))
        .and_then(|secs| Local.timestamp_opt(secs as i64, 0).single())
}

/// 会话文件目录，跨执行共享
pub struct SessionStateStore {
    dir: PathBuf,
}

impl SessionStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, provider: ProviderId) -> PathBuf {
        self.dir.join(format!("{}_session.json", provider.slug()))
    }

    /// 读取未过期的 cookies；文件缺失、损坏或过期时返回 None
    pub async fn load(&self, provider: ProviderId) -> Option<JsonValue> {
        let path = self.path_for(provider);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(_) => {
                debug!("[{}] 没有保存的会话", provider);
                return None;
            }
        };

        let saved: SavedSession = match serde_json::from_str(&content) {
            Ok(saved) => saved,
            Err(e) => {
                warn!("⚠️ [{}] 会话文件无法解析 {}: {}", provider, path.display(), e);
                return None;
            }
        };

        if saved.is_expired(Local::now()) {
            info!("[{}] 保存的会话已过期 ({})", provider, saved.expires_at);
            return None;
        }

        info!(
            "🍪 [{}] 载入保存的会话: {} 个 cookies, 保存于 {}",
            provider,
            saved.cookie_count(),
            saved.saved_at.format("%Y-%m-%d %H:%M:%S")
        );
        Some(saved.cookies)
    }

    /// 覆盖保存，返回文件路径
    pub async fn save(&self, provider: ProviderId, cookies: JsonValue) -> Result<PathBuf, StorageError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let saved = SavedSession::new(provider, cookies, Local::now());
        let path = self.path_for(provider);
        tokio::fs::write(&path, serde_json::to_string_pretty(&saved)?).await?;

        debug!(
            "[{}] 会话已保存: {} 个 cookies, 过期 {}",
            provider,
            saved.cookie_count(),
            saved.expires_at
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expiry_from_latest_cookie() {
        let now = Local.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        let later = now + ChronoDuration::days(30);
        let cookies = json!([
            {"name": "JSESSIONID", "expires": -1.0},
            {"name": "masa", "expires": later.timestamp() as f64},
            {"name": "old", "expires": (now.timestamp() - 10) as f64},
        ]);

        let saved = SavedSession::new(ProviderId::Monroe, cookies, now);
        assert_eq!(saved.expires_at, later);
        assert_eq!(saved.cookie_count(), 3);
        assert!(!saved.is_expired(now));
    }

    #[test]
    fn test_session_cookies_only_use_default_ttl() {
        let now = Local.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        let saved = SavedSession::new(ProviderId::Monroe, json!([{"name": "a", "expires": -1.0}]), now);
        assert_eq!(saved.expires_at, now + ChronoDuration::days(7));
        assert!(saved.is_expired(now + ChronoDuration::days(8)));
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStateStore::new(dir.path().join("sessions"));
        assert!(store.load(ProviderId::Monroe).await.is_none());

        let cookies = json!([{"name": "masa", "value": "1", "expires": -1.0}]);
        let path = store.save(ProviderId::Monroe, cookies.clone()).await.unwrap();

        assert_eq!(path, dir.path().join("sessions/monroe_session.json"));
        assert_eq!(store.load(ProviderId::Monroe).await, Some(cookies));
        assert!(store.load(ProviderId::Suizo).await.is_none());
    }

    #[tokio::test]
    async fn test_expired_or_corrupt_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStateStore::new(dir.path());

        let stale = SavedSession::new(
            ProviderId::Monroe,
            json!([]),
            Local::now() - ChronoDuration::days(30),
        );
        tokio::fs::write(
            store.path_for(ProviderId::Monroe),
            serde_json::to_string(&stale).unwrap(),
        )
        .await
        .unwrap();
        assert!(store.load(ProviderId::Monroe).await.is_none());

        tokio::fs::write(store.path_for(ProviderId::Suizo), "{not json")
            .await
            .unwrap();
        assert!(store.load(ProviderId::Suizo).await.is_none());
    }
}
