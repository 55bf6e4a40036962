//! # 片段存储
//!
//! 持久化存储不属于本服务的核心，这里只定义处理器依赖的 `SnippetStore` 接口，
//! 并提供一个进程内的实现。

use std::sync::Mutex;

use chrono::{DateTime, Duration, Local};
use log::{debug, warn};
use serde_derive::Serialize;

use crate::exception::Exception;

/// `latest` 返回的最大条数
pub const LATEST_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snippet {
    pub id: u64,
    pub title: String,
    pub content: String,
    pub created: DateTime<Local>,
    pub expires: DateTime<Local>,
}

#[cfg_attr(test, mockall::automock)]
pub trait SnippetStore: Send + Sync {
    /// 插入一条新片段，返回其 ID。
    fn insert(&self, title: &str, content: &str, expires_days: i64) -> Result<u64, Exception>;

    /// 读取一条未过期的片段。不存在或已过期时返回 `Exception::NoRecord`。
    fn get(&self, id: u64) -> Result<Snippet, Exception>;

    /// 最近创建的未过期片段，按创建时间倒序，最多 `LATEST_LIMIT` 条。
    fn latest(&self) -> Result<Vec<Snippet>, Exception>;
}

#[derive(Default)]
pub struct MemorySnippetStore {
    snippets: Mutex<Vec<Snippet>>,
}

impl MemorySnippetStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Snippet>> {
        match self.snippets.lock() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("片段存储锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        }
    }
}

impl SnippetStore for MemorySnippetStore {
    fn insert(&self, title: &str, content: &str, expires_days: i64) -> Result<u64, Exception> {
        let created = Local::now();
        let expires = Duration::try_days(expires_days)
            .and_then(|d| created.checked_add_signed(d))
            .ok_or_else(|| Exception::Storage(format!("无效的过期天数：{}", expires_days)))?;
        let mut snippets = self.lock();
        let id = snippets.len() as u64 + 1;
        snippets.push(Snippet {
            id,
            title: title.to_string(),
            content: content.to_string(),
            created,
            expires,
        });
        debug!("片段{}已写入，{}天后过期", id, expires_days);
        Ok(id)
    }

    fn get(&self, id: u64) -> Result<Snippet, Exception> {
        let now = Local::now();
        self.lock()
            .iter()
            .find(|s| s.id == id && s.expires > now)
            .cloned()
            .ok_or(Exception::NoRecord)
    }

    fn latest(&self) -> Result<Vec<Snippet>, Exception> {
        let now = Local::now();
        let snippets = self.lock();
        Ok(snippets
            .iter()
            .rev()
            .filter(|s| s.expires > now)
            .take(LATEST_LIMIT)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let store = MemorySnippetStore::new();
        let id = store.insert("An old silent pond", "A frog jumps in", 7).unwrap();
        assert_eq!(id, 1);
        let snippet = store.get(id).unwrap();
        assert_eq!(snippet.title, "An old silent pond");
        assert_eq!((snippet.expires - snippet.created).num_days(), 7);
    }

    #[test]
    fn test_get_missing() {
        let store = MemorySnippetStore::new();
        assert_eq!(store.get(42), Err(Exception::NoRecord));
    }

    #[test]
    fn test_expired_snippet_is_hidden() {
        let store = MemorySnippetStore::new();
        let id = store.insert("gone", "already expired", 0).unwrap();
        assert_eq!(store.get(id), Err(Exception::NoRecord));
        assert!(store.latest().unwrap().is_empty());
    }

    #[test]
    fn test_latest_order_and_limit() {
        let store = MemorySnippetStore::new();
        for i in 0..12 {
            store.insert(&format!("title {}", i), "content", 365).unwrap();
        }
        let latest = store.latest().unwrap();
        assert_eq!(latest.len(), LATEST_LIMIT);
        assert_eq!(latest[0].id, 12);
        assert_eq!(latest[9].id, 3);
    }
}
