//! # 会话与闪现消息
//!
//! 会话存储只服务于闪现消息：写入一次，下一次读取后即删除。
//! 会话令牌是 128 位随机数，存放在 `session` Cookie 中；会话在空闲超过生命周期后失效。

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
    time::{Duration, Instant},
};

use log::{debug, warn};
use rand::Rng;

struct Session {
    flash: Option<String>,
    expires: Instant,
}

pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    lifetime: Duration,
}

impl SessionStore {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            lifetime,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        match self.sessions.lock() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("会话存储锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        }
    }

    fn new_token() -> String {
        format!("{:032x}", rand::thread_rng().gen::<u128>())
    }

    /// 写入闪现消息，返回实际使用的会话令牌。
    ///
    /// 令牌缺失或已失效时创建新会话，调用方需要把新令牌写回 Cookie。
    pub fn put_flash(&self, token: Option<&str>, message: &str) -> String {
        let now = Instant::now();
        let mut sessions = self.lock();
        sessions.retain(|_, s| s.expires > now);
        let token = match token {
            Some(t) if sessions.contains_key(t) => t.to_string(),
            _ => Self::new_token(),
        };
        debug!("会话{}写入闪现消息", &token[..8.min(token.len())]);
        sessions.insert(
            token.clone(),
            Session {
                flash: Some(message.to_string()),
                expires: now + self.lifetime,
            },
        );
        token
    }

    /// 取出并删除闪现消息。访问会刷新会话的空闲期限。
    pub fn pop_flash(&self, token: Option<&str>) -> Option<String> {
        let token = token?;
        let now = Instant::now();
        let mut sessions = self.lock();
        let session = sessions.get_mut(token)?;
        if session.expires <= now {
            sessions.remove(token);
            return None;
        }
        session.expires = now + self.lifetime;
        session.flash.take()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
