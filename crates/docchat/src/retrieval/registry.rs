//! Session index registry with LRU and idle-TTL eviction

use chrono::Utc;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::{Error, Result};

use super::index::SessionIndex;

struct Slot {
    index: Arc<SessionIndex>,
    last_access: Instant,
}

impl Slot {
    fn new(session_id: &str) -> Self {
        Self {
            index: Arc::new(SessionIndex::new(session_id)),
            last_access: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.last_access) >= ttl
    }
}

/// Maps session ids to their vector index.
///
/// Holds at most `max_sessions` indexes, evicting the least recently used one
/// beyond that, and drops indexes idle for longer than `ttl`. Callers holding
/// an `Arc<SessionIndex>` keep it alive after eviction, but later lookups
/// start from an empty index.
pub struct IndexRegistry {
    sessions: Mutex<LruCache<String, Slot>>,
    ttl: Duration,
}

impl IndexRegistry {
    pub fn new(max_sessions: usize, ttl: Duration) -> Result<Self> {
        let capacity = NonZeroUsize::new(max_sessions)
            .ok_or_else(|| Error::Config("max_sessions must be > 0".to_string()))?;
        Ok(Self {
            sessions: Mutex::new(LruCache::new(capacity)),
            ttl,
        })
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        Self::new(config.max_sessions, config.ttl())
    }

    /// Fetch the session's index, creating it on first use.
    ///
    /// Concurrent first calls for one id all receive the same instance.
    pub fn get_or_create(&self, session_id: &str) -> Result<Arc<SessionIndex>> {
        validate_session_id(session_id)?;
        let now = Instant::now();
        let mut sessions = self.sessions.lock();

        if let Some(slot) = sessions.get_mut(session_id) {
            if !slot.is_expired(self.ttl, now) {
                slot.last_access = now;
                return Ok(Arc::clone(&slot.index));
            }
            tracing::info!("Session {} expired, starting a fresh index", session_id);
            sessions.pop(session_id);
        }

        let slot = Slot::new(session_id);
        let index = Arc::clone(&slot.index);
        if let Some((evicted, _)) = sessions.push(session_id.to_string(), slot) {
            tracing::info!(
                "Session limit reached ({}), evicted least recently used session {}",
                sessions.cap(),
                evicted
            );
        }
        tracing::info!("Created index for session {}", session_id);
        Ok(index)
    }

    /// Fetch an existing, unexpired index without creating one
    pub fn get(&self, session_id: &str) -> Option<Arc<SessionIndex>> {
        let now = Instant::now();
        let mut sessions = self.sessions.lock();

        let expired = match sessions.get_mut(session_id) {
            Some(slot) if !slot.is_expired(self.ttl, now) => {
                slot.last_access = now;
                return Some(Arc::clone(&slot.index));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            sessions.pop(session_id);
            tracing::info!("Session {} expired on access", session_id);
        }
        None
    }

    /// Drop a session's index. Returns whether it existed.
    pub fn evict(&self, session_id: &str) -> bool {
        let removed = self.sessions.lock().pop(session_id).is_some();
        if removed {
            tracing::info!("Evicted session {}", session_id);
        }
        removed
    }

    /// Drop every index idle for longer than the TTL
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.lock();

        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, slot)| slot.is_expired(self.ttl, now))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            sessions.pop(id);
        }

        if !expired.is_empty() {
            tracing::info!("Evicted {} idle session(s)", expired.len());
        }
        expired.len()
    }

    /// Run `evict_expired` every `interval` until the registry is dropped
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let registry: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match registry.upgrade() {
                    Some(registry) => {
                        registry.evict_expired();
                    }
                    None => break,
                }
            }
            tracing::debug!("Session sweeper stopped");
        })
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.lock().contains(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.sessions.lock().cap().get()
    }
}

/// Session ids are opaque; only emptiness is rejected
pub fn validate_session_id(session_id: &str) -> Result<()> {
    if session_id.trim().is_empty() {
        return Err(Error::InvalidSession("session id must not be empty".to_string()));
    }
    Ok(())
}

/// Generate a session id like `session_20250101120000_1a2b3c4d`
pub fn generate_session_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "session_{}_{}",
        Utc::now().format("%Y%m%d%H%M%S"),
        &suffix[..8]
    )
}
