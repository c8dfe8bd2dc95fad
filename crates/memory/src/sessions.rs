//! Per-user session store.
//!
//! A session remembers which players the user's current topic is about and
//! owns that topic's conversation memory. When the inferred player set
//! changes, the memory is dropped so the next answer starts from a clean
//! history.
//!
//! The map sits behind a `std::sync::Mutex` that is never held across an
//! await. Requests from the same user are serialized separately through
//! [`SessionStore::lock_user`].

use pitchscout_core::memory::{ConversationMemory, MemoryFactory};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use tokio::time::Instant;
use tracing::{debug, info};

/// Bounds on how many sessions are kept and for how long.
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    pub max_sessions: usize,
    pub idle_ttl: Duration,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_sessions: 1000,
            idle_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Result of comparing a newly inferred player set with the recorded one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// No players were recorded for this user before.
    FirstSeen,
    /// Same set of players (order ignored); memory kept.
    Unchanged,
    /// Different set; memory dropped and the new players recorded.
    Switched { previous: Vec<String> },
}

struct Session {
    /// `None` until the first switch detection for this user.
    last_players: Option<Vec<String>>,
    memory: Option<Arc<dyn ConversationMemory>>,
    lock: Arc<tokio::sync::Mutex<()>>,
    last_seen: Instant,
}

impl Session {
    fn new(now: Instant) -> Self {
        Self {
            last_players: None,
            memory: None,
            lock: Arc::new(tokio::sync::Mutex::new(())),
            last_seen: now,
        }
    }

    /// A session is busy while anyone holds or waits for its lock.
    fn is_busy(&self) -> bool {
        Arc::strong_count(&self.lock) > 1
    }
}

/// Process-wide store of user sessions.
pub struct SessionStore {
    factory: Arc<dyn MemoryFactory>,
    limits: SessionLimits,
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(factory: Arc<dyn MemoryFactory>, limits: SessionLimits) -> Self {
        Self {
            factory,
            limits,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn map(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        // A panic while holding the lock cannot leave a session half-written.
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Look up (or create) a session, refreshing its idle timer and
    /// enforcing the TTL and size limits.
    fn with_session<R>(&self, user_id: &str, f: impl FnOnce(&mut Session) -> R) -> R {
        let now = Instant::now();
        let mut map = self.map();
        self.evict(&mut map, now, user_id);
        let session = map
            .entry(user_id.to_string())
            .or_insert_with(|| Session::new(now));
        session.last_seen = now;
        f(session)
    }

    fn evict(&self, map: &mut HashMap<String, Session>, now: Instant, keep: &str) {
        let ttl = self.limits.idle_ttl;
        let before = map.len();
        map.retain(|id, s| id == keep || s.is_busy() || now.duration_since(s.last_seen) <= ttl);
        if map.len() < before {
            debug!(expired = before - map.len(), "Expired idle sessions");
        }

        // Make room for `keep` if it is new.
        let incoming = usize::from(!map.contains_key(keep));
        while map.len() + incoming > self.limits.max_sessions {
            let victim = map
                .iter()
                .filter(|(id, s)| id.as_str() != keep && !s.is_busy())
                .min_by_key(|(_, s)| s.last_seen)
                .map(|(id, _)| id.clone());
            match victim {
                Some(id) => {
                    debug!(user_id = %id, "Evicting least recently used session");
                    map.remove(&id);
                }
                None => break,
            }
        }
    }

    /// The user's conversation memory, created if absent.
    pub fn get_or_create(&self, user_id: &str) -> Arc<dyn ConversationMemory> {
        self.with_session(user_id, |s| {
            s.memory.get_or_insert_with(|| self.factory.create()).clone()
        })
    }

    /// The user's conversation memory, if one is live. Never creates one.
    pub fn memory(&self, user_id: &str) -> Option<Arc<dyn ConversationMemory>> {
        self.map().get(user_id).and_then(|s| s.memory.clone())
    }

    /// Drop the user's memory; the next `get_or_create` builds a new one.
    pub fn invalidate(&self, user_id: &str) {
        if let Some(session) = self.map().get_mut(user_id) {
            session.memory = None;
        }
    }

    /// The players recorded for the user's current topic, or `None` if the
    /// user has never been seen.
    pub fn last_players(&self, user_id: &str) -> Option<Vec<String>> {
        self.map().get(user_id).and_then(|s| s.last_players.clone())
    }

    pub fn set_last_players(&self, user_id: &str, players: Vec<String>) {
        self.with_session(user_id, |s| s.last_players = Some(players));
    }

    /// Compare `players` (as a set) with the recorded players and drop the
    /// memory on a topic switch.
    pub fn detect_switch(&self, user_id: &str, players: &[String]) -> SwitchOutcome {
        self.with_session(user_id, |s| {
            let Some(previous) = s.last_players.take() else {
                s.last_players = Some(players.to_vec());
                return SwitchOutcome::FirstSeen;
            };
            if same_set(&previous, players) {
                s.last_players = Some(previous);
                return SwitchOutcome::Unchanged;
            }

            info!(
                user_id,
                from = ?previous,
                to = ?players,
                "Topic switch, resetting conversation memory"
            );
            s.memory = None;
            s.last_players = Some(players.to_vec());
            SwitchOutcome::Switched { previous }
        })
    }

    /// Wait for exclusive use of the user's session. Hold the guard for the
    /// whole request so one user's questions are answered in order.
    pub async fn lock_user(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = self.with_session(user_id, |s| s.lock.clone());
        lock.lock_owned().await
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn same_set(a: &[String], b: &[String]) -> bool {
    let a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let b: HashSet<&str> = b.iter().map(String::as_str).collect();
    a == b
}
