//! In-memory session map keyed by user id.
//!
//! Each user owns one `SearchSession` behind its own mutex, so a user's
//! events are handled one at a time while different users proceed in
//! parallel. The DashMap shard lock is only held long enough to clone the
//! session handle out. Abandoned sessions are dropped by:
//!   1. Terminal errors (remove)
//!   2. A periodic background sweep (evict_idle / evict_stale)

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::session::{ConversationState, SearchSession};

/// A single cached session entry.
pub struct CachedSession {
    pub session: SearchSession,
    pub last_access: Instant,
}

impl CachedSession {
    fn new() -> Self {
        Self {
            session: SearchSession::new(),
            last_access: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_access = Instant::now();
    }
}

pub type SessionHandle = Arc<Mutex<CachedSession>>;

/// Thread-safe map of live sessions, keyed by user id.
pub struct SessionCache {
    entries: DashMap<i64, SessionHandle>,
    idle_timeout: Duration,
    max_entries: usize,
}

impl SessionCache {
    pub fn new(idle_timeout: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            idle_timeout,
            max_entries,
        }
    }

    /// Replace the user's session with a fresh one in the `Search` state.
    pub fn reset(&self, user_id: i64) -> SessionHandle {
        let handle = Arc::new(Mutex::new(CachedSession::new()));
        self.entries.insert(user_id, Arc::clone(&handle));
        handle
    }

    pub fn get(&self, user_id: i64) -> Option<SessionHandle> {
        self.entries.get(&user_id).map(|e| Arc::clone(e.value()))
    }

    pub fn get_or_create(&self, user_id: i64) -> SessionHandle {
        let entry = self
            .entries
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(CachedSession::new())));
        Arc::clone(entry.value())
    }

    /// Discard a session. Only removes the entry if it is still `handle`,
    /// so a concurrent `/start` is never undone.
    pub fn remove(&self, user_id: i64, handle: &SessionHandle) {
        self.entries
            .remove_if(&user_id, |_, current| Arc::ptr_eq(current, handle));
    }

    /// Whether `handle` is still the session stored for `user_id`. A handle
    /// evicted or replaced after it was cloned out is detached.
    pub fn is_live(&self, user_id: i64, handle: &SessionHandle) -> bool {
        self.entries
            .get(&user_id)
            .is_some_and(|current| Arc::ptr_eq(current.value(), handle))
    }

    /// Run `f` on the user's session under its lock and return the handle
    /// used. A handle detached between lookup and lock is never used: the
    /// lookup is retried, so an evicted session yields `None`.
    pub fn with_session<R>(
        &self,
        user_id: i64,
        f: impl FnOnce(&mut SearchSession) -> R,
    ) -> Option<(SessionHandle, R)> {
        loop {
            let handle = self.get(user_id)?;
            let mut entry = handle.lock();
            if self.is_live(user_id, &handle) {
                entry.touch();
                let result = f(&mut entry.session);
                drop(entry);
                return Some((handle, result));
            }
            log::debug!("[SESSIONS] Session of user {} was detached before use, retrying", user_id);
        }
    }

    /// Like [`with_session`](Self::with_session), creating the session when
    /// missing. A detached handle is dropped and the lookup retried.
    pub fn with_session_or_create<R>(
        &self,
        user_id: i64,
        f: impl FnOnce(&mut SearchSession) -> R,
    ) -> (SessionHandle, R) {
        loop {
            let handle = self.get_or_create(user_id);
            let mut entry = handle.lock();
            if self.is_live(user_id, &handle) {
                entry.touch();
                let result = f(&mut entry.session);
                drop(entry);
                return (handle, result);
            }
        }
    }

    pub fn state_of(&self, user_id: i64) -> Option<ConversationState> {
        self.get(user_id).map(|handle| handle.lock().session.state)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drop sessions idle for longer than the idle timeout. Sessions that
    /// are being processed right now are skipped.
    pub fn evict_idle(&self) -> usize {
        let before = self.entries.len();
        let timeout = self.idle_timeout;
        self.entries.retain(|_, handle| match handle.try_lock() {
            Some(entry) => entry.last_access.elapsed() < timeout,
            None => true,
        });
        before.saturating_sub(self.entries.len())
    }

    /// Evict the least recently used sessions when over `max_entries`.
    pub fn evict_stale(&self) -> usize {
        if self.entries.len() <= self.max_entries {
            return 0;
        }

        let mut entries: Vec<(i64, Instant)> = self
            .entries
            .iter()
            .filter_map(|e| e.value().try_lock().map(|s| (*e.key(), s.last_access)))
            .collect();
        // Oldest first
        entries.sort_by_key(|&(_, t)| t);

        let to_evict = self.entries.len().saturating_sub(self.max_entries);
        let mut evicted = 0;
        for (user_id, seen) in entries.into_iter().take(to_evict) {
            // Skip sessions that got busy or were used since the scan
            let removed = self.entries.remove_if(&user_id, |_, handle| {
                handle.try_lock().is_some_and(|s| s.last_access == seen)
            });
            if removed.is_some() {
                evicted += 1;
            }
        }
        evicted
    }

    /// Spawn a background task that periodically evicts abandoned sessions.
    pub fn start_idle_evictor(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // skip immediate tick
            loop {
                ticker.tick().await;
                let idle = cache.evict_idle();
                let stale = cache.evict_stale();
                if idle + stale > 0 {
                    log::debug!(
                        "[SESSIONS] Evicted {} idle and {} stale sessions, {} live",
                        idle,
                        stale,
                        cache.len()
                    );
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_replaces_session() {
        let cache = SessionCache::new(Duration::from_secs(60), 10);
        let first = cache.reset(1);
        first.lock().session.state = ConversationState::Note;

        cache.reset(1);
        assert_eq!(cache.state_of(1), Some(ConversationState::Search));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_remove_only_drops_matching_handle() {
        let cache = SessionCache::new(Duration::from_secs(60), 10);
        let stale = cache.reset(1);
        let fresh = cache.reset(1);

        cache.remove(1, &stale);
        assert!(cache.get(1).is_some());

        cache.remove(1, &fresh);
        assert!(!cache.get(1).is_some());
        assert_eq!(cache.state_of(1), None);
    }

    #[test]
    fn test_get_or_create() {
        let cache = SessionCache::new(Duration::from_secs(60), 10);
        assert!(cache.get(7).is_none());
        let a = cache.get_or_create(7);
        let b = cache.get_or_create(7);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_evict_idle_skips_busy_sessions() {
        let cache = SessionCache::new(Duration::from_millis(0), 10);
        cache.reset(1);
        let busy = cache.reset(2);

        let guard = busy.lock();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.evict_idle(), 1);
        drop(guard);

        assert!(!cache.get(1).is_some());
        assert!(cache.get(2).is_some());
    }

    #[test]
    fn test_evicted_handle_is_detached() {
        let cache = SessionCache::new(Duration::from_millis(0), 10);
        let stale = cache.get_or_create(1);
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(cache.evict_idle(), 1);

        // A step that cloned the handle before the sweep must not use it
        assert!(!cache.is_live(1, &stale));
        assert!(cache.with_session(1, |s| s.state = ConversationState::Note).is_none());
        stale.lock().session.state = ConversationState::DeleteNote;
        assert_eq!(cache.state_of(1), None);

        let (fresh, state) = cache.with_session_or_create(1, |s| s.state);
        assert_eq!(state, ConversationState::Search);
        assert!(cache.is_live(1, &fresh));
        assert!(!Arc::ptr_eq(&fresh, &stale));
    }

    #[test]
    fn test_replaced_handle_is_detached() {
        let cache = SessionCache::new(Duration::from_secs(60), 10);
        let old = cache.reset(1);
        cache.reset(1);

        assert!(!cache.is_live(1, &old));
        let (handle, ()) = cache
            .with_session(1, |s| s.state = ConversationState::ChooseResult)
            .unwrap();
        assert!(cache.is_live(1, &handle));
        assert_eq!(cache.state_of(1), Some(ConversationState::ChooseResult));
        assert_eq!(old.lock().session.state, ConversationState::Search);
    }

    #[test]
    fn test_evict_stale_keeps_most_recent() {
        let cache = SessionCache::new(Duration::from_secs(60), 2);
        for user_id in 1..=4 {
            cache.reset(user_id);
            std::thread::sleep(Duration::from_millis(2));
        }

        assert_eq!(cache.evict_stale(), 2);
        assert!(!cache.get(1).is_some());
        assert!(!cache.get(2).is_some());
        assert!(cache.get(3).is_some());
        assert!(cache.get(4).is_some());
    }
}
