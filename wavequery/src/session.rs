// Copyright 2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//! # Sessions
//! A session is one opened waveform plus its bookkeeping. The [`SessionRegistry`] owns all
//! sessions, enforces the session limit and expires sessions that have been idle for too long.

use crate::cache::{SignalCache, DEFAULT_CACHE_CAPACITY};
use crate::store::{Trace, WaveformStore};
use crate::{Hierarchy, LoadOptions, QueryError, Result, Time, TimeIndex, Var};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub type SessionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub max_sessions: usize,
    /// Sessions idle for longer than this are removed when the registry runs full.
    #[serde(with = "duration_secs")]
    pub session_timeout: Duration,
    pub cache_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_sessions: 10,
            session_timeout: Duration::from_secs(60 * 60),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: u64,
    pub time: Time,
    pub label: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub signals: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Bookmarks {
    /// ids are never reused, even after a bookmark was removed
    next_id: u64,
    entries: Vec<Bookmark>,
}

struct AccessTime {
    instant: Instant,
    wall: DateTime<Utc>,
}

pub struct Session {
    id: SessionId,
    path: PathBuf,
    trace: Arc<dyn Trace>,
    time_index: TimeIndex,
    options: LoadOptions,
    created_at: DateTime<Utc>,
    last_accessed: Mutex<AccessTime>,
    bookmarks: Mutex<Bookmarks>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("time_index", &self.time_index)
            .finish()
    }
}

impl Session {
    fn new(id: SessionId, path: PathBuf, trace: Arc<dyn Trace>, options: LoadOptions) -> Self {
        let time_index = TimeIndex::new(trace.time_source());
        let now = Utc::now();
        Self {
            id,
            path,
            trace,
            time_index,
            options,
            created_at: now,
            last_accessed: Mutex::new(AccessTime {
                instant: Instant::now(),
                wall: now,
            }),
            bookmarks: Mutex::new(Bookmarks::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Absolute path of the waveform file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn trace(&self) -> &dyn Trace {
        self.trace.as_ref()
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        self.trace.hierarchy()
    }

    pub fn time_index(&self) -> &TimeIndex {
        &self.time_index
    }

    pub fn options(&self) -> LoadOptions {
        self.options
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_accessed(&self) -> DateTime<Utc> {
        self.last_accessed.lock().wall
    }

    pub fn idle_time(&self) -> Duration {
        self.last_accessed.lock().instant.elapsed()
    }

    fn touch(&self) {
        let mut access = self.last_accessed.lock();
        access.instant = Instant::now();
        // the wall clock may jump backwards, the access time must not
        access.wall = access.wall.max(Utc::now());
    }

    /// Resolves a dot separated variable path.
    pub fn lookup_var(&self, path: &str) -> Result<&Var> {
        let h = self.hierarchy();
        h.lookup_var(path)
            .map(|r| &h[r])
            .ok_or_else(|| QueryError::SignalNotFound {
                path: path.to_string(),
            })
    }

    pub fn add_bookmark(
        &self,
        time: Time,
        label: impl Into<String>,
        notes: Option<String>,
        signals: Vec<String>,
    ) -> Bookmark {
        let mut bookmarks = self.bookmarks.lock();
        let bookmark = Bookmark {
            id: bookmarks.next_id,
            time,
            label: label.into(),
            notes,
            signals,
            created_at: Utc::now(),
        };
        bookmarks.next_id += 1;
        bookmarks.entries.push(bookmark.clone());
        bookmark
    }

    pub fn bookmarks(&self) -> Vec<Bookmark> {
        self.bookmarks.lock().entries.clone()
    }

    pub fn remove_bookmark(&self, id: u64) -> bool {
        let mut bookmarks = self.bookmarks.lock();
        let before = bookmarks.entries.len();
        bookmarks.entries.retain(|b| b.id != id);
        bookmarks.entries.len() != before
    }

    /// Appends previously saved bookmarks, keeping their ids.
    pub(crate) fn restore_bookmarks(&self, restored: impl IntoIterator<Item = Bookmark>) -> usize {
        let mut bookmarks = self.bookmarks.lock();
        let mut count = 0;
        for bookmark in restored {
            bookmarks.next_id = bookmarks.next_id.max(bookmark.id + 1);
            bookmarks.entries.push(bookmark);
            count += 1;
        }
        count
    }
}

/// Owns all open sessions and the signal cache they share.
pub struct SessionRegistry {
    store: Arc<dyn WaveformStore>,
    config: RegistryConfig,
    sessions: RwLock<FxHashMap<SessionId, Arc<Session>>>,
    cache: Arc<SignalCache>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn WaveformStore>, config: RegistryConfig) -> Self {
        Self {
            store,
            config,
            sessions: RwLock::new(FxHashMap::default()),
            cache: Arc::new(SignalCache::new(config.cache_capacity)),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn cache(&self) -> &SignalCache {
        &self.cache
    }

    /// Opens a waveform into a new session. When the registry is full, expired sessions
    /// are removed first.
    pub fn open(&self, path: impl AsRef<Path>, options: LoadOptions) -> Result<Arc<Session>> {
        let path = path.as_ref();
        self.store.check_path(path)?;
        self.ensure_capacity()?;

        let trace = self.store.open(path, &options)?;
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let id = uuid::Uuid::new_v4().to_string();
        let session = Arc::new(Session::new(id.clone(), absolute, trace, options));

        let mut sessions = self.sessions.write();
        // another open may have raced us while the file was loading
        if sessions.len() >= self.config.max_sessions {
            return Err(self.limit_exceeded());
        }
        sessions.insert(id.clone(), session.clone());
        tracing::info!(
            session_id = %id,
            path = %session.path().display(),
            open_sessions = sessions.len(),
            "opened session"
        );
        Ok(session)
    }

    fn ensure_capacity(&self) -> Result<()> {
        if self.count() < self.config.max_sessions {
            return Ok(());
        }
        self.sweep_expired(self.config.session_timeout);
        if self.count() < self.config.max_sessions {
            Ok(())
        } else {
            Err(self.limit_exceeded())
        }
    }

    fn limit_exceeded(&self) -> QueryError {
        tracing::warn!(
            max_sessions = self.config.max_sessions,
            "session limit reached"
        );
        QueryError::SessionLimitExceeded {
            max_sessions: self.config.max_sessions,
        }
    }

    /// Looks up a session and updates its access time.
    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        let session = self.sessions.read().get(id).cloned()?;
        session.touch();
        Some(session)
    }

    /// Like [`SessionRegistry::get`] but fails with `SessionNotFound`.
    pub fn require(&self, id: &str) -> Result<Arc<Session>> {
        self.get(id).ok_or_else(|| QueryError::SessionNotFound {
            session_id: id.to_string(),
        })
    }

    pub fn close(&self, id: &str) -> bool {
        let removed = self.sessions.write().remove(id);
        match removed {
            Some(_) => {
                let evicted = self.cache.evict_session(id);
                tracing::info!(session_id = %id, evicted_signals = evicted, "closed session");
                true
            }
            None => false,
        }
    }

    /// Does not update the access time.
    pub fn contains(&self, id: &str) -> bool {
        self.sessions.read().contains_key(id)
    }

    pub fn list(&self) -> Vec<SessionId> {
        self.sessions.read().keys().cloned().collect()
    }

    /// All open sessions, without touching their access times.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.read().values().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Removes every session that was idle for longer than `timeout`.
    pub fn sweep_expired(&self, timeout: Duration) -> usize {
        let expired: Vec<SessionId> = {
            let mut sessions = self.sessions.write();
            let expired: Vec<SessionId> = sessions
                .values()
                .filter(|s| s.idle_time() > timeout)
                .map(|s| s.id.clone())
                .collect();
            for id in expired.iter() {
                sessions.remove(id);
            }
            expired
        };
        for id in expired.iter() {
            self.cache.evict_session(id);
        }
        if !expired.is_empty() {
            tracing::info!(expired = expired.len(), "removed expired sessions");
        }
        expired.len()
    }

    pub fn close_all(&self) -> usize {
        let count = {
            let mut sessions = self.sessions.write();
            let count = sessions.len();
            sessions.clear();
            count
        };
        self.cache.clear();
        tracing::info!(closed = count, "closed all sessions");
        count
    }
}
