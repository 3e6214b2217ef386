// Copyright 2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//
// Session lifecycle, waveform metadata and bookmarks.

use super::{round_to, QueryEngine};
use crate::session::Session;
use crate::{Bookmark, CacheUsage, LoadOptions, QueryError, Result, Time, TimeRange};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Number of cached paths listed by [`QueryEngine::cache_stats`].
const CACHED_PATHS_SHOWN: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenedWaveform {
    pub session_id: String,
    pub format: String,
    pub file_path: PathBuf,
    pub num_variables: usize,
    pub time_range: TimeRange,
    pub timescale: Option<String>,
    pub date: String,
    pub version: String,
}

impl OpenedWaveform {
    fn new(session: &Session) -> Self {
        let h = session.hierarchy();
        Self {
            session_id: session.id().to_string(),
            format: h.file_format().to_string(),
            file_path: session.path().to_path_buf(),
            num_variables: h.num_vars(),
            time_range: session.time_index().range(),
            timescale: h.timescale().map(str::to_string),
            date: h.date().to_string(),
            version: h.version().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionList {
    pub sessions: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WaveformInfo {
    pub session_id: String,
    pub file_path: PathBuf,
    pub format: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub timescale: Option<String>,
    pub date: String,
    pub version: String,
    pub time_range: TimeRange,
    pub num_top_scopes: usize,
    pub num_variables: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileInfo {
    pub format: String,
    pub path: PathBuf,
    pub size_bytes: Option<u64>,
    pub size_mb: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeInfo {
    pub start_time: Option<Time>,
    pub end_time: Option<Time>,
    pub duration: Option<Time>,
    pub time_points: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HierarchyStats {
    pub total_scopes: usize,
    pub total_variables: usize,
    pub max_depth: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaveformStatistics {
    pub session_id: String,
    pub file_info: FileInfo,
    pub time_info: TimeInfo,
    pub hierarchy_stats: HierarchyStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    /// Cached signals of this session.
    pub cache_size: usize,
    pub cache_max: usize,
    /// Share of the whole cache used by this session, in percent.
    pub utilization: f64,
    /// Most recently used first, at most 20 entries.
    pub cached_signals: Vec<String>,
    pub total_cached: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionMemory {
    pub session_id: String,
    pub file_path: PathBuf,
    pub age_seconds: u64,
    pub idle_seconds: u64,
    pub cache: CacheUsage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheMemory {
    pub signal_cache_size: usize,
    pub signal_cache_max: usize,
    /// In percent.
    pub cache_utilization: f64,
    pub cached_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryUsage {
    pub total_sessions: usize,
    pub max_sessions: usize,
    pub sessions: Vec<SessionMemory>,
    pub cache: CacheMemory,
}

impl SessionMemory {
    fn new(session: &Session, cache: CacheUsage) -> Self {
        let age = Utc::now() - session.created_at();
        Self {
            session_id: session.id().to_string(),
            file_path: session.path().to_path_buf(),
            age_seconds: age.num_seconds().max(0) as u64,
            idle_seconds: session.idle_time().as_secs(),
            cache,
        }
    }
}

impl QueryEngine {
    pub fn open_waveform(&self, path: impl AsRef<Path>, options: LoadOptions) -> Result<OpenedWaveform> {
        let session = self.registry.open(path, options)?;
        Ok(OpenedWaveform::new(&session))
    }

    pub fn close_waveform(&self, session_id: &str) -> Result<()> {
        if self.registry.close(session_id) {
            Ok(())
        } else {
            Err(QueryError::SessionNotFound {
                session_id: session_id.to_string(),
            })
        }
    }

    pub fn list_sessions(&self) -> SessionList {
        let sessions = self.registry.list();
        SessionList {
            count: sessions.len(),
            sessions,
        }
    }

    pub fn waveform_info(&self, session_id: &str) -> Result<WaveformInfo> {
        let session = self.session(session_id)?;
        let h = session.hierarchy();
        Ok(WaveformInfo {
            session_id: session.id().to_string(),
            file_path: session.path().to_path_buf(),
            format: h.file_format().to_string(),
            created_at: session.created_at(),
            last_accessed: session.last_accessed(),
            timescale: h.timescale().map(str::to_string),
            date: h.date().to_string(),
            version: h.version().to_string(),
            time_range: session.time_index().range(),
            num_top_scopes: h.top_scopes().count(),
            num_variables: h.num_vars(),
        })
    }

    pub fn waveform_statistics(&self, session_id: &str) -> Result<WaveformStatistics> {
        let session = self.session(session_id)?;
        let h = session.hierarchy();
        let size_bytes = session.trace().file_size();
        let range = session.time_index().range();
        let duration = match (range.min_time, range.max_time) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        };
        Ok(WaveformStatistics {
            session_id: session.id().to_string(),
            file_info: FileInfo {
                format: h.file_format().to_string(),
                path: session.path().to_path_buf(),
                size_bytes,
                size_mb: size_bytes.map(|b| round_to(b as f64 / (1024.0 * 1024.0), 2)),
            },
            time_info: TimeInfo {
                start_time: range.min_time,
                end_time: range.max_time,
                duration,
                time_points: range.num_time_points,
            },
            hierarchy_stats: HierarchyStats {
                total_scopes: h.num_scopes(),
                total_variables: h.num_vars(),
                max_depth: h.max_depth(),
            },
        })
    }

    pub fn cache_stats(&self, session_id: &str) -> Result<CacheStats> {
        let session = self.session(session_id)?;
        let cache = self.registry.cache();
        let mut paths = cache.paths_for_session(session.id());
        let cache_size = paths.len();
        paths.truncate(CACHED_PATHS_SHOWN);
        Ok(CacheStats {
            cache_size,
            cache_max: cache.capacity(),
            utilization: round_to(cache_size as f64 / cache.capacity() as f64 * 100.0, 2),
            cached_signals: paths,
            total_cached: cache.len(),
        })
    }

    /// Age, idle time and cached signal memory of all sessions, or only of `session_id`.
    /// Does not count as an access to the sessions.
    pub fn memory_usage(&self, session_id: Option<&str>) -> Result<MemoryUsage> {
        let cache = self.registry.cache();
        let mut sessions: Vec<SessionMemory> = self
            .registry
            .sessions()
            .iter()
            .filter(|s| session_id.map_or(true, |id| s.id() == id))
            .map(|s| SessionMemory::new(s, cache.usage(Some(s.id()))))
            .collect();
        if let (Some(id), true) = (session_id, sessions.is_empty()) {
            return Err(QueryError::SessionNotFound {
                session_id: id.to_string(),
            });
        }
        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));

        let total = cache.usage(None);
        Ok(MemoryUsage {
            total_sessions: self.registry.count(),
            max_sessions: self.registry.config().max_sessions,
            sessions,
            cache: CacheMemory {
                signal_cache_size: total.signals,
                signal_cache_max: cache.capacity(),
                cache_utilization: round_to(
                    total.signals as f64 / cache.capacity() as f64 * 100.0,
                    2,
                ),
                cached_bytes: total.bytes,
            },
        })
    }

    pub fn add_bookmark(
        &self,
        session_id: &str,
        time: Time,
        label: &str,
        notes: Option<String>,
        signals: Vec<String>,
    ) -> Result<Bookmark> {
        let session = self.session(session_id)?;
        Ok(session.add_bookmark(time, label, notes, signals))
    }

    pub fn list_bookmarks(&self, session_id: &str) -> Result<Vec<Bookmark>> {
        Ok(self.session(session_id)?.bookmarks())
    }

    /// Returns whether a bookmark with that id existed.
    pub fn remove_bookmark(&self, session_id: &str, bookmark_id: u64) -> Result<bool> {
        Ok(self.session(session_id)?.remove_bookmark(bookmark_id))
    }
}
