// Copyright 2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//! # Persistence
//! JSON snapshots of a session (file, load options and bookmarks) and reusable signal
//! list configurations.

use crate::{Bookmark, LoadOptions, QueryEngine, QueryError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::PathBuf;

pub const SNAPSHOT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotConfig {
    pub multi_threaded: bool,
    pub remove_empty_scopes: bool,
}

impl From<LoadOptions> for SnapshotConfig {
    fn from(value: LoadOptions) -> Self {
        Self {
            multi_threaded: value.multi_thread,
            remove_empty_scopes: value.remove_scopes_with_empty_name,
        }
    }
}

impl From<SnapshotConfig> for LoadOptions {
    fn from(value: SnapshotConfig) -> Self {
        Self {
            multi_thread: value.multi_threaded,
            remove_scopes_with_empty_name: value.remove_empty_scopes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub version: String,
    pub session_id: String,
    pub saved_at: DateTime<Utc>,
    pub file_path: PathBuf,
    pub config: SnapshotConfig,
    #[serde(default)]
    pub bookmarks: Vec<Bookmark>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoredSession {
    pub session_id: String,
    pub file_path: PathBuf,
    pub original_session_id: String,
    pub saved_at: DateTime<Utc>,
    pub bookmarks_restored: usize,
}

/// Writes a snapshot of the session as pretty printed JSON.
pub fn save_state(
    engine: &QueryEngine,
    session_id: &str,
    out: impl Write,
) -> Result<SessionSnapshot> {
    let session = engine.registry().require(session_id)?;
    let snapshot = SessionSnapshot {
        version: SNAPSHOT_VERSION.to_string(),
        session_id: session.id().to_string(),
        saved_at: Utc::now(),
        file_path: session.path().to_path_buf(),
        config: session.options().into(),
        bookmarks: session.bookmarks(),
    };
    serde_json::to_writer_pretty(out, &snapshot)?;
    Ok(snapshot)
}

/// Reopens the waveform of a snapshot in a fresh session.
pub fn load_state(
    engine: &QueryEngine,
    input: impl Read,
    restore_bookmarks: bool,
) -> Result<RestoredSession> {
    let snapshot: SessionSnapshot = serde_json::from_reader(input)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(QueryError::InvalidParameter {
            name: "version",
            reason: format!(
                "unsupported snapshot version {}, expected {SNAPSHOT_VERSION}",
                snapshot.version
            ),
        });
    }
    let session = engine
        .registry()
        .open(&snapshot.file_path, snapshot.config.into())?;
    let bookmarks_restored = if restore_bookmarks {
        session.restore_bookmarks(snapshot.bookmarks)
    } else {
        0
    };
    tracing::info!(
        session_id = %session.id(),
        original_session_id = %snapshot.session_id,
        bookmarks_restored,
        "restored session"
    );
    Ok(RestoredSession {
        session_id: session.id().to_string(),
        file_path: session.path().to_path_buf(),
        original_session_id: snapshot.session_id,
        saved_at: snapshot.saved_at,
        bookmarks_restored,
    })
}

/// A named selection of signals, optionally grouped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalList {
    pub signals: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub groups: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub filters: Map<String, JsonValue>,
    pub metadata: Map<String, JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalListValidation {
    pub total_signals: usize,
    pub valid_signals: usize,
    /// `None` when every path resolved.
    pub invalid_signals: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadedSignalList {
    /// Only the paths that exist in the session's hierarchy.
    #[serde(flatten)]
    pub list: SignalList,
    pub validation: SignalListValidation,
}

/// Reads a signal list and drops every path that does not exist in the session.
pub fn load_signal_list(
    engine: &QueryEngine,
    session_id: &str,
    input: impl Read,
) -> Result<LoadedSignalList> {
    let session = engine.registry().require(session_id)?;
    let list: SignalList = serde_json::from_reader(input)?;
    let h = session.hierarchy();

    let mut total_signals = 0;
    let mut invalid = Vec::new();
    let mut keep_valid = |paths: Vec<String>| -> Vec<String> {
        total_signals += paths.len();
        let (valid, unknown): (Vec<_>, Vec<_>) =
            paths.into_iter().partition(|p| h.lookup_var(p).is_some());
        invalid.extend(unknown);
        valid
    };
    let signals = keep_valid(list.signals);
    let groups: BTreeMap<String, Vec<String>> = list
        .groups
        .into_iter()
        .map(|(name, paths)| (name, keep_valid(paths)))
        .collect();

    let valid_signals = signals.len() + groups.values().map(Vec::len).sum::<usize>();
    Ok(LoadedSignalList {
        list: SignalList {
            signals,
            groups,
            filters: list.filters,
            metadata: list.metadata,
        },
        validation: SignalListValidation {
            total_signals,
            valid_signals,
            invalid_signals: (!invalid.is_empty()).then_some(invalid),
        },
    })
}

/// Writes a signal list after checking that all of its top level signals exist.
/// Empty metadata is replaced by the creator and the session id.
pub fn save_signal_list(
    engine: &QueryEngine,
    session_id: &str,
    out: impl Write,
    mut list: SignalList,
) -> Result<SignalList> {
    let session = engine.registry().require(session_id)?;
    for path in list.signals.iter() {
        session.lookup_var(path)?;
    }
    if list.metadata.is_empty() {
        list.metadata
            .insert("created_by".to_string(), env!("CARGO_PKG_NAME").into());
        list.metadata
            .insert("session_id".to_string(), session_id.into());
    }
    serde_json::to_writer_pretty(out, &list)?;
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_config_names() {
        let config: SnapshotConfig = LoadOptions::default().into();
        let json = serde_json::to_value(config).unwrap();
        assert_eq!(json["multi_threaded"], true);
        assert_eq!(json["remove_empty_scopes"], false);
        assert_eq!(LoadOptions::from(config), LoadOptions::default());
    }

    #[test]
    fn test_signal_list_defaults() {
        let list: SignalList = serde_json::from_str(r#"{"signals": ["top.clk"]}"#).unwrap();
        assert_eq!(list.signals, ["top.clk"]);
        assert!(list.groups.is_empty());
        assert!(list.metadata.is_empty());
    }
}
