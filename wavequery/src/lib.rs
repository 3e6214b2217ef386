// Copyright 2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//! # wavequery
//! Answers point, range, transition, causality, comparison and activity queries over
//! VCD, FST and GHW waveforms. Files are opened into sessions managed by a
//! [`SessionRegistry`]; all queries go through a [`QueryEngine`].

pub mod batch;
mod cache;
mod error;
pub mod export;
pub mod format;
mod hierarchy;
pub mod persist;
pub mod query;
mod session;
mod signal;
pub mod store;
mod time_index;

/// Cargo.toml version of this library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub type Time = u64;
pub type TimeTableIdx = u32;

#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Indicates that the loader should use multiple threads if possible.
    /// Also enables parallel per-signal scans in the query engine.
    pub multi_thread: bool,
    /// Indicates that scopes with empty names should not be part of the hierarchy.
    pub remove_scopes_with_empty_name: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            multi_thread: true,
            remove_scopes_with_empty_name: false,
        }
    }
}

pub use batch::{batch, BatchOperation, BatchQuery, BatchReport, BatchResult};
pub use cache::{CacheKey, CacheUsage, SignalCache};
pub use error::{ErrorCode, ErrorKind, ErrorReport, QueryError, Result};
pub use format::{format_as_signed, format_value, InputFormat, Radix, ValueFormat};
pub use hierarchy::{
    Hierarchy, HierarchyBuilder, Scope, ScopeRef, SignalKind, Var, VarDirection, VarRef,
};
pub use query::{QueryEngine, QueryLimits};
pub use session::{Bookmark, RegistryConfig, Session, SessionId, SessionRegistry};
pub use signal::{Change, Signal, Value};
pub use store::{MemoryStore, TimeIndexSource, Trace, TraceBuilder, WaveformStore, WellenStore};
pub use time_index::{NearestIndex, TimeIndex, TimeRange};
