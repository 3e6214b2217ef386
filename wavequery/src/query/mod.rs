// Copyright 2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//! # Query Engine
//! All queries take a session id, resolve signals through the registry's signal cache and
//! convert time table indices into absolute times with the session's [`TimeIndex`].

mod activity;
mod causality;
mod compare;
mod hierarchy;
mod info;
mod signal;
mod summary;
mod timeline;
mod transition;

use crate::session::{Session, SessionRegistry};
use crate::{ErrorReport, QueryError, Result, Signal, Time, TimeIndex, Value, Var};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use activity::{Activity, ActivityParams, SignalActivity};
pub use causality::{Causality, CausalityParams, PotentialCause, TargetValue};
pub use compare::{Comparison, Difference};
pub use hierarchy::{
    Pagination, ScopeDetails, ScopeInfo, ScopeSummary, SearchMatches, SearchResult, SearchTarget,
    VarInfo, VarSummary, VariableFilter, VariableList,
};
pub use info::{
    CacheMemory, CacheStats, FileInfo, HierarchyStats, MemoryUsage, OpenedWaveform,
    SessionList, SessionMemory, TimeInfo, WaveformInfo, WaveformStatistics,
};
pub use signal::{
    Changes, ChangesParams, IndexToTime, NumericStatistics, SignalStatistics, StatisticsParams,
    TimeConversion, TimeToIndex, TimedValue, ValueAtTime, ValueParams, Values, WindowBounds,
};
pub use summary::{Pattern, SignalSummary, SummaryParams, SummaryStatistics, SummaryTimeRange};
pub use timeline::{Event, Timeline};
pub use transition::{Condition, Transition, TransitionParams, Transitions};

/// Caps that bound the cost of the scan-heavy queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryLimits {
    /// Maximum number of candidate signals examined by a causality trace.
    pub causality_candidates: usize,
    /// Maximum number of causes returned by a causality trace.
    pub causality_results: usize,
    /// Maximum number of variables examined by an activity search.
    pub activity_candidates: usize,
    /// Maximum number of differences listed by a comparison.
    pub compare_differences: usize,
    /// Maximum number of changes analyzed by a signal summary.
    pub summary_changes: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            causality_candidates: 50,
            causality_results: 20,
            activity_candidates: 1000,
            compare_differences: 100,
            summary_changes: 1000,
        }
    }
}

/// A signal that a multi-signal query could not examine.
#[derive(Debug, Clone, Serialize)]
pub struct Skipped {
    pub path: String,
    pub error: ErrorReport,
}

impl Skipped {
    fn new(path: impl Into<String>, error: &QueryError) -> Self {
        let path = path.into();
        tracing::debug!(path = %path, error = %error, "skipping signal");
        Self {
            path,
            error: error.to_report(),
        }
    }
}

pub struct QueryEngine {
    registry: Arc<SessionRegistry>,
    limits: QueryLimits,
}

impl QueryEngine {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self::with_limits(registry, QueryLimits::default())
    }

    pub fn with_limits(registry: Arc<SessionRegistry>, limits: QueryLimits) -> Self {
        Self { registry, limits }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn limits(&self) -> &QueryLimits {
        &self.limits
    }

    pub(crate) fn session(&self, session_id: &str) -> Result<Arc<Session>> {
        self.registry.require(session_id)
    }

    /// Returns the signal of `path`, loading and caching it on a miss.
    pub(crate) fn signal(&self, session: &Session, path: &str) -> Result<Arc<Signal>> {
        let cache = self.registry.cache();
        if let Some(signal) = cache.get(session.id(), path) {
            return Ok(signal);
        }
        let var = session.lookup_var(path)?;
        let signal = Arc::new(load(session, var)?);
        cache.put(session.id(), path, signal.clone());
        // a close that ran while the signal was loading has already evicted the session
        if !self.registry.contains(session.id()) {
            cache.evict_session(session.id());
        }
        Ok(signal)
    }

    /// Like [`QueryEngine::signal`] but a miss does not populate the cache.
    /// Used by the scans over many variables, which would otherwise flush the cache.
    pub(crate) fn signal_uncached(&self, session: &Session, var: &Var) -> Result<Arc<Signal>> {
        match self.registry.cache().get(session.id(), var.full_name()) {
            Some(signal) => Ok(signal),
            None => load(session, var).map(Arc::new),
        }
    }
}

fn load(session: &Session, var: &Var) -> Result<Signal> {
    let signal = session.trace().load_signal(var)?;
    tracing::debug!(
        session_id = %session.id(),
        path = %var.full_name(),
        changes = signal.len(),
        "loaded signal"
    );
    Ok(signal)
}

/// Inclusive time window, missing bounds are open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Window {
    pub start: Option<Time>,
    pub end: Option<Time>,
}

impl Window {
    pub fn new(start: Option<Time>, end: Option<Time>) -> Result<Self> {
        match (start, end) {
            (Some(start), Some(end)) if start > end => {
                Err(QueryError::InvalidTimeRange { start, end })
            }
            _ => Ok(Self { start, end }),
        }
    }

    #[inline]
    pub fn is_before(&self, time: Time) -> bool {
        self.start.is_some_and(|start| time < start)
    }

    #[inline]
    pub fn is_after(&self, time: Time) -> bool {
        self.end.is_some_and(|end| time > end)
    }

    #[inline]
    pub fn contains(&self, time: Time) -> bool {
        !self.is_before(time) && !self.is_after(time)
    }

    /// Replaces open bounds with the first and last time of the trace.
    /// An empty trace resolves to `0..=0`.
    pub fn resolve(&self, index: &TimeIndex) -> (Time, Time) {
        let range = index.range();
        (
            self.start.or(range.min_time).unwrap_or(0),
            self.end.or(range.max_time).unwrap_or(0),
        )
    }
}

/// Changes of `signal` with absolute times. Changes with an index outside of the time table
/// are skipped.
pub(crate) fn timed_changes<'a>(
    index: &'a TimeIndex,
    signal: &'a Signal,
) -> impl Iterator<Item = (Time, &'a Value)> + 'a {
    signal
        .iter_changes()
        .filter_map(|(idx, value)| index.time_at_idx(idx).ok().map(|time| (time, value)))
}

/// Value of `signal` at `time`, i.e. the value of the last change at or before `time`.
pub(crate) fn value_at_time<'a>(
    session: &Session,
    path: &str,
    signal: &'a Signal,
    time: Time,
) -> Result<&'a Value> {
    session
        .time_index()
        .index_at_or_before(time)
        .and_then(|idx| signal.value_at_index(idx))
        .ok_or_else(|| QueryError::NoValueAtTime {
            path: path.to_string(),
            time,
        })
}

/// Rounds to the given number of decimal places.
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
