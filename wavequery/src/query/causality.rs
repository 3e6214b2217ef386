// Copyright 2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use super::{round_to, timed_changes, value_at_time, QueryEngine, Skipped};
use crate::session::Session;
use crate::{Result, Time};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

fn default_search_window() -> Time {
    1000
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CausalityParams {
    pub target_path: String,
    pub target_time: Time,
    /// How far before `target_time` to look for changes.
    #[serde(default = "default_search_window")]
    pub search_window: Time,
    /// Defaults to the other variables of the target's scope.
    #[serde(default)]
    pub related_signals: Option<Vec<String>>,
}

impl CausalityParams {
    pub fn new(target_path: impl Into<String>, target_time: Time) -> Self {
        Self {
            target_path: target_path.into(),
            target_time,
            search_window: default_search_window(),
            related_signals: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetValue {
    pub path: String,
    pub time: Time,
    /// `None` if the target has not been assigned yet at `time`.
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PotentialCause {
    pub path: String,
    pub time: Time,
    pub value: String,
    pub delta_time: Time,
    /// 1.0 for a change at the target time, falling linearly to 0.0 at the window start.
    pub relevance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Causality {
    pub target: TargetValue,
    pub potential_causes: Vec<PotentialCause>,
    /// Candidates whose signal could not be loaded.
    pub skipped: Vec<Skipped>,
}

impl QueryEngine {
    /// Ranks the candidate signals by how shortly before `target_time` they last changed.
    pub fn trace_causality(&self, session_id: &str, params: &CausalityParams) -> Result<Causality> {
        let session = self.session(session_id)?;
        let target_signal = self.signal(&session, &params.target_path)?;
        let target_value = value_at_time(
            &session,
            &params.target_path,
            &target_signal,
            params.target_time,
        )
        .ok()
        .map(|v| v.to_string());

        let candidates: Vec<String> = match &params.related_signals {
            Some(related) => related.clone(),
            None => scope_siblings(&session, &params.target_path),
        };
        let candidates = &candidates[..candidates.len().min(self.limits.causality_candidates)];

        let examine = |path: &String| self.last_change_in_window(&session, path, params);
        let results: Vec<(&String, Result<Option<PotentialCause>>)> =
            if session.options().multi_thread {
                candidates.par_iter().map(|p| (p, examine(p))).collect()
            } else {
                candidates.iter().map(|p| (p, examine(p))).collect()
            };

        let mut potential_causes = Vec::new();
        let mut skipped = Vec::new();
        for (path, result) in results {
            match result {
                Ok(Some(cause)) => potential_causes.push(cause),
                Ok(None) => {}
                Err(e) => skipped.push(Skipped::new(path.as_str(), &e)),
            }
        }
        // stable, so equally relevant causes keep the candidate order
        potential_causes.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
        potential_causes.truncate(self.limits.causality_results);

        Ok(Causality {
            target: TargetValue {
                path: params.target_path.clone(),
                time: params.target_time,
                value: target_value,
            },
            potential_causes,
            skipped,
        })
    }

    /// Last change of `path` in `[target_time - search_window, target_time]`.
    fn last_change_in_window(
        &self,
        session: &Session,
        path: &str,
        params: &CausalityParams,
    ) -> Result<Option<PotentialCause>> {
        let var = session.lookup_var(path)?;
        let signal = self.signal_uncached(session, var)?;
        let search_start = params.target_time.saturating_sub(params.search_window);
        let last = timed_changes(session.time_index(), &signal)
            .take_while(|(time, _)| *time <= params.target_time)
            .filter(|(time, _)| *time >= search_start)
            .last();
        Ok(last.map(|(time, value)| {
            let delta_time = params.target_time - time;
            let relevance = if params.search_window == 0 {
                1.0
            } else {
                1.0 - delta_time as f64 / params.search_window as f64
            };
            PotentialCause {
                path: path.to_string(),
                time,
                value: value.to_string(),
                delta_time,
                relevance: round_to(relevance, 3),
            }
        }))
    }
}

/// All variables declared in the same scope as `path`, except `path` itself.
fn scope_siblings(session: &Session, path: &str) -> Vec<String> {
    let Some((scope_path, _)) = path.rsplit_once('.') else {
        return Vec::new();
    };
    let h = session.hierarchy();
    match h.lookup_scope(scope_path) {
        Some(scope) => h[scope]
            .vars()
            .map(|v| h[v].full_name())
            .filter(|name| *name != path)
            .map(|name| name.to_string())
            .collect(),
        None => Vec::new(),
    }
}
