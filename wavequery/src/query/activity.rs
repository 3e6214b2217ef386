// Copyright 2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use super::{round_to, timed_changes, QueryEngine, Skipped, Window};
use crate::session::Session;
use crate::{QueryError, Result, Time, Var, VarRef};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

fn default_limit() -> usize {
    100
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityParams {
    /// Only look at the variables declared directly in this scope.
    #[serde(default)]
    pub scope_path: Option<String>,
    #[serde(default)]
    pub min_toggles: Option<usize>,
    #[serde(default)]
    pub max_toggles: Option<usize>,
    #[serde(default)]
    pub start_time: Option<Time>,
    #[serde(default)]
    pub end_time: Option<Time>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for ActivityParams {
    fn default() -> Self {
        Self {
            scope_path: None,
            min_toggles: None,
            max_toggles: None,
            start_time: None,
            end_time: None,
            limit: default_limit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalActivity {
    pub path: String,
    pub toggle_count: usize,
    /// Toggles per time unit, 0 for an empty window.
    pub toggle_rate: f64,
    pub time_span: Time,
}

#[derive(Debug, Clone, Serialize)]
pub struct Activity {
    pub signals: Vec<SignalActivity>,
    pub count: usize,
    pub skipped: Vec<Skipped>,
}

impl QueryEngine {
    /// Counts the changes of every candidate variable inside the window and returns the
    /// most active ones first.
    pub fn search_by_activity(&self, session_id: &str, params: &ActivityParams) -> Result<Activity> {
        let window = Window::new(params.start_time, params.end_time)?;
        let session = self.session(session_id)?;
        let (start, end) = window.resolve(session.time_index());
        // a single explicit bound may lie outside of the trace, which leaves the window empty
        let window = Window {
            start: Some(start),
            end: Some(end),
        };
        let time_span = end.saturating_sub(start);

        let h = session.hierarchy();
        let candidates: Vec<VarRef> = match &params.scope_path {
            Some(scope_path) => {
                let scope = h
                    .lookup_scope(scope_path)
                    .ok_or_else(|| QueryError::ScopeNotFound {
                        path: scope_path.clone(),
                    })?;
                h[scope].vars().collect()
            }
            None => h.all_vars().collect(),
        };
        let candidates = &candidates[..candidates.len().min(self.limits.activity_candidates)];

        let count = |var: &VarRef| self.count_toggles(&session, &h[*var], window);
        let counted: Vec<(&VarRef, Result<usize>)> = if session.options().multi_thread {
            candidates.par_iter().map(|v| (v, count(v))).collect()
        } else {
            candidates.iter().map(|v| (v, count(v))).collect()
        };

        let mut signals = Vec::new();
        let mut skipped = Vec::new();
        for (var, result) in counted {
            let path = h[*var].full_name();
            let toggle_count = match result {
                Ok(count) => count,
                Err(e) => {
                    skipped.push(Skipped::new(path, &e));
                    continue;
                }
            };
            if params.min_toggles.is_some_and(|min| toggle_count < min)
                || params.max_toggles.is_some_and(|max| toggle_count > max)
            {
                continue;
            }
            let toggle_rate = if time_span > 0 {
                round_to(toggle_count as f64 / time_span as f64, 6)
            } else {
                0.0
            };
            signals.push(SignalActivity {
                path: path.to_string(),
                toggle_count,
                toggle_rate,
                time_span,
            });
        }

        signals.sort_by(|a, b| b.toggle_count.cmp(&a.toggle_count));
        signals.truncate(params.limit);
        Ok(Activity {
            count: signals.len(),
            signals,
            skipped,
        })
    }

    fn count_toggles(&self, session: &Session, var: &Var, window: Window) -> Result<usize> {
        let signal = self.signal_uncached(session, var)?;
        Ok(timed_changes(session.time_index(), &signal)
            .skip_while(|(time, _)| window.is_before(*time))
            .take_while(|(time, _)| !window.is_after(*time))
            .count())
    }
}
