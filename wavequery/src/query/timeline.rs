// Copyright 2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use super::{timed_changes, QueryEngine, Skipped, Window};
use crate::{Result, Time, Value};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub time: Time,
    pub signal: String,
    pub value: String,
    pub prev_value: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Timeline {
    pub events: Vec<Event>,
    pub count: usize,
    pub truncated: bool,
    /// Signals that could not be loaded.
    pub skipped: Vec<Skipped>,
}

impl QueryEngine {
    /// Merges the changes of several signals inside `[start_time, end_time]` into one
    /// time ordered list. Events at the same time keep the order of `signal_paths`.
    pub fn event_timeline(
        &self,
        session_id: &str,
        signal_paths: &[String],
        start_time: Time,
        end_time: Time,
        max_events: usize,
    ) -> Result<Timeline> {
        let window = Window::new(Some(start_time), Some(end_time))?;
        let session = self.session(session_id)?;

        let mut events = Vec::new();
        let mut skipped = Vec::new();
        for path in signal_paths.iter() {
            let signal = match self.signal(&session, path) {
                Ok(signal) => signal,
                Err(e) => {
                    skipped.push(Skipped::new(path.as_str(), &e));
                    continue;
                }
            };
            let mut prev: Option<&Value> = None;
            for (time, value) in timed_changes(session.time_index(), &signal) {
                if window.is_before(time) {
                    prev = Some(value);
                    continue;
                }
                if window.is_after(time) {
                    break;
                }
                events.push(Event {
                    time,
                    signal: path.clone(),
                    value: value.to_string(),
                    prev_value: prev.map(|v| v.to_string()),
                });
                prev = Some(value);
            }
        }

        events.sort_by_key(|e| e.time);
        let truncated = events.len() > max_events;
        events.truncate(max_events);
        Ok(Timeline {
            count: events.len(),
            events,
            truncated,
            skipped,
        })
    }
}
