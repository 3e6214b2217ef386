// Copyright 2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use super::{round_to, timed_changes, QueryEngine, Window};
use crate::session::Session;
use crate::{Result, Time};
use itertools::{EitherOrBoth, Itertools};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Difference {
    pub time: Time,
    pub value1: String,
    pub value2: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub signal1: String,
    pub signal2: String,
    /// The first differences, see `difference_count` for the total.
    pub differences: Vec<Difference>,
    pub difference_count: usize,
    pub first_difference_time: Option<Time>,
    /// Share of matching samples in percent, 100 if there were no samples.
    pub match_percentage: f64,
}

impl QueryEngine {
    /// Compares two signals at every time either of them changes inside the window.
    /// Each signal keeps its last value until it changes again; a time is only sampled
    /// once both signals have had a change inside the window.
    pub fn compare(
        &self,
        session_id: &str,
        path1: &str,
        path2: &str,
        start_time: Option<Time>,
        end_time: Option<Time>,
    ) -> Result<Comparison> {
        let window = Window::new(start_time, end_time)?;
        let session = self.session(session_id)?;
        let values1 = self.values_in_window(&session, path1, window)?;
        let values2 = self.values_in_window(&session, path2, window)?;

        let mut current1: Option<&str> = None;
        let mut current2: Option<&str> = None;
        let mut samples = 0usize;
        let mut matches = 0usize;
        let mut difference_count = 0usize;
        let mut first_difference_time = None;
        let mut differences = Vec::new();
        for item in values1
            .iter()
            .merge_join_by(values2.iter(), |(a, _), (b, _)| a.cmp(b))
        {
            let time = match item {
                EitherOrBoth::Left((time, value)) => {
                    current1 = Some(value.as_str());
                    *time
                }
                EitherOrBoth::Right((time, value)) => {
                    current2 = Some(value.as_str());
                    *time
                }
                EitherOrBoth::Both((time, value1), (_, value2)) => {
                    current1 = Some(value1.as_str());
                    current2 = Some(value2.as_str());
                    *time
                }
            };
            let (Some(value1), Some(value2)) = (current1, current2) else {
                continue;
            };
            samples += 1;
            if value1 == value2 {
                matches += 1;
                continue;
            }
            first_difference_time.get_or_insert(time);
            difference_count += 1;
            if differences.len() < self.limits.compare_differences {
                differences.push(Difference {
                    time,
                    value1: value1.to_string(),
                    value2: value2.to_string(),
                });
            }
        }

        let match_percentage = if samples == 0 {
            100.0
        } else {
            round_to(matches as f64 / samples as f64 * 100.0, 2)
        };
        Ok(Comparison {
            signal1: path1.to_string(),
            signal2: path2.to_string(),
            differences,
            difference_count,
            first_difference_time,
            match_percentage,
        })
    }

    /// Changes inside the window, one per time. The last of several changes at the
    /// same time wins.
    fn values_in_window(
        &self,
        session: &Session,
        path: &str,
        window: Window,
    ) -> Result<Vec<(Time, String)>> {
        let signal = self.signal(session, path)?;
        let mut out: Vec<(Time, String)> = Vec::new();
        for (time, value) in timed_changes(session.time_index(), &signal)
            .skip_while(|(time, _)| window.is_before(*time))
            .take_while(|(time, _)| !window.is_after(*time))
        {
            match out.last_mut() {
                Some((last, v)) if *last == time => *v = value.to_string(),
                _ => out.push((time, value.to_string())),
            }
        }
        Ok(out)
    }
}
