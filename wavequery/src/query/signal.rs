// Copyright 2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//
// Point, range and statistics queries on a single signal, plus time conversion.

use super::{timed_changes, value_at_time, QueryEngine, Window};
use crate::format::{render, serde_int};
use crate::{QueryError, Result, Time, TimeRange, ValueFormat};
use num::BigInt;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueParams {
    pub times: Vec<Time>,
    pub format: ValueFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueAtTime {
    pub time: Time,
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Values {
    pub variable_path: String,
    pub format: ValueFormat,
    pub values: Vec<ValueAtTime>,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangesParams {
    pub start_time: Option<Time>,
    pub end_time: Option<Time>,
    pub max_changes: Option<usize>,
    pub format: ValueFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimedValue {
    pub time: Time,
    pub value: String,
}

/// The window a range query was asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowBounds {
    pub start: Option<Time>,
    pub end: Option<Time>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Changes {
    pub variable_path: String,
    pub format: ValueFormat,
    pub changes: Vec<TimedValue>,
    pub count: usize,
    /// At least one matching change was dropped because of `max_changes`.
    pub truncated: bool,
    pub time_range: WindowBounds,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsParams {
    pub start_time: Option<Time>,
    pub end_time: Option<Time>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericStatistics {
    #[serde(serialize_with = "serde_int::serialize")]
    pub min_value: BigInt,
    #[serde(serialize_with = "serde_int::serialize")]
    pub max_value: BigInt,
    pub num_numeric_samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalStatistics {
    pub variable_path: String,
    pub num_changes: usize,
    pub num_unique_values: usize,
    pub first_change_time: Option<Time>,
    pub last_change_time: Option<Time>,
    /// Only present when at least one value reads as an integer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_statistics: Option<NumericStatistics>,
    pub time_range: WindowBounds,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexToTime {
    pub index: u64,
    pub time: Option<Time>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeToIndex {
    pub time: Time,
    pub index: Option<u64>,
    pub exact: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nearest_time: Option<Time>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TimeConversion {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_to_time: Option<Vec<IndexToTime>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_index: Option<Vec<TimeToIndex>>,
}

impl QueryEngine {
    /// Value of a signal at each of the requested times. A time without a value yields an
    /// entry with an error instead of failing the whole query.
    pub fn get_value(&self, session_id: &str, path: &str, params: &ValueParams) -> Result<Values> {
        let session = self.session(session_id)?;
        let signal = self.signal(&session, path)?;
        let values: Vec<ValueAtTime> = params
            .times
            .iter()
            .map(|&time| match value_at_time(&session, path, &signal, time) {
                Ok(value) => ValueAtTime {
                    time,
                    value: Some(render(value, params.format)),
                    error: None,
                },
                Err(e) => ValueAtTime {
                    time,
                    value: None,
                    error: Some(e.to_string()),
                },
            })
            .collect();
        Ok(Values {
            variable_path: path.to_string(),
            format: params.format,
            count: values.len(),
            values,
        })
    }

    /// Changes of a signal inside the inclusive window `[start_time, end_time]`.
    pub fn get_changes(
        &self,
        session_id: &str,
        path: &str,
        params: &ChangesParams,
    ) -> Result<Changes> {
        let window = Window::new(params.start_time, params.end_time)?;
        let session = self.session(session_id)?;
        let signal = self.signal(&session, path)?;

        let mut changes = Vec::new();
        let mut truncated = false;
        for (time, value) in timed_changes(session.time_index(), &signal) {
            if window.is_before(time) {
                continue;
            }
            if window.is_after(time) {
                break;
            }
            if params.max_changes.is_some_and(|max| changes.len() >= max) {
                truncated = true;
                break;
            }
            changes.push(TimedValue {
                time,
                value: render(value, params.format),
            });
        }

        Ok(Changes {
            variable_path: path.to_string(),
            format: params.format,
            count: changes.len(),
            changes,
            truncated,
            time_range: WindowBounds {
                start: params.start_time,
                end: params.end_time,
            },
        })
    }

    pub fn get_statistics(
        &self,
        session_id: &str,
        path: &str,
        params: &StatisticsParams,
    ) -> Result<SignalStatistics> {
        let window = Window::new(params.start_time, params.end_time)?;
        let session = self.session(session_id)?;
        let signal = self.signal(&session, path)?;

        let mut num_changes = 0;
        let mut first_change_time = None;
        let mut last_change_time = None;
        let mut unique = FxHashSet::default();
        let mut numeric: Option<NumericStatistics> = None;
        for (time, value) in timed_changes(session.time_index(), &signal)
            .skip_while(|(time, _)| window.is_before(*time))
            .take_while(|(time, _)| !window.is_after(*time))
        {
            num_changes += 1;
            first_change_time.get_or_insert(time);
            last_change_time = Some(time);
            unique.insert(value.to_string());
            if let Some(n) = value.to_integer() {
                let stats = numeric.get_or_insert_with(|| NumericStatistics {
                    min_value: n.clone(),
                    max_value: n.clone(),
                    num_numeric_samples: 0,
                });
                if n < stats.min_value {
                    stats.min_value = n;
                } else if n > stats.max_value {
                    stats.max_value = n;
                }
                stats.num_numeric_samples += 1;
            }
        }

        Ok(SignalStatistics {
            variable_path: path.to_string(),
            num_changes,
            num_unique_values: unique.len(),
            first_change_time,
            last_change_time,
            numeric_statistics: numeric,
            time_range: WindowBounds {
                start: params.start_time,
                end: params.end_time,
            },
        })
    }

    pub fn time_range(&self, session_id: &str) -> Result<TimeRange> {
        Ok(self.session(session_id)?.time_index().range())
    }

    /// Converts time table indices to times and times to their nearest index.
    /// At least one of the two lists is required.
    pub fn time_convert(
        &self,
        session_id: &str,
        indices: Option<&[u64]>,
        times: Option<&[Time]>,
    ) -> Result<TimeConversion> {
        if indices.is_none() && times.is_none() {
            return Err(QueryError::InvalidParameter {
                name: "indices",
                reason: "either indices or times need to be provided".to_string(),
            });
        }
        let session = self.session(session_id)?;
        let index = session.time_index();

        let index_to_time = indices.map(|indices| {
            indices
                .iter()
                .map(|&i| match index.time_at(i) {
                    Ok(time) => IndexToTime {
                        index: i,
                        time: Some(time),
                        error: None,
                    },
                    Err(_) => IndexToTime {
                        index: i,
                        time: None,
                        error: Some("Index out of range".to_string()),
                    },
                })
                .collect()
        });

        let time_to_index = times.map(|times| {
            times
                .iter()
                .map(|&time| match index.nearest_index_for(time) {
                    Some(nearest) => TimeToIndex {
                        time,
                        index: Some(nearest.index),
                        exact: nearest.exact,
                        nearest_time: (!nearest.exact).then_some(nearest.nearest_time),
                        error: None,
                    },
                    None => TimeToIndex {
                        time,
                        index: None,
                        exact: false,
                        nearest_time: None,
                        error: Some("No time points available".to_string()),
                    },
                })
                .collect()
        });

        Ok(TimeConversion {
            index_to_time,
            time_to_index,
        })
    }
}
