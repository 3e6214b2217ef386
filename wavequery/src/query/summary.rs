// Copyright 2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//
// Condensed description of a signal: a few statistics, evenly sampled changes and
// coarse behavior patterns.

use super::{round_to, timed_changes, QueryEngine, TimedValue};
use crate::{Result, Time};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Number of leading intervals inspected by the period detection.
const PERIOD_INTERVALS: usize = 10;

fn default_max_changes() -> Option<usize> {
    Some(20)
}

fn default_include_stats() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryParams {
    /// Number of sampled changes to return. `None` or `0` returns all analyzed changes.
    #[serde(default = "default_max_changes")]
    pub max_changes: Option<usize>,
    #[serde(default = "default_include_stats")]
    pub include_stats: bool,
}

impl Default for SummaryParams {
    fn default() -> Self {
        Self {
            max_changes: default_max_changes(),
            include_stats: default_include_stats(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    /// No changes at all.
    Constant,
    /// Evenly spaced changes.
    Periodic,
    SingleTransition,
    LowActivity,
    HighActivity,
    LikelyClock,
    /// Every change assigns the same value.
    ConstantAfterFirstChange,
    /// Exactly two distinct values.
    BinaryToggle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SummaryTimeRange {
    pub start: Time,
    pub end: Time,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStatistics {
    /// Only for signals whose values are all single `0`, `1`, `x` or `z` states.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toggle_count: Option<usize>,
    /// Toggles per time unit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toggle_rate: Option<f64>,
    pub unique_values: usize,
    pub time_range: SummaryTimeRange,
    /// At least 1, also for a single change.
    pub duration: Time,
    /// Average interval of a periodic signal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalSummary {
    pub signal_path: String,
    /// Number of analyzed changes, capped by [`QueryLimits::summary_changes`](super::QueryLimits).
    pub total_changes: usize,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<SummaryStatistics>,
    pub representative_changes: Vec<TimedValue>,
    pub truncated: bool,
    pub patterns: Vec<Pattern>,
}

fn is_state(value: &str) -> bool {
    matches!(value, "0" | "1" | "x" | "z")
}

/// Mean of the first intervals if their variance is small compared to the mean.
fn detect_period(times: &[Time]) -> Option<f64> {
    if times.len() < 4 {
        return None;
    }
    let intervals: Vec<f64> = times
        .windows(2)
        .take(PERIOD_INTERVALS)
        .map(|w| (w[1] - w[0]) as f64)
        .collect();
    let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
    let variance =
        intervals.iter().map(|i| (i - mean).powi(2)).sum::<f64>() / intervals.len() as f64;
    (variance < mean * 0.1).then_some(mean)
}

fn statistics(changes: &[TimedValue]) -> Option<SummaryStatistics> {
    let start = changes.iter().map(|c| c.time).min()?;
    let end = changes.iter().map(|c| c.time).max()?;
    let duration = if end > start { end - start } else { 1 };
    let unique: FxHashSet<&str> = changes.iter().map(|c| c.value.as_str()).collect();

    let toggle_count = unique.iter().all(|v| is_state(v)).then(|| {
        changes
            .windows(2)
            .filter(|w| w[0].value != w[1].value)
            .count()
    });
    let times: Vec<Time> = changes.iter().map(|c| c.time).collect();
    Some(SummaryStatistics {
        toggle_count,
        toggle_rate: toggle_count.map(|count| round_to(count as f64 / duration as f64, 6)),
        unique_values: unique.len(),
        time_range: SummaryTimeRange { start, end },
        duration,
        period: detect_period(&times).map(|p| round_to(p, 2)),
    })
}

fn patterns(total: usize, stats: Option<&SummaryStatistics>) -> Vec<Pattern> {
    let mut patterns = Vec::new();
    if stats.is_some_and(|s| s.period.is_some()) {
        patterns.push(Pattern::Periodic);
    }
    if total == 1 {
        patterns.push(Pattern::SingleTransition);
    } else if total < 5 {
        patterns.push(Pattern::LowActivity);
    } else if let Some(rate) = stats.and_then(|s| s.toggle_rate) {
        if rate > 0.1 {
            patterns.push(Pattern::HighActivity);
            patterns.push(Pattern::LikelyClock);
        } else if rate < 0.001 {
            patterns.push(Pattern::LowActivity);
        }
    }
    match stats.map(|s| s.unique_values) {
        Some(1) => patterns.push(Pattern::ConstantAfterFirstChange),
        Some(2) => patterns.push(Pattern::BinaryToggle),
        _ => {}
    }
    patterns
}

fn describe(path: &str, total: usize, stats: Option<&SummaryStatistics>, patterns: &[Pattern]) -> String {
    let mut parts = vec![format!("Signal '{path}' has {total} transitions")];
    if let Some(period) = stats.and_then(|s| s.period) {
        parts.push(format!("periodic with period ~{period:.2} time units"));
    }
    if let Some(toggles) = stats.and_then(|s| s.toggle_count) {
        parts.push(format!("{toggles} toggles"));
    }
    if patterns.contains(&Pattern::LikelyClock) {
        parts.push("(likely a clock signal)".to_string());
    } else if patterns.contains(&Pattern::LowActivity) {
        parts.push("(low activity, control signal or static)".to_string());
    }
    parts.join(". ")
}

/// `count` changes taken at an even stride.
fn sample(changes: &[TimedValue], count: usize) -> Vec<TimedValue> {
    let step = changes.len() / count;
    (0..count).map(|ii| changes[ii * step].clone()).collect()
}

impl QueryEngine {
    /// Summarizes the first changes of a signal instead of listing all of them.
    pub fn summarize_signal(
        &self,
        session_id: &str,
        path: &str,
        params: &SummaryParams,
    ) -> Result<SignalSummary> {
        let session = self.session(session_id)?;
        let signal = self.signal(&session, path)?;
        let changes: Vec<TimedValue> = timed_changes(session.time_index(), &signal)
            .take(self.limits.summary_changes)
            .map(|(time, value)| TimedValue {
                time,
                value: value.to_string(),
            })
            .collect();
        let total = changes.len();

        if total == 0 {
            return Ok(SignalSummary {
                signal_path: path.to_string(),
                total_changes: 0,
                summary: format!("Signal '{path}' has no transitions (constant value)"),
                statistics: None,
                representative_changes: Vec::new(),
                truncated: false,
                patterns: vec![Pattern::Constant],
            });
        }

        let stats = if params.include_stats {
            statistics(&changes)
        } else {
            None
        };
        let patterns = patterns(total, stats.as_ref());
        let summary = describe(path, total, stats.as_ref(), &patterns);
        let (representative_changes, truncated) = match params.max_changes {
            Some(max) if max > 0 && total > max => (sample(&changes, max), true),
            _ => (changes, false),
        };

        Ok(SignalSummary {
            signal_path: path.to_string(),
            total_changes: total,
            summary,
            statistics: stats,
            representative_changes,
            truncated,
            patterns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changes(entries: &[(Time, &str)]) -> Vec<TimedValue> {
        entries
            .iter()
            .map(|&(time, value)| TimedValue {
                time,
                value: value.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_period_detection() {
        assert_eq!(detect_period(&[0, 10, 20, 30, 40]), Some(10.0));
        assert_eq!(detect_period(&[0, 10, 20]), None);
        assert_eq!(detect_period(&[0, 1, 50, 51, 200]), None);
    }

    #[test]
    fn test_toggles_only_for_single_states() {
        let stats = statistics(&changes(&[(0, "0"), (5, "1"), (10, "1"), (15, "x")])).unwrap();
        assert_eq!(stats.toggle_count, Some(2));
        assert_eq!(stats.unique_values, 3);
        assert_eq!(stats.duration, 15);

        let stats = statistics(&changes(&[(0, "00"), (5, "01")])).unwrap();
        assert_eq!(stats.toggle_count, None);
        assert_eq!(stats.toggle_rate, None);
    }

    #[test]
    fn test_sampling() {
        let all = changes(&[(0, "0"), (1, "1"), (2, "0"), (3, "1"), (4, "0"), (5, "1"), (6, "0")]);
        let times: Vec<Time> = sample(&all, 3).iter().map(|c| c.time).collect();
        assert_eq!(times, [0, 2, 4]);
    }

    #[test]
    fn test_patterns() {
        assert_eq!(patterns(1, None), [Pattern::SingleTransition]);
        let stats = statistics(&changes(&[(0, "0"), (10, "1"), (20, "0")])).unwrap();
        assert_eq!(
            patterns(3, Some(&stats)),
            [Pattern::LowActivity, Pattern::BinaryToggle]
        );
    }
}
