// Copyright 2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::store::TimeIndexSource;
use crate::{QueryError, Result, Time, TimeTableIdx};
use serde::Serialize;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// First and last time of a trace. Both are `None` for a trace without time points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub min_time: Option<Time>,
    pub max_time: Option<Time>,
    pub num_time_points: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NearestIndex {
    pub index: u64,
    pub exact: bool,
    pub nearest_time: Time,
}

/// Maps between time table indices and absolute times.
/// The source has no length accessor, so the number of time points is discovered once,
/// on construction, by probing: exponential search for an index past the end followed by
/// a binary search for the exact boundary. That costs `O(log n)` source lookups.
#[derive(Clone)]
pub struct TimeIndex {
    source: Arc<dyn TimeIndexSource>,
    len: u64,
}

impl Debug for TimeIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "TimeIndex({} time points)", self.len)
    }
}

impl TimeIndex {
    pub fn new(source: Arc<dyn TimeIndexSource>) -> Self {
        let len = discover_len(source.as_ref());
        tracing::debug!(time_points = len, "discovered time table length");
        Self { source, len }
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn time_at(&self, index: u64) -> Result<Time> {
        let out_of_range = QueryError::IndexOutOfRange {
            index,
            len: self.len(),
        };
        if index >= self.len {
            return Err(out_of_range);
        }
        self.source.time_at(index).ok_or(out_of_range)
    }

    /// Absolute time of the time table index of a signal change.
    pub fn time_at_idx(&self, index: TimeTableIdx) -> Result<Time> {
        self.time_at(index as u64)
    }

    pub fn range(&self) -> TimeRange {
        if self.is_empty() {
            return TimeRange {
                min_time: None,
                max_time: None,
                num_time_points: 0,
            };
        }
        TimeRange {
            min_time: self.source.time_at(0),
            max_time: self.source.time_at(self.len - 1),
            num_time_points: self.len(),
        }
    }

    /// Index whose time is closest to `time`. When two indices are equally close,
    /// the earlier one wins. Returns `None` for an empty index.
    pub fn nearest_index_for(&self, time: Time) -> Option<NearestIndex> {
        if self.is_empty() {
            return None;
        }
        let after = self.partition_point(|t| t < time);
        let make = |index: u64| {
            let nearest_time = self.probe(index);
            NearestIndex {
                index,
                exact: nearest_time == time,
                nearest_time,
            }
        };
        if after == self.len {
            return Some(make(after - 1));
        }
        let upper = make(after);
        if upper.exact || after == 0 {
            return Some(upper);
        }
        let lower = make(after - 1);
        if time - lower.nearest_time <= upper.nearest_time - time {
            Some(lower)
        } else {
            Some(upper)
        }
    }

    /// Last index whose time is at or before `time`.
    pub fn index_at_or_before(&self, time: Time) -> Option<TimeTableIdx> {
        let after = self.partition_point(|t| t <= time);
        if after == 0 {
            None
        } else {
            Some((after - 1) as TimeTableIdx)
        }
    }

    #[inline]
    fn probe(&self, index: u64) -> Time {
        // only called with indices below `len`
        self.source.time_at(index).unwrap_or(Time::MAX)
    }

    /// First index for which `pred` does not hold, assuming `pred` is true for a prefix.
    fn partition_point(&self, pred: impl Fn(Time) -> bool) -> u64 {
        let (mut lo, mut hi) = (0u64, self.len);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if pred(self.probe(mid)) {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }
}

fn discover_len(source: &dyn TimeIndexSource) -> u64 {
    if source.time_at(0).is_none() {
        return 0;
    }
    // `lo` is always valid, `hi` is always past the end
    let mut lo = 0u64;
    let mut hi = 1u64;
    while source.time_at(hi).is_some() {
        lo = hi;
        hi = match hi.checked_mul(2) {
            Some(next) => next,
            None => return u64::MAX,
        };
    }
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if source.time_at(mid).is_some() {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    hi
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn index(times: &[Time]) -> TimeIndex {
        TimeIndex::new(Arc::new(times.to_vec()))
    }

    #[test]
    fn test_discover_len() {
        for len in 0..70u64 {
            let times: Vec<Time> = (0..len).map(|t| t * 3).collect();
            assert_eq!(index(&times).len() as u64, len);
        }
    }

    #[test]
    fn test_empty() {
        let idx = index(&[]);
        assert_eq!(
            idx.range(),
            TimeRange {
                min_time: None,
                max_time: None,
                num_time_points: 0
            }
        );
        assert!(idx.nearest_index_for(5).is_none());
        assert!(matches!(
            idx.time_at(0),
            Err(QueryError::IndexOutOfRange { index: 0, len: 0 })
        ));
    }

    #[test]
    fn test_nearest() {
        let idx = index(&[0, 10, 20, 40]);
        let n = idx.nearest_index_for(20).unwrap();
        assert_eq!((n.index, n.exact, n.nearest_time), (2, true, 20));
        // a tie goes to the earlier index
        let n = idx.nearest_index_for(30).unwrap();
        assert_eq!((n.index, n.exact), (2, false));
        let n = idx.nearest_index_for(31).unwrap();
        assert_eq!(n.index, 3);
        let n = idx.nearest_index_for(1000).unwrap();
        assert_eq!((n.index, n.nearest_time), (3, 40));
    }

    #[test]
    fn test_at_or_before() {
        let idx = index(&[5, 10, 20]);
        assert_eq!(idx.index_at_or_before(4), None);
        assert_eq!(idx.index_at_or_before(5), Some(0));
        assert_eq!(idx.index_at_or_before(19), Some(1));
        assert_eq!(idx.index_at_or_before(100), Some(2));
        assert_eq!(idx.range().max_time, Some(20));
        assert!(idx.time_at(3).is_err());
    }

    proptest! {
        #[test]
        fn nearest_of_own_time_is_exact(mut times in prop::collection::vec(0u64..1_000_000, 1..200)) {
            times.sort_unstable();
            times.dedup();
            let idx = index(&times);
            prop_assert_eq!(idx.len(), times.len());
            for i in 0..idx.len() as u64 {
                let t = idx.time_at(i).unwrap();
                if i + 1 < idx.len() as u64 {
                    prop_assert!(t < idx.time_at(i + 1).unwrap());
                }
                let n = idx.nearest_index_for(t).unwrap();
                prop_assert_eq!((n.index, n.exact), (i, true));
            }
        }
    }
}
