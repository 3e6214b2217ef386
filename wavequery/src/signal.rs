// Copyright 2023-2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::format::parse_integer;
use crate::TimeTableIdx;
use num::{BigInt, BigUint, Num};
use std::fmt::{Debug, Display, Formatter};

/// A single recorded value of a signal.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Bit string, msb first, made of `0`, `1`, `x`, `z` (and the other nine-value states).
    Bits(String),
    Real(f64),
    Str(String),
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bits(bits) => write!(f, "{bits}"),
            Value::Real(value) => write!(f, "{value}"),
            Value::Str(value) => write!(f, "{value}"),
        }
    }
}

impl Value {
    pub fn bits(value: impl Into<String>) -> Self {
        Value::Bits(value.into())
    }

    /// Interprets the value as an integer. Bit vectors only qualify when every bit is `0` or `1`,
    /// strings when they spell out a prefixed or decimal number. Reals never do.
    pub fn to_integer(&self) -> Option<BigInt> {
        match self {
            Value::Bits(bits) => {
                if bits.is_empty() || !bits.bytes().all(|b| b == b'0' || b == b'1') {
                    None
                } else {
                    BigUint::from_str_radix(bits, 2).ok().map(BigInt::from)
                }
            }
            Value::Real(_) => None,
            Value::Str(value) => parse_integer(value),
        }
    }
}

/// One entry of a change sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub index: TimeTableIdx,
    pub value: Value,
}

/// The change sequence of one variable, ordered by time table index.
/// Consecutive entries may repeat an index (delta cycles) or a value when the source
/// did not filter them; all queries tolerate both.
#[derive(Clone, PartialEq, Default)]
pub struct Signal {
    changes: Vec<Change>,
}

impl Debug for Signal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signal({} changes)", self.changes.len())
    }
}

impl Signal {
    pub fn new(changes: Vec<Change>) -> Self {
        debug_assert!(
            changes.windows(2).all(|w| w[0].index <= w[1].index),
            "changes need to be sorted by time table index"
        );
        Self { changes }
    }

    pub fn from_changes(changes: impl IntoIterator<Item = (TimeTableIdx, Value)>) -> Self {
        Self::new(
            changes
                .into_iter()
                .map(|(index, value)| Change { index, value })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter_changes(&self) -> impl Iterator<Item = (TimeTableIdx, &Value)> + '_ {
        self.changes.iter().map(|c| (c.index, &c.value))
    }

    /// Value of the latest change at or before `time_table_idx`.
    /// Returns `None` if the signal has no value yet at that index.
    pub fn value_at_index(&self, time_table_idx: TimeTableIdx) -> Option<&Value> {
        let after = self.changes.partition_point(|c| c.index <= time_table_idx);
        if after == 0 {
            None
        } else {
            Some(&self.changes[after - 1].value)
        }
    }

    /// Estimated number of bytes held by this signal.
    pub fn size_in_memory(&self) -> usize {
        let base = std::mem::size_of::<Self>();
        let data = self
            .changes
            .iter()
            .map(|c| {
                std::mem::size_of::<Change>()
                    + match &c.value {
                        Value::Bits(s) | Value::Str(s) => s.len(),
                        Value::Real(_) => 0,
                    }
            })
            .sum::<usize>();
        base + data
    }
}
