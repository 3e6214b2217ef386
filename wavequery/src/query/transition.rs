// Copyright 2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use super::{QueryEngine, Window};
use crate::format::parse_integer;
use crate::{QueryError, Result, Time, TimeTableIdx, Value};
use num::BigInt;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// The new value equals the target, either as text or, when both sides are numbers
    /// such as `0101` and `0x5`, by numeric value. Unprefixed targets are decimal.
    Equals,
    /// The signal leaves the target value.
    NotEquals,
    /// The signal crosses above the target.
    Greater,
    /// The signal crosses below the target.
    Less,
    /// `0` to `1`, single bit signals only.
    Rises,
    /// `1` to `0`, single bit signals only.
    Falls,
}

impl Condition {
    pub fn name(&self) -> &'static str {
        match self {
            Condition::Equals => "equals",
            Condition::NotEquals => "not_equals",
            Condition::Greater => "greater",
            Condition::Less => "less",
            Condition::Rises => "rises",
            Condition::Falls => "falls",
        }
    }

    fn needs_value(&self) -> bool {
        !matches!(self, Condition::Rises | Condition::Falls)
    }
}

impl FromStr for Condition {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "equals" => Ok(Condition::Equals),
            "not_equals" => Ok(Condition::NotEquals),
            "greater" => Ok(Condition::Greater),
            "less" => Ok(Condition::Less),
            "rises" => Ok(Condition::Rises),
            "falls" => Ok(Condition::Falls),
            other => Err(QueryError::InvalidParameter {
                name: "condition",
                reason: format!(
                    "`{other}` is not one of equals, not_equals, greater, less, rises, falls"
                ),
            }),
        }
    }
}

fn default_max_results() -> usize {
    100
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionParams {
    pub condition: Condition,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub start_time: Option<Time>,
    #[serde(default)]
    pub end_time: Option<Time>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl TransitionParams {
    pub fn new(condition: Condition) -> Self {
        Self {
            condition,
            value: None,
            start_time: None,
            end_time: None,
            max_results: default_max_results(),
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_window(mut self, start_time: Option<Time>, end_time: Option<Time>) -> Self {
        self.start_time = start_time;
        self.end_time = end_time;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub time: Time,
    pub index: TimeTableIdx,
    pub value: String,
    pub prev_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transitions {
    pub transitions: Vec<Transition>,
    pub count: usize,
    /// At least one further match was dropped because of `max_results`.
    pub truncated: bool,
}

/// Target of `equals` and `not_equals`.
struct Target {
    text: String,
    number: Option<BigInt>,
}

impl Target {
    fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            number: parse_integer(text),
        }
    }

    fn is(&self, value: &Value) -> bool {
        if value.to_string() == self.text {
            return true;
        }
        match (&self.number, value.to_integer()) {
            (Some(target), Some(value)) => *target == value,
            _ => false,
        }
    }
}

/// Decides for a single (previous, current) pair whether it matches.
enum Matcher {
    Equals(Target),
    NotEquals(Target),
    /// `None` when the target is not a number, which never matches.
    Greater(Option<BigInt>),
    Less(Option<BigInt>),
    Rises,
    Falls,
}

impl Matcher {
    fn new(condition: Condition, value: Option<&str>) -> Result<Self> {
        match (condition.needs_value(), value) {
            (true, None) => {
                return Err(QueryError::MissingValue {
                    condition: condition.name(),
                })
            }
            (false, Some(_)) => {
                return Err(QueryError::UnexpectedValue {
                    condition: condition.name(),
                })
            }
            _ => {}
        }
        let target = value.unwrap_or_default();
        Ok(match condition {
            Condition::Equals => Matcher::Equals(Target::new(target)),
            Condition::NotEquals => Matcher::NotEquals(Target::new(target)),
            Condition::Greater => Matcher::Greater(parse_integer(target)),
            Condition::Less => Matcher::Less(parse_integer(target)),
            Condition::Rises => Matcher::Rises,
            Condition::Falls => Matcher::Falls,
        })
    }

    fn matches(&self, prev: Option<&Value>, current: &Value) -> bool {
        let prev_text = || prev.map(|v| v.to_string());
        match self {
            Matcher::Equals(target) => target.is(current),
            Matcher::NotEquals(target) => prev.is_some_and(|p| target.is(p)) && !target.is(current),
            Matcher::Rises => prev_text().as_deref() == Some("0") && current.to_string() == "1",
            Matcher::Falls => prev_text().as_deref() == Some("1") && current.to_string() == "0",
            Matcher::Greater(target) => crosses(target, prev, current, |a, b| a > b),
            Matcher::Less(target) => crosses(target, prev, current, |a, b| a < b),
        }
    }
}

/// True if `current` is beyond `target` in the direction of `beyond` while `prev` was not.
/// A missing previous value counts as not beyond, a non numeric one never matches.
fn crosses(
    target: &Option<BigInt>,
    prev: Option<&Value>,
    current: &Value,
    beyond: impl Fn(&BigInt, &BigInt) -> bool,
) -> bool {
    let (Some(target), Some(current)) = (target, current.to_integer()) else {
        return false;
    };
    if !beyond(&current, target) {
        return false;
    }
    match prev {
        None => true,
        Some(prev) => prev
            .to_integer()
            .is_some_and(|prev| !beyond(&prev, target)),
    }
}

impl QueryEngine {
    /// Finds the changes of a signal that satisfy `params.condition`. Changes before the window
    /// still count as previous values for the first change inside it.
    pub fn find_transition(
        &self,
        session_id: &str,
        path: &str,
        params: &TransitionParams,
    ) -> Result<Transitions> {
        let matcher = Matcher::new(params.condition, params.value.as_deref())?;
        let window = Window::new(params.start_time, params.end_time)?;
        let session = self.session(session_id)?;
        let signal = self.signal(&session, path)?;
        let index = session.time_index();

        let mut transitions = Vec::new();
        let mut truncated = false;
        let mut prev: Option<&Value> = None;
        for (idx, value) in signal.iter_changes() {
            let Ok(time) = index.time_at_idx(idx) else {
                continue;
            };
            if window.is_before(time) {
                prev = Some(value);
                continue;
            }
            if window.is_after(time) {
                break;
            }
            if matcher.matches(prev, value) {
                if transitions.len() >= params.max_results {
                    truncated = true;
                    break;
                }
                transitions.push(Transition {
                    time,
                    index: idx,
                    value: value.to_string(),
                    prev_value: prev.map(|v| v.to_string()),
                });
            }
            prev = Some(value);
        }

        Ok(Transitions {
            count: transitions.len(),
            transitions,
            truncated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(s: &str) -> Value {
        Value::bits(s)
    }

    #[test]
    fn test_value_requirements() {
        assert!(matches!(
            Matcher::new(Condition::Equals, None),
            Err(QueryError::MissingValue { condition: "equals" })
        ));
        assert!(matches!(
            Matcher::new(Condition::Rises, Some("1")),
            Err(QueryError::UnexpectedValue { condition: "rises" })
        ));
        assert!(Matcher::new(Condition::Falls, None).is_ok());
    }

    #[test]
    fn test_not_equals_is_a_transition_away() {
        let m = Matcher::new(Condition::NotEquals, Some("0")).unwrap();
        assert!(m.matches(Some(&bits("0")), &bits("1")));
        assert!(!m.matches(Some(&bits("1")), &bits("x")));
        assert!(!m.matches(None, &bits("1")));
    }

    #[test]
    fn test_equals_compares_numbers_by_value() {
        let m = Matcher::new(Condition::Equals, Some("0x5")).unwrap();
        assert!(m.matches(None, &bits("0101")));
        assert!(m.matches(None, &bits("00000101")));
        assert!(!m.matches(None, &bits("0100")));
        let m = Matcher::new(Condition::Equals, Some("5")).unwrap();
        assert!(m.matches(Some(&bits("0000")), &bits("0101")));
        // unknown bits only match as text
        let m = Matcher::new(Condition::Equals, Some("01x1")).unwrap();
        assert!(m.matches(None, &bits("01x1")));
        let m = Matcher::new(Condition::Equals, Some("IDLE")).unwrap();
        assert!(m.matches(None, &Value::Str("IDLE".to_string())));
        let away = Matcher::new(Condition::NotEquals, Some("0x5")).unwrap();
        assert!(away.matches(Some(&bits("0101")), &bits("0110")));
        assert!(!away.matches(Some(&bits("0101")), &bits("0101")));
    }

    #[test]
    fn test_edges_need_single_bits() {
        let rises = Matcher::new(Condition::Rises, None).unwrap();
        assert!(rises.matches(Some(&bits("0")), &bits("1")));
        assert!(!rises.matches(Some(&bits("00")), &bits("01")));
        assert!(!rises.matches(None, &bits("1")));
        let falls = Matcher::new(Condition::Falls, None).unwrap();
        assert!(falls.matches(Some(&bits("1")), &bits("0")));
        assert!(!falls.matches(Some(&bits("x")), &bits("0")));
    }

    #[test]
    fn test_numeric_crossings() {
        let greater = Matcher::new(Condition::Greater, Some("0x4")).unwrap();
        assert!(greater.matches(Some(&bits("0011")), &bits("0101")));
        assert!(greater.matches(None, &bits("0101")));
        // already above the threshold
        assert!(!greater.matches(Some(&bits("0110")), &bits("0111")));
        // unknown bits never compare
        assert!(!greater.matches(Some(&bits("0011")), &bits("01x1")));
        assert!(!greater.matches(Some(&bits("xxxx")), &bits("0101")));

        let less = Matcher::new(Condition::Less, Some("3")).unwrap();
        assert!(less.matches(Some(&bits("0011")), &bits("0010")));
        assert!(!less.matches(Some(&bits("0010")), &bits("0001")));

        let nonsense = Matcher::new(Condition::Greater, Some("IDLE")).unwrap();
        assert!(!nonsense.matches(None, &bits("1111")));
    }

    #[test]
    fn test_parse_condition() {
        assert_eq!("not_equals".parse::<Condition>().unwrap(), Condition::NotEquals);
        assert!("toggles".parse::<Condition>().is_err());
    }
}
