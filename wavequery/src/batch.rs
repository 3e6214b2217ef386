// Copyright 2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//! # Batch Queries
//! Runs several signal queries against one session. A failing query is recorded in its
//! result slot and never stops the remaining queries.

use crate::query::{ChangesParams, StatisticsParams, ValueParams};
use crate::{ErrorReport, QueryEngine, QueryError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

const OPERATION_NAMES: &str = "get_value, get_changes, get_statistics";

/// The operation of a batch entry together with its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "params", rename_all = "snake_case")]
pub enum BatchOperation {
    GetValue(ValueParams),
    GetChanges(ChangesParams),
    GetStatistics(StatisticsParams),
}

impl BatchOperation {
    pub fn name(&self) -> &'static str {
        match self {
            BatchOperation::GetValue(_) => "get_value",
            BatchOperation::GetChanges(_) => "get_changes",
            BatchOperation::GetStatistics(_) => "get_statistics",
        }
    }

    /// Builds an operation from its name and untyped parameters. Missing parameters
    /// take their default values.
    pub fn parse(operation: &str, params: JsonValue) -> Result<Self> {
        match operation {
            "get_value" => typed_params(params).map(BatchOperation::GetValue),
            "get_changes" => typed_params(params).map(BatchOperation::GetChanges),
            "get_statistics" => typed_params(params).map(BatchOperation::GetStatistics),
            other => Err(QueryError::UnknownOperation {
                operation: other.to_string(),
                expected: OPERATION_NAMES,
            }),
        }
    }

    fn params(&self) -> Result<JsonValue> {
        let params = match self {
            BatchOperation::GetValue(p) => serde_json::to_value(p)?,
            BatchOperation::GetChanges(p) => serde_json::to_value(p)?,
            BatchOperation::GetStatistics(p) => serde_json::to_value(p)?,
        };
        Ok(params)
    }
}

fn typed_params<T: DeserializeOwned>(params: JsonValue) -> Result<T> {
    let params = match params {
        JsonValue::Null => JsonValue::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(params).map_err(|e| QueryError::InvalidParameter {
        name: "params",
        reason: e.to_string(),
    })
}

/// One entry of a batch as it arrives from a transport layer. The entry is only checked
/// when the batch runs, so that every problem is reported for its own item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchQuery {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<JsonValue>,
}

impl BatchQuery {
    pub fn new(path: impl Into<String>, operation: BatchOperation) -> Result<Self> {
        Ok(Self {
            path: Some(path.into()),
            operation: Some(operation.name().to_string()),
            params: Some(operation.params()?),
        })
    }

    /// Validates the entry and returns its path and typed operation.
    pub fn resolve(&self) -> Result<(&str, BatchOperation)> {
        let path = self
            .path
            .as_deref()
            .ok_or_else(|| QueryError::InvalidParameter {
                name: "path",
                reason: "missing".to_string(),
            })?;
        let operation = self
            .operation
            .as_deref()
            .ok_or_else(|| QueryError::InvalidParameter {
                name: "operation",
                reason: "missing".to_string(),
            })?;
        let params = self.params.clone().unwrap_or(JsonValue::Null);
        Ok((path, BatchOperation::parse(operation, params)?))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub index: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// In the same order as the queries.
    pub results: Vec<BatchResult>,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

pub fn batch(engine: &QueryEngine, session_id: &str, queries: &[BatchQuery]) -> BatchReport {
    let results: Vec<BatchResult> = queries
        .iter()
        .enumerate()
        .map(|(index, query)| match run(engine, session_id, query) {
            Ok(data) => BatchResult {
                index,
                success: true,
                data: Some(data),
                error: None,
            },
            Err(e) => {
                tracing::debug!(index, error = %e, "batch query failed");
                BatchResult {
                    index,
                    success: false,
                    data: None,
                    error: Some(e.to_report()),
                }
            }
        })
        .collect();
    let successful = results.iter().filter(|r| r.success).count();
    BatchReport {
        total: results.len(),
        failed: results.len() - successful,
        successful,
        results,
    }
}

fn run(engine: &QueryEngine, session_id: &str, query: &BatchQuery) -> Result<JsonValue> {
    let (path, operation) = query.resolve()?;
    let data = match &operation {
        BatchOperation::GetValue(params) => {
            serde_json::to_value(engine.get_value(session_id, path, params)?)?
        }
        BatchOperation::GetChanges(params) => {
            serde_json::to_value(engine.get_changes(session_id, path, params)?)?
        }
        BatchOperation::GetStatistics(params) => {
            serde_json::to_value(engine.get_statistics(session_id, path, params)?)?
        }
    };
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode;

    fn resolve(entry: &str) -> Result<BatchOperation> {
        let query: BatchQuery = serde_json::from_str(entry).unwrap();
        query.resolve().map(|(_, op)| op)
    }

    #[test]
    fn test_query_serde() {
        let op = resolve(
            r#"{"path": "top.clk", "operation": "get_changes", "params": {"max_changes": 3}}"#,
        )
        .unwrap();
        match op {
            BatchOperation::GetChanges(p) => assert_eq!(p.max_changes, Some(3)),
            other => panic!("unexpected operation: {other:?}"),
        }

        let q: BatchQuery = serde_json::from_str(r#"{"path": "top.clk"}"#).unwrap();
        assert!(q.operation.is_none());
        let err = q.resolve().unwrap_err();
        assert_eq!(err.context()["parameter"], "operation");
    }

    #[test]
    fn test_missing_params_use_defaults() {
        let op = resolve(r#"{"path": "top.data", "operation": "get_statistics"}"#).unwrap();
        assert_eq!(op, BatchOperation::GetStatistics(StatisticsParams::default()));
        let op = resolve(r#"{"path": "top.data", "operation": "get_changes", "params": null}"#)
            .unwrap();
        assert_eq!(op, BatchOperation::GetChanges(ChangesParams::default()));
    }

    #[test]
    fn test_unknown_operation_and_bad_params_are_distinct() {
        let err = resolve(r#"{"path": "top.data", "operation": "get_everything"}"#).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownOperation);
        assert_eq!(err.context()["operation"], "get_everything");

        let err = resolve(
            r#"{"path": "top.data", "operation": "get_changes", "params": {"max_changes": "two"}}"#,
        )
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParameter);
        assert_eq!(err.context()["parameter"], "params");
    }

    #[test]
    fn test_typed_entries_keep_their_params() {
        let params = ChangesParams {
            max_changes: Some(2),
            ..Default::default()
        };
        let query = BatchQuery::new("top.clk", BatchOperation::GetChanges(params.clone())).unwrap();
        assert_eq!(query.operation.as_deref(), Some("get_changes"));
        let (path, op) = query.resolve().unwrap();
        assert_eq!(path, "top.clk");
        assert_eq!(op, BatchOperation::GetChanges(params));
    }
}
