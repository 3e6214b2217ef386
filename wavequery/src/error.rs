// Copyright 2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::Time;
use serde::Serialize;
use serde_json::{json, Map, Value as JsonValue};
use std::path::PathBuf;

/// Coarse error category. Lets a transport layer decide how to react without matching
/// on every individual variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    ResourceExceeded,
    UpstreamFailure,
}

/// Machine readable error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    FileNotFound,
    NotAFile,
    SessionNotFound,
    SessionLimitExceeded,
    LoadFailed,
    SignalNotFound,
    SignalLoadFailed,
    ScopeNotFound,
    NoValueAtTime,
    IndexOutOfRange,
    InvalidTimeRange,
    MissingValue,
    UnexpectedValue,
    InvalidValue,
    ValueOverflow,
    InvalidParameter,
    UnknownOperation,
    NoData,
    IoError,
    SerializationError,
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("waveform file not found: {}", path.display())]
    FileNotFound { path: PathBuf },
    #[error("path is not a file: {}", path.display())]
    NotAFile { path: PathBuf },
    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: String },
    #[error("maximum number of sessions ({max_sessions}) reached, close existing sessions or wait for the timeout")]
    SessionLimitExceeded { max_sessions: usize },
    #[error("failed to load waveform {}: {reason}", path.display())]
    LoadFailed { path: PathBuf, reason: String },
    #[error("signal not found: {path}")]
    SignalNotFound { path: String },
    #[error("failed to load signal {path}: {reason}")]
    SignalLoadFailed { path: String, reason: String },
    #[error("scope not found: {path}")]
    ScopeNotFound { path: String },
    #[error("{path} has no value at time {time}")]
    NoValueAtTime { path: String, time: Time },
    #[error("time index {index} is out of range, the time table has {len} entries")]
    IndexOutOfRange { index: u64, len: usize },
    #[error("invalid time range: start_time ({start}) > end_time ({end})")]
    InvalidTimeRange { start: Time, end: Time },
    #[error("condition `{condition}` requires a target value")]
    MissingValue { condition: &'static str },
    #[error("condition `{condition}` does not use a target value")]
    UnexpectedValue { condition: &'static str },
    #[error("invalid value `{value}`: {reason}")]
    InvalidValue { value: String, reason: String },
    #[error("value {value} exceeds bit width {bitwidth}")]
    ValueOverflow { value: String, bitwidth: u32 },
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("unknown operation `{operation}`, expected one of {expected}")]
    UnknownOperation {
        operation: String,
        expected: &'static str,
    },
    #[error("no signal changes of {path} in the requested time range")]
    NoData { path: String },
    #[error("io error")]
    Io(#[from] std::io::Error),
    #[error("failed to (de)serialize: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, QueryError>;

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::FileNotFound { .. }
            | QueryError::SessionNotFound { .. }
            | QueryError::SignalNotFound { .. }
            | QueryError::ScopeNotFound { .. }
            | QueryError::NoValueAtTime { .. }
            | QueryError::IndexOutOfRange { .. }
            | QueryError::NoData { .. } => ErrorKind::NotFound,
            QueryError::NotAFile { .. }
            | QueryError::InvalidTimeRange { .. }
            | QueryError::MissingValue { .. }
            | QueryError::UnexpectedValue { .. }
            | QueryError::InvalidValue { .. }
            | QueryError::InvalidParameter { .. }
            | QueryError::UnknownOperation { .. }
            | QueryError::Serialization(_) => ErrorKind::InvalidArgument,
            QueryError::SessionLimitExceeded { .. } | QueryError::ValueOverflow { .. } => {
                ErrorKind::ResourceExceeded
            }
            QueryError::LoadFailed { .. }
            | QueryError::SignalLoadFailed { .. }
            | QueryError::Io(_) => ErrorKind::UpstreamFailure,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            QueryError::FileNotFound { .. } => ErrorCode::FileNotFound,
            QueryError::NotAFile { .. } => ErrorCode::NotAFile,
            QueryError::SessionNotFound { .. } => ErrorCode::SessionNotFound,
            QueryError::SessionLimitExceeded { .. } => ErrorCode::SessionLimitExceeded,
            QueryError::LoadFailed { .. } => ErrorCode::LoadFailed,
            QueryError::SignalNotFound { .. } => ErrorCode::SignalNotFound,
            QueryError::SignalLoadFailed { .. } => ErrorCode::SignalLoadFailed,
            QueryError::ScopeNotFound { .. } => ErrorCode::ScopeNotFound,
            QueryError::NoValueAtTime { .. } => ErrorCode::NoValueAtTime,
            QueryError::IndexOutOfRange { .. } => ErrorCode::IndexOutOfRange,
            QueryError::InvalidTimeRange { .. } => ErrorCode::InvalidTimeRange,
            QueryError::MissingValue { .. } => ErrorCode::MissingValue,
            QueryError::UnexpectedValue { .. } => ErrorCode::UnexpectedValue,
            QueryError::InvalidValue { .. } => ErrorCode::InvalidValue,
            QueryError::ValueOverflow { .. } => ErrorCode::ValueOverflow,
            QueryError::InvalidParameter { .. } => ErrorCode::InvalidParameter,
            QueryError::UnknownOperation { .. } => ErrorCode::UnknownOperation,
            QueryError::NoData { .. } => ErrorCode::NoData,
            QueryError::Io(_) => ErrorCode::IoError,
            QueryError::Serialization(_) => ErrorCode::SerializationError,
        }
    }

    /// The values that caused the error, keyed by parameter name.
    pub fn context(&self) -> Map<String, JsonValue> {
        let value = match self {
            QueryError::FileNotFound { path }
            | QueryError::NotAFile { path } => json!({ "path": path.display().to_string() }),
            QueryError::LoadFailed { path, reason } => {
                json!({ "path": path.display().to_string(), "reason": reason })
            }
            QueryError::SessionNotFound { session_id } => json!({ "session_id": session_id }),
            QueryError::SessionLimitExceeded { max_sessions } => {
                json!({ "max_sessions": max_sessions })
            }
            QueryError::SignalNotFound { path } | QueryError::NoData { path } => {
                json!({ "variable_path": path })
            }
            QueryError::SignalLoadFailed { path, reason } => {
                json!({ "variable_path": path, "reason": reason })
            }
            QueryError::ScopeNotFound { path } => json!({ "scope_path": path }),
            QueryError::NoValueAtTime { path, time } => {
                json!({ "variable_path": path, "time": time })
            }
            QueryError::IndexOutOfRange { index, len } => json!({ "index": index, "len": len }),
            QueryError::InvalidTimeRange { start, end } => {
                json!({ "start_time": start, "end_time": end })
            }
            QueryError::MissingValue { condition } | QueryError::UnexpectedValue { condition } => {
                json!({ "condition": condition })
            }
            QueryError::InvalidValue { value, reason } => json!({ "value": value, "reason": reason }),
            QueryError::ValueOverflow { value, bitwidth } => {
                json!({ "value": value, "bitwidth": bitwidth })
            }
            QueryError::InvalidParameter { name, reason } => {
                json!({ "parameter": name, "reason": reason })
            }
            QueryError::UnknownOperation {
                operation,
                expected,
            } => json!({ "operation": operation, "expected": expected }),
            QueryError::Io(e) => json!({ "error": e.to_string() }),
            QueryError::Serialization(e) => json!({ "error": e.to_string() }),
        };
        match value {
            JsonValue::Object(map) => map,
            _ => Map::new(),
        }
    }

    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            error: self.code(),
            kind: self.kind(),
            message: self.to_string(),
            context: self.context(),
        }
    }
}

/// Serializable rendition of a [`QueryError`].
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub error: ErrorCode,
    pub kind: ErrorKind,
    pub message: String,
    pub context: Map<String, JsonValue>,
}

impl From<&QueryError> for ErrorReport {
    fn from(value: &QueryError) -> Self {
        value.to_report()
    }
}
