// Copyright 2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

mod utils;
use num::BigInt;
use utils::*;
use wavequery::query::{ChangesParams, Pattern, StatisticsParams, SummaryParams, ValueParams};
use wavequery::{ErrorKind, QueryError, ValueFormat};

#[test]
fn test_get_value() {
    let (engine, sid) = engine();
    let params = ValueParams {
        times: vec![0, 120, 300, 460],
        format: ValueFormat::Auto,
    };
    let values = engine.get_value(&sid, "top.data", &params).unwrap();
    assert_eq!(values.count, 4);
    let texts: Vec<_> = values.values.iter().map(|v| v.value.as_deref()).collect();
    assert_eq!(
        texts,
        [
            Some("00000000"),
            Some("00001111"),
            Some("11111111"),
            Some("0000xxxx")
        ]
    );
    assert!(values.values.iter().all(|v| v.error.is_none()));
}

#[test]
fn test_get_value_formats() {
    let (engine, sid) = engine();
    let at = |format| ValueParams {
        times: vec![120],
        format,
    };
    let value = |format| {
        engine.get_value(&sid, "top.data", &at(format)).unwrap().values[0]
            .value
            .clone()
            .unwrap()
    };
    assert_eq!(value(ValueFormat::Int), "15");
    assert_eq!(value(ValueFormat::Hex), "0xf");
    assert_eq!(value(ValueFormat::Bin), "0b1111");
    assert_eq!(value(ValueFormat::String), "00001111");

    // values with unknown bits fall back to their text
    let late = ValueParams {
        times: vec![460],
        format: ValueFormat::Int,
    };
    let values = engine.get_value(&sid, "top.data", &late).unwrap();
    assert_eq!(values.values[0].value.as_deref(), Some("0000xxxx"));

    let real = ValueParams {
        times: vec![300],
        format: ValueFormat::Hex,
    };
    let values = engine.get_value(&sid, "top.cpu.temp", &real).unwrap();
    assert_eq!(values.values[0].value.as_deref(), Some("2.25"));
}

#[test]
fn test_get_value_reports_missing_values_per_time() {
    let (engine, sid) = clock_engine(&[(100, "1"), (200, "0")]);
    let params = ValueParams {
        times: vec![50, 150],
        format: ValueFormat::Auto,
    };
    let values = engine.get_value(&sid, "top.clk", &params).unwrap();
    assert_eq!(values.values[0].value, None);
    assert!(values.values[0].error.is_some());
    assert_eq!(values.values[1].value.as_deref(), Some("1"));
}

#[test]
fn test_get_value_unknown_signal_and_session() {
    let (engine, sid) = engine();
    let params = ValueParams::default();
    let err = engine.get_value(&sid, "top.nope", &params).unwrap_err();
    assert!(matches!(err, QueryError::SignalNotFound { .. }));
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let err = engine.get_value("no-such-id", "top.clk", &params).unwrap_err();
    assert!(matches!(err, QueryError::SessionNotFound { .. }));
}

#[test]
fn test_get_changes_window_and_truncation() {
    let (engine, sid) = engine();
    let params = ChangesParams {
        start_time: Some(100),
        end_time: Some(400),
        ..Default::default()
    };
    let changes = engine.get_changes(&sid, "top.clk", &params).unwrap();
    let times: Vec<_> = changes.changes.iter().map(|c| c.time).collect();
    assert_eq!(times, [100, 200, 300, 400]);
    assert!(!changes.truncated);
    assert_eq!(changes.time_range.start, Some(100));

    let limited = ChangesParams {
        max_changes: Some(2),
        ..params.clone()
    };
    let changes = engine.get_changes(&sid, "top.clk", &limited).unwrap();
    assert_eq!(changes.count, 2);
    assert!(changes.truncated);

    // exactly as many matches as allowed
    let exact = ChangesParams {
        max_changes: Some(4),
        ..params
    };
    let changes = engine.get_changes(&sid, "top.clk", &exact).unwrap();
    assert_eq!(changes.count, 4);
    assert!(!changes.truncated);
}

#[test]
fn test_get_changes_rejects_inverted_window() {
    let (engine, sid) = engine();
    let params = ChangesParams {
        start_time: Some(400),
        end_time: Some(100),
        ..Default::default()
    };
    let err = engine.get_changes(&sid, "top.clk", &params).unwrap_err();
    assert!(matches!(
        err,
        QueryError::InvalidTimeRange {
            start: 400,
            end: 100
        }
    ));
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_statistics() {
    let (engine, sid) = engine();
    let stats = engine
        .get_statistics(&sid, "top.data", &StatisticsParams::default())
        .unwrap();
    assert_eq!(stats.num_changes, 4);
    assert_eq!(stats.num_unique_values, 4);
    assert_eq!(stats.first_change_time, Some(0));
    assert_eq!(stats.last_change_time, Some(450));
    let numeric = stats.numeric_statistics.unwrap();
    assert_eq!(numeric.min_value, BigInt::from(0));
    assert_eq!(numeric.max_value, BigInt::from(255));
    // the value with unknown bits does not count
    assert_eq!(numeric.num_numeric_samples, 3);

    let clk = engine
        .get_statistics(&sid, "top.clk", &StatisticsParams::default())
        .unwrap();
    assert_eq!(clk.num_changes, 6);
    assert_eq!(clk.num_unique_values, 2);
}

#[test]
fn test_statistics_edge_cases() {
    let (engine, sid) = engine();
    let empty = StatisticsParams {
        start_time: Some(460),
        end_time: Some(470),
    };
    let stats = engine.get_statistics(&sid, "top.data", &empty).unwrap();
    assert_eq!(stats.num_changes, 0);
    assert_eq!(stats.first_change_time, None);
    assert!(stats.numeric_statistics.is_none());

    let strings = engine
        .get_statistics(&sid, "top.cpu.state", &StatisticsParams::default())
        .unwrap();
    assert_eq!(strings.num_changes, 2);
    assert!(strings.numeric_statistics.is_none());
    let json = serde_json::to_value(&strings).unwrap();
    assert!(json.get("numeric_statistics").is_none());
}

#[test]
fn test_time_range_and_conversion() {
    let (engine, sid) = engine();
    let range = engine.time_range(&sid).unwrap();
    assert_eq!(range.min_time, Some(0));
    assert_eq!(range.max_time, Some(500));
    assert_eq!(range.num_time_points, 10);

    let conv = engine
        .time_convert(&sid, Some(&[0, 9, 10][..]), Some(&[150, 160, 175][..]))
        .unwrap();
    let to_time = conv.index_to_time.unwrap();
    assert_eq!(to_time[0].time, Some(0));
    assert_eq!(to_time[1].time, Some(500));
    assert_eq!(to_time[2].time, None);
    assert!(to_time[2].error.is_some());

    let to_index = conv.time_to_index.unwrap();
    assert_eq!((to_index[0].index, to_index[0].exact), (Some(2), true));
    assert_eq!((to_index[1].index, to_index[1].exact), (Some(2), false));
    assert_eq!(to_index[1].nearest_time, Some(150));
    // halfway between 150 and 200, the earlier time point wins
    assert_eq!(to_index[2].index, Some(2));

    let err = engine.time_convert(&sid, None, None).unwrap_err();
    assert!(matches!(err, QueryError::InvalidParameter { .. }));
}

#[test]
fn test_signals_are_cached() {
    let (engine, sid) = engine();
    let params = ValueParams {
        times: vec![0],
        format: ValueFormat::Auto,
    };
    engine.get_value(&sid, "top.clk", &params).unwrap();
    engine.get_value(&sid, "top.valid", &params).unwrap();
    let stats = engine.cache_stats(&sid).unwrap();
    assert_eq!(stats.cache_size, 2);
    assert_eq!(stats.cached_signals, ["top.valid", "top.clk"]);
    assert_eq!(stats.cache_max, 100);
    assert_eq!(stats.utilization, 2.0);
}

#[test]
fn test_summarize_clock() {
    let (engine, sid) = engine();
    let summary = engine
        .summarize_signal(&sid, "top.clk", &SummaryParams::default())
        .unwrap();
    assert_eq!(summary.total_changes, 6);
    assert_eq!(summary.patterns, [Pattern::Periodic, Pattern::BinaryToggle]);
    let stats = summary.statistics.as_ref().unwrap();
    assert_eq!(stats.toggle_count, Some(5));
    assert_eq!(stats.toggle_rate, Some(0.01));
    assert_eq!(stats.period, Some(100.0));
    assert_eq!(stats.duration, 500);
    assert_eq!(
        summary.summary,
        "Signal 'top.clk' has 6 transitions. periodic with period ~100.00 time units. 5 toggles"
    );
    assert!(!summary.truncated);
    assert_eq!(summary.representative_changes.len(), 6);

    let params = SummaryParams {
        max_changes: Some(4),
        include_stats: false,
    };
    let summary = engine.summarize_signal(&sid, "top.clk", &params).unwrap();
    assert!(summary.truncated);
    assert!(summary.statistics.is_none());
    let times: Vec<u64> = summary.representative_changes.iter().map(|c| c.time).collect();
    assert_eq!(times, [0, 100, 200, 300]);
}

#[test]
fn test_summarize_vector() {
    let (engine, sid) = engine();
    let summary = engine
        .summarize_signal(&sid, "top.data", &SummaryParams::default())
        .unwrap();
    assert_eq!(summary.total_changes, 4);
    assert_eq!(summary.patterns, [Pattern::LowActivity]);
    let stats = summary.statistics.unwrap();
    assert_eq!(stats.toggle_count, None);
    assert_eq!(stats.unique_values, 4);

    let err = engine
        .summarize_signal(&sid, "top.nope", &SummaryParams::default())
        .unwrap_err();
    assert!(matches!(err, QueryError::SignalNotFound { .. }));
}
