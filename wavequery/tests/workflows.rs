// Copyright 2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//
// Batches, session snapshots, signal lists and exports.

mod utils;
use utils::*;
use wavequery::export::{ExportFormat, TimeFormat, TreeFormat, TreeOptions};
use wavequery::persist::{
    load_signal_list, load_state, save_signal_list, save_state, SignalList,
};
use wavequery::query::{ChangesParams, StatisticsParams, ValueParams};
use wavequery::{batch, BatchOperation, BatchQuery, ErrorCode, QueryError, ValueFormat};

#[test]
fn test_batch_keeps_going_after_a_failure() {
    let (engine, sid) = engine();
    let queries = [
        BatchQuery::new(
            "top.clk",
            BatchOperation::GetValue(ValueParams {
                times: vec![100],
                format: ValueFormat::Auto,
            }),
        )
        .unwrap(),
        BatchQuery::new(
            "top.does_not_exist",
            BatchOperation::GetChanges(ChangesParams::default()),
        )
        .unwrap(),
        BatchQuery::new(
            "top.data",
            BatchOperation::GetStatistics(StatisticsParams::default()),
        )
        .unwrap(),
    ];
    let report = batch(&engine, &sid, &queries);
    assert_eq!(
        (report.total, report.successful, report.failed),
        (3, 2, 1)
    );
    assert!(report.results[0].success);
    assert_eq!(report.results[0].data.as_ref().unwrap()["values"][0]["value"], "1");
    assert!(!report.results[1].success);
    assert_eq!(
        report.results[1].error.as_ref().unwrap().error,
        ErrorCode::SignalNotFound
    );
    assert!(report.results[2].success);
    assert_eq!(report.results[2].data.as_ref().unwrap()["num_changes"], 4);
    let indices: Vec<_> = report.results.iter().map(|r| r.index).collect();
    assert_eq!(indices, [0, 1, 2]);
}

#[test]
fn test_batch_reports_incomplete_queries() {
    let (engine, sid) = engine();
    let queries: Vec<BatchQuery> = serde_json::from_str(
        r#"[
            {"operation": "get_value", "params": {"times": [0]}},
            {"path": "top.clk"},
            {"path": "top.clk", "operation": "get_changes", "params": {"max_changes": 2}}
        ]"#,
    )
    .unwrap();
    let report = batch(&engine, &sid, &queries);
    assert_eq!((report.successful, report.failed), (1, 2));
    let missing = report.results[0].error.as_ref().unwrap();
    assert_eq!(missing.error, ErrorCode::InvalidParameter);
    assert_eq!(missing.context["parameter"], "path");
    let missing = report.results[1].error.as_ref().unwrap();
    assert_eq!(missing.context["parameter"], "operation");
    assert_eq!(report.results[2].data.as_ref().unwrap()["truncated"], true);
}

#[test]
fn test_batch_defaults_and_per_item_validation() {
    let (engine, sid) = engine();
    let queries: Vec<BatchQuery> = serde_json::from_str(
        r#"[
            {"path": "top.data", "operation": "get_statistics"},
            {"path": "top.data", "operation": "get_changes", "params": {"max_changes": "two"}},
            {"path": "top.data", "operation": "get_everything"}
        ]"#,
    )
    .unwrap();
    let report = batch(&engine, &sid, &queries);
    assert_eq!((report.total, report.successful, report.failed), (3, 1, 2));
    assert_eq!(report.results[0].data.as_ref().unwrap()["num_changes"], 4);
    let bad_params = report.results[1].error.as_ref().unwrap();
    assert_eq!(bad_params.error, ErrorCode::InvalidParameter);
    assert_eq!(bad_params.context["parameter"], "params");
    let unknown = report.results[2].error.as_ref().unwrap();
    assert_eq!(unknown.error, ErrorCode::UnknownOperation);
    assert_eq!(unknown.context["operation"], "get_everything");
}

#[test]
fn test_batch_on_unknown_session() {
    let (engine, _) = engine();
    let queries = [BatchQuery::new(
        "top.clk",
        BatchOperation::GetChanges(ChangesParams::default()),
    )
    .unwrap()];
    let report = batch(&engine, "nope", &queries);
    assert_eq!(report.failed, 1);
    assert_eq!(
        report.results[0].error.as_ref().unwrap().error,
        ErrorCode::SessionNotFound
    );
}

#[test]
fn test_save_and_load_state() {
    let (engine, sid) = engine();
    engine
        .add_bookmark(&sid, 150, "valid", None, strings(&["top.valid"]))
        .unwrap();
    engine.add_bookmark(&sid, 300, "full", None, vec![]).unwrap();

    let mut saved = Vec::new();
    let snapshot = save_state(&engine, &sid, &mut saved).unwrap();
    assert_eq!(snapshot.bookmarks.len(), 2);
    let json: serde_json::Value = serde_json::from_slice(&saved).unwrap();
    assert_eq!(json["version"], "1.0");
    assert_eq!(json["session_id"], sid.as_str());
    assert_eq!(json["config"]["multi_threaded"], true);

    let restored = load_state(&engine, saved.as_slice(), true).unwrap();
    assert_ne!(restored.session_id, sid);
    assert_eq!(restored.original_session_id, sid);
    assert_eq!(restored.bookmarks_restored, 2);
    let bookmarks = engine.list_bookmarks(&restored.session_id).unwrap();
    assert_eq!(bookmarks[0].signals, ["top.valid"]);

    // restored ids are not handed out again
    let next = engine
        .add_bookmark(&restored.session_id, 400, "next", None, vec![])
        .unwrap();
    assert_eq!(next.id, 2);

    let without = load_state(&engine, saved.as_slice(), false).unwrap();
    assert_eq!(without.bookmarks_restored, 0);
    assert!(engine.list_bookmarks(&without.session_id).unwrap().is_empty());
}

#[test]
fn test_load_state_rejects_unknown_versions() {
    let (engine, _) = engine();
    let snapshot = format!(
        r#"{{"version": "2.0", "session_id": "old", "saved_at": "2024-01-01T00:00:00Z",
            "file_path": "{DESIGN_PATH}",
            "config": {{"multi_threaded": false, "remove_empty_scopes": false}}}}"#
    );
    let err = load_state(&engine, snapshot.as_bytes(), true).unwrap_err();
    assert!(matches!(err, QueryError::InvalidParameter { name: "version", .. }));

    let err = load_state(&engine, "not json".as_bytes(), true).unwrap_err();
    assert_eq!(err.code(), ErrorCode::SerializationError);
}

#[test]
fn test_signal_lists() {
    let (engine, sid) = engine();
    let config = r#"{
        "signals": ["top.clk", "top.missing"],
        "groups": {"handshake": ["top.valid", "top.ready", "top.cpu.gone"]},
        "filters": {"types": ["Wire"]}
    }"#;
    let loaded = load_signal_list(&engine, &sid, config.as_bytes()).unwrap();
    assert_eq!(loaded.list.signals, ["top.clk"]);
    assert_eq!(loaded.list.groups["handshake"], ["top.valid", "top.ready"]);
    assert_eq!(loaded.validation.total_signals, 5);
    assert_eq!(loaded.validation.valid_signals, 3);
    assert_eq!(
        loaded.validation.invalid_signals.as_deref(),
        Some(&["top.missing".to_string(), "top.cpu.gone".to_string()][..])
    );
    assert_eq!(loaded.list.filters["types"][0], "Wire");

    let mut out = Vec::new();
    let list = SignalList {
        signals: strings(&["top.clk", "top.data"]),
        ..Default::default()
    };
    let saved = save_signal_list(&engine, &sid, &mut out, list).unwrap();
    assert_eq!(saved.metadata["session_id"], sid.as_str());
    let reloaded = load_signal_list(&engine, &sid, out.as_slice()).unwrap();
    assert_eq!(reloaded.list.signals, ["top.clk", "top.data"]);
    assert!(reloaded.validation.invalid_signals.is_none());

    let bad = SignalList {
        signals: strings(&["top.clk", "top.missing"]),
        ..Default::default()
    };
    let err = save_signal_list(&engine, &sid, Vec::new(), bad).unwrap_err();
    assert!(matches!(err, QueryError::SignalNotFound { .. }));
}

#[test]
fn test_export_signal() {
    let (engine, sid) = engine();
    let mut out = Vec::new();
    let summary = engine
        .export_signal(&sid, "top.valid", None, None, ExportFormat::Csv, &mut out)
        .unwrap();
    assert_eq!(summary.changes_exported, 3);
    assert_eq!(String::from_utf8(out).unwrap(), "Time,Value\n0,0\n150,1\n350,0\n");

    let mut out = Vec::new();
    let summary = engine
        .export_signal(&sid, "top.clk", Some(100), Some(300), ExportFormat::Json, &mut out)
        .unwrap();
    assert_eq!(summary.time_range.duration, 200);
    let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(json["signal"], "top.clk");
    assert_eq!(json["metadata"]["total_changes"], 3);
    assert_eq!(json["changes"][0]["time"], 100);

    let err = engine
        .export_signal(&sid, "top.clk", Some(510), None, ExportFormat::Csv, Vec::new())
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NoData);
}

#[test]
fn test_export_csv_forward_fills() {
    let (engine, sid) = engine();
    let paths = strings(&["top.clk", "top.valid"]);
    let mut out = Vec::new();
    let summary = engine
        .export_csv(
            &sid,
            &paths,
            Some(100),
            Some(300),
            true,
            TimeFormat::Absolute,
            &mut out,
        )
        .unwrap();
    assert_eq!(summary.rows_written, 4);
    assert_eq!(summary.time_range.start, 100);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "Time,top.clk,top.valid\n100,1,0\n150,1,1\n200,0,1\n300,1,1\n"
    );
}

#[test]
fn test_export_csv_relative_without_header() {
    let mut b = wavequery::TraceBuilder::new();
    b.add_scope("top");
    b.add_bits("a", [(10, "0"), (30, "1")]);
    b.add_bits("b", [(20, "1")]);
    b.pop_scope();
    let (engine, sid) = engine_with(b);
    let mut out = Vec::new();
    engine
        .export_csv(
            &sid,
            &strings(&["top.a", "top.b"]),
            Some(15),
            None,
            false,
            TimeFormat::Relative,
            &mut out,
        )
        .unwrap();
    // rows start at the first change inside the window, `a` carries its value from time 10
    assert_eq!(String::from_utf8(out).unwrap(), "0,0,1\n10,1,1\n");

    let err = engine
        .export_csv(
            &sid,
            &strings(&["top.a", "top.nope"]),
            None,
            None,
            true,
            TimeFormat::Absolute,
            Vec::new(),
        )
        .unwrap_err();
    assert!(matches!(err, QueryError::SignalNotFound { .. }));
}

#[test]
fn test_export_hierarchy_tree() {
    let (engine, sid) = engine();
    let mut out = Vec::new();
    let stats = engine
        .export_hierarchy_tree(&sid, &TreeOptions::default(), &mut out)
        .unwrap();
    assert_eq!(
        (stats.total_scopes, stats.total_variables, stats.max_depth_reached),
        (2, 7, 1)
    );
    let tree: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(tree["design"], "counter.vcd");
    let top = &tree["scopes"][0];
    assert_eq!(top["name"], "top");
    assert_eq!(top["variables"].as_array().unwrap().len(), 4);
    assert_eq!(top["variables"][0]["name"], "clk");
    assert_eq!(top["variables"][1]["length"], 8);
    assert_eq!(top["metadata"]["num_children"], 1);
    assert_eq!(top["children"][0]["name"], "cpu");
    assert_eq!(top["children"][0]["metadata"]["depth"], 1);

    let shallow = TreeOptions {
        include_variables: false,
        include_metadata: false,
        max_depth: Some(1),
        ..Default::default()
    };
    let mut out = Vec::new();
    let stats = engine.export_hierarchy_tree(&sid, &shallow, &mut out).unwrap();
    assert_eq!((stats.total_scopes, stats.total_variables), (1, 0));
    let tree: serde_json::Value = serde_json::from_slice(&out).unwrap();
    let top = tree["scopes"][0].as_object().unwrap();
    assert!(!top.contains_key("children"));
    assert!(!top.contains_key("variables"));
    assert!(!top.contains_key("metadata"));
}

#[test]
fn test_export_hierarchy_tree_as_text() {
    let (engine, sid) = engine();
    let options = TreeOptions {
        format: TreeFormat::Text,
        ..Default::default()
    };
    let mut out = Vec::new();
    engine.export_hierarchy_tree(&sid, &options, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Design: counter.vcd");
    assert_eq!(lines[1], "");
    assert!(lines[2].starts_with("├─ top ("));
    assert!(lines[3].starts_with("  │  clk : "));
    assert!(lines[7].starts_with("  ├─ cpu ("));
    assert!(lines[8].starts_with("    │  pc : "));
    assert_eq!(lines.len(), 11);
}
