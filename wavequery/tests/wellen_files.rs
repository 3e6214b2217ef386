// Copyright 2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//
// Drives the whole stack through real files parsed by `wellen`.

use std::path::PathBuf;
use std::sync::Arc;
use wavequery::query::{ChangesParams, Condition, TransitionParams};
use wavequery::{
    LoadOptions, QueryEngine, QueryError, RegistryConfig, SessionRegistry, WellenStore,
};

const COUNTER_VCD: &str = r#"$date
    today
$end
$version
    handwritten
$end
$timescale 1ns $end
$scope module top $end
$var wire 1 ! clk $end
$var wire 4 " cnt $end
$upscope $end
$enddefinitions $end
#0
0!
b0000 "
#10
1!
b0001 "
#20
0!
#30
1!
b0010 "
#40
0!
"#;

/// Writes `content` to a file in the temp directory that is unique to this test.
fn write_temp(name: &str, content: &[u8]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("wavequery-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn engine() -> QueryEngine {
    let registry = SessionRegistry::new(Arc::new(WellenStore), RegistryConfig::default());
    QueryEngine::new(Arc::new(registry))
}

#[test]
fn test_query_vcd_file() {
    let path = write_temp("counter.vcd", COUNTER_VCD.as_bytes());
    let engine = engine();
    let opened = engine.open_waveform(&path, LoadOptions::default()).unwrap();
    assert_eq!(opened.format, "Vcd");
    assert_eq!(opened.num_variables, 2);
    assert_eq!(opened.timescale.as_deref(), Some("1ns"));
    assert_eq!(opened.time_range.min_time, Some(0));
    assert_eq!(opened.time_range.max_time, Some(40));
    assert!(opened.file_path.is_absolute());
    let sid = opened.session_id;

    let rises = TransitionParams::new(Condition::Rises);
    let found = engine.find_transition(&sid, "top.clk", &rises).unwrap();
    let times: Vec<_> = found.transitions.iter().map(|t| t.time).collect();
    assert_eq!(times, [10, 30]);

    let changes = engine
        .get_changes(&sid, "top.cnt", &ChangesParams::default())
        .unwrap();
    let values: Vec<_> = changes.changes.iter().map(|c| c.value.as_str()).collect();
    assert_eq!(values, ["0000", "0001", "0010"]);

    let stats = engine.waveform_statistics(&sid).unwrap();
    assert_eq!(
        stats.file_info.size_bytes,
        Some(COUNTER_VCD.len() as u64)
    );

    let scopes = engine.list_top_scopes(&sid).unwrap();
    assert_eq!(scopes[0].scope_type, "Module");
}

#[test]
fn test_open_errors() {
    let engine = engine();
    let missing = std::env::temp_dir().join("wavequery-does-not-exist.vcd");
    let err = engine
        .open_waveform(&missing, LoadOptions::default())
        .unwrap_err();
    assert!(matches!(err, QueryError::FileNotFound { .. }));

    let dir = write_temp("marker", b"").parent().unwrap().to_path_buf();
    let err = engine.open_waveform(&dir, LoadOptions::default()).unwrap_err();
    assert!(matches!(err, QueryError::NotAFile { .. }));

    let garbage = write_temp("garbage.vcd", b"this is not a waveform\x00\x01\x02");
    let err = engine
        .open_waveform(&garbage, LoadOptions::default())
        .unwrap_err();
    assert!(matches!(err, QueryError::LoadFailed { .. }));
    assert_ne!(
        err.kind(),
        QueryError::SessionLimitExceeded { max_sessions: 1 }.kind()
    );
    assert_eq!(engine.list_sessions().count, 0);
}
