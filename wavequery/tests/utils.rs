// Copyright 2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
#![allow(dead_code)]

use std::sync::Arc;
use wavequery::{
    LoadOptions, MemoryStore, QueryEngine, RegistryConfig, SessionRegistry, SignalKind,
    TraceBuilder, Value,
};

pub const DESIGN_PATH: &str = "/designs/counter.vcd";

/// A small design with changes at 0, 100, 150, 200, 250, 300, 350, 400, 450 and 500:
///
/// ```text
/// top
///   clk    0 1 0 1 0 1 every 100
///   data   8 bit
///   valid  high from 150 to 350
///   ready  same as valid
///   cpu
///     pc     4 bit, counts every 200
///     state  string
///     temp   real
/// ```
pub fn design() -> TraceBuilder {
    let mut b = TraceBuilder::new();
    b.set_timescale("1ns");
    b.add_scope("top");
    b.add_bits(
        "clk",
        [(0, "0"), (100, "1"), (200, "0"), (300, "1"), (400, "0"), (500, "1")],
    );
    b.add_bits(
        "data",
        [
            (0, "00000000"),
            (100, "00001111"),
            (300, "11111111"),
            (450, "0000xxxx"),
        ],
    );
    b.add_bits("valid", [(0, "0"), (150, "1"), (350, "0")]);
    b.add_bits("ready", [(0, "0"), (150, "1"), (350, "0")]);
    b.add_scope("cpu");
    b.add_bits("pc", [(0, "0000"), (200, "0001"), (400, "0010")]);
    b.add_var(
        "state",
        SignalKind::String,
        [(0, Value::Str("IDLE".to_string())), (250, Value::Str("BUSY".to_string()))],
    );
    b.add_var(
        "temp",
        SignalKind::Real,
        [(0, Value::Real(1.5)), (300, Value::Real(2.25))],
    );
    b.pop_scope();
    b.pop_scope();
    b
}

pub fn engine_with(builder: TraceBuilder) -> (QueryEngine, String) {
    let store = MemoryStore::new();
    store.insert(DESIGN_PATH, builder.finish());
    let registry = SessionRegistry::new(Arc::new(store), RegistryConfig::default());
    let engine = QueryEngine::new(Arc::new(registry));
    let opened = engine
        .open_waveform(DESIGN_PATH, LoadOptions::default())
        .unwrap();
    (engine, opened.session_id)
}

/// Engine with one open session on [`design`].
pub fn engine() -> (QueryEngine, String) {
    engine_with(design())
}

/// Engine with a single `top.clk` made of the given changes.
pub fn clock_engine(changes: &[(u64, &str)]) -> (QueryEngine, String) {
    let mut b = TraceBuilder::new();
    b.add_scope("top");
    b.add_bits("clk", changes.iter().copied());
    b.pop_scope();
    engine_with(b)
}

pub fn strings(paths: &[&str]) -> Vec<String> {
    paths.iter().map(|p| p.to_string()).collect()
}
