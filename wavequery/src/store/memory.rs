// Copyright 2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//
// Traces that live in memory. Used to embed synthetic waveforms and by the tests.

use super::{TimeIndexSource, Trace, WaveformStore};
use crate::{
    Hierarchy, HierarchyBuilder, LoadOptions, QueryError, Result, Signal, SignalKind, Time,
    TimeTableIdx, Value, Var, VarDirection, VarRef,
};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Builds a [`MemoryTrace`]. Changes are given in absolute time, the time table is the
/// sorted union of all change times and any extra times added with [`TraceBuilder::add_times`].
pub struct TraceBuilder {
    hierarchy: HierarchyBuilder,
    extra_times: Vec<Time>,
    signals: Vec<Vec<(Time, Value)>>,
}

impl TraceBuilder {
    pub fn new() -> Self {
        Self {
            hierarchy: HierarchyBuilder::new("Memory"),
            extra_times: Vec::new(),
            signals: Vec::new(),
        }
    }

    pub fn set_timescale(&mut self, timescale: impl Into<String>) -> &mut Self {
        self.hierarchy.set_timescale(timescale);
        self
    }

    pub fn add_scope(&mut self, name: impl Into<String>) -> &mut Self {
        self.hierarchy.add_scope(name, "Module");
        self
    }

    pub fn pop_scope(&mut self) -> &mut Self {
        self.hierarchy.pop_scope();
        self
    }

    /// Adds time points that no signal changes at.
    pub fn add_times(&mut self, times: impl IntoIterator<Item = Time>) -> &mut Self {
        self.extra_times.extend(times);
        self
    }

    pub fn add_var(
        &mut self,
        name: impl Into<String>,
        kind: SignalKind,
        changes: impl IntoIterator<Item = (Time, Value)>,
    ) -> VarRef {
        let var_type = match kind {
            SignalKind::BitVector(1) => "Wire",
            SignalKind::BitVector(_) => "Reg",
            SignalKind::Real => "Real",
            SignalKind::String => "String",
        };
        let signal_id = self.signals.len() as u32;
        let mut changes: Vec<_> = changes.into_iter().collect();
        changes.sort_by_key(|(time, _)| *time);
        self.signals.push(changes);
        self.hierarchy
            .add_var(name, var_type, VarDirection::Unknown, kind, signal_id)
    }

    /// Adds a bit-vector variable whose width is the length of its first value.
    pub fn add_bits<'a>(
        &mut self,
        name: impl Into<String>,
        changes: impl IntoIterator<Item = (Time, &'a str)>,
    ) -> VarRef {
        let changes: Vec<_> = changes
            .into_iter()
            .map(|(time, bits)| (time, Value::bits(bits)))
            .collect();
        let width = match changes.first() {
            Some((_, Value::Bits(bits))) => bits.len() as u32,
            _ => 1,
        };
        self.add_var(name, SignalKind::BitVector(width), changes)
    }

    pub fn finish(self) -> MemoryTrace {
        let mut time_table: Vec<Time> = self
            .signals
            .iter()
            .flat_map(|changes| changes.iter().map(|(time, _)| *time))
            .chain(self.extra_times)
            .collect();
        time_table.sort_unstable();
        time_table.dedup();

        let signals = self
            .signals
            .into_iter()
            .map(|changes| {
                Signal::from_changes(changes.into_iter().map(|(time, value)| {
                    // every change time is part of the table
                    let idx = time_table.partition_point(|t| *t < time);
                    (idx as TimeTableIdx, value)
                }))
            })
            .collect();

        MemoryTrace {
            hierarchy: self.hierarchy.finish(),
            time_table: Arc::new(time_table),
            signals,
        }
    }
}

impl Default for TraceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MemoryTrace {
    hierarchy: Hierarchy,
    time_table: Arc<Vec<Time>>,
    signals: Vec<Signal>,
}

impl Trace for MemoryTrace {
    fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    fn time_source(&self) -> Arc<dyn TimeIndexSource> {
        self.time_table.clone()
    }

    fn load_signal(&self, var: &Var) -> Result<Signal> {
        self.signals
            .get(var.signal_id() as usize)
            .cloned()
            .ok_or_else(|| QueryError::SignalLoadFailed {
                path: var.full_name().to_string(),
                reason: "unknown signal id".to_string(),
            })
    }
}

/// Serves registered [`MemoryTrace`]s by path. Nothing touches the file system.
#[derive(Default)]
pub struct MemoryStore {
    traces: RwLock<FxHashMap<PathBuf, Arc<MemoryTrace>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, trace: MemoryTrace) {
        self.traces.write().insert(path.into(), Arc::new(trace));
    }
}

impl WaveformStore for MemoryStore {
    fn check_path(&self, path: &Path) -> Result<()> {
        if self.traces.read().contains_key(path) {
            Ok(())
        } else {
            Err(QueryError::FileNotFound {
                path: path.to_path_buf(),
            })
        }
    }

    fn open(&self, path: &Path, _options: &LoadOptions) -> Result<Arc<dyn Trace>> {
        match self.traces.read().get(path) {
            Some(trace) => Ok(trace.clone()),
            None => Err(QueryError::LoadFailed {
                path: path.to_path_buf(),
                reason: "no trace registered under this path".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_time_table() {
        let mut b = TraceBuilder::new();
        b.add_scope("top");
        let clk = b.add_bits("clk", [(0, "0"), (10, "1"), (20, "0")]);
        let data = b.add_bits("data", [(5, "0011"), (20, "0100")]);
        b.pop_scope();
        b.add_times([30]);
        let trace = b.finish();

        let times = trace.time_source();
        let table: Vec<_> = (0..6).map(|i| times.time_at(i)).collect();
        assert_eq!(
            table,
            [Some(0), Some(5), Some(10), Some(20), Some(30), None]
        );

        let h = trace.hierarchy();
        assert_eq!(h[data].length(), Some(4));
        assert_eq!(h[clk].full_name(), "top.clk");
        let signal = trace.load_signal(&h[data]).unwrap();
        let indices: Vec<_> = signal.iter_changes().map(|(i, _)| i).collect();
        assert_eq!(indices, [1, 3]);
    }

    #[test]
    fn test_store_lookup() {
        let store = MemoryStore::new();
        store.insert("/mem/a.vcd", TraceBuilder::new().finish());
        assert!(store.check_path(Path::new("/mem/a.vcd")).is_ok());
        let err = store.check_path(Path::new("/mem/b.vcd")).unwrap_err();
        assert!(matches!(err, QueryError::FileNotFound { .. }));
        assert!(store
            .open(Path::new("/mem/a.vcd"), &LoadOptions::default())
            .is_ok());
    }
}
