// Copyright 2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//
// Reads VCD, FST and GHW files through the wellen library.

use super::{TimeIndexSource, Trace, WaveformStore};
use crate::{
    Hierarchy, HierarchyBuilder, LoadOptions, QueryError, Result, Signal, SignalKind, Time, Value,
    Var, VarDirection,
};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use wellen::simple::Waveform;
use wellen::{SignalRef, SignalValue, TimescaleUnit};

/// Opens waveform files with [`wellen::simple::read_with_options`].
#[derive(Debug, Default, Clone, Copy)]
pub struct WellenStore;

impl WaveformStore for WellenStore {
    fn open(&self, path: &Path, options: &LoadOptions) -> Result<Arc<dyn Trace>> {
        let wellen_options = wellen::LoadOptions {
            multi_thread: options.multi_thread,
            remove_scopes_with_empty_name: options.remove_scopes_with_empty_name,
        };
        let waveform =
            wellen::simple::read_with_options(path, &wellen_options).map_err(|e| {
                QueryError::LoadFailed {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
            })?;
        let hierarchy = convert_hierarchy(waveform.hierarchy());
        let time_table = Arc::new(waveform.time_table().to_vec());
        let file_size = std::fs::metadata(path).map(|m| m.len()).ok();
        tracing::debug!(
            path = %path.display(),
            vars = hierarchy.num_vars(),
            time_points = time_table.len(),
            "loaded waveform"
        );
        Ok(Arc::new(WellenTrace {
            hierarchy,
            time_table,
            file_size,
            waveform: Mutex::new(waveform),
        }))
    }
}

/// A waveform file loaded by [`WellenStore`]. Signals are loaded one at a time and
/// unloaded from the waveform right after they have been converted.
pub struct WellenTrace {
    hierarchy: Hierarchy,
    time_table: Arc<Vec<Time>>,
    file_size: Option<u64>,
    waveform: Mutex<Waveform>,
}

impl Trace for WellenTrace {
    fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    fn time_source(&self) -> Arc<dyn TimeIndexSource> {
        self.time_table.clone()
    }

    fn load_signal(&self, var: &Var) -> Result<Signal> {
        let load_failed = |reason: &str| QueryError::SignalLoadFailed {
            path: var.full_name().to_string(),
            reason: reason.to_string(),
        };
        let signal_ref = SignalRef::from_index(var.signal_id() as usize)
            .ok_or_else(|| load_failed("invalid signal reference"))?;

        let mut waveform = self.waveform.lock();
        waveform.load_signals(&[signal_ref]);
        let signal = waveform
            .get_signal(signal_ref)
            .ok_or_else(|| load_failed("signal missing from waveform"))?;
        let out = Signal::from_changes(
            signal
                .iter_changes()
                .map(|(idx, value)| (idx, convert_value(value))),
        );
        waveform.unload_signals(&[signal_ref]);
        Ok(out)
    }

    fn file_size(&self) -> Option<u64> {
        self.file_size
    }
}

fn convert_value(value: SignalValue<'_>) -> Value {
    match value {
        SignalValue::Real(value) => Value::Real(value),
        SignalValue::String(value) => Value::Str(value.to_string()),
        other => Value::Bits(other.to_string()),
    }
}

fn convert_direction(direction: wellen::VarDirection) -> VarDirection {
    match direction {
        wellen::VarDirection::Unknown => VarDirection::Unknown,
        wellen::VarDirection::Implicit => VarDirection::Implicit,
        wellen::VarDirection::Input => VarDirection::Input,
        wellen::VarDirection::Output => VarDirection::Output,
        wellen::VarDirection::InOut => VarDirection::InOut,
        wellen::VarDirection::Buffer => VarDirection::Buffer,
        wellen::VarDirection::Linkage => VarDirection::Linkage,
    }
}

fn timescale_unit(unit: TimescaleUnit) -> &'static str {
    match unit {
        TimescaleUnit::FemtoSeconds => "fs",
        TimescaleUnit::PicoSeconds => "ps",
        TimescaleUnit::NanoSeconds => "ns",
        TimescaleUnit::MicroSeconds => "us",
        TimescaleUnit::MilliSeconds => "ms",
        TimescaleUnit::Seconds => "s",
        TimescaleUnit::Unknown => "",
    }
}

fn convert_hierarchy(h: &wellen::Hierarchy) -> Hierarchy {
    let mut out = HierarchyBuilder::new(format!("{:?}", h.file_format()));
    if let Some(timescale) = h.timescale() {
        out.set_timescale(format!(
            "{}{}",
            timescale.factor,
            timescale_unit(timescale.unit)
        ));
    }
    out.set_date(h.date());
    out.set_version(h.version());
    for var in h.vars() {
        add_var(&mut out, h, &h[var]);
    }
    for scope in h.scopes() {
        add_scope(&mut out, h, &h[scope]);
    }
    out.finish()
}

fn add_scope(out: &mut HierarchyBuilder, h: &wellen::Hierarchy, scope: &wellen::Scope) {
    out.add_scope(scope.name(h), format!("{:?}", scope.scope_type()));
    for var in scope.vars(h) {
        add_var(out, h, &h[var]);
    }
    for child in scope.scopes(h) {
        add_scope(out, h, &h[child]);
    }
    out.pop_scope();
}

fn add_var(out: &mut HierarchyBuilder, h: &wellen::Hierarchy, var: &wellen::Var) {
    let kind = if var.is_real() {
        SignalKind::Real
    } else if var.is_string() {
        SignalKind::String
    } else {
        SignalKind::BitVector(var.length().unwrap_or(1))
    };
    out.add_var(
        var.name(h),
        format!("{:?}", var.var_type()),
        convert_direction(var.direction()),
        kind,
        var.signal_ref().index() as u32,
    );
}
