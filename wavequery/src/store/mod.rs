// Copyright 2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//! # Waveform Store
//! The boundary to whatever actually reads waveform files. A store opens a file into a
//! [`Trace`]: an owned [`Hierarchy`], an indexed source of absolute times and a way to
//! load the change sequence of a single variable.

mod memory;
mod wellen_store;

use crate::{Hierarchy, LoadOptions, QueryError, Result, Signal, Time, Var};
use std::path::Path;
use std::sync::Arc;

pub use memory::{MemoryStore, MemoryTrace, TraceBuilder};
pub use wellen_store::{WellenStore, WellenTrace};

/// Indexed access to the absolute times of a trace. There is no length accessor,
/// reading past the last index returns `None`.
pub trait TimeIndexSource: Send + Sync {
    fn time_at(&self, index: u64) -> Option<Time>;
}

impl TimeIndexSource for Vec<Time> {
    fn time_at(&self, index: u64) -> Option<Time> {
        usize::try_from(index).ok().and_then(|i| self.get(i).copied())
    }
}

/// An opened waveform.
pub trait Trace: Send + Sync {
    fn hierarchy(&self) -> &Hierarchy;

    fn time_source(&self) -> Arc<dyn TimeIndexSource>;

    /// Loads the complete change sequence of `var`.
    fn load_signal(&self, var: &Var) -> Result<Signal>;

    /// Size of the underlying file in bytes, if there is one.
    fn file_size(&self) -> Option<u64> {
        None
    }
}

pub trait WaveformStore: Send + Sync {
    /// Makes sure that `path` names something this store can open.
    /// The default implementation requires an existing regular file.
    fn check_path(&self, path: &Path) -> Result<()> {
        match std::fs::metadata(path) {
            Err(_) => Err(QueryError::FileNotFound {
                path: path.to_path_buf(),
            }),
            Ok(meta) if !meta.is_file() => Err(QueryError::NotAFile {
                path: path.to_path_buf(),
            }),
            Ok(_) => Ok(()),
        }
    }

    fn open(&self, path: &Path, options: &LoadOptions) -> Result<Arc<dyn Trace>>;
}
