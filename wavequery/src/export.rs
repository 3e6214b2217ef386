// Copyright 2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//! # Export
//! Writes signal changes as CSV or JSON and the scope tree as JSON or text.

use crate::query::{timed_changes, TimedValue, Window};
use crate::{Hierarchy, QueryEngine, QueryError, Result, ScopeRef, Time, Value, Var, VarDirection};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeFormat {
    #[default]
    Absolute,
    /// Times relative to the first exported row.
    Relative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExportedRange {
    pub start: Time,
    pub end: Time,
    pub duration: Time,
}

impl ExportedRange {
    fn new(start: Time, end: Time) -> Self {
        Self {
            start,
            end,
            duration: end - start,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalExport {
    pub signal_path: String,
    pub format: ExportFormat,
    pub changes_exported: usize,
    pub time_range: ExportedRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CsvFormat {
    pub delimiter: char,
    pub header_included: bool,
    pub time_format: TimeFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsvExport {
    pub signals_exported: usize,
    pub rows_written: usize,
    pub time_range: ExportedRange,
    pub format: CsvFormat,
}

#[derive(Serialize)]
struct JsonSignal<'a> {
    signal: &'a str,
    changes: &'a [TimedValue],
    metadata: JsonMetadata,
}

#[derive(Serialize)]
struct JsonMetadata {
    total_changes: usize,
    time_range: ExportedRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeFormat {
    #[default]
    Json,
    /// Indented, one line per scope and variable.
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeOptions {
    pub format: TreeFormat,
    pub include_variables: bool,
    pub include_metadata: bool,
    /// Scopes at this depth and below are left out. Top-level scopes have depth 0.
    pub max_depth: Option<usize>,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            format: TreeFormat::Json,
            include_variables: true,
            include_metadata: true,
            max_depth: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TreeExport {
    pub format: TreeFormat,
    pub total_scopes: usize,
    pub total_variables: usize,
    pub max_depth_reached: usize,
}

#[derive(Serialize)]
struct TreeVar<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    var_type: &'a str,
    direction: VarDirection,
    length: Option<u32>,
}

impl<'a> From<&'a Var> for TreeVar<'a> {
    fn from(var: &'a Var) -> Self {
        Self {
            name: var.name(),
            var_type: var.var_type(),
            direction: var.direction(),
            length: var.length(),
        }
    }
}

#[derive(Serialize)]
struct TreeMetadata {
    num_children: usize,
    num_variables: usize,
    depth: usize,
}

#[derive(Serialize)]
struct TreeScope<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    scope_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<TreeMetadata>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    variables: Vec<TreeVar<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<TreeScope<'a>>,
}

impl<'a> TreeScope<'a> {
    fn build(h: &'a Hierarchy, scope: ScopeRef, depth: usize, options: &TreeOptions) -> Option<Self> {
        if options.max_depth.is_some_and(|max| depth >= max) {
            return None;
        }
        let s = &h[scope];
        let variables: Vec<TreeVar> = if options.include_variables {
            s.vars().map(|v| TreeVar::from(&h[v])).collect()
        } else {
            Vec::new()
        };
        Some(Self {
            name: s.name(),
            scope_type: s.scope_type(),
            metadata: options.include_metadata.then(|| TreeMetadata {
                num_children: s.num_scopes(),
                num_variables: variables.len(),
                depth,
            }),
            variables,
            children: s
                .scopes()
                .filter_map(|c| Self::build(h, c, depth + 1, options))
                .collect(),
        })
    }

    fn count(&self, depth: usize, stats: &mut TreeExport) {
        stats.total_scopes += 1;
        stats.total_variables += self.variables.len();
        stats.max_depth_reached = stats.max_depth_reached.max(depth);
        for child in self.children.iter() {
            child.count(depth + 1, stats);
        }
    }

    fn write_text(&self, out: &mut impl Write, indent: usize) -> Result<()> {
        let prefix = "  ".repeat(indent);
        writeln!(out, "{prefix}├─ {} ({})", self.name, self.scope_type)?;
        for var in self.variables.iter() {
            writeln!(out, "{prefix}  │  {} : {}", var.name, var.var_type)?;
        }
        for child in self.children.iter() {
            child.write_text(out, indent + 1)?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct Tree<'a> {
    design: String,
    scopes: Vec<TreeScope<'a>>,
}

/// Quotes a CSV field if it contains a delimiter, a quote or a line break.
fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

fn write_csv_row<'a>(out: &mut impl Write, fields: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let mut first = true;
    for field in fields {
        if !first {
            out.write_all(b",")?;
        }
        out.write_all(csv_field(field).as_bytes())?;
        first = false;
    }
    out.write_all(b"\n")?;
    Ok(())
}

impl QueryEngine {
    /// Writes the changes of one signal inside the window. Fails with `NoData` if
    /// there are none.
    pub fn export_signal(
        &self,
        session_id: &str,
        path: &str,
        start_time: Option<Time>,
        end_time: Option<Time>,
        format: ExportFormat,
        mut out: impl Write,
    ) -> Result<SignalExport> {
        let window = Window::new(start_time, end_time)?;
        let session = self.session(session_id)?;
        let signal = self.signal(&session, path)?;
        let changes: Vec<TimedValue> = timed_changes(session.time_index(), &signal)
            .skip_while(|(time, _)| window.is_before(*time))
            .take_while(|(time, _)| !window.is_after(*time))
            .map(|(time, value)| TimedValue {
                time,
                value: value.to_string(),
            })
            .collect();
        let (Some(first), Some(last)) = (changes.first(), changes.last()) else {
            return Err(QueryError::NoData {
                path: path.to_string(),
            });
        };
        let time_range = ExportedRange::new(first.time, last.time);

        match format {
            ExportFormat::Json => {
                let data = JsonSignal {
                    signal: path,
                    changes: &changes,
                    metadata: JsonMetadata {
                        total_changes: changes.len(),
                        time_range,
                    },
                };
                serde_json::to_writer_pretty(&mut out, &data)?;
            }
            ExportFormat::Csv => {
                write_csv_row(&mut out, ["Time", "Value"])?;
                for change in changes.iter() {
                    let time = change.time.to_string();
                    write_csv_row(&mut out, [time.as_str(), change.value.as_str()])?;
                }
            }
        }
        out.flush()?;

        Ok(SignalExport {
            signal_path: path.to_string(),
            format,
            changes_exported: changes.len(),
            time_range,
        })
    }

    /// Writes one CSV row per distinct change time of the given signals inside the window.
    /// Every column holds the signal's value at that time. A signal without a change at or
    /// before the window start shows `x` until its first change.
    #[allow(clippy::too_many_arguments)]
    pub fn export_csv(
        &self,
        session_id: &str,
        paths: &[String],
        start_time: Option<Time>,
        end_time: Option<Time>,
        include_header: bool,
        time_format: TimeFormat,
        mut out: impl Write,
    ) -> Result<CsvExport> {
        let window = Window::new(start_time, end_time)?;
        let session = self.session(session_id)?;
        let (export_start, export_end) = window.resolve(session.time_index());
        let window = Window {
            start: Some(export_start),
            end: Some(export_end),
        };

        let signals = paths
            .iter()
            .map(|path| self.signal(&session, path))
            .collect::<Result<Vec<_>>>()?;
        let index = session.time_index();

        // per signal: value before the window, then the changes inside of it
        let mut current: Vec<&Value> = Vec::with_capacity(signals.len());
        let mut in_window: Vec<Vec<(Time, &Value)>> = Vec::with_capacity(signals.len());
        let unknown = Value::bits("x");
        for signal in signals.iter() {
            let mut initial = &unknown;
            let mut changes = Vec::new();
            for (time, value) in timed_changes(index, signal) {
                if time <= export_start {
                    initial = value;
                }
                if window.is_after(time) {
                    break;
                }
                if window.contains(time) {
                    changes.push((time, value));
                }
            }
            current.push(initial);
            in_window.push(changes);
        }

        let mut times: Vec<Time> = in_window.iter().flatten().map(|(t, _)| *t).collect();
        times.sort_unstable();
        times.dedup();
        let (Some(&first), Some(&last)) = (times.first(), times.last()) else {
            return Err(QueryError::NoData {
                path: paths.join(", "),
            });
        };

        if include_header {
            let time_column = match time_format {
                TimeFormat::Absolute => "Time",
                TimeFormat::Relative => "Time (relative)",
            };
            write_csv_row(
                &mut out,
                std::iter::once(time_column).chain(paths.iter().map(String::as_str)),
            )?;
        }

        let mut cursors = vec![0usize; signals.len()];
        for &time in times.iter() {
            for (ii, changes) in in_window.iter().enumerate() {
                while let Some((t, value)) = changes.get(cursors[ii]) {
                    if *t > time {
                        break;
                    }
                    current[ii] = *value;
                    cursors[ii] += 1;
                }
            }
            let time_column = match time_format {
                TimeFormat::Absolute => time,
                TimeFormat::Relative => time - first,
            }
            .to_string();
            let values: Vec<String> = current.iter().map(|v| v.to_string()).collect();
            write_csv_row(
                &mut out,
                std::iter::once(time_column.as_str()).chain(values.iter().map(String::as_str)),
            )?;
        }
        out.flush()?;

        Ok(CsvExport {
            signals_exported: paths.len(),
            rows_written: times.len(),
            time_range: ExportedRange::new(first, last),
            format: CsvFormat {
                delimiter: ',',
                header_included: include_header,
                time_format,
            },
        })
    }
}

impl QueryEngine {
    /// Writes the scope tree of a session, starting at the top-level scopes.
    pub fn export_hierarchy_tree(
        &self,
        session_id: &str,
        options: &TreeOptions,
        mut out: impl Write,
    ) -> Result<TreeExport> {
        let session = self.session(session_id)?;
        let h = session.hierarchy();
        let tree = Tree {
            design: session
                .path()
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            scopes: h
                .top_scopes()
                .filter_map(|s| TreeScope::build(h, s, 0, options))
                .collect(),
        };

        let mut stats = TreeExport {
            format: options.format,
            total_scopes: 0,
            total_variables: 0,
            max_depth_reached: 0,
        };
        for scope in tree.scopes.iter() {
            scope.count(0, &mut stats);
        }

        match options.format {
            TreeFormat::Json => serde_json::to_writer_pretty(&mut out, &tree)?,
            TreeFormat::Text => {
                writeln!(out, "Design: {}\n", tree.design)?;
                for scope in tree.scopes.iter() {
                    scope.write_text(&mut out, 0)?;
                }
            }
        }
        out.flush()?;
        Ok(stats)
    }
}
