// Copyright 2023-2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//
// Owned, format independent view of the scopes and variables of a trace.

use rustc_hash::FxHashMap;
use std::num::NonZeroU32;
use std::ops::Index;

const SCOPE_SEPARATOR: char = '.';

/// Uniquely identifies a variable in the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarRef(NonZeroU32);

impl VarRef {
    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        NonZeroU32::new(index as u32 + 1).map(VarRef)
    }

    #[inline]
    pub fn index(&self) -> usize {
        (self.0.get() - 1) as usize
    }
}

/// Uniquely identifies a scope in the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeRef(NonZeroU32);

impl ScopeRef {
    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        NonZeroU32::new(index as u32 + 1).map(Self)
    }

    #[inline]
    pub fn index(&self) -> usize {
        (self.0.get() - 1) as usize
    }
}

/// Signal directions of a variable. Same meaning as in the FST format.
/// VCD inputs mark everything as `Unknown`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum VarDirection {
    Unknown,
    Implicit,
    Input,
    Output,
    InOut,
    Buffer,
    Linkage,
}

impl VarDirection {
    pub fn name(&self) -> &'static str {
        match self {
            VarDirection::Unknown => "Unknown",
            VarDirection::Implicit => "Implicit",
            VarDirection::Input => "Input",
            VarDirection::Output => "Output",
            VarDirection::InOut => "InOut",
            VarDirection::Buffer => "Buffer",
            VarDirection::Linkage => "Linkage",
        }
    }
}

/// How the values of a variable are represented.
#[derive(Debug, Clone, Copy, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Fixed width bit-vector with 2, 4 or 9 states per bit.
    BitVector(u32),
    Real,
    String,
}

#[derive(Debug, Clone)]
pub struct Var {
    name: String,
    full_name: String,
    var_type: String,
    direction: VarDirection,
    kind: SignalKind,
    /// Store specific handle used to load the signal.
    signal_id: u32,
    parent: Option<ScopeRef>,
}

impl Var {
    /// Local name of the variable.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full hierarchical name of the variable.
    #[inline]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Type tag as reported by the file, e.g. `Wire` or `Reg`.
    pub fn var_type(&self) -> &str {
        &self.var_type
    }
    pub fn direction(&self) -> VarDirection {
        self.direction
    }
    pub fn kind(&self) -> SignalKind {
        self.kind
    }
    pub fn signal_id(&self) -> u32 {
        self.signal_id
    }
    pub fn parent(&self) -> Option<ScopeRef> {
        self.parent
    }
    pub fn length(&self) -> Option<u32> {
        match self.kind {
            SignalKind::BitVector(len) => Some(len),
            SignalKind::Real | SignalKind::String => None,
        }
    }
    pub fn is_real(&self) -> bool {
        matches!(self.kind, SignalKind::Real)
    }
    pub fn is_string(&self) -> bool {
        matches!(self.kind, SignalKind::String)
    }
    pub fn is_1bit(&self) -> bool {
        self.length() == Some(1)
    }
}

#[derive(Debug, Clone)]
pub struct Scope {
    name: String,
    full_name: String,
    scope_type: String,
    parent: Option<ScopeRef>,
    scopes: Vec<ScopeRef>,
    vars: Vec<VarRef>,
}

impl Scope {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
    #[inline]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }
    pub fn scope_type(&self) -> &str {
        &self.scope_type
    }
    pub fn parent(&self) -> Option<ScopeRef> {
        self.parent
    }
    /// Variables declared directly inside this scope.
    pub fn vars(&self) -> impl Iterator<Item = VarRef> + '_ {
        self.vars.iter().copied()
    }
    /// Child scopes.
    pub fn scopes(&self) -> impl Iterator<Item = ScopeRef> + '_ {
        self.scopes.iter().copied()
    }
    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }
    pub fn num_scopes(&self) -> usize {
        self.scopes.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct HierarchyMetaData {
    pub file_format: String,
    pub timescale: Option<String>,
    pub date: String,
    pub version: String,
}

#[derive(Debug, Clone)]
pub struct Hierarchy {
    vars: Vec<Var>,
    scopes: Vec<Scope>,
    top_scopes: Vec<ScopeRef>,
    top_vars: Vec<VarRef>,
    var_lookup: FxHashMap<String, VarRef>,
    scope_lookup: FxHashMap<String, ScopeRef>,
    meta: HierarchyMetaData,
}

impl Hierarchy {
    /// Returns an iterator over all variables (at all levels).
    pub fn iter_vars(&self) -> std::slice::Iter<'_, Var> {
        self.vars.iter()
    }

    /// Returns an iterator over references to all variables (at all levels).
    pub fn all_vars(&self) -> impl Iterator<Item = VarRef> + '_ {
        (0..self.vars.len()).flat_map(VarRef::from_index)
    }

    /// Returns an iterator over all scopes (at all levels).
    pub fn iter_scopes(&self) -> std::slice::Iter<'_, Scope> {
        self.scopes.iter()
    }

    /// Returns an iterator over references to all top-level scopes.
    pub fn top_scopes(&self) -> impl Iterator<Item = ScopeRef> + '_ {
        self.top_scopes.iter().copied()
    }

    /// Returns an iterator over references to all top-level variables.
    pub fn top_vars(&self) -> impl Iterator<Item = VarRef> + '_ {
        self.top_vars.iter().copied()
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn num_scopes(&self) -> usize {
        self.scopes.len()
    }

    /// Resolves a dot separated variable path. When several variables share a name,
    /// the first one declared wins.
    pub fn lookup_var(&self, path: &str) -> Option<VarRef> {
        self.var_lookup.get(path).copied()
    }

    /// Resolves a dot separated scope path.
    pub fn lookup_scope(&self, path: &str) -> Option<ScopeRef> {
        self.scope_lookup.get(path).copied()
    }

    /// Depth of the deepest scope, top-level scopes have depth 1.
    pub fn max_depth(&self) -> usize {
        let mut depth = vec![0usize; self.scopes.len()];
        // parents are always created before their children
        for (ii, scope) in self.scopes.iter().enumerate() {
            depth[ii] = scope.parent.map(|p| depth[p.index()]).unwrap_or(0) + 1;
        }
        depth.into_iter().max().unwrap_or(0)
    }

    pub fn file_format(&self) -> &str {
        &self.meta.file_format
    }
    pub fn timescale(&self) -> Option<&str> {
        self.meta.timescale.as_deref()
    }
    pub fn date(&self) -> &str {
        &self.meta.date
    }
    pub fn version(&self) -> &str {
        &self.meta.version
    }
}

impl Index<VarRef> for Hierarchy {
    type Output = Var;

    fn index(&self, index: VarRef) -> &Self::Output {
        &self.vars[index.index()]
    }
}

impl Index<ScopeRef> for Hierarchy {
    type Output = Scope;

    fn index(&self, index: ScopeRef) -> &Self::Output {
        &self.scopes[index.index()]
    }
}

/// Builds a [`Hierarchy`] by entering and leaving scopes, the way a file parser encounters them.
pub struct HierarchyBuilder {
    vars: Vec<Var>,
    scopes: Vec<Scope>,
    top_scopes: Vec<ScopeRef>,
    top_vars: Vec<VarRef>,
    scope_stack: Vec<ScopeRef>,
    meta: HierarchyMetaData,
}

impl HierarchyBuilder {
    pub fn new(file_format: impl Into<String>) -> Self {
        HierarchyBuilder {
            vars: Vec::default(),
            scopes: Vec::default(),
            top_scopes: Vec::default(),
            top_vars: Vec::default(),
            scope_stack: Vec::default(),
            meta: HierarchyMetaData {
                file_format: file_format.into(),
                ..Default::default()
            },
        }
    }

    pub fn set_timescale(&mut self, value: impl Into<String>) {
        self.meta.timescale = Some(value.into());
    }

    pub fn set_date(&mut self, value: impl Into<String>) {
        self.meta.date = value.into();
    }

    pub fn set_version(&mut self, value: impl Into<String>) {
        self.meta.version = value.into();
    }

    fn parent_full_name(&self) -> Option<&str> {
        self.scope_stack
            .last()
            .map(|p| self.scopes[p.index()].full_name.as_str())
    }

    fn join(&self, name: &str) -> String {
        match self.parent_full_name() {
            None => name.to_string(),
            Some(parent) => {
                let mut out = String::with_capacity(parent.len() + 1 + name.len());
                out.push_str(parent);
                out.push(SCOPE_SEPARATOR);
                out.push_str(name);
                out
            }
        }
    }

    /// Enters a new scope below the current one.
    pub fn add_scope(&mut self, name: impl Into<String>, scope_type: impl Into<String>) -> ScopeRef {
        let name = name.into();
        let full_name = self.join(&name);
        let parent = self.scope_stack.last().copied();
        let id = ScopeRef::from_index(self.scopes.len()).unwrap();
        match parent {
            None => self.top_scopes.push(id),
            Some(p) => self.scopes[p.index()].scopes.push(id),
        }
        self.scopes.push(Scope {
            name,
            full_name,
            scope_type: scope_type.into(),
            parent,
            scopes: Vec::new(),
            vars: Vec::new(),
        });
        self.scope_stack.push(id);
        id
    }

    /// Declares a variable inside the current scope.
    pub fn add_var(
        &mut self,
        name: impl Into<String>,
        var_type: impl Into<String>,
        direction: VarDirection,
        kind: SignalKind,
        signal_id: u32,
    ) -> VarRef {
        let name = name.into();
        let full_name = self.join(&name);
        let parent = self.scope_stack.last().copied();
        let id = VarRef::from_index(self.vars.len()).unwrap();
        match parent {
            None => self.top_vars.push(id),
            Some(p) => self.scopes[p.index()].vars.push(id),
        }
        self.vars.push(Var {
            name,
            full_name,
            var_type: var_type.into(),
            direction,
            kind,
            signal_id,
            parent,
        });
        id
    }

    /// Leaves the current scope.
    pub fn pop_scope(&mut self) {
        self.scope_stack.pop().unwrap();
    }

    pub fn finish(self) -> Hierarchy {
        let mut var_lookup = FxHashMap::default();
        for (ii, var) in self.vars.iter().enumerate() {
            var_lookup
                .entry(var.full_name.clone())
                .or_insert_with(|| VarRef::from_index(ii).unwrap());
        }
        let mut scope_lookup = FxHashMap::default();
        for (ii, scope) in self.scopes.iter().enumerate() {
            scope_lookup
                .entry(scope.full_name.clone())
                .or_insert_with(|| ScopeRef::from_index(ii).unwrap());
        }
        Hierarchy {
            vars: self.vars,
            scopes: self.scopes,
            top_scopes: self.top_scopes,
            top_vars: self.top_vars,
            var_lookup,
            scope_lookup,
            meta: self.meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example() -> Hierarchy {
        let mut h = HierarchyBuilder::new("Vcd");
        h.add_scope("top", "Module");
        h.add_var("clk", "Wire", VarDirection::Input, SignalKind::BitVector(1), 0);
        h.add_scope("cpu", "Module");
        h.add_var("pc", "Reg", VarDirection::Unknown, SignalKind::BitVector(32), 1);
        h.pop_scope();
        h.add_var("temp", "Real", VarDirection::Unknown, SignalKind::Real, 2);
        h.pop_scope();
        h.finish()
    }

    #[test]
    fn test_full_names_and_lookup() {
        let h = example();
        let pc = h.lookup_var("top.cpu.pc").unwrap();
        assert_eq!(h[pc].name(), "pc");
        assert_eq!(h[pc].length(), Some(32));
        let cpu = h.lookup_scope("top.cpu").unwrap();
        assert_eq!(h[pc].parent(), Some(cpu));
        assert!(h.lookup_var("top.pc").is_none());
        assert!(h[h.lookup_var("top.clk").unwrap()].is_1bit());
        assert!(h[h.lookup_var("top.temp").unwrap()].is_real());
    }

    #[test]
    fn test_scope_children() {
        let h = example();
        let top = h.top_scopes().next().unwrap();
        let names: Vec<_> = h[top].vars().map(|v| h[v].name().to_string()).collect();
        assert_eq!(names, ["clk", "temp"]);
        assert_eq!(h[top].num_scopes(), 1);
        assert_eq!(h.max_depth(), 2);
        assert_eq!(h.num_vars(), 3);
    }

    #[test]
    fn test_sizes() {
        assert_eq!(std::mem::size_of::<VarRef>(), 4);
        assert_eq!(std::mem::size_of::<Option<ScopeRef>>(), 4);
    }
}
