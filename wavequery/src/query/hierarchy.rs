// Copyright 2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//
// Navigation of the scope tree: listing, filtering and searching.

use super::QueryEngine;
use crate::{Hierarchy, QueryError, Result, Scope, ScopeRef, Var, VarDirection, VarRef};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeInfo {
    pub name: String,
    pub full_name: String,
    #[serde(rename = "type")]
    pub scope_type: String,
    pub num_variables: usize,
    pub num_child_scopes: usize,
}

impl ScopeInfo {
    fn new(scope: &Scope) -> Self {
        Self {
            name: scope.name().to_string(),
            full_name: scope.full_name().to_string(),
            scope_type: scope.scope_type().to_string(),
            num_variables: scope.num_vars(),
            num_child_scopes: scope.num_scopes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeSummary {
    pub name: String,
    pub full_name: String,
    #[serde(rename = "type")]
    pub scope_type: String,
}

impl From<&Scope> for ScopeSummary {
    fn from(scope: &Scope) -> Self {
        Self {
            name: scope.name().to_string(),
            full_name: scope.full_name().to_string(),
            scope_type: scope.scope_type().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VarInfo {
    pub name: String,
    pub full_name: String,
    #[serde(rename = "type")]
    pub var_type: String,
    /// `None` for real and string variables.
    pub bitwidth: Option<u32>,
    pub direction: VarDirection,
    pub is_real: bool,
    pub is_string: bool,
    pub is_1bit: bool,
}

impl From<&Var> for VarInfo {
    fn from(var: &Var) -> Self {
        Self {
            name: var.name().to_string(),
            full_name: var.full_name().to_string(),
            var_type: var.var_type().to_string(),
            bitwidth: var.length(),
            direction: var.direction(),
            is_real: var.is_real(),
            is_string: var.is_string(),
            is_1bit: var.is_1bit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VarSummary {
    pub name: String,
    pub full_name: String,
    #[serde(rename = "type")]
    pub var_type: String,
    pub bitwidth: Option<u32>,
}

impl From<&Var> for VarSummary {
    fn from(var: &Var) -> Self {
        Self {
            name: var.name().to_string(),
            full_name: var.full_name().to_string(),
            var_type: var.var_type().to_string(),
            bitwidth: var.length(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeDetails {
    pub scope_path: String,
    pub name: String,
    pub full_name: String,
    #[serde(rename = "type")]
    pub scope_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Vec<VarInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_scopes: Option<Vec<ScopeSummary>>,
}

/// Restricts [`QueryEngine::list_variables`]. Width bounds are inclusive and do not
/// exclude real or string variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariableFilter {
    /// Type tags such as `Wire` or `Reg`.
    pub var_types: Option<Vec<String>>,
    pub direction: Option<VarDirection>,
    pub min_bitwidth: Option<u32>,
    pub max_bitwidth: Option<u32>,
}

impl VariableFilter {
    fn matches(&self, var: &Var) -> bool {
        if let Some(types) = &self.var_types {
            if !types.is_empty() && !types.iter().any(|t| t == var.var_type()) {
                return false;
            }
        }
        if self.direction.is_some_and(|d| d != var.direction()) {
            return false;
        }
        match var.length() {
            Some(width) => {
                !(self.min_bitwidth.is_some_and(|min| width < min)
                    || self.max_bitwidth.is_some_and(|max| width > max))
            }
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub limit: usize,
    pub offset: usize,
    pub returned: usize,
    pub total_matched: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableList {
    pub scope_path: Option<String>,
    pub filters: VariableFilter,
    pub variables: Vec<VarInfo>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchTarget {
    Scopes,
    Variables,
    #[default]
    Both,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchMatches<T> {
    pub matches: Vec<T>,
    /// More entries matched than `limit` allowed.
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub pattern: String,
    pub target: SearchTarget,
    pub case_sensitive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<SearchMatches<ScopeSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<SearchMatches<VarSummary>>,
}

fn lookup_scope(h: &Hierarchy, path: &str) -> Result<ScopeRef> {
    h.lookup_scope(path).ok_or_else(|| QueryError::ScopeNotFound {
        path: path.to_string(),
    })
}

fn search<'a, T: 'a, O>(
    items: impl Iterator<Item = &'a T>,
    full_name: impl Fn(&T) -> &str,
    matcher: &impl Fn(&str) -> bool,
    limit: usize,
    convert: impl Fn(&T) -> O,
) -> SearchMatches<O> {
    let mut matches = Vec::new();
    let mut truncated = false;
    for item in items.filter(|i| matcher(full_name(*i))) {
        if matches.len() >= limit {
            truncated = true;
            break;
        }
        matches.push(convert(item));
    }
    SearchMatches { matches, truncated }
}

impl QueryEngine {
    pub fn list_top_scopes(&self, session_id: &str) -> Result<Vec<ScopeInfo>> {
        let session = self.session(session_id)?;
        let h = session.hierarchy();
        Ok(h.top_scopes().map(|s| ScopeInfo::new(&h[s])).collect())
    }

    pub fn get_scope(
        &self,
        session_id: &str,
        scope_path: &str,
        include_variables: bool,
        include_child_scopes: bool,
    ) -> Result<ScopeDetails> {
        let session = self.session(session_id)?;
        let h = session.hierarchy();
        let scope = &h[lookup_scope(h, scope_path)?];
        Ok(ScopeDetails {
            scope_path: scope_path.to_string(),
            name: scope.name().to_string(),
            full_name: scope.full_name().to_string(),
            scope_type: scope.scope_type().to_string(),
            variables: include_variables
                .then(|| scope.vars().map(|v| VarInfo::from(&h[v])).collect()),
            child_scopes: include_child_scopes
                .then(|| scope.scopes().map(|s| ScopeSummary::from(&h[s])).collect()),
        })
    }

    /// Lists the variables of a scope (or of the whole design) that pass `filter`,
    /// `limit` entries starting at `offset`.
    pub fn list_variables(
        &self,
        session_id: &str,
        scope_path: Option<&str>,
        filter: &VariableFilter,
        limit: usize,
        offset: usize,
    ) -> Result<VariableList> {
        let session = self.session(session_id)?;
        let h = session.hierarchy();
        let candidates: Vec<VarRef> = match scope_path {
            Some(path) => h[lookup_scope(h, path)?].vars().collect(),
            None => h.all_vars().collect(),
        };

        let matched = candidates
            .into_iter()
            .map(|v| &h[v])
            .filter(|v| filter.matches(v));
        let mut total_matched = 0;
        let mut variables = Vec::new();
        for var in matched {
            if total_matched >= offset && variables.len() < limit {
                variables.push(VarInfo::from(var));
            }
            total_matched += 1;
        }

        Ok(VariableList {
            scope_path: scope_path.map(str::to_string),
            filters: filter.clone(),
            pagination: Pagination {
                limit,
                offset,
                returned: variables.len(),
                total_matched,
                has_more: total_matched > offset + variables.len(),
            },
            variables,
        })
    }

    /// Substring search over the full names of scopes and variables.
    pub fn search_hierarchy(
        &self,
        session_id: &str,
        pattern: &str,
        target: SearchTarget,
        case_sensitive: bool,
        limit: usize,
    ) -> Result<SearchResult> {
        let session = self.session(session_id)?;
        let h = session.hierarchy();
        let needle = if case_sensitive {
            pattern.to_string()
        } else {
            pattern.to_lowercase()
        };
        let matcher = |name: &str| {
            if case_sensitive {
                name.contains(&needle)
            } else {
                name.to_lowercase().contains(&needle)
            }
        };

        let scopes = matches!(target, SearchTarget::Scopes | SearchTarget::Both).then(|| {
            search(
                h.iter_scopes(),
                Scope::full_name,
                &matcher,
                limit,
                |s| ScopeSummary::from(s),
            )
        });
        let variables = matches!(target, SearchTarget::Variables | SearchTarget::Both).then(|| {
            search(
                h.iter_vars(),
                Var::full_name,
                &matcher,
                limit,
                |v| VarSummary::from(v),
            )
        });

        Ok(SearchResult {
            pattern: pattern.to_string(),
            target,
            case_sensitive,
            scopes,
            variables,
        })
    }
}
