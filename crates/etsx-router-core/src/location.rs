//! Navigation targets as requested by callers

use serde::{Deserialize, Serialize};

use crate::error::RouterError;
use crate::path::{parse_path, resolve_path};
use crate::query::{resolve_query, ParseQueryFn, Query, QueryValue};
use crate::route::Route;
use crate::types::Params;

/// A requested navigation target
///
/// Built from a string (`"/users/1?tab=posts#top"`) or field by field.
/// Consumed once per navigation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    pub name: Option<String>,
    pub path: Option<String>,
    pub hash: Option<String>,
    pub query: Query,
    pub params: Option<Params>,
    /// Resolve a relative path by appending to the current path
    pub append: bool,
    /// Persist with a history replace instead of a push
    pub replace: bool,
}

impl Location {
    pub fn path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params
            .get_or_insert_with(Params::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    pub fn appending(mut self) -> Self {
        self.append = true;
        self
    }

    pub fn replacing(mut self) -> Self {
        self.replace = true;
        self
    }
}

impl From<&str> for Location {
    fn from(raw: &str) -> Self {
        Location::path(raw)
    }
}

impl From<String> for Location {
    fn from(raw: String) -> Self {
        Location::path(raw)
    }
}

impl From<&String> for Location {
    fn from(raw: &String) -> Self {
        Location::path(raw.as_str())
    }
}

/// Normalize a requested location against the current route
///
/// Named locations pass through untouched. A params-only location is
/// relative to `current`. Everything else gets its path resolved, its
/// query parsed and merged, and its hash prefixed with `#`.
pub fn normalize_location(
    raw: &Location,
    current: Option<&Route>,
    append: bool,
    parse: Option<&ParseQueryFn>,
) -> Result<Location, RouterError> {
    if raw.name.is_some() {
        return Ok(raw.clone());
    }

    if raw.path.is_none() {
        if let (Some(params), Some(current)) = (&raw.params, current) {
            let mut merged = current.params().clone();
            merged.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));

            let mut next = raw.clone();
            if let Some(name) = current.name() {
                next.name = Some(name.to_string());
                next.params = Some(merged);
            } else if let Some(leaf) = current.matched().last() {
                next.path = Some(leaf.pattern().fill(&merged)?);
            }
            return Ok(next);
        }
    }

    let parsed = parse_path(raw.path.as_deref().unwrap_or(""));
    let base_path = current.map(|c| c.path()).unwrap_or("/");
    let path = if parsed.path.is_empty() {
        base_path.to_string()
    } else {
        resolve_path(&parsed.path, base_path, append || raw.append)
    };

    let query = resolve_query(&parsed.query, &raw.query, parse);

    let mut hash = raw
        .hash
        .clone()
        .filter(|h| !h.is_empty())
        .unwrap_or(parsed.hash);
    if !hash.is_empty() && !hash.starts_with('#') {
        hash.insert(0, '#');
    }

    Ok(Location {
        path: Some(path),
        query,
        hash: if hash.is_empty() { None } else { Some(hash) },
        replace: raw.replace,
        ..Default::default()
    })
}
