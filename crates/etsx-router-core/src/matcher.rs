//! Route matcher
//!
//! Compiles a tree of [`RouteConfig`] into flat lookup tables and
//! resolves locations against them.
//!
//! ```text
//! Location ──normalize──► name? ──► name_map ──fill params──┐
//!                           │                               ├──► create route
//!                           └─────► path_list (in order) ───┘        │
//!                                                                    ├── redirect record ──► match again (hop + 1)
//!                                                                    └── alias record ────► match aliased path
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::error::RouterError;
use crate::location::{normalize_location, Location};
use crate::path::{clean_path, resolve_path};
use crate::pattern::PathPattern;
use crate::query::{ParseQueryFn, StringifyQueryFn};
use crate::record::{RecordParts, RouteConfig, RouteRecord};
use crate::route::{create_route, Route};
use crate::types::MAX_REDIRECT_HOPS;

/// Path of the catch-all record, always tried last
const WILDCARD: &str = "*";

/// Resolves locations against the compiled route tree
pub struct Matcher {
    /// Owns every compiled record, including shadowed duplicates
    records: Vec<Arc<RouteRecord>>,
    path_list: Vec<String>,
    path_map: HashMap<String, Arc<RouteRecord>>,
    name_map: HashMap<String, Arc<RouteRecord>>,
    parse_query: Option<ParseQueryFn>,
    stringify_query: Option<StringifyQueryFn>,
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matcher")
            .field("path_list", &self.path_list)
            .field("names", &self.name_map.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Matcher {
    pub fn new(parse_query: Option<ParseQueryFn>, stringify_query: Option<StringifyQueryFn>) -> Self {
        Self {
            records: Vec::new(),
            path_list: Vec::new(),
            path_map: HashMap::new(),
            name_map: HashMap::new(),
            parse_query,
            stringify_query,
        }
    }

    /// Compile and register routes; may be called again at runtime
    pub fn add_routes(&mut self, routes: Vec<RouteConfig>) -> Result<(), RouterError> {
        for route in &routes {
            self.add_route_record(route, None, None)?;
        }

        let (wildcards, mut paths): (Vec<String>, Vec<String>) =
            self.path_list.drain(..).partition(|p| p == WILDCARD);
        paths.extend(wildcards);
        self.path_list = paths;
        Ok(())
    }

    fn add_route_record(
        &mut self,
        route: &RouteConfig,
        parent: Option<&Arc<RouteRecord>>,
        match_as: Option<String>,
    ) -> Result<(), RouterError> {
        let path = normalize_path(&route.path, parent);
        let pattern = PathPattern::compile(&path, route.case_sensitive)?;

        let record = Arc::new(RouteRecord::new(RecordParts {
            path: path.clone(),
            pattern,
            components: route.components.clone(),
            name: route.name.clone(),
            parent: parent.cloned(),
            redirect: route.redirect.clone(),
            match_as: match_as.clone(),
            meta: route.meta.clone(),
            before_enter: route.before_enter.clone(),
            props: route.props.clone(),
        }));
        self.records.push(record.clone());

        for child in &route.children {
            let child_match_as = match_as
                .as_ref()
                .map(|base| clean_path(&format!("{}/{}", base, child.path)));
            self.add_route_record(child, Some(&record), child_match_as)?;
        }

        if !self.path_map.contains_key(&path) {
            self.path_list.push(path.clone());
            self.path_map.insert(path.clone(), record.clone());
        }

        for alias in &route.alias {
            if *alias == route.path {
                warn!(path = %route.path, "Alias is the same as the route path, skipping");
                continue;
            }
            let alias_route = RouteConfig {
                path: alias.clone(),
                children: route.children.clone(),
                case_sensitive: route.case_sensitive,
                ..Default::default()
            };
            let target = if path.is_empty() { "/".to_string() } else { path.clone() };
            self.add_route_record(&alias_route, parent, Some(target))?;
        }

        if let Some(name) = &route.name {
            if !self.name_map.contains_key(name) {
                self.name_map.insert(name.clone(), record);
            } else if match_as.is_none() {
                warn!(%name, path = %path, "Duplicate named route definition");
            }
        }
        Ok(())
    }

    /// Record registered under `name`
    pub fn record_by_name(&self, name: &str) -> Option<&Arc<RouteRecord>> {
        self.name_map.get(name)
    }

    /// Every compiled record in registration order
    pub fn records(&self) -> &[Arc<RouteRecord>] {
        &self.records
    }

    /// Registered paths in match order
    pub fn paths(&self) -> &[String] {
        &self.path_list
    }

    pub fn stringify_query(&self) -> Option<&StringifyQueryFn> {
        self.stringify_query.as_ref()
    }

    pub fn parse_query(&self) -> Option<&ParseQueryFn> {
        self.parse_query.as_ref()
    }

    /// Resolve `raw` relative to `current` into a route
    ///
    /// Unknown names and unmatched paths produce a route with no matched
    /// records rather than an error.
    pub fn match_location(
        &self,
        raw: &Location,
        current: Option<&Route>,
        redirected_from: Option<&Location>,
    ) -> Result<Arc<Route>, RouterError> {
        self.match_with_hops(raw, current, redirected_from, 0)
    }

    fn match_with_hops(
        &self,
        raw: &Location,
        current: Option<&Route>,
        redirected_from: Option<&Location>,
        hops: usize,
    ) -> Result<Arc<Route>, RouterError> {
        let mut location = normalize_location(raw, current, false, self.parse_query.as_ref())?;

        if let Some(name) = location.name.clone() {
            let Some(record) = self.name_map.get(&name) else {
                warn!(%name, "Route with name does not exist");
                return self.create_route_for(None, location, redirected_from, hops);
            };

            let mut params = location.params.take().unwrap_or_default();
            if let Some(current) = current {
                for key in record.pattern().keys().iter().filter(|k| !k.optional) {
                    if !params.contains_key(&key.name) {
                        if let Some(value) = current.params().get(&key.name) {
                            params.insert(key.name.clone(), value.clone());
                        }
                    }
                }
            }
            location.path = Some(record.pattern().fill(&params)?);
            location.params = Some(params);
            trace!(%name, path = ?location.path, "Matched by name");
            return self.create_route_for(Some(record), location, redirected_from, hops);
        }

        if let Some(path) = location.path.clone() {
            for candidate in &self.path_list {
                let Some(record) = self.path_map.get(candidate) else {
                    continue;
                };
                if let Some(params) = record.pattern().matches(&path) {
                    trace!(%path, record = %record.path(), "Matched by path");
                    location.params = Some(params);
                    return self.create_route_for(Some(record), location, redirected_from, hops);
                }
            }
        }

        self.create_route_for(None, location, None, hops)
    }

    fn create_route_for(
        &self,
        record: Option<&Arc<RouteRecord>>,
        location: Location,
        redirected_from: Option<&Location>,
        hops: usize,
    ) -> Result<Arc<Route>, RouterError> {
        if let Some(record) = record {
            if record.redirect().is_some() {
                return self.redirect(record, redirected_from.unwrap_or(&location), hops);
            }
            if let Some(match_as) = record.match_as() {
                return self.alias(location, match_as, hops);
            }
        }
        Ok(create_route(record, &location, redirected_from, self.stringify_query.as_ref()))
    }

    fn redirect(&self, record: &Arc<RouteRecord>, location: &Location, hops: usize) -> Result<Arc<Route>, RouterError> {
        let hops = hops + 1;
        if hops > MAX_REDIRECT_HOPS {
            return Err(RouterError::RedirectLoop {
                hops,
                path: location.path.clone().unwrap_or_default(),
            });
        }

        let Some(option) = record.redirect() else {
            return self.create_route_for(None, location.clone(), None, hops);
        };
        let here = create_route(Some(record), location, None, self.stringify_query.as_ref());
        let target = option.target(&here);

        let query = if target.query.is_empty() {
            location.query.clone()
        } else {
            target.query.clone()
        };
        let hash = target.hash.clone().or_else(|| location.hash.clone());
        let params = target.params.clone().or_else(|| location.params.clone());

        if let Some(name) = target.name {
            if !self.name_map.contains_key(&name) {
                warn!(%name, "Redirect target route does not exist");
            }
            let next = Location {
                name: Some(name),
                query,
                hash,
                params,
                ..Default::default()
            };
            return self.match_with_hops(&next, None, Some(location), hops);
        }

        if let Some(path) = target.path.filter(|p| !p.is_empty()) {
            let raw_path = resolve_record_path(&path, record);
            let filled = PathPattern::compile(&raw_path, false)?.fill(&params.unwrap_or_default())?;
            let next = Location {
                path: Some(filled),
                query,
                hash,
                ..Default::default()
            };
            return self.match_with_hops(&next, None, Some(location), hops);
        }

        warn!(record = %record.path(), "Invalid redirect option");
        self.create_route_for(None, location.clone(), None, hops)
    }

    fn alias(&self, mut location: Location, match_as: &str, hops: usize) -> Result<Arc<Route>, RouterError> {
        let params = location.params.clone().unwrap_or_default();
        let aliased_path = PathPattern::compile(match_as, false)?.fill(&params)?;
        let aliased = self.match_with_hops(&Location::path(aliased_path), None, None, hops)?;

        match aliased.matched().last() {
            Some(aliased_record) => {
                location.params = Some(aliased.params().clone());
                self.create_route_for(Some(aliased_record), location, None, hops)
            }
            None => self.create_route_for(None, location, None, hops),
        }
    }
}

/// Absolute, trailing-slash-free path of a record under `parent`
fn normalize_path(path: &str, parent: Option<&Arc<RouteRecord>>) -> String {
    let path = path.strip_suffix('/').unwrap_or(path);
    match parent {
        _ if path.starts_with('/') => path.to_string(),
        None => path.to_string(),
        Some(parent) => clean_path(&format!("{}/{}", parent.path(), path)),
    }
}

/// Relative redirect targets resolve against the parent record
fn resolve_record_path(path: &str, record: &RouteRecord) -> String {
    let base = record.parent().map(|p| p.path().to_string()).unwrap_or_else(|| "/".to_string());
    resolve_path(path, &base, true)
}
