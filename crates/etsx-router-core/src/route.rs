//! Immutable route values
//!
//! A [`Route`] is the outcome of resolving a [`Location`] against the
//! route tree. Every transition produces a new one; it is shared as
//! `Arc<Route>` and never mutated.

use std::sync::{Arc, OnceLock};

use crate::location::Location;
use crate::query::{is_query_equal, query_includes, stringify_query, Query, StringifyQueryFn};
use crate::record::RouteRecord;
use crate::types::{Meta, Params};

/// The resolved, frozen navigation state
#[derive(Debug, Clone)]
pub struct Route {
    name: Option<String>,
    meta: Meta,
    path: String,
    hash: String,
    query: Query,
    params: Params,
    full_path: String,
    matched: Vec<Arc<RouteRecord>>,
    redirected_from: Option<String>,
}

impl Route {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Meta of the leaf record, `Null` when nothing matched
    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Hash including the leading `#`, or empty
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    /// Matched records, root first
    pub fn matched(&self) -> &[Arc<RouteRecord>] {
        &self.matched
    }

    /// Full path of the location this route was redirected from
    pub fn redirected_from(&self) -> Option<&str> {
        self.redirected_from.as_deref()
    }

    /// A location that resolves back to this route
    pub fn to_location(&self) -> Location {
        Location {
            path: Some(self.path.clone()),
            query: self.query.clone(),
            hash: if self.hash.is_empty() {
                None
            } else {
                Some(self.hash.clone())
            },
            ..Default::default()
        }
    }
}

/// Build a route for `record` (or a no-match route when `None`)
pub fn create_route(
    record: Option<&Arc<RouteRecord>>,
    location: &Location,
    redirected_from: Option<&Location>,
    stringify: Option<&StringifyQueryFn>,
) -> Arc<Route> {
    let path = location
        .path
        .clone()
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "/".to_string());
    let hash = location.hash.clone().unwrap_or_default();
    let query = location.query.clone();

    let full_path = get_full_path(&path, &query, &hash, stringify);
    let redirected_from = redirected_from.map(|from| {
        get_full_path(
            from.path.as_deref().unwrap_or("/"),
            &from.query,
            from.hash.as_deref().unwrap_or(""),
            stringify,
        )
    });

    Arc::new(Route {
        name: location
            .name
            .clone()
            .or_else(|| record.and_then(|r| r.name().map(str::to_string))),
        meta: record
            .map(|r| r.meta().clone())
            .filter(|meta| !meta.is_null())
            .unwrap_or_else(|| Meta::Object(Default::default())),
        params: location.params.clone().unwrap_or_default(),
        matched: record.map(format_match).unwrap_or_default(),
        path,
        hash,
        query,
        full_path,
        redirected_from,
    })
}

static START: OnceLock<Arc<Route>> = OnceLock::new();

/// The initial route every history starts from
pub fn start_route() -> Arc<Route> {
    START
        .get_or_init(|| create_route(None, &Location::path("/"), None, None))
        .clone()
}

/// Whether `route` is the [`start_route`] sentinel itself
pub fn is_start(route: &Route) -> bool {
    START.get().is_some_and(|start| std::ptr::eq(route, start.as_ref()))
}

/// Records from the root down to `record`
pub fn format_match(record: &Arc<RouteRecord>) -> Vec<Arc<RouteRecord>> {
    let mut chain = vec![record.clone()];
    let mut cursor = record.parent();
    while let Some(parent) = cursor {
        cursor = parent.parent();
        chain.push(parent);
    }
    chain.reverse();
    chain
}

/// `(path || "/") + stringify(query) + hash`
pub fn get_full_path(path: &str, query: &Query, hash: &str, stringify: Option<&StringifyQueryFn>) -> String {
    let path = if path.is_empty() { "/" } else { path };
    let query = match stringify {
        Some(stringify) => stringify(query),
        None => stringify_query(query),
    };
    format!("{path}{query}{hash}")
}

fn strip_trailing_slash(path: &str) -> &str {
    path.strip_suffix('/').unwrap_or(path)
}

struct RouteIdentity<'a> {
    name: Option<&'a str>,
    path: Option<&'a str>,
    hash: &'a str,
    query: &'a Query,
    params: &'a Params,
}

impl<'a> From<&'a Route> for RouteIdentity<'a> {
    fn from(route: &'a Route) -> Self {
        Self {
            name: route.name(),
            path: Some(route.path()).filter(|p| !p.is_empty()),
            hash: route.hash(),
            query: route.query(),
            params: route.params(),
        }
    }
}

fn identity_matches(a: &RouteIdentity<'_>, b: &RouteIdentity<'_>) -> bool {
    match (a.path, b.path, a.name, b.name) {
        (Some(pa), Some(pb), _, _) => {
            strip_trailing_slash(pa) == strip_trailing_slash(pb)
                && a.hash == b.hash
                && is_query_equal(a.query, b.query)
        }
        (_, _, Some(na), Some(nb)) => {
            na == nb && a.hash == b.hash && is_query_equal(a.query, b.query) && a.params == b.params
        }
        _ => false,
    }
}

/// Whether two routes denote the same navigation target
pub fn is_same_route(a: &Route, b: Option<&Route>) -> bool {
    match b {
        None => false,
        Some(b) if is_start(b) => std::ptr::eq(a, b),
        Some(b) => identity_matches(&RouteIdentity::from(a), &RouteIdentity::from(b)),
    }
}

/// Whether `current` lies at or below `target`, used for active-link classes
pub fn is_included_route(current: &Route, target: &Route) -> bool {
    let with_slash = |p: &str| format!("{}/", strip_trailing_slash(p));
    with_slash(current.path()).starts_with(&with_slash(target.path()))
        && (target.hash().is_empty() || current.hash() == target.hash())
        && query_includes(current.query(), target.query())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse_query;
    use crate::record::RouteConfig;
    use crate::Matcher;

    fn route(raw: &str) -> Arc<Route> {
        let parsed = crate::path::parse_path(raw);
        let location = Location {
            path: Some(parsed.path),
            query: parse_query(&parsed.query),
            hash: Some(parsed.hash).filter(|h| !h.is_empty()),
            ..Default::default()
        };
        create_route(None, &location, None, None)
    }

    #[test]
    fn test_create_route_full_path() {
        let r = route("/a?y=2&x=1#top");
        assert_eq!(r.path(), "/a");
        assert_eq!(r.hash(), "#top");
        assert_eq!(r.full_path(), "/a?x=1&y=2#top");
        assert!(r.matched().is_empty());
        assert_eq!(r.meta(), &serde_json::json!({}));
        assert!(r.meta()["auth"].is_null());
    }

    #[test]
    fn test_created_route_does_not_alias_location() {
        let mut location = Location::path("/a").with_query("k", "v");
        let r = create_route(None, &location, None, None);
        location.query.insert("k".into(), "changed".into());
        assert_eq!(r.query().get("k").and_then(|v| v.first()), Some("v"));
        assert_eq!(r.full_path(), "/a?k=v");
    }

    #[test]
    fn test_custom_stringify() {
        let stringify: StringifyQueryFn = Arc::new(|q: &Query| format!("?n={}", q.len()));
        let location = Location::path("/a").with_query("x", "1");
        let r = create_route(None, &location, None, Some(&stringify));
        assert_eq!(r.full_path(), "/a?n=1");
    }

    #[test]
    fn test_start_route_identity() {
        let start = start_route();
        assert!(is_start(&start));
        assert!(is_same_route(&start, Some(start.as_ref())));

        let lookalike = route("/");
        assert!(!is_start(&lookalike));
        assert!(!is_same_route(&lookalike, Some(start.as_ref())));
    }

    #[test]
    fn test_same_route_by_path() {
        let a = route("/a/?x=1&y=2#h");
        let b = route("/a?y=2&x=1#h");
        assert!(is_same_route(&a, Some(a.as_ref())));
        assert!(is_same_route(&a, Some(b.as_ref())));
        assert!(!is_same_route(&a, Some(route("/a?x=1#h").as_ref())));
        assert!(!is_same_route(&a, Some(route("/a?x=1&y=2").as_ref())));
        assert!(!is_same_route(&a, None));
    }

    #[test]
    fn test_same_route_by_name() {
        let params: Params = [("id".to_string(), "1".to_string())].into_iter().collect();
        let other: Params = [("id".to_string(), "2".to_string())].into_iter().collect();
        let query = Query::new();
        let named = |params| RouteIdentity {
            name: Some("user"),
            path: None,
            hash: "",
            query: &query,
            params,
        };

        assert!(identity_matches(&named(&params), &named(&params)));
        assert!(!identity_matches(&named(&params), &named(&other)));

        let anonymous = RouteIdentity {
            name: None,
            path: None,
            hash: "",
            query: &query,
            params: &params,
        };
        assert!(!identity_matches(&anonymous, &anonymous));
    }

    #[test]
    fn test_is_included_route() {
        let current = route("/users/1/posts?tab=x&sort=new#c");
        assert!(is_included_route(&current, &route("/users")));
        assert!(is_included_route(&current, &route("/users/1/")));
        assert!(is_included_route(&current, &route("/users?tab=other")));
        assert!(!is_included_route(&current, &route("/users/10")));
        assert!(!is_included_route(&current, &route("/users#d")));
        assert!(!is_included_route(&current, &route("/users?missing=1")));
    }

    #[test]
    fn test_format_match_three_levels() {
        let mut matcher = Matcher::new(None, None);
        matcher
            .add_routes(vec![RouteConfig::new("/a")
                .child(RouteConfig::new("b").child(RouteConfig::new("c").named("leaf")))])
            .unwrap();

        let r = matcher.match_location(&Location::named("leaf"), None, None).unwrap();
        let paths: Vec<&str> = r.matched().iter().map(|rec| rec.path()).collect();
        assert_eq!(paths, vec!["/a", "/a/b", "/a/b/c"]);
        assert_eq!(r.path(), "/a/b/c");
    }
}
