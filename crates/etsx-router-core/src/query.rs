//! Query string codec
//!
//! Parses `?a=1&b&a=2` into a [`Query`] and serializes it back. Keys
//! without a value are kept as `None`, repeated keys collapse into a
//! [`QueryValue::List`].

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A single query entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    /// `?key=value`, or `?key` when the value is `None`
    Single(Option<String>),
    /// `?key=a&key=b`
    List(Vec<Option<String>>),
}

impl QueryValue {
    /// First value carried by this entry
    pub fn first(&self) -> Option<&str> {
        match self {
            QueryValue::Single(value) => value.as_deref(),
            QueryValue::List(values) => values.iter().flatten().next().map(String::as_str),
        }
    }

    /// String coercion used when a single value is compared with a list
    fn coerce(&self) -> String {
        match self {
            QueryValue::Single(value) => value.clone().unwrap_or_else(|| "null".to_string()),
            QueryValue::List(values) => values
                .iter()
                .map(|v| v.clone().unwrap_or_default())
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Single(Some(value.to_string()))
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Single(Some(value))
    }
}

impl From<Vec<&str>> for QueryValue {
    fn from(values: Vec<&str>) -> Self {
        QueryValue::List(values.into_iter().map(|v| Some(v.to_string())).collect())
    }
}

/// Parsed query, keyed by decoded name
pub type Query = BTreeMap<String, QueryValue>;

/// Custom query parser supplied through router options
pub type ParseQueryFn = Arc<dyn Fn(&str) -> Query + Send + Sync>;

/// Custom query serializer supplied through router options
pub type StringifyQueryFn = Arc<dyn Fn(&Query) -> String + Send + Sync>;

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Percent-encode a query component, keeping commas readable
pub fn encode(raw: &str) -> String {
    urlencoding::encode(raw).replace("%2C", ",")
}

/// Parse a raw query string (with or without the leading `?`)
pub fn parse_query(query: &str) -> Query {
    let mut res = Query::new();
    let trimmed = query.trim();
    let trimmed = trimmed
        .strip_prefix(|c: char| matches!(c, '?' | '#' | '&'))
        .unwrap_or(trimmed);
    if trimmed.is_empty() {
        return res;
    }

    for param in trimmed.split('&') {
        let param = param.replace('+', " ");
        let mut parts = param.split('=');
        let key = decode(parts.next().unwrap_or_default());
        let rest: Vec<&str> = parts.collect();
        let value = if rest.is_empty() {
            None
        } else {
            Some(decode(&rest.join("=")))
        };

        match res.get_mut(&key) {
            None => {
                res.insert(key, QueryValue::Single(value));
            }
            Some(entry) => match entry {
                QueryValue::Single(prev) => {
                    let prev = prev.take();
                    *entry = QueryValue::List(vec![prev, value]);
                }
                QueryValue::List(values) => values.push(value),
            },
        }
    }
    res
}

/// Serialize a query, returning `""` for an empty one and `?…` otherwise
pub fn stringify_query(query: &Query) -> String {
    let parts: Vec<String> = query
        .iter()
        .map(|(key, value)| match value {
            QueryValue::Single(None) => encode(key),
            QueryValue::Single(Some(v)) => format!("{}={}", encode(key), encode(v)),
            QueryValue::List(values) => values
                .iter()
                .map(|v| match v {
                    None => encode(key),
                    Some(v) => format!("{}={}", encode(key), encode(v)),
                })
                .collect::<Vec<_>>()
                .join("&"),
        })
        .filter(|part| !part.is_empty())
        .collect();

    if parts.is_empty() {
        String::new()
    } else {
        format!("?{}", parts.join("&"))
    }
}

/// Parse `query` and overlay the entries of `extra` on top
pub fn resolve_query(query: &str, extra: &Query, parse: Option<&ParseQueryFn>) -> Query {
    let mut parsed = match parse {
        Some(parse) => parse(query),
        None => parse_query(query),
    };
    for (key, value) in extra {
        parsed.insert(key.clone(), value.clone());
    }
    parsed
}

/// Deep equality with string coercion between single values and lists
pub fn is_query_equal(a: &Query, b: &Query) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().all(|(key, a_val)| match (a_val, b.get(key)) {
        (_, None) => false,
        (QueryValue::Single(x), Some(QueryValue::Single(y))) => x == y,
        (QueryValue::List(x), Some(QueryValue::List(y))) => x == y,
        (a_val, Some(b_val)) => a_val.coerce() == b_val.coerce(),
    })
}

/// Every key of `target` is present in `current`; values are not compared
pub fn query_includes(current: &Query, target: &Query) -> bool {
    target.keys().all(|key| current.contains_key(key))
}
