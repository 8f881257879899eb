//! Path string utilities

/// A raw path split into its path, query and hash parts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPath {
    pub path: String,
    /// Query without the leading `?`
    pub query: String,
    /// Hash including the leading `#`
    pub hash: String,
}

/// Split `"/a?x=1#top"` into `("/a", "x=1", "#top")`
pub fn parse_path(raw: &str) -> ParsedPath {
    let (rest, hash) = match raw.find('#') {
        Some(i) => (&raw[..i], &raw[i..]),
        None => (raw, ""),
    };
    let (path, query) = match rest.find('?') {
        Some(i) => (&rest[..i], &rest[i + 1..]),
        None => (rest, ""),
    };
    ParsedPath {
        path: path.to_string(),
        query: query.to_string(),
        hash: hash.to_string(),
    }
}

/// Resolve `relative` against `base`
///
/// With `append`, the last segment of `base` is kept as a directory,
/// otherwise it is replaced (like a relative link in a document).
pub fn resolve_path(relative: &str, base: &str, append: bool) -> String {
    match relative.chars().next() {
        Some('/') => return relative.to_string(),
        Some('?') | Some('#') => return format!("{base}{relative}"),
        _ => {}
    }

    let mut stack: Vec<&str> = base.split('/').collect();
    if !append || stack.last().map_or(true, |s| s.is_empty()) {
        stack.pop();
    }

    let segments = relative.strip_prefix('/').unwrap_or(relative).split('/');
    for segment in segments {
        match segment {
            ".." => {
                stack.pop();
            }
            "." => {}
            other => stack.push(other),
        }
    }

    if stack.first() != Some(&"") {
        stack.insert(0, "");
    }
    stack.join("/")
}

/// Collapse repeated slashes
pub fn clean_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for c in path.chars() {
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(c);
    }
    out
}

/// Normalize a router base: leading slash, no trailing slash (`"/"` becomes `""`)
pub fn normalize_base(base: &str) -> String {
    let base = if base.is_empty() { "/" } else { base };
    let base = if base.starts_with('/') {
        base.to_string()
    } else {
        format!("/{base}")
    };
    base.strip_suffix('/').unwrap_or(&base).to_string()
}
