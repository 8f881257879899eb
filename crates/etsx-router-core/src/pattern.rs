//! Route path patterns
//!
//! Compiles paths such as `/user/:id`, `/files/:path+`, `/docs/:page?`
//! or `*` into an anchored regex, extracts params from matching paths,
//! and fills params back into a concrete path.
//!
//! | Syntax          | Meaning                              |
//! |-----------------|--------------------------------------|
//! | `:name`         | one segment                          |
//! | `:name?`        | optional segment                     |
//! | `:name+`        | one or more segments                 |
//! | `:name*`        | zero or more segments                |
//! | `:name(\\d+)`   | segment restricted by a custom regex |
//! | `*`             | rest of the path, as `pathMatch`     |

use regex::{Regex, RegexBuilder};

use crate::error::RouterError;
use crate::types::{Params, CATCH_ALL_PARAM};

/// Maximum accepted length of a route path
const MAX_PATTERN_LENGTH: usize = 1024;

/// Size limit for a compiled route regex
const MAX_REGEX_SIZE: usize = 1 << 20;

/// A named capture of a pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamKey {
    pub name: String,
    pub optional: bool,
    pub repeat: bool,
}

#[derive(Debug, Clone)]
enum Token {
    Literal(String),
    Param(ParamToken),
}

#[derive(Debug, Clone)]
struct ParamToken {
    key: ParamKey,
    prefix: String,
    partial: bool,
    asterisk: bool,
    pattern: String,
}

/// Compiled route path
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
    tokens: Vec<Token>,
    keys: Vec<ParamKey>,
}

impl PathPattern {
    /// Compile a route path; matching is case-insensitive unless `case_sensitive`
    pub fn compile(path: &str, case_sensitive: bool) -> Result<Self, RouterError> {
        if path.len() > MAX_PATTERN_LENGTH {
            return Err(RouterError::InvalidPattern {
                pattern: path.to_string(),
                reason: format!("longer than {} bytes", MAX_PATTERN_LENGTH),
            });
        }

        let tokens = tokenize(path);
        let keys = tokens
            .iter()
            .filter_map(|t| match t {
                Token::Param(p) => Some(p.key.clone()),
                Token::Literal(_) => None,
            })
            .collect();

        let mut route = String::new();
        for token in &tokens {
            match token {
                Token::Literal(text) => route.push_str(&regex::escape(text)),
                Token::Param(param) => {
                    let prefix = regex::escape(&param.prefix);
                    let mut capture = format!("(?:{})", param.pattern);
                    if param.key.repeat {
                        capture = format!("{capture}(?:{prefix}{capture})*");
                    }
                    let group = if param.key.optional {
                        if param.partial {
                            format!("{prefix}?({capture})?")
                        } else {
                            format!("(?:{prefix}({capture}))?")
                        }
                    } else {
                        format!("{prefix}({capture})")
                    };
                    route.push_str(&group);
                }
            }
        }

        let route = route.strip_suffix('/').unwrap_or(&route);
        let source = format!("^{route}/?$");
        let regex = RegexBuilder::new(&source)
            .case_insensitive(!case_sensitive)
            .size_limit(MAX_REGEX_SIZE)
            .build()
            .map_err(|e| RouterError::InvalidPattern {
                pattern: path.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            source: path.to_string(),
            regex,
            tokens,
            keys,
        })
    }

    /// The route path this pattern was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Param keys in declaration order
    pub fn keys(&self) -> &[ParamKey] {
        &self.keys
    }

    /// Match a path (without query or hash), returning decoded params
    pub fn matches(&self, path: &str) -> Option<Params> {
        let captures = self.regex.captures(path)?;
        let mut params = Params::new();
        for (i, key) in self.keys.iter().enumerate() {
            if let Some(m) = captures.get(i + 1) {
                let value = urlencoding::decode(m.as_str())
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|_| m.as_str().to_string());
                params.insert(key.name.clone(), value);
            }
        }
        Some(params)
    }

    /// Build a concrete path from params
    pub fn fill(&self, params: &Params) -> Result<String, RouterError> {
        let mut path = String::new();
        for token in &self.tokens {
            match token {
                Token::Literal(text) => path.push_str(text),
                Token::Param(param) => match params.get(&param.key.name) {
                    Some(value) if !value.is_empty() => {
                        path.push_str(&param.prefix);
                        path.push_str(&encode_segment(value, param.asterisk || param.key.repeat));
                    }
                    _ if param.key.optional => {
                        if param.partial {
                            path.push_str(&param.prefix);
                        }
                    }
                    // A catch-all may legitimately capture nothing.
                    _ if param.asterisk => path.push_str(&param.prefix),
                    _ => {
                        return Err(RouterError::MissingParam {
                            path: self.source.clone(),
                            param: param.key.name.clone(),
                        })
                    }
                },
            }
        }
        Ok(path)
    }
}

fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn tokenize(path: &str) -> Vec<Token> {
    let chars: Vec<char> = path.chars().collect();
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\\' && i + 1 < chars.len() {
            literal.push(chars[i + 1]);
            i += 2;
            continue;
        }

        let starts_named = c == ':' && chars.get(i + 1).is_some_and(|n| is_word(*n));
        if !starts_named && c != '*' {
            literal.push(c);
            i += 1;
            continue;
        }

        let prefix = match literal.chars().last() {
            Some(p @ ('/' | '.')) => {
                literal.pop();
                p.to_string()
            }
            _ => String::new(),
        };
        if !literal.is_empty() {
            tokens.push(Token::Literal(std::mem::take(&mut literal)));
        }

        let (name, asterisk, mut pattern) = if c == '*' {
            i += 1;
            (CATCH_ALL_PARAM.to_string(), true, ".*".to_string())
        } else {
            i += 1;
            let start = i;
            while i < chars.len() && is_word(chars[i]) {
                i += 1;
            }
            (chars[start..i].iter().collect(), false, String::new())
        };

        if !asterisk && chars.get(i) == Some(&'(') {
            let mut depth = 0;
            let mut custom = String::new();
            while i < chars.len() {
                let ch = chars[i];
                i += 1;
                match ch {
                    '(' => {
                        depth += 1;
                        if depth == 1 {
                            continue;
                        }
                    }
                    ')' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
                custom.push(ch);
            }
            // Nested groups would shift capture indices.
            pattern = custom.replace('(', "(?:");
        }

        let modifier = if asterisk { None } else { chars.get(i).copied() };
        let (optional, repeat) = match modifier {
            Some('?') => (true, false),
            Some('*') => (true, true),
            Some('+') => (false, true),
            _ => (false, false),
        };
        if matches!(modifier, Some('?' | '*' | '+')) {
            i += 1;
        }

        if pattern.is_empty() {
            pattern = "[^/]+?".to_string();
        }

        let next = chars.get(i).copied();
        let partial = !prefix.is_empty() && next.is_some() && next.map(String::from) != Some(prefix.clone());

        tokens.push(Token::Param(ParamToken {
            key: ParamKey { name, optional, repeat },
            prefix,
            partial,
            asterisk,
            pattern,
        }));
    }

    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    tokens
}

/// Percent-encode a param value the way a browser leaves readable URLs
fn encode_segment(value: &str, keep_slash: bool) -> String {
    const KEEP: &str = "-_.~;,:@&=+$!*'()";
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_ascii_alphanumeric() || KEEP.contains(c) || (keep_slash && c == '/') {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_static_pattern() {
        let pattern = PathPattern::compile("/users", false).unwrap();
        assert!(pattern.matches("/users").is_some());
        assert!(pattern.matches("/users/").is_some());
        assert!(pattern.matches("/USERS").is_some());
        assert!(pattern.matches("/users/1").is_none());
    }

    #[test]
    fn test_case_sensitive_pattern() {
        let pattern = PathPattern::compile("/users", true).unwrap();
        assert!(pattern.matches("/users").is_some());
        assert!(pattern.matches("/USERS").is_none());
    }

    #[test]
    fn test_root_pattern() {
        let pattern = PathPattern::compile("", false).unwrap();
        assert!(pattern.matches("/").is_some());
        assert!(pattern.matches("").is_some());
        assert!(pattern.matches("/a").is_none());
    }

    #[test]
    fn test_named_params() {
        let pattern = PathPattern::compile("/users/:id/posts/:post_id", false).unwrap();
        let found = pattern.matches("/users/42/posts/hello%20world").unwrap();
        assert_eq!(found, params(&[("id", "42"), ("post_id", "hello world")]));
        assert_eq!(pattern.keys().len(), 2);
    }

    #[test]
    fn test_optional_param() {
        let pattern = PathPattern::compile("/docs/:page?", false).unwrap();
        assert!(pattern.matches("/docs").unwrap().is_empty());
        assert_eq!(pattern.matches("/docs/intro").unwrap(), params(&[("page", "intro")]));
        assert_eq!(pattern.fill(&Params::new()).unwrap(), "/docs");
    }

    #[test]
    fn test_repeat_param() {
        let pattern = PathPattern::compile("/files/:path+", false).unwrap();
        assert_eq!(pattern.matches("/files/a/b/c").unwrap(), params(&[("path", "a/b/c")]));
        assert!(pattern.matches("/files").is_none());
        assert_eq!(pattern.fill(&params(&[("path", "a/b")])).unwrap(), "/files/a/b");
    }

    #[test]
    fn test_custom_param_pattern() {
        let pattern = PathPattern::compile("/items/:id(\\d+)", false).unwrap();
        assert!(pattern.matches("/items/12").is_some());
        assert!(pattern.matches("/items/abc").is_none());
    }

    #[test]
    fn test_catch_all() {
        let pattern = PathPattern::compile("*", false).unwrap();
        assert_eq!(pattern.matches("/any/thing").unwrap(), params(&[("pathMatch", "/any/thing")]));

        let nested = PathPattern::compile("/static/*", false).unwrap();
        assert_eq!(nested.matches("/static/js/app.js").unwrap(), params(&[("pathMatch", "js/app.js")]));
        assert_eq!(nested.fill(&params(&[("pathMatch", "js/app.js")])).unwrap(), "/static/js/app.js");
    }

    #[test]
    fn test_fill_missing_param() {
        let pattern = PathPattern::compile("/users/:id", false).unwrap();
        let err = pattern.fill(&Params::new()).unwrap_err();
        assert!(matches!(err, RouterError::MissingParam { ref param, .. } if param == "id"));
    }

    #[test]
    fn test_fill_encodes_values() {
        let pattern = PathPattern::compile("/search/:term", false).unwrap();
        assert_eq!(pattern.fill(&params(&[("term", "a b/c")])).unwrap(), "/search/a%20b%2Fc");
    }

    #[test]
    fn test_pattern_too_long() {
        let long = format!("/{}", "a".repeat(MAX_PATTERN_LENGTH));
        assert!(matches!(
            PathPattern::compile(&long, false),
            Err(RouterError::InvalidPattern { .. })
        ));
    }
}
