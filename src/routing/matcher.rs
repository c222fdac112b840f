//! Route matching logic.
//!
//! # Responsibilities
//! - Match request method (exact, or any)
//! - Match path patterns made of literal and named segments
//! - Extract named segments into [`Params`]
//!
//! # Design Decisions
//! - Literal segments are case-sensitive
//! - A named segment matches exactly one non-empty segment
//! - Trailing slashes are ignored
//! - No regex to guarantee O(n) matching

use std::collections::HashMap;

use axum::http::Method;

/// Path parameters captured by a matched pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(HashMap<String, String>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value captured for `:name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Which methods a binding accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodFilter {
    Any,
    Only(Method),
}

impl MethodFilter {
    pub fn matches(&self, method: &Method) -> bool {
        match self {
            MethodFilter::Any => true,
            MethodFilter::Only(expected) => expected == method,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A compiled path pattern such as `/r/:roomId/history/:timestamp` or `*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    source: String,
    // `None` is the catch-all.
    segments: Option<Vec<Segment>>,
}

impl PathPattern {
    /// Compile a pattern. `*` matches every path.
    pub fn parse(pattern: &str) -> Self {
        if pattern == "*" {
            return Self {
                source: pattern.to_string(),
                segments: None,
            };
        }

        let segments = split_path(pattern)
            .map(|s| match s.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(s.to_string()),
            })
            .collect();

        Self {
            source: pattern.to_string(),
            segments: Some(segments),
        }
    }

    /// True for the `*` pattern.
    pub fn is_catch_all(&self) -> bool {
        self.segments.is_none()
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match `path`, returning captured parameters on success.
    pub fn matches(&self, path: &str) -> Option<Params> {
        let Some(segments) = &self.segments else {
            return Some(Params::new());
        };

        let mut params = Params::new();
        let mut parts = split_path(path);
        for segment in segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(literal) => {
                    if literal != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), percent_decode(part));
                }
            }
        }

        if parts.next().is_some() {
            return None;
        }
        Some(params)
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn percent_decode(segment: &str) -> String {
    let bytes = segment.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit()
        {
            // Both bytes are ASCII hex digits, so the slice is valid UTF-8.
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("00");
            decoded.push(u8::from_str_radix(hex, 16).unwrap_or(0));
            i += 3;
            continue;
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_pattern() {
        let pattern = PathPattern::parse("/new-room");
        assert!(pattern.matches("/new-room").is_some());
        assert!(pattern.matches("/new-room/").is_some());
        assert!(pattern.matches("/New-Room").is_none());
        assert!(pattern.matches("/new-room/extra").is_none());
        assert!(pattern.matches("/").is_none());
    }

    #[test]
    fn test_named_segments() {
        let pattern = PathPattern::parse("/r/:roomId/history/:timestamp");
        let params = pattern.matches("/r/abc/history/1700000000").unwrap();
        assert_eq!(params.get("roomId"), Some("abc"));
        assert_eq!(params.get("timestamp"), Some("1700000000"));

        assert!(pattern.matches("/r/abc/history").is_none());
        assert!(pattern.matches("/r//history/1").is_none());
    }

    #[test]
    fn test_param_is_percent_decoded() {
        let pattern = PathPattern::parse("/snapshot/:roomId");
        let params = pattern.matches("/snapshot/a%20b+c%zz").unwrap();
        assert_eq!(params.get("roomId"), Some("a b+c%zz"));
    }

    #[test]
    fn test_catch_all() {
        let pattern = PathPattern::parse("*");
        assert!(pattern.is_catch_all());
        assert!(pattern.matches("/").is_some());
        assert!(pattern.matches("/unknown/path").unwrap().is_empty());
    }

    #[test]
    fn test_method_filter() {
        assert!(MethodFilter::Any.matches(&Method::OPTIONS));
        assert!(MethodFilter::Only(Method::GET).matches(&Method::GET));
        assert!(!MethodFilter::Only(Method::GET).matches(&Method::HEAD));
    }
}
