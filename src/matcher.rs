//! Request matchers used to select a throttle rule.

use std::fmt;

use http::Method;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::BuildError;

/// Decides whether a rule applies to a request.
pub trait Matcher: Send + Sync + fmt::Debug {
    fn matches(&self, method: &Method, path: &str) -> bool;
}

/// How the patterns of a [`PathMatcher`] are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Exact,
    #[default]
    Prefix,
    Regex,
}

#[derive(Debug, Clone)]
enum Patterns {
    Exact(Vec<String>),
    Prefix(Vec<String>),
    Regex(Vec<Regex>),
}

/// Matches the request path against a list of patterns; any pattern matching is enough.
///
/// An empty pattern list matches every path. The method is not inspected here; method
/// allow-lists live on the rule.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    patterns: Patterns,
}

impl PathMatcher {
    pub fn new<I, S>(kind: PatternKind, patterns: I) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let patterns = match kind {
            PatternKind::Exact => Patterns::Exact(patterns),
            PatternKind::Prefix => Patterns::Prefix(patterns),
            PatternKind::Regex => Patterns::Regex(
                patterns
                    .into_iter()
                    .map(|pattern| {
                        Regex::new(&pattern)
                            .map_err(|source| BuildError::InvalidPattern { pattern, source })
                    })
                    .collect::<Result<_, _>>()?,
            ),
        };
        Ok(Self { patterns })
    }

    pub fn exact<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { patterns: Patterns::Exact(patterns.into_iter().map(Into::into).collect()) }
    }

    pub fn prefix<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { patterns: Patterns::Prefix(patterns.into_iter().map(Into::into).collect()) }
    }

    pub fn regex<I, S>(patterns: I) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(PatternKind::Regex, patterns)
    }

    /// Matches every path.
    pub fn any() -> Self {
        Self { patterns: Patterns::Prefix(Vec::new()) }
    }

    fn matches_path(&self, path: &str) -> bool {
        match &self.patterns {
            Patterns::Exact(list) => list.is_empty() || list.iter().any(|p| p == path),
            Patterns::Prefix(list) => list.is_empty() || list.iter().any(|p| path.starts_with(p.as_str())),
            Patterns::Regex(list) => list.is_empty() || list.iter().any(|re| re.is_match(path)),
        }
    }
}

impl Matcher for PathMatcher {
    fn matches(&self, _method: &Method, path: &str) -> bool {
        self.matches_path(path)
    }
}
