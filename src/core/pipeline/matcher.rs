//! Path applicability conditions for stages.

use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Compiled pattern that can answer whether a path matches.
pub trait PathPattern: Send + Sync {
    fn is_match(&self, path: &str) -> bool;
}

impl PathPattern for Regex {
    fn is_match(&self, path: &str) -> bool {
        Regex::is_match(self, path)
    }
}

/// Condition deciding whether a stage applies to a path.
#[derive(Clone)]
pub enum PathCondition {
    /// Plain predicate over the path.
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
    /// Compiled pattern object.
    Pattern(Arc<dyn PathPattern>),
}

impl PathCondition {
    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        PathCondition::Predicate(Arc::new(predicate))
    }

    pub fn pattern<P: PathPattern + 'static>(pattern: P) -> Self {
        PathCondition::Pattern(Arc::new(pattern))
    }

    /// Compile `expr` as a regular expression condition.
    pub fn regex(expr: &str) -> Result<Self, regex::Error> {
        Ok(Self::pattern(Regex::new(expr)?))
    }
}

impl fmt::Debug for PathCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathCondition::Predicate(_) => f.write_str("PathCondition::Predicate"),
            PathCondition::Pattern(_) => f.write_str("PathCondition::Pattern"),
        }
    }
}

/// Returns `true` if `path` satisfies `condition`; no condition never matches.
pub fn matches(path: &str, condition: Option<&PathCondition>) -> bool {
    match condition {
        Some(PathCondition::Predicate(predicate)) => predicate(path),
        Some(PathCondition::Pattern(pattern)) => pattern.is_match(path),
        None => false,
    }
}
