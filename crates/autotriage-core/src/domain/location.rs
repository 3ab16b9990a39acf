//! Failure-location tokens extracted from stack traces.
//!
//! Two failures landing on the same `file:line` are the same break even when
//! their messages drift (timestamps, request ids, payload fragments). The
//! extractor pulls that token out of the first recognizable stack frame;
//! anything that fails to parse yields `None`, and `None` never equals
//! anything, so extraction failures can never produce a spurious match.

use regex::Regex;

use crate::domain::errors::TriageError;

/// A `file:line` token, e.g. `Foo.java:12`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FailureLocation(String);

impl FailureLocation {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Extracts failure locations using a configurable stack-frame pattern.
pub struct LocationExtractor {
    frame: Regex,
}

impl LocationExtractor {
    /// Compile the frame pattern from configuration. The pattern must match
    /// one whole stack-frame line whose parenthesized part is the location,
    /// e.g. `at com.example.Foo.bar(Foo.java:12)`.
    pub fn new(pattern: &str) -> Result<Self, TriageError> {
        let frame = Regex::new(pattern)
            .map_err(|e| TriageError::Config(format!("bad location pattern: {e}")))?;
        Ok(Self { frame })
    }

    /// The location token of the first matching frame, if any.
    pub fn extract(&self, failure_reason: &str) -> Option<FailureLocation> {
        let frame = self.frame.find(failure_reason)?.as_str();
        let inner = frame.split('(').nth(1)?.split(')').next()?;
        if inner.is_empty() {
            return None;
        }
        Some(FailureLocation(inner.to_string()))
    }
}
