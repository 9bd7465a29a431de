//! Signature registry for payload and URL inspection.
//!
//! # Responsibilities
//! - Hold the denylist of dangerous object keys (prototype pollution,
//!   framework-internal state access)
//! - Hold the ordered list of dangerous value patterns (code-execution
//!   gadget indicators)
//! - Hold the curated URL substring list used by the transport guard
//!
//! # Design Decisions
//! - The registry is an explicit, immutable value constructed at startup
//!   and shared via `Arc`. No global statics: tests inject their own sets.
//! - This is a denylist, not an allowlist. It will need extension as new
//!   gadget chains are published; that is a maintenance cost we accept.

use regex::{Regex, RegexBuilder};
use thiserror::Error;

/// Error building a pattern set from configuration.
#[derive(Debug, Error)]
pub enum PatternError {
    /// A configured value pattern is not a valid regex.
    #[error("invalid value pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },
}

/// Immutable signature lists consulted by the scanner and transport guard.
#[derive(Debug)]
pub struct PatternSet {
    /// Lowercase key fragments. A key matches if it contains any of these,
    /// case-insensitively.
    dangerous_keys: Vec<String>,
    /// Ordered value patterns. A value matches if its string form matches
    /// any of these.
    value_patterns: Vec<Regex>,
    /// Lowercase literals checked against the full URL + query string.
    url_literals: Vec<String>,
}

/// Keys implicated in prototype pollution or serializer-internal access.
const BASELINE_KEYS: &[&str] = &[
    "__proto__",
    "constructor",
    "prototype",
    "$$typeof",
    "_bundlerconfig",
    "_payload",
    "_response",
];

/// Value fragments implicated in code-execution gadget chains.
const BASELINE_VALUE_PATTERNS: &[&str] = &[
    r"eval\s*\(",
    r"require\s*\(",
    r"function\s*\(",
    r"process\.env",
    r"process\.binding",
    r"process\.mainmodule",
    r"child_process",
    r"execsync",
    r"import\s*\(",
];

/// Literals blocked when they appear anywhere in the URL or query string.
const BASELINE_URL_LITERALS: &[&str] = &[
    "__proto__",
    "constructor",
    "prototype",
    "eval(",
    "require(",
    "process.env",
    "child_process",
];

impl PatternSet {
    /// Build the curated baseline denylist.
    pub fn baseline() -> Self {
        Self::with_extensions(&[], &[]).expect("baseline patterns are valid")
    }

    /// Build the baseline denylist extended with operator-supplied keys and
    /// value patterns (from configuration).
    pub fn with_extensions(
        extra_keys: &[String],
        extra_value_patterns: &[String],
    ) -> Result<Self, PatternError> {
        let mut dangerous_keys: Vec<String> =
            BASELINE_KEYS.iter().map(|k| k.to_string()).collect();
        dangerous_keys.extend(extra_keys.iter().map(|k| k.to_lowercase()));

        let mut value_patterns = Vec::with_capacity(BASELINE_VALUE_PATTERNS.len());
        for pattern in BASELINE_VALUE_PATTERNS {
            value_patterns.push(compile(pattern).expect("baseline pattern is valid"));
        }
        for pattern in extra_value_patterns {
            value_patterns.push(compile(pattern).map_err(|source| {
                PatternError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                }
            })?);
        }

        Ok(Self {
            dangerous_keys,
            value_patterns,
            url_literals: BASELINE_URL_LITERALS.iter().map(|l| l.to_string()).collect(),
        })
    }

    /// Build a set from explicit lists. Intended for tests.
    pub fn custom(
        keys: &[&str],
        value_patterns: &[&str],
        url_literals: &[&str],
    ) -> Result<Self, PatternError> {
        let mut compiled = Vec::with_capacity(value_patterns.len());
        for pattern in value_patterns {
            compiled.push(compile(pattern).map_err(|source| PatternError::InvalidPattern {
                pattern: (*pattern).to_string(),
                source,
            })?);
        }
        Ok(Self {
            dangerous_keys: keys.iter().map(|k| k.to_lowercase()).collect(),
            value_patterns: compiled,
            url_literals: url_literals.iter().map(|l| l.to_lowercase()).collect(),
        })
    }

    /// Case-insensitive substring test of `key` against every dangerous key.
    pub fn is_dangerous_key(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.dangerous_keys.iter().any(|k| key.contains(k.as_str()))
    }

    /// Test a scalar JSON value against every value pattern.
    ///
    /// `Null` is never dangerous. Containers are not rendered here; the
    /// scanner descends into them instead.
    pub fn is_dangerous_value(&self, value: &serde_json::Value) -> bool {
        let rendered = match value {
            serde_json::Value::Null => return false,
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        self.value_patterns.iter().any(|p| p.is_match(&rendered))
    }

    /// Test lowercased URL text against the curated literal list.
    pub fn matches_url_literal(&self, url_text: &str) -> bool {
        let lowered = url_text.to_lowercase();
        self.url_literals.iter().any(|l| lowered.contains(l.as_str()))
    }

    /// Number of dangerous-key entries (exposed for the status endpoint).
    pub fn key_count(&self) -> usize {
        self.dangerous_keys.len()
    }

    /// Number of value patterns (exposed for the status endpoint).
    pub fn value_pattern_count(&self) -> usize {
        self.value_patterns.len()
    }
}

fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn baseline_flags_prototype_keys() {
        let set = PatternSet::baseline();
        assert!(set.is_dangerous_key("__proto__"));
        assert!(set.is_dangerous_key("constructor"));
        assert!(set.is_dangerous_key("prototype"));
        // Substring and case-insensitive matching.
        assert!(set.is_dangerous_key("CONSTRUCTOR"));
        assert!(set.is_dangerous_key("my__proto__key"));
    }

    #[test]
    fn baseline_allows_ordinary_keys() {
        let set = PatternSet::baseline();
        assert!(!set.is_dangerous_key("title"));
        assert!(!set.is_dangerous_key("speaker_name"));
        assert!(!set.is_dangerous_key(""));
    }

    #[test]
    fn baseline_flags_gadget_values() {
        let set = PatternSet::baseline();
        assert!(set.is_dangerous_value(&json!("eval('1+1')")));
        assert!(set.is_dangerous_value(&json!("require('fs')")));
        assert!(set.is_dangerous_value(&json!("process.env.SECRET")));
        assert!(set.is_dangerous_value(&json!("spawn via child_process")));
    }

    #[test]
    fn null_and_plain_values_are_safe() {
        let set = PatternSet::baseline();
        assert!(!set.is_dangerous_value(&json!(null)));
        assert!(!set.is_dangerous_value(&json!(42)));
        assert!(!set.is_dangerous_value(&json!(true)));
        assert!(!set.is_dangerous_value(&json!("a perfectly normal title")));
    }

    #[test]
    fn url_literals_match_case_insensitively() {
        let set = PatternSet::baseline();
        assert!(set.matches_url_literal("/api/events?__PROTO__=1"));
        assert!(set.matches_url_literal("/search?q=require("));
        assert!(!set.matches_url_literal("/api/events?page=2"));
    }

    #[test]
    fn extensions_are_appended() {
        let set = PatternSet::with_extensions(
            &["secretfield".to_string()],
            &[r"drop\s+table".to_string()],
        )
        .unwrap();
        assert!(set.is_dangerous_key("SecretField"));
        assert!(set.is_dangerous_value(&json!("DROP TABLE users")));
        // Baseline still present.
        assert!(set.is_dangerous_key("__proto__"));
    }

    #[test]
    fn invalid_extension_pattern_is_rejected() {
        let err = PatternSet::with_extensions(&[], &["(unclosed".to_string()]);
        assert!(matches!(err, Err(PatternError::InvalidPattern { .. })));
    }
}
