//! Recursive payload scanner.
//!
//! Walks a JSON value graph, classifying every object key and scalar value
//! against the [`PatternSet`]. Recursion is depth-bounded; a payload nested
//! past the cap is rejected outright rather than risking stack exhaustion.

use std::sync::Arc;

use serde_json::Value;

use crate::security::patterns::PatternSet;

/// Default recursion ceiling. Legitimate CMS payloads are shallow; anything
/// deeper than this is treated as hostile.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Outcome of scanning a single payload.
///
/// `dangerous_keys` holds dotted paths (`"a.b.__proto__"`); array indices are
/// not included in paths. `dangerous_values` holds `"path: value"` entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub is_safe: bool,
    pub dangerous_keys: Vec<String>,
    pub dangerous_values: Vec<String>,
    pub reason: Option<String>,
}

impl ScanResult {
    fn safe() -> Self {
        Self {
            is_safe: true,
            dangerous_keys: Vec::new(),
            dangerous_values: Vec::new(),
            reason: None,
        }
    }

    fn depth_exceeded() -> Self {
        Self {
            is_safe: false,
            dangerous_keys: Vec::new(),
            dangerous_values: Vec::new(),
            reason: Some("Maximum recursion depth exceeded".to_string()),
        }
    }

    /// Fold a child result into this one, prefixing the child's paths.
    ///
    /// An empty prefix leaves paths untouched (array elements share their
    /// parent's path).
    fn absorb(&mut self, child: ScanResult, prefix: &str) {
        if !child.is_safe {
            self.is_safe = false;
        }
        if self.reason.is_none() {
            self.reason = child.reason;
        }
        for key in child.dangerous_keys {
            self.dangerous_keys.push(join_path(prefix, &key));
        }
        for value in child.dangerous_values {
            self.dangerous_values.push(join_path(prefix, &value));
        }
    }
}

fn join_path(prefix: &str, rest: &str) -> String {
    if prefix.is_empty() {
        rest.to_string()
    } else {
        format!("{prefix}.{rest}")
    }
}

/// Render a scalar for a `"path: value"` diagnostic entry.
fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Depth-bounded structural scanner over `serde_json::Value`.
#[derive(Debug, Clone)]
pub struct Scanner {
    patterns: Arc<PatternSet>,
    max_depth: usize,
}

impl Scanner {
    pub fn new(patterns: Arc<PatternSet>, max_depth: usize) -> Self {
        Self {
            patterns,
            max_depth,
        }
    }

    pub fn with_defaults(patterns: Arc<PatternSet>) -> Self {
        Self::new(patterns, DEFAULT_MAX_DEPTH)
    }

    pub fn patterns(&self) -> &Arc<PatternSet> {
        &self.patterns
    }

    /// Scan a value graph. Never panics; the only failure mode is the
    /// depth-exceeded verdict, which is an ordinary unsafe result.
    pub fn scan(&self, value: &Value) -> ScanResult {
        self.scan_at(value, 0)
    }

    fn scan_at(&self, value: &Value, depth: usize) -> ScanResult {
        if depth > self.max_depth {
            return ScanResult::depth_exceeded();
        }

        match value {
            Value::Null => ScanResult::safe(),
            Value::Bool(_) | Value::Number(_) | Value::String(_) => {
                let mut result = ScanResult::safe();
                if self.patterns.is_dangerous_value(value) {
                    result.is_safe = false;
                    result.dangerous_values.push(render_scalar(value));
                }
                result
            }
            Value::Array(items) => {
                let mut result = ScanResult::safe();
                for item in items {
                    // Array indices are not recorded in diagnostic paths.
                    result.absorb(self.scan_at(item, depth + 1), "");
                }
                result
            }
            Value::Object(map) => {
                let mut result = ScanResult::safe();
                // Keys are visited in insertion order (preserve_order).
                for (key, child) in map {
                    if self.patterns.is_dangerous_key(key) {
                        result.is_safe = false;
                        result.dangerous_keys.push(key.clone());
                    }
                    match child {
                        Value::Array(_) | Value::Object(_) => {
                            result.absorb(self.scan_at(child, depth + 1), key);
                        }
                        scalar => {
                            // Scalars are classified at the current level.
                            if self.patterns.is_dangerous_value(scalar) {
                                result.is_safe = false;
                                result
                                    .dangerous_values
                                    .push(format!("{key}: {}", render_scalar(scalar)));
                            }
                        }
                    }
                }
                result
            }
        }
    }
}
