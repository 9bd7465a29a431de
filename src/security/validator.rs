//! Request body validation.
//!
//! # Responsibilities
//! - Enforce the serialized-size ceiling before any scanning (bounds the
//!   worst-case scan cost)
//! - Run the recursive scanner over the parsed body
//! - Produce an accept/reject verdict with operator-only detail
//!
//! # Design Decisions
//! - The size ceiling measures the serialized string, not wire bytes. It
//!   exists to bound scan cost, not to enforce a precise transport limit.
//! - Rejections carry an opaque error for the client; dangerous key/value
//!   paths go to logs only.

use serde_json::Value;

use crate::security::scanner::Scanner;

/// Default serialized-size ceiling: 1 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Dangerous findings attached to a rejection. Operator-facing only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanDetails {
    pub dangerous_keys: Vec<String>,
    pub dangerous_values: Vec<String>,
}

/// Accept/reject verdict for an inbound body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationVerdict {
    pub is_valid: bool,
    pub error: Option<String>,
    pub details: Option<ScanDetails>,
}

impl ValidationVerdict {
    fn accept() -> Self {
        Self {
            is_valid: true,
            error: None,
            details: None,
        }
    }

    fn reject(error: impl Into<String>, details: Option<ScanDetails>) -> Self {
        Self {
            is_valid: false,
            error: Some(error.into()),
            details,
        }
    }
}

/// Validates parsed request bodies against size and signature checks.
#[derive(Debug, Clone)]
pub struct RequestValidator {
    scanner: Scanner,
    max_body_bytes: usize,
}

impl RequestValidator {
    pub fn new(scanner: Scanner, max_body_bytes: usize) -> Self {
        Self {
            scanner,
            max_body_bytes,
        }
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// Validate a parsed body. Size check first, then the scanner.
    pub fn validate(&self, body: &Value) -> ValidationVerdict {
        match serde_json::to_string(body) {
            Ok(serialized) => {
                if serialized.len() > self.max_body_bytes {
                    return ValidationVerdict::reject("Request body too large", None);
                }
            }
            Err(e) => {
                // Unserializable input cannot be sized or safely forwarded.
                return ValidationVerdict::reject(
                    format!("Request body could not be serialized: {e}"),
                    None,
                );
            }
        }

        let result = self.scanner.scan(body);
        if result.is_safe {
            ValidationVerdict::accept()
        } else {
            if let Some(reason) = &result.reason {
                tracing::warn!(reason = %reason, "Scanner aborted traversal");
            }
            ValidationVerdict::reject(
                "Request body contains dangerous patterns",
                Some(ScanDetails {
                    dangerous_keys: result.dangerous_keys,
                    dangerous_values: result.dangerous_values,
                }),
            )
        }
    }
}
