//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → guard.rs (header + URL checks, no body parsing)
//!     → validator.rs (size ceiling, then recursive scan)
//!     → Pass to forwarding
//!
//! Outgoing response:
//!     → response.rs (scan derived data, drop unsafe fields)
//! ```
//!
//! # Design Decisions
//! - Defense in depth: transport checks before body checks
//! - Fail closed: any signature match rejects the request
//! - Clients learn only that a request was rejected, never why

pub mod guard;
pub mod patterns;
pub mod response;
pub mod scanner;
pub mod validator;

pub use guard::{GuardDecision, TransportGuard};
pub use patterns::PatternSet;
pub use response::{build_safe_response, ApiResponse};
pub use scanner::{ScanResult, Scanner};
pub use validator::{RequestValidator, ScanDetails, ValidationVerdict};
