//! JSON Payload Security Gateway Library
//!
//! A filtering gateway that sits in front of a JSON API and rejects
//! requests carrying prototype-pollution keys, code-execution gadget
//! fragments, or the component-stream transport signatures of a known
//! deserialization vulnerability class.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use security::{PatternSet, RequestValidator, Scanner, TransportGuard};
