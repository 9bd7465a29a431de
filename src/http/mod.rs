//! HTTP pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → transport guard middleware (header/URL checks, no body)
//!     → gateway handler (buffer body, validate, forward upstream)
//!     → optional response filter (scan upstream JSON)
//!     → Send to client
//! ```

pub mod server;

pub use server::{AppState, HttpServer, X_REQUEST_ID};
