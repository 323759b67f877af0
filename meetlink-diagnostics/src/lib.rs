//! # MeetLink Diagnostics
//!
//! Logging setup and connection diagnostics for MeetLink.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod connection_analyzer;
pub mod debug_logger;

// Re-export main types
pub use connection_analyzer::ConnectionInfo;
pub use debug_logger::DebugLogger;
