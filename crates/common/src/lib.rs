//! Framecap Common Utilities
//!
//! Shared infrastructure for all Framecap crates:
//! - Error types and result aliases
//! - Clocks that stamp captured frames
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
