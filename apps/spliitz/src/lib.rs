//! # Spliitz Library
//!
//! This library exposes the Spliitz modules for testing and integration.
//!
//! The main binary uses these modules through the `main.rs` entry point.

pub mod api;
pub mod cli;
pub mod config;

// Re-export spliitz_core for convenience
pub use spliitz_core;
