//! # Formats Module
//!
//! Serialization and format handling for Spliitz ledgers.
//!
//! This module contains:
//! - The snapshot type every backend can produce and restore
//! - Binary persistence format (postcard + header)
//!
//! Note: File I/O and JSON output remain in the app layer (apps/spliitz).
//! This module only handles format conversion (pure transformations).

mod persistence;

pub use persistence::*;
