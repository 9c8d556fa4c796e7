//! Value encoding/decoding for storage
//!
//! This module provides the on-disk format of the counter record.

pub mod record;

/// Current format version for all encoded types
pub const CURRENT_VERSION: u8 = 1;

pub use record::{CodecError, CounterRecord};
