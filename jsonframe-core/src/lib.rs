//! Core columnar data structures for the jsonframe JSON ingestion engine
//!
//! This crate provides the buffer, schema, column and table primitives that
//! the reader crate assembles parsed JSON into. It has no knowledge of JSON
//! itself; it only guarantees the columnar invariants (equal column lengths,
//! validity bitmaps, offset integrity for variable-length data).

#![warn(missing_docs)]

pub mod buffer;
pub mod column;
pub mod error;
pub mod schema;
pub mod table;

// Re-export key types for convenience
pub use buffer::{BitmapBuilder, Buffer};
pub use column::Column;
pub use error::{Error, Result};
pub use schema::{DataType, Field, Schema, TimeUnit};
pub use table::Table;
