//! JSON ingestion for the jsonframe columnar engine
//!
//! This crate turns JSON inputs of many shapes (in-memory text, files,
//! directories of files, compressed streams) into `jsonframe_core` tables.
//! Line-delimited input runs through a parallel two-pass pipeline; whole
//! documents go through a `serde_json`-backed reference engine.

#![warn(missing_docs)]

mod error;

pub mod compression;
pub mod data_source;
pub mod json;
pub mod string_cache;

pub use compression::Compression;
pub use data_source::JsonInput;
pub use error::{Error, Result};
pub use json::{
    read_json, write_json, ByteRange, DtypeOverrides, Engine, JsonReaderOptions,
    JsonWriterOptions, Orient, WriteOrient,
};
pub use string_cache::StringDictionary;

// Re-export core types so callers need only this crate
pub use jsonframe_core::{Column, DataType, Field, Schema, Table, TimeUnit};
