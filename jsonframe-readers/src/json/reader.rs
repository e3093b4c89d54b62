//! JSON read orchestration
//!
//! Drives the full pipeline: resolve inputs to bytes, split line-delimited
//! sources into records, infer a schema over every record, then build
//! columns and concatenate per-chunk tables in input order. Inference and
//! building both fan out over rayon; observation maps merge commutatively,
//! and ordered concatenation keeps row order equal to record order no
//! matter how many workers ran.

use std::sync::Arc;

use jsonframe_core::{DataType, Schema, Table};
use rayon::prelude::*;
use tracing::debug;

use crate::compression::Compression;
use crate::data_source::{resolve_input, JsonInput, ResolvedSource};
use crate::error::{Error, Result};

use super::build::{append_record, Builder};
use super::infer::{DtypeOverrides, InferenceOptions, ObservationMap};
use super::reference;
use super::split::{split_records, ByteRange, RecordSpan};
use super::tokenize::Tokenizer;

/// Parsing engine selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Engine {
    /// Pick per input shape: native for line-delimited, reference otherwise
    #[default]
    Auto,

    /// The two-pass columnar engine; line-delimited input only
    Native,

    /// The `serde_json` document engine; always uses 64-bit numeric types
    Reference,
}

/// Document layout for whole-document (non-line-delimited) input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orient {
    /// An array of row objects
    #[default]
    Records,

    /// An object mapping column name to {row key: value}
    Columns,

    /// An object with "columns", "index", and "data" entries
    Split,

    /// An object with a "schema" entry and a "data" array of row objects
    Table,
}

/// Options controlling a JSON read
#[derive(Debug)]
pub struct JsonReaderOptions {
    /// Treat input as line-delimited records instead of one document
    pub lines: bool,

    /// Restrict a single line-delimited source to a byte window
    pub byte_range: Option<ByteRange>,

    /// Compression codec, `Infer` by default
    pub compression: Compression,

    /// Per-field type overrides, by name or by column position
    pub dtypes: Option<DtypeOverrides>,

    /// Document layout for whole-document input
    pub orient: Orient,

    /// Engine selection
    pub engine: Engine,

    /// Worker count for the native engine; `None` uses all cores
    pub num_threads: Option<usize>,

    /// Width given to inferred integer fields when values fit (8/16/32/64)
    pub default_integer_bitwidth: u8,

    /// Width given to inferred float fields when values fit (32/64)
    pub default_float_bitwidth: u8,
}

impl Default for JsonReaderOptions {
    fn default() -> Self {
        Self {
            lines: false,
            byte_range: None,
            compression: Compression::Infer,
            dtypes: None,
            orient: Orient::Records,
            engine: Engine::Auto,
            num_threads: None,
            default_integer_bitwidth: 64,
            default_float_bitwidth: 64,
        }
    }
}

impl JsonReaderOptions {
    /// Line-delimited options with everything else at defaults
    pub fn lines() -> Self {
        Self {
            lines: true,
            ..Self::default()
        }
    }

    pub(crate) fn inference_options(&self) -> InferenceOptions {
        InferenceOptions {
            default_integer_bitwidth: self.default_integer_bitwidth,
            default_float_bitwidth: self.default_float_bitwidth,
        }
    }
}

/// Read JSON into a table
pub fn read_json(input: JsonInput, options: &JsonReaderOptions) -> Result<Table> {
    // Validate widths up front so inference never sees a bad one
    DataType::signed_integer(options.default_integer_bitwidth)?;
    DataType::float(options.default_float_bitwidth)?;

    let engine = select_engine(options)?;
    if options.byte_range.is_some() {
        if !options.lines {
            return Err(Error::InvalidInputKind(
                "byte_range requires line-delimited input".into(),
            ));
        }
        if engine == Engine::Reference {
            return Err(Error::EngineNotSupported(
                "byte_range requires the native engine".into(),
            ));
        }
    }

    let sources = resolve_input(input, options.lines, options.compression)?;
    if sources.len() > 1 && options.byte_range.is_some() {
        return Err(Error::InvalidInputKind(
            "byte_range applies to a single source".into(),
        ));
    }

    debug!(?engine, sources = sources.len(), lines = options.lines, "reading JSON");
    match engine {
        Engine::Native => match options.num_threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads.max(1))
                    .build()
                    .map_err(|e| {
                        jsonframe_core::error::Error::InvalidArgument(format!(
                            "thread pool: {e}"
                        ))
                    })?;
                pool.install(|| read_native(&sources, options))
            }
            None => read_native(&sources, options),
        },
        Engine::Reference => reference::read_document(&sources, options),
        Engine::Auto => unreachable!("resolved by select_engine"),
    }
}

fn select_engine(options: &JsonReaderOptions) -> Result<Engine> {
    match options.engine {
        Engine::Auto => Ok(if options.lines {
            Engine::Native
        } else {
            Engine::Reference
        }),
        Engine::Native if !options.lines => Err(Error::EngineNotSupported(
            "native engine requires line-delimited input".into(),
        )),
        other => Ok(other),
    }
}

fn read_native(sources: &[ResolvedSource], options: &JsonReaderOptions) -> Result<Table> {
    let mut parts: Vec<(&[u8], Vec<RecordSpan>)> = Vec::with_capacity(sources.len());
    for source in sources {
        let spans = split_records(source.bytes(), options.byte_range)?;
        parts.push((source.bytes(), spans));
    }
    let record_count: usize = parts.iter().map(|(_, spans)| spans.len()).sum();
    let threads = options.num_threads.unwrap_or_else(num_cpus::get).max(1);
    let chunk_size = record_count.div_ceil(threads).max(1);

    // Pass one: schema over every record of every source
    let mut map = ObservationMap::new();
    for (bytes, spans) in &parts {
        let partial = spans
            .par_chunks(chunk_size)
            .map(|chunk| observe_chunk(bytes, chunk))
            .try_reduce(ObservationMap::new, |mut a, b| {
                a.merge(b);
                Ok(a)
            })?;
        map.merge(partial);
    }
    let schema = Arc::new(map.resolve(&options.inference_options(), options.dtypes.as_ref())?);
    debug!(records = record_count, fields = schema.len(), "inferred schema");

    // Pass two: columns, chunked, concatenated in record order
    let mut tables: Vec<Table> = Vec::new();
    let mut base = 0usize;
    for (bytes, spans) in &parts {
        let chunk_tables: Result<Vec<Table>> = spans
            .par_chunks(chunk_size)
            .enumerate()
            .map(|(i, chunk)| build_chunk(&schema, bytes, chunk, base + i * chunk_size))
            .collect();
        tables.extend(chunk_tables?);
        base += spans.len();
    }

    if tables.is_empty() {
        let columns = Builder::for_schema(&schema)
            .into_iter()
            .map(Builder::finish)
            .collect();
        return Table::new(schema, columns).map_err(Error::Core);
    }
    Table::concat(&tables).map_err(Error::Core)
}

fn observe_chunk(bytes: &[u8], chunk: &[RecordSpan]) -> Result<ObservationMap> {
    let mut map = ObservationMap::new();
    for span in chunk {
        let mut tokenizer = Tokenizer::new(&bytes[span.start..span.end], span.start);
        map.observe_record(&mut tokenizer)?;
    }
    Ok(map)
}

fn build_chunk(
    schema: &Arc<Schema>,
    bytes: &[u8],
    chunk: &[RecordSpan],
    first_record: usize,
) -> Result<Table> {
    let mut builders = Builder::for_schema(schema);
    for (i, span) in chunk.iter().enumerate() {
        let mut tokenizer = Tokenizer::new(&bytes[span.start..span.end], span.start);
        append_record(schema, &mut builders, &mut tokenizer, first_record + i)?;
    }
    let columns = builders.into_iter().map(Builder::finish).collect();
    Table::new(schema.clone(), columns).map_err(Error::Core)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_lines(text: &str) -> Table {
        read_json(text.into(), &JsonReaderOptions::lines()).unwrap()
    }

    #[test]
    fn reads_line_delimited_objects() {
        let table = read_lines("{\"a\": 1, \"b\": \"x\"}\n{\"a\": 2, \"b\": \"y\"}\n");
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.column_by_name("a").unwrap().typed::<i64>(), &[1, 2]);
        assert_eq!(
            table.column_by_name("b").unwrap().str_value(1).unwrap(),
            Some("y")
        );
    }

    #[test]
    fn reads_positional_records() {
        let table = read_lines("[1, 2, 3]\n[4, 5, 6]\n[7, 8, 9]\n");
        assert_eq!(table.num_rows(), 3);
        assert_eq!(table.schema().field(0).name(), "0");
        assert_eq!(table.column(1).unwrap().typed::<i64>(), &[2, 5, 8]);
    }

    #[test]
    fn native_engine_rejects_whole_documents() {
        let options = JsonReaderOptions {
            engine: Engine::Native,
            ..JsonReaderOptions::default()
        };
        let err = read_json(r#"[{"a": 1}]"#.into(), &options).unwrap_err();
        assert!(matches!(err, Error::EngineNotSupported(_)));
    }

    #[test]
    fn byte_range_requires_line_mode() {
        let options = JsonReaderOptions {
            byte_range: Some(ByteRange::new(0, 10)),
            ..JsonReaderOptions::default()
        };
        let err = read_json("[{\"a\": 1}]".into(), &options).unwrap_err();
        assert!(matches!(err, Error::InvalidInputKind(_)));
    }

    #[test]
    fn byte_ranges_partition_the_input() {
        let text = "[1, 2, 3]\n[4, 5, 6]\n[7, 8, 9]\n";
        let full = read_lines(text);

        let mut rows = Vec::new();
        let size = text.len() as u64;
        for offset in (0..size).step_by(15) {
            let options = JsonReaderOptions {
                byte_range: Some(ByteRange::new(offset, 15)),
                ..JsonReaderOptions::lines()
            };
            let part = read_json(text.into(), &options).unwrap();
            for row in 0..part.num_rows() {
                rows.push(part.column(0).unwrap().int_value(row).unwrap());
            }
        }
        assert_eq!(rows.len(), full.num_rows());
        assert_eq!(rows, vec![Some(1), Some(4), Some(7)]);
    }

    #[test]
    fn multiple_sources_concatenate_with_schema_union() {
        let input = JsonInput::Multiple(vec![
            "{\"a\": 1}\n".into(),
            "{\"a\": 2, \"b\": true}\n".into(),
        ]);
        let table = read_json(input, &JsonReaderOptions::lines()).unwrap();
        assert_eq!(table.num_rows(), 2);
        let b = table.column_by_name("b").unwrap();
        assert_eq!(b.bool_value(0).unwrap(), None);
        assert_eq!(b.bool_value(1).unwrap(), Some(true));
    }

    #[test]
    fn explicit_thread_count_reads_identically() {
        let text = "{\"v\": 1}\n{\"v\": 2}\n{\"v\": 3}\n{\"v\": 4}\n";
        let options = JsonReaderOptions {
            num_threads: Some(2),
            ..JsonReaderOptions::lines()
        };
        let table = read_json(text.into(), &options).unwrap();
        assert_eq!(table.column(0).unwrap().typed::<i64>(), &[1, 2, 3, 4]);
    }

    #[test]
    fn invalid_bitwidth_is_rejected() {
        let options = JsonReaderOptions {
            default_integer_bitwidth: 12,
            ..JsonReaderOptions::lines()
        };
        assert!(read_json("{\"a\": 1}\n".into(), &options).is_err());
    }
}
