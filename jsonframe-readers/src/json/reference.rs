//! Whole-document engine backed by `serde_json`
//!
//! Handles document layouts the record-oriented native engine does not:
//! arrays of row objects, column-major maps, and the "split" and "table"
//! envelopes. Every source is parsed into a `serde_json::Value` first, so
//! inferred numeric fields always come out at 64 bits regardless of the
//! configured defaults; explicit dtype overrides are still honored.

use std::sync::Arc;

use jsonframe_core::{Schema, Table};
use serde_json::Value;
use tracing::debug;

use crate::data_source::ResolvedSource;
use crate::error::{Error, Result};

use super::build::Builder;
use super::infer::{InferenceOptions, ObservationMap};
use super::reader::{JsonReaderOptions, Orient};
use super::split::split_records;

pub(crate) fn read_document(
    sources: &[ResolvedSource],
    options: &JsonReaderOptions,
) -> Result<Table> {
    let mut rows: Vec<Value> = Vec::new();
    for source in sources {
        if options.lines {
            for span in split_records(source.bytes(), None)? {
                rows.push(parse(&source.bytes()[span.start..span.end])?);
            }
        } else {
            let document = parse(source.bytes())?;
            extract_rows(document, options.orient, &mut rows)?;
        }
    }
    debug!(rows = rows.len(), orient = ?options.orient, "parsed documents");

    let mut map = ObservationMap::new();
    for row in &rows {
        map.observe_json(row);
    }
    // Document values carry no lexeme widths, so 64-bit defaults apply
    let schema = Arc::new(map.resolve(&InferenceOptions::default(), options.dtypes.as_ref())?);

    let mut builders = Builder::for_schema(&schema);
    for (record, row) in rows.iter().enumerate() {
        append_row(&schema, &mut builders, row, record)?;
    }
    let columns = builders.into_iter().map(Builder::finish).collect();
    Table::new(schema, columns).map_err(Error::Core)
}

fn parse(bytes: &[u8]) -> Result<Value> {
    serde_json::from_slice(bytes).map_err(|e| Error::Format(format!("document parse: {e}")))
}

/// Flatten one document into row values according to its layout
fn extract_rows(document: Value, orient: Orient, rows: &mut Vec<Value>) -> Result<()> {
    match orient {
        Orient::Records => match document {
            Value::Array(elements) => {
                rows.extend(elements);
                Ok(())
            }
            _ => Err(Error::Format(
                "records layout requires a top-level array".into(),
            )),
        },
        Orient::Columns => {
            let Value::Object(columns) = document else {
                return Err(Error::Format(
                    "columns layout requires a top-level object".into(),
                ));
            };
            // Row keys in first-seen document order
            let mut row_keys: Vec<String> = Vec::new();
            for cells in columns.values() {
                let Value::Object(cells) = cells else {
                    return Err(Error::Format(
                        "columns layout requires an object per column".into(),
                    ));
                };
                for key in cells.keys() {
                    if !row_keys.iter().any(|k| k == key) {
                        row_keys.push(key.clone());
                    }
                }
            }
            for key in &row_keys {
                let mut row = serde_json::Map::new();
                for (name, cells) in &columns {
                    if let Some(value) = cells.as_object().and_then(|c| c.get(key)) {
                        row.insert(name.clone(), value.clone());
                    }
                }
                rows.push(Value::Object(row));
            }
            Ok(())
        }
        Orient::Split => {
            let Value::Object(mut envelope) = document else {
                return Err(Error::Format(
                    "split layout requires a top-level object".into(),
                ));
            };
            let names = match envelope.remove("columns") {
                Some(Value::Array(names)) => names
                    .into_iter()
                    .map(|name| match name {
                        Value::String(name) => name,
                        other => other.to_string(),
                    })
                    .collect::<Vec<String>>(),
                _ => {
                    return Err(Error::Format(
                        "split layout requires a \"columns\" array".into(),
                    ))
                }
            };
            let Some(Value::Array(data)) = envelope.remove("data") else {
                return Err(Error::Format(
                    "split layout requires a \"data\" array".into(),
                ));
            };
            for entry in data {
                let Value::Array(values) = entry else {
                    return Err(Error::Format(
                        "split layout requires an array per row".into(),
                    ));
                };
                if values.len() != names.len() {
                    return Err(Error::Format(format!(
                        "split row has {} values for {} columns",
                        values.len(),
                        names.len()
                    )));
                }
                let mut row = serde_json::Map::new();
                for (name, value) in names.iter().zip(values) {
                    row.insert(name.clone(), value);
                }
                rows.push(Value::Object(row));
            }
            Ok(())
        }
        Orient::Table => {
            let Value::Object(mut envelope) = document else {
                return Err(Error::Format(
                    "table layout requires a top-level object".into(),
                ));
            };
            match envelope.remove("data") {
                Some(Value::Array(data)) => {
                    rows.extend(data);
                    Ok(())
                }
                _ => Err(Error::Format(
                    "table layout requires a \"data\" array".into(),
                )),
            }
        }
    }
}

fn append_row(
    schema: &Schema,
    builders: &mut [Builder],
    row: &Value,
    record: usize,
) -> Result<()> {
    let mut filled = vec![false; builders.len()];
    match row {
        Value::Object(entries) => {
            for (name, value) in entries {
                if let Ok(i) = schema.index_of(name) {
                    builders[i].append_json(value, record)?;
                    filled[i] = true;
                }
            }
        }
        Value::Array(elements) => {
            for (position, value) in elements.iter().enumerate() {
                if position < builders.len() {
                    builders[position].append_json(value, record)?;
                    filled[position] = true;
                }
            }
        }
        scalar => {
            if let Some(builder) = builders.first_mut() {
                builder.append_json(scalar, record)?;
                filled[0] = true;
            }
        }
    }
    for (i, filled) in filled.iter().enumerate() {
        if !filled {
            builders[i].append_null();
        }
    }
    Ok(())
}
