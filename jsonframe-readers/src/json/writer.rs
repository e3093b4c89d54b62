//! JSON serialization of tables
//!
//! The row layout mirrors what the reader accepts, so a write followed by a
//! read reproduces the same columns. Strings are escaped through
//! `serde_json`; integers and floats render from the typed buffers, with
//! non-finite floats written as nulls.

use std::fmt::Write as _;

use jsonframe_core::{Column, DataType, Table};

use crate::error::{Error, Result};

/// Row layout for writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteOrient {
    /// One object per row
    #[default]
    Records,

    /// One object per column, keyed by row number
    Columns,
}

/// Options controlling a JSON write
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonWriterOptions {
    /// Write newline-delimited rows instead of one document
    pub lines: bool,

    /// Row layout; `Columns` is only valid in whole-document mode
    pub orient: WriteOrient,
}

/// Serialize a table to JSON text
pub fn write_json(table: &Table, options: &JsonWriterOptions) -> Result<Vec<u8>> {
    if options.lines && options.orient == WriteOrient::Columns {
        return Err(Error::InvalidInputKind(
            "column layout cannot be line-delimited".into(),
        ));
    }

    let mut out = String::new();
    match options.orient {
        WriteOrient::Records => {
            if !options.lines {
                out.push('[');
            }
            for row in 0..table.num_rows() {
                if !options.lines && row > 0 {
                    out.push(',');
                }
                write_row(table, row, &mut out)?;
                if options.lines {
                    out.push('\n');
                }
            }
            if !options.lines {
                out.push(']');
            }
        }
        WriteOrient::Columns => {
            out.push('{');
            for (i, column) in table.columns().iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_escaped(column.name(), &mut out)?;
                out.push_str(":{");
                for row in 0..column.len() {
                    if row > 0 {
                        out.push(',');
                    }
                    write_escaped(&row.to_string(), &mut out)?;
                    out.push(':');
                    write_value(column, row, &mut out)?;
                }
                out.push('}');
            }
            out.push('}');
        }
    }
    Ok(out.into_bytes())
}

fn write_row(table: &Table, row: usize, out: &mut String) -> Result<()> {
    out.push('{');
    for (i, column) in table.columns().iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_escaped(column.name(), out)?;
        out.push(':');
        write_value(column, row, out)?;
    }
    out.push('}');
    Ok(())
}

fn write_value(column: &Column, row: usize, out: &mut String) -> Result<()> {
    if !column.is_valid(row) {
        out.push_str("null");
        return Ok(());
    }
    match column.data_type() {
        DataType::Boolean => {
            let value = column.bool_value(row)?.unwrap_or_default();
            out.push_str(if value { "true" } else { "false" });
        }
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
            let value = column.int_value(row)?.unwrap_or_default();
            write!(out, "{value}").expect("write to string");
        }
        DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
            let value = column.uint_value(row)?.unwrap_or_default();
            write!(out, "{value}").expect("write to string");
        }
        DataType::Float32 | DataType::Float64 => {
            let value = column.float_value(row)?.unwrap_or_default();
            match serde_json::Number::from_f64(value) {
                Some(number) => write!(out, "{number}").expect("write to string"),
                // NaN and infinities have no JSON rendering
                None => out.push_str("null"),
            }
        }
        DataType::String | DataType::Category => {
            let value = column.str_value(row)?.unwrap_or_default();
            write_escaped(value, out)?;
        }
        DataType::Timestamp(_) | DataType::Duration(_) => {
            let value = column.int_value(row)?.unwrap_or_default();
            write!(out, "{value}").expect("write to string");
        }
        DataType::List(_) => {
            let offsets = column.offsets()?;
            let child = column.child(0)?;
            out.push('[');
            for element in offsets[row] as usize..offsets[row + 1] as usize {
                if element > offsets[row] as usize {
                    out.push(',');
                }
                write_value(child, element, out)?;
            }
            out.push(']');
        }
        DataType::Struct(_) => {
            out.push('{');
            for (i, child) in column.children().iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_escaped(child.name(), out)?;
                out.push(':');
                write_value(child, row, out)?;
            }
            out.push('}');
        }
        DataType::Null => out.push_str("null"),
    }
    Ok(())
}

fn write_escaped(text: &str, out: &mut String) -> Result<()> {
    let escaped = serde_json::to_string(text)
        .map_err(|e| Error::Format(format!("string escape: {e}")))?;
    out.push_str(&escaped);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::reader::{read_json, JsonReaderOptions};
    use super::*;

    fn lines_table(text: &str) -> Table {
        read_json(text.into(), &JsonReaderOptions::lines()).unwrap()
    }

    #[test]
    fn writes_line_delimited_records() {
        let table = lines_table("{\"a\": 1, \"b\": \"x\"}\n{\"a\": 2, \"b\": null}\n");
        let options = JsonWriterOptions {
            lines: true,
            ..JsonWriterOptions::default()
        };
        let written = String::from_utf8(write_json(&table, &options).unwrap()).unwrap();
        assert_eq!(written, "{\"a\":1,\"b\":\"x\"}\n{\"a\":2,\"b\":null}\n");
    }

    #[test]
    fn writes_a_records_document() {
        let table = lines_table("{\"v\": 1.5}\n{\"v\": -2.0}\n");
        let written =
            String::from_utf8(write_json(&table, &JsonWriterOptions::default()).unwrap())
                .unwrap();
        assert_eq!(written, "[{\"v\":1.5},{\"v\":-2.0}]");
    }

    #[test]
    fn writes_a_columns_document() {
        let table = lines_table("{\"a\": 1, \"b\": \"x\"}\n{\"a\": 2, \"b\": \"y\"}\n");
        let options = JsonWriterOptions {
            orient: WriteOrient::Columns,
            ..JsonWriterOptions::default()
        };
        let written = String::from_utf8(write_json(&table, &options).unwrap()).unwrap();
        assert_eq!(
            written,
            "{\"a\":{\"0\":1,\"1\":2},\"b\":{\"0\":\"x\",\"1\":\"y\"}}"
        );
    }

    #[test]
    fn escapes_strings_on_the_way_out() {
        let table = lines_table("{\"s\": \"a\\\"b\\\\c\"}\n");
        let options = JsonWriterOptions {
            lines: true,
            ..JsonWriterOptions::default()
        };
        let written = String::from_utf8(write_json(&table, &options).unwrap()).unwrap();
        assert_eq!(written, "{\"s\":\"a\\\"b\\\\c\"}\n");
    }

    #[test]
    fn nested_rows_round_trip_through_text() {
        let source = "{\"s\": {\"f\": 1}, \"l\": [1,2]}\n{\"s\": {\"f\": 2}, \"l\": []}\n";
        let table = lines_table(source);
        let options = JsonWriterOptions {
            lines: true,
            ..JsonWriterOptions::default()
        };
        let written = String::from_utf8(write_json(&table, &options).unwrap()).unwrap();
        assert_eq!(
            written,
            "{\"s\":{\"f\":1},\"l\":[1,2]}\n{\"s\":{\"f\":2},\"l\":[]}\n"
        );
    }

    #[test]
    fn line_delimited_columns_layout_is_rejected() {
        let table = lines_table("{\"a\": 1}\n");
        let options = JsonWriterOptions {
            lines: true,
            orient: WriteOrient::Columns,
        };
        assert!(write_json(&table, &options).is_err());
    }
}
