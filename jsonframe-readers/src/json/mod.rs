//! Columnar JSON reader and writer
//!
//! Line-delimited input goes through a record splitter, a tokenizer, a
//! schema inference pass, and a column build pass, with the two passes
//! fanned out over worker threads. Whole-document input goes through the
//! `serde_json`-backed reference engine instead. Either way the result is
//! an immutable table whose schema was fixed before any column was built.

mod build;
mod infer;
mod reader;
mod reference;
mod split;
mod tokenize;
mod writer;

pub use infer::DtypeOverrides;
pub use reader::{read_json, Engine, JsonReaderOptions, Orient};
pub use split::ByteRange;
pub use writer::{write_json, JsonWriterOptions, WriteOrient};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::JsonInput;
    use jsonframe_core::{DataType, Table, TimeUnit};
    use std::collections::HashMap;
    use std::io::Write;

    fn read_lines(text: &str) -> Table {
        read_json(text.into(), &JsonReaderOptions::lines()).unwrap()
    }

    fn write_lines(table: &Table) -> String {
        let options = JsonWriterOptions {
            lines: true,
            ..JsonWriterOptions::default()
        };
        String::from_utf8(write_json(table, &options).unwrap()).unwrap()
    }

    #[test]
    fn read_write_read_is_stable() {
        let source = "{\"a\":1,\"b\":\"x\"}\n{\"a\":null,\"b\":null}\n{\"a\":3,\"b\":\"y\"}\n";
        let table = read_lines(source);
        let written = write_lines(&table);
        assert_eq!(written, source);

        let again = read_lines(&written);
        assert_eq!(again.schema(), table.schema());
        assert_eq!(
            again.column_by_name("a").unwrap().typed::<i64>(),
            table.column_by_name("a").unwrap().typed::<i64>()
        );
    }

    #[test]
    fn escaped_strings_survive_a_round_trip() {
        let source = "{\"s\":\"quote \\\" slash \\\\ tab \\t end\"}\n";
        let first = read_lines(source);
        let second = read_lines(&write_lines(&first));
        assert_eq!(
            first.column(0).unwrap().str_value(0).unwrap(),
            second.column(0).unwrap().str_value(0).unwrap()
        );
        assert_eq!(
            second.column(0).unwrap().str_value(0).unwrap(),
            Some("quote \" slash \\ tab \t end")
        );
    }

    #[test]
    fn values_wider_than_the_default_keep_their_magnitude() {
        let options = JsonReaderOptions {
            default_integer_bitwidth: 32,
            ..JsonReaderOptions::lines()
        };
        let table = read_json(
            "{\"u\":18446744073709551615,\"i\":-9223372036854775808}\n".into(),
            &options,
        )
        .unwrap();
        let u = table.column_by_name("u").unwrap();
        assert_eq!(u.data_type(), &DataType::UInt64);
        assert_eq!(u.uint_value(0).unwrap(), Some(u64::MAX));
        let i = table.column_by_name("i").unwrap();
        assert_eq!(i.data_type(), &DataType::Int64);
        assert_eq!(i.int_value(0).unwrap(), Some(i64::MIN));
    }

    #[test]
    fn lenient_nulls_build_typed_columns() {
        let table = read_lines("[1.0,]\n[null, ]\n");
        let first = table.column(0).unwrap();
        assert_eq!(first.data_type(), &DataType::Float64);
        assert_eq!(first.float_value(0).unwrap(), Some(1.0));
        assert_eq!(first.float_value(1).unwrap(), None);

        let second = table.column(1).unwrap();
        assert_eq!(second.data_type(), &DataType::Int8);
        assert_eq!(second.null_count(), 2);
        // Null slots read back as zero through the typed view
        assert_eq!(second.typed::<i8>(), &[0, 0]);
    }

    #[test]
    fn directory_input_concatenates_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("part-1.json"), "{\"v\": 1}\n{\"v\": 2}\n").unwrap();
        std::fs::write(dir.path().join("part-0.json"), "{\"v\": 0}\n").unwrap();

        let table = read_json(
            JsonInput::Path(dir.path().to_path_buf()),
            &JsonReaderOptions::lines(),
        )
        .unwrap();
        assert_eq!(table.column(0).unwrap().typed::<i64>(), &[0, 1, 2]);
    }

    #[test]
    fn mixed_files_union_their_schemas() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.json");
        let b = dir.path().join("b.json");
        std::fs::write(&a, "{\"x\": 1}\n").unwrap();
        std::fs::write(&b, "{\"x\": 2.5, \"y\": \"s\"}\n").unwrap();

        let input = JsonInput::Multiple(vec![a.into(), b.into()]);
        let table = read_json(input, &JsonReaderOptions::lines()).unwrap();
        let x = table.column_by_name("x").unwrap();
        assert_eq!(x.data_type(), &DataType::Float64);
        assert_eq!(x.float_value(0).unwrap(), Some(1.0));
        let y = table.column_by_name("y").unwrap();
        assert_eq!(y.str_value(0).unwrap(), None);
        assert_eq!(y.str_value(1).unwrap(), Some("s"));
    }

    #[test]
    fn gzip_file_reads_transparently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.json.gz");
        let mut encoder = flate2::write::GzEncoder::new(
            std::fs::File::create(&path).unwrap(),
            flate2::Compression::default(),
        );
        encoder.write_all(b"{\"v\": 7}\n{\"v\": 8}\n").unwrap();
        encoder.finish().unwrap();

        let table = read_json(JsonInput::Path(path), &JsonReaderOptions::lines()).unwrap();
        assert_eq!(table.column(0).unwrap().typed::<i64>(), &[7, 8]);
    }

    #[test]
    fn gzip_bytes_are_sniffed_without_a_path() {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"{\"v\": 9}\n").unwrap();
        let compressed = encoder.finish().unwrap();

        let table = read_json(compressed.into(), &JsonReaderOptions::lines()).unwrap();
        assert_eq!(table.column(0).unwrap().typed::<i64>(), &[9]);
    }

    #[test]
    fn overrides_by_name_pin_column_types() {
        let mut by_name = HashMap::new();
        by_name.insert("b".to_string(), DataType::Float32);
        by_name.insert("c".to_string(), DataType::Category);
        let options = JsonReaderOptions {
            dtypes: Some(DtypeOverrides::ByName(by_name)),
            ..JsonReaderOptions::lines()
        };
        let table = read_json(
            "{\"a\":1,\"b\":2,\"c\":\"x\"}\n{\"a\":2,\"b\":3,\"c\":\"x\"}\n".into(),
            &options,
        )
        .unwrap();
        assert_eq!(table.column_by_name("a").unwrap().data_type(), &DataType::Int64);
        assert_eq!(
            table.column_by_name("b").unwrap().data_type(),
            &DataType::Float32
        );
        let c = table.column_by_name("c").unwrap();
        assert_eq!(c.data_type(), &DataType::Category);
        assert_eq!(c.typed::<u32>(), &[0, 0]);
        assert_eq!(c.str_value(1).unwrap(), Some("x"));
    }

    #[test]
    fn overrides_by_position_apply_to_array_records() {
        let options = JsonReaderOptions {
            dtypes: Some(DtypeOverrides::ByIndex(vec![
                DataType::Int32,
                DataType::Int32,
            ])),
            ..JsonReaderOptions::lines()
        };
        let table = read_json("[1, 2]\n[3, 4]\n".into(), &options).unwrap();
        assert_eq!(table.column(0).unwrap().typed::<i32>(), &[1, 3]);
        assert_eq!(table.column(1).unwrap().typed::<i32>(), &[2, 4]);
    }

    #[test]
    fn temporal_overrides_store_integer_payloads() {
        let mut by_name = HashMap::new();
        by_name.insert(
            "ts".to_string(),
            DataType::Timestamp(TimeUnit::Millisecond),
        );
        by_name.insert("d".to_string(), DataType::Duration(TimeUnit::Second));
        let options = JsonReaderOptions {
            dtypes: Some(DtypeOverrides::ByName(by_name)),
            ..JsonReaderOptions::lines()
        };
        let table = read_json(
            "{\"ts\": 1715000000000, \"d\": -3600}\n".into(),
            &options,
        )
        .unwrap();
        assert_eq!(
            table.column_by_name("ts").unwrap().int_value(0).unwrap(),
            Some(1_715_000_000_000)
        );
        assert_eq!(
            table.column_by_name("d").unwrap().int_value(0).unwrap(),
            Some(-3600)
        );
    }

    #[test]
    fn nested_lists_of_structs_round_trip() {
        let source = "{\"rows\":[{\"k\":\"a\",\"v\":1},{\"k\":\"b\"}]}\n{\"rows\":[]}\n";
        let table = read_lines(source);
        let rows = table.column(0).unwrap();
        assert_eq!(rows.offsets().unwrap(), &[0, 2, 2]);
        let element = rows.child(0).unwrap();
        assert_eq!(element.child(0).unwrap().str_value(1).unwrap(), Some("b"));
        assert_eq!(element.child(1).unwrap().int_value(1).unwrap(), None);

        let written = write_lines(&table);
        assert_eq!(
            written,
            "{\"rows\":[{\"k\":\"a\",\"v\":1},{\"k\":\"b\",\"v\":null}]}\n{\"rows\":[]}\n"
        );
    }

    #[test]
    fn conflicting_nesting_fails_the_read() {
        let err = read_json(
            "{\"a\": 1}\n{\"a\": [1, 2]}\n".into(),
            &JsonReaderOptions::lines(),
        )
        .unwrap_err();
        assert!(matches!(err, crate::error::Error::SchemaConflict { .. }));
    }

    #[test]
    fn truncated_final_record_fails_the_read() {
        let err = read_json(
            "{\"a\": \"done\"}\n{\"a\": \"unfinished".into(),
            &JsonReaderOptions::lines(),
        )
        .unwrap_err();
        assert!(matches!(err, crate::error::Error::TruncatedRecord { .. }));
    }

    #[test]
    fn engines_type_the_same_lines_differently() {
        let text = "{\"a\": 1}\n{\"a\": 2}\n";

        // Default engine for line-delimited input is native, which honors
        // the configured width; the reference engine stays at 64 bits
        let narrow = JsonReaderOptions {
            default_integer_bitwidth: 32,
            ..JsonReaderOptions::lines()
        };
        let native = read_json(text.into(), &narrow).unwrap();
        assert_eq!(native.column(0).unwrap().data_type(), &DataType::Int32);

        let reference = read_json(
            text.into(),
            &JsonReaderOptions {
                engine: Engine::Reference,
                ..narrow
            },
        )
        .unwrap();
        assert_eq!(reference.column(0).unwrap().data_type(), &DataType::Int64);
    }

    #[test]
    fn empty_input_yields_an_empty_table() {
        let table = read_lines("");
        assert_eq!(table.num_rows(), 0);
        assert_eq!(table.num_columns(), 0);
    }
}
