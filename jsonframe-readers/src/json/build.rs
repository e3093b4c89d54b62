//! Column builders for the second (build) pass
//!
//! One builder per schema field, fed record by record. The schema is fixed
//! before building starts, so every value either fits the column's type,
//! coerces by a narrow set of rules (bool to 0/1, numeric text to numbers,
//! any scalar to its raw text for string columns), or fails with a
//! `TypeCoercion` error naming the field and record.

use std::collections::HashMap;

use jsonframe_core::{BitmapBuilder, Buffer, Column, DataType, Field, Schema};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::string_cache::StringDictionary;

use super::tokenize::{Token, Tokenizer};

/// An incremental builder for one column
pub enum Builder {
    /// Fixed-width numeric, timestamp, or duration values as little-endian bytes
    Primitive {
        field: Field,
        bytes: Vec<u8>,
        validity: BitmapBuilder,
    },
    /// Booleans, one byte per value
    Bool {
        field: Field,
        bytes: Vec<u8>,
        validity: BitmapBuilder,
    },
    /// UTF-8 strings with `u32` offsets
    Str {
        field: Field,
        bytes: Vec<u8>,
        offsets: Vec<u32>,
        validity: BitmapBuilder,
    },
    /// Dictionary-encoded strings
    Category {
        field: Field,
        codes: Vec<u32>,
        dictionary: StringDictionary,
        validity: BitmapBuilder,
    },
    /// Lists, delegating elements to a child builder
    List {
        field: Field,
        offsets: Vec<u32>,
        child: Box<Builder>,
        validity: BitmapBuilder,
    },
    /// Structs, delegating sub-fields to child builders
    Struct {
        field: Field,
        children: Vec<Builder>,
        child_index: HashMap<String, usize>,
        validity: BitmapBuilder,
    },
    /// Columns typed `Null`: rows are counted, values are discarded
    Null { field: Field, rows: usize },
}

impl Builder {
    /// Create a builder for a field, recursing into nested types
    pub fn for_field(field: &Field) -> Builder {
        match field.data_type() {
            DataType::Boolean => Builder::Bool {
                field: field.clone(),
                bytes: Vec::new(),
                validity: BitmapBuilder::new(),
            },
            DataType::String => Builder::Str {
                field: field.clone(),
                bytes: Vec::new(),
                offsets: vec![0],
                validity: BitmapBuilder::new(),
            },
            DataType::Category => Builder::Category {
                field: field.clone(),
                codes: Vec::new(),
                dictionary: StringDictionary::new(),
                validity: BitmapBuilder::new(),
            },
            DataType::List(item) => Builder::List {
                field: field.clone(),
                offsets: vec![0],
                child: Box::new(Builder::for_field(item)),
                validity: BitmapBuilder::new(),
            },
            DataType::Struct(fields) => {
                let children: Vec<Builder> = fields.iter().map(Builder::for_field).collect();
                let child_index = fields
                    .iter()
                    .enumerate()
                    .map(|(i, f)| (f.name().to_string(), i))
                    .collect();
                Builder::Struct {
                    field: field.clone(),
                    children,
                    child_index,
                    validity: BitmapBuilder::new(),
                }
            }
            DataType::Null => Builder::Null {
                field: field.clone(),
                rows: 0,
            },
            _ => Builder::Primitive {
                field: field.clone(),
                bytes: Vec::new(),
                validity: BitmapBuilder::new(),
            },
        }
    }

    /// Create one builder per schema field
    pub fn for_schema(schema: &Schema) -> Vec<Builder> {
        schema.fields().iter().map(Builder::for_field).collect()
    }

    fn field(&self) -> &Field {
        match self {
            Builder::Primitive { field, .. }
            | Builder::Bool { field, .. }
            | Builder::Str { field, .. }
            | Builder::Category { field, .. }
            | Builder::List { field, .. }
            | Builder::Struct { field, .. }
            | Builder::Null { field, .. } => field,
        }
    }

    /// Rows appended so far
    pub fn len(&self) -> usize {
        match self {
            Builder::Primitive { validity, .. }
            | Builder::Bool { validity, .. }
            | Builder::Str { validity, .. }
            | Builder::Category { validity, .. }
            | Builder::List { validity, .. }
            | Builder::Struct { validity, .. } => validity.len(),
            Builder::Null { rows, .. } => *rows,
        }
    }

    /// Check whether no rows have been appended
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a null row; the data slot reads back as zero
    pub fn append_null(&mut self) {
        match self {
            Builder::Primitive {
                field,
                bytes,
                validity,
            } => {
                bytes.resize(bytes.len() + field.data_type().size_bytes(), 0);
                validity.push(false);
            }
            Builder::Bool { bytes, validity, .. } => {
                bytes.push(0);
                validity.push(false);
            }
            Builder::Str {
                bytes,
                offsets,
                validity,
                ..
            } => {
                offsets.push(bytes.len() as u32);
                validity.push(false);
            }
            Builder::Category {
                codes, validity, ..
            } => {
                codes.push(0);
                validity.push(false);
            }
            Builder::List {
                offsets,
                child,
                validity,
                ..
            } => {
                offsets.push(child.len() as u32);
                validity.push(false);
            }
            Builder::Struct {
                children, validity, ..
            } => {
                for child in children {
                    child.append_null();
                }
                validity.push(false);
            }
            Builder::Null { rows, .. } => *rows += 1,
        }
    }

    /// Append a value from a token stream, consuming any nested subtree
    pub fn append_token(
        &mut self,
        token: Token<'_>,
        tokenizer: &mut Tokenizer<'_>,
        record: usize,
    ) -> Result<()> {
        if token == Token::Null && !matches!(self, Builder::Null { .. }) {
            self.append_null();
            return Ok(());
        }
        match self {
            Builder::Primitive {
                field,
                bytes,
                validity,
            } => {
                let value = scalar_lexeme(&token)
                    .ok_or_else(|| coercion(field, record, "expected a scalar value"))?;
                push_primitive(field, bytes, value, record)?;
                validity.push(true);
                Ok(())
            }
            Builder::Bool {
                field,
                bytes,
                validity,
            } => {
                let value = match &token {
                    Token::Bool(b) => *b,
                    Token::Number(lexeme) => lexeme
                        .parse::<f64>()
                        .map(|v| v != 0.0)
                        .map_err(|_| coercion(field, record, "expected a boolean"))?,
                    _ => return Err(coercion(field, record, "expected a boolean")),
                };
                bytes.push(u8::from(value));
                validity.push(true);
                Ok(())
            }
            Builder::Str {
                field,
                bytes,
                offsets,
                validity,
            } => {
                let text = scalar_lexeme(&token)
                    .ok_or_else(|| coercion(field, record, "expected a scalar value"))?;
                bytes.extend_from_slice(text.as_bytes());
                offsets.push(bytes.len() as u32);
                validity.push(true);
                Ok(())
            }
            Builder::Category {
                field,
                codes,
                dictionary,
                validity,
            } => {
                let text = scalar_lexeme(&token)
                    .ok_or_else(|| coercion(field, record, "expected a scalar value"))?;
                codes.push(dictionary.encode(&text));
                validity.push(true);
                Ok(())
            }
            Builder::List {
                field,
                offsets,
                child,
                validity,
            } => {
                if token != Token::ArrayStart {
                    return Err(coercion(field, record, "expected an array"));
                }
                loop {
                    let element = tokenizer
                        .next_token()?
                        .ok_or_else(|| coercion(field, record, "unterminated array"))?;
                    if element == Token::ArrayEnd {
                        break;
                    }
                    child.append_token(element, tokenizer, record)?;
                }
                offsets.push(child.len() as u32);
                validity.push(true);
                Ok(())
            }
            Builder::Struct {
                field,
                children,
                child_index,
                validity,
            } => {
                if token != Token::ObjectStart {
                    return Err(coercion(field, record, "expected an object"));
                }
                let row = validity.len();
                loop {
                    let next = tokenizer
                        .next_token()?
                        .ok_or_else(|| coercion(field, record, "unterminated object"))?;
                    match next {
                        Token::ObjectEnd => break,
                        Token::FieldName(name) => {
                            let value = tokenizer
                                .next_token()?
                                .ok_or_else(|| coercion(field, record, "unterminated object"))?;
                            match child_index.get(name.as_ref()) {
                                Some(&i) => children[i].append_token(value, tokenizer, record)?,
                                None => consume_subtree(&value, tokenizer)?,
                            }
                        }
                        _ => return Err(coercion(field, record, "malformed object")),
                    }
                }
                // Sub-fields absent from this instance become null
                for child in children.iter_mut() {
                    if child.len() == row {
                        child.append_null();
                    }
                }
                validity.push(true);
                Ok(())
            }
            Builder::Null { rows, .. } => {
                consume_subtree(&token, tokenizer)?;
                *rows += 1;
                Ok(())
            }
        }
    }

    /// Append a value from a parsed JSON document
    pub fn append_json(&mut self, value: &Value, record: usize) -> Result<()> {
        if value.is_null() && !matches!(self, Builder::Null { .. }) {
            self.append_null();
            return Ok(());
        }
        match self {
            Builder::Primitive {
                field,
                bytes,
                validity,
            } => {
                let text = scalar_text(value)
                    .ok_or_else(|| coercion(field, record, "expected a scalar value"))?;
                push_primitive(field, bytes, &text, record)?;
                validity.push(true);
                Ok(())
            }
            Builder::Bool {
                field,
                bytes,
                validity,
            } => {
                let truth = match value {
                    Value::Bool(b) => *b,
                    Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
                    _ => return Err(coercion(field, record, "expected a boolean")),
                };
                bytes.push(u8::from(truth));
                validity.push(true);
                Ok(())
            }
            Builder::Str {
                field,
                bytes,
                offsets,
                validity,
            } => {
                let text = scalar_text(value)
                    .ok_or_else(|| coercion(field, record, "expected a scalar value"))?;
                bytes.extend_from_slice(text.as_bytes());
                offsets.push(bytes.len() as u32);
                validity.push(true);
                Ok(())
            }
            Builder::Category {
                field,
                codes,
                dictionary,
                validity,
            } => {
                let text = scalar_text(value)
                    .ok_or_else(|| coercion(field, record, "expected a scalar value"))?;
                codes.push(dictionary.encode(&text));
                validity.push(true);
                Ok(())
            }
            Builder::List {
                field,
                offsets,
                child,
                validity,
            } => {
                let Value::Array(elements) = value else {
                    return Err(coercion(field, record, "expected an array"));
                };
                for element in elements {
                    child.append_json(element, record)?;
                }
                offsets.push(child.len() as u32);
                validity.push(true);
                Ok(())
            }
            Builder::Struct {
                field,
                children,
                child_index,
                validity,
            } => {
                let Value::Object(entries) = value else {
                    return Err(coercion(field, record, "expected an object"));
                };
                let row = validity.len();
                for (name, entry) in entries {
                    if let Some(&i) = child_index.get(name.as_str()) {
                        children[i].append_json(entry, record)?;
                    }
                }
                for child in children.iter_mut() {
                    if child.len() == row {
                        child.append_null();
                    }
                }
                validity.push(true);
                Ok(())
            }
            Builder::Null { rows, .. } => {
                *rows += 1;
                Ok(())
            }
        }
    }

    /// Finish into an immutable column
    pub fn finish(self) -> Column {
        match self {
            Builder::Primitive {
                field,
                bytes,
                validity,
            } => {
                let length = validity.len();
                let (validity, null_count) = finish_validity(validity);
                Column::new_primitive(field, Buffer::from_bytes(&bytes), validity, null_count, length)
            }
            Builder::Bool {
                field,
                bytes,
                validity,
            } => {
                let length = validity.len();
                let (validity, null_count) = finish_validity(validity);
                Column::new_primitive(field, Buffer::from_bytes(&bytes), validity, null_count, length)
            }
            Builder::Str {
                field,
                bytes,
                offsets,
                validity,
            } => {
                let length = validity.len();
                let (validity, null_count) = finish_validity(validity);
                Column::new_string(
                    field,
                    Buffer::from_bytes(&bytes),
                    Buffer::from_slice(&offsets),
                    validity,
                    null_count,
                    length,
                )
            }
            Builder::Category {
                field,
                codes,
                dictionary,
                validity,
            } => {
                let length = validity.len();
                let (validity, null_count) = finish_validity(validity);
                Column::new_category(
                    field,
                    Buffer::from_slice(&codes),
                    dictionary.into_column(),
                    validity,
                    null_count,
                    length,
                )
            }
            Builder::List {
                field,
                offsets,
                child,
                validity,
            } => {
                let length = validity.len();
                let (validity, null_count) = finish_validity(validity);
                Column::new_list(
                    field,
                    Buffer::from_slice(&offsets),
                    child.finish(),
                    validity,
                    null_count,
                    length,
                )
            }
            Builder::Struct {
                field,
                children,
                validity,
                ..
            } => {
                let length = validity.len();
                let (validity, null_count) = finish_validity(validity);
                let children = children.into_iter().map(Builder::finish).collect();
                Column::new_struct(field, children, validity, null_count, length)
            }
            Builder::Null { field, rows } => Column::new_null(field, rows),
        }
    }
}

fn finish_validity(validity: BitmapBuilder) -> (Option<Buffer>, usize) {
    let null_count = validity.unset_count();
    if validity.all_set() {
        (None, 0)
    } else {
        (Some(validity.finish()), null_count)
    }
}

/// Render a scalar token as text (raw lexeme for numbers)
fn scalar_lexeme<'a>(token: &'a Token<'_>) -> Option<&'a str> {
    match token {
        Token::Str(s) => Some(s.as_ref()),
        Token::Number(lexeme) => Some(lexeme),
        Token::Bool(true) => Some("true"),
        Token::Bool(false) => Some("false"),
        _ => None,
    }
}

/// Render a scalar JSON value as text
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn coercion(field: &Field, record: usize, detail: &str) -> Error {
    Error::TypeCoercion {
        field: field.name().to_string(),
        record,
        detail: detail.to_string(),
    }
}

/// Write one scalar into a fixed-width column, coercing text to the type
fn push_primitive(field: &Field, bytes: &mut Vec<u8>, text: &str, record: usize) -> Result<()> {
    match field.data_type() {
        DataType::Int8 => bytes.extend_from_slice(&parse_int::<1>(field, text, record)?),
        DataType::Int16 => bytes.extend_from_slice(&parse_int::<2>(field, text, record)?),
        DataType::Int32 => bytes.extend_from_slice(&parse_int::<4>(field, text, record)?),
        DataType::Int64 | DataType::Timestamp(_) | DataType::Duration(_) => {
            bytes.extend_from_slice(&parse_int::<8>(field, text, record)?);
        }
        DataType::UInt8 => bytes.extend_from_slice(&parse_uint::<1>(field, text, record)?),
        DataType::UInt16 => bytes.extend_from_slice(&parse_uint::<2>(field, text, record)?),
        DataType::UInt32 => bytes.extend_from_slice(&parse_uint::<4>(field, text, record)?),
        DataType::UInt64 => bytes.extend_from_slice(&parse_uint::<8>(field, text, record)?),
        DataType::Float32 => {
            let value = parse_float(field, text, record)? as f32;
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        DataType::Float64 => {
            let value = parse_float(field, text, record)?;
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        other => {
            return Err(coercion(
                field,
                record,
                &format!("{other} is not a fixed-width scalar type"),
            ))
        }
    }
    Ok(())
}

fn parse_raw_int(text: &str) -> Option<i128> {
    if let Ok(value) = text.parse::<i128>() {
        return Some(value);
    }
    // Fractional input truncates toward zero
    text.parse::<f64>().ok().map(|v| v.trunc() as i128)
}

fn parse_int<const WIDTH: usize>(
    field: &Field,
    text: &str,
    record: usize,
) -> Result<[u8; WIDTH]> {
    let value = match text {
        "true" => 1,
        "false" => 0,
        _ => parse_raw_int(text)
            .ok_or_else(|| coercion(field, record, "value is not an integer"))?,
    };
    let lo = -(1i128 << (WIDTH * 8 - 1));
    let hi = (1i128 << (WIDTH * 8 - 1)) - 1;
    if value < lo || value > hi {
        return Err(coercion(field, record, "integer out of range for column type"));
    }
    let wide = value.to_le_bytes();
    let mut out = [0u8; WIDTH];
    out.copy_from_slice(&wide[..WIDTH]);
    Ok(out)
}

fn parse_uint<const WIDTH: usize>(
    field: &Field,
    text: &str,
    record: usize,
) -> Result<[u8; WIDTH]> {
    let value = match text {
        "true" => 1,
        "false" => 0,
        _ => parse_raw_int(text)
            .ok_or_else(|| coercion(field, record, "value is not an integer"))?,
    };
    if value < 0 || value > i128::from(u64::MAX) || (WIDTH < 8 && value >= 1i128 << (WIDTH * 8)) {
        return Err(coercion(field, record, "integer out of range for column type"));
    }
    let wide = (value as u128).to_le_bytes();
    let mut out = [0u8; WIDTH];
    out.copy_from_slice(&wide[..WIDTH]);
    Ok(out)
}

fn parse_float(field: &Field, text: &str, record: usize) -> Result<f64> {
    match text {
        "true" => Ok(1.0),
        "false" => Ok(0.0),
        _ => text
            .parse::<f64>()
            .map_err(|_| coercion(field, record, "value is not a number")),
    }
}

/// Consume the remainder of a value whose first token has been read
fn consume_subtree(first: &Token<'_>, tokenizer: &mut Tokenizer<'_>) -> Result<()> {
    let mut depth = match first {
        Token::ObjectStart | Token::ArrayStart => 1usize,
        _ => return Ok(()),
    };
    while depth > 0 {
        let token = tokenizer.next_token()?.ok_or_else(|| Error::UnexpectedToken {
            offset: tokenizer.position(),
            found: "unexpected end of record".to_string(),
        })?;
        match token {
            Token::ObjectStart | Token::ArrayStart => depth += 1,
            Token::ObjectEnd | Token::ArrayEnd => depth -= 1,
            _ => {}
        }
    }
    Ok(())
}

/// Append one record (object or positional array) across a builder set
pub fn append_record(
    schema: &Schema,
    builders: &mut [Builder],
    tokenizer: &mut Tokenizer<'_>,
    record: usize,
) -> Result<()> {
    let Some(first) = tokenizer.next_token()? else {
        return Ok(());
    };
    let mut filled = vec![false; builders.len()];
    match first {
        Token::ObjectStart => loop {
            let token = tokenizer.next_token()?.ok_or_else(|| Error::UnexpectedToken {
                offset: tokenizer.position(),
                found: "unexpected end of record".to_string(),
            })?;
            match token {
                Token::ObjectEnd => break,
                Token::FieldName(name) => {
                    let value = tokenizer.next_token()?.ok_or_else(|| {
                        Error::UnexpectedToken {
                            offset: tokenizer.position(),
                            found: "unexpected end of record".to_string(),
                        }
                    })?;
                    match schema.index_of(name.as_ref()) {
                        Ok(i) => {
                            builders[i].append_token(value, tokenizer, record)?;
                            filled[i] = true;
                        }
                        Err(_) => consume_subtree(&value, tokenizer)?,
                    }
                }
                _ => {
                    return Err(Error::UnexpectedToken {
                        offset: tokenizer.position(),
                        found: "expected field name".to_string(),
                    })
                }
            }
        },
        Token::ArrayStart => {
            let mut position = 0usize;
            loop {
                let token = tokenizer.next_token()?.ok_or_else(|| {
                    Error::UnexpectedToken {
                        offset: tokenizer.position(),
                        found: "unexpected end of record".to_string(),
                    }
                })?;
                if token == Token::ArrayEnd {
                    break;
                }
                if position < builders.len() {
                    builders[position].append_token(token, tokenizer, record)?;
                    filled[position] = true;
                } else {
                    consume_subtree(&token, tokenizer)?;
                }
                position += 1;
            }
        }
        _ => {
            return Err(Error::UnexpectedToken {
                offset: tokenizer.position(),
                found: "record is not an object or array".to_string(),
            })
        }
    }
    for (i, filled) in filled.iter().enumerate() {
        if !filled {
            builders[i].append_null();
        }
    }
    Ok(())
}
