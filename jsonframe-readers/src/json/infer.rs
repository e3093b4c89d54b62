//! Schema inference over token streams
//!
//! Pass one of the two-pass pipeline. Each worker accumulates per-field
//! observations; partial observation maps merge with a commutative,
//! associative union, and the merged result resolves into an immutable
//! `Schema` that the build pass never mutates.

use std::collections::HashMap;

use jsonframe_core::{DataType, Field, Schema};

use crate::error::{Error, Result};

use super::tokenize::{Token, Tokenizer};

/// Bit-width defaults applied when resolving inferred numeric types
#[derive(Debug, Clone, Copy)]
pub struct InferenceOptions {
    /// Default signed-integer width for integral fields (8/16/32/64)
    pub default_integer_bitwidth: u8,

    /// Default float width for fractional fields (32/64)
    pub default_float_bitwidth: u8,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            default_integer_bitwidth: 64,
            default_float_bitwidth: 64,
        }
    }
}

/// Caller-supplied dtype overrides, short-circuiting inference for the
/// fields they name; unlisted fields are still inferred
#[derive(Debug, Clone)]
pub enum DtypeOverrides {
    /// Override by field name
    ByName(HashMap<String, DataType>),

    /// Override by column position (first-seen field order)
    ByIndex(Vec<DataType>),
}

impl DtypeOverrides {
    fn lookup(&self, name: &str, index: usize) -> Option<&DataType> {
        match self {
            DtypeOverrides::ByName(map) => map.get(name),
            DtypeOverrides::ByIndex(types) => types.get(index),
        }
    }
}

/// What has been seen for one field across the inference window
#[derive(Debug, Clone, Default)]
pub struct FieldObservation {
    /// Rows where the field appeared (including explicit nulls)
    present: usize,
    nulls: usize,
    bools: usize,
    strings: usize,
    ints: usize,
    floats: usize,

    /// Min/max over integer literals, wide enough for the full u64 range
    int_range: Option<(i128, i128)>,

    /// A float literal was seen that is not exactly representable in f32
    float_needs_64: bool,

    /// Element observations when the field held arrays
    list: Option<Box<FieldObservation>>,

    /// Child field observations when the field held objects
    strukt: Option<Box<ObservationMap>>,
}

impl FieldObservation {
    fn has_scalar(&self) -> bool {
        self.bools + self.strings + self.ints + self.floats > 0
    }

    fn observe_int(&mut self, value: i128) {
        self.ints += 1;
        self.int_range = Some(match self.int_range {
            None => (value, value),
            Some((min, max)) => (min.min(value), max.max(value)),
        });
    }

    fn observe_float(&mut self, value: f64) {
        self.floats += 1;
        if f64::from(value as f32) != value {
            self.float_needs_64 = true;
        }
    }

    fn merge(&mut self, other: FieldObservation) {
        self.present += other.present;
        self.nulls += other.nulls;
        self.bools += other.bools;
        self.strings += other.strings;
        self.ints += other.ints;
        self.floats += other.floats;
        self.float_needs_64 |= other.float_needs_64;
        self.int_range = match (self.int_range, other.int_range) {
            (a, None) => a,
            (None, b) => b,
            (Some((amin, amax)), Some((bmin, bmax))) => Some((amin.min(bmin), amax.max(bmax))),
        };
        match (&mut self.list, other.list) {
            (_, None) => {}
            (slot @ None, Some(other_list)) => *slot = Some(other_list),
            (Some(mine), Some(other_list)) => mine.merge(*other_list),
        }
        match (&mut self.strukt, other.strukt) {
            (_, None) => {}
            (slot @ None, Some(other_map)) => *slot = Some(other_map),
            (Some(mine), Some(other_map)) => mine.merge(*other_map),
        }
    }
}

/// Ordered per-field observations for one nesting level
///
/// Field order is first-seen order, which becomes column order.
#[derive(Debug, Clone, Default)]
pub struct ObservationMap {
    names: Vec<String>,
    index: HashMap<String, usize>,
    observations: Vec<FieldObservation>,

    /// Rows (or struct instances) observed at this level
    records: usize,
}

impl ObservationMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records observed
    pub fn records(&self) -> usize {
        self.records
    }

    /// Check whether any field has been observed
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn slot(&mut self, name: &str) -> usize {
        if let Some(&i) = self.index.get(name) {
            return i;
        }
        let i = self.names.len();
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), i);
        self.observations.push(FieldObservation::default());
        i
    }

    /// Union another map into this one; commutative up to field order,
    /// which follows the left operand first
    pub fn merge(&mut self, other: ObservationMap) {
        self.records += other.records;
        for (name, observation) in other.names.into_iter().zip(other.observations) {
            let i = self.slot(&name);
            self.observations[i].merge(observation);
        }
    }

    /// Observe one record (a top-level object or array)
    pub fn observe_record(&mut self, tokenizer: &mut Tokenizer<'_>) -> Result<()> {
        let Some(first) = tokenizer.next_token()? else {
            return Ok(());
        };
        self.records += 1;
        match first {
            Token::ObjectStart => self.observe_object_fields(tokenizer)?,
            Token::ArrayStart => {
                // Positional records: columns named "0", "1", ...
                let mut position = 0usize;
                loop {
                    let token = tokenizer
                        .next_token()?
                        .ok_or_else(|| unexpected_end(tokenizer))?;
                    if token == Token::ArrayEnd {
                        break;
                    }
                    let i = self.slot(&position.to_string());
                    observe_value(&mut self.observations[i], token, tokenizer)?;
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
        Ok(())
    }

    fn observe_object_fields(&mut self, tokenizer: &mut Tokenizer<'_>) -> Result<()> {
        loop {
            let token = tokenizer
                .next_token()?
                .ok_or_else(|| unexpected_end(tokenizer))?;
            match token {
                Token::ObjectEnd => return Ok(()),
                Token::FieldName(name) => {
                    let value = tokenizer
                        .next_token()?
                        .ok_or_else(|| unexpected_end(tokenizer))?;
                    let i = self.slot(&name);
                    observe_value(&mut self.observations[i], value, tokenizer)?;
                }
                _ => {
                    return Err(Error::UnexpectedToken {
                        offset: tokenizer.position(),
                        found: "expected field name".to_string(),
                    })
                }
            }
        }
    }

    /// Observe one parsed document row (object, positional array, or a
    /// bare scalar, which lands in column "0")
    pub fn observe_json(&mut self, row: &serde_json::Value) {
        self.records += 1;
        match row {
            serde_json::Value::Object(entries) => {
                for (name, value) in entries {
                    let i = self.slot(name);
                    observe_json_value(&mut self.observations[i], value);
                }
            }
            serde_json::Value::Array(elements) => {
                for (position, value) in elements.iter().enumerate() {
                    let i = self.slot(&position.to_string());
                    observe_json_value(&mut self.observations[i], value);
                }
            }
            scalar => {
                let i = self.slot("0");
                observe_json_value(&mut self.observations[i], scalar);
            }
        }
    }

    /// Resolve the accumulated observations into a schema
    pub fn resolve(
        &self,
        options: &InferenceOptions,
        overrides: Option<&DtypeOverrides>,
    ) -> Result<Schema> {
        let mut fields = Vec::with_capacity(self.names.len());
        for (i, name) in self.names.iter().enumerate() {
            let observation = &self.observations[i];
            let nullable = observation.nulls > 0 || observation.present < self.records;
            let data_type = match overrides.and_then(|o| o.lookup(name, i)) {
                Some(data_type) => data_type.clone(),
                None => resolve_type(name, observation, options)?,
            };
            fields.push(Field::new(name, data_type, nullable));
        }
        Ok(Schema::new(fields))
    }
}

fn unexpected_end(tokenizer: &Tokenizer<'_>) -> Error {
    Error::UnexpectedToken {
        offset: tokenizer.position(),
        found: "unexpected end of record".to_string(),
    }
}

/// Observe one value for a field, consuming any nested subtree
fn observe_value(
    observation: &mut FieldObservation,
    token: Token<'_>,
    tokenizer: &mut Tokenizer<'_>,
) -> Result<()> {
    observation.present += 1;
    match token {
        Token::Null => observation.nulls += 1,
        Token::Bool(_) => observation.bools += 1,
        Token::Str(_) => observation.strings += 1,
        Token::Number(lexeme) => observe_number(observation, lexeme),
        Token::ArrayStart => {
            let element = observation
                .list
                .get_or_insert_with(Box::default);
            loop {
                let token = tokenizer
                    .next_token()?
                    .ok_or_else(|| unexpected_end(tokenizer))?;
                if token == Token::ArrayEnd {
                    break;
                }
                observe_value(element, token, tokenizer)?;
            }
        }
        Token::ObjectStart => {
            let map = observation
                .strukt
                .get_or_insert_with(Box::default);
            map.records += 1;
            map.observe_object_fields(tokenizer)?;
        }
        Token::FieldName(_) | Token::ObjectEnd | Token::ArrayEnd => {
            return Err(Error::UnexpectedToken {
                offset: tokenizer.position(),
                found: "misplaced structural token".to_string(),
            })
        }
    }
    Ok(())
}

fn observe_json_value(observation: &mut FieldObservation, value: &serde_json::Value) {
    observation.present += 1;
    match value {
        serde_json::Value::Null => observation.nulls += 1,
        serde_json::Value::Bool(_) => observation.bools += 1,
        serde_json::Value::String(_) => observation.strings += 1,
        serde_json::Value::Number(number) => {
            if let Some(value) = number.as_i64() {
                observation.observe_int(i128::from(value));
            } else if let Some(value) = number.as_u64() {
                observation.observe_int(i128::from(value));
            } else {
                observation.observe_float(number.as_f64().unwrap_or(f64::NAN));
            }
        }
        serde_json::Value::Array(elements) => {
            let element = observation.list.get_or_insert_with(Box::default);
            for entry in elements {
                observe_json_value(element, entry);
            }
        }
        serde_json::Value::Object(entries) => {
            let map = observation.strukt.get_or_insert_with(Box::default);
            map.records += 1;
            for (name, entry) in entries {
                let i = map.slot(name);
                observe_json_value(&mut map.observations[i], entry);
            }
        }
    }
}

/// Classify a raw numeric lexeme
fn observe_number(observation: &mut FieldObservation, lexeme: &str) {
    if is_integer_lexeme(lexeme) {
        if let Ok(value) = lexeme.parse::<i128>() {
            if value >= i128::from(i64::MIN) && value <= i128::from(u64::MAX) {
                observation.observe_int(value);
                return;
            }
        }
    }
    observation.observe_float(lexeme.parse::<f64>().unwrap_or(f64::NAN));
}

fn is_integer_lexeme(lexeme: &str) -> bool {
    let digits = lexeme.strip_prefix('-').unwrap_or(lexeme);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Resolve a single field's observations to a data type
fn resolve_type(
    name: &str,
    observation: &FieldObservation,
    options: &InferenceOptions,
) -> Result<DataType> {
    match (&observation.list, &observation.strukt) {
        (Some(_), Some(_)) => {
            return Err(Error::SchemaConflict {
                field: name.to_string(),
                detail: "mixes arrays and objects".to_string(),
            })
        }
        (Some(element), None) => {
            if observation.has_scalar() {
                return Err(Error::SchemaConflict {
                    field: name.to_string(),
                    detail: "mixes arrays and scalar values".to_string(),
                });
            }
            let element_type = resolve_type(name, element, options)?;
            let nullable = element.nulls > 0;
            return Ok(DataType::List(Box::new(Field::new(
                "item",
                element_type,
                nullable,
            ))));
        }
        (None, Some(map)) => {
            if observation.has_scalar() {
                return Err(Error::SchemaConflict {
                    field: name.to_string(),
                    detail: "mixes objects and scalar values".to_string(),
                });
            }
            let child_schema = map.resolve(options, None)?;
            return Ok(DataType::Struct(child_schema.fields().to_vec()));
        }
        (None, None) => {}
    }

    if observation.strings > 0 {
        // Scalars re-render from raw lexemes, so this is lossless
        return Ok(DataType::String);
    }
    if observation.floats > 0 {
        return Ok(resolve_float(observation, options));
    }
    if observation.ints > 0 {
        return Ok(resolve_integer(observation, options));
    }
    if observation.bools > 0 {
        return Ok(DataType::Boolean);
    }
    // No non-null values at all: smallest integer type, by policy
    Ok(DataType::Int8)
}

fn resolve_float(observation: &FieldObservation, options: &InferenceOptions) -> DataType {
    if options.default_float_bitwidth == 32 && !observation.float_needs_64 {
        DataType::Float32
    } else {
        DataType::Float64
    }
}

fn resolve_integer(observation: &FieldObservation, options: &InferenceOptions) -> DataType {
    let (mut min, mut max) = observation.int_range.unwrap_or((0, 0));
    if observation.bools > 0 {
        // Booleans coerce to 0/1 when mixed with integers
        min = min.min(0);
        max = max.max(1);
    }

    if fits_signed(min, max, options.default_integer_bitwidth) {
        // Width validated against 8/16/32/64 by the reader options
        DataType::signed_integer(options.default_integer_bitwidth)
            .unwrap_or(DataType::Int64)
    } else if fits_signed(min, max, 64) {
        DataType::Int64
    } else if min >= 0 && max <= i128::from(u64::MAX) {
        DataType::UInt64
    } else {
        DataType::Float64
    }
}

fn fits_signed(min: i128, max: i128, bitwidth: u8) -> bool {
    let (lo, hi) = match bitwidth {
        8 => (i128::from(i8::MIN), i128::from(i8::MAX)),
        16 => (i128::from(i16::MIN), i128::from(i16::MAX)),
        32 => (i128::from(i32::MIN), i128::from(i32::MAX)),
        _ => (i128::from(i64::MIN), i128::from(i64::MAX)),
    };
    min >= lo && max <= hi
}
