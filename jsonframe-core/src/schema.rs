//! Schema definition for columnar JSON tables

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Data type for column values
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Boolean type (stored one byte per value)
    Boolean,

    /// 8-bit signed integer
    Int8,

    /// 16-bit signed integer
    Int16,

    /// 32-bit signed integer
    Int32,

    /// 64-bit signed integer
    Int64,

    /// 8-bit unsigned integer
    UInt8,

    /// 16-bit unsigned integer
    UInt16,

    /// 32-bit unsigned integer
    UInt32,

    /// 64-bit unsigned integer
    UInt64,

    /// 32-bit floating point
    Float32,

    /// 64-bit floating point
    Float64,

    /// UTF-8 encoded string
    String,

    /// Dictionary-encoded string (u32 codes into a string dictionary)
    Category,

    /// Timestamp as an integer count of the given unit since the UNIX epoch
    Timestamp(TimeUnit),

    /// Signed duration as an integer count of the given unit
    Duration(TimeUnit),

    /// Variable-length list of values described by the element field
    List(Box<Field>),

    /// Struct with named child fields
    Struct(Vec<Field>),

    /// Null type (for columns with no observed values)
    Null,
}

/// Time unit for temporal types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    /// Second
    Second,

    /// Millisecond
    Millisecond,

    /// Microsecond
    Microsecond,

    /// Nanosecond
    Nanosecond,
}

impl DataType {
    /// Get the size of one value of this type in bytes
    pub fn size_bytes(&self) -> usize {
        match self {
            DataType::Boolean | DataType::Int8 | DataType::UInt8 => 1,
            DataType::Int16 | DataType::UInt16 => 2,
            DataType::Int32 | DataType::UInt32 | DataType::Float32 | DataType::Category => 4,
            DataType::Int64
            | DataType::UInt64
            | DataType::Float64
            | DataType::Timestamp(_)
            | DataType::Duration(_) => 8,
            // Variable-size and nested types have no fixed value width
            DataType::String | DataType::List(_) | DataType::Struct(_) | DataType::Null => 0,
        }
    }

    /// Check if this type is a signed integer
    pub fn is_signed_integer(&self) -> bool {
        matches!(
            self,
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64
        )
    }

    /// Check if this type is an unsigned integer
    pub fn is_unsigned_integer(&self) -> bool {
        matches!(
            self,
            DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64
        )
    }

    /// Check if this type is an integer
    pub fn is_integer(&self) -> bool {
        self.is_signed_integer() || self.is_unsigned_integer()
    }

    /// Check if this type is floating point
    pub fn is_float(&self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    /// Check if this type is numeric
    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Check if this type is nested (has child columns)
    pub fn is_nested(&self) -> bool {
        matches!(self, DataType::List(_) | DataType::Struct(_))
    }

    /// The signed integer type of the given bit width
    pub fn signed_integer(bitwidth: u8) -> Result<Self> {
        match bitwidth {
            8 => Ok(DataType::Int8),
            16 => Ok(DataType::Int16),
            32 => Ok(DataType::Int32),
            64 => Ok(DataType::Int64),
            other => Err(Error::InvalidArgument(format!(
                "Unsupported integer bit width: {other}"
            ))),
        }
    }

    /// The float type of the given bit width
    pub fn float(bitwidth: u8) -> Result<Self> {
        match bitwidth {
            32 => Ok(DataType::Float32),
            64 => Ok(DataType::Float64),
            other => Err(Error::InvalidArgument(format!(
                "Unsupported float bit width: {other}"
            ))),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "Boolean"),
            DataType::Int8 => write!(f, "Int8"),
            DataType::Int16 => write!(f, "Int16"),
            DataType::Int32 => write!(f, "Int32"),
            DataType::Int64 => write!(f, "Int64"),
            DataType::UInt8 => write!(f, "UInt8"),
            DataType::UInt16 => write!(f, "UInt16"),
            DataType::UInt32 => write!(f, "UInt32"),
            DataType::UInt64 => write!(f, "UInt64"),
            DataType::Float32 => write!(f, "Float32"),
            DataType::Float64 => write!(f, "Float64"),
            DataType::String => write!(f, "String"),
            DataType::Category => write!(f, "Category"),
            DataType::Timestamp(unit) => write!(f, "Timestamp({unit})"),
            DataType::Duration(unit) => write!(f, "Duration({unit})"),
            DataType::List(item) => write!(f, "List({})", item.data_type),
            DataType::Struct(fields) => {
                write!(f, "Struct({{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.data_type)?;
                }
                write!(f, "}})")
            }
            DataType::Null => write!(f, "Null"),
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeUnit::Second => write!(f, "Second"),
            TimeUnit::Millisecond => write!(f, "Millisecond"),
            TimeUnit::Microsecond => write!(f, "Microsecond"),
            TimeUnit::Nanosecond => write!(f, "Nanosecond"),
        }
    }
}

/// A field in a schema, with a name, data type, and nullability
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    /// Name of the field
    pub name: String,

    /// Data type of the field
    pub data_type: DataType,

    /// Whether the field can be null
    pub nullable: bool,
}

impl Field {
    /// Create a new field
    pub fn new(name: &str, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            nullable,
        }
    }

    /// Get the name of this field
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the data type of this field
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// Check if this field is nullable
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nullable {
            write!(f, "{}: {} (nullable)", self.name, self.data_type)
        } else {
            write!(f, "{}: {} (non-nullable)", self.name, self.data_type)
        }
    }
}

/// A schema describing a table's columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Fields in this schema, in column order
    fields: Vec<Field>,

    /// Field indices by name for faster lookup
    #[serde(skip)]
    field_indices: HashMap<String, usize>,
}

impl Schema {
    /// Create a new schema with the given fields
    pub fn new(fields: Vec<Field>) -> Self {
        let mut field_indices = HashMap::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            field_indices.insert(field.name.clone(), i);
        }

        Self {
            fields,
            field_indices,
        }
    }

    /// Create a schema with no fields
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Get all fields in this schema
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Get a field by index
    pub fn field(&self, index: usize) -> &Field {
        &self.fields[index]
    }

    /// Get a field by name
    pub fn field_by_name(&self, name: &str) -> Result<&Field> {
        let index = self.index_of(name)?;
        Ok(&self.fields[index])
    }

    /// Get the index of a field by name
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.field_indices
            .get(name)
            .copied()
            .ok_or_else(|| Error::InvalidArgument(format!("Field not found: {name}")))
    }

    /// Check whether the schema contains a field with the given name
    pub fn contains(&self, name: &str) -> bool {
        self.field_indices.contains_key(name)
    }

    /// Get the number of fields in this schema
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if this schema is empty
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Create a projection of this schema with only the specified fields
    pub fn project(&self, indices: &[usize]) -> Result<Self> {
        if indices.iter().any(|&i| i >= self.fields.len()) {
            return Err(Error::IndexOutOfBounds);
        }

        let fields = indices.iter().map(|&i| self.fields[i].clone()).collect();

        Ok(Self::new(fields))
    }

    /// Serialize this schema to a binary format
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(Error::Serialization)
    }

    /// Deserialize a schema from a binary format
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let schema: Self = bincode::deserialize(data).map_err(Error::Serialization)?;

        // Rebuild the skipped name index
        let mut schema = schema;
        schema.field_indices.clear();
        for (i, field) in schema.fields.iter().enumerate() {
            schema.field_indices.insert(field.name.clone(), i);
        }

        Ok(schema)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Schema: {} fields", self.fields.len())?;
        for field in &self.fields {
            writeln!(f, "  {field}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_lookup_and_projection() {
        let schema = Schema::new(vec![
            Field::new("a", DataType::Int64, false),
            Field::new("b", DataType::String, true),
            Field::new("c", DataType::Float32, true),
        ]);

        assert_eq!(schema.index_of("b").unwrap(), 1);
        assert!(schema.index_of("missing").is_err());

        let projected = schema.project(&[2, 0]).unwrap();
        assert_eq!(projected.field(0).name(), "c");
        assert_eq!(projected.field(1).name(), "a");
    }

    #[test]
    fn schema_binary_round_trip() {
        let schema = Schema::new(vec![
            Field::new("x", DataType::UInt32, false),
            Field::new(
                "nested",
                DataType::Struct(vec![Field::new("y", DataType::Boolean, true)]),
                true,
            ),
        ]);

        let bytes = schema.serialize().unwrap();
        let restored = Schema::deserialize(&bytes).unwrap();
        assert_eq!(schema, restored);
        assert_eq!(restored.index_of("nested").unwrap(), 1);
    }

    #[test]
    fn bit_width_constructors() {
        assert_eq!(DataType::signed_integer(16).unwrap(), DataType::Int16);
        assert_eq!(DataType::float(32).unwrap(), DataType::Float32);
        assert!(DataType::signed_integer(12).is_err());
    }
}
