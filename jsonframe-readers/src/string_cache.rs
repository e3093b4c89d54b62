//! Dictionary encoding for category columns

use std::collections::HashMap;

use jsonframe_core::{Buffer, Column, DataType, Field};

/// A string dictionary assigning dense `u32` codes in first-seen order
#[derive(Debug, Clone, Default)]
pub struct StringDictionary {
    /// Unique values in code order
    values: Vec<String>,

    /// Value -> code lookup
    codes: HashMap<String, u32>,
}

impl StringDictionary {
    /// Create an empty dictionary
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the code for a value, inserting it if unseen
    pub fn encode(&mut self, value: &str) -> u32 {
        if let Some(&code) = self.codes.get(value) {
            return code;
        }
        let code = self.values.len() as u32;
        self.codes.insert(value.to_string(), code);
        self.values.push(value.to_string());
        code
    }

    /// Look up the value for a code
    pub fn value(&self, code: u32) -> Option<&str> {
        self.values.get(code as usize).map(String::as_str)
    }

    /// Number of distinct values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the dictionary is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Finish into a non-nullable string column holding the values
    pub fn into_column(self) -> Column {
        let mut bytes = Vec::new();
        let mut offsets: Vec<u32> = Vec::with_capacity(self.values.len() + 1);
        offsets.push(0);
        for value in &self.values {
            bytes.extend_from_slice(value.as_bytes());
            offsets.push(bytes.len() as u32);
        }
        let length = self.values.len();
        Column::new_string(
            Field::new("values", DataType::String, false),
            Buffer::from_bytes(&bytes),
            Buffer::from_slice(&offsets),
            None,
            0,
            length,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_dense_and_stable() {
        let mut dictionary = StringDictionary::new();
        assert_eq!(dictionary.encode("b"), 0);
        assert_eq!(dictionary.encode("a"), 1);
        assert_eq!(dictionary.encode("b"), 0);
        assert_eq!(dictionary.len(), 2);
        assert_eq!(dictionary.value(1), Some("a"));

        let column = dictionary.into_column();
        assert_eq!(column.str_value(0).unwrap(), Some("b"));
        assert_eq!(column.str_value(1).unwrap(), Some("a"));
    }
}
