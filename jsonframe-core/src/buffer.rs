//! Memory buffer with typed zero-copy views
//!
//! Backing storage is a `u64` word vector, so the base pointer satisfies the
//! alignment of every fixed-width type a column can hold (max 8 bytes). Typed
//! access goes through `bytemuck` Pod casts on the byte view.

use std::fmt;

use bytemuck::Pod;

/// Immutable byte buffer with 8-byte aligned storage
#[derive(Clone, Default)]
pub struct Buffer {
    /// Word-aligned backing storage
    words: Vec<u64>,

    /// Logical length in bytes (may be shorter than the word storage)
    len: usize,
}

impl Buffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer of `len` zero bytes
    pub fn new_zeroed(len: usize) -> Self {
        Self {
            words: vec![0u64; len.div_ceil(8)],
            len,
        }
    }

    /// Create a buffer by copying raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buffer = Self::new_zeroed(bytes.len());
        buffer.byte_storage_mut()[..bytes.len()].copy_from_slice(bytes);
        buffer
    }

    /// Create a buffer by copying a typed slice
    pub fn from_slice<T: Pod>(data: &[T]) -> Self {
        Self::from_bytes(bytemuck::cast_slice(data))
    }

    /// Get the buffer contents as raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice(&self.words)[..self.len]
    }

    /// View the buffer as a typed slice
    ///
    /// # Panics
    ///
    /// Panics if the byte length is not a multiple of `size_of::<T>()`.
    pub fn typed<T: Pod>(&self) -> &[T] {
        bytemuck::cast_slice(self.as_bytes())
    }

    /// Get the length of the buffer in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read the bit at `index`, treating the buffer as a bitmap
    pub fn bit(&self, index: usize) -> bool {
        let byte = self.as_bytes()[index / 8];
        byte & (1 << (index % 8)) != 0
    }

    fn byte_storage_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.words)
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer").field("len", &self.len).finish()
    }
}

/// Growable validity bitmap used while assembling columns
///
/// Bit set means the value at that slot is valid (non-null).
#[derive(Debug, Clone, Default)]
pub struct BitmapBuilder {
    bytes: Vec<u8>,
    len: usize,
    set_count: usize,
}

impl BitmapBuilder {
    /// Create an empty bitmap builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a single bit
    pub fn push(&mut self, set: bool) {
        if self.len % 8 == 0 {
            self.bytes.push(0);
        }
        if set {
            self.bytes[self.len / 8] |= 1 << (self.len % 8);
            self.set_count += 1;
        }
        self.len += 1;
    }

    /// Number of bits appended so far
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if no bits have been appended
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of unset (null) bits
    pub fn unset_count(&self) -> usize {
        self.len - self.set_count
    }

    /// Check if every appended bit is set
    pub fn all_set(&self) -> bool {
        self.set_count == self.len
    }

    /// Finish into an immutable bitmap buffer
    pub fn finish(self) -> Buffer {
        Buffer::from_bytes(&self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_views_round_trip() {
        let values: Vec<i64> = vec![-3, 0, 7, i64::MAX];
        let buffer = Buffer::from_slice(&values);
        assert_eq!(buffer.len(), 32);
        assert_eq!(buffer.typed::<i64>(), values.as_slice());
    }

    #[test]
    fn empty_buffer_typed_view() {
        let buffer = Buffer::new();
        assert!(buffer.is_empty());
        assert_eq!(buffer.typed::<u64>().len(), 0);
    }

    #[test]
    fn bitmap_builder_tracks_nulls() {
        let mut bitmap = BitmapBuilder::new();
        for set in [true, false, true, true, false] {
            bitmap.push(set);
        }
        assert_eq!(bitmap.unset_count(), 2);
        let buffer = bitmap.finish();
        assert!(buffer.bit(0));
        assert!(!buffer.bit(1));
        assert!(buffer.bit(3));
        assert!(!buffer.bit(4));
    }
}
