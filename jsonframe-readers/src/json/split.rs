//! Record splitter for line-delimited JSON
//!
//! Scans a byte buffer tracking quote and escape state; a newline outside a
//! string literal terminates a record. Byte-range ownership: a record belongs
//! to a range iff its first byte lies in `[offset, offset + length)`. A
//! record whose tail extends past the range end is still complete here
//! because the scan always runs over the full buffer, and a range landing
//! mid-record skips forward to the next record start.

use crate::error::{Error, Result};

/// A sub-interval of an input source
///
/// `length == 0` means "rest of the source". Ranges extending past the end
/// of the source are clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// Start offset in bytes
    pub offset: u64,

    /// Length in bytes; zero means to the end of the source
    pub length: u64,
}

impl ByteRange {
    /// Create a byte range
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }
}

/// Byte offsets of one logical JSON record within a source
///
/// Spans are trimmed of surrounding whitespace, non-overlapping, and ordered
/// by start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSpan {
    /// Start offset (inclusive)
    pub start: usize,

    /// End offset (exclusive)
    pub end: usize,
}

/// Split a buffer into record spans, honoring the byte-range contract
pub fn split_records(bytes: &[u8], byte_range: Option<ByteRange>) -> Result<Vec<RecordSpan>> {
    let (window_start, window_end) = match byte_range {
        None => (0, bytes.len()),
        Some(range) => {
            let start = (range.offset as usize).min(bytes.len());
            let end = if range.length == 0 {
                bytes.len()
            } else {
                (range.offset as usize)
                    .saturating_add(range.length as usize)
                    .min(bytes.len())
            };
            (start, end)
        }
    };

    let mut spans = Vec::new();
    let mut record_start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    let mut push_record = |start: usize, end: usize, spans: &mut Vec<RecordSpan>| {
        if start < window_start || start >= window_end {
            return;
        }
        if let Some(span) = trim_span(bytes, start, end) {
            spans.push(span);
        }
    };

    for (i, &byte) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
        } else if byte == b'"' {
            in_string = true;
        } else if byte == b'\n' {
            push_record(record_start, i, &mut spans);
            record_start = i + 1;
        }
    }

    if in_string {
        // Only a fault if the truncated record is owned by this range
        if record_start >= window_start && record_start < window_end {
            return Err(Error::TruncatedRecord {
                offset: record_start,
            });
        }
    } else if record_start < bytes.len() {
        // Final record without a trailing newline
        push_record(record_start, bytes.len(), &mut spans);
    }

    Ok(spans)
}

/// Trim whitespace from a record, returning `None` for blank records
fn trim_span(bytes: &[u8], mut start: usize, mut end: usize) -> Option<RecordSpan> {
    while start < end && bytes[start].is_ascii_whitespace() {
        start += 1;
    }
    while end > start && bytes[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    (start < end).then_some(RecordSpan { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const THREE_ROWS: &[u8] = b"[1, 2, 3]\n[4, 5, 6]\n[7, 8, 9]\n";

    fn starts(spans: &[RecordSpan]) -> Vec<usize> {
        spans.iter().map(|s| s.start).collect()
    }

    #[test]
    fn full_scan_finds_all_records() {
        let spans = split_records(THREE_ROWS, None).unwrap();
        assert_eq!(starts(&spans), vec![0, 10, 20]);
        assert_eq!(spans[0].end, 9);
    }

    // A record belongs to the range holding its first byte; length 0 means
    // the rest of the source, and over-long ranges clamp at EOF
    #[test_case(0, 15, &[0, 10] ; "keeps records starting inside")]
    #[test_case(15, 10, &[20] ; "mid record start skips to next record")]
    #[test_case(15, 0, &[20] ; "zero length reads the rest")]
    #[test_case(10, 50, &[10, 20] ; "length past eof is clamped")]
    #[test_case(9, 1, &[] ; "window holding only a newline is empty")]
    fn byte_range_ownership(offset: u64, length: u64, expected: &[usize]) {
        let spans = split_records(THREE_ROWS, Some(ByteRange::new(offset, length))).unwrap();
        assert_eq!(starts(&spans), expected);
    }

    #[test]
    fn ranges_partition_without_overlap_or_loss() {
        let head = split_records(THREE_ROWS, Some(ByteRange::new(0, 15))).unwrap();
        let tail =
            split_records(THREE_ROWS, Some(ByteRange::new(15, THREE_ROWS.len() as u64)))
                .unwrap();
        let full = split_records(THREE_ROWS, None).unwrap();
        let mut combined = head;
        combined.extend(tail);
        assert_eq!(combined, full);
    }

    #[test]
    fn newline_inside_string_does_not_split() {
        let bytes = b"{\"a\":\"x\ny\"}\n{\"a\":\"z\"}\n";
        let spans = split_records(bytes, None).unwrap();
        assert_eq!(spans.len(), 2);
    }

    #[test]
    fn escaped_quote_keeps_string_state() {
        let bytes = b"{\"a\":\"x\\\"\n\"}\n{\"a\":\"z\"}";
        let spans = split_records(bytes, None).unwrap();
        assert_eq!(spans.len(), 2);
    }

    #[test]
    fn unterminated_string_is_truncated_record() {
        let bytes = b"{\"a\":1}\n{\"a\":\"unfinished";
        let err = split_records(bytes, None).unwrap_err();
        assert!(matches!(err, Error::TruncatedRecord { offset: 8 }));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let bytes = b"[1]\n\n   \n[2]\n";
        let spans = split_records(bytes, None).unwrap();
        assert_eq!(spans.len(), 2);
    }

    #[test]
    fn empty_range_yields_no_records() {
        let spans = split_records(THREE_ROWS, Some(ByteRange::new(40, 10))).unwrap();
        assert!(spans.is_empty());
    }
}
