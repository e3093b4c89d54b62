//! Compression codec detection and decoding
//!
//! Codec inference follows the extension mapping `.gz` -> gzip, `.bz2` ->
//! bz2, `.zip` -> zip, `.xz` -> xz, else none. For sources without a path
//! (in-memory buffers, streams) inference falls back to the gzip magic
//! bytes; the other codecs require an explicit token there.

use std::io::{Cursor, Read};
use std::path::Path;

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use xz2::read::XzDecoder;

use crate::error::{Error, Result};

/// Gzip stream magic bytes
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Compression codec for an input source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Detect from the file extension (or gzip magic for pathless input)
    #[default]
    Infer,

    /// gzip / zlib deflate stream
    Gzip,

    /// bzip2 stream
    Bz2,

    /// zip archive; the first file entry is the payload
    Zip,

    /// xz / LZMA2 stream
    Xz,

    /// No compression
    None,
}

impl Compression {
    /// Resolve `Infer` against a file path
    pub fn infer_from_path(self, path: &Path) -> Compression {
        if self != Compression::Infer {
            return self;
        }
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        match extension.as_deref() {
            Some("gz") => Compression::Gzip,
            Some("bz2") => Compression::Bz2,
            Some("zip") => Compression::Zip,
            Some("xz") => Compression::Xz,
            _ => Compression::None,
        }
    }

    /// Resolve `Infer` against raw content (magic-byte sniffing)
    pub fn infer_from_content(self, data: &[u8]) -> Compression {
        if self != Compression::Infer {
            return self;
        }
        if data.len() >= 2 && data[0..2] == GZIP_MAGIC {
            Compression::Gzip
        } else {
            Compression::None
        }
    }
}

/// Decompress `data` with the given codec
///
/// `Infer` must be resolved before calling; passing it here is an error.
pub fn decompress(data: Vec<u8>, codec: Compression) -> Result<Vec<u8>> {
    match codec {
        Compression::None => Ok(data),
        Compression::Gzip => {
            let mut out = Vec::new();
            GzDecoder::new(data.as_slice())
                .read_to_end(&mut out)
                .map_err(|e| Error::Compression(format!("gzip: {e}")))?;
            Ok(out)
        }
        Compression::Bz2 => {
            let mut out = Vec::new();
            BzDecoder::new(data.as_slice())
                .read_to_end(&mut out)
                .map_err(|e| Error::Compression(format!("bz2: {e}")))?;
            Ok(out)
        }
        Compression::Xz => {
            let mut out = Vec::new();
            XzDecoder::new(data.as_slice())
                .read_to_end(&mut out)
                .map_err(|e| Error::Compression(format!("xz: {e}")))?;
            Ok(out)
        }
        Compression::Zip => {
            let mut archive = zip::ZipArchive::new(Cursor::new(data))
                .map_err(|e| Error::Compression(format!("zip: {e}")))?;
            if archive.is_empty() {
                return Err(Error::Compression("zip: empty archive".into()));
            }
            let mut entry = archive
                .by_index(0)
                .map_err(|e| Error::Compression(format!("zip: {e}")))?;
            let mut out = Vec::new();
            entry
                .read_to_end(&mut out)
                .map_err(|e| Error::Compression(format!("zip: {e}")))?;
            Ok(out)
        }
        Compression::Infer => Err(Error::Compression(
            "Codec must be resolved before decompression".into(),
        )),
    }
}
