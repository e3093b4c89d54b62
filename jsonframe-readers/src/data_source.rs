//! Byte source adapter for JSON inputs
//!
//! Normalizes heterogeneous inputs (in-memory text or bytes, file paths,
//! open readers, `file://` URIs, directories, lists of inputs) into flat
//! byte buffers ready for splitting. Decompression happens here, so the
//! record splitter and tokenizer always see plain JSON text. File handles
//! are scoped to resolution and released before parsing starts.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::debug;

use crate::compression::{decompress, Compression};
use crate::error::{Error, Result};

/// An input to `read_json`, before resolution into bytes
pub enum JsonInput {
    /// Literal JSON text
    Text(String),

    /// Raw (possibly compressed) bytes
    Bytes(Vec<u8>),

    /// Local file or directory path
    Path(PathBuf),

    /// An open byte stream, consumed to its end
    Reader(Box<dyn Read + Send>),

    /// A URI; only the `file://` scheme is supported
    Uri(String),

    /// Several inputs, concatenated row-wise in order (line-delimited only)
    Multiple(Vec<JsonInput>),
}

impl std::fmt::Debug for JsonInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JsonInput::Text(s) => f.debug_tuple("Text").field(&s.len()).finish(),
            JsonInput::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            JsonInput::Path(p) => f.debug_tuple("Path").field(p).finish(),
            JsonInput::Reader(_) => f.write_str("Reader(..)"),
            JsonInput::Uri(u) => f.debug_tuple("Uri").field(u).finish(),
            JsonInput::Multiple(inputs) => f.debug_tuple("Multiple").field(inputs).finish(),
        }
    }
}

impl From<&str> for JsonInput {
    fn from(text: &str) -> Self {
        JsonInput::Text(text.to_string())
    }
}

impl From<String> for JsonInput {
    fn from(text: String) -> Self {
        JsonInput::Text(text)
    }
}

impl From<Vec<u8>> for JsonInput {
    fn from(bytes: Vec<u8>) -> Self {
        JsonInput::Bytes(bytes)
    }
}

impl From<&Path> for JsonInput {
    fn from(path: &Path) -> Self {
        JsonInput::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for JsonInput {
    fn from(path: PathBuf) -> Self {
        JsonInput::Path(path)
    }
}

/// A resolved source: one flat, decompressed byte buffer
pub struct ResolvedSource {
    /// Originating path, when the input was file-backed
    name: Option<PathBuf>,

    bytes: SourceBytes,
}

enum SourceBytes {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl ResolvedSource {
    /// The decompressed content
    pub fn bytes(&self) -> &[u8] {
        match &self.bytes {
            SourceBytes::Owned(bytes) => bytes,
            SourceBytes::Mapped(map) => map,
        }
    }

    /// Originating path, when the input was file-backed
    pub fn name(&self) -> Option<&Path> {
        self.name.as_deref()
    }
}

impl std::fmt::Debug for ResolvedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSource")
            .field("name", &self.name)
            .field("len", &self.bytes().len())
            .finish()
    }
}

/// Resolve an input into one byte buffer per leaf source
///
/// Directory and list inputs require line-delimited mode; directory entries
/// are enumerated lexicographically by file name.
pub fn resolve_input(
    input: JsonInput,
    lines: bool,
    compression: Compression,
) -> Result<Vec<ResolvedSource>> {
    let mut sources = Vec::new();
    resolve_into(input, lines, compression, &mut sources)?;
    debug!(
        sources = sources.len(),
        total_bytes = sources.iter().map(|s| s.bytes().len()).sum::<usize>(),
        "resolved JSON input"
    );
    Ok(sources)
}

fn resolve_into(
    input: JsonInput,
    lines: bool,
    compression: Compression,
    out: &mut Vec<ResolvedSource>,
) -> Result<()> {
    match input {
        JsonInput::Text(text) => {
            out.push(resolve_bytes(text.into_bytes(), compression)?);
            Ok(())
        }
        JsonInput::Bytes(bytes) => {
            out.push(resolve_bytes(bytes, compression)?);
            Ok(())
        }
        JsonInput::Reader(mut reader) => {
            let mut bytes = Vec::new();
            reader.read_to_end(&mut bytes)?;
            out.push(resolve_bytes(bytes, compression)?);
            Ok(())
        }
        JsonInput::Path(path) => resolve_path(&path, lines, compression, out),
        JsonInput::Uri(uri) => {
            if let Some(path) = uri.strip_prefix("file://") {
                resolve_path(Path::new(path), lines, compression, out)
            } else if uri.contains("://") {
                Err(Error::UnsupportedSourceKind(format!(
                    "URI scheme not supported: {uri}"
                )))
            } else {
                resolve_path(Path::new(&uri), lines, compression, out)
            }
        }
        JsonInput::Multiple(inputs) => {
            if !lines {
                return Err(Error::InvalidInputKind(
                    "Multiple sources are only valid in line-delimited mode".into(),
                ));
            }
            for input in inputs {
                resolve_into(input, lines, compression, out)?;
            }
            Ok(())
        }
    }
}

fn resolve_bytes(bytes: Vec<u8>, compression: Compression) -> Result<ResolvedSource> {
    let codec = compression.infer_from_content(&bytes);
    Ok(ResolvedSource {
        name: None,
        bytes: SourceBytes::Owned(decompress(bytes, codec)?),
    })
}

fn resolve_path(
    path: &Path,
    lines: bool,
    compression: Compression,
    out: &mut Vec<ResolvedSource>,
) -> Result<()> {
    let metadata = std::fs::metadata(path)
        .map_err(|_| Error::SourceNotFound(path.display().to_string()))?;

    if metadata.is_dir() {
        if !lines {
            return Err(Error::InvalidInputKind(
                "Directory input is only valid in line-delimited mode".into(),
            ));
        }
        let mut entries: Vec<PathBuf> = std::fs::read_dir(path)?
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|e| e.path())
            .collect();
        entries.sort_by_key(|p| p.file_name().map(std::ffi::OsStr::to_os_string));
        debug!(dir = %path.display(), files = entries.len(), "resolving directory input");
        for entry in entries {
            resolve_file(&entry, compression, out)?;
        }
        Ok(())
    } else {
        resolve_file(path, compression, out)
    }
}

fn resolve_file(
    path: &Path,
    compression: Compression,
    out: &mut Vec<ResolvedSource>,
) -> Result<()> {
    let codec = compression.infer_from_path(path);
    let file =
        File::open(path).map_err(|_| Error::SourceNotFound(path.display().to_string()))?;

    let bytes = if codec == Compression::None {
        map_file(&file)?
    } else {
        let mut raw = Vec::new();
        (&file).read_to_end(&mut raw)?;
        SourceBytes::Owned(decompress(raw, codec)?)
    };

    out.push(ResolvedSource {
        name: Some(path.to_path_buf()),
        bytes,
    });
    Ok(())
}

#[allow(unsafe_code)]
fn map_file(file: &File) -> Result<SourceBytes> {
    if file.metadata()?.len() == 0 {
        return Ok(SourceBytes::Owned(Vec::new()));
    }
    // Read-only mapping; sources are never mutated after resolution.
    let map = unsafe { Mmap::map(file)? };
    Ok(SourceBytes::Mapped(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn text_input_resolves_to_its_bytes() {
        let sources = resolve_input("[1,2]\n".into(), true, Compression::Infer).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].bytes(), b"[1,2]\n");
    }

    #[test]
    fn missing_file_is_source_not_found() {
        let err = resolve_input(
            JsonInput::Path(PathBuf::from("/no/such/file.json")),
            true,
            Compression::Infer,
        )
        .unwrap_err();
        assert!(matches!(err, Error::SourceNotFound(_)));
    }

    #[test]
    fn unknown_scheme_is_unsupported() {
        let err = resolve_input(
            JsonInput::Uri("s3://bucket/key.json".into()),
            true,
            Compression::Infer,
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnsupportedSourceKind(_)));
    }

    #[test]
    fn directory_requires_line_mode() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), "[1]\n").unwrap();

        let err = resolve_input(
            JsonInput::Path(dir.path().to_path_buf()),
            false,
            Compression::Infer,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInputKind(_)));
    }

    #[test]
    fn directory_enumerates_lexicographically() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), "[2]\n").unwrap();
        std::fs::write(dir.path().join("a.json"), "[1]\n").unwrap();
        std::fs::write(dir.path().join("c.json"), "[3]\n").unwrap();

        let sources = resolve_input(
            JsonInput::Path(dir.path().to_path_buf()),
            true,
            Compression::Infer,
        )
        .unwrap();
        let contents: Vec<&[u8]> = sources.iter().map(ResolvedSource::bytes).collect();
        assert_eq!(contents, vec![b"[1]\n", b"[2]\n", b"[3]\n"]);
    }

    #[test]
    fn file_uri_and_gzip_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json.gz");
        let mut encoder = flate2::write::GzEncoder::new(
            File::create(&path).unwrap(),
            flate2::Compression::default(),
        );
        encoder.write_all(b"[1,2,3]\n").unwrap();
        encoder.finish().unwrap();

        let uri = format!("file://{}", path.display());
        let sources = resolve_input(JsonInput::Uri(uri), true, Compression::Infer).unwrap();
        assert_eq!(sources[0].bytes(), b"[1,2,3]\n");
    }
}
