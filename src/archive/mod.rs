//! Archive decoding behind one uniform entry-iteration contract.
//!
//! A downloaded archive is classified by file-name suffix ([`format`]),
//! opened into an [`ArchiveHandle`] matching its format, and drained as a
//! lazy sequence of [`ExtractedEntry`] values regardless of whether the
//! underlying container is random-access (ZIP), sequential (tar, RAR), or a
//! bare uncompressed file.
//!
//! Each handle supports exactly one traversal. Per-entry failures are
//! surfaced as non-fatal [`EntryError`] items so callers can skip them;
//! formats that cannot resynchronize after a bad record end the stream with
//! a fatal error instead.

pub mod format;
mod rar;
mod tar;
mod zip;

pub use format::{classify, file_name_from_url, ArchiveName, FormatTag};
pub use rar::RarEntryReader;
pub use tar::SequentialEntryReader;
pub use zip::ZipEntryReader;

use std::io::{Cursor, Read};

use tracing::debug;

/// Gzip magic bytes (RFC 1952).
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Xz stream magic bytes.
const XZ_MAGIC: [u8; 6] = [0xfd, b'7', b'z', b'X', b'Z', 0x00];

/// One member record pulled out of an archive.
///
/// Ephemeral: constructed per iteration step and handed off immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEntry {
    /// Path of the member inside the archive.
    pub name: String,
    /// Directory markers carry no content and are skipped by the dispatcher.
    pub is_dir: bool,
    /// Full member content; empty for directories.
    pub content: Vec<u8>,
}

impl ExtractedEntry {
    fn directory(name: String) -> Self {
        Self {
            name,
            is_dir: true,
            content: Vec::new(),
        }
    }

    fn file(name: String, content: Vec<u8>) -> Self {
        Self {
            name,
            is_dir: false,
            content,
        }
    }
}

/// Failure while producing one entry from an open archive.
#[derive(Debug, thiserror::Error)]
pub enum EntryError {
    /// The entry's content could not be copied out; the stream continues.
    #[error("failed to read entry '{name}': {message}")]
    Read { name: String, message: String },

    /// The entry is not a regular file or directory (symlink, device, ...);
    /// logged and skipped.
    #[error("unsupported entry type {kind} for '{name}'")]
    UnsupportedType { name: String, kind: String },

    /// The stream is corrupted past the point of resynchronization; no
    /// further entries will be produced.
    #[error("archive stream corrupted: {0}")]
    Corrupt(String),
}

impl EntryError {
    /// Fatal errors terminate the traversal; the rest are skippable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EntryError::Corrupt(_))
    }
}

/// Failure constructing a decoder over the downloaded bytes.
///
/// Either the container directory/headers cannot be parsed, or the outer
/// compression layer cannot be decoded. Both abort the run before any
/// entry is dispatched.
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("malformed archive: {0}")]
    Malformed(String),

    #[error("decompression failed: {0}")]
    Decompression(String),
}

/// Decoder state for one archive, tagged by format.
///
/// Exactly one variant is populated per run, matching the [`FormatTag`] the
/// classifier produced. Iterating the handle yields every member record once.
pub enum ArchiveHandle {
    Zip(ZipEntryReader),
    Tar(SequentialEntryReader),
    Rar(RarEntryReader),
    Raw(RawEntryReader),
}

impl std::fmt::Debug for ArchiveHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveHandle::Zip(_) => f.write_str("ArchiveHandle::Zip"),
            ArchiveHandle::Tar(_) => f.write_str("ArchiveHandle::Tar"),
            ArchiveHandle::Rar(_) => f.write_str("ArchiveHandle::Rar"),
            ArchiveHandle::Raw(_) => f.write_str("ArchiveHandle::Raw"),
        }
    }
}

/// Construct the decoder matching `tag` over the downloaded bytes.
///
/// `file_name` is the trailing URL segment; the raw fallback uses it as the
/// single entry's name.
pub fn open(bytes: Vec<u8>, tag: FormatTag, file_name: &str) -> Result<ArchiveHandle, OpenError> {
    debug!("opening {} byte archive as {}", bytes.len(), tag);
    match tag {
        FormatTag::Zip => {
            let reader =
                ZipEntryReader::new(bytes).map_err(|e| OpenError::Malformed(e.to_string()))?;
            Ok(ArchiveHandle::Zip(reader))
        }
        FormatTag::TarGz => {
            if !bytes.starts_with(&GZIP_MAGIC) {
                return Err(OpenError::Decompression("invalid gzip header".into()));
            }
            let stream = flate2::read::GzDecoder::new(Cursor::new(bytes));
            Ok(ArchiveHandle::Tar(SequentialEntryReader::spawn(Box::new(
                stream,
            ))))
        }
        FormatTag::Rar => {
            let reader =
                RarEntryReader::new(&bytes).map_err(|e| OpenError::Decompression(e.to_string()))?;
            Ok(ArchiveHandle::Rar(reader))
        }
        FormatTag::TarXz => {
            if !bytes.starts_with(&XZ_MAGIC) {
                return Err(OpenError::Decompression("invalid xz header".into()));
            }
            // Decompress the xz layer up front, then walk the inner tar the
            // same way as the gzip case.
            let mut decompressed = Vec::new();
            xz2::read::XzDecoder::new(Cursor::new(bytes))
                .read_to_end(&mut decompressed)
                .map_err(|e| OpenError::Decompression(e.to_string()))?;
            Ok(ArchiveHandle::Tar(SequentialEntryReader::spawn(Box::new(
                Cursor::new(decompressed),
            ))))
        }
        FormatTag::Raw => Ok(ArchiveHandle::Raw(RawEntryReader::new(
            file_name.to_string(),
            bytes,
        ))),
    }
}

impl Iterator for ArchiveHandle {
    type Item = Result<ExtractedEntry, EntryError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            ArchiveHandle::Zip(r) => r.next_entry(),
            ArchiveHandle::Tar(r) => r.next_entry(),
            ArchiveHandle::Rar(r) => r.next_entry(),
            ArchiveHandle::Raw(r) => r.next_entry(),
        }
    }
}

/// Pass-through reader for unclassified payloads: yields the whole buffer as
/// one file entry, then terminates.
pub struct RawEntryReader {
    entry: Option<ExtractedEntry>,
}

impl RawEntryReader {
    fn new(name: String, bytes: Vec<u8>) -> Self {
        Self {
            entry: Some(ExtractedEntry::file(name, bytes)),
        }
    }

    fn next_entry(&mut self) -> Option<Result<ExtractedEntry, EntryError>> {
        self.entry.take().map(Ok)
    }
}
