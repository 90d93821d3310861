//! Sequential RAR extraction via the unrar crate.
//!
//! The unrar FFI only opens archives by path, so the downloaded container
//! bytes are staged in a named temp file for the lifetime of the traversal.
//! Member contents are read straight into memory and never touch disk.

use std::io::Write;

use tempfile::NamedTempFile;
use unrar::{Archive, CursorBeforeHeader, OpenArchive, Process};

use super::{EntryError, ExtractedEntry};

/// Walks RAR headers in stream order, reading each file's bytes in place.
pub struct RarEntryReader {
    cursor: Option<OpenArchive<Process, CursorBeforeHeader>>,
    // Keeps the staged container alive until the traversal ends.
    _backing: NamedTempFile,
}

impl RarEntryReader {
    /// Stage the container bytes and open the archive for processing.
    pub fn new(bytes: &[u8]) -> anyhow::Result<Self> {
        let mut backing = NamedTempFile::new()?;
        backing.write_all(bytes)?;
        backing.flush()?;

        let cursor = Archive::new(backing.path())
            .open_for_processing()
            .map_err(|e| anyhow::anyhow!("failed to open RAR headers: {e}"))?;

        Ok(Self {
            cursor: Some(cursor),
            _backing: backing,
        })
    }

    pub(super) fn next_entry(&mut self) -> Option<Result<ExtractedEntry, EntryError>> {
        let archive = self.cursor.take()?;

        let entry = match archive.read_header() {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => return Some(Err(EntryError::Corrupt(e.to_string()))),
        };

        let header = entry.entry();
        let name = header.filename.to_string_lossy().into_owned();

        if header.is_file() {
            match entry.read() {
                Ok((content, rest)) => {
                    self.cursor = Some(rest);
                    Some(Ok(ExtractedEntry::file(name, content)))
                }
                // The cursor is consumed by a failed read; the stream cannot
                // resynchronize, so the traversal ends here.
                Err(e) => Some(Err(EntryError::Corrupt(format!(
                    "reading '{name}': {e}"
                )))),
            }
        } else {
            let is_dir = header.is_directory();
            match entry.skip() {
                Ok(rest) => {
                    self.cursor = Some(rest);
                    if is_dir {
                        Some(Ok(ExtractedEntry::directory(name)))
                    } else {
                        Some(Err(EntryError::UnsupportedType {
                            name,
                            kind: "special".to_string(),
                        }))
                    }
                }
                Err(e) => Some(Err(EntryError::Corrupt(e.to_string()))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimal RAR 4.x writer (store method only) so fixtures can be built
    // in-process like the zip and tar ones; unrar itself cannot author
    // archives.

    const MARKER: &[u8] = b"Rar!\x1a\x07\x00";

    fn crc32(data: &[u8]) -> u32 {
        let mut crc = flate2::Crc::new();
        crc.update(data);
        crc.sum()
    }

    fn block(head_type: u8, flags: u16, body: &[u8]) -> Vec<u8> {
        let size = (7 + body.len()) as u16;
        let mut header = vec![head_type];
        header.extend_from_slice(&flags.to_le_bytes());
        header.extend_from_slice(&size.to_le_bytes());
        header.extend_from_slice(body);
        let head_crc = crc32(&header) as u16;
        let mut out = head_crc.to_le_bytes().to_vec();
        out.extend_from_slice(&header);
        out
    }

    fn member(name: &str, data: &[u8], flags: u16, attr: u32) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&(data.len() as u32).to_le_bytes());
        body.extend_from_slice(&(data.len() as u32).to_le_bytes());
        body.push(3); // unix host
        body.extend_from_slice(&crc32(data).to_le_bytes());
        body.extend_from_slice(&0u32.to_le_bytes()); // dos mtime
        body.push(20); // format version 2.0
        body.push(0x30); // store
        body.extend_from_slice(&(name.len() as u16).to_le_bytes());
        body.extend_from_slice(&attr.to_le_bytes());
        body.extend_from_slice(name.as_bytes());
        let mut out = block(0x74, flags, &body);
        out.extend_from_slice(data);
        out
    }

    fn file_entry(name: &str, data: &[u8]) -> Vec<u8> {
        member(name, data, 0x8000, 0o100644)
    }

    fn dir_entry(name: &str) -> Vec<u8> {
        // Dictionary bits all set mark a directory.
        member(name, &[], 0x80e0, 0o040755)
    }

    fn archive(members: &[Vec<u8>]) -> Vec<u8> {
        let mut bytes = MARKER.to_vec();
        bytes.extend(block(0x73, 0, &[0u8; 6]));
        for member in members {
            bytes.extend_from_slice(member);
        }
        bytes.extend(block(0x7b, 0, &[]));
        bytes
    }

    #[test]
    fn test_iterates_files_and_directories() {
        let bytes = archive(&[
            dir_entry("sub"),
            file_entry("a.txt", b"one"),
            file_entry("sub/b.txt", b"two"),
        ]);
        let mut reader = RarEntryReader::new(&bytes).unwrap();

        let dir = reader.next_entry().unwrap().unwrap();
        assert_eq!(dir.name, "sub");
        assert!(dir.is_dir);
        assert!(dir.content.is_empty());

        let first = reader.next_entry().unwrap().unwrap();
        assert_eq!(first.name, "a.txt");
        assert!(!first.is_dir);
        assert_eq!(first.content, b"one");

        let second = reader.next_entry().unwrap().unwrap();
        assert_eq!(second.name, "sub/b.txt");
        assert_eq!(second.content, b"two");

        assert!(reader.next_entry().is_none());
        assert!(reader.next_entry().is_none());
    }

    #[test]
    fn test_empty_archive_yields_nothing() {
        let bytes = archive(&[]);
        let mut reader = RarEntryReader::new(&bytes).unwrap();
        assert!(reader.next_entry().is_none());
    }

    #[test]
    fn test_truncated_member_read_is_fatal() {
        let mut bytes = archive(&[file_entry("a.txt", b"payload bytes")]);
        // Cut into the stored data so the member read fails mid-stream.
        bytes.truncate(bytes.len() - 16);

        let mut reader = RarEntryReader::new(&bytes).unwrap();
        let err = reader.next_entry().unwrap().unwrap_err();
        assert!(err.is_fatal(), "truncated read must end the stream: {err}");
        assert!(matches!(err, EntryError::Corrupt(_)));

        // The cursor is gone; exhaustion, not a repeat error.
        assert!(reader.next_entry().is_none());
    }

    #[test]
    fn test_garbage_bytes_fail_to_open() {
        assert!(RarEntryReader::new(b"definitely not a rar archive").is_err());
    }

    #[test]
    fn test_empty_buffer_fails_to_open() {
        assert!(RarEntryReader::new(b"").is_err());
    }
}
