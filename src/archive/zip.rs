//! Random-access ZIP extraction over an in-memory buffer.

use std::io::{Cursor, Read};

use super::{EntryError, ExtractedEntry};

/// Walks a ZIP central directory entry by entry.
///
/// The directory is parsed eagerly at construction; content is read lazily
/// per entry. A failed content read skips that entry only.
pub struct ZipEntryReader {
    archive: zip::ZipArchive<Cursor<Vec<u8>>>,
    next_index: usize,
}

impl ZipEntryReader {
    /// Parse the central directory over the full byte buffer.
    pub fn new(bytes: Vec<u8>) -> zip::result::ZipResult<Self> {
        let archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        Ok(Self {
            archive,
            next_index: 0,
        })
    }

    pub(super) fn next_entry(&mut self) -> Option<Result<ExtractedEntry, EntryError>> {
        if self.next_index >= self.archive.len() {
            return None;
        }
        let index = self.next_index;
        self.next_index += 1;

        let mut file = match self.archive.by_index(index) {
            Ok(file) => file,
            Err(e) => {
                // A bad record does not invalidate the rest of the directory.
                return Some(Err(EntryError::Read {
                    name: format!("#{index}"),
                    message: e.to_string(),
                }));
            }
        };

        let name = file.name().to_string();
        if file.is_dir() {
            return Some(Ok(ExtractedEntry::directory(name)));
        }

        let mut content = Vec::with_capacity(file.size() as usize);
        match file.read_to_end(&mut content) {
            Ok(_) => Some(Ok(ExtractedEntry::file(name, content))),
            Err(e) => Some(Err(EntryError::Read {
                name,
                message: e.to_string(),
            })),
        }
    }
}
