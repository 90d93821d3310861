//! Sequential tar stream extraction.
//!
//! Shared by the gzip- and xz-wrapped tar formats: the factory hands over a
//! readable stream of tar blocks and this module walks its headers in order.
//!
//! The tar crate only exposes a borrowing entries iterator, so the walk runs
//! on a dedicated thread feeding a bounded channel. The channel capacity
//! keeps read-ahead to a single entry, so memory stays bounded by the
//! largest member rather than the whole archive.

use std::io::Read;
use std::sync::mpsc::{Receiver, SyncSender};

use super::{EntryError, ExtractedEntry};

/// Pull-based reader over a sequential tar stream.
pub struct SequentialEntryReader {
    rx: Receiver<Result<ExtractedEntry, EntryError>>,
}

impl SequentialEntryReader {
    /// Start walking `stream` in the background.
    pub fn spawn(stream: Box<dyn Read + Send>) -> Self {
        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        std::thread::spawn(move || walk_entries(stream, tx));
        Self { rx }
    }

    pub(super) fn next_entry(&mut self) -> Option<Result<ExtractedEntry, EntryError>> {
        // A closed channel means the walker finished or bailed out; either
        // way the traversal is over.
        self.rx.recv().ok()
    }
}

fn walk_entries(stream: Box<dyn Read + Send>, tx: SyncSender<Result<ExtractedEntry, EntryError>>) {
    let mut archive = tar::Archive::new(stream);
    let entries = match archive.entries() {
        Ok(entries) => entries,
        Err(e) => {
            let _ = tx.send(Err(EntryError::Corrupt(e.to_string())));
            return;
        }
    };

    for entry in entries {
        let mut entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                // Tar cannot resynchronize past a bad header block.
                let _ = tx.send(Err(EntryError::Corrupt(e.to_string())));
                return;
            }
        };

        let name = match entry.path() {
            Ok(path) => path.to_string_lossy().into_owned(),
            Err(e) => {
                if tx
                    .send(Err(EntryError::Read {
                        name: "<invalid path>".to_string(),
                        message: e.to_string(),
                    }))
                    .is_err()
                {
                    return;
                }
                continue;
            }
        };

        let entry_type = entry.header().entry_type();
        let item = if entry_type.is_dir() {
            Ok(ExtractedEntry::directory(name))
        } else if entry_type.is_file() {
            let mut content = Vec::new();
            match entry.read_to_end(&mut content) {
                Ok(_) => Ok(ExtractedEntry::file(name, content)),
                Err(e) => Err(EntryError::Read {
                    name,
                    message: e.to_string(),
                }),
            }
        } else {
            // Symlinks, devices, fifos and the like carry no payload here.
            Err(EntryError::UnsupportedType {
                name,
                kind: format!("{:?}", entry_type),
            })
        };

        if tx.send(item).is_err() {
            // Consumer dropped the reader mid-traversal.
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};

    struct Member<'a> {
        name: &'a str,
        kind: tar::EntryType,
        content: &'a [u8],
    }

    fn build_tar(members: &[Member<'_>]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for member in members {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(member.kind);
            header.set_size(member.content.len() as u64);
            header.set_mode(0o644);
            if member.kind == tar::EntryType::Symlink {
                header.set_link_name("elsewhere").unwrap();
            }
            header.set_cksum();
            builder
                .append_data(&mut header, member.name, member.content)
                .unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    fn reader_over(bytes: Vec<u8>) -> SequentialEntryReader {
        SequentialEntryReader::spawn(Box::new(Cursor::new(bytes)))
    }

    #[test]
    fn test_walks_files_and_directories_in_order() {
        let tar_bytes = build_tar(&[
            Member {
                name: "a.txt",
                kind: tar::EntryType::Regular,
                content: b"first",
            },
            Member {
                name: "sub/",
                kind: tar::EntryType::Directory,
                content: b"",
            },
            Member {
                name: "sub/b.txt",
                kind: tar::EntryType::Regular,
                content: b"second",
            },
        ]);

        let mut reader = reader_over(tar_bytes);

        let first = reader.next_entry().unwrap().unwrap();
        assert_eq!(first.name, "a.txt");
        assert_eq!(first.content, b"first");

        let dir = reader.next_entry().unwrap().unwrap();
        assert!(dir.is_dir);

        let second = reader.next_entry().unwrap().unwrap();
        assert_eq!(second.name, "sub/b.txt");
        assert_eq!(second.content, b"second");

        assert!(reader.next_entry().is_none());
    }

    #[test]
    fn test_gzip_wrapped_stream() {
        let tar_bytes = build_tar(&[Member {
            name: "data.bin",
            kind: tar::EntryType::Regular,
            content: &[0u8, 1, 2, 3, 255],
        }]);
        let gz = gzip(&tar_bytes);

        let mut reader = SequentialEntryReader::spawn(Box::new(flate2::read::GzDecoder::new(
            Cursor::new(gz),
        )));
        let entry = reader.next_entry().unwrap().unwrap();
        assert_eq!(entry.name, "data.bin");
        assert_eq!(entry.content, &[0u8, 1, 2, 3, 255]);
        assert!(reader.next_entry().is_none());
    }

    #[test]
    fn test_symlink_is_skippable_not_fatal() {
        let tar_bytes = build_tar(&[
            Member {
                name: "link",
                kind: tar::EntryType::Symlink,
                content: b"",
            },
            Member {
                name: "after.txt",
                kind: tar::EntryType::Regular,
                content: b"still here",
            },
        ]);

        let mut reader = reader_over(tar_bytes);

        let err = reader.next_entry().unwrap().unwrap_err();
        assert!(matches!(err, EntryError::UnsupportedType { .. }));
        assert!(!err.is_fatal());

        let entry = reader.next_entry().unwrap().unwrap();
        assert_eq!(entry.name, "after.txt");
    }

    #[test]
    fn test_corrupt_stream_terminates_with_fatal_error() {
        // Valid-looking first header block followed by garbage.
        let mut bytes = build_tar(&[Member {
            name: "ok.txt",
            kind: tar::EntryType::Regular,
            content: b"fine",
        }]);
        bytes.truncate(1024);
        bytes.extend_from_slice(&[0xffu8; 512]);

        let mut reader = reader_over(bytes);
        let first = reader.next_entry().unwrap().unwrap();
        assert_eq!(first.name, "ok.txt");

        let err = reader.next_entry().unwrap().unwrap_err();
        assert!(err.is_fatal());
        assert!(reader.next_entry().is_none());
    }

    #[test]
    fn test_empty_stream_yields_nothing() {
        let mut reader = reader_over(build_tar(&[]));
        assert!(reader.next_entry().is_none());
    }
}
