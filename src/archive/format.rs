//! Archive format classification from file names.
//!
//! The format is derived from the composite extension suffix of the source
//! file name: everything after the *first* dot, so `backup.tar.gz` classifies
//! by `tar.gz`, not `gz`. The portion before the first dot doubles as the
//! destination directory for the run.

use serde::Serialize;

/// Container format of a downloaded archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FormatTag {
    /// ZIP archive with a random-access central directory.
    Zip,
    /// Gzip-compressed sequential tar stream (`.tar.gz`).
    TarGz,
    /// RAR archive, walked sequentially.
    Rar,
    /// Xz-compressed sequential tar stream (`.7z` suffix).
    TarXz,
    /// No recognized suffix; the payload is treated as a single bare file.
    Raw,
}

impl FormatTag {
    /// The composite suffix this tag is matched from, or `"raw"`.
    pub fn suffix(&self) -> &'static str {
        match self {
            FormatTag::Zip => "zip",
            FormatTag::TarGz => "tar.gz",
            FormatTag::Rar => "rar",
            FormatTag::TarXz => "7z",
            FormatTag::Raw => "raw",
        }
    }
}

impl std::fmt::Display for FormatTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.suffix())
    }
}

/// A file name split into its base and composite extension suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveName {
    /// Portion before the first dot; used as the destination directory.
    pub base: String,
    /// Remaining segments joined with `.` (empty when there is no extension).
    pub suffix: String,
}

impl ArchiveName {
    /// Split a file name on the first dot.
    pub fn parse(file_name: &str) -> Self {
        match file_name.split_once('.') {
            Some((base, suffix)) => Self {
                base: base.to_string(),
                suffix: suffix.to_string(),
            },
            None => Self {
                base: file_name.to_string(),
                suffix: String::new(),
            },
        }
    }

    /// Classify the composite suffix into a format tag.
    ///
    /// Total: any suffix outside the supported set falls back to [`FormatTag::Raw`].
    pub fn format(&self) -> FormatTag {
        match self.suffix.as_str() {
            "zip" => FormatTag::Zip,
            "tar.gz" => FormatTag::TarGz,
            "rar" => FormatTag::Rar,
            "7z" => FormatTag::TarXz,
            _ => FormatTag::Raw,
        }
    }
}

/// Classify a file name into a format tag.
pub fn classify(file_name: &str) -> FormatTag {
    ArchiveName::parse(file_name).format()
}

/// Extract the trailing path segment of a URL, with any query or fragment
/// stripped.
pub fn file_name_from_url(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}
