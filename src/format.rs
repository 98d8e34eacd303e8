//! Sequence file format detection.
//!
//! Experiments may be given as FASTA or FASTQ, optionally gzip-compressed.
//! The format is taken from the file content rather than its name: a FASTQ
//! file starts with `@`, a FASTA file with `>`. Compression is taken from the
//! `.gz` extension.

use std::ffi::OsStr;
use std::path::Path;

/// Sequence file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceFormat {
    /// FASTA format (`>` header lines).
    Fasta,
    /// FASTQ format (`@` header lines).
    Fastq,
}

impl SequenceFormat {
    /// Detects the format from the first non-blank byte of a file.
    ///
    /// # Examples
    ///
    /// ```
    /// use kiq::format::SequenceFormat;
    ///
    /// assert_eq!(SequenceFormat::detect(b'@'), Some(SequenceFormat::Fastq));
    /// assert_eq!(SequenceFormat::detect(b'>'), Some(SequenceFormat::Fasta));
    /// assert_eq!(SequenceFormat::detect(b'A'), None);
    /// ```
    #[must_use]
    pub const fn detect(first: u8) -> Option<Self> {
        match first {
            b'@' => Some(Self::Fastq),
            b'>' => Some(Self::Fasta),
            _ => None,
        }
    }
}

impl std::fmt::Display for SequenceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fasta => write!(f, "fasta"),
            Self::Fastq => write!(f, "fastq"),
        }
    }
}

/// Returns `true` if `path` has a `.gz` extension (case-insensitive).
pub fn is_gzip_path(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}
