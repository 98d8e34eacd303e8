//! Error types for kiq.
//!
//! Every fallible operation in the library returns [`KiqError`]. Variants are
//! grouped into an [`ErrorClass`] so callers can tell bad input apart from a
//! corrupt or truncated database without matching on every variant.

use std::path::PathBuf;
use thiserror::Error;

use crate::kmer::K;

/// Broad classification of a [`KiqError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad arguments, unreadable input files, malformed queries or reads.
    InputValidation,
    /// A database or index file that violates its layout.
    Format,
    /// A database or index file that ends before its layout does.
    Truncation,
    /// Failure writing a database or index file.
    Io,
}

/// Errors that can occur in kiq operations.
#[derive(Debug, Error)]
pub enum KiqError {
    /// A query k-mer does not have exactly `K` bases.
    #[error("query k-mer '{query}' has length {length}, expected {}", K)]
    InvalidQueryLength { query: String, length: usize },

    /// An argument or configuration value is out of range.
    #[error("invalid argument: {details}")]
    InvalidArgument { details: String },

    /// Failed to open or read an input file (sequences, sample list, k-mer list).
    #[error("failed to read input file '{path}': {source}")]
    InputRead {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to parse a sequence record.
    #[error("failed to parse sequence file '{path}': {details}")]
    SequenceParse { details: String, path: PathBuf },

    /// Failed to open or read a database file.
    #[error("failed to read database file '{path}': {source}")]
    DatabaseRead {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to write a database file.
    #[error("failed to write database file '{path}': {source}")]
    DatabaseWrite {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to open or read an index file.
    #[error("failed to read index file '{path}': {source}")]
    IndexRead {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to write an index file.
    #[error("failed to write index file '{path}': {source}")]
    IndexWrite {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// The file ended before the layout was complete.
    #[error("truncated file '{path}': unexpected end of data while reading {section}")]
    Truncated { section: &'static str, path: PathBuf },

    /// The file content violates the layout.
    #[error("corrupt file '{path}': {details}")]
    Format { details: String, path: PathBuf },

    /// The database was written for a different k-mer index.
    #[error(
        "mismatching number of k-mers in '{path}': database has {found}, index has {expected}"
    )]
    KmerCountMismatch {
        expected: u64,
        found: u64,
        path: PathBuf,
    },

    /// Failed to write command output.
    #[error("failed to write output: {source}")]
    WriteError {
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize JSON output.
    #[error("failed to serialize JSON: {source}")]
    JsonError {
        #[source]
        source: serde_json::Error,
    },
}

impl KiqError {
    /// Returns the broad class of this error.
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidQueryLength { .. }
            | Self::InvalidArgument { .. }
            | Self::InputRead { .. }
            | Self::SequenceParse { .. }
            | Self::DatabaseRead { .. }
            | Self::IndexRead { .. } => ErrorClass::InputValidation,
            Self::Format { .. } | Self::KmerCountMismatch { .. } => ErrorClass::Format,
            Self::Truncated { .. } => ErrorClass::Truncation,
            Self::DatabaseWrite { .. }
            | Self::IndexWrite { .. }
            | Self::WriteError { .. }
            | Self::JsonError { .. } => ErrorClass::Io,
        }
    }

    pub(crate) fn format(details: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Format {
            details: details.into(),
            path: path.into(),
        }
    }
}

impl From<std::io::Error> for KiqError {
    fn from(source: std::io::Error) -> Self {
        Self::WriteError { source }
    }
}

impl From<serde_json::Error> for KiqError {
    fn from(source: serde_json::Error) -> Self {
        Self::JsonError { source }
    }
}
