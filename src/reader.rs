//! Lazy sequence reading for experiment files.
//!
//! [`open_sequences`] sniffs the format of a FASTA or FASTQ file, optionally
//! gzip-compressed, and returns a [`SequenceReader`] that yields one read at
//! a time. Every character that is not an ASCII letter is removed from the
//! reads before they are handed to the counter.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use bio::io::{fasta, fastq};
use bytes::Bytes;

use crate::error::KiqError;
use crate::format::{is_gzip_path, SequenceFormat};

type Input = Box<dyn BufRead>;

enum Records {
    Fasta(fasta::Records<Input>),
    Fastq(fastq::Records<Input>),
    Empty,
}

/// Iterator over the reads of one sequence file.
pub struct SequenceReader {
    records: Records,
    path: PathBuf,
}

impl std::fmt::Debug for SequenceReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceReader")
            .field("format", &self.format())
            .field("path", &self.path)
            .finish()
    }
}

impl SequenceReader {
    /// The detected format, or `None` for an empty file.
    pub const fn format(&self) -> Option<SequenceFormat> {
        match self.records {
            Records::Fasta(_) => Some(SequenceFormat::Fasta),
            Records::Fastq(_) => Some(SequenceFormat::Fastq),
            Records::Empty => None,
        }
    }

    fn parse_error(&self, details: impl std::fmt::Display) -> KiqError {
        KiqError::SequenceParse {
            details: details.to_string(),
            path: self.path.clone(),
        }
    }
}

impl Iterator for SequenceReader {
    type Item = Result<Bytes, KiqError>;

    fn next(&mut self) -> Option<Self::Item> {
        let seq = match &mut self.records {
            Records::Fasta(records) => records
                .next()?
                .map(|record| letters_only(record.seq()))
                .map_err(|e| e.to_string()),
            Records::Fastq(records) => records
                .next()?
                .map(|record| letters_only(record.seq()))
                .map_err(|e| e.to_string()),
            Records::Empty => return None,
        };
        Some(seq.map_err(|details| self.parse_error(details)))
    }
}

fn letters_only(seq: &[u8]) -> Bytes {
    seq.iter()
        .copied()
        .filter(u8::is_ascii_alphabetic)
        .collect::<Vec<u8>>()
        .into()
}

/// Opens a sequence file for lazy reading.
///
/// Files ending in `.gz` are decompressed when the `gzip` feature is enabled.
/// An empty file yields no reads.
///
/// # Errors
///
/// Returns [`KiqError::InputRead`] if the file cannot be opened or read, and
/// [`KiqError::SequenceParse`] if it starts with neither `>` nor `@`.
pub fn open_sequences<P: AsRef<Path>>(path: P) -> Result<SequenceReader, KiqError> {
    let path = path.as_ref();
    let read_err = |source| KiqError::InputRead {
        source,
        path: path.to_path_buf(),
    };

    let file = File::open(path).map_err(read_err)?;
    let mut input = decompress(file, path);

    let first = loop {
        let (skip, first) = {
            let buf = input.fill_buf().map_err(read_err)?;
            if buf.is_empty() {
                break None;
            }
            match buf.iter().position(|b| !b.is_ascii_whitespace()) {
                Some(at) => (at, Some(buf[at])),
                None => (buf.len(), None),
            }
        };
        input.consume(skip);
        if first.is_some() {
            break first;
        }
    };

    let records = match first.map(|byte| (byte, SequenceFormat::detect(byte))) {
        None => Records::Empty,
        Some((_, Some(SequenceFormat::Fasta))) => {
            Records::Fasta(fasta::Reader::from_bufread(input).records())
        }
        Some((_, Some(SequenceFormat::Fastq))) => {
            Records::Fastq(fastq::Reader::from_bufread(input).records())
        }
        Some((byte, None)) => {
            return Err(KiqError::SequenceParse {
                details: format!(
                    "cannot detect format: file starts with {:?}, expected '>' or '@'",
                    char::from(byte)
                ),
                path: path.to_path_buf(),
            })
        }
    };

    #[cfg(feature = "tracing")]
    tracing::debug!(
        path = ?path,
        format = ?first.and_then(SequenceFormat::detect),
        "Opened sequence file"
    );

    Ok(SequenceReader {
        records,
        path: path.to_path_buf(),
    })
}

#[cfg(feature = "gzip")]
fn decompress(file: File, path: &Path) -> Input {
    if is_gzip_path(path) {
        Box::new(BufReader::new(flate2::read::MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    }
}

#[cfg(not(feature = "gzip"))]
fn decompress(file: File, path: &Path) -> Input {
    if is_gzip_path(path) {
        #[cfg(feature = "tracing")]
        tracing::warn!(path = ?path, "Built without gzip support; reading file as plain text");
    }
    Box::new(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file_with(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn reads(path: &Path) -> Vec<String> {
        open_sequences(path)
            .unwrap()
            .map(|r| String::from_utf8(r.unwrap().to_vec()).unwrap())
            .collect()
    }

    #[test]
    fn reads_fasta() {
        let file = file_with(">r1\nACGT\nTTGG\n>r2\nCCCC\n");
        assert_eq!(reads(file.path()), ["ACGTTTGG", "CCCC"]);
    }

    #[test]
    fn reads_fastq() {
        let file = file_with("@r1\nACGT\n+\nIIII\n@r2\nGGAA\n+\nIIII\n");
        let reader = open_sequences(file.path()).unwrap();
        assert_eq!(reader.format(), Some(SequenceFormat::Fastq));
        assert_eq!(reads(file.path()), ["ACGT", "GGAA"]);
    }

    #[test]
    fn strips_non_letters() {
        let file = file_with(">r1\nAC-GT.N*n\n");
        assert_eq!(reads(file.path()), ["ACGTNn"]);
    }

    #[test]
    fn leading_blank_lines_are_skipped() {
        let file = file_with("\n\n>r1\nACGT\n");
        assert_eq!(reads(file.path()), ["ACGT"]);
    }

    #[test]
    fn empty_file_has_no_reads() {
        let file = file_with("");
        assert!(reads(file.path()).is_empty());
    }

    #[test]
    fn unknown_format_is_rejected() {
        let file = file_with("ACGT\n");
        let err = open_sequences(file.path()).unwrap_err();
        assert!(matches!(err, KiqError::SequenceParse { .. }));
    }

    #[test]
    fn malformed_fastq_record_is_an_error() {
        let file = file_with("@r1\nACGT\n");
        let results: Vec<_> = open_sequences(file.path()).unwrap().collect();
        assert!(results.iter().any(Result::is_err));
    }

    #[test]
    fn missing_file_is_input_error() {
        let err = open_sequences("/nonexistent/reads.fq").unwrap_err();
        assert!(matches!(err, KiqError::InputRead { .. }));
    }
}
