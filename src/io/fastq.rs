use std::fs::File;
use std::io::{self, BufReader, Read as IoRead};
use std::path::{Path, PathBuf};

use bio::io::fastq;
use thiserror::Error;

use crate::types::Read;

/// Failure while reading FASTQ input.
#[derive(Debug, Error)]
pub enum FastqError {
    /// Input file could not be opened.
    #[error("failed to open {path}: {source}")]
    Open {
        /// Requested path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Record that could not be parsed.
    #[error("malformed FASTQ record: {0}")]
    Parse(String),

    /// Record whose quality string does not match its sequence.
    #[error("FASTQ record '{name}' has {bases} bases but {qualities} qualities")]
    LengthMismatch {
        /// Record name.
        name: String,
        /// Sequence length.
        bases: usize,
        /// Quality length.
        qualities: usize,
    },
}

/// Streaming FASTQ reader yielding [`Read`]s.
///
/// Names stop at the first whitespace; bases are uppercased.
pub struct FastqReads {
    records: fastq::Records<BufReader<Box<dyn IoRead + Send>>>,
}

impl std::fmt::Debug for FastqReads {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastqReads").finish_non_exhaustive()
    }
}

impl FastqReads {
    /// Read from any byte source.
    pub fn new<R: IoRead + Send + 'static>(reader: R) -> Self {
        let boxed: Box<dyn IoRead + Send> = Box::new(reader);
        Self {
            records: fastq::Reader::new(boxed).records(),
        }
    }

    /// Open a FASTQ file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, FastqError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| FastqError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(file))
    }
}

impl Iterator for FastqReads {
    type Item = Result<Read, FastqError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(err) => return Some(Err(FastqError::Parse(err.to_string()))),
        };
        if record.seq().len() != record.qual().len() {
            return Some(Err(FastqError::LengthMismatch {
                name: record.id().to_string(),
                bases: record.seq().len(),
                qualities: record.qual().len(),
            }));
        }
        Some(Ok(Read::new(record.id(), record.seq(), record.qual())))
    }
}
