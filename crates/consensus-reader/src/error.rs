use std::{io, process::ExitStatus};

use thiserror::Error;

/// Errors raised while reading consensus archives.
///
/// Every format variant carries the archive entry it was found in. None of
/// them are recoverable: a run that hits one must stop.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("io error: {0}")]
    Io(io::Error),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {status}")]
    Decompress { program: String, status: ExitStatus },

    #[error("invalid tar stream: {0}")]
    Tar(String),

    #[error("{entry}: invalid timestamp {value:?} (expected YYYY-MM-DD-HH-MM-SS)")]
    InvalidTimestamp { entry: String, value: String },

    #[error("{entry}: missing identity in {line:?}")]
    MissingIdentity { entry: String, line: String },

    #[error("{entry}: missing hash in {line:?}")]
    MissingDigest { entry: String, line: String },

    #[error("{entry}: {identities} identities but {digests} hashes")]
    DigestMismatch {
        entry: String,
        identities: usize,
        digests: usize,
    },

    #[error("{entry}: duplicate identity {identity}")]
    DuplicateIdentity { entry: String, identity: String },
}

pub type Result<T> = std::result::Result<T, ReadError>;

impl From<io::Error> for ReadError {
    // Decompressor readers tunnel their own failures through io::Error.
    fn from(e: io::Error) -> Self {
        if !e.get_ref().is_some_and(|inner| inner.is::<ReadError>()) {
            return ReadError::Io(e);
        }
        let kind = e.kind();
        match e.into_inner().map(|inner| inner.downcast::<ReadError>()) {
            Some(Ok(err)) => *err,
            Some(Err(other)) => ReadError::Io(io::Error::new(kind, other)),
            None => ReadError::Io(io::Error::from(kind)),
        }
    }
}
