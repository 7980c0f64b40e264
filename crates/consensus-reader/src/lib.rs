//! Consensus archive reader
//!
//! Streams tarballs of directory consensus documents (optionally compressed),
//! classifies each entry and parses consensus documents into [`Snapshot`]s.
//! Nothing is held in memory beyond the entry being parsed.

pub mod archive;
pub mod decompress;
pub mod document;
pub mod error;
pub mod snapshot;
pub mod tar_stream;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use archive::{ArchiveItem, ConsensusArchive, EntryKind, classify};
pub use decompress::{Compression, Decompressor};
pub use document::{MalformedPolicy, ParseOptions, parse_document, parse_snapshot_time};
pub use error::{ReadError, Result};
pub use snapshot::{AuxDescriptorBatch, Entry, Snapshot};
pub use tar_stream::{EntryHeader, EntryType, TarStream};
