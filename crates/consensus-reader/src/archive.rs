use std::{io::Read, path::Path};

use tracing::debug;

use crate::{
    decompress::Decompressor,
    document::{ParseOptions, parse_document},
    error::Result,
    snapshot::Snapshot,
    tar_stream::{EntryHeader, TarStream},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Snapshot,
    AuxDescriptor,
    Ignored,
}

/// Non-regular entries are ignored; regular ones are auxiliary descriptors
/// when their path carries `aux_marker`, consensus documents otherwise.
pub fn classify(header: &EntryHeader, aux_marker: &str) -> EntryKind {
    if !header.is_regular() {
        EntryKind::Ignored
    } else if header.path.contains(aux_marker) {
        EntryKind::AuxDescriptor
    } else {
        EntryKind::Snapshot
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveItem {
    Snapshot(Snapshot),
    AuxDescriptor { path: String, bytes: u64 },
    Ignored { path: String },
}

/// Pulls classified items out of one archive, one entry at a time.
pub struct ConsensusArchive<R: Read> {
    tar: TarStream<R>,
    options: ParseOptions,
}

impl ConsensusArchive<Box<dyn Read>> {
    pub fn open(
        path: &Path,
        decompressor: &dyn Decompressor,
        options: ParseOptions,
    ) -> Result<Self> {
        debug!(path = %path.display(), decompressor = decompressor.name(), "open archive");
        let reader = decompressor.open(path)?;
        Ok(Self::new(reader, options))
    }
}

impl<R: Read> ConsensusArchive<R> {
    pub fn new(reader: R, options: ParseOptions) -> Self {
        Self {
            tar: TarStream::new(reader),
            options,
        }
    }

    pub fn next_item(&mut self) -> Result<Option<ArchiveItem>> {
        let Some(mut entry) = self.tar.next_entry()? else {
            return Ok(None);
        };
        let header = entry.header().clone();

        let item = match classify(&header, &self.options.aux_marker) {
            EntryKind::Ignored => ArchiveItem::Ignored { path: header.path },
            EntryKind::AuxDescriptor => ArchiveItem::AuxDescriptor {
                path: header.path,
                bytes: header.size,
            },
            EntryKind::Snapshot => ArchiveItem::Snapshot(parse_document(
                &header.path,
                header.size,
                &mut entry,
                &self.options,
            )?),
        };
        Ok(Some(item))
    }
}
