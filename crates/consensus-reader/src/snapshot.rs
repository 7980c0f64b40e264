use chrono::NaiveDateTime;

/// One relay listed in a consensus: its identity and the hash of its
/// microdescriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub identity: String,
    pub digest: String,
}

/// A parsed consensus document.
///
/// `entries` keeps document order and holds each identity at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub time: NaiveDateTime,
    pub entries: Vec<Entry>,
    /// Uncompressed document length in bytes.
    pub byte_size: u64,
}

impl Snapshot {
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.identity.as_str())
    }

    pub fn digests(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.digest.as_str())
    }
}

/// Running count and size of auxiliary descriptor documents.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AuxDescriptorBatch {
    pub count: u64,
    pub total_bytes: u64,
}

impl AuxDescriptorBatch {
    #[inline]
    pub fn add(&mut self, bytes: u64) {
        self.count += 1;
        self.total_bytes += bytes;
    }

    /// Mean descriptor size, `None` when nothing was counted.
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.total_bytes as f64 / self.count as f64)
        }
    }
}
