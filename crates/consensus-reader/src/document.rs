use std::io::{BufRead, BufReader, Read};

use chrono::NaiveDateTime;
use rustc_hash::FxHashSet;
use tracing::warn;

use crate::{
    error::{ReadError, Result},
    snapshot::{Entry, Snapshot},
};

/// File names start with `YYYY-MM-DD-HH-MM-SS`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";
pub const TIMESTAMP_LEN: usize = "YYYY-MM-DD-HH-MM-SS".len();

pub const DEFAULT_AUX_MARKER: &str = "/micro/";

/// What to do with `r`/`m` lines that have too few fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedPolicy {
    #[default]
    Fail,
    /// Drop the short line and the relay it belongs to.
    Skip,
}

#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub malformed: MalformedPolicy,
    /// Entries whose path contains this are auxiliary descriptors.
    pub aux_marker: String,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            malformed: MalformedPolicy::Fail,
            aux_marker: DEFAULT_AUX_MARKER.to_string(),
        }
    }
}

/// Parses the timestamp prefix of an entry's base file name.
pub fn parse_snapshot_time(entry: &str) -> Result<NaiveDateTime> {
    let base = entry.rsplit('/').next().unwrap_or(entry);
    let invalid = || ReadError::InvalidTimestamp {
        entry: entry.to_string(),
        value: base.chars().take(TIMESTAMP_LEN).collect(),
    };
    let prefix = base.get(..TIMESTAMP_LEN).ok_or_else(invalid)?;
    NaiveDateTime::parse_from_str(prefix, TIMESTAMP_FORMAT).map_err(|_| invalid())
}

/// Streams one consensus document line by line into a [`Snapshot`].
///
/// An `r` line opens a relay (identity in field 2) and the `m` line that
/// follows supplies its hash (field 1). Identities and hashes must stay in
/// lockstep and identities must be unique.
pub fn parse_document<R: Read>(
    entry: &str,
    byte_size: u64,
    reader: R,
    options: &ParseOptions,
) -> Result<Snapshot> {
    let time = parse_snapshot_time(entry)?;
    let mut reader = BufReader::new(reader);

    let mut identities: Vec<String> = Vec::new();
    let mut digests: Vec<String> = Vec::new();
    let mut seen: FxHashSet<String> = FxHashSet::default();
    // set when a short `r` line was skipped and its `m` line must go too
    let mut orphaned = false;
    let mut skipped = 0u64;

    let mut raw = Vec::with_capacity(256);
    loop {
        raw.clear();
        if reader.read_until(b'\n', &mut raw)? == 0 {
            break;
        }
        let line = trim_eol(&raw);
        let is_identity = line.starts_with(b"r ");
        if !is_identity && !line.starts_with(b"m ") {
            continue;
        }
        let text = String::from_utf8_lossy(line);
        let fields: Vec<&str> = text.split_ascii_whitespace().collect();

        if is_identity {
            if fields.len() < 3 {
                if options.malformed == MalformedPolicy::Skip {
                    orphaned = true;
                    skipped += 1;
                    continue;
                }
                return Err(ReadError::MissingIdentity {
                    entry: entry.to_string(),
                    line: text.into_owned(),
                });
            }
            orphaned = false;
            let identity = fields[2].to_string();
            if !seen.insert(identity.clone()) {
                return Err(ReadError::DuplicateIdentity {
                    entry: entry.to_string(),
                    identity,
                });
            }
            identities.push(identity);
            continue;
        }

        if orphaned {
            orphaned = false;
            continue;
        }
        if fields.len() < 2 {
            if options.malformed == MalformedPolicy::Skip && identities.len() == digests.len() + 1
            {
                if let Some(identity) = identities.pop() {
                    seen.remove(&identity);
                }
                skipped += 1;
                continue;
            }
            return Err(ReadError::MissingDigest {
                entry: entry.to_string(),
                line: text.into_owned(),
            });
        }
        digests.push(fields[1].to_string());
        if identities.len() != digests.len() {
            return Err(mismatch(entry, &identities, &digests));
        }
    }

    if identities.len() != digests.len() {
        return Err(mismatch(entry, &identities, &digests));
    }
    if skipped > 0 {
        warn!(entry, skipped, "skipped malformed relay lines");
    }

    let entries = identities
        .into_iter()
        .zip(digests)
        .map(|(identity, digest)| Entry { identity, digest })
        .collect();
    Ok(Snapshot {
        time,
        entries,
        byte_size,
    })
}

fn mismatch(entry: &str, identities: &[String], digests: &[String]) -> ReadError {
    ReadError::DigestMismatch {
        entry: entry.to_string(),
        identities: identities.len(),
        digests: digests.len(),
    }
}

#[inline]
fn trim_eol(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
