use std::io::{self, Read};

use crate::error::{ReadError, Result};

pub const BLOCK_LEN: usize = 512;

const NAME: std::ops::Range<usize> = 0..100;
const SIZE: std::ops::Range<usize> = 124..136;
const CHECKSUM: std::ops::Range<usize> = 148..156;
const TYPEFLAG: usize = 156;
const MAGIC: std::ops::Range<usize> = 257..263;
const PREFIX: std::ops::Range<usize> = 345..500;

/// Upper bound for GNU long-name and pax payloads held in memory.
const MAX_META_LEN: u64 = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    Regular,
    Directory,
    Symlink,
    Other(u8),
}

impl EntryType {
    fn from_flag(flag: u8) -> Self {
        match flag {
            b'0' | 0 | b'7' => EntryType::Regular,
            b'5' => EntryType::Directory,
            b'2' => EntryType::Symlink,
            other => EntryType::Other(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    pub path: String,
    pub size: u64,
    pub entry_type: EntryType,
}

impl EntryHeader {
    #[inline]
    pub fn is_regular(&self) -> bool {
        self.entry_type == EntryType::Regular
    }
}

/// Incremental tar reader over a decompressed byte stream.
///
/// Only the current entry is ever buffered; payload the caller leaves unread
/// is skipped when the next header is requested.
pub struct TarStream<R: Read> {
    reader: R,
    remaining: u64,
    padding: u64,
    done: bool,
}

impl<R: Read> TarStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            remaining: 0,
            padding: 0,
            done: false,
        }
    }

    /// Advances to the next entry. Returns `Ok(None)` once the archive ends,
    /// after the underlying stream has been drained to EOF.
    pub fn next_entry(&mut self) -> Result<Option<TarEntry<'_, R>>> {
        if self.done {
            return Ok(None);
        }
        self.skip_rest()?;

        let mut long_path: Option<String> = None;
        loop {
            let mut block = [0u8; BLOCK_LEN];
            if !self.read_block(&mut block)? {
                return self.finish();
            }
            if block.iter().all(|&b| b == 0) {
                return self.finish();
            }
            verify_checksum(&block)?;

            let size = parse_size(&block[SIZE])?;
            let flag = block[TYPEFLAG];
            match flag {
                // GNU long name for the following header
                b'L' => {
                    let data = self.read_meta(size)?;
                    long_path = Some(trim_nul(&data));
                    continue;
                }
                // pax extended header; only `path` is honoured
                b'x' => {
                    let data = self.read_meta(size)?;
                    if let Some(path) = pax_path(&data)? {
                        long_path = Some(path);
                    }
                    continue;
                }
                b'g' | b'K' => {
                    self.set_current(size);
                    self.skip_rest()?;
                    continue;
                }
                _ => {}
            }

            let path = match long_path.take() {
                Some(p) => p,
                None => header_path(&block),
            };
            self.set_current(size);
            return Ok(Some(TarEntry {
                header: EntryHeader {
                    path,
                    size,
                    entry_type: EntryType::from_flag(flag),
                },
                stream: self,
            }));
        }
    }

    fn set_current(&mut self, size: u64) {
        self.remaining = size;
        self.padding = padding_for(size);
    }

    fn skip_rest(&mut self) -> Result<()> {
        let want = self.remaining + self.padding;
        if want == 0 {
            return Ok(());
        }
        let skipped = io::copy(&mut (&mut self.reader).take(want), &mut io::sink())?;
        if skipped != want {
            return Err(ReadError::Tar(format!(
                "truncated entry: skipped {skipped} of {want} bytes"
            )));
        }
        self.remaining = 0;
        self.padding = 0;
        Ok(())
    }

    fn read_meta(&mut self, size: u64) -> Result<Vec<u8>> {
        if size > MAX_META_LEN {
            return Err(ReadError::Tar(format!("metadata entry too large ({size})")));
        }
        let mut data = vec![0u8; size as usize];
        self.reader.read_exact(&mut data).map_err(truncated)?;
        self.remaining = 0;
        self.padding = padding_for(size);
        self.skip_rest()?;
        Ok(data)
    }

    /// Fills one block. `Ok(false)` means a clean EOF at a block boundary.
    fn read_block(&mut self, block: &mut [u8; BLOCK_LEN]) -> Result<bool> {
        let mut filled = 0;
        while filled < BLOCK_LEN {
            let n = match self.reader.read(&mut block[filled..]) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if n == 0 {
                if filled == 0 {
                    return Ok(false);
                }
                return Err(ReadError::Tar(format!(
                    "truncated header: {filled} of {BLOCK_LEN} bytes"
                )));
            }
            filled += n;
        }
        Ok(true)
    }

    /// Drains trailing blocks so decompressor exit status gets checked.
    fn finish<T>(&mut self) -> Result<Option<T>> {
        self.done = true;
        io::copy(&mut self.reader, &mut io::sink())?;
        Ok(None)
    }
}

/// Reader over the payload of the current entry.
pub struct TarEntry<'a, R: Read> {
    header: EntryHeader,
    stream: &'a mut TarStream<R>,
}

impl<R: Read> TarEntry<'_, R> {
    #[inline]
    pub fn header(&self) -> &EntryHeader {
        &self.header
    }
}

impl<R: Read> Read for TarEntry<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let max = (buf.len() as u64).min(self.stream.remaining) as usize;
        if max == 0 {
            return Ok(0);
        }
        let n = self.stream.reader.read(&mut buf[..max])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("entry {} ended early", self.header.path),
            ));
        }
        self.stream.remaining -= n as u64;
        Ok(n)
    }
}

#[inline]
fn padding_for(size: u64) -> u64 {
    let rem = size % BLOCK_LEN as u64;
    if rem == 0 { 0 } else { BLOCK_LEN as u64 - rem }
}

fn truncated(e: io::Error) -> ReadError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        ReadError::Tar("truncated metadata entry".to_string())
    } else {
        e.into()
    }
}

fn trim_nul(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn header_path(block: &[u8; BLOCK_LEN]) -> String {
    let name = trim_nul(&block[NAME]);
    // GNU headers ("ustar  \0") keep atime/ctime where ustar has the prefix
    if &block[MAGIC] != b"ustar\0" {
        return name;
    }
    let prefix = trim_nul(&block[PREFIX]);
    if prefix.is_empty() {
        name
    } else {
        format!("{prefix}/{name}")
    }
}

/// Octal size field, or GNU base-256 when the high bit is set.
fn parse_size(field: &[u8]) -> Result<u64> {
    if field[0] & 0x80 != 0 {
        let mut v: u64 = (field[0] & 0x7f) as u64;
        for &b in &field[1..] {
            v = v
                .checked_mul(256)
                .and_then(|v| v.checked_add(b as u64))
                .ok_or_else(|| ReadError::Tar("base-256 size overflow".to_string()))?;
        }
        return Ok(v);
    }
    parse_octal(field)
}

fn parse_octal(field: &[u8]) -> Result<u64> {
    let text = std::str::from_utf8(field)
        .map_err(|_| ReadError::Tar(format!("non-ascii numeric field {field:02x?}")))?;
    let text = text.trim_matches(|c: char| c == '\0' || c == ' ');
    if text.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(text, 8).map_err(|e| ReadError::Tar(format!("bad octal {text:?}: {e}")))
}

fn verify_checksum(block: &[u8; BLOCK_LEN]) -> Result<()> {
    let stored = parse_octal(&block[CHECKSUM])?;
    let computed: u64 = block
        .iter()
        .enumerate()
        .map(|(i, &b)| if CHECKSUM.contains(&i) { b' ' as u64 } else { b as u64 })
        .sum();
    if stored != computed {
        return Err(ReadError::Tar(format!(
            "header checksum mismatch (stored {stored}, computed {computed})"
        )));
    }
    Ok(())
}

/// Extracts `path` from pax records of the form `"<len> <key>=<value>\n"`.
fn pax_path(data: &[u8]) -> Result<Option<String>> {
    let mut rest = data;
    let mut path = None;
    while !rest.is_empty() {
        let space = rest
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| ReadError::Tar("malformed pax record".to_string()))?;
        let len: usize = std::str::from_utf8(&rest[..space])
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|&l| l > space && l <= rest.len())
            .ok_or_else(|| ReadError::Tar("malformed pax record length".to_string()))?;
        let record = &rest[space + 1..len];
        let record = record.strip_suffix(b"\n").unwrap_or(record);
        if let Some(value) = record.strip_prefix(b"path=") {
            path = Some(String::from_utf8_lossy(value).into_owned());
        }
        rest = &rest[len..];
    }
    Ok(path)
}
