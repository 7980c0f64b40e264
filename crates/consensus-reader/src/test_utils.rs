//! In-memory archive builders for tests.

use crate::tar_stream::BLOCK_LEN;

/// Writes a ustar stream with just enough header fields for [`crate::TarStream`].
#[derive(Default)]
pub struct TarBuilder {
    buf: Vec<u8>,
}

impl TarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(self, path: &str, data: &[u8]) -> Self {
        self.entry(path, "", b'0', data)
    }

    /// Regular file with GNU magic and an access time where ustar keeps
    /// its prefix.
    pub fn gnu_file(self, path: &str, atime: u64, data: &[u8]) -> Self {
        self.raw_entry(path, Magic::Gnu { atime }, b'0', data)
    }

    pub fn dir(self, path: &str) -> Self {
        self.entry(path, "", b'5', b"")
    }

    pub fn symlink(self, path: &str) -> Self {
        self.entry(path, "", b'2', b"")
    }

    pub fn prefixed_file(self, prefix: &str, name: &str, data: &[u8]) -> Self {
        self.entry(name, prefix, b'0', data)
    }

    /// Regular file whose path is carried by a GNU `L` record.
    pub fn gnu_long_file(self, path: &str, data: &[u8]) -> Self {
        let mut name = path.as_bytes().to_vec();
        name.push(0);
        self.entry("././@LongLink", "", b'L', &name)
            .entry(&truncate(path), "", b'0', data)
    }

    /// Regular file whose path is carried by a pax extended header.
    pub fn pax_file(self, path: &str, data: &[u8]) -> Self {
        let body = format!(" path={path}\n");
        // the record length counts its own digits
        let mut len = body.len() + 1;
        while format!("{len}{body}").len() != len {
            len += 1;
        }
        let record = format!("{len}{body}");
        self.entry("PaxHeaders/x", "", b'x', record.as_bytes())
            .entry(&truncate(path), "", b'0', data)
    }

    /// Appends the end-of-archive marker.
    pub fn finish(mut self) -> Vec<u8> {
        self.buf.extend_from_slice(&[0u8; 2 * BLOCK_LEN]);
        self.buf
    }

    fn entry(self, name: &str, prefix: &str, flag: u8, data: &[u8]) -> Self {
        self.raw_entry(name, Magic::Ustar { prefix }, flag, data)
    }

    fn raw_entry(mut self, name: &str, magic: Magic<'_>, flag: u8, data: &[u8]) -> Self {
        let mut header = [0u8; BLOCK_LEN];
        put(&mut header[0..100], name.as_bytes());
        put(&mut header[100..108], b"0000644\0");
        put(&mut header[108..116], b"0000000\0");
        put(&mut header[116..124], b"0000000\0");
        put(&mut header[124..136], format!("{:011o}\0", data.len()).as_bytes());
        put(&mut header[136..148], b"00000000000\0");
        header[156] = flag;
        match magic {
            Magic::Ustar { prefix } => {
                put(&mut header[257..263], b"ustar\0");
                put(&mut header[263..265], b"00");
                put(&mut header[345..500], prefix.as_bytes());
            }
            Magic::Gnu { atime } => {
                put(&mut header[257..265], b"ustar  \0");
                put(&mut header[345..357], format!("{atime:011o}\0").as_bytes());
                put(&mut header[357..369], format!("{atime:011o}\0").as_bytes());
            }
        }

        header[148..156].fill(b' ');
        let sum: u32 = header.iter().map(|&b| b as u32).sum();
        put(&mut header[148..156], format!("{sum:06o}\0 ").as_bytes());

        self.buf.extend_from_slice(&header);
        self.buf.extend_from_slice(data);
        let rem = data.len() % BLOCK_LEN;
        if rem != 0 {
            self.buf.extend(std::iter::repeat_n(0u8, BLOCK_LEN - rem));
        }
        self
    }
}

enum Magic<'a> {
    Ustar { prefix: &'a str },
    Gnu { atime: u64 },
}

fn put(field: &mut [u8], value: &[u8]) {
    let n = value.len().min(field.len());
    field[..n].copy_from_slice(&value[..n]);
}

fn truncate(path: &str) -> String {
    path.chars().take(99).collect()
}

/// Builds a consensus document body with one `r`/`m` pair per `(identity, hash)`.
pub fn consensus_document(entries: &[(&str, &str)]) -> String {
    let mut doc = String::from("network-status-version 3 microdesc\nvote-status consensus\n");
    for (i, (identity, hash)) in entries.iter().enumerate() {
        doc.push_str(&format!(
            "r relay{i} {identity} 2014-01-01 00:00:00 10.0.0.{} 9001 0\n",
            i % 250
        ));
        doc.push_str("s Fast Running Valid\n");
        doc.push_str(&format!("m {hash}\n"));
    }
    doc.push_str("directory-footer\n");
    doc
}
