use std::{
    fs::File,
    io::{self, BufReader, Read},
    path::Path,
    process::{Child, ChildStdout, Command, Stdio},
};

use tracing::debug;

use crate::error::{ReadError, Result};

const FILE_BUF: usize = 8 << 20;

/// Opens an archive on disk and yields its decompressed bytes.
pub trait Decompressor: Send + Sync {
    fn name(&self) -> &str;
    fn open(&self, path: &Path) -> Result<Box<dyn Read>>;
}

/// Compression formats recognised from the archive file suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Xz,
    Bzip2,
    Gzip,
    Zstd,
    None,
}

impl Compression {
    /// Maps the last path extension to a format; unknown suffixes yield `None`.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "xz" => Some(Compression::Xz),
            "bz2" => Some(Compression::Bzip2),
            "gz" => Some(Compression::Gzip),
            "zst" => Some(Compression::Zstd),
            "tar" => Some(Compression::None),
            _ => None,
        }
    }

    pub fn decompressor(self) -> Box<dyn Decompressor> {
        match self {
            Compression::Xz => Box::new(CommandDecompressor::new("xzcat")),
            Compression::Bzip2 => Box::new(CommandDecompressor::new("bzcat")),
            Compression::Gzip => Box::new(CommandDecompressor::new("zcat")),
            Compression::Zstd => Box::new(ZstdDecompressor),
            Compression::None => Box::new(PlainDecompressor),
        }
    }
}

/// Resolves the decompressor for `path`, or `None` for an unsupported suffix.
pub fn for_path(path: &Path) -> Option<Box<dyn Decompressor>> {
    Compression::from_path(path).map(Compression::decompressor)
}

/// Pipes the archive through an external `*cat` tool.
#[derive(Debug, Clone)]
pub struct CommandDecompressor {
    program: String,
}

impl CommandDecompressor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Decompressor for CommandDecompressor {
    fn name(&self) -> &str {
        &self.program
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Read>> {
        let mut child = Command::new(&self.program)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| ReadError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ReadError::Tar(format!("{} has no stdout", self.program)))?;
        debug!(program = %self.program, path = %path.display(), "spawned decompressor");

        Ok(Box::new(ChildReader {
            program: self.program.clone(),
            child,
            stdout: BufReader::with_capacity(FILE_BUF, stdout),
            finished: false,
        }))
    }
}

/// Reads a child's stdout and checks its exit status once the stream ends.
///
/// A non-zero status surfaces as a read error instead of a short stream.
struct ChildReader {
    program: String,
    child: Child,
    stdout: BufReader<ChildStdout>,
    finished: bool,
}

impl ChildReader {
    fn finish(&mut self) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        let status = self.child.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(ReadError::Decompress {
                program: self.program.clone(),
                status,
            }))
        }
    }
}

impl Read for ChildReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.stdout.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.finish()?;
        }
        Ok(n)
    }
}

impl Drop for ChildReader {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// In-process zstd decoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZstdDecompressor;

impl Decompressor for ZstdDecompressor {
    fn name(&self) -> &str {
        "zstd"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Read>> {
        let file = open_file(path)?;
        let zstd = zstd::Decoder::with_buffer(BufReader::with_capacity(FILE_BUF, file))
            .map_err(|e| ReadError::Tar(format!("zstd decoder init failed: {e}")))?;
        Ok(Box::new(zstd))
    }
}

/// Uncompressed `.tar` archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainDecompressor;

impl Decompressor for PlainDecompressor {
    fn name(&self) -> &str {
        "plain"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Read>> {
        let file = open_file(path)?;
        Ok(Box::new(BufReader::with_capacity(FILE_BUF, file)))
    }
}

fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        ReadError::Io(io::Error::new(
            e.kind(),
            format!("open {}: {e}", path.display()),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_compression_from_suffix() {
        let cases = [
            ("consensuses-2014-01.tar.xz", Some(Compression::Xz)),
            ("consensuses-2014-01.tar.bz2", Some(Compression::Bzip2)),
            ("consensuses-2014-01.tar.gz", Some(Compression::Gzip)),
            ("consensuses-2014-01.tar.zst", Some(Compression::Zstd)),
            ("consensuses-2014-01.tar", Some(Compression::None)),
            ("consensuses-2014-01.tar.lz4", None),
            ("consensuses", None),
        ];
        for (name, want) in cases {
            assert_eq!(Compression::from_path(Path::new(name)), want, "{name}");
        }
    }

    #[test]
    fn test_command_names() {
        assert_eq!(Compression::Xz.decompressor().name(), "xzcat");
        assert_eq!(Compression::Bzip2.decompressor().name(), "bzcat");
        assert_eq!(Compression::Gzip.decompressor().name(), "zcat");
    }

    #[test]
    fn test_zstd_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.tar.zst");
        let payload = b"hello consensus".repeat(100);
        let encoded = zstd::encode_all(&payload[..], 3).unwrap();
        File::create(&path).unwrap().write_all(&encoded).unwrap();

        let mut out = Vec::new();
        for_path(&path)
            .unwrap()
            .open(&path)
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let dec = CommandDecompressor::new("definitely-not-a-real-decompressor");
        let err = dec.open(Path::new("x.tar.xz")).err().unwrap();
        assert!(matches!(err, ReadError::Spawn { .. }), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_program_surfaces_exit_status() {
        // `false` ignores its argument, prints nothing and exits 1.
        let dec = CommandDecompressor::new("false");
        let mut reader = dec.open(Path::new("x.tar.xz")).unwrap();
        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).unwrap_err();
        let err = ReadError::from(err);
        assert!(matches!(err, ReadError::Decompress { .. }), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_program_streams_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.txt");
        File::create(&path).unwrap().write_all(b"abc").unwrap();

        let mut reader = CommandDecompressor::new("cat").open(&path).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abc");
    }
}
