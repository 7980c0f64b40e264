use std::fmt;

use serde::Serialize;

pub const KB: f64 = 1024.0;
pub const MB: f64 = KB * 1024.0;
pub const GB: f64 = MB * 1024.0;

/// Byte count rendered with binary units and two decimals.
#[derive(Debug, Default, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct ByteSize(pub f64);

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        if b >= GB {
            write!(f, "{:.2}GB", b / GB)
        } else if b >= MB {
            write!(f, "{:.2}MB", b / MB)
        } else if b >= KB {
            write!(f, "{:.2}KB", b / KB)
        } else {
            write!(f, "{b:.2}B")
        }
    }
}
