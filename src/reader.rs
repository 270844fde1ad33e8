//! # Tag Readers
//!
//! The credential reader is an external device; the kiosk consumes it
//! through [`TagReader`]. Byte-level Wiegand and vendor serial framings are
//! handled by their own driver daemons, which expose one tag per line on a
//! character device or FIFO; [`LineReader`] covers those. `Ok(0)` means
//! "no tag right now, ask again".

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("reader IO: {0}")]
    Io(#[from] io::Error),

    /// The device went away (unplugged, driver restart).
    #[error("reader closed")]
    Closed,
}

/// Blocking credential source.
pub trait TagReader: Send {
    /// Block until a tag is read. `Ok(0)` means no tag was read this round.
    fn read(&mut self) -> Result<u64, ReaderError>;

    /// Release the device.
    fn close(&mut self) {}
}

/// Reads one tag id per line, decimal first and hex as a fallback, matching
/// what the common reader daemons emit.
pub struct LineReader {
    input: BufReader<File>,
}

impl LineReader {
    pub fn open<P: AsRef<Path>>(device: P) -> Result<Self, ReaderError> {
        let file = File::open(device)?;
        Ok(LineReader {
            input: BufReader::new(file),
        })
    }
}

impl TagReader for LineReader {
    fn read(&mut self) -> Result<u64, ReaderError> {
        let mut line = String::new();
        let n = self.input.read_line(&mut line)?;
        if n == 0 {
            return Err(ReaderError::Closed);
        }
        Ok(parse_tag(line.trim()).unwrap_or(0))
    }
}

/// Decimal first, then hex; `None` for anything else.
pub fn parse_tag(text: &str) -> Option<u64> {
    if text.is_empty() {
        return None;
    }
    text.parse::<u64>()
        .ok()
        .or_else(|| u64::from_str_radix(text, 16).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn parses_decimal_and_hex_tags() {
        assert_eq!(parse_tag("12345"), Some(12345));
        assert_eq!(parse_tag("beef"), Some(0xbeef));
        assert_eq!(parse_tag(""), None);
        assert_eq!(parse_tag("not a tag"), None);
    }

    #[test]
    fn line_reader_yields_tags_then_closed() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "12345").unwrap();
        writeln!(file, "garbage").unwrap();
        writeln!(file, "beef").unwrap();
        file.flush().unwrap();

        let mut reader = LineReader::open(file.path()).unwrap();
        assert_eq!(reader.read().unwrap(), 12345);
        assert_eq!(reader.read().unwrap(), 0);
        assert_eq!(reader.read().unwrap(), 0xbeef);
        assert!(matches!(reader.read(), Err(ReaderError::Closed)));
    }
}
