//! Streaming firmware image storage.
//!
//! The update pipeline writes through the [`FirmwareSink`] contract and
//! never assumes a particular partition layout. Platform integrations
//! implement the trait over their flash/update API; [`FileSink`] is the
//! provided implementation that stages the image to a file.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Streaming destination for a firmware image.
///
/// Call order is `open` once, `write` until the image is complete, then
/// exactly one of `finalize` (mark the image valid) or `abort` (discard a
/// partial image). Implementations must not mark an image bootable before
/// `finalize` succeeds.
pub trait FirmwareSink {
    /// Prepare the sink for an image of exactly `expected_size` bytes.
    fn open(&mut self, expected_size: u64) -> io::Result<()>;

    /// Write the next chunk, returning how many bytes were accepted.
    fn write(&mut self, chunk: &[u8]) -> io::Result<usize>;

    /// Validate and commit the completed image.
    fn finalize(&mut self) -> io::Result<()>;

    /// Discard a partial image. Must be safe to call at any point.
    fn abort(&mut self);
}

/// Sink that stages the firmware image to a file.
///
/// `finalize` verifies the byte count against the expected size and
/// flushes to disk; `abort` removes the partial file.
pub struct FileSink {
    path: PathBuf,
    file: Option<File>,
    expected: u64,
    written: u64,
}

impl FileSink {
    /// Stage images at `path`. Nothing is created until [`FirmwareSink::open`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            expected: 0,
            written: 0,
        }
    }

    /// Where the image is staged.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }
}

impl FirmwareSink for FileSink {
    fn open(&mut self, expected_size: u64) -> io::Result<()> {
        if expected_size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "image size must be positive",
            ));
        }
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        self.file = Some(File::create(&self.path)?);
        self.expected = expected_size;
        self.written = 0;
        debug!(
            "staging {expected_size}-byte image at {}",
            self.path.display()
        );
        Ok(())
    }

    fn write(&mut self, chunk: &[u8]) -> io::Result<usize> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "sink not opened"))?;
        file.write_all(chunk)?;
        self.written += chunk.len() as u64;
        Ok(chunk.len())
    }

    fn finalize(&mut self) -> io::Result<()> {
        let file = self
            .file
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "sink not opened"))?;
        if self.written != self.expected {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "image incomplete: {} of {} bytes",
                    self.written, self.expected
                ),
            ));
        }
        file.sync_all()?;
        debug!("image committed at {}", self.path.display());
        Ok(())
    }

    fn abort(&mut self) {
        self.file = None;
        if self.path.exists()
            && let Err(e) = std::fs::remove_file(&self.path)
        {
            warn!("cannot remove partial image {}: {e}", self.path.display());
        }
        self.written = 0;
        self.expected = 0;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn file_sink_full_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("staged").join("firmware.bin");
        let mut sink = FileSink::new(&path);

        sink.open(10).unwrap();
        assert_eq!(sink.write(b"01234").unwrap(), 5);
        assert_eq!(sink.write(b"56789").unwrap(), 5);
        sink.finalize().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"0123456789");
        assert_eq!(sink.bytes_written(), 10);
    }

    #[test]
    fn finalize_rejects_incomplete_image() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(dir.path().join("firmware.bin"));

        sink.open(10).unwrap();
        sink.write(b"0123").unwrap();
        let err = sink.finalize().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn open_rejects_zero_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(dir.path().join("firmware.bin"));
        assert!(sink.open(0).is_err());
    }

    #[test]
    fn write_before_open_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(dir.path().join("firmware.bin"));
        assert!(sink.write(b"data").is_err());
    }

    #[test]
    fn abort_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("firmware.bin");
        let mut sink = FileSink::new(&path);

        sink.open(100).unwrap();
        sink.write(b"partial").unwrap();
        assert!(path.exists());

        sink.abort();
        assert!(!path.exists());
        assert_eq!(sink.bytes_written(), 0);
    }

    #[test]
    fn reopen_restarts_the_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("firmware.bin");
        let mut sink = FileSink::new(&path);

        sink.open(3).unwrap();
        sink.write(b"abc").unwrap();
        sink.finalize().unwrap();

        sink.open(2).unwrap();
        sink.write(b"xy").unwrap();
        sink.finalize().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"xy");
    }
}
