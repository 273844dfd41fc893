//! Byte sinks and sources consumed by the codecs.
//!
//! Archives borrow a sink or source for their whole lifetime and never close
//! it; opening and closing the stream is the caller's job. A sink that accepts
//! fewer bytes than offered, or a source that delivers fewer than requested,
//! ends the session with [`ArchiveError::StreamError`].
//!
//! [`ArchiveError::StreamError`]: arx_types::ArchiveError::StreamError

use std::io::{self, BufRead, Read, Write};

/// Destination of an encoded archive.
pub trait ByteSink {
    /// Write `buf` and return the number of bytes accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Flush buffered bytes to the underlying medium.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Whether the sink can still accept bytes.
    fn is_open(&self) -> bool {
        true
    }
}

/// Origin of an encoded archive.
pub trait ByteSource {
    /// Fill `buf` as far as possible and return the number of bytes read.
    ///
    /// Returning less than `buf.len()` means the source is exhausted.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Append one line, including its terminator, to `line`.
    ///
    /// Returns the number of bytes consumed; zero at end of input.
    fn read_line(&mut self, line: &mut String) -> io::Result<usize>;

    /// Whether the source can still deliver bytes.
    fn is_open(&self) -> bool {
        true
    }
}

impl ByteSink for Vec<u8> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.extend_from_slice(buf);
        Ok(buf.len())
    }
}

impl ByteSource for &[u8] {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }

    fn read_line(&mut self, line: &mut String) -> io::Result<usize> {
        BufRead::read_line(self, line)
    }
}

/// Adapts any [`Write`] into a closable [`ByteSink`].
#[derive(Debug)]
pub struct IoSink<W> {
    inner: W,
    open: bool,
}

impl<W: Write> IoSink<W> {
    /// Wrap an open writer.
    pub fn new(inner: W) -> Self {
        Self { inner, open: true }
    }

    /// Flush and mark the sink closed. Later archives over it fail to open.
    pub fn close(&mut self) -> io::Result<()> {
        self.open = false;
        self.inner.flush()
    }

    /// Borrow the wrapped writer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Unwrap the writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> ByteSink for IoSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.open {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "sink is closed"));
        }
        self.inner.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

/// Adapts any [`BufRead`] into a closable [`ByteSource`].
#[derive(Debug)]
pub struct IoSource<R> {
    inner: R,
    open: bool,
}

impl<R: BufRead> IoSource<R> {
    /// Wrap an open reader.
    pub fn new(inner: R) -> Self {
        Self { inner, open: true }
    }

    /// Mark the source closed. Later archives over it fail to open.
    pub fn close(&mut self) {
        self.open = false;
    }

    /// Unwrap the reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: BufRead> ByteSource for IoSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.open {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "source is closed"));
        }
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn read_line(&mut self, line: &mut String) -> io::Result<usize> {
        if !self.open {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "source is closed"));
        }
        self.inner.read_line(line)
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
