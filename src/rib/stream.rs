//! Byte sink for an encoded RIB stream.
//!
//! [`RibStream`] tracks the number of bytes handed to it (before
//! compression) and optionally wraps its target in a gzip encoder.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::util::{Error, Result};

use super::config::RibCompression;

/// Where encoded bytes end up.
pub enum RibTarget {
    File(BufWriter<File>),
    Memory(Vec<u8>),
    Writer(Box<dyn Write + Send>),
}

impl RibTarget {
    /// Bytes of a memory target, `None` otherwise.
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Self::Memory(v) => Some(v),
            _ => None,
        }
    }
}

impl std::fmt::Debug for RibTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(_) => f.write_str("RibTarget::File"),
            Self::Memory(v) => write!(f, "RibTarget::Memory({} bytes)", v.len()),
            Self::Writer(_) => f.write_str("RibTarget::Writer"),
        }
    }
}

impl Write for RibTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::File(w) => w.write(buf),
            Self::Memory(v) => v.write(buf),
            Self::Writer(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::File(w) => w.flush(),
            Self::Memory(_) => Ok(()),
            Self::Writer(w) => w.flush(),
        }
    }
}

enum Sink {
    Plain(RibTarget),
    Gzip(GzEncoder<RibTarget>),
}

/// Output stream for RIB bytes.
pub struct RibStream {
    sink: Option<Sink>,
    pos: u64,
}

impl RibStream {
    /// Wrap `target`, compressing when asked.
    pub fn new(target: RibTarget, compression: RibCompression) -> Self {
        let sink = match compression {
            RibCompression::None => Sink::Plain(target),
            RibCompression::Gzip => Sink::Gzip(GzEncoder::new(target, Compression::default())),
        };
        Self { sink: Some(sink), pos: 0 }
    }

    /// Create a stream writing to the given file path.
    pub fn create(path: impl AsRef<Path>, compression: RibCompression) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self::new(
            RibTarget::File(BufWriter::with_capacity(1024 * 1024, file)),
            compression,
        ))
    }

    /// Create a stream collecting bytes in memory.
    pub fn memory(compression: RibCompression) -> Self {
        Self::new(RibTarget::Memory(Vec::new()), compression)
    }

    /// Uncompressed bytes written so far.
    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// True once [`finish`](Self::finish) has run.
    pub fn is_finished(&self) -> bool {
        self.sink.is_none()
    }

    /// Write bytes and advance position.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        match self.sink.as_mut() {
            Some(Sink::Plain(t)) => t.write_all(data)?,
            Some(Sink::Gzip(z)) => z.write_all(data)?,
            None => return Err(Error::StreamFinished),
        }
        self.pos += data.len() as u64;
        Ok(())
    }

    /// Flush buffered bytes to the target.
    pub fn flush(&mut self) -> Result<()> {
        match self.sink.as_mut() {
            Some(Sink::Plain(t)) => t.flush()?,
            Some(Sink::Gzip(z)) => z.flush()?,
            None => return Err(Error::StreamFinished),
        }
        Ok(())
    }

    /// Complete the gzip trailer, flush and hand back the target.
    pub fn finish(&mut self) -> Result<RibTarget> {
        let mut target = match self.sink.take() {
            Some(Sink::Plain(t)) => t,
            Some(Sink::Gzip(z)) => z.finish()?,
            None => return Err(Error::StreamFinished),
        };
        target.flush()?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_memory_stream() -> crate::util::Result<()> {
        let mut s = RibStream::memory(RibCompression::None);
        s.write_bytes(b"WorldBegin\n")?;
        assert_eq!(s.pos(), 11);
        let bytes = s.finish()?.into_bytes().unwrap_or_default();
        assert_eq!(bytes, b"WorldBegin\n");
        assert!(s.is_finished());
        assert!(matches!(s.write_bytes(b"x"), Err(Error::StreamFinished)));
        Ok(())
    }

    #[test]
    fn test_gzip_stream() -> crate::util::Result<()> {
        let mut s = RibStream::memory(RibCompression::Gzip);
        s.write_bytes(b"Sphere 1 -1 1 360\n")?;
        let bytes = s.finish()?.into_bytes().unwrap_or_default();
        assert_eq!(&bytes[..2], &[0x1f, 0x8b]);

        let mut text = String::new();
        flate2::read::GzDecoder::new(&bytes[..]).read_to_string(&mut text)?;
        assert_eq!(text, "Sphere 1 -1 1 360\n");
        Ok(())
    }
}
