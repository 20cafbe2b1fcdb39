//! A push-based byte-stream sink that deflates bytes written to it and
//! forwards the compressed bytes to a lower sink, tracking running CRC-32
//! and byte counters.

use std::io::{self, Write};

use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::codec::Crc32;
use crate::error::{Error, Result};

/// Counts bytes written to (and CRCs bytes offered to) a `DeflateOutputBuf`,
/// sitting between the compressor and the lower sink so both counters stay
/// accurate regardless of how the compressor batches its output.
struct CountingSink<W: Write> {
    inner: W,
    compressed_count: u64,
}

impl<W: Write> Write for CountingSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.compressed_count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Wraps a lower writer, compressing bytes written to it with raw DEFLATE
/// (via `flate2`, the external compression primitive) and forwarding the
/// compressed bytes downstream while tracking CRC-32 and byte counts.
pub struct DeflateOutputBuf<W: Write> {
    encoder: Option<DeflateEncoder<CountingSink<W>>>,
    crc: Crc32,
    uncompressed_count: u64,
    finished: bool,
}

impl<W: Write> DeflateOutputBuf<W> {
    /// `level` is clamped to 1–9; values outside that range saturate rather
    /// than error, matching the writer's documented default of 6.
    pub fn new(inner: W, level: u32) -> Self {
        let level = level.clamp(1, 9);
        Self {
            encoder: Some(DeflateEncoder::new(
                CountingSink {
                    inner,
                    compressed_count: 0,
                },
                Compression::new(level),
            )),
            crc: Crc32::new(),
            uncompressed_count: 0,
            finished: false,
        }
    }

    pub fn uncompressed_count(&self) -> u64 {
        self.uncompressed_count
    }

    pub fn compressed_count(&self) -> u64 {
        self.encoder
            .as_ref()
            .map(|e| e.get_ref().compressed_count)
            .unwrap_or(0)
    }

    pub fn crc32(&self) -> u32 {
        self.crc.clone().finalize()
    }

    /// Flushes the compressor so all bytes offered so far are represented
    /// in the lower sink, without closing the DEFLATE stream.
    pub fn sync(&mut self) -> Result<()> {
        self.active_encoder()?.flush()?;
        Ok(())
    }

    /// Closes the DEFLATE stream and returns the lower sink. After this,
    /// `write` returns `Error::InvalidState`.
    pub fn finish(mut self) -> Result<W> {
        self.active_encoder()?;
        let encoder = self.encoder.take().expect("checked by active_encoder");
        self.finished = true;
        let sink = encoder.finish()?;
        Ok(sink.inner)
    }

    fn active_encoder(&mut self) -> Result<&mut DeflateEncoder<CountingSink<W>>> {
        if self.finished {
            return Err(Error::InvalidState(
                "write to a finished DeflateOutputBuf".into(),
            ));
        }
        self.encoder
            .as_mut()
            .ok_or_else(|| Error::InvalidState("DeflateOutputBuf already finished".into()))
    }
}

impl<W: Write> Write for DeflateOutputBuf<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.finished {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "write after DeflateOutputBuf::finish",
            ));
        }
        let encoder = self
            .encoder
            .as_mut()
            .expect("not finished implies encoder present");
        let n = encoder.write(buf)?;
        self.crc.update(&buf[..n]);
        self.uncompressed_count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.encoder {
            Some(e) => e.flush(),
            None => Ok(()),
        }
    }
}
