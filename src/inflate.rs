//! A pull-based byte-stream source that inflates raw DEFLATE data read from
//! a lower source, tracking a running CRC-32 of the bytes it emits.

use std::io::{self, BufReader, Read};

use flate2::bufread::DeflateDecoder;

use crate::codec::Crc32;

/// Wraps a lower reader, decompressing DEFLATE bytes pulled from it on
/// demand and accumulating the CRC-32 of the inflated bytes it has handed
/// back so far.
///
/// The actual inflate engine (buffering, window state, end-of-stream
/// detection) is `flate2`'s raw-DEFLATE decoder — the external compression
/// primitive this crate treats as a black box. Built on the `bufread`
/// decoder over an explicit `BufReader<R>` rather than `read::DeflateDecoder`
/// so that bytes the decoder's read-ahead has already pulled out of `R` but
/// not yet consumed stay visible in `into_inner`'s returned `BufReader`
/// instead of being silently dropped — `GzipInputBuf::finish` depends on
/// those leftover bytes being the trailer that immediately follows the
/// DEFLATE body. `InflateInputBuf` adds the running checksum and the
/// pull-based `Read` contract on top.
pub struct InflateInputBuf<R: Read> {
    decoder: DeflateDecoder<BufReader<R>>,
    crc: Crc32,
    bytes_out: u64,
}

impl<R: Read> InflateInputBuf<R> {
    pub fn new(inner: R) -> Self {
        Self {
            decoder: DeflateDecoder::new(BufReader::new(inner)),
            crc: Crc32::new(),
            bytes_out: 0,
        }
    }

    /// The CRC-32 of all bytes emitted so far.
    pub fn crc32(&self) -> u32 {
        self.crc.clone().finalize()
    }

    /// The number of uncompressed bytes emitted so far.
    pub fn bytes_out(&self) -> u64 {
        self.bytes_out
    }

    /// Reinitializes the decoder to start a fresh DEFLATE stream at the
    /// lower source's current position, discarding any buffered state.
    pub fn reset(self) -> Self {
        Self::new(self.decoder.into_inner().into_inner())
    }

    /// Unwraps this buffer, returning the lower source wrapped in the
    /// `BufReader` that fed the decoder. Once the DEFLATE stream has been
    /// read to completion, any bytes immediately following the compressed
    /// payload that the decoder's read-ahead already pulled out of the
    /// lower source are still available to read out of this `BufReader`
    /// rather than lost.
    pub fn into_inner(self) -> BufReader<R> {
        self.decoder.into_inner()
    }
}

impl<R: Read> Read for InflateInputBuf<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.decoder.read(buf)?;
        self.crc.update(&buf[..n]);
        self.bytes_out += n as u64;
        Ok(n)
    }
}
