//! Single-member GZIP framing, built out of the same `InflateInputBuf` /
//! `DeflateOutputBuf` codecs the ZIP reader/writer use, with a GZIP header
//! and trailer instead of ZIP's local/central headers.
//!
//! RFC 1952 defines the member format: a 10-byte header, the raw DEFLATE
//! body, and an 8-byte trailer (CRC-32, then size mod 2^32). Multi-member
//! streams, FEXTRA, and FCOMMENT beyond a skip are out of scope.

use std::io::{self, Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::deflate::DeflateOutputBuf;
use crate::error::{Error, Result};
use crate::inflate::InflateInputBuf;

const MAGIC: [u8; 2] = [0x1f, 0x8b];
const METHOD_DEFLATE: u8 = 8;

const FLAG_FHCRC: u8 = 0x02;
const FLAG_FEXTRA: u8 = 0x04;
const FLAG_FNAME: u8 = 0x08;
const FLAG_FCOMMENT: u8 = 0x10;

fn read_cstring<R: Read>(r: &mut R) -> Result<String> {
    let mut bytes = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        r.read_exact(&mut byte)?;
        if byte[0] == 0 {
            break;
        }
        bytes.push(byte[0]);
    }
    String::from_utf8(bytes).map_err(|e| Error::Format(format!("non-UTF-8 gzip field: {e}")))
}

fn write_header<W: Write>(w: &mut W, filename: Option<&str>) -> Result<()> {
    w.write_all(&MAGIC)?;
    w.write_all(&[METHOD_DEFLATE])?;
    w.write_all(&[if filename.is_some() { FLAG_FNAME } else { 0 }])?;
    let mtime = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0);
    w.write_all(&mtime.to_le_bytes())?;
    w.write_all(&[0])?; // extra flags
    w.write_all(&[0xff])?; // OS: unknown
    if let Some(name) = filename {
        w.write_all(name.as_bytes())?;
        w.write_all(&[0])?;
    }
    Ok(())
}

/// A pull-based reader over a single-member GZIP stream.
pub struct GzipInputBuf<R: Read> {
    inflate: InflateInputBuf<R>,
    filename: Option<String>,
}

impl<R: Read> GzipInputBuf<R> {
    /// Parses the GZIP header at the source's current position.
    pub fn new(mut source: R) -> Result<Self> {
        let mut fixed = [0u8; 10];
        source.read_exact(&mut fixed)?;
        if fixed[0..2] != MAGIC {
            return Err(Error::Format("bad gzip magic".into()));
        }
        if fixed[2] != METHOD_DEFLATE {
            return Err(Error::UnsupportedCompression(fixed[2] as u16));
        }
        let flags = fixed[3];
        if flags & FLAG_FEXTRA != 0 {
            return Err(Error::Format(
                "gzip member has an FEXTRA field, which isn't supported".into(),
            ));
        }

        let filename = if flags & FLAG_FNAME != 0 {
            Some(read_cstring(&mut source)?)
        } else {
            None
        };
        if flags & FLAG_FCOMMENT != 0 {
            read_cstring(&mut source)?;
        }
        if flags & FLAG_FHCRC != 0 {
            let mut header_crc = [0u8; 2];
            source.read_exact(&mut header_crc)?;
        }

        Ok(Self {
            inflate: InflateInputBuf::new(source),
            filename,
        })
    }

    /// The original filename carried in the header, if present.
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Reads and validates the 8-byte trailer once the body has been read to
    /// completion (`read` has returned `Ok(0)`), returning the underlying
    /// source positioned just past it.
    pub fn finish(self) -> Result<R> {
        let actual_crc32 = self.inflate.crc32();
        let actual_size = (self.inflate.bytes_out() & 0xFFFF_FFFF) as u32;
        // `into_inner` hands back the `BufReader` the decoder read through,
        // not the bare source: the decoder's read-ahead has typically
        // already pulled the trailer's bytes out of the source and into this
        // buffer, so the trailer must be read from here, not from a fresh
        // read against the source directly.
        let mut source = self.inflate.into_inner();

        let mut trailer = [0u8; 8];
        source.read_exact(&mut trailer)?;
        let stored_crc32 = u32::from_le_bytes(trailer[0..4].try_into().unwrap());
        let stored_size = u32::from_le_bytes(trailer[4..8].try_into().unwrap());

        if stored_crc32 != actual_crc32 || stored_size != actual_size {
            return Err(Error::Format(format!(
                "gzip trailer mismatch: header says crc 0x{stored_crc32:08x} size {stored_size}, got crc 0x{actual_crc32:08x} size {actual_size}"
            )));
        }
        Ok(source.into_inner())
    }
}

impl<R: Read> Read for GzipInputBuf<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inflate.read(buf)
    }
}

/// A push-based writer that produces a single-member GZIP stream.
pub struct GzipOutputBuf<W: Write> {
    codec: DeflateOutputBuf<W>,
}

impl<W: Write> GzipOutputBuf<W> {
    pub fn new(sink: W) -> Result<Self> {
        Self::with_filename_and_level(sink, None, 6)
    }

    pub fn with_filename(sink: W, filename: &str) -> Result<Self> {
        Self::with_filename_and_level(sink, Some(filename), 6)
    }

    pub fn with_filename_and_level(
        mut sink: W,
        filename: Option<&str>,
        level: u32,
    ) -> Result<Self> {
        write_header(&mut sink, filename)?;
        Ok(Self {
            codec: DeflateOutputBuf::new(sink, level),
        })
    }

    /// Closes the DEFLATE body and writes the CRC-32/size trailer, returning
    /// the underlying sink.
    pub fn finish(self) -> Result<W> {
        let crc32 = self.codec.crc32();
        let size = (self.codec.uncompressed_count() & 0xFFFF_FFFF) as u32;
        let mut sink = self.codec.finish()?;
        sink.write_all(&crc32.to_le_bytes())?;
        sink.write_all(&size.to_le_bytes())?;
        Ok(sink)
    }
}

impl<W: Write> Write for GzipOutputBuf<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.codec.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.codec.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_through_deflate_with_matching_trailer() {
        let mut writer = GzipOutputBuf::with_filename(Vec::new(), "hello.txt").unwrap();
        writer.write_all(b"hello, gzip world").unwrap();
        let bytes = writer.finish().unwrap();

        let mut reader = GzipInputBuf::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.filename(), Some("hello.txt"));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello, gzip world");
        reader.finish().unwrap();
    }

    #[test]
    fn rejects_bad_magic() {
        let err = GzipInputBuf::new(Cursor::new(vec![0u8; 10])).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }
}
