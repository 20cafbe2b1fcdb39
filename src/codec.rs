//! Little-endian primitive I/O shared by the local, central, and EOCD codecs.
//!
//! ZIP's on-disk integers are all little-endian, so every record parser in
//! this crate bottoms out in the helpers here instead of hand-rolling
//! `u16::from_le_bytes` at each call site.

use std::io::{self, Read, Write};

use crate::error::Result;

/// Reads a little-endian `u16`.
pub fn read_u16<R: Read + ?Sized>(r: &mut R) -> Result<u16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

/// Reads a little-endian `u32`.
pub fn read_u32<R: Read + ?Sized>(r: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Reads exactly `len` bytes into a freshly allocated `Vec<u8>`.
pub fn read_bytes<R: Read + ?Sized>(r: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

/// Writes a little-endian `u16`.
pub fn write_u16<W: Write + ?Sized>(w: &mut W, v: u16) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

/// Writes a little-endian `u32`.
pub fn write_u32<W: Write + ?Sized>(w: &mut W, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

/// The largest value a length-prefixed ZIP field (filename, extra field,
/// comment) may take; the on-disk length prefix is a 16-bit field.
pub const MAX_FIELD_LEN: usize = u16::MAX as usize;

/// A running CRC-32 (IEEE 802.3 polynomial), delegating the table and any
/// SIMD acceleration to `crc32fast`.
#[derive(Debug, Default, Clone)]
pub struct Crc32 {
    hasher: crc32fast::Hasher,
}

impl Crc32 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    pub fn finalize(self) -> u32 {
        self.hasher.finalize()
    }
}
