//! A sequential ZIP entry cursor (`ZipInputBuf`) and the random-access
//! archive it's built on top of (`ZipArchive`).
//!
//! `ZipInputBuf` walks local file headers one at a time, the way a ZIP
//! stream arrives off the wire: `get_next_entry` parses the next header and
//! positions the cursor at its payload, `close_entry` skips whatever payload
//! bytes the caller didn't read. `ZipArchive` sits on top of a seekable
//! source, locates the end-of-central-directory record once at construction,
//! and opens entries at random by seeking straight to their local header.

use std::io::{self, Read, Seek, SeekFrom};

use log::debug;

use crate::codec::{self, Crc32};
use crate::entry::{CentralEntry, CompressionMethod, EndOfCentralDirectory, LocalEntry};
use crate::error::{Error, Result};
use crate::index::{Index, MatchMode};
use crate::inflate::InflateInputBuf;

/// A reader that has been handed to a `DeflateDecoder` and can't be taken
/// back until the decoder is done with it; `into_inner` returns it.
struct Bounded<R> {
    inner: R,
    remaining: u64,
}

impl<R: Read> Read for Bounded<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }
        let cap = buf.len().min(self.remaining as usize);
        let n = self.inner.read(&mut buf[..cap])?;
        self.remaining -= n as u64;
        Ok(n)
    }
}

enum Codec<R> {
    Idle,
    Stored { remain: u64 },
    Deflated(InflateInputBuf<Bounded<R>>),
}

/// A pull-based cursor over a sequence of ZIP local entries.
///
/// Call [`get_next_entry`](Self::get_next_entry) to parse the next local
/// header and position the cursor at its payload, then read the payload
/// through this type's `Read` impl. The source must be positioned at a local
/// file header signature (or at the position a previous entry's payload
/// ends) before each `get_next_entry` call.
pub struct ZipInputBuf<R> {
    // `None` only while `codec` is `Codec::Deflated`, which owns the source
    // through the decoder for the life of that entry.
    source: Option<R>,
    codec: Codec<R>,
    data_start: u64,
    compressed_size: u64,
}

impl<R: Read + Seek> ZipInputBuf<R> {
    pub fn new(source: R) -> Self {
        Self {
            source: Some(source),
            codec: Codec::Idle,
            data_start: 0,
            compressed_size: 0,
        }
    }

    /// Parses the local header at the source's current position and
    /// positions the cursor at its payload. Implicitly closes whatever
    /// entry was previously open.
    pub fn get_next_entry(&mut self) -> Result<LocalEntry> {
        self.close_entry()?;

        let source = self
            .source
            .as_mut()
            .expect("idle cursor always holds its source");
        let entry_offset = source.stream_position()?;
        let mut entry = LocalEntry::read(source)?;
        entry.entry_offset = entry_offset;

        self.data_start = source.stream_position()?;
        self.compressed_size = entry.compressed_size as u64;

        if !entry.valid {
            self.codec = Codec::Idle;
            return Ok(entry);
        }

        match entry.method {
            CompressionMethod::Stored => {
                self.codec = Codec::Stored {
                    remain: entry.uncompressed_size as u64,
                };
            }
            CompressionMethod::Deflated => {
                let source = self.source.take().expect("checked above");
                let bounded = Bounded {
                    inner: source,
                    remaining: self.compressed_size,
                };
                self.codec = Codec::Deflated(InflateInputBuf::new(bounded));
            }
            CompressionMethod::Unsupported(_) => unreachable!("excluded by entry.valid"),
        }

        Ok(entry)
    }

    /// Skips any unread bytes of the currently open entry, leaving the
    /// source positioned exactly at the next local header. A no-op if no
    /// entry is open.
    pub fn close_entry(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.codec, Codec::Idle) {
            Codec::Idle => {}
            Codec::Stored { .. } => {
                let source = self
                    .source
                    .as_mut()
                    .expect("stored entries keep their source");
                source.seek(SeekFrom::Start(self.data_start + self.compressed_size))?;
            }
            Codec::Deflated(inflate) => {
                // The immediately-following absolute seek makes any bytes
                // still buffered in the `BufReader` irrelevant here — unlike
                // `GzipInputBuf::finish`, which has no such seek and must
                // read them in place (see InflateInputBuf's doc comment).
                let bounded = inflate.into_inner().into_inner();
                let mut source = bounded.inner;
                source.seek(SeekFrom::Start(self.data_start + self.compressed_size))?;
                self.source = Some(source);
            }
        }
        Ok(())
    }
}

impl<R: Read> Read for ZipInputBuf<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.codec {
            Codec::Idle => Ok(0),
            Codec::Stored { remain } => {
                if *remain == 0 {
                    return Ok(0);
                }
                let cap = buf.len().min(*remain as usize);
                let source = self
                    .source
                    .as_mut()
                    .expect("stored entries keep their source");
                let n = source.read(&mut buf[..cap])?;
                *remain -= n as u64;
                Ok(n)
            }
            Codec::Deflated(inflate) => inflate.read(buf),
        }
    }
}

/// A single entry's decompressed byte stream, borrowed from a `ZipArchive`.
/// Verifies the entry's CRC-32 against the central directory once the last
/// byte has been read; a mismatch surfaces as an `io::Error` from `read`.
pub struct EntryReader<'a, R> {
    buf: ZipInputBuf<&'a mut R>,
    crc: Crc32,
    expected_crc32: u32,
    done: bool,
}

impl<'a, R: Read + Seek> Read for EntryReader<'a, R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.done {
            return Ok(0);
        }
        let n = self.buf.read(out)?;
        if n == 0 {
            self.done = true;
            let actual = std::mem::take(&mut self.crc).finalize();
            if actual != self.expected_crc32 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "CRC-32 mismatch: central directory says 0x{:08x}, got 0x{:08x}",
                        self.expected_crc32, actual
                    ),
                ));
            }
            return Ok(0);
        }
        self.crc.update(&out[..n]);
        Ok(n)
    }
}

/// A ZIP archive opened for random access: the central directory is read
/// once at construction into an [`Index`], and each entry is opened by
/// seeking straight to its local header.
pub struct ZipArchive<R> {
    source: R,
    index: Index,
    archive_comment: String,
    /// Added to every central directory entry's recorded local header
    /// offset before seeking, to account for an arbitrary prefix before the
    /// archive data (e.g. a self-extracting archive's stub executable).
    base_offset: u64,
    closed: bool,
}

impl<R: Read + Seek> ZipArchive<R> {
    /// Locates the end-of-central-directory record, then reads every
    /// central directory entry it points to into an in-memory index.
    pub fn new(mut source: R) -> Result<Self> {
        let eocd_offset = EndOfCentralDirectory::locate(&mut source)?;
        source.seek(SeekFrom::Start(eocd_offset))?;

        let mut fixed = [0u8; 22];
        source.read_exact(&mut fixed)?;
        let comment_len = u16::from_le_bytes([fixed[20], fixed[21]]) as usize;
        let mut body = fixed.to_vec();
        body.extend(codec::read_bytes(&mut source, comment_len)?);
        let eocd = EndOfCentralDirectory::parse(&body)?;

        // The central directory's recorded offset is relative to wherever
        // the archive itself starts. For a self-extracting archive (or any
        // file with an arbitrary prefix before the ZIP data), that's not
        // the same as this file's start: derive the real gap from where the
        // central directory actually ends (just before the EOCD we already
        // located) versus where it claims to start.
        let cdir_real_start = eocd_offset.saturating_sub(eocd.cdir_size as u64);
        let base_offset = cdir_real_start.saturating_sub(eocd.cdir_offset as u64);

        debug!(
            "central directory: {} entries at offset {} (base offset {})",
            eocd.total_count, cdir_real_start, base_offset
        );

        source.seek(SeekFrom::Start(cdir_real_start))?;
        let mut index = Index::new();
        for _ in 0..eocd.total_count {
            index.append(CentralEntry::read(&mut source)?);
        }

        Ok(Self {
            source,
            index,
            archive_comment: eocd.archive_comment,
            base_offset,
            closed: false,
        })
    }

    /// All entries in central directory order.
    pub fn entries(&self) -> &[CentralEntry] {
        self.index.entries()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn archive_comment(&self) -> &str {
        &self.archive_comment
    }

    /// Looks up an entry by name without opening it for reading.
    pub fn get_entry(&self, name: &str, mode: MatchMode) -> Option<&CentralEntry> {
        self.index.lookup(name, mode)
    }

    /// Opens an entry's decompressed byte stream, seeking the underlying
    /// source to its local header and validating it against the central
    /// directory record before handing back a reader.
    pub fn get_input_stream(
        &mut self,
        name: &str,
        mode: MatchMode,
    ) -> Result<EntryReader<'_, R>> {
        if self.closed {
            return Err(Error::Closed);
        }
        let central = self
            .index
            .lookup(name, mode)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        if !central.local.valid {
            return Err(Error::UnsupportedCompression(central.local.method.to_u16()));
        }

        let expected_crc32 = central.local.crc32;
        let expected_method = central.local.method;
        let expected_filename = central.local.filename.clone();
        let entry_offset = central.local.entry_offset + self.base_offset;

        self.source.seek(SeekFrom::Start(entry_offset))?;
        let mut buf = ZipInputBuf::new(&mut self.source);
        let local = buf.get_next_entry()?;
        if !local.valid || local.method != expected_method || local.filename != expected_filename {
            return Err(Error::Format(
                "local file header doesn't match its central directory entry".into(),
            ));
        }

        Ok(EntryReader {
            buf,
            crc: Crc32::new(),
            expected_crc32,
            done: false,
        })
    }

    pub fn close(&mut self) {
        self.closed = true;
    }
}
