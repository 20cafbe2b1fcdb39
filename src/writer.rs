//! A push-based ZIP entry sink (`ZipOutputBuf`) and the archive writer built
//! on top of it (`ZipWriter`).
//!
//! Unlike a streaming writer that trails a data descriptor after each
//! entry's payload, `ZipOutputBuf` writes a placeholder local header, then
//! seeks back and rewrites its size/CRC fields once the payload is known
//! (see `LocalEntry::backpatch`). That trades the ability to write to a
//! non-seekable sink for producing archives every reader — including this
//! crate's own — can open.

use std::io::{self, Seek, SeekFrom, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::codec::Crc32;
use crate::deflate::DeflateOutputBuf;
use crate::entry::{CentralEntry, CompressionMethod, EndOfCentralDirectory, LocalEntry};
use crate::entry::DEFAULT_EXTERN_FILE_ATTR;
use crate::error::{Error, Result};

fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

enum OpenEntry<W> {
    Stored {
        local: LocalEntry,
        crc: Crc32,
        written: u64,
        sink: W,
    },
    Deflated {
        local: LocalEntry,
        codec: DeflateOutputBuf<W>,
    },
}

/// A push-based sink that writes one ZIP entry at a time to a seekable
/// lower sink, back-patching each local header once its entry is closed.
pub struct ZipOutputBuf<W> {
    // `None` only while an entry is open, which owns the sink through its
    // compressor (or directly, for a stored entry) until `close_entry`.
    sink: Option<W>,
    open: Option<OpenEntry<W>>,
    entries: Vec<CentralEntry>,
    archive_comment: String,
    default_level: u32,
    closed: bool,
}

impl<W: Write + Seek> ZipOutputBuf<W> {
    pub fn new(sink: W, compression_level: u32) -> Self {
        Self {
            sink: Some(sink),
            open: None,
            entries: Vec::new(),
            archive_comment: String::new(),
            default_level: compression_level.clamp(1, 9),
            closed: false,
        }
    }

    pub fn set_archive_comment(&mut self, comment: impl Into<String>) {
        self.archive_comment = comment.into();
    }

    /// Closes any open entry, then writes a new local header and opens its
    /// payload for writing.
    pub fn put_next_entry(&mut self, filename: &str, method: CompressionMethod) -> Result<()> {
        if let CompressionMethod::Unsupported(m) = method {
            return Err(Error::UnsupportedCompression(m));
        }
        self.close_entry()?;
        if self.closed {
            return Err(Error::InvalidState("archive already finished".into()));
        }

        let mut sink = self
            .sink
            .take()
            .expect("not closed and no entry open implies sink is present");
        let entry_offset = sink.stream_position()?;
        let local = LocalEntry {
            filename: filename.to_string(),
            uncompressed_size: 0,
            compressed_size: 0,
            crc32: 0,
            mtime: now_epoch(),
            method,
            extra_field: Vec::new(),
            gp_bitfield: 0,
            extract_version: 20,
            writer_version: 20,
            valid: true,
            entry_offset,
        };
        local.write(&mut sink)?;

        self.open = Some(match method {
            CompressionMethod::Stored => OpenEntry::Stored {
                local,
                crc: Crc32::new(),
                written: 0,
                sink,
            },
            CompressionMethod::Deflated => OpenEntry::Deflated {
                local,
                codec: DeflateOutputBuf::new(sink, self.default_level),
            },
            CompressionMethod::Unsupported(_) => unreachable!("rejected above"),
        });
        Ok(())
    }

    /// Finishes the currently open entry, back-patching its local header
    /// with the now-known sizes and CRC-32. A no-op if no entry is open.
    pub fn close_entry(&mut self) -> Result<()> {
        let Some(open) = self.open.take() else {
            return Ok(());
        };
        let (mut local, crc32, uncompressed_size, mut sink) = match open {
            OpenEntry::Stored {
                local,
                crc,
                written,
                sink,
            } => (local, crc.finalize(), written, sink),
            OpenEntry::Deflated { local, codec } => {
                let crc32 = codec.crc32();
                let uncompressed_size = codec.uncompressed_count();
                let sink = codec.finish()?;
                (local, crc32, uncompressed_size, sink)
            }
        };

        let cur_pos = sink.stream_position()?;
        let compressed_size = cur_pos - local.entry_offset - local.header_size();
        if compressed_size >= 1u64 << 32 || uncompressed_size >= 1u64 << 32 {
            return Err(Error::InvalidState(
                "entry exceeds 4 GiB (ZIP64 is out of scope)".into(),
            ));
        }

        local.crc32 = crc32;
        local.compressed_size = compressed_size as u32;
        local.uncompressed_size = uncompressed_size as u32;
        local.backpatch(&mut sink)?;

        self.entries.push(CentralEntry {
            local,
            comment: String::new(),
            disk_num_start: 0,
            intern_file_attr: 0,
            extern_file_attr: DEFAULT_EXTERN_FILE_ATTR,
        });
        self.sink = Some(sink);
        Ok(())
    }

    /// Closes any open entry, writes the central directory and the
    /// end-of-central-directory record, and returns the underlying sink.
    pub fn finish(mut self) -> Result<W> {
        self.close_entry()?;
        let mut sink = self
            .sink
            .take()
            .ok_or_else(|| Error::InvalidState("archive already finished".into()))?;

        if self.entries.len() > u16::MAX as usize {
            return Err(Error::InvalidState(
                "more than 65535 entries (ZIP64 is out of scope)".into(),
            ));
        }

        let cdir_offset = sink.stream_position()?;
        for entry in &self.entries {
            entry.write(&mut sink)?;
        }
        let cdir_end = sink.stream_position()?;
        let cdir_size = cdir_end - cdir_offset;
        if cdir_offset >= 1u64 << 32 || cdir_size >= 1u64 << 32 {
            return Err(Error::InvalidState(
                "central directory exceeds 4 GiB (ZIP64 is out of scope)".into(),
            ));
        }

        let eocd = EndOfCentralDirectory {
            total_count: self.entries.len() as u16,
            cdir_size: cdir_size as u32,
            cdir_offset: cdir_offset as u32,
            archive_comment: self.archive_comment.clone(),
        };
        eocd.write(&mut sink)?;
        self.closed = true;
        Ok(sink)
    }
}

impl<W: Write + Seek> Write for ZipOutputBuf<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.open.as_mut() {
            None => Err(io::Error::new(
                io::ErrorKind::Other,
                "no entry open: call put_next_entry first",
            )),
            Some(OpenEntry::Stored {
                crc, written, sink, ..
            }) => {
                sink.write_all(buf)?;
                crc.update(buf);
                *written += buf.len() as u64;
                Ok(buf.len())
            }
            Some(OpenEntry::Deflated { codec, .. }) => codec.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.open.as_mut() {
            None => Ok(()),
            Some(OpenEntry::Stored { sink, .. }) => sink.flush(),
            Some(OpenEntry::Deflated { codec, .. }) => codec.flush(),
        }
    }
}

/// A ZIP archive writer: opens entries by name, writes their bytes, and
/// emits the central directory on `finish`.
pub struct ZipWriter<W: Write + Seek> {
    buf: ZipOutputBuf<W>,
}

impl<W: Write + Seek> ZipWriter<W> {
    /// Creates a writer using the default DEFLATE compression level (6).
    pub fn new(sink: W) -> Self {
        Self::with_compression_level(sink, 6)
    }

    pub fn with_compression_level(sink: W, level: u32) -> Self {
        Self {
            buf: ZipOutputBuf::new(sink, level),
        }
    }

    pub fn set_archive_comment(&mut self, comment: impl Into<String>) {
        self.buf.set_archive_comment(comment);
    }

    /// Starts a DEFLATE-compressed entry.
    pub fn start_entry(&mut self, name: &str) -> Result<()> {
        self.buf.put_next_entry(name, CompressionMethod::Deflated)
    }

    /// Starts an entry stored without compression.
    pub fn start_stored_entry(&mut self, name: &str) -> Result<()> {
        self.buf.put_next_entry(name, CompressionMethod::Stored)
    }

    /// Writes bytes to the currently open entry.
    pub fn write_data(&mut self, data: &[u8]) -> Result<()> {
        self.buf.write_all(data)?;
        Ok(())
    }

    /// Closes any open entry, writes the central directory, and returns the
    /// underlying sink.
    pub fn finish(self) -> Result<W> {
        self.buf.finish()
    }
}
