//! The three fixed-format records a ZIP archive is built from: the local
//! file header that precedes each entry's bytes, the central directory
//! record that catalogs it, and the end-of-central-directory record that
//! anchors the whole thing.
//!
//! Field layouts and magic numbers are quoted from APPNOTE.TXT section 4.3,
//! the same reference `piz`'s `spec.rs` cites.

use std::io::{Read, Seek, SeekFrom, Write};

use log::trace;

use crate::codec::{self, MAX_FIELD_LEN};
use crate::error::{Error, Result};
use crate::time;

pub(crate) const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x0403_4b50;
pub(crate) const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0201_4b50;
pub(crate) const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0605_4b50;

/// `version made by` / `version needed to extract` value this crate emits:
/// ZIP spec 2.0 (0x0014), the minimum needed for DEFLATE.
const VERSION_20: u16 = 20;

/// Host byte for `version made by`: UNIX, emitted unconditionally regardless
/// of build host (see Open Questions in DESIGN.md).
const HOST_UNIX: u16 = 0x0300;

/// Bit 3 of the general-purpose flag field: "sizes/CRC follow in a data
/// descriptor". Detected and rejected on read; never set on write.
const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;

/// The two compression methods this crate implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflated,
    /// Any other method code, preserved so a caller can inspect it; entries
    /// with this method are marked invalid and can't be opened for reading.
    Unsupported(u16),
}

impl CompressionMethod {
    pub(crate) fn from_u16(v: u16) -> Self {
        match v {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflated,
            other => CompressionMethod::Unsupported(other),
        }
    }

    pub(crate) fn to_u16(self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflated => 8,
            CompressionMethod::Unsupported(v) => v,
        }
    }
}

/// Fields shared by a local file header and a central directory record.
#[derive(Debug, Clone)]
pub struct LocalEntry {
    pub filename: String,
    pub uncompressed_size: u32,
    pub compressed_size: u32,
    pub crc32: u32,
    pub mtime: i64,
    pub method: CompressionMethod,
    pub extra_field: Vec<u8>,
    pub gp_bitfield: u16,
    pub extract_version: u16,
    pub writer_version: u16,
    pub valid: bool,
    /// Absolute offset of this entry's local header in the archive; 0 if
    /// not yet known (e.g. an entry under construction by the writer).
    pub entry_offset: u64,
}

impl LocalEntry {
    /// `30 + len(filename) + len(extra_field)`: the on-disk size of the
    /// local header, not counting the entry's compressed payload.
    pub fn header_size(&self) -> u64 {
        30 + self.filename.len() as u64 + self.extra_field.len() as u64
    }

    fn validate_sizes(&self) -> Result<()> {
        if self.filename.is_empty() {
            return Err(Error::InvalidState("filename must not be empty".into()));
        }
        if self.filename.len() > MAX_FIELD_LEN || self.extra_field.len() > MAX_FIELD_LEN {
            return Err(Error::InvalidState(
                "filename or extra field exceeds 65535 bytes".into(),
            ));
        }
        Ok(())
    }

    /// Reads a local file header at the source's current position.
    pub fn read<R: Read>(r: &mut R) -> Result<Self> {
        let signature = codec::read_u32(r)?;
        if signature != LOCAL_FILE_HEADER_SIGNATURE {
            return Err(Error::Format(format!(
                "bad local file header signature 0x{signature:08x}"
            )));
        }
        let extract_version = codec::read_u16(r)?;
        let gp_bitfield = codec::read_u16(r)?;
        let method_raw = codec::read_u16(r)?;
        let mod_time = codec::read_u16(r)?;
        let mod_date = codec::read_u16(r)?;
        let crc32 = codec::read_u32(r)?;
        let compressed_size = codec::read_u32(r)?;
        let uncompressed_size = codec::read_u32(r)?;
        let filename_len = codec::read_u16(r)? as usize;
        let extra_field_len = codec::read_u16(r)? as usize;

        let filename_bytes = codec::read_bytes(r, filename_len)?;
        let extra_field = codec::read_bytes(r, extra_field_len)?;

        let filename = String::from_utf8(filename_bytes)
            .map_err(|e| Error::Format(format!("non-UTF-8 filename: {e}")))?;

        let method = CompressionMethod::from_u16(method_raw);
        let data_descriptor = gp_bitfield & FLAG_DATA_DESCRIPTOR != 0;

        let valid = !filename.is_empty()
            && !data_descriptor
            && matches!(method, CompressionMethod::Stored | CompressionMethod::Deflated);

        if data_descriptor {
            trace!("local entry {filename:?} uses an unsupported trailing data descriptor");
        }

        Ok(Self {
            filename,
            uncompressed_size,
            compressed_size,
            crc32,
            mtime: time::dos_to_epoch(mod_time, mod_date),
            method,
            extra_field,
            gp_bitfield,
            extract_version,
            writer_version: VERSION_20 | HOST_UNIX,
            valid,
            entry_offset: 0,
        })
    }

    /// Writes this local header. `sizes`/`crc32` may be all-zero placeholders
    /// for the writer's first pass; `ZipOutputBuf::close_entry` rewrites them
    /// in place once known.
    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        self.validate_sizes()?;
        if self.compressed_size as u64 >= 1u64 << 32 || self.uncompressed_size as u64 >= 1u64 << 32
        {
            return Err(Error::InvalidState("entry size exceeds 4 GiB (ZIP64 is out of scope)".into()));
        }

        let (mod_time, mod_date) = time::epoch_to_dos(self.mtime);

        codec::write_u32(w, LOCAL_FILE_HEADER_SIGNATURE)?;
        codec::write_u16(w, VERSION_20)?;
        codec::write_u16(w, self.gp_bitfield)?;
        codec::write_u16(w, self.method.to_u16())?;
        codec::write_u16(w, mod_time)?;
        codec::write_u16(w, mod_date)?;
        codec::write_u32(w, self.crc32)?;
        codec::write_u32(w, self.compressed_size)?;
        codec::write_u32(w, self.uncompressed_size)?;
        codec::write_u16(w, self.filename.len() as u16)?;
        codec::write_u16(w, self.extra_field.len() as u16)?;
        w.write_all(self.filename.as_bytes())?;
        w.write_all(&self.extra_field)?;
        Ok(())
    }

    /// Rewrites the size/CRC fields of an already-written local header in
    /// place, seeking back to `cur_pos` afterward. Requires a seekable sink.
    pub fn backpatch<W: Write + Seek>(&self, w: &mut W) -> Result<()> {
        let cur_pos = w.stream_position()?;
        w.seek(SeekFrom::Start(self.entry_offset + 14))?;
        codec::write_u32(w, self.crc32)?;
        codec::write_u32(w, self.compressed_size)?;
        codec::write_u32(w, self.uncompressed_size)?;
        w.seek(SeekFrom::Start(cur_pos))?;
        Ok(())
    }
}

/// A central directory record: a `LocalEntry` plus the fields only the
/// central directory carries (comment, attributes, the offset back to the
/// local header).
#[derive(Debug, Clone)]
pub struct CentralEntry {
    pub local: LocalEntry,
    pub comment: String,
    pub disk_num_start: u16,
    pub intern_file_attr: u16,
    pub extern_file_attr: u32,
}

/// Default `extern_file_attr` for a writer-created entry: regular file,
/// `rw-rw-r--` (0644) in the high 16 bits, the Unix convention `unzip`/`zip`
/// use for central directory external attributes.
pub const DEFAULT_EXTERN_FILE_ATTR: u32 = 0x81B4_0000;

impl CentralEntry {
    /// `46 + len(filename) + len(extra_field) + len(comment)`: the on-disk
    /// size of this central directory record.
    pub fn header_size(&self) -> u64 {
        46 + self.local.filename.len() as u64
            + self.local.extra_field.len() as u64
            + self.comment.len() as u64
    }

    pub fn filename(&self) -> &str {
        &self.local.filename
    }

    /// Reads one central directory record at the source's current position.
    pub fn read<R: Read>(r: &mut R) -> Result<Self> {
        let signature = codec::read_u32(r)?;
        if signature != CENTRAL_DIRECTORY_SIGNATURE {
            return Err(Error::Format(format!(
                "bad central directory signature 0x{signature:08x}"
            )));
        }
        let writer_version = codec::read_u16(r)?;
        let extract_version = codec::read_u16(r)?;
        let gp_bitfield = codec::read_u16(r)?;
        let method_raw = codec::read_u16(r)?;
        let mod_time = codec::read_u16(r)?;
        let mod_date = codec::read_u16(r)?;
        let crc32 = codec::read_u32(r)?;
        let compressed_size = codec::read_u32(r)?;
        let uncompressed_size = codec::read_u32(r)?;
        let filename_len = codec::read_u16(r)? as usize;
        let extra_field_len = codec::read_u16(r)? as usize;
        let comment_len = codec::read_u16(r)? as usize;
        let disk_num_start = codec::read_u16(r)?;
        let intern_file_attr = codec::read_u16(r)?;
        let extern_file_attr = codec::read_u32(r)?;
        let entry_offset = codec::read_u32(r)?;

        let filename = String::from_utf8(codec::read_bytes(r, filename_len)?)
            .map_err(|e| Error::Format(format!("non-UTF-8 filename: {e}")))?;
        let extra_field = codec::read_bytes(r, extra_field_len)?;
        let comment = String::from_utf8(codec::read_bytes(r, comment_len)?)
            .map_err(|e| Error::Format(format!("non-UTF-8 comment: {e}")))?;

        let method = CompressionMethod::from_u16(method_raw);
        let data_descriptor = gp_bitfield & FLAG_DATA_DESCRIPTOR != 0;
        let valid = !filename.is_empty()
            && !data_descriptor
            && matches!(method, CompressionMethod::Stored | CompressionMethod::Deflated);

        Ok(Self {
            local: LocalEntry {
                filename,
                uncompressed_size,
                compressed_size,
                crc32,
                mtime: time::dos_to_epoch(mod_time, mod_date),
                method,
                extra_field,
                gp_bitfield,
                extract_version,
                writer_version,
                valid,
                entry_offset: entry_offset as u64,
            },
            comment,
            disk_num_start,
            intern_file_attr,
            extern_file_attr,
        })
    }

    /// Writes this central directory record.
    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        self.local.validate_sizes()?;
        if self.comment.len() > MAX_FIELD_LEN {
            return Err(Error::InvalidState("comment exceeds 65535 bytes".into()));
        }
        if self.local.entry_offset >= 1u64 << 32 {
            return Err(Error::InvalidState(
                "local header offset exceeds 4 GiB (ZIP64 is out of scope)".into(),
            ));
        }

        let (mod_time, mod_date) = time::epoch_to_dos(self.local.mtime);

        codec::write_u32(w, CENTRAL_DIRECTORY_SIGNATURE)?;
        codec::write_u16(w, VERSION_20 | HOST_UNIX)?;
        codec::write_u16(w, VERSION_20)?;
        codec::write_u16(w, self.local.gp_bitfield)?;
        codec::write_u16(w, self.local.method.to_u16())?;
        codec::write_u16(w, mod_time)?;
        codec::write_u16(w, mod_date)?;
        codec::write_u32(w, self.local.crc32)?;
        codec::write_u32(w, self.local.compressed_size)?;
        codec::write_u32(w, self.local.uncompressed_size)?;
        codec::write_u16(w, self.local.filename.len() as u16)?;
        codec::write_u16(w, self.local.extra_field.len() as u16)?;
        codec::write_u16(w, self.comment.len() as u16)?;
        codec::write_u16(w, self.disk_num_start)?;
        codec::write_u16(w, self.intern_file_attr)?;
        codec::write_u32(w, self.extern_file_attr)?;
        codec::write_u32(w, self.local.entry_offset as u32)?;
        w.write_all(self.local.filename.as_bytes())?;
        w.write_all(&self.local.extra_field)?;
        w.write_all(self.comment.as_bytes())?;
        Ok(())
    }
}

/// The end-of-central-directory record: the trailer that anchors the whole
/// archive and is located by scanning backward from the end of the file.
#[derive(Debug, Clone)]
pub struct EndOfCentralDirectory {
    pub total_count: u16,
    pub cdir_size: u32,
    pub cdir_offset: u32,
    pub archive_comment: String,
}

/// Bytes of fixed EOCD fields after the 4-byte signature.
const EOCD_FIXED_LEN: u64 = 18;
/// `EOCD_FIXED_LEN` plus the signature itself.
const EOCD_RECORD_LEN: u64 = EOCD_FIXED_LEN + 4;
/// The largest comment a length-prefixed 16-bit field allows, so the widest
/// an EOCD record (and thus the tail we need to search) can ever be.
const MAX_EOCD_TAIL: u64 = EOCD_RECORD_LEN + MAX_FIELD_LEN as u64;

impl EndOfCentralDirectory {
    /// Parses an EOCD record out of a buffer that starts exactly at its
    /// signature (as returned by [`locate`]).
    pub fn parse(mut body: &[u8]) -> Result<Self> {
        let signature = codec::read_u32(&mut body)?;
        if signature != END_OF_CENTRAL_DIRECTORY_SIGNATURE {
            return Err(Error::Format("bad end-of-central-directory signature".into()));
        }
        let _this_disk = codec::read_u16(&mut body)?;
        let _disk_with_cdir = codec::read_u16(&mut body)?;
        let _entries_this_disk = codec::read_u16(&mut body)?;
        let total_count = codec::read_u16(&mut body)?;
        let cdir_size = codec::read_u32(&mut body)?;
        let cdir_offset = codec::read_u32(&mut body)?;
        let comment_len = codec::read_u16(&mut body)? as usize;
        let archive_comment = String::from_utf8(codec::read_bytes(&mut body, comment_len)?)
            .map_err(|e| Error::Format(format!("non-UTF-8 archive comment: {e}")))?;

        Ok(Self {
            total_count,
            cdir_size,
            cdir_offset,
            archive_comment,
        })
    }

    /// Locates the EOCD record in a seekable source, returning its absolute
    /// byte offset.
    ///
    /// The record lies somewhere in the last 65 557 bytes of the file (22
    /// fixed bytes plus up to a 65 535-byte comment). We read that tail,
    /// scan backward for the signature, and for each candidate verify that
    /// `p + 22 + comment_len == file_size` — the only way to distinguish a
    /// genuine EOCD from the signature bytes happening to occur inside an
    /// earlier comment or filename.
    pub fn locate<R: Read + Seek>(r: &mut R) -> Result<u64> {
        let file_size = r.seek(SeekFrom::End(0))?;
        let tail_len = MAX_EOCD_TAIL.min(file_size);
        let tail_start = file_size - tail_len;

        r.seek(SeekFrom::Start(tail_start))?;
        let mut tail = vec![0u8; tail_len as usize];
        r.read_exact(&mut tail)?;

        let sig = END_OF_CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes();
        for start in (0..tail.len().saturating_sub(3)).rev() {
            if tail[start..start + 4] != sig {
                continue;
            }
            if start + 20 + 2 > tail.len() {
                continue;
            }
            let comment_len = u16::from_le_bytes([tail[start + 20], tail[start + 21]]) as u64;
            let candidate_offset = tail_start + start as u64;
            if candidate_offset + EOCD_RECORD_LEN + comment_len == file_size {
                return Ok(candidate_offset);
            }
        }

        Err(Error::Format(
            "couldn't find end of central directory record".into(),
        ))
    }

    /// Writes this EOCD record: disk fields are always zero (single-volume
    /// archives only), and `total_count` is written twice as the format
    /// requires (entries-on-this-disk, then total-entries).
    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        if self.archive_comment.len() > MAX_FIELD_LEN {
            return Err(Error::InvalidState(
                "archive comment exceeds 65535 bytes".into(),
            ));
        }
        codec::write_u32(w, END_OF_CENTRAL_DIRECTORY_SIGNATURE)?;
        codec::write_u16(w, 0)?; // this disk
        codec::write_u16(w, 0)?; // disk with central directory
        codec::write_u16(w, self.total_count)?;
        codec::write_u16(w, self.total_count)?;
        codec::write_u32(w, self.cdir_size)?;
        codec::write_u32(w, self.cdir_offset)?;
        codec::write_u16(w, self.archive_comment.len() as u16)?;
        w.write_all(self.archive_comment.as_bytes())?;
        Ok(())
    }
}
