//! # rzipc: ZIP and single-member GZIP archive access
//!
//! `rzipc` reads and writes PKZIP archives and single-member GZIP streams
//! without ever materializing a whole archive or entry in memory: entries
//! are indexed from the central directory once, then read and written as
//! byte streams layered directly over the compression codec.
//!
//! ## Reading a ZIP archive
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::Read;
//! use rzipc::{MatchMode, ZipArchive};
//!
//! # fn main() -> rzipc::Result<()> {
//! let mut archive = ZipArchive::new(File::open("archive.zip")?)?;
//! for entry in archive.entries() {
//!     println!("{}: {} bytes", entry.filename(), entry.local.uncompressed_size);
//! }
//!
//! let mut out = Vec::new();
//! archive.get_input_stream("file.txt", MatchMode::Ignore)?.read_to_end(&mut out)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Writing a ZIP archive
//!
//! ```no_run
//! use std::fs::File;
//! use rzipc::ZipWriter;
//!
//! # fn main() -> rzipc::Result<()> {
//! let mut writer = ZipWriter::new(File::create("output.zip")?);
//! writer.start_entry("file1.txt")?;
//! writer.write_data(b"Hello, World!")?;
//! writer.start_stored_entry("file2.txt")?;
//! writer.write_data(b"Another file")?;
//! writer.finish()?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod collection;
pub mod deflate;
pub mod entry;
pub mod error;
pub mod gzip;
pub mod inflate;
pub mod index;
pub mod reader;
pub mod time;
pub mod writer;

pub use collection::Collection;
pub use deflate::DeflateOutputBuf;
pub use entry::{CentralEntry, CompressionMethod, EndOfCentralDirectory, LocalEntry};
pub use error::{Error, Result};
pub use gzip::{GzipInputBuf, GzipOutputBuf};
pub use inflate::InflateInputBuf;
pub use index::{Index, MatchMode};
pub use reader::{EntryReader, ZipArchive, ZipInputBuf};
pub use writer::{ZipOutputBuf, ZipWriter};
