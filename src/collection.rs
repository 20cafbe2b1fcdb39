//! A name-indexed facade over a set of entries, implemented by
//! [`ZipArchive`](crate::reader::ZipArchive). A directory tree walked at
//! lookup time could implement the same trait, but that's out of scope here
//! — the trait exists so callers can be written against "an indexed
//! collection of named byte streams" without hard-coding the ZIP backend.

use std::io::{Read, Seek};

use crate::entry::CentralEntry;
use crate::error::Result;
use crate::index::MatchMode;
use crate::reader::{EntryReader, ZipArchive};

/// An indexed, name-addressable collection of byte-stream entries.
pub trait Collection {
    /// The concrete entry metadata type this collection indexes.
    type Entry;
    /// The reader type returned by `get_input_stream`, borrowed for as long
    /// as the caller is reading that entry.
    type Stream<'a>: Read
    where
        Self: 'a;

    /// All entries, in the collection's natural order.
    fn entries(&self) -> &[Self::Entry];

    /// The number of entries in the collection.
    fn size(&self) -> usize;

    /// Looks up an entry's metadata by name without opening it.
    fn get_entry(&self, name: &str, mode: MatchMode) -> Option<&Self::Entry>;

    /// Opens an entry's decompressed byte stream by name.
    fn get_input_stream<'a>(
        &'a mut self,
        name: &str,
        mode: MatchMode,
    ) -> Result<Self::Stream<'a>>;

    /// Releases any resources held by the collection. Further lookups may
    /// fail after this is called.
    fn close(&mut self);
}

impl<R: Read + Seek> Collection for ZipArchive<R> {
    type Entry = CentralEntry;
    type Stream<'a>
        = EntryReader<'a, R>
    where
        R: 'a;

    fn entries(&self) -> &[CentralEntry] {
        ZipArchive::entries(self)
    }

    fn size(&self) -> usize {
        ZipArchive::len(self)
    }

    fn get_entry(&self, name: &str, mode: MatchMode) -> Option<&CentralEntry> {
        ZipArchive::get_entry(self, name, mode)
    }

    fn get_input_stream<'a>(
        &'a mut self,
        name: &str,
        mode: MatchMode,
    ) -> Result<EntryReader<'a, R>> {
        ZipArchive::get_input_stream(self, name, mode)
    }

    fn close(&mut self) {
        ZipArchive::close(self)
    }
}
