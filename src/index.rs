//! The in-memory catalog of an archive's entries: insertion-ordered storage
//! plus name-based lookup in two modes.

use std::collections::HashMap;

use crate::entry::CentralEntry;

/// How [`Index::lookup`] matches a query against a stored filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// The query must equal the stored filename exactly.
    Ignore,
    /// The query matches if it equals the stored filename, or if the stored
    /// filename ends in `"/" + query` — i.e. the query names a path tail.
    Match,
}

/// Returns true if `query` matches `candidate` under the tail relation: they
/// are equal, or `candidate` ends in `"/"` followed by `query`.
fn tail_matches(candidate: &str, query: &str) -> bool {
    if candidate == query {
        return true;
    }
    let Some(prefix_len) = candidate.len().checked_sub(query.len() + 1) else {
        return false;
    };
    candidate.as_bytes().get(prefix_len) == Some(&b'/') && &candidate[prefix_len + 1..] == query
}

/// An ordered sequence of central directory entries plus an accelerated
/// name lookup. Insertion order is preserved for both iteration and for
/// "first hit wins" lookup semantics.
#[derive(Debug, Default)]
pub struct Index {
    entries: Vec<CentralEntry>,
    by_name: HashMap<String, Vec<usize>>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: CentralEntry) {
        let pos = self.entries.len();
        self.by_name
            .entry(entry.filename().to_string())
            .or_default()
            .push(pos);
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, in insertion (central directory) order.
    pub fn entries(&self) -> &[CentralEntry] {
        &self.entries
    }

    /// Looks up an entry by name under the given match mode, returning the
    /// first hit in insertion order.
    pub fn lookup(&self, name: &str, mode: MatchMode) -> Option<&CentralEntry> {
        match mode {
            MatchMode::Ignore => {
                let candidates = self.by_name.get(name)?;
                let first = *candidates.iter().min()?;
                Some(&self.entries[first])
            }
            MatchMode::Match => self
                .entries
                .iter()
                .find(|e| tail_matches(e.filename(), name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{CompressionMethod, LocalEntry};

    fn entry(name: &str) -> CentralEntry {
        CentralEntry {
            local: LocalEntry {
                filename: name.to_string(),
                uncompressed_size: 0,
                compressed_size: 0,
                crc32: 0,
                mtime: 0,
                method: CompressionMethod::Stored,
                extra_field: Vec::new(),
                gp_bitfield: 0,
                extract_version: 20,
                writer_version: 20,
                valid: true,
                entry_offset: 0,
            },
            comment: String::new(),
            disk_num_start: 0,
            intern_file_attr: 0,
            extern_file_attr: 0,
        }
    }

    #[test]
    fn exact_lookup_finds_first_match_by_insertion_order() {
        let mut idx = Index::new();
        idx.append(entry("x"));
        idx.append(entry("y"));
        idx.append(entry("z"));
        assert_eq!(idx.lookup("y", MatchMode::Ignore).unwrap().filename(), "y");
        assert!(idx.lookup("w", MatchMode::Ignore).is_none());
    }

    #[test]
    fn path_tail_match_picks_first_insertion_order_hit() {
        let mut idx = Index::new();
        idx.append(entry("src/lib/x.h"));
        idx.append(entry("include/x.h"));
        let found = idx.lookup("x.h", MatchMode::Match).unwrap();
        assert_eq!(found.filename(), "src/lib/x.h");
    }

    #[test]
    fn ignore_mode_does_not_match_on_path_tail() {
        let mut idx = Index::new();
        idx.append(entry("src/lib/x.h"));
        assert!(idx.lookup("x.h", MatchMode::Ignore).is_none());
    }
}
