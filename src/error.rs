//! Error types for rzipc

use thiserror::Error;

/// Result type for rzipc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during archive operations
#[derive(Debug, Error)]
pub enum Error {
    /// An error from the underlying byte source or sink
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// A filename or comment wasn't valid UTF-8
    #[error("invalid UTF-8 in archive metadata")]
    Encoding(#[from] std::str::Utf8Error),

    /// The archive violates the ZIP/GZIP format: a bad signature, a truncated
    /// record, or an explicitly unsupported feature (ZIP64, spanning, data
    /// descriptors).
    #[error("invalid archive: {0}")]
    Format(String),

    /// The caller misused the API: writing to a finished archive, exceeding a
    /// size cap, or writing to a sink that can't be seeked for back-patching.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// No entry in the archive matched the requested name.
    #[error("no entry named {0:?} in archive")]
    NotFound(String),

    /// The collection has already been closed.
    #[error("collection is closed")]
    Closed,

    /// The entry uses a compression method this crate doesn't implement.
    #[error("unsupported compression method {0}")]
    UnsupportedCompression(u16),
}
