//! Error types for haardb

use thiserror::Error;

/// Errors surfaced by the public API.
///
/// `Image` and `Param` are recoverable: the caller may retry with different
/// input. `Catalog` and `Data` are fatal; the engine is left consistent but
/// further use of the handle is discouraged. Soft misses (an unknown post on
/// lookup or removal) are reported as `Option`/no-op, never as an error.
#[derive(Debug, Error)]
pub enum Error {
    /// The decoder rejected the supplied image bytes.
    #[error("could not read image: {0}")]
    Image(#[from] image::ImageError),

    /// An argument was invalid, e.g. a zero result count or a malformed
    /// signature hash.
    #[error("invalid argument: {0}")]
    Param(String),

    /// I/O or schema failure in the durable catalog.
    #[error("catalog error: {0}")]
    Catalog(#[from] rusqlite::Error),

    /// A stored record is internally inconsistent (wrong blob size,
    /// out-of-range coefficient index).
    #[error("corrupt signature data: {0}")]
    Data(String),
}

pub type Result<T> = std::result::Result<T, Error>;
