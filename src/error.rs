//! Error types for epub2html operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while flattening an EPUB.
///
/// Every variant is terminal: the pipeline has no partial-success mode.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The container descriptor is missing, unparsable, or has no rootfile.
    #[error("Malformed archive: {0}")]
    MalformedArchive(String),

    /// The package document lacks `package`, `manifest` or `spine`.
    #[error("Malformed package document: {0}")]
    MalformedPackage(String),

    /// No navigation document could be located or it has no navigation map.
    #[error("Malformed table of contents: {0}")]
    MalformedToc(String),

    /// A spine idref has no manifest entry.
    #[error("Spine item '{idref}' is not declared in the manifest")]
    MissingResource { idref: String },

    /// A chapter file has no body element.
    #[error("Chapter '{path}' has no body element")]
    MalformedChapter { path: String },

    /// A stylesheet or script could not be found in any search location.
    #[error("File '{name}' not found in any of {} search locations", searched.len())]
    ResourceNotFound { name: String, searched: Vec<PathBuf> },
}

pub type Result<T> = std::result::Result<T, Error>;
