//! Error types for rtl-epub operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while converting an EPUB to a right-to-left layout.
#[derive(Error, Debug)]
pub enum Error {
    #[error("input not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("archive is corrupt: {0}")]
    ArchiveCorrupt(#[source] zip::result::ZipError),

    #[error("package manifest missing: no entry at {}", .0.display())]
    ManifestMissing(PathBuf),

    #[error("package manifest is malformed: {0}")]
    ManifestMalformed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

pub type Result<T> = std::result::Result<T, Error>;
