//! CSV archiving functionality
//!
//! Archives are written into the session's `arch` directory, one record per
//! row.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use std::path::Path;
use std::fs::{File, OpenOptions};
use csv::WriterBuilder;
pub use csv::Writer;
use serde::Serialize;
use thiserror::Error;

// Internal imports
use crate::session::Session;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An object used to write CSV archive files.
pub struct Archiver {
    writer: Writer<File>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur while archiving.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Cannot create the archive file: {0}")]
    CreateError(std::io::Error),

    #[error("Cannot serialise the record: {0}")]
    SerialiseError(csv::Error),

    #[error("Cannot flush the archive file: {0}")]
    FlushError(std::io::Error)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Archiver {
    /// Create a new archiver from a paricular path relative to the session's
    /// archive root.
    pub fn from_path<P: AsRef<Path>>(
        session: &Session, path: P
    ) -> Result<Self, ArchiveError> {
        Self::from_full_path(session.arch_root.join(path))
    }

    /// Create a new archiver writing to the given filesystem path. Any
    /// missing parent directories are created and an existing file is
    /// truncated.
    pub fn from_full_path<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(ArchiveError::CreateError)?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(ArchiveError::CreateError)?;

        let writer = WriterBuilder::new()
            .has_headers(true)
            .from_writer(file);

        Ok(Self { writer })
    }

    /// Serialise a record into the archive.
    pub fn serialise<T: Serialize>(&mut self, record: T) -> Result<(), ArchiveError> {
        self.writer.serialize(record).map_err(ArchiveError::SerialiseError)?;
        self.writer.flush().map_err(ArchiveError::FlushError)
    }
}
