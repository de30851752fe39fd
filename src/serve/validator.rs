use poem::http::StatusCode;
use tracing::{error, info};

use crate::storage::{Storage, models::FileDescriptor};

/// Pre-checks in front of the file engine.
///
/// Every operation gates on the integrity check, so by the time the engine
/// runs, the stripe is either known-good or already purged. Domain outcomes
/// are translated into HTTP errors here: conflict for a create over an
/// intact stripe, not-found for anything else over a missing or purged one,
/// payload-too-large for the size cap, bad-request for payloads or
/// filenames outside the admitted domain. Unexpected I/O failures map to
/// internal server errors.
pub struct Validator {
    storage: Storage,
    max_size: usize,
}

impl Validator {
    pub fn new(storage: Storage, max_size: usize) -> Self {
        Validator { storage, max_size }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn create_file(
        &self,
        filename: &str,
        content_type: Option<&str>,
        content: &[u8],
    ) -> Result<FileDescriptor, poem::Error> {
        check_filename(filename)?;
        if self.gate(filename)? {
            return Err(poem::Error::from_string(
                "File already exists",
                StatusCode::CONFLICT,
            ));
        }
        self.check_payload(content)?;
        self.storage
            .create_file(filename, content_type, content)
            .map_err(internal)
    }

    pub fn retrieve_file(&self, filename: &str) -> Result<Vec<u8>, poem::Error> {
        check_filename(filename)?;
        if !self.gate(filename)? {
            return Err(not_found());
        }
        self.storage.retrieve_file(filename).map_err(internal)
    }

    pub fn update_file(
        &self,
        filename: &str,
        content_type: Option<&str>,
        content: &[u8],
    ) -> Result<FileDescriptor, poem::Error> {
        check_filename(filename)?;
        if !self.gate(filename)? {
            return Err(not_found());
        }
        self.check_payload(content)?;
        self.storage
            .update_file(filename, content_type, content)
            .map_err(internal)
    }

    pub fn delete_file(&self, filename: &str) -> Result<(), poem::Error> {
        check_filename(filename)?;
        if !self.gate(filename)? {
            return Err(not_found());
        }
        self.storage.delete_file(filename).map_err(internal)
    }

    pub fn fix_block(&self, block_id: usize) -> Result<(), poem::Error> {
        if block_id >= self.storage.num_blocks() {
            return Err(poem::Error::from_string(
                format!("block {block_id} is out of range"),
                StatusCode::BAD_REQUEST,
            ));
        }
        self.storage.fix_block(block_id).map_err(internal)
    }

    /// Runs the integrity gate, purging wreckage as a side effect.
    fn gate(&self, filename: &str) -> Result<bool, poem::Error> {
        let intact = self.storage.integrity_or_purge(filename).map_err(internal)?;
        if !intact {
            info!(filename, "stripe not intact, purged");
        }
        Ok(intact)
    }

    fn check_payload(&self, content: &[u8]) -> Result<(), poem::Error> {
        if content.len() > self.max_size {
            return Err(poem::Error::from_string(
                "File too large",
                StatusCode::PAYLOAD_TOO_LARGE,
            ));
        }
        // The pad-stripping retrieve path is only exact for payloads that
        // cannot legitimately end a fragment with 0x00.
        if content.contains(&0) || std::str::from_utf8(content).is_err() {
            return Err(poem::Error::from_string(
                "Content must be UTF-8 text without NUL bytes",
                StatusCode::BAD_REQUEST,
            ));
        }
        Ok(())
    }
}

/// Fragment names are single path components; anything else would escape
/// the block directories the engine owns.
fn check_filename(filename: &str) -> Result<(), poem::Error> {
    if filename.is_empty()
        || filename == "."
        || filename == ".."
        || filename.contains(['/', '\\'])
    {
        return Err(poem::Error::from_string(
            "Invalid filename",
            StatusCode::BAD_REQUEST,
        ));
    }
    Ok(())
}

fn not_found() -> poem::Error {
    poem::Error::from_string("File not found", StatusCode::NOT_FOUND)
}

fn internal<E: std::fmt::Display>(err: E) -> poem::Error {
    error!("storage failure: {err}");
    poem::Error::from_string(err.to_string(), StatusCode::INTERNAL_SERVER_ERROR)
}
