//! Striped-parity file engine.
//!
//! Every logical file is stored as one fragment per block directory. The
//! first N-1 blocks carry contiguous slices of the payload, the last block
//! carries their XOR parity, so any single lost block can be rebuilt from
//! the survivors.

use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::parity;
use crate::storage::models::FileDescriptor;

pub mod models;

mod integrity;
mod repair;
mod tests;

/// Owns the N sibling block directories and performs all fragment I/O.
///
/// No other component reads or writes under the block roots while the
/// engine is live.
pub struct Storage {
    block_paths: Vec<PathBuf>,
}

impl Storage {
    /// Opens a store rooted at `root`, resolving block `i` to
    /// `<root>/<prefix>-<i>` and creating any missing block directories.
    ///
    /// Idempotent across restarts. Fails when `num_blocks < 3`: a stripe
    /// needs at least two data blocks plus the parity block.
    pub fn open(root: &Path, prefix: &str, num_blocks: usize) -> io::Result<Self> {
        if num_blocks < 3 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "stripe width must be at least 3",
            ));
        }

        let block_paths: Vec<PathBuf> = (0..num_blocks)
            .map(|i| root.join(format!("{prefix}-{i}")))
            .collect();
        for path in &block_paths {
            if !path.is_dir() {
                warn!("creating block directory {}", path.display());
                fs::create_dir_all(path)?;
            }
        }

        Ok(Storage { block_paths })
    }

    /// Stripe width N, parity block included.
    pub fn num_blocks(&self) -> usize {
        self.block_paths.len()
    }

    /// Directory of block `block_id`.
    pub fn block_path(&self, block_id: usize) -> &Path {
        &self.block_paths[block_id]
    }

    /// The N sibling paths a logical file occupies, in block order.
    fn fragment_paths(&self, filename: &str) -> Vec<PathBuf> {
        self.block_paths
            .iter()
            .map(|block| block.join(filename))
            .collect()
    }

    /// Stores `content` as a parity-protected stripe under `filename`.
    ///
    /// The payload is partitioned into N-1 contiguous segments, padded to a
    /// common length, and the XOR parity segment is appended; the N fragment
    /// writes run in parallel. Returns the descriptor echoed to clients.
    ///
    /// The caller is responsible for rejecting payloads outside the admitted
    /// content domain (UTF-8 text without NUL bytes) beforehand; a payload
    /// that slips through and is not UTF-8 fails here without any fragment
    /// having been written.
    pub fn create_file(
        &self,
        filename: &str,
        content_type: Option<&str>,
        content: &[u8],
    ) -> Result<FileDescriptor, Box<dyn std::error::Error>> {
        let text = std::str::from_utf8(content)
            .map_err(|_| "payload is not valid UTF-8 text")?
            .to_string();

        let mut segments = split_into_segments(content, self.num_blocks() - 1);
        segments.push(parity::parity(&segments));

        self.block_paths
            .par_iter()
            .zip(segments.par_iter())
            .try_for_each(|(block, segment)| fs::write(block.join(filename), segment))?;

        Ok(FileDescriptor {
            name: filename.to_string(),
            size: content.len() as u64,
            checksum: format!("{:x}", md5::compute(content)),
            content: text,
            content_type: content_type.unwrap_or("application/octet-stream").to_string(),
        })
    }

    /// Reassembles the payload from the N-1 data fragments.
    ///
    /// A data fragment ending in `0x00` carries one pad byte, which is
    /// stripped; within the admitted content domain this is exact. The
    /// caller gates on the integrity check first.
    pub fn retrieve_file(&self, filename: &str) -> io::Result<Vec<u8>> {
        let mut content = Vec::new();
        for block in &self.block_paths[..self.num_blocks() - 1] {
            let mut fragment = fs::read(block.join(filename))?;
            if fragment.last() == Some(&0) {
                fragment.pop();
            }
            content.extend_from_slice(&fragment);
        }
        Ok(content)
    }

    /// Replaces a stripe: delete then create. Not atomic; a crash in
    /// between leaves no file, which the next integrity check reports as
    /// absent.
    pub fn update_file(
        &self,
        filename: &str,
        content_type: Option<&str>,
        content: &[u8],
    ) -> Result<FileDescriptor, Box<dyn std::error::Error>> {
        self.delete_file(filename)?;
        self.create_file(filename, content_type, content)
    }

    /// Removes every fragment of `filename`. Fragments already missing are
    /// skipped, so deleting a partial or absent stripe succeeds.
    pub fn delete_file(&self, filename: &str) -> io::Result<()> {
        for path in self.fragment_paths(filename) {
            if path.is_file() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

/// Partitions `content` into `k` contiguous data segments of a common length.
///
/// With `d = len div k` and `m = len mod k`, the first `m` segments take
/// `d+1` raw bytes and the rest take `d`. When `m > 0` every short segment
/// is extended with a single `0x00` byte, bringing all segments to
/// `ceil(len / k)`; when `m = 0` nothing is padded. Parity is computed over
/// the padded segments.
fn split_into_segments(content: &[u8], k: usize) -> Vec<Vec<u8>> {
    let d = content.len() / k;
    let m = content.len() % k;
    let target = if m > 0 { d + 1 } else { d };

    let mut segments = Vec::with_capacity(k + 1);
    let mut offset = 0;
    for i in 0..k {
        let raw = if i < m { d + 1 } else { d };
        let mut segment = content[offset..offset + raw].to_vec();
        offset += raw;
        if segment.len() < target {
            segment.push(0);
        }
        segments.push(segment);
    }
    segments
}
