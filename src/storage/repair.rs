use std::fs;
use tracing::info;

use super::Storage;
use crate::parity;

impl Storage {
    /// Rebuilds every fragment of a lost block from the surviving blocks.
    ///
    /// XOR parity is symmetric, so a data block and the parity block are
    /// reconstructed the same way: the lost fragment is the XOR of the N-1
    /// surviving fragments. The filenames in the first surviving block are
    /// taken as the set of files to rebuild, which presumes the survivors
    /// are consistent; repair earlier damage first.
    ///
    /// Idempotent: rebuilding the same block twice reproduces the same
    /// bytes.
    pub fn fix_block(&self, block_id: usize) -> Result<(), Box<dyn std::error::Error>> {
        if block_id >= self.num_blocks() {
            return Err(format!(
                "block {block_id} is out of range (stripe width {})",
                self.num_blocks()
            )
            .into());
        }

        let target = &self.block_paths[block_id];
        let survivors: Vec<_> = self
            .block_paths
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != block_id)
            .map(|(_, path)| path)
            .collect();

        // The block may be gone entirely, directory included.
        fs::create_dir_all(target)?;

        for entry in fs::read_dir(survivors[0])? {
            let entry = entry?;
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name();

            let fragments = survivors
                .iter()
                .map(|block| fs::read(block.join(&name)))
                .collect::<Result<Vec<_>, _>>()?;
            let rebuilt = parity::parity(&fragments);

            fs::write(target.join(&name), &rebuilt)?;
            info!(file = ?name, block = block_id, "fragment rebuilt");
        }

        Ok(())
    }
}
