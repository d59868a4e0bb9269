//! Block device abstraction: a fixed-size array of 4096-byte blocks, with a
//! transaction scope that snapshots dirtied blocks on `begin` and restores
//! them on `rollback`.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::Result;

/// Size of one block, in bytes.
pub const BLOCK_SIZE: usize = 4096;

/// One block's worth of bytes.
pub type Block = [u8; BLOCK_SIZE];

/// A block-addressable storage device with transactional write semantics.
///
/// Between `begin_transaction` and `commit`/`rollback` no external observer
/// sees partial state; the device assumes a single mutator and does not
/// support nested transactions.
pub trait Disk {
    /// Reads block `index` in full. Infallible for indices in range.
    fn read_block(&mut self, index: u32) -> Result<Block>;

    /// Persists `data` as block `index`. If a transaction is open and this
    /// is the first write to `index` within it, the block's pre-image is
    /// recorded before the new data is written.
    fn write_block(&mut self, index: u32, data: &Block) -> Result<()>;

    /// Opens a write-tracking scope. Panics (via `debug_assert`) if a
    /// transaction is already open — nesting is not supported.
    fn begin_transaction(&mut self);

    /// Discards recorded pre-images, finalizing all writes made during the
    /// transaction.
    fn commit(&mut self);

    /// Restores every block's pre-image recorded since `begin_transaction`
    /// and discards them, undoing all writes made during the transaction.
    fn rollback(&mut self) -> Result<()>;
}

/// Shared transaction bookkeeping used by every `Disk` implementation: a map
/// from block index to its pre-image, populated lazily on first write.
#[derive(Default)]
struct Journal {
    open: bool,
    preimages: HashMap<u32, Block>,
}

impl Journal {
    fn begin(&mut self) {
        debug_assert!(!self.open, "nested transactions are not supported");
        self.open = true;
        self.preimages.clear();
    }

    fn record_preimage(&mut self, index: u32, current: Block) {
        if self.open {
            self.preimages.entry(index).or_insert(current);
        }
    }

    fn commit(&mut self) {
        self.open = false;
        self.preimages.clear();
    }

    fn take_rollback_set(&mut self) -> HashMap<u32, Block> {
        self.open = false;
        std::mem::take(&mut self.preimages)
    }
}

/// An in-memory disk, useful for tests and for the public engine tests that
/// must run without a real file on disk.
pub struct MemDisk {
    blocks: Vec<Block>,
    journal: Journal,
}

impl MemDisk {
    /// Creates a disk of `num_blocks` zeroed blocks.
    pub fn new(num_blocks: usize) -> Self {
        Self {
            blocks: vec![[0u8; BLOCK_SIZE]; num_blocks],
            journal: Journal::default(),
        }
    }
}

impl Disk for MemDisk {
    fn read_block(&mut self, index: u32) -> Result<Block> {
        Ok(self.blocks[index as usize])
    }

    fn write_block(&mut self, index: u32, data: &Block) -> Result<()> {
        let current = self.blocks[index as usize];
        self.journal.record_preimage(index, current);
        self.blocks[index as usize] = *data;
        Ok(())
    }

    fn begin_transaction(&mut self) {
        self.journal.begin();
    }

    fn commit(&mut self) {
        self.journal.commit();
    }

    fn rollback(&mut self) -> Result<()> {
        for (index, preimage) in self.journal.take_rollback_set() {
            self.blocks[index as usize] = preimage;
        }
        Ok(())
    }
}

/// A disk backed by a fixed-size file on the host filesystem — the image
/// format the CLI tools and the HTTP daemon operate on.
pub struct FileDisk {
    file: File,
    journal: Journal,
}

impl FileDisk {
    /// Opens an existing disk image for read/write access.
    pub fn open(file: File) -> Self {
        Self {
            file,
            journal: Journal::default(),
        }
    }

    fn read_raw(&mut self, index: u32) -> Result<Block> {
        let mut buf = [0u8; BLOCK_SIZE];
        self.file
            .seek(SeekFrom::Start(index as u64 * BLOCK_SIZE as u64))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn write_raw(&mut self, index: u32, data: &Block) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(index as u64 * BLOCK_SIZE as u64))?;
        self.file.write_all(data)?;
        Ok(())
    }
}

impl Disk for FileDisk {
    fn read_block(&mut self, index: u32) -> Result<Block> {
        self.read_raw(index)
    }

    fn write_block(&mut self, index: u32, data: &Block) -> Result<()> {
        let current = self.read_raw(index)?;
        self.journal.record_preimage(index, current);
        self.write_raw(index, data)
    }

    fn begin_transaction(&mut self) {
        self.journal.begin();
    }

    fn commit(&mut self) {
        self.journal.commit();
    }

    fn rollback(&mut self) -> Result<()> {
        for (index, preimage) in self.journal.take_rollback_set() {
            self.write_raw(index, &preimage)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rollback_restores_preimage() {
        let mut disk = MemDisk::new(4);
        disk.write_block(1, &[7u8; BLOCK_SIZE]).unwrap();
        disk.begin_transaction();
        disk.write_block(1, &[9u8; BLOCK_SIZE]).unwrap();
        disk.write_block(2, &[1u8; BLOCK_SIZE]).unwrap();
        disk.rollback().unwrap();
        assert_eq!(disk.read_block(1).unwrap(), [7u8; BLOCK_SIZE]);
        assert_eq!(disk.read_block(2).unwrap(), [0u8; BLOCK_SIZE]);
    }

    #[test]
    fn commit_keeps_writes() {
        let mut disk = MemDisk::new(4);
        disk.begin_transaction();
        disk.write_block(0, &[3u8; BLOCK_SIZE]).unwrap();
        disk.commit();
        assert_eq!(disk.read_block(0).unwrap(), [3u8; BLOCK_SIZE]);
    }

    #[test]
    fn only_first_write_in_scope_is_recorded() {
        let mut disk = MemDisk::new(2);
        disk.write_block(0, &[1u8; BLOCK_SIZE]).unwrap();
        disk.begin_transaction();
        disk.write_block(0, &[2u8; BLOCK_SIZE]).unwrap();
        disk.write_block(0, &[3u8; BLOCK_SIZE]).unwrap();
        disk.rollback().unwrap();
        assert_eq!(disk.read_block(0).unwrap(), [1u8; BLOCK_SIZE]);
    }
}
