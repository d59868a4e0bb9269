//! The file system engine: inode region I/O, `lookup`, `stat`, `read`,
//! `write`, `create`, `unlink`. This is the core described in §4 of the
//! specification — every mutating method here writes whole regions/bitmaps
//! back, never partial ones, and leaves transaction discipline to the
//! caller (the `service` module wraps each mutating public operation in
//! one `Disk` transaction).

use log::debug;

use crate::bitmap;
use crate::block::{Block, Disk, BLOCK_SIZE};
use crate::error::{Error, Result};
use crate::inode::{DirEntry, Inode, InodeType, DIRECT_PTRS, DIR_ENT_SIZE, MAX_FILE_SIZE};
use crate::layout::Superblock;

/// Inode number of the root directory.
pub const ROOT_INODE: u32 = 0;

/// The file system engine bound to one block device. The superblock is
/// read once and cached, matching the spec's "written once at image
/// creation; read-only thereafter at the file system layer."
pub struct FileSystem<D: Disk> {
    disk: D,
    superblock: Superblock,
}

impl<D: Disk> FileSystem<D> {
    /// Opens an already-formatted image by reading its superblock.
    pub fn open(mut disk: D) -> Result<Self> {
        let block = disk.read_block(0)?;
        let superblock = Superblock::decode(&block);
        Ok(Self { disk, superblock })
    }

    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    pub fn disk_mut(&mut self) -> &mut D {
        &mut self.disk
    }

    fn entries_per_block(&self) -> usize {
        BLOCK_SIZE / DIR_ENT_SIZE
    }

    // ---- region I/O -----------------------------------------------------

    fn read_bitmap(&mut self, addr: u32, len: u32) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(len as usize * BLOCK_SIZE);
        for i in 0..len {
            out.extend_from_slice(&self.disk.read_block(addr + i)?);
        }
        Ok(out)
    }

    fn write_bitmap(&mut self, addr: u32, len: u32, bitmap: &[u8]) -> Result<()> {
        for i in 0..len {
            let mut block: Block = [0u8; BLOCK_SIZE];
            let start = i as usize * BLOCK_SIZE;
            block.copy_from_slice(&bitmap[start..start + BLOCK_SIZE]);
            self.disk.write_block(addr + i, &block)?;
        }
        Ok(())
    }

    fn read_inode_bitmap(&mut self) -> Result<Vec<u8>> {
        self.read_bitmap(self.superblock.inode_bitmap_addr, self.superblock.inode_bitmap_len)
    }

    fn write_inode_bitmap(&mut self, bitmap: &[u8]) -> Result<()> {
        self.write_bitmap(self.superblock.inode_bitmap_addr, self.superblock.inode_bitmap_len, bitmap)
    }

    fn read_data_bitmap(&mut self) -> Result<Vec<u8>> {
        self.read_bitmap(self.superblock.data_bitmap_addr, self.superblock.data_bitmap_len)
    }

    fn write_data_bitmap(&mut self, bitmap: &[u8]) -> Result<()> {
        self.write_bitmap(self.superblock.data_bitmap_addr, self.superblock.data_bitmap_len, bitmap)
    }

    /// Reads the entire inode region in one sweep of whole blocks.
    fn read_inode_region(&mut self) -> Result<Vec<Inode>> {
        let sb = self.superblock;
        let mut raw = Vec::with_capacity(sb.inode_region_len as usize * BLOCK_SIZE);
        for i in 0..sb.inode_region_len {
            raw.extend_from_slice(&self.disk.read_block(sb.inode_region_addr + i)?);
        }
        let mut inodes = Vec::with_capacity(sb.num_inodes as usize);
        for n in 0..sb.num_inodes as usize {
            let off = n * crate::inode::INODE_SIZE;
            inodes.push(Inode::decode(&raw[off..off + crate::inode::INODE_SIZE]));
        }
        Ok(inodes)
    }

    /// Writes the full inode region back, never only dirtied inodes.
    fn write_inode_region(&mut self, inodes: &[Inode]) -> Result<()> {
        let sb = self.superblock;
        let mut raw = vec![0u8; sb.inode_region_len as usize * BLOCK_SIZE];
        for (n, inode) in inodes.iter().enumerate() {
            let off = n * crate::inode::INODE_SIZE;
            inode.encode(&mut raw[off..off + crate::inode::INODE_SIZE]);
        }
        for i in 0..sb.inode_region_len {
            let mut block: Block = [0u8; BLOCK_SIZE];
            let start = i as usize * BLOCK_SIZE;
            block.copy_from_slice(&raw[start..start + BLOCK_SIZE]);
            self.disk.write_block(sb.inode_region_addr + i, &block)?;
        }
        Ok(())
    }

    // ---- public operations ----------------------------------------------

    /// Returns a copy of the inode record for `inum`. Does not check the
    /// inode bitmap; callers that require liveness must combine `stat`
    /// with a bitmap check or a successful prior `lookup`.
    pub fn stat(&mut self, inum: u32) -> Result<Inode> {
        if inum >= self.superblock.num_inodes {
            return Err(Error::InvalidInode);
        }
        let inodes = self.read_inode_region()?;
        Ok(inodes[inum as usize])
    }

    /// Reads `size` bytes of inode `inum`'s content into `buf`. Does not
    /// update any on-disk state.
    pub fn read(&mut self, inum: u32, buf: &mut [u8], size: usize) -> Result<usize> {
        if inum >= self.superblock.num_inodes {
            return Err(Error::InvalidInode);
        }
        let inode = self.stat(inum)?;
        if size > inode.size as usize {
            return Err(Error::InvalidSize);
        }
        let mut read = 0;
        let blocks = crate::inode::ceil_div(size, BLOCK_SIZE);
        for i in 0..blocks {
            let block = self.disk.read_block(inode.direct[i])?;
            let to_copy = (size - read).min(BLOCK_SIZE);
            buf[read..read + to_copy].copy_from_slice(&block[..to_copy]);
            read += to_copy;
        }
        Ok(read)
    }

    /// Reads the parent directory's full payload and parses it into
    /// entries.
    fn read_dir_entries(&mut self, inode: &Inode) -> Result<Vec<DirEntry>> {
        let mut buf = vec![0u8; inode.size as usize];
        self.read_raw_into(inode, &mut buf)?;
        let count = inode.size as usize / DIR_ENT_SIZE;
        Ok((0..count)
            .map(|i| DirEntry::decode(&buf[i * DIR_ENT_SIZE..(i + 1) * DIR_ENT_SIZE]))
            .collect())
    }

    /// Like `read`, but bypasses the `stat`/size re-validation because the
    /// caller already holds a fresh `Inode`.
    fn read_raw_into(&mut self, inode: &Inode, buf: &mut [u8]) -> Result<()> {
        let size = buf.len();
        let mut read = 0;
        let blocks = crate::inode::ceil_div(size, BLOCK_SIZE);
        for i in 0..blocks {
            let block = self.disk.read_block(inode.direct[i])?;
            let to_copy = (size - read).min(BLOCK_SIZE);
            buf[read..read + to_copy].copy_from_slice(&block[..to_copy]);
            read += to_copy;
        }
        Ok(())
    }

    /// Writes a directory's entries back across its data blocks, growing
    /// into `extra_block` if provided for the final, not-yet-full block.
    fn write_dir_payload(&mut self, inode: &Inode, entries: &[DirEntry]) -> Result<()> {
        let mut raw = vec![0u8; entries.len() * DIR_ENT_SIZE];
        for (i, entry) in entries.iter().enumerate() {
            entry.encode(&mut raw[i * DIR_ENT_SIZE..(i + 1) * DIR_ENT_SIZE]);
        }
        let blocks = crate::inode::ceil_div(raw.len(), BLOCK_SIZE).max(1);
        for i in 0..blocks {
            let mut block: Block = [0u8; BLOCK_SIZE];
            let start = i * BLOCK_SIZE;
            let end = (start + BLOCK_SIZE).min(raw.len());
            if start < raw.len() {
                block[..end - start].copy_from_slice(&raw[start..end]);
            }
            self.disk.write_block(inode.direct[i], &block)?;
        }
        Ok(())
    }

    /// Resolves a single path component `name` under directory `parent`.
    pub fn lookup(&mut self, parent: u32, name: &str) -> Result<u32> {
        let parent_inode = self.stat(parent)?;
        if parent_inode.kind != InodeType::Directory {
            return Err(Error::InvalidInode);
        }
        let entries = self.read_dir_entries(&parent_inode)?;
        entries
            .iter()
            .find(|e| e.inum >= 0 && e.name_str() == name)
            .map(|e| e.inum as u32)
            .ok_or(Error::NotFound)
    }

    /// Allocates a free inode and a free data block, first-fit, from
    /// in-memory copies of both bitmaps.
    fn create(&mut self, parent: u32, kind: InodeType, name: &str) -> Result<u32> {
        debug!("create({parent}, {kind:?}, {name:?})");
        let parent_inode = self.stat(parent)?;
        if parent_inode.kind != InodeType::Directory {
            return Err(Error::InvalidInode);
        }
        if name.len() > crate::inode::DIR_ENT_NAME_SIZE {
            return Err(Error::InvalidName);
        }
        if let Ok(existing) = self.lookup(parent, name) {
            let existing_inode = self.stat(existing)?;
            return if existing_inode.kind == kind {
                Ok(existing)
            } else {
                Err(Error::InvalidType)
            };
        }

        let mut inode_bitmap = self.read_inode_bitmap()?;
        let mut data_bitmap = self.read_data_bitmap()?;

        let new_inum = bitmap::allocate_first_fit(&mut inode_bitmap, self.superblock.num_inodes)
            .ok_or(Error::NotEnoughSpace)?;

        let mut parent_inode = parent_inode;
        let entries_per_block = self.entries_per_block();
        let current_entries = parent_inode.size as usize / DIR_ENT_SIZE;
        if current_entries % entries_per_block == 0 {
            let parent_blocks = parent_inode.block_count();
            if parent_blocks >= DIRECT_PTRS {
                return Err(Error::NotEnoughSpace);
            }
            let new_block =
                bitmap::allocate_first_fit(&mut data_bitmap, self.superblock.num_data)
                    .ok_or(Error::NotEnoughSpace)?;
            parent_inode.direct[parent_blocks] = new_block + self.superblock.data_region_addr;
        }

        let mut new_inode = Inode {
            kind,
            size: 0,
            direct: [0; DIRECT_PTRS],
        };
        if kind == InodeType::Directory {
            let dir_block = bitmap::allocate_first_fit(&mut data_bitmap, self.superblock.num_data)
                .ok_or(Error::NotEnoughSpace)?;
            new_inode.direct[0] = dir_block + self.superblock.data_region_addr;
            new_inode.size = 2 * DIR_ENT_SIZE as u32;
            let entries = [
                DirEntry::new(new_inum as i32, ".")?,
                DirEntry::new(parent as i32, "..")?,
            ];
            self.write_dir_payload(&new_inode, &entries)?;
        }

        let mut entries = self.read_dir_entries(&parent_inode)?;
        entries.push(DirEntry::new(new_inum as i32, name)?);
        parent_inode.size += DIR_ENT_SIZE as u32;
        self.write_dir_payload(&parent_inode, &entries)?;

        let mut inodes = self.read_inode_region()?;
        inodes[new_inum as usize] = new_inode;
        inodes[parent as usize] = parent_inode;
        self.write_inode_region(&inodes)?;

        self.write_inode_bitmap(&inode_bitmap)?;
        self.write_data_bitmap(&data_bitmap)?;

        Ok(new_inum)
    }

    /// Creates a regular file named `name` under directory `parent`.
    pub fn create_file(&mut self, parent: u32, name: &str) -> Result<u32> {
        self.create(parent, InodeType::Regular, name)
    }

    /// Creates a directory named `name` under directory `parent`.
    pub fn create_dir(&mut self, parent: u32, name: &str) -> Result<u32> {
        self.create(parent, InodeType::Directory, name)
    }

    /// Overwrites the whole content of regular-file inode `inum` with
    /// `data[..size]`. There is no positional/partial write.
    pub fn write(&mut self, inum: u32, data: &[u8], size: usize) -> Result<usize> {
        debug!("write({inum}, {size} bytes)");
        let mut inode = self.stat(inum)?;
        if inode.kind != InodeType::Regular {
            return Err(Error::InvalidType);
        }
        if size > MAX_FILE_SIZE {
            return Err(Error::InvalidSize);
        }

        let old_blocks = inode.block_count();
        let mut new_blocks = crate::inode::ceil_div(size, BLOCK_SIZE);

        let mut data_bitmap = self.read_data_bitmap()?;
        let mut actual_size = size;

        if new_blocks < old_blocks {
            for i in new_blocks..old_blocks {
                let region_relative = inode.direct[i] - self.superblock.data_region_addr;
                bitmap::clear(&mut data_bitmap, region_relative);
            }
            self.write_data_bitmap(&data_bitmap)?;
        } else if new_blocks > old_blocks {
            let mut allocated = old_blocks;
            for i in old_blocks..new_blocks {
                match bitmap::allocate_first_fit(&mut data_bitmap, self.superblock.num_data) {
                    Some(block) => {
                        inode.direct[i] = block + self.superblock.data_region_addr;
                        allocated = i + 1;
                    }
                    None => break,
                }
            }
            self.write_data_bitmap(&data_bitmap)?;
            if allocated < new_blocks {
                new_blocks = allocated;
                actual_size = allocated * BLOCK_SIZE;
            }
        }

        for i in 0..new_blocks {
            let mut block: Block = [0u8; BLOCK_SIZE];
            let start = i * BLOCK_SIZE;
            let end = (start + BLOCK_SIZE).min(actual_size);
            if start < data.len() {
                let copy_end = end.min(data.len());
                block[..copy_end - start].copy_from_slice(&data[start..copy_end]);
            }
            self.disk.write_block(inode.direct[i], &block)?;
        }

        inode.size = actual_size as u32;
        let mut inodes = self.read_inode_region()?;
        inodes[inum as usize] = inode;
        self.write_inode_region(&inodes)?;

        Ok(actual_size)
    }

    /// Removes directory entry `name` from directory `parent`, freeing the
    /// target inode and its data blocks. Idempotent: removing an absent
    /// name succeeds with no state change.
    pub fn unlink(&mut self, parent: u32, name: &str) -> Result<()> {
        debug!("unlink({parent}, {name:?})");
        let mut parent_inode = self.stat(parent)?;
        if parent_inode.kind != InodeType::Directory {
            return Err(Error::InvalidInode);
        }
        if name.len() > crate::inode::DIR_ENT_NAME_SIZE {
            return Err(Error::InvalidName);
        }
        if name == "." || name == ".." {
            return Err(Error::UnlinkNotAllowed);
        }

        let target = match self.lookup(parent, name) {
            Ok(t) => t,
            Err(Error::NotFound) => return Ok(()),
            Err(e) => return Err(e),
        };

        let mut target_inode = self.stat(target)?;
        let empty_dir_size = 2 * DIR_ENT_SIZE as u32;
        if target_inode.kind == InodeType::Directory && target_inode.size > empty_dir_size {
            return Err(Error::DirNotEmpty);
        }

        let mut inode_bitmap = self.read_inode_bitmap()?;
        bitmap::clear(&mut inode_bitmap, target);

        let orig_block_count = parent_inode.block_count();
        let mut entries = self.read_dir_entries(&parent_inode)?;
        if let Some(pos) = entries.iter().position(|e| e.inum >= 0 && e.name_str() == name) {
            let last = entries.len() - 1;
            entries.swap(pos, last);
            entries.pop();
        }
        parent_inode.size -= DIR_ENT_SIZE as u32;
        self.write_dir_payload(&parent_inode, &entries)?;

        let new_block_count = parent_inode.block_count();

        let mut data_bitmap = self.read_data_bitmap()?;
        if new_block_count < orig_block_count {
            let freed = parent_inode.direct[new_block_count] - self.superblock.data_region_addr;
            bitmap::clear(&mut data_bitmap, freed);
        }
        for i in 0..target_inode.block_count() {
            let region_relative = target_inode.direct[i] - self.superblock.data_region_addr;
            bitmap::clear(&mut data_bitmap, region_relative);
        }
        self.write_data_bitmap(&data_bitmap)?;
        self.write_inode_bitmap(&inode_bitmap)?;

        target_inode.kind = InodeType::Free;
        target_inode.size = 0;
        let mut inodes = self.read_inode_region()?;
        inodes[target as usize] = target_inode;
        inodes[parent as usize] = parent_inode;
        self.write_inode_region(&inodes)?;

        Ok(())
    }

    /// Lists a live directory's entries as `(name, is_directory)` pairs,
    /// unsorted — callers that need deterministic output (the HTTP
    /// service, `ls`) sort by name themselves.
    pub fn list_dir(&mut self, inum: u32) -> Result<Vec<(String, bool)>> {
        let inode = self.stat(inum)?;
        if inode.kind != InodeType::Directory {
            return Err(Error::InvalidInode);
        }
        let entries = self.read_dir_entries(&inode)?;
        let mut out = Vec::new();
        for entry in entries.iter().filter(|e| e.inum >= 0) {
            let name = entry.name_str();
            if name == "." || name == ".." {
                continue;
            }
            let child = self.stat(entry.inum as u32)?;
            out.push((name.to_owned(), child.kind == InodeType::Directory));
        }
        Ok(out)
    }
}
