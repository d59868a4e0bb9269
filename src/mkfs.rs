//! Formats a fresh disk image: lays out the superblock, zeroes both
//! bitmaps, marks the root inode live, and writes its initial "." / ".."
//! directory block.
//!
//! Grounded in the teacher's `mkfs` tool (`Ext2Factory::create`), which
//! writes a superblock plus per-group bitmaps/inode tables directly to a
//! `File`; here the layout is this spec's flat four-region one instead of
//! ext2's block-group table, and the root directory always needs exactly
//! one data block instead of ext2's variable preallocation.

use crate::bitmap;
use crate::block::{Block, Disk, BLOCK_SIZE};
use crate::error::Result;
use crate::fs::ROOT_INODE;
use crate::inode::{DirEntry, Inode, InodeType, DIR_ENT_SIZE, INODE_SIZE};
use crate::layout::Superblock;

/// Writes a brand-new, empty file system described by `sb` onto `disk`.
/// `disk` must already hold at least `sb.total_blocks()` blocks.
pub fn format<D: Disk>(disk: &mut D, sb: &Superblock) -> Result<()> {
    disk.write_block(0, &sb.encode())?;

    let mut inode_bitmap = vec![0u8; sb.inode_bitmap_len as usize * BLOCK_SIZE];
    let mut data_bitmap = vec![0u8; sb.data_bitmap_len as usize * BLOCK_SIZE];

    bitmap::set(&mut inode_bitmap, ROOT_INODE);
    let root_block = bitmap::allocate_first_fit(&mut data_bitmap, sb.num_data)
        .ok_or(crate::error::Error::NotEnoughSpace)?;

    let mut root_inode = Inode {
        kind: InodeType::Directory,
        size: 2 * DIR_ENT_SIZE as u32,
        direct: [0; crate::inode::DIRECT_PTRS],
    };
    root_inode.direct[0] = root_block + sb.data_region_addr;

    let mut dir_block: Block = [0u8; BLOCK_SIZE];
    let dot = DirEntry::new(ROOT_INODE as i32, ".")?;
    let dotdot = DirEntry::new(ROOT_INODE as i32, "..")?;
    dot.encode(&mut dir_block[0..DIR_ENT_SIZE]);
    dotdot.encode(&mut dir_block[DIR_ENT_SIZE..2 * DIR_ENT_SIZE]);
    disk.write_block(root_inode.direct[0], &dir_block)?;

    let mut inode_region = vec![0u8; sb.inode_region_len as usize * BLOCK_SIZE];
    root_inode.encode(&mut inode_region[0..INODE_SIZE]);
    for i in 0..sb.inode_region_len {
        let mut block: Block = [0u8; BLOCK_SIZE];
        let start = i as usize * BLOCK_SIZE;
        block.copy_from_slice(&inode_region[start..start + BLOCK_SIZE]);
        disk.write_block(sb.inode_region_addr + i, &block)?;
    }

    for i in 0..sb.inode_bitmap_len {
        let mut block: Block = [0u8; BLOCK_SIZE];
        let start = i as usize * BLOCK_SIZE;
        block.copy_from_slice(&inode_bitmap[start..start + BLOCK_SIZE]);
        disk.write_block(sb.inode_bitmap_addr + i, &block)?;
    }
    for i in 0..sb.data_bitmap_len {
        let mut block: Block = [0u8; BLOCK_SIZE];
        let start = i as usize * BLOCK_SIZE;
        block.copy_from_slice(&data_bitmap[start..start + BLOCK_SIZE]);
        disk.write_block(sb.data_bitmap_addr + i, &block)?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::block::MemDisk;
    use crate::fs::FileSystem;

    #[test]
    fn fresh_image_has_live_root_only() {
        let sb = Superblock::layout(64, 64);
        let mut disk = MemDisk::new(sb.total_blocks() as usize);
        format(&mut disk, &sb).unwrap();
        let mut fs = FileSystem::open(disk).unwrap();
        let root = fs.stat(ROOT_INODE).unwrap();
        assert_eq!(root.kind, InodeType::Directory);
        assert_eq!(root.size, 2 * DIR_ENT_SIZE as u32);
        assert_eq!(fs.list_dir(ROOT_INODE).unwrap(), Vec::new());
    }
}
