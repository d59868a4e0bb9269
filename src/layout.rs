//! The superblock: locates the inode bitmap, data bitmap, inode region and
//! data region within the block device, and their lengths.

use crate::block::{Block, BLOCK_SIZE};

/// Number of `i32` fields the on-disk superblock carries.
const FIELD_COUNT: usize = 10;
/// On-disk size of the superblock, in bytes. The rest of block 0 is unused
/// padding.
pub const SUPERBLOCK_SIZE: usize = FIELD_COUNT * 4;

/// Block 0's contents: region addresses and lengths, all in blocks, plus
/// the total inode and data-block counts. Written once at image creation;
/// read-only thereafter at the file-system layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
    pub inode_bitmap_addr: u32,
    pub inode_bitmap_len: u32,
    pub data_bitmap_addr: u32,
    pub data_bitmap_len: u32,
    pub inode_region_addr: u32,
    pub inode_region_len: u32,
    pub data_region_addr: u32,
    pub data_region_len: u32,
    pub num_inodes: u32,
    pub num_data: u32,
}

impl Superblock {
    /// Decodes a superblock from block 0's raw bytes.
    pub fn decode(block: &Block) -> Self {
        let mut fields = [0u32; FIELD_COUNT];
        for (i, field) in fields.iter_mut().enumerate() {
            let off = i * 4;
            *field = u32::from_le_bytes(block[off..off + 4].try_into().unwrap());
        }
        Self {
            inode_bitmap_addr: fields[0],
            inode_bitmap_len: fields[1],
            data_bitmap_addr: fields[2],
            data_bitmap_len: fields[3],
            inode_region_addr: fields[4],
            inode_region_len: fields[5],
            data_region_addr: fields[6],
            data_region_len: fields[7],
            num_inodes: fields[8],
            num_data: fields[9],
        }
    }

    /// Encodes the superblock into a fresh, zero-padded block-0 image.
    pub fn encode(&self) -> Block {
        let mut block = [0u8; BLOCK_SIZE];
        let fields = [
            self.inode_bitmap_addr,
            self.inode_bitmap_len,
            self.data_bitmap_addr,
            self.data_bitmap_len,
            self.inode_region_addr,
            self.inode_region_len,
            self.data_region_addr,
            self.data_region_len,
            self.num_inodes,
            self.num_data,
        ];
        for (i, field) in fields.iter().enumerate() {
            let off = i * 4;
            block[off..off + 4].copy_from_slice(&field.to_le_bytes());
        }
        block
    }

    /// Lays out a fresh superblock for an image with `num_inodes` inodes
    /// and `num_data` data blocks, placing regions back-to-back starting
    /// at block 1.
    pub fn layout(num_inodes: u32, num_data: u32) -> Self {
        let inode_bitmap_addr = 1;
        let inode_bitmap_len = ceil_div(num_inodes, (BLOCK_SIZE * 8) as u32).max(1);

        let data_bitmap_addr = inode_bitmap_addr + inode_bitmap_len;
        let data_bitmap_len = ceil_div(num_data, (BLOCK_SIZE * 8) as u32).max(1);

        let inode_region_addr = data_bitmap_addr + data_bitmap_len;
        let inode_size = crate::inode::INODE_SIZE as u32;
        let inode_region_len =
            ceil_div(num_inodes * inode_size, BLOCK_SIZE as u32).max(1);

        let data_region_addr = inode_region_addr + inode_region_len;
        let data_region_len = num_data;

        Self {
            inode_bitmap_addr,
            inode_bitmap_len,
            data_bitmap_addr,
            data_bitmap_len,
            inode_region_addr,
            inode_region_len,
            data_region_addr,
            data_region_len,
            num_inodes,
            num_data,
        }
    }

    /// Total number of blocks the image must hold (superblock plus every
    /// region).
    pub fn total_blocks(&self) -> u32 {
        1 + self.inode_bitmap_len
            + self.data_bitmap_len
            + self.inode_region_len
            + self.data_region_len
    }
}

fn ceil_div(a: u32, b: u32) -> u32 {
    (a + b - 1) / b
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips() {
        let sb = Superblock::layout(256, 1024);
        let block = sb.encode();
        assert_eq!(Superblock::decode(&block), sb);
    }

    #[test]
    fn layout_is_contiguous() {
        let sb = Superblock::layout(256, 1024);
        assert_eq!(sb.inode_bitmap_addr, 1);
        assert_eq!(sb.data_bitmap_addr, sb.inode_bitmap_addr + sb.inode_bitmap_len);
        assert_eq!(sb.inode_region_addr, sb.data_bitmap_addr + sb.data_bitmap_len);
        assert_eq!(sb.data_region_addr, sb.inode_region_addr + sb.inode_region_len);
    }
}
