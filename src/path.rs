//! Path tokenization and multi-component resolution.
//!
//! The distilled spec's §4.4 contract is single-component only; §9 flags
//! the original source's bug of passing whole slash-separated paths into a
//! single `lookup` call. This module is the fix: multi-component paths are
//! resolved by iterated single-component lookups starting from the root
//! inode, each failure short-circuiting with `NotFound`.

use crate::block::Disk;
use crate::error::Result;
use crate::fs::{FileSystem, ROOT_INODE};

/// Splits a `/`-separated path into its non-empty components.
pub fn tokenize(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Resolves `path` to an inode number, starting at the root. An empty path
/// (after tokenization) resolves to the root inode itself.
pub fn resolve<D: Disk>(fs: &mut FileSystem<D>, path: &str) -> Result<u32> {
    let mut inum = ROOT_INODE;
    for component in tokenize(path) {
        inum = fs.lookup(inum, component)?;
    }
    Ok(inum)
}

/// Resolves all but the last component of `path`, returning `(parent_inum,
/// last_component)`. Fails `NotFound` if any intermediate component is
/// missing. The last component is returned unresolved — callers decide
/// whether it must already exist.
pub fn resolve_parent<'a, D: Disk>(
    fs: &mut FileSystem<D>,
    path: &'a str,
) -> Result<(u32, &'a str)> {
    let tokens = tokenize(path);
    let (last, rest) = tokens.split_last().ok_or(crate::error::Error::NotFound)?;
    let mut inum = ROOT_INODE;
    for component in rest {
        inum = fs.lookup(inum, component)?;
    }
    Ok((inum, last))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::block::MemDisk;
    use crate::fs::FileSystem;
    use crate::layout::Superblock;

    fn fresh_fs(num_inodes: u32, num_data: u32) -> FileSystem<MemDisk> {
        let sb = Superblock::layout(num_inodes, num_data);
        let mut disk = MemDisk::new(sb.total_blocks() as usize);
        crate::mkfs::format(&mut disk, &sb).unwrap();
        FileSystem::open(disk).unwrap()
    }

    #[test]
    fn tokenize_ignores_empty_components() {
        assert_eq!(tokenize("/a//b/"), vec!["a", "b"]);
        assert_eq!(tokenize(""), Vec::<&str>::new());
    }

    #[test]
    fn multi_component_resolve() {
        let mut fs = fresh_fs(16, 16);
        let a = fs.create_dir(ROOT_INODE, "a").unwrap();
        let b = fs.create_dir(a, "b").unwrap();
        assert_eq!(resolve(&mut fs, "a/b").unwrap(), b);
        assert_eq!(resolve(&mut fs, "/a/b/").unwrap(), b);
        assert_eq!(resolve(&mut fs, "").unwrap(), ROOT_INODE);
    }

    #[test]
    fn missing_intermediate_short_circuits() {
        let mut fs = fresh_fs(16, 16);
        assert!(resolve(&mut fs, "a/b/c").is_err());
    }

    #[test]
    fn resolve_parent_splits_last_component() {
        let mut fs = fresh_fs(16, 16);
        let a = fs.create_dir(ROOT_INODE, "a").unwrap();
        let (parent, last) = resolve_parent(&mut fs, "a/b").unwrap();
        assert_eq!(parent, a);
        assert_eq!(last, "b");
    }
}
