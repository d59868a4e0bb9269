//! End-to-end scenarios and the laws from the design notes, driven entirely
//! through the public engine/service API against an in-memory disk.

use ds3fs::block::{Disk, MemDisk};
use ds3fs::fs::{FileSystem, ROOT_INODE};
use ds3fs::inode::{InodeType, MAX_FILE_SIZE};
use ds3fs::layout::Superblock;
use ds3fs::service::{self, Listing, Status};
use ds3fs::{mkfs, path};

fn fresh(num_inodes: u32, num_data: u32) -> FileSystem<MemDisk> {
    let sb = Superblock::layout(num_inodes, num_data);
    let mut disk = MemDisk::new(sb.total_blocks() as usize);
    mkfs::format(&mut disk, &sb).unwrap();
    FileSystem::open(disk).unwrap()
}

#[test]
fn create_file_write_read_round_trip() {
    let mut fs = fresh(16, 16);
    let file = fs.create_file(ROOT_INODE, "hello.txt").unwrap();
    let written = fs.write(file, b"hello, world", 12).unwrap();
    assert_eq!(written, 12);

    let mut buf = [0u8; 12];
    let read = fs.read(file, &mut buf, 12).unwrap();
    assert_eq!(read, 12);
    assert_eq!(&buf, b"hello, world");
}

#[test]
fn create_is_idempotent_on_same_type() {
    let mut fs = fresh(16, 16);
    let a = fs.create_dir(ROOT_INODE, "sub").unwrap();
    let b = fs.create_dir(ROOT_INODE, "sub").unwrap();
    assert_eq!(a, b);
}

#[test]
fn create_rejects_type_mismatch_on_reuse() {
    let mut fs = fresh(16, 16);
    fs.create_file(ROOT_INODE, "x").unwrap();
    assert!(fs.create_dir(ROOT_INODE, "x").is_err());
}

#[test]
fn unlink_is_idempotent() {
    let mut fs = fresh(16, 16);
    fs.create_file(ROOT_INODE, "x").unwrap();
    fs.unlink(ROOT_INODE, "x").unwrap();
    fs.unlink(ROOT_INODE, "x").unwrap();
    assert!(fs.lookup(ROOT_INODE, "x").is_err());
}

#[test]
fn unlink_refuses_nonempty_directory() {
    let mut fs = fresh(16, 16);
    let dir = fs.create_dir(ROOT_INODE, "d").unwrap();
    fs.create_file(dir, "child").unwrap();
    assert!(fs.unlink(ROOT_INODE, "d").is_err());
}

#[test]
fn unlink_frees_inode_for_reuse() {
    let mut fs = fresh(2, 16);
    // only the root inode plus one free slot exist; exhaust and recycle it
    let a = fs.create_file(ROOT_INODE, "a").unwrap();
    fs.unlink(ROOT_INODE, "a").unwrap();
    let b = fs.create_file(ROOT_INODE, "b").unwrap();
    assert_eq!(a, b);
}

#[test]
fn write_exceeding_max_file_size_is_rejected() {
    let mut fs = fresh(16, 64);
    let file = fs.create_file(ROOT_INODE, "big").unwrap();
    let data = vec![0xABu8; MAX_FILE_SIZE + 4096];
    assert!(fs.write(file, &data, data.len()).is_err());
}

#[test]
fn write_truncates_when_data_region_runs_out_mid_extension() {
    // root's own directory block claims one of 4 data blocks, leaving 3
    // free — fewer than the 5 blocks a 5-block write would need.
    let mut fs = fresh(16, 4);
    let file = fs.create_file(ROOT_INODE, "big").unwrap();
    let data = vec![0xABu8; 5 * 4096];
    let written = fs.write(file, &data, data.len()).unwrap();
    assert_eq!(written, 3 * 4096);
    let inode = fs.stat(file).unwrap();
    assert_eq!(inode.size as usize, written);
}

#[test]
fn write_zero_fills_tail_when_data_shorter_than_size() {
    let mut fs = fresh(16, 16);
    let file = fs.create_file(ROOT_INODE, "f").unwrap();
    fs.write(file, b"ab", 10).unwrap();
    let mut buf = [0u8; 10];
    fs.read(file, &mut buf, 10).unwrap();
    assert_eq!(&buf, b"ab\0\0\0\0\0\0\0\0");
}

#[test]
fn rollback_undoes_a_failed_multi_step_mutation() {
    let mut fs = fresh(16, 16);
    fs.disk_mut().begin_transaction();
    let dir = fs.create_dir(ROOT_INODE, "a").unwrap();
    fs.create_file(dir, "b").unwrap();
    fs.disk_mut().rollback().unwrap();

    assert!(fs.lookup(ROOT_INODE, "a").is_err());
}

#[test]
fn path_resolution_walks_nested_directories() {
    let mut fs = fresh(16, 16);
    let a = fs.create_dir(ROOT_INODE, "a").unwrap();
    let b = fs.create_dir(a, "b").unwrap();
    fs.create_file(b, "c").unwrap();
    let resolved = path::resolve(&mut fs, "/a/b/c").unwrap();
    let inode = fs.stat(resolved).unwrap();
    assert_eq!(inode.kind, InodeType::Regular);
}

#[test]
fn service_put_creates_nested_paths_and_get_reads_back() {
    let mut fs = fresh(32, 32);
    service::put(&mut fs, "/docs/readme.txt", b"hi there").unwrap();
    match service::get(&mut fs, "/docs/readme.txt").unwrap() {
        Listing::File(bytes) => assert_eq!(bytes, b"hi there"),
        _ => panic!("expected a file"),
    }
    match service::get(&mut fs, "/docs").unwrap() {
        Listing::Directory(text) => assert_eq!(text, "readme.txt\n"),
        _ => panic!("expected a directory"),
    }
}

#[test]
fn service_delete_then_get_is_not_found() {
    let mut fs = fresh(32, 32);
    service::put(&mut fs, "/a", b"x").unwrap();
    service::delete(&mut fs, "/a").unwrap();
    assert_eq!(service::get(&mut fs, "/a").err(), Some(Status::NotFound));
}

#[test]
fn failed_put_leaves_filesystem_unchanged() {
    let mut fs = fresh(32, 32);
    service::put(&mut fs, "/a/", b"").unwrap();
    // "/a" already exists as a directory; writing a file there is a conflict
    let before = fs.list_dir(ROOT_INODE).unwrap();
    assert_eq!(service::put(&mut fs, "/a", b"x"), Err(Status::Conflict));
    let after = fs.list_dir(ROOT_INODE).unwrap();
    assert_eq!(before, after);
}
