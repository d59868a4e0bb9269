//! Service-level orchestration (§4.10): the three externally visible
//! operations (read/list, put, delete), each wrapped in one device
//! transaction. Routing and wire formats live in the binaries
//! (`bin/ds3d.rs`); this module only knows inodes, paths and bytes.

use log::warn;

use crate::block::Disk;
use crate::error::Error;
use crate::fs::FileSystem;
use crate::inode::InodeType;
use crate::path;

/// What a successful read/list call produced.
pub enum Listing {
    /// A directory's entries, one name per line, sorted, subdirectories
    /// suffixed with `/`.
    Directory(String),
    /// A file's raw contents.
    File(Vec<u8>),
}

/// Status class a failed service call maps to, mirroring the distilled
/// spec's HTTP-like mapping (§6/§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    NotFound,
    Conflict,
    BadRequest,
}

pub type ServiceResult<T> = std::result::Result<T, Status>;

fn map_read_error(e: Error) -> Status {
    match e {
        Error::NotFound | Error::InvalidInode => Status::NotFound,
        _ => Status::BadRequest,
    }
}

/// Non-mutating: resolves `path` and returns either a sorted directory
/// listing or raw file bytes. Does not open a transaction — read-only
/// calls surface errors without rolling back, per §5/§7.
pub fn get<D: Disk>(fs: &mut FileSystem<D>, path: &str) -> ServiceResult<Listing> {
    let inum = path::resolve(fs, path).map_err(map_read_error)?;
    let inode = fs.stat(inum).map_err(map_read_error)?;
    match inode.kind {
        InodeType::Directory => {
            let mut entries = fs.list_dir(inum).map_err(map_read_error)?;
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut out = String::new();
            for (name, is_dir) in entries {
                out.push_str(&name);
                if is_dir {
                    out.push('/');
                }
                out.push('\n');
            }
            Ok(Listing::Directory(out))
        }
        InodeType::Regular => {
            let mut buf = vec![0u8; inode.size as usize];
            fs.read(inum, &mut buf, inode.size as usize)
                .map_err(map_read_error)?;
            Ok(Listing::File(buf))
        }
        InodeType::Free => Err(Status::NotFound),
    }
}

/// Mutating: creates or overwrites the entry named by `path`. A trailing
/// `/` marks directory intent. Intermediate path components are
/// auto-created as directories; a conflict (an intermediate exists as a
/// non-directory, or the final name exists as a directory when a file was
/// requested) rolls back and reports `Conflict`.
pub fn put<D: Disk>(fs: &mut FileSystem<D>, path: &str, body: &[u8]) -> ServiceResult<()> {
    let is_directory = path.ends_with('/');
    fs.disk_mut().begin_transaction();
    match put_inner(fs, path, body, is_directory) {
        Ok(()) => {
            fs.disk_mut().commit();
            Ok(())
        }
        Err(status) => {
            warn!("put {path:?} failed: {status:?}, rolling back");
            let _ = fs.disk_mut().rollback();
            Err(status)
        }
    }
}

fn put_inner<D: Disk>(
    fs: &mut FileSystem<D>,
    path: &str,
    body: &[u8],
    is_directory: bool,
) -> ServiceResult<()> {
    let tokens = path::tokenize(path);
    let (last, intermediate) = tokens.split_last().ok_or(Status::BadRequest)?;

    let mut parent = crate::fs::ROOT_INODE;
    for component in intermediate {
        match fs.lookup(parent, component) {
            Ok(inum) => {
                let inode = fs.stat(inum).map_err(|_| Status::BadRequest)?;
                if inode.kind != InodeType::Directory {
                    return Err(Status::Conflict);
                }
                parent = inum;
            }
            Err(Error::NotFound) => {
                parent = fs.create_dir(parent, component).map_err(|_| Status::BadRequest)?;
            }
            Err(_) => return Err(Status::BadRequest),
        }
    }

    let target = match fs.lookup(parent, last) {
        Ok(inum) => Some(inum),
        Err(Error::NotFound) => None,
        Err(_) => return Err(Status::BadRequest),
    };

    let target = match target {
        None => {
            if is_directory {
                fs.create_dir(parent, last).map_err(|_| Status::BadRequest)?
            } else {
                fs.create_file(parent, last).map_err(|_| Status::BadRequest)?
            }
        }
        Some(inum) => inum,
    };

    let inode = fs.stat(target).map_err(|_| Status::BadRequest)?;
    match inode.kind {
        InodeType::Regular => {
            fs.write(target, body, body.len()).map_err(|_| Status::BadRequest)?;
            Ok(())
        }
        InodeType::Directory if is_directory => Ok(()),
        InodeType::Directory => Err(Status::Conflict),
        InodeType::Free => Err(Status::BadRequest),
    }
}

/// Mutating: removes a single entry named by `path`.
pub fn delete<D: Disk>(fs: &mut FileSystem<D>, path: &str) -> ServiceResult<()> {
    fs.disk_mut().begin_transaction();
    match delete_inner(fs, path) {
        Ok(()) => {
            fs.disk_mut().commit();
            Ok(())
        }
        Err(status) => {
            warn!("delete {path:?} failed: {status:?}, rolling back");
            let _ = fs.disk_mut().rollback();
            Err(status)
        }
    }
}

fn delete_inner<D: Disk>(fs: &mut FileSystem<D>, path: &str) -> ServiceResult<()> {
    let (parent, name) = path::resolve_parent(fs, path).map_err(map_read_error)?;
    // unlink is idempotent on a missing name; the service layer is stricter
    // and must report it, so check existence before calling it.
    fs.lookup(parent, name).map_err(map_read_error)?;
    fs.unlink(parent, name).map_err(|e| match e {
        Error::DirNotEmpty => Status::Conflict,
        Error::NotFound | Error::InvalidInode => Status::NotFound,
        _ => Status::BadRequest,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::block::MemDisk;
    use crate::layout::Superblock;

    fn fresh_fs() -> FileSystem<MemDisk> {
        let sb = Superblock::layout(64, 64);
        let mut disk = MemDisk::new(sb.total_blocks() as usize);
        crate::mkfs::format(&mut disk, &sb).unwrap();
        FileSystem::open(disk).unwrap()
    }

    #[test]
    fn put_auto_creates_intermediate_directories() {
        let mut fs = fresh_fs();
        put(&mut fs, "/a/b/c", b"x").unwrap();
        match get(&mut fs, "/a/b/c").unwrap() {
            Listing::File(bytes) => assert_eq!(bytes, b"x"),
            _ => panic!("expected file"),
        }
    }

    #[test]
    fn put_overwrites_not_appends() {
        let mut fs = fresh_fs();
        put(&mut fs, "/a/b/c", b"x").unwrap();
        put(&mut fs, "/a/b/c", b"y").unwrap();
        match get(&mut fs, "/a/b/c").unwrap() {
            Listing::File(bytes) => assert_eq!(bytes, b"y"),
            _ => panic!("expected file"),
        }
    }

    #[test]
    fn put_conflict_file_over_directory() {
        let mut fs = fresh_fs();
        put(&mut fs, "/a/", b"").unwrap();
        assert_eq!(put(&mut fs, "/a", b"x"), Err(Status::Conflict));
    }

    #[test]
    fn delete_nonempty_directory_conflicts() {
        let mut fs = fresh_fs();
        put(&mut fs, "/a/b", b"x").unwrap();
        assert_eq!(delete(&mut fs, "/a"), Err(Status::Conflict));
    }

    #[test]
    fn delete_missing_is_not_found() {
        let mut fs = fresh_fs();
        assert_eq!(delete(&mut fs, "/missing"), Err(Status::NotFound));
    }

    #[test]
    fn get_listing_sorted_with_trailing_slash() {
        let mut fs = fresh_fs();
        put(&mut fs, "/b", b"1").unwrap();
        put(&mut fs, "/a/", b"").unwrap();
        match get(&mut fs, "/").unwrap() {
            Listing::Directory(text) => assert_eq!(text, "a/\nb\n"),
            _ => panic!("expected directory"),
        }
    }
}
