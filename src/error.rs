//! Error types for the engine and the service layer.

use thiserror::Error;

/// Errors raised by the on-disk engine (`block`, `bitmap`, `inode`, `fs`, `path`).
#[derive(Debug, Error)]
pub enum Error {
    /// Inode index out of range, or a required type mismatch (e.g. lookup
    /// in a non-directory, or a parent that isn't live).
    #[error("invalid inode")]
    InvalidInode,
    /// `create` name-reuse with a mismatched type, or `write` to a
    /// non-regular-file inode.
    #[error("invalid type")]
    InvalidType,
    /// Name length exceeds `DIR_ENT_NAME_SIZE`.
    #[error("invalid name")]
    InvalidName,
    /// Size outside `[0, file.size]` for read, or `[0, MAX_FILE_SIZE]` for
    /// write.
    #[error("invalid size")]
    InvalidSize,
    /// Name missing in directory during lookup.
    #[error("not found")]
    NotFound,
    /// Bitmap exhaustion, or the parent already holds `DIRECT_PTRS` blocks.
    #[error("not enough space")]
    NotEnoughSpace,
    /// Unlink of a non-empty directory.
    #[error("directory not empty")]
    DirNotEmpty,
    /// Unlink of "." or "..".
    #[error("unlink not allowed")]
    UnlinkNotAllowed,
    /// Underlying block device I/O failure. Not part of the distilled
    /// spec's error taxonomy; added to carry I/O failures a real file-backed
    /// disk can hit (truncated image, permission, etc).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
