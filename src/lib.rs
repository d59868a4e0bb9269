//! A small block-structured local file system, exposed both as a set of
//! single-image CLI tools (`ds3`) and as a synchronous HTTP-like daemon
//! (`ds3d`).
//!
//! Layout, bottom to top: [`block`] is the device abstraction with
//! transaction support; [`bitmap`] and [`inode`] are the raw on-disk record
//! codecs; [`layout`] describes the superblock and region placement;
//! [`fs`] is the engine (`lookup`/`stat`/`read`/`write`/`create`/`unlink`);
//! [`path`] resolves multi-component paths against the engine; [`mkfs`]
//! formats a fresh image; [`service`] wraps the engine in the
//! transaction-per-call, HTTP-status-mapped operations the daemon exposes.

pub mod bitmap;
pub mod block;
pub mod error;
pub mod fs;
pub mod inode;
pub mod layout;
pub mod mkfs;
pub mod path;
pub mod service;

pub use error::{Error, Result};
