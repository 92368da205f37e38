//! A concurrent, in-memory mutator for ext2 filesystem images.
//!
//! Mount a formatted image with [`Mount::open`], then call the five
//! namespace operations in [`ops`] from any number of threads. See the
//! module docs of [`lock`] for the locking discipline every operation
//! follows.

pub mod access;
pub mod alloc;
pub mod bitmap;
pub mod dirent;
pub mod error;
pub mod filedata;
pub mod lock;
pub mod mount;
pub mod ops;
pub mod path;
pub mod types;
#[cfg(test)]
pub(crate) mod tests_support;

pub use error::{Ext2Error, Result};
pub use mount::Mount;
