//! Namespace operations: the five public entry points, each a strict
//! composition of the lower layers.
//!
//! One file per operation, mirroring both this crate's own
//! one-file-per-tool layout (`dmesg.rs`, `mount.rs`, ...) and the source's
//! `ext2fsal_<op>.c` split.

mod cp;
mod hardlink;
mod mkdir;
mod symlink;
mod unlink;
