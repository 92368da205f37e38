//! Fine-grained locking for the mutator engine.
//!
//! Lock ordering, enforced by convention across every call site in
//! [`crate::ops`] rather than by the type system: **bitmap lock → parent
//! inode lock → block lock → child inode lock**. No code path acquires
//! two per-inode locks at once except parent-then-child, and always in
//! that order, with the parent lock released before the child lock is
//! taken when both must be held (see `ops::hardlink`).
//!
//! One deliberate carve-out: `dirent::add_entry` calls `alloc_block`
//! (which takes the block-bitmap lock) while already holding the parent
//! inode's lock, because whether a new block is needed is only known
//! after inspecting the current tail block under that lock — the same
//! order the source's `add_dir_entry` uses. No path acquires a bitmap
//! lock and then tries for a parent-inode lock, so this can't deadlock
//! against the general rule above.
//!
//! This mirrors the source's `locks_init`/`locks_destroy` pair and its
//! `inode_locks`/`block_locks` arrays (`examples/original_source/out/src/e2fs.c`),
//! reimplemented as owned `Vec<Mutex<()>>` instead of malloc'd C arrays:
//! construction cannot fail in Rust the way `malloc` can in C, so there is
//! nothing here analogous to the source's fatal initialization failure,
//! and teardown is `Drop`, not an explicit destroy call.

use std::sync::{Mutex, MutexGuard};

/// Owns every mutex guarding the mutable regions of a mounted image.
pub struct LockManager {
	inode_locks: Vec<Mutex<()>>,
	block_locks: Vec<Mutex<()>>,
	inode_bitmap_lock: Mutex<()>,
	block_bitmap_lock: Mutex<()>,
}

/// An acquired lock over one inode's contents (its block-pointer array,
/// size, link count, mode).
pub struct InodeGuard<'a>(#[allow(dead_code)] MutexGuard<'a, ()>);

/// An acquired lock over the bytes of one block.
pub struct BlockGuard<'a>(#[allow(dead_code)] MutexGuard<'a, ()>);

/// An acquired lock over a bitmap and its paired free counters.
pub struct BitmapGuard<'a>(#[allow(dead_code)] MutexGuard<'a, ()>);

impl LockManager {
	/// Builds the lock arrays for an image with `total_inodes` inodes
	/// (1-based) and `total_blocks` blocks (0-based).
	pub fn new(total_inodes: u32, total_blocks: u32) -> Self {
		Self {
			inode_locks: (0..total_inodes).map(|_| Mutex::new(())).collect(),
			block_locks: (0..total_blocks).map(|_| Mutex::new(())).collect(),
			inode_bitmap_lock: Mutex::new(()),
			block_bitmap_lock: Mutex::new(()),
		}
	}

	/// Locks inode `ino` (1-based).
	pub fn lock_inode(&self, ino: u32) -> InodeGuard<'_> {
		let guard = self.inode_locks[(ino - 1) as usize]
			.lock()
			.unwrap_or_else(|e| e.into_inner());
		InodeGuard(guard)
	}

	/// Locks block `blk` (0-based).
	pub fn lock_block(&self, blk: u32) -> BlockGuard<'_> {
		let guard = self.block_locks[blk as usize]
			.lock()
			.unwrap_or_else(|e| e.into_inner());
		BlockGuard(guard)
	}

	/// Locks the inode bitmap (and, by convention, the paired free-inode
	/// counters in the superblock and group descriptor).
	pub fn lock_inode_bitmap(&self) -> BitmapGuard<'_> {
		BitmapGuard(self.inode_bitmap_lock.lock().unwrap_or_else(|e| e.into_inner()))
	}

	/// Locks the block bitmap (and the paired free-block counters).
	pub fn lock_block_bitmap(&self) -> BitmapGuard<'_> {
		BitmapGuard(self.block_bitmap_lock.lock().unwrap_or_else(|e| e.into_inner()))
	}
}
