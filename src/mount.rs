//! Mount/unmount: wiring a memory-mapped image into a [`Mount`] handle.
//!
//! This replaces the source's global mutable state (raw superblock/group
//! descriptor/bitmap pointers and lock arrays, all file-scope globals in
//! `examples/original_source/out/src/ext2fsal.h`) with an explicit,
//! owned handle threaded through every operation. Static lifetime exists
//! only where the test harness chooses to keep one around.

use crate::lock::LockManager;
use crate::types::{BLOCK_SIZE, GROUP_DESC_BLOCK, Inode, SUPERBLOCK_BLOCK};
use memmap2::MmapMut;
use std::fs::OpenOptions;
use std::io;
use std::mem::size_of;
use std::path::Path;

/// A mounted ext2 image: an owned memory mapping plus the lock arrays
/// guarding concurrent access to it.
///
/// Construct with [`Mount::open`]. All five namespace operations
/// (`mkdir`, `cp`, `hardlink`, `symlink`, `unlink`) are inherent methods
/// defined in [`crate::ops`]. Dropping a `Mount` unmaps the image and
/// tears down its locks; any namespace operation in progress on another
/// thread must have returned before the last handle is dropped — there is
/// no mid-operation cancellation.
pub struct Mount {
	/// Kept alive so the mapping stays valid; never read through
	/// directly once `base` has been derived from it.
	_mmap: MmapMut,
	pub(crate) base: *mut u8,
	#[allow(dead_code)]
	pub(crate) len: usize,
	pub(crate) total_inodes: u32,
	pub(crate) total_blocks: u32,
	pub(crate) inode_bitmap_block: u32,
	pub(crate) block_bitmap_block: u32,
	pub(crate) inode_table_block: u32,
	pub(crate) first_non_reserved_inode: u32,
	pub(crate) locks: LockManager,
}

// SAFETY: every mutable access to the bytes behind `base` goes through
// `LockManager`-guarded accessor methods in `crate::access`; no two
// threads touch the same inode, block, or bitmap byte range without
// holding the matching lock.
unsafe impl Send for Mount {}
unsafe impl Sync for Mount {}

impl Mount {
	/// Maps `path` (an existing, formatted ext2 image) and wires up the
	/// superblock, group descriptor, bitmap, and inode-table pointers.
	///
	/// Equivalent to the source's `ext2_fsal_init`: stat the image to
	/// learn its length, open for read+write, map it shared, then derive
	/// every other pointer from the group descriptor. Mmap or format
	/// failures are surfaced as `io::Error`; this crate does not decide to
	/// abort the process itself on a fatal mount error — that is left to
	/// whatever calls it.
	pub fn open(path: &Path) -> io::Result<Self> {
		let file = OpenOptions::new().read(true).write(true).open(path)?;
		let len = file.metadata()?.len() as usize;
		// SAFETY: the file is exclusively ours for the mapping's
		// lifetime from the caller's point of view; concurrent external
		// mutation of the backing file is outside this crate's contract,
		// matching the source's bare `mmap(..., MAP_SHARED, ...)`.
		let mut mmap = unsafe { MmapMut::map_mut(&file) }?;
		let base = mmap.as_mut_ptr();
		drop(file);

		if len < (GROUP_DESC_BLOCK as usize + 1) * BLOCK_SIZE as usize {
			return Err(io::Error::new(io::ErrorKind::InvalidData, "image too small to hold metadata"));
		}
		// SAFETY: `len` was just checked to cover at least through block 2.
		let sb = unsafe {
			(base.add(SUPERBLOCK_BLOCK as usize * BLOCK_SIZE as usize) as *const crate::types::Superblock)
				.read_unaligned()
		};
		if sb.s_magic != crate::types::EXT2_MAGIC {
			return Err(io::Error::new(io::ErrorKind::InvalidData, "not an ext2 image (bad magic)"));
		}
		let gd = unsafe {
			(base.add(GROUP_DESC_BLOCK as usize * BLOCK_SIZE as usize) as *const crate::types::GroupDescriptor)
				.read_unaligned()
		};

		let total_inodes = sb.s_inodes_count;
		let total_blocks = sb.s_blocks_count;
		let inode_table_blocks = (total_inodes as usize * size_of::<Inode>()).div_ceil(BLOCK_SIZE as usize);
		let last_inode_table_block = gd.bg_inode_table as usize + inode_table_blocks;
		if (total_blocks as usize) < last_inode_table_block || len < total_blocks as usize * BLOCK_SIZE as usize {
			return Err(io::Error::new(io::ErrorKind::InvalidData, "image metadata inconsistent with its length"));
		}

		let locks = LockManager::new(total_inodes, total_blocks);
		log::debug!(
			"mounted image: {total_inodes} inodes, {total_blocks} blocks, first non-reserved inode {}",
			sb.s_first_ino
		);

		Ok(Self {
			_mmap: mmap,
			base,
			len,
			total_inodes,
			total_blocks,
			inode_bitmap_block: gd.bg_inode_bitmap,
			block_bitmap_block: gd.bg_block_bitmap,
			inode_table_block: gd.bg_inode_table,
			first_non_reserved_inode: sb.s_first_ino,
			locks,
		})
	}

	/// Explicitly unmounts, equivalent to dropping the handle. Provided
	/// for symmetry with [`Mount::open`] and with the source's
	/// `ext2_fsal_destroy`.
	pub fn unmount(self) {
		drop(self)
	}
}
