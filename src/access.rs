//! Inode/block accessor: translates inode and block numbers into views
//! into the mapped image.
//!
//! Reads are unlocked, matching the source's `get_inode`/`get_block`
//! (`examples/original_source/out/src/e2fs.c`): callers that need a
//! consistent view acquire the relevant lock themselves. Writes to shared
//! counters go through individual field pointers rather than a `&mut`
//! reference to the whole `Superblock`/`GroupDescriptor`, because the
//! inode-bitmap and block-bitmap locks protect disjoint fields of the same
//! two structs and can be held concurrently by different threads; taking
//! `&mut Superblock` under only one of those locks would alias a `&mut`
//! over a field the other lock-holder is writing.

use crate::mount::Mount;
use crate::types::{
	BLOCK_SIZE, DIRECT_POINTERS, GroupDescriptor, INDIRECT_INDEX, Inode, PTRS_PER_INDIRECT_BLOCK,
	Superblock,
};
use std::ptr::addr_of_mut;

impl Mount {
	#[inline]
	pub(crate) fn block_offset(&self, blk: u32) -> usize {
		debug_assert!(blk < self.total_blocks, "block {blk} out of range");
		blk as usize * BLOCK_SIZE as usize
	}

	/// Raw pointer to the first byte of block `blk`.
	#[inline]
	pub(crate) fn block_ptr(&self, blk: u32) -> *mut u8 {
		unsafe { self.base.add(self.block_offset(blk)) }
	}

	/// Read-only view of block `blk`. The caller is responsible for any
	/// synchronization it needs; see module docs.
	pub fn block_ref(&self, blk: u32) -> &[u8] {
		unsafe { std::slice::from_raw_parts(self.block_ptr(blk), BLOCK_SIZE as usize) }
	}

	/// Mutable view of block `blk`. Callers must hold `lock_block(blk)`
	/// for the duration of use.
	pub(crate) fn block_mut(&self, blk: u32) -> &mut [u8] {
		unsafe { std::slice::from_raw_parts_mut(self.block_ptr(blk), BLOCK_SIZE as usize) }
	}

	/// Copies `data` into block `blk` under that block's lock.
	pub fn write_block(&self, blk: u32, data: &[u8; BLOCK_SIZE as usize]) {
		let _guard = self.locks.lock_block(blk);
		self.block_mut(blk).copy_from_slice(data);
	}

	fn inode_offset(&self, ino: u32) -> usize {
		debug_assert!(ino >= 1 && ino <= self.total_inodes, "inode {ino} out of range");
		let inode_size = std::mem::size_of::<Inode>();
		self.inode_table_block as usize * BLOCK_SIZE as usize + (ino - 1) as usize * inode_size
	}

	fn inode_ptr(&self, ino: u32) -> *mut Inode {
		unsafe { self.base.add(self.inode_offset(ino)) as *mut Inode }
	}

	/// Reads inode `ino` (unlocked: see module docs).
	pub fn read_inode(&self, ino: u32) -> Inode {
		unsafe { self.inode_ptr(ino).read_unaligned() }
	}

	/// Writes `src` into inode `ino`'s slot under that inode's lock.
	pub fn write_inode(&self, ino: u32, src: &Inode) {
		let _guard = self.locks.lock_inode(ino);
		unsafe { self.inode_ptr(ino).write_unaligned(*src) };
	}

	/// Writes `src` into inode `ino`'s slot without acquiring its lock.
	/// Callers that already hold `lock_inode(ino)` — e.g. `dirent::add_entry`,
	/// which keeps the parent locked across its whole read-modify-write —
	/// use this instead of [`Mount::write_inode`] to avoid self-deadlock.
	pub(crate) fn write_inode_locked(&self, ino: u32, src: &Inode) {
		unsafe { self.inode_ptr(ino).write_unaligned(*src) };
	}

	fn superblock_ptr(&self) -> *mut Superblock {
		unsafe { self.base.add(crate::types::SUPERBLOCK_BLOCK as usize * BLOCK_SIZE as usize) as *mut Superblock }
	}

	fn group_desc_ptr(&self) -> *mut GroupDescriptor {
		unsafe { self.base.add(crate::types::GROUP_DESC_BLOCK as usize * BLOCK_SIZE as usize) as *mut GroupDescriptor }
	}

	/// Read-only snapshot of the superblock.
	pub fn superblock(&self) -> Superblock {
		unsafe { self.superblock_ptr().read_unaligned() }
	}

	/// Read-only snapshot of the group descriptor.
	pub fn group_desc(&self) -> GroupDescriptor {
		unsafe { self.group_desc_ptr().read_unaligned() }
	}

	/// Decrements the free-inode counters in both the superblock and the
	/// group descriptor. Caller must hold the inode-bitmap lock.
	pub(crate) fn dec_free_inodes(&self) {
		unsafe {
			let sb = addr_of_mut!((*self.superblock_ptr()).s_free_inodes_count);
			sb.write_unaligned(sb.read_unaligned() - 1);
			let gd = addr_of_mut!((*self.group_desc_ptr()).bg_free_inodes_count);
			gd.write_unaligned(gd.read_unaligned() - 1);
		}
	}

	/// Increments the free-inode counters. Caller must hold the
	/// inode-bitmap lock.
	pub(crate) fn inc_free_inodes(&self) {
		unsafe {
			let sb = addr_of_mut!((*self.superblock_ptr()).s_free_inodes_count);
			sb.write_unaligned(sb.read_unaligned() + 1);
			let gd = addr_of_mut!((*self.group_desc_ptr()).bg_free_inodes_count);
			gd.write_unaligned(gd.read_unaligned() + 1);
		}
	}

	/// Decrements the free-block counters. Caller must hold the
	/// block-bitmap lock.
	pub(crate) fn dec_free_blocks(&self) {
		unsafe {
			let sb = addr_of_mut!((*self.superblock_ptr()).s_free_blocks_count);
			sb.write_unaligned(sb.read_unaligned() - 1);
			let gd = addr_of_mut!((*self.group_desc_ptr()).bg_free_blocks_count);
			gd.write_unaligned(gd.read_unaligned() - 1);
		}
	}

	/// Increments the free-block counters. Caller must hold the
	/// block-bitmap lock.
	pub(crate) fn inc_free_blocks(&self) {
		unsafe {
			let sb = addr_of_mut!((*self.superblock_ptr()).s_free_blocks_count);
			sb.write_unaligned(sb.read_unaligned() + 1);
			let gd = addr_of_mut!((*self.group_desc_ptr()).bg_free_blocks_count);
			gd.write_unaligned(gd.read_unaligned() + 1);
		}
	}

	/// Adjusts the used-directories counter. Called only from
	/// `dirent::add_entry`'s commit point, under the parent inode's lock —
	/// never duplicated at the call sites that create directories, since
	/// every new directory ultimately goes through `add_entry` exactly
	/// once.
	pub(crate) fn adjust_used_dirs(&self, delta: i16) {
		unsafe {
			let gd = addr_of_mut!((*self.group_desc_ptr()).bg_used_dirs_count);
			let v = gd.read_unaligned() as i16 + delta;
			gd.write_unaligned(v as u16);
		}
	}

	/// Read-only view of the inode bitmap.
	pub fn inode_bitmap(&self) -> &[u8] {
		let len = self.inode_bitmap_len();
		unsafe { std::slice::from_raw_parts(self.block_ptr(self.inode_bitmap_block), len) }
	}

	/// Mutable view of the inode bitmap. Caller must hold the
	/// inode-bitmap lock.
	pub(crate) fn inode_bitmap_mut(&self) -> &mut [u8] {
		let len = self.inode_bitmap_len();
		unsafe { std::slice::from_raw_parts_mut(self.block_ptr(self.inode_bitmap_block), len) }
	}

	/// Read-only view of the block bitmap.
	pub fn block_bitmap(&self) -> &[u8] {
		let len = self.block_bitmap_len();
		unsafe { std::slice::from_raw_parts(self.block_ptr(self.block_bitmap_block), len) }
	}

	/// Mutable view of the block bitmap. Caller must hold the
	/// block-bitmap lock.
	pub(crate) fn block_bitmap_mut(&self) -> &mut [u8] {
		let len = self.block_bitmap_len();
		unsafe { std::slice::from_raw_parts_mut(self.block_ptr(self.block_bitmap_block), len) }
	}

	fn inode_bitmap_len(&self) -> usize {
		self.total_inodes.div_ceil(8) as usize
	}

	fn block_bitmap_len(&self) -> usize {
		self.total_blocks.div_ceil(8) as usize
	}

	pub fn total_inodes(&self) -> u32 {
		self.total_inodes
	}

	pub fn total_blocks(&self) -> u32 {
		self.total_blocks
	}

	pub fn first_non_reserved_inode(&self) -> u32 {
		self.first_non_reserved_inode
	}
}

/// Reads the 32-bit block numbers stored in a single-indirect block.
pub(crate) fn read_indirect_block(mount: &Mount, indirect_blk: u32) -> [u32; PTRS_PER_INDIRECT_BLOCK] {
	let bytes = mount.block_ref(indirect_blk);
	let mut out = [0u32; PTRS_PER_INDIRECT_BLOCK];
	for (i, chunk) in bytes.chunks_exact(4).enumerate() {
		out[i] = u32::from_ne_bytes(chunk.try_into().unwrap());
	}
	out
}

/// Iterates the non-zero direct block pointers of an inode, returning
/// `(slot_index, block_number)` pairs.
pub(crate) fn direct_pointers(inode: &Inode) -> impl Iterator<Item = (usize, u32)> + '_ {
	inode.i_block[..DIRECT_POINTERS]
		.iter()
		.enumerate()
		.filter(|(_, &b)| b != 0)
		.map(|(i, &b)| (i, b))
}

/// The inode's indirect block pointer (`i_block[12]`), if non-zero.
pub(crate) fn indirect_pointer(inode: &Inode) -> Option<u32> {
	let b = inode.i_block[INDIRECT_INDEX];
	(b != 0).then_some(b)
}
