//! Test-only image formatter: lays out a fresh, single-group ext2 image
//! directly onto a temp file, then mounts it.
//!
//! Grounded in `mkfs/src/ext2.rs`'s `Ext2Factory::create` and
//! `fill_bitmap`, trimmed to the fixed 1 KiB block size and single block
//! group this crate assumes, and writing the [`crate::types`] structs
//! directly since this image only ever needs to round-trip through
//! [`Mount::open`].

use crate::dirent::write_dot_entries;
use crate::mount::Mount;
use crate::types::{BLOCK_SIZE, GroupDescriptor, Inode, ROOT_INODE, Superblock, mode};
use std::io::{Seek, SeekFrom, Write};
use std::mem::size_of;
use tempfile::NamedTempFile;

const BOOT_BLOCK: u32 = 0;
const BLOCK_BITMAP_BLOCK: u32 = 3;
const INODE_BITMAP_BLOCK: u32 = 4;
const INODE_TABLE_START: u32 = 5;

fn as_bytes<T>(v: &T) -> &[u8] {
	unsafe { std::slice::from_raw_parts(v as *const T as *const u8, size_of::<T>()) }
}

/// Formats a fresh image with `total_blocks` 1 KiB blocks and
/// `total_inodes` inodes, then mounts it. Returns the backing temp file
/// (kept alive for the mount's lifetime) and the mount handle.
pub(crate) fn fresh_mount(total_blocks: u32, total_inodes: u32) -> (NamedTempFile, Mount) {
	let inode_table_blocks = (total_inodes as usize * size_of::<Inode>()).div_ceil(BLOCK_SIZE as usize) as u32;
	let first_data_block = INODE_TABLE_START + inode_table_blocks;
	assert!(
		first_data_block < total_blocks,
		"fixture too small to hold metadata + one data block"
	);

	let file = NamedTempFile::new().expect("create temp image");
	{
		let mut f = file.reopen().expect("reopen temp image");
		f.set_len(total_blocks as u64 * BLOCK_SIZE as u64).unwrap();

		let timestamp = 0;
		let mut sb = Superblock::new(total_blocks, total_inodes, timestamp);
		sb.s_free_inodes_count = total_inodes - crate::types::DEFAULT_FIRST_NON_RESERVED_INODE + 1;
		sb.s_free_blocks_count = total_blocks - first_data_block - 1;

		let mut gd = GroupDescriptor::new(BLOCK_BITMAP_BLOCK, INODE_BITMAP_BLOCK, INODE_TABLE_START);
		gd.bg_free_inodes_count = sb.s_free_inodes_count as u16;
		gd.bg_free_blocks_count = sb.s_free_blocks_count as u16;
		gd.bg_used_dirs_count = 1;

		// block bitmap: metadata blocks 0..first_data_block are used, plus
		// the root directory's one data block.
		let mut block_bitmap = vec![0u8; BLOCK_SIZE as usize];
		crate::bitmap::fill_prefix(&mut block_bitmap, (first_data_block + 1) as usize);

		// inode bitmap: reserved inodes (1..floor, exclusive of floor
		// itself, which must stay allocatable) plus the root inode (2) are
		// used.
		let mut inode_bitmap = vec![0u8; BLOCK_SIZE as usize];
		crate::bitmap::fill_prefix(&mut inode_bitmap, (crate::types::DEFAULT_FIRST_NON_RESERVED_INODE - 1) as usize);
		crate::bitmap::set(&mut inode_bitmap, (ROOT_INODE - 1) as usize);

		let mut root = Inode::zeroed();
		root.i_mode = mode::IFDIR | 0o755;
		root.i_size = BLOCK_SIZE;
		root.i_links_count = 2;
		root.i_blocks = BLOCK_SIZE / 512;
		root.i_block[0] = first_data_block;

		let mut root_block = vec![0u8; BLOCK_SIZE as usize];
		write_dot_entries(&mut root_block, ROOT_INODE, ROOT_INODE);

		f.seek(SeekFrom::Start(BOOT_BLOCK as u64 * BLOCK_SIZE as u64)).unwrap();
		f.write_all(&vec![0u8; BLOCK_SIZE as usize]).unwrap();
		f.seek(SeekFrom::Start(crate::types::SUPERBLOCK_BLOCK as u64 * BLOCK_SIZE as u64))
			.unwrap();
		f.write_all(as_bytes(&sb)).unwrap();
		f.seek(SeekFrom::Start(crate::types::GROUP_DESC_BLOCK as u64 * BLOCK_SIZE as u64))
			.unwrap();
		f.write_all(as_bytes(&gd)).unwrap();
		f.seek(SeekFrom::Start(BLOCK_BITMAP_BLOCK as u64 * BLOCK_SIZE as u64)).unwrap();
		f.write_all(&block_bitmap).unwrap();
		f.seek(SeekFrom::Start(INODE_BITMAP_BLOCK as u64 * BLOCK_SIZE as u64)).unwrap();
		f.write_all(&inode_bitmap).unwrap();
		for i in 0..inode_table_blocks {
			f.seek(SeekFrom::Start((INODE_TABLE_START + i) as u64 * BLOCK_SIZE as u64))
				.unwrap();
			f.write_all(&vec![0u8; BLOCK_SIZE as usize]).unwrap();
		}
		let inodes_per_block = BLOCK_SIZE as usize / size_of::<Inode>();
		let root_slot = (ROOT_INODE - 1) as usize;
		let root_table_block = INODE_TABLE_START + (root_slot / inodes_per_block) as u32;
		let root_in_block_off = (root_slot % inodes_per_block) * size_of::<Inode>();
		f.seek(SeekFrom::Start(root_table_block as u64 * BLOCK_SIZE as u64 + root_in_block_off as u64))
			.unwrap();
		f.write_all(as_bytes(&root)).unwrap();
		f.seek(SeekFrom::Start(first_data_block as u64 * BLOCK_SIZE as u64)).unwrap();
		f.write_all(&root_block).unwrap();
		f.flush().unwrap();
	}

	let mount = Mount::open(file.path()).expect("mount freshly formatted image");
	(file, mount)
}

