//! Shared fixture and invariant-checking helpers for the integration test
//! suite. Deliberately independent of `src/tests_support.rs` (which is
//! `#[cfg(test)]`-private to the library and unavailable here): this
//! module builds a fresh image through the same public types the library
//! ships (`ext2mut::types`, `ext2mut::bitmap`) rather than reusing
//! library-internal helpers.

use ext2mut::types::{
	BLOCK_SIZE, DIR_ENTRY_HEADER_LEN, DirEntryHeader, GroupDescriptor, Inode, ROOT_INODE, Superblock,
	file_type, min_rec_len, mode,
};
use ext2mut::{Mount, bitmap};
use std::collections::HashSet;
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

fn write_header(block: &mut [u8], offset: usize, header: &DirEntryHeader) {
	block[offset..offset + 4].copy_from_slice(&header.inode.to_ne_bytes());
	block[offset + 4..offset + 6].copy_from_slice(&header.rec_len.to_ne_bytes());
	block[offset + 6] = header.name_len;
	block[offset + 7] = header.file_type;
}

fn write_dot_entries(block: &mut [u8], self_ino: u32, parent_ino: u32) {
	let dot_len = min_rec_len(1);
	write_header(
		block,
		0,
		&DirEntryHeader {
			inode: self_ino,
			rec_len: dot_len as u16,
			name_len: 1,
			file_type: file_type::DIR,
		},
	);
	block[DIR_ENTRY_HEADER_LEN] = b'.';

	write_header(
		block,
		dot_len,
		&DirEntryHeader {
			inode: parent_ino,
			rec_len: (BLOCK_SIZE as usize - dot_len) as u16,
			name_len: 2,
			file_type: file_type::DIR,
		},
	);
	block[dot_len + DIR_ENTRY_HEADER_LEN..dot_len + DIR_ENTRY_HEADER_LEN + 2].copy_from_slice(b"..");
}

/// Formats a fresh image with `total_blocks` 1 KiB blocks and
/// `total_inodes` inodes, then mounts it. Returns the backing temp file
/// (kept alive for the mount's lifetime) and the mount handle.
pub fn fresh_image(total_blocks: u32, total_inodes: u32) -> (NamedTempFile, Mount) {
	let inode_table_blocks = (total_inodes as usize * size_of::<Inode>()).div_ceil(BLOCK_SIZE as usize) as u32;
	let first_data_block = INODE_TABLE_START + inode_table_blocks;
	assert!(first_data_block < total_blocks, "fixture too small to hold metadata + one data block");

	let file = NamedTempFile::new().expect("create temp image");
	{
		let mut f = file.reopen().expect("reopen temp image");
		f.set_len(total_blocks as u64 * BLOCK_SIZE as u64).unwrap();

		let mut sb = Superblock::new(total_blocks, total_inodes, 0);
		const FIRST_NON_RESERVED: u32 = 11;
		sb.s_free_inodes_count = total_inodes - FIRST_NON_RESERVED + 1;
		sb.s_free_blocks_count = total_blocks - first_data_block - 1;

		let mut gd = GroupDescriptor::new(BLOCK_BITMAP_BLOCK, INODE_BITMAP_BLOCK, INODE_TABLE_START);
		gd.bg_free_inodes_count = sb.s_free_inodes_count as u16;
		gd.bg_free_blocks_count = sb.s_free_blocks_count as u16;
		gd.bg_used_dirs_count = 1;

		let mut block_bitmap = vec![0u8; BLOCK_SIZE as usize];
		bitmap::fill_prefix(&mut block_bitmap, (first_data_block + 1) as usize);

		// Reserve inodes 1..FIRST_NON_RESERVED, exclusive of
		// FIRST_NON_RESERVED itself, which must stay allocatable.
		let mut inode_bitmap = vec![0u8; BLOCK_SIZE as usize];
		bitmap::fill_prefix(&mut inode_bitmap, (FIRST_NON_RESERVED - 1) as usize);
		bitmap::set(&mut inode_bitmap, (ROOT_INODE - 1) as usize);

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
		f.seek(SeekFrom::Start(ext2mut::types::SUPERBLOCK_BLOCK as u64 * BLOCK_SIZE as u64)).unwrap();
		f.write_all(as_bytes(&sb)).unwrap();
		f.seek(SeekFrom::Start(ext2mut::types::GROUP_DESC_BLOCK as u64 * BLOCK_SIZE as u64)).unwrap();
		f.write_all(as_bytes(&gd)).unwrap();
		f.seek(SeekFrom::Start(BLOCK_BITMAP_BLOCK as u64 * BLOCK_SIZE as u64)).unwrap();
		f.write_all(&block_bitmap).unwrap();
		f.seek(SeekFrom::Start(INODE_BITMAP_BLOCK as u64 * BLOCK_SIZE as u64)).unwrap();
		f.write_all(&inode_bitmap).unwrap();
		for i in 0..inode_table_blocks {
			f.seek(SeekFrom::Start((INODE_TABLE_START + i) as u64 * BLOCK_SIZE as u64)).unwrap();
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

/// Walks the whole tree from the root and checks the invariants named in
/// the testable-properties section: free counters agree with bitmap
/// popcount, every directory's `.`/`..` entries are intact, link counts
/// match the number of names referring to each inode, and no block
/// appears twice across all inodes' pointers.
pub fn assert_invariants(mount: &Mount) {
	let sb = mount.superblock();
	let gd = mount.group_desc();

	let used_inodes = bitmap::popcount(mount.inode_bitmap(), mount.total_inodes() as usize);
	let free_inodes = mount.total_inodes() - used_inodes;
	assert_eq!(sb.s_free_inodes_count, free_inodes, "superblock free-inode count drifted from the bitmap");
	assert_eq!(gd.bg_free_inodes_count as u32, free_inodes, "group descriptor free-inode count drifted from the bitmap");

	let used_blocks = bitmap::popcount(mount.block_bitmap(), mount.total_blocks() as usize);
	let free_blocks = mount.total_blocks() - used_blocks;
	assert_eq!(sb.s_free_blocks_count, free_blocks, "superblock free-block count drifted from the bitmap");
	assert_eq!(gd.bg_free_blocks_count as u32, free_blocks, "group descriptor free-block count drifted from the bitmap");

	let mut referenced_blocks: HashSet<u32> = HashSet::new();
	let mut link_counts_seen: std::collections::HashMap<u32, u32> = std::collections::HashMap::new();
	let mut stack = vec![(ROOT_INODE, ROOT_INODE)];
	let mut visited_dirs = HashSet::new();
	let mut visited_files = HashSet::new();

	while let Some((ino, parent_ino)) = stack.pop() {
		if !visited_dirs.insert(ino) {
			continue;
		}
		let inode = mount.read_inode(ino);
		assert!(bitmap::test(mount.inode_bitmap(), (ino - 1) as usize), "directory inode {ino} not marked used");
		collect_blocks(mount, &inode, &mut referenced_blocks);

		let entries = mount.list_dir(ino);
		let dot = entries.iter().find(|(name, ..)| name == b".").expect("missing '.' entry");
		assert_eq!(dot.1, ino, "'.' does not point back at its own directory");
		let dotdot = entries.iter().find(|(name, ..)| name == b"..").expect("missing '..' entry");
		assert_eq!(dotdot.1, parent_ino, "'..' does not point at the real parent");

		for (name, child_ino, file_type_tag) in &entries {
			if name == b"." || name == b".." {
				continue;
			}
			*link_counts_seen.entry(*child_ino).or_insert(0) += 1;
			if *file_type_tag == file_type::DIR {
				stack.push((*child_ino, ino));
			} else if visited_files.insert(*child_ino) {
				// Collected once per distinct inode, regardless of how many
				// hard-link names reach it.
				let child = mount.read_inode(*child_ino);
				collect_blocks(mount, &child, &mut referenced_blocks);
			}
		}
	}

	for (ino, seen_names) in &link_counts_seen {
		let inode = mount.read_inode(*ino);
		if inode.is_dir() {
			// A directory's link count is 2 (itself + its own "..") plus
			// one per subdirectory's ".." pointing back at it, not simply
			// the number of names in its parent (always exactly one).
			continue;
		}
		assert_eq!(
			inode.i_links_count as u32, *seen_names,
			"inode {ino}'s link count does not match the number of names referring to it"
		);
	}

	for &blk in &referenced_blocks {
		assert!(bitmap::test(mount.block_bitmap(), blk as usize), "block {blk} is referenced but not marked used");
	}
}

fn collect_blocks(mount: &Mount, inode: &Inode, out: &mut HashSet<u32>) {
	for &b in inode.i_block[..12].iter() {
		if b != 0 {
			assert!(out.insert(b), "block {b} referenced by more than one inode");
		}
	}
	let indirect = inode.i_block[12];
	if indirect != 0 {
		assert!(out.insert(indirect), "indirect block {indirect} referenced by more than one inode");
		let bytes = mount.block_ref(indirect);
		for chunk in bytes.chunks_exact(4) {
			let p = u32::from_ne_bytes(chunk.try_into().unwrap());
			if p != 0 {
				assert!(out.insert(p), "block {p} referenced by more than one inode");
			}
		}
	}
}
