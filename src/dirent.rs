//! Directory-entry codec: pack/unpack variable-length entries within a
//! directory block.
//!
//! Grounded in `add_dir_entry`/`find_dir_entry`/`next_dir_entry` in
//! `examples/original_source/out/src/e2fs.c`. Traversal is bounds-checked
//! on every step (the source only partially checks this; every entry
//! iterator here refuses to read past the block end).

use crate::error::{Ext2Error, Result};
use crate::mount::Mount;
use crate::types::{
	DIR_ENTRY_HEADER_LEN, DIRECT_POINTERS, BLOCK_SIZE, DirEntryHeader, file_type, min_rec_len,
};

/// Writes the `.`/`..` pair into a fresh, zeroed directory block. Shared
/// by `ops::mkdir` (building a new directory's own block) and
/// `tests_support` (formatting the root directory of a test fixture).
pub(crate) fn write_dot_entries(block: &mut [u8], self_ino: u32, parent_ino: u32) {
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

/// One entry's header plus its byte offset within the block.
struct EntryView {
	offset: usize,
	header: DirEntryHeader,
}

fn read_header(block: &[u8], offset: usize) -> DirEntryHeader {
	let bytes = &block[offset..offset + DIR_ENTRY_HEADER_LEN];
	DirEntryHeader {
		inode: u32::from_ne_bytes(bytes[0..4].try_into().unwrap()),
		rec_len: u16::from_ne_bytes(bytes[4..6].try_into().unwrap()),
		name_len: bytes[6],
		file_type: bytes[7],
	}
}

fn write_header(block: &mut [u8], offset: usize, header: &DirEntryHeader) {
	block[offset..offset + 4].copy_from_slice(&header.inode.to_ne_bytes());
	block[offset + 4..offset + 6].copy_from_slice(&header.rec_len.to_ne_bytes());
	block[offset + 6] = header.name_len;
	block[offset + 7] = header.file_type;
}

/// Iterates entries in `block`, refusing to step past the block's end.
struct EntryIter<'a> {
	block: &'a [u8],
	offset: usize,
}

impl<'a> Iterator for EntryIter<'a> {
	type Item = EntryView;

	fn next(&mut self) -> Option<EntryView> {
		if self.offset >= self.block.len() {
			return None;
		}
		let header = read_header(self.block, self.offset);
		if header.rec_len == 0 || self.offset + header.rec_len as usize > self.block.len() {
			return None;
		}
		let view = EntryView {
			offset: self.offset,
			header,
		};
		self.offset += header.rec_len as usize;
		Some(view)
	}
}

fn entries(block: &[u8]) -> EntryIter<'_> {
	EntryIter { block, offset: 0 }
}

/// Name bytes of the entry at `offset` in `block`.
fn entry_name<'a>(block: &'a [u8], offset: usize, name_len: u8) -> &'a [u8] {
	let start = offset + DIR_ENTRY_HEADER_LEN;
	&block[start..start + name_len as usize]
}

impl Mount {
	/// Inserts `{name, child_ino, file_type}` into directory `parent_ino`.
	///
	/// Mirrors `add_dir_entry`'s three cases exactly, except for `i_size`:
	/// the source's variants disagree on whether to increment it or set it
	/// to a fixed block size, so here it is always recomputed as
	/// `(highest non-zero block index + 1) × block-size`. The
	/// used-directories counter is bumped only here, at the commit point,
	/// never duplicated by callers.
	pub(crate) fn add_entry(&self, parent_ino: u32, name: &[u8], child_ino: u32, file_type: u8) -> Result<()> {
		let needed = min_rec_len(name.len());
		let _guard = self.locks.lock_inode(parent_ino);
		let mut parent = self.read_inode(parent_ino);
		if !parent.is_dir() {
			return Err(Ext2Error::NotFound);
		}

		let last_block_index = (0..DIRECT_POINTERS).rev().find(|&i| parent.i_block[i] != 0);

		let Some(last_block_index) = last_block_index else {
			// Case A: no blocks yet.
			let new_block = self.alloc_block().ok_or(Ext2Error::NoSpace)?;
			let mut buf = [0u8; BLOCK_SIZE as usize];
			write_header(
				&mut buf,
				0,
				&DirEntryHeader {
					inode: child_ino,
					rec_len: BLOCK_SIZE as u16,
					name_len: name.len() as u8,
					file_type,
				},
			);
			buf[DIR_ENTRY_HEADER_LEN..DIR_ENTRY_HEADER_LEN + name.len()].copy_from_slice(name);
			self.write_block(new_block, &buf);

			parent.i_block[0] = new_block;
			parent.i_size = BLOCK_SIZE;
			parent.i_blocks += BLOCK_SIZE / 512;
			self.write_inode_locked(parent_ino, &parent);
			if file_type == crate::types::file_type::DIR {
				self.adjust_used_dirs(1);
			}
			return Ok(());
		};

		// Case B: does the tail block have room?
		let block_num = parent.i_block[last_block_index];
		{
			let _block_guard = self.locks.lock_block(block_num);
			let block = self.block_mut(block_num);
			if let Some(last) = entries(block).last() {
				let actual_size = min_rec_len(last.header.name_len as usize);
				let slack = last.header.rec_len as usize - actual_size;
				if slack >= needed {
					write_header(
						block,
						last.offset,
						&DirEntryHeader {
							rec_len: actual_size as u16,
							..last.header
						},
					);
					let new_offset = last.offset + actual_size;
					write_header(
						block,
						new_offset,
						&DirEntryHeader {
							inode: child_ino,
							rec_len: slack as u16,
							name_len: name.len() as u8,
							file_type,
						},
					);
					block[new_offset + DIR_ENTRY_HEADER_LEN..new_offset + DIR_ENTRY_HEADER_LEN + name.len()]
						.copy_from_slice(name);
					if file_type == crate::types::file_type::DIR {
						self.adjust_used_dirs(1);
					}
					return Ok(());
				}
			}
		}

		// Case C: tail block is full; grow into a fresh block.
		if last_block_index + 1 >= DIRECT_POINTERS {
			return Err(Ext2Error::NoSpace);
		}
		let new_block = self.alloc_block().ok_or(Ext2Error::NoSpace)?;
		let mut buf = [0u8; BLOCK_SIZE as usize];
		write_header(
			&mut buf,
			0,
			&DirEntryHeader {
				inode: child_ino,
				rec_len: BLOCK_SIZE as u16,
				name_len: name.len() as u8,
				file_type,
			},
		);
		buf[DIR_ENTRY_HEADER_LEN..DIR_ENTRY_HEADER_LEN + name.len()].copy_from_slice(name);
		self.write_block(new_block, &buf);

		parent.i_block[last_block_index + 1] = new_block;
		parent.i_size = (last_block_index as u32 + 2) * BLOCK_SIZE;
		parent.i_blocks += BLOCK_SIZE / 512;
		self.write_inode_locked(parent_ino, &parent);
		if file_type == crate::types::file_type::DIR {
			self.adjust_used_dirs(1);
		}
		Ok(())
	}

	/// Lists the live entries of directory inode `dir_ino` as
	/// `(name, inode, file_type)` triples, skipping tombstoned slots. A
	/// read-only complement to the five mutating namespace operations,
	/// for inspecting the image without decoding directory blocks by hand.
	pub fn list_dir(&self, dir_ino: u32) -> Vec<(Vec<u8>, u32, u8)> {
		let dir = self.read_inode(dir_ino);
		let mut out = Vec::new();
		for &blk in dir.i_block[..DIRECT_POINTERS].iter() {
			if blk == 0 {
				continue;
			}
			let block = self.block_ref(blk);
			for entry in entries(block) {
				if entry.header.inode != 0 {
					let name = entry_name(block, entry.offset, entry.header.name_len).to_vec();
					out.push((name, entry.header.inode, entry.header.file_type));
				}
			}
		}
		out
	}

	/// Looks up `name` inside directory inode `dir`, returning its child
	/// inode number.
	pub(crate) fn find_entry(&self, dir: &crate::types::Inode, name: &[u8]) -> Option<u32> {
		for &blk in dir.i_block[..DIRECT_POINTERS].iter() {
			if blk == 0 {
				continue;
			}
			let block = self.block_ref(blk);
			for entry in entries(block) {
				if entry.header.inode != 0
					&& entry.header.name_len as usize == name.len()
					&& entry_name(block, entry.offset, entry.header.name_len) == name
				{
					return Some(entry.header.inode);
				}
			}
		}
		None
	}

	/// Removes the entry named `name` from directory `parent_ino`.
	///
	/// Matches by name, never by inode number — mandatory for hard-link
	/// correctness (multiple entries may share one inode). Splices the
	/// removed entry's `rec_len` into the previous entry, or tombstones it
	/// (zeroes the inode field, keeps `rec_len`) if it is first in the
	/// block.
	pub(crate) fn remove_entry(&self, parent_ino: u32, name: &[u8]) -> bool {
		let _guard = self.locks.lock_inode(parent_ino);
		let parent = self.read_inode(parent_ino);
		for &blk in parent.i_block[..DIRECT_POINTERS].iter() {
			if blk == 0 {
				continue;
			}
			let _block_guard = self.locks.lock_block(blk);
			let block = self.block_mut(blk);
			let mut prev_offset = None;
			for entry in entries(block) {
				if entry.header.inode != 0
					&& entry.header.name_len as usize == name.len()
					&& entry_name(block, entry.offset, entry.header.name_len) == name
				{
					if let Some(prev_offset) = prev_offset {
						let mut prev = read_header(block, prev_offset);
						prev.rec_len += entry.header.rec_len;
						write_header(block, prev_offset, &prev);
					} else {
						let mut tombstoned = entry.header;
						tombstoned.inode = 0;
						write_header(block, entry.offset, &tombstoned);
					}
					return true;
				}
				prev_offset = Some(entry.offset);
			}
		}
		false
	}
}
