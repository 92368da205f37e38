//! File data writer: streams bytes from a host source into an inode's
//! direct and single-indirect block pointers, and its inverse.
//!
//! Grounded in `write_data_into_inode`/`free_inode_blocks_locked` in
//! `examples/original_source/out/src/e2fs.c`. Generic over [`HostSource`]
//! rather than a raw file descriptor, the same way `FSFactory`
//! (`mkfs/src/ext2.rs`) abstracts "the thing bytes come from" so tests can
//! supply an in-memory buffer instead of opening a real file.

use crate::error::{Ext2Error, Result};
use crate::mount::Mount;
use crate::types::{BLOCK_SIZE, DIRECT_POINTERS, INDIRECT_INDEX, Inode, PTRS_PER_INDIRECT_BLOCK};
use std::io;

/// A source of file contents to copy into the image. Implemented for
/// anything that already implements [`std::io::Read`] (in particular
/// `std::fs::File`); tests use `std::io::Cursor<&[u8]>`.
pub trait HostSource {
	/// Fills `buf` as far as possible, returning the number of bytes read
	/// (0 at end of source). Mirrors `std::io::Read::read`.
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<R: io::Read> HostSource for R {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		io::Read::read(self, buf)
	}
}

impl Mount {
	/// Streams up to `filesize` bytes from `source` into `inode`'s block
	/// pointers, allocating direct blocks first and then, if needed, a
	/// single-indirect block. `inode`'s 15 pointers are zeroed first.
	///
	/// On allocation failure returns [`Ext2Error::NoSpace`]; on a host read
	/// error returns [`Ext2Error::Io`]. Either way, blocks already
	/// allocated are left in place — the caller (a namespace op) is
	/// responsible for freeing them on failure.
	pub(crate) fn write_data_into_inode(
		&self,
		source: &mut impl HostSource,
		inode: &mut Inode,
		filesize: u64,
	) -> Result<()> {
		inode.i_block = [0; crate::types::TOTAL_POINTERS];
		let mut remaining = filesize;
		let mut written_blocks: u32 = 0;

		for slot in 0..DIRECT_POINTERS {
			if remaining == 0 {
				break;
			}
			let b = self.alloc_block().ok_or(Ext2Error::NoSpace)?;
			let mut buf = [0u8; BLOCK_SIZE as usize];
			let r = source.read(&mut buf).map_err(Ext2Error::Io)?;
			self.write_block(b, &buf);
			inode.i_block[slot] = b;
			remaining = remaining.saturating_sub(r as u64);
			written_blocks += 1;
		}

		if remaining > 0 {
			let indirect_blk = self.alloc_block().ok_or(Ext2Error::NoSpace)?;
			let mut ptrs = [0u32; PTRS_PER_INDIRECT_BLOCK];
			for slot in ptrs.iter_mut() {
				if remaining == 0 {
					break;
				}
				let b = self.alloc_block().ok_or(Ext2Error::NoSpace)?;
				let mut buf = [0u8; BLOCK_SIZE as usize];
				let r = source.read(&mut buf).map_err(Ext2Error::Io)?;
				self.write_block(b, &buf);
				*slot = b;
				remaining = remaining.saturating_sub(r as u64);
				written_blocks += 1;
			}
			let mut ptr_block = [0u8; BLOCK_SIZE as usize];
			for (i, &p) in ptrs.iter().enumerate() {
				ptr_block[i * 4..i * 4 + 4].copy_from_slice(&p.to_ne_bytes());
			}
			self.write_block(indirect_blk, &ptr_block);
			inode.i_block[INDIRECT_INDEX] = indirect_blk;
		}

		inode.i_size = filesize as u32;
		inode.i_blocks = written_blocks * (BLOCK_SIZE / 512);
		Ok(())
	}

	/// Frees every data block referenced by inode `ino` (direct and, if
	/// present, single-indirect), then zeroes its size and block count.
	/// Held under the inode's own lock for the duration, matching the
	/// source's `free_inode_blocks_locked`.
	pub(crate) fn free_inode_blocks(&self, ino: u32) {
		let _guard = self.locks.lock_inode(ino);
		let mut inode = self.read_inode(ino);

		for slot in 0..DIRECT_POINTERS {
			if inode.i_block[slot] != 0 {
				self.free_block(inode.i_block[slot]);
				inode.i_block[slot] = 0;
			}
		}

		if inode.i_block[INDIRECT_INDEX] != 0 {
			let indirect_blk = inode.i_block[INDIRECT_INDEX];
			let ptrs = crate::access::read_indirect_block(self, indirect_blk);
			for &p in ptrs.iter() {
				if p != 0 {
					self.free_block(p);
				}
			}
			self.free_block(indirect_blk);
			inode.i_block[INDIRECT_INDEX] = 0;
		}

		inode.i_blocks = 0;
		inode.i_size = 0;
		self.write_inode_locked(ino, &inode);
	}
}
