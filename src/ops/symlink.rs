//! `symlink`: create a symbolic link whose data block holds the target
//! path text.
//!
//! Grounded in `ext2_fsal_ln_sl` in
//! `examples/original_source/out/src/ext2fsal_ln_sl.c`. Per the format,
//! this crate never produces fast (inline) symlinks: the target text
//! always lives in a data block, even when it would fit in `i_block`.

use crate::error::{Ext2Error, Result};
use crate::mount::Mount;
use crate::types::{BLOCK_SIZE, Inode, file_type, mode};

impl Mount {
	/// Creates a symlink at `dst` whose contents are `target` (opaque
	/// text; not validated or required to resolve to anything).
	pub fn symlink(&self, target: &[u8], dst: &[u8]) -> Result<()> {
		if target.len() > BLOCK_SIZE as usize {
			return Err(Ext2Error::NameTooLong);
		}
		let (parent_path, name) = self.split_parent_name(dst)?;
		let parent_ino = self.path_lookup(&parent_path)?;
		let parent_inode = self.read_inode(parent_ino);
		if !parent_inode.is_dir() {
			return Err(Ext2Error::NotFound);
		}

		if let Some(existing) = self.find_entry(&parent_inode, &name) {
			let existing_inode = self.read_inode(existing);
			return Err(if existing_inode.is_dir() {
				Ext2Error::IsADirectory
			} else {
				Ext2Error::AlreadyExists
			});
		}

		let new_ino = self.alloc_inode().ok_or(Ext2Error::NoSpace)?;
		let new_block = match self.alloc_block() {
			Some(b) => b,
			None => {
				log::warn!("symlink: rolling back inode {new_ino} after block allocation failure");
				self.free_inode(new_ino);
				return Err(Ext2Error::NoSpace);
			}
		};

		let mut inode = Inode::zeroed();
		inode.i_mode = mode::IFLNK | 0o777;
		inode.i_links_count = 1;
		inode.i_size = target.len() as u32;
		inode.i_blocks = BLOCK_SIZE / 512;
		inode.i_block[0] = new_block;
		let now = crate::types::now();
		inode.i_ctime = now;
		inode.i_mtime = now;
		inode.i_atime = now;

		let mut block = [0u8; BLOCK_SIZE as usize];
		block[..target.len()].copy_from_slice(target);
		self.write_block(new_block, &block);
		self.write_inode(new_ino, &inode);

		if let Err(e) = self.add_entry(parent_ino, &name, new_ino, file_type::SYMLINK) {
			log::warn!("symlink: rolling back inode {new_ino} and block {new_block} after add_entry failure: {e}");
			self.free_block(new_block);
			self.free_inode(new_ino);
			return Err(e);
		}

		Ok(())
	}
}
