//! `mkdir`: create a new directory.
//!
//! Grounded in `ext2_fsal_mkdir` in
//! `examples/original_source/out/src/ext2fsal_mkdir.c`.

use crate::dirent::write_dot_entries;
use crate::error::{Ext2Error, Result};
use crate::mount::Mount;
use crate::types::{BLOCK_SIZE, Inode, file_type, mode};

impl Mount {
	/// Creates a new, empty directory at `path`.
	///
	/// The parent must exist and be a directory; `path`'s final component
	/// must not already exist as a directory (`EEXIST`) or as a
	/// non-directory (`EEXIST`, except when `path` itself has a trailing
	/// slash over an existing non-directory, which is `ENOENT`). On any
	/// failure after inode/block allocation, both are rolled back.
	pub fn mkdir(&self, path: &[u8]) -> Result<()> {
		let (parent_path, name) = self.split_parent_name(path)?;
		let parent_ino = self.path_lookup(&parent_path)?;
		let parent_inode = self.read_inode(parent_ino);
		if !parent_inode.is_dir() {
			return Err(Ext2Error::NotFound);
		}

		if let Some(existing) = self.find_entry(&parent_inode, &name) {
			let existing_inode = self.read_inode(existing);
			if existing_inode.is_dir() {
				return Err(Ext2Error::AlreadyExists);
			}
			if crate::path::has_trailing_slash(path) {
				return Err(Ext2Error::NotFound);
			}
			return Err(Ext2Error::AlreadyExists);
		}

		let new_ino = self.alloc_inode().ok_or(Ext2Error::NoSpace)?;
		let new_block = match self.alloc_block() {
			Some(b) => b,
			None => {
				log::warn!("mkdir: rolling back inode {new_ino} after block allocation failure");
				self.free_inode(new_ino);
				return Err(Ext2Error::NoSpace);
			}
		};

		let mut inode = Inode::zeroed();
		inode.i_mode = mode::IFDIR | 0o755;
		inode.i_size = BLOCK_SIZE;
		inode.i_links_count = 2;
		inode.i_blocks = BLOCK_SIZE / 512;
		inode.i_block[0] = new_block;
		let now = crate::types::now();
		inode.i_ctime = now;
		inode.i_mtime = now;
		inode.i_atime = now;
		self.write_inode(new_ino, &inode);

		let mut block = [0u8; BLOCK_SIZE as usize];
		write_dot_entries(&mut block, new_ino, parent_ino);
		self.write_block(new_block, &block);

		if let Err(e) = self.add_entry(parent_ino, &name, new_ino, file_type::DIR) {
			log::warn!("mkdir: rolling back inode {new_ino} and block {new_block} after add_entry failure: {e}");
			self.free_block(new_block);
			self.free_inode(new_ino);
			return Err(e);
		}

		let mut parent = self.read_inode(parent_ino);
		parent.i_links_count += 1;
		self.write_inode(parent_ino, &parent);

		Ok(())
	}
}
