//! `hardlink`: add a new name for an existing file's inode.
//!
//! Grounded in `ext2_fsal_ln_hl` in
//! `examples/original_source/out/src/ext2fsal_ln_hl.c`.

use crate::error::{Ext2Error, Result};
use crate::mount::Mount;
use crate::types::file_type;

impl Mount {
	/// Creates a new directory entry at `dst` pointing at the inode `src`
	/// already resolves to. Unlike POSIX `ln`, an existing directory at
	/// `dst` is `EISDIR`, not a target to link inside.
	pub fn hardlink(&self, src: &[u8], dst: &[u8]) -> Result<()> {
		let src_ino = self.path_lookup(src)?;
		let src_inode = self.read_inode(src_ino);
		if src_inode.is_dir() {
			return Err(Ext2Error::IsADirectory);
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

		let dirent_type = if src_inode.is_symlink() {
			file_type::SYMLINK
		} else {
			file_type::REG_FILE
		};
		self.add_entry(parent_ino, &name, src_ino, dirent_type)?;

		// Parent lock from add_entry has been released by now; lock-order
		// discipline requires it be dropped before taking the (unrelated)
		// source inode's lock.
		let _guard = self.locks.lock_inode(src_ino);
		let mut src_inode = self.read_inode(src_ino);
		src_inode.i_links_count += 1;
		self.write_inode_locked(src_ino, &src_inode);

		Ok(())
	}
}
