//! `unlink` (`rm`): remove one name for a file, freeing it once its last
//! link is gone.
//!
//! Grounded in `ext2_fsal_rm` in
//! `examples/original_source/out/src/ext2fsal_rm.c`. The directory entry
//! is matched by **name**, never by inode number — the source has a
//! variant that matches by inode, which is wrong in the presence of hard
//! links (removing one link must not touch another name's entry).

use crate::error::{Ext2Error, Result};
use crate::mount::Mount;

impl Mount {
	/// Removes the name at `path`. Frees the underlying inode and its data
	/// blocks once its link count reaches zero; otherwise only the
	/// directory entry disappears and other names for the same inode keep
	/// working.
	pub fn unlink(&self, path: &[u8]) -> Result<()> {
		let has_trailing_slash = crate::path::has_trailing_slash(path);
		let (parent_path, name) = self.split_parent_name(path)?;
		let parent_ino = self.path_lookup(&parent_path)?;
		let parent_inode = self.read_inode(parent_ino);
		if !parent_inode.is_dir() {
			return Err(Ext2Error::NotFound);
		}

		let target_ino = self.find_entry(&parent_inode, &name).ok_or(Ext2Error::NotFound)?;
		let target_inode = self.read_inode(target_ino);
		if target_inode.is_dir() {
			return Err(Ext2Error::IsADirectory);
		}
		if has_trailing_slash {
			return Err(Ext2Error::NotFound);
		}

		// remove_entry re-walks the parent's directory blocks under the
		// parent's lock, re-verifying the name is still there — it may
		// have been removed or replaced by another thread between the
		// lookup above and this call.
		if !self.remove_entry(parent_ino, &name) {
			return Err(Ext2Error::NotFound);
		}

		let _guard = self.locks.lock_inode(target_ino);
		let mut target_inode = self.read_inode(target_ino);
		target_inode.i_links_count -= 1;
		let reached_zero = target_inode.i_links_count == 0;
		if reached_zero {
			target_inode.i_dtime = crate::types::now();
		}
		self.write_inode_locked(target_ino, &target_inode);
		drop(_guard);

		if reached_zero {
			log::trace!("unlink: last link to inode {target_ino} removed, freeing its blocks");
			self.free_inode_blocks(target_ino);
			self.free_inode(target_ino);
		}

		Ok(())
	}
}
