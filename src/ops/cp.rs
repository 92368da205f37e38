//! `cp`: copy a file from the host filesystem into the image.
//!
//! Grounded in `ext2_fsal_cp` in
//! `examples/original_source/out/src/ext2fsal_cp.c`, keeping its
//! three-stage split (resolve destination, classify any existing target,
//! then allocate-or-reuse and stream data) as separate helpers.

use crate::error::{Ext2Error, Result};
use crate::filedata::HostSource;
use crate::mount::Mount;
use crate::types::{Inode, file_type, mode};
use std::fs::File;
use std::path::Path;

/// What a `cp` destination resolves to before data is written.
struct Destination {
	parent_ino: u32,
	name: Vec<u8>,
	/// `Some(ino)` to overwrite an existing regular file's inode in place.
	overwrite: Option<u32>,
}

impl Mount {
	fn resolve_cp_destination(&self, dst: &[u8], src_basename: &[u8]) -> Result<(u32, Vec<u8>)> {
		if crate::path::has_trailing_slash(dst) {
			let dir_ino = self.path_lookup(dst)?;
			if !self.read_inode(dir_ino).is_dir() {
				return Err(Ext2Error::NotFound);
			}
			return Ok((dir_ino, src_basename.to_vec()));
		}
		let (parent_path, name) = self.split_parent_name(dst)?;
		let parent_ino = self.path_lookup(&parent_path)?;
		if !self.read_inode(parent_ino).is_dir() {
			return Err(Ext2Error::NotFound);
		}
		Ok((parent_ino, name))
	}

	fn classify_cp_target(&self, parent_ino: u32, name: &[u8], src_basename: &[u8]) -> Result<Destination> {
		let parent_inode = self.read_inode(parent_ino);
		let Some(existing) = self.find_entry(&parent_inode, name) else {
			return Ok(Destination {
				parent_ino,
				name: name.to_vec(),
				overwrite: None,
			});
		};
		let existing_inode = self.read_inode(existing);
		match existing_inode.file_type() {
			mode::IFLNK => Err(Ext2Error::AlreadyExists),
			mode::IFDIR => {
				// Copy into the directory, using the source's basename.
				let inner_parent_inode = existing_inode;
				if let Some(inner) = self.find_entry(&inner_parent_inode, src_basename) {
					let inner_inode = self.read_inode(inner);
					if inner_inode.is_symlink() || inner_inode.is_dir() {
						return Err(Ext2Error::AlreadyExists);
					}
					return Ok(Destination {
						parent_ino: existing,
						name: src_basename.to_vec(),
						overwrite: Some(inner),
					});
				}
				Ok(Destination {
					parent_ino: existing,
					name: src_basename.to_vec(),
					overwrite: None,
				})
			}
			mode::IFREG => Ok(Destination {
				parent_ino,
				name: name.to_vec(),
				overwrite: Some(existing),
			}),
			_ => Err(Ext2Error::AlreadyExists),
		}
	}

	/// Copies the regular file at `host_src_path` (on the host filesystem)
	/// to `dst` inside the image. Opens and stats the source itself; see
	/// [`Mount::cp_named`] to stream from an already-open [`HostSource`].
	pub fn cp(&self, host_src_path: &Path, dst: &[u8]) -> Result<()> {
		let file = File::open(host_src_path)?;
		let meta = file.metadata()?;
		if !meta.is_file() {
			return Err(Ext2Error::NotFound);
		}
		let src_basename = host_src_path
			.file_name()
			.map(|n| n.to_string_lossy().into_owned())
			.ok_or(Ext2Error::NotFound)?;
		let mut file = file;
		self.cp_named(&mut file, meta.len(), src_basename.as_bytes(), dst)
	}

	/// Copies `filesize` bytes read from `source` to `dst`, using
	/// `src_basename` (the source path's final component) when the
	/// destination is a directory. `src_basename` must not be empty.
	pub fn cp_named(&self, source: &mut impl HostSource, filesize: u64, src_basename: &[u8], dst: &[u8]) -> Result<()> {
		let (parent_ino, name) = self.resolve_cp_destination(dst, src_basename)?;
		let dest = self.classify_cp_target(parent_ino, &name, src_basename)?;

		let use_ino = match dest.overwrite {
			Some(ino) => {
				self.free_inode_blocks(ino);
				ino
			}
			None => self.alloc_inode().ok_or(Ext2Error::NoSpace)?,
		};

		let mut inode = Inode::zeroed();
		inode.i_mode = mode::IFREG | 0o644;
		inode.i_links_count = 1;
		let now = crate::types::now();
		inode.i_ctime = now;
		inode.i_mtime = now;
		inode.i_atime = now;

		if let Err(e) = self.write_data_into_inode(source, &mut inode, filesize) {
			if dest.overwrite.is_none() {
				log::warn!("cp: rolling back inode {use_ino} after write failure: {e}");
				self.free_inode_blocks(use_ino);
				self.free_inode(use_ino);
			}
			return Err(e);
		}
		self.write_inode(use_ino, &inode);

		if dest.overwrite.is_none() {
			if let Err(e) = self.add_entry(dest.parent_ino, &dest.name, use_ino, file_type::REG_FILE) {
				log::warn!("cp: rolling back inode {use_ino} after add_entry failure: {e}");
				self.free_inode_blocks(use_ino);
				self.free_inode(use_ino);
				return Err(e);
			}
		}

		Ok(())
	}
}
