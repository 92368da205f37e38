//! Path resolution: absolute-path tokenizing, directory-tree walking, and
//! parent/name splitting.
//!
//! Grounded in `path_lookup`/`split_parent_name`/`strip_trailing_slashes`
//! in `examples/original_source/out/src/e2fs.c`, with one deliberate
//! correction: the source's `..` handling snaps straight to the root
//! inode, which is wrong for any path below the first level. `..` is
//! instead resolved honestly by following the current directory's own
//! `..` entry — every directory this crate creates carries one (see
//! `ops::mkdir`), so the walk is always available.

use crate::error::{Ext2Error, Result};
use crate::mount::Mount;
use crate::types::{NAME_MAX, PATH_MAX, ROOT_INODE};

impl Mount {
	/// Resolves `path` to the inode number it names. A read-only
	/// complement to the five mutating namespace operations, useful for
	/// inspecting the image without decoding directory blocks by hand.
	pub fn lookup(&self, path: &[u8]) -> Result<u32> {
		self.path_lookup(path)
	}

	/// Resolves an absolute path to an inode number.
	pub(crate) fn path_lookup(&self, path: &[u8]) -> Result<u32> {
		if path.is_empty() || path[0] != b'/' {
			return Err(Ext2Error::NotFound);
		}
		if path.len() > PATH_MAX {
			return Err(Ext2Error::NameTooLong);
		}
		if path == b"/" {
			return Ok(ROOT_INODE);
		}

		let mut curr_ino = ROOT_INODE;
		for token in path.split(|&b| b == b'/').filter(|t| !t.is_empty()) {
			if token == b"." {
				continue;
			}
			let curr_inode = self.read_inode(curr_ino);
			if !curr_inode.is_dir() {
				return Err(Ext2Error::NotFound);
			}
			if token == b".." {
				// Honest walk: follow the directory's own ".." entry
				// rather than snapping to root.
				curr_ino = self.find_entry(&curr_inode, b"..").ok_or(Ext2Error::NotFound)?;
				continue;
			}
			curr_ino = self.find_entry(&curr_inode, token).ok_or(Ext2Error::NotFound)?;
		}
		Ok(curr_ino)
	}

	/// Splits `path` into its parent directory path and final component.
	/// `path` must be absolute and not just `/`.
	pub(crate) fn split_parent_name(&self, path: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
		if path.is_empty() || path[0] != b'/' {
			return Err(Ext2Error::NotFound);
		}
		let stripped = strip_trailing_slashes(path);
		if stripped == b"/" {
			return Err(Ext2Error::NotFound);
		}

		let last_slash = stripped.iter().rposition(|&b| b == b'/').ok_or(Ext2Error::NotFound)?;
		let parent = if last_slash == 0 {
			b"/".to_vec()
		} else {
			stripped[..last_slash].to_vec()
		};
		let name = &stripped[last_slash + 1..];
		if name.is_empty() {
			return Err(Ext2Error::NotFound);
		}
		if name.len() >= NAME_MAX {
			return Err(Ext2Error::NameTooLong);
		}
		Ok((parent, name.to_vec()))
	}
}

/// Strips trailing `/` characters, preserving a lone leading `/`.
pub(crate) fn strip_trailing_slashes(path: &[u8]) -> &[u8] {
	let mut end = path.len();
	while end > 1 && path[end - 1] == b'/' {
		end -= 1;
	}
	&path[..end]
}

/// True if `path` (before trailing-slash stripping) ends with `/`, used by
/// namespace ops that special-case a directory-style destination.
pub(crate) fn has_trailing_slash(path: &[u8]) -> bool {
	path.len() > 1 && path[path.len() - 1] == b'/'
}

