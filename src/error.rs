//! Status codes returned by namespace operations.

use std::io;

/// Failure taxonomy for the five namespace operations.
///
/// Each variant corresponds to one of the POSIX errno values named in the
/// external contract; [`Ext2Error::errno`] maps back to the matching
/// `libc` constant for callers that sit behind a real syscall boundary.
#[derive(Debug, thiserror::Error)]
pub enum Ext2Error {
	/// Path missing, a mid-path component is not a directory, or a
	/// trailing slash was used on a non-directory.
	#[error("no such file or directory")]
	NotFound,
	/// The target name already exists at the destination.
	#[error("file exists")]
	AlreadyExists,
	/// Operation forbidden on a directory.
	#[error("is a directory")]
	IsADirectory,
	/// The allocator is exhausted, or a directory ran out of direct
	/// block pointers.
	#[error("no space left on device")]
	NoSpace,
	/// A path component exceeded the format's maximum name length.
	#[error("file name too long")]
	NameTooLong,
	/// A host-side read failed while streaming file data.
	#[error("I/O error: {0}")]
	Io(#[from] io::Error),
}

impl Ext2Error {
	/// Returns the POSIX errno value this status corresponds to.
	pub fn errno(&self) -> i32 {
		match self {
			Self::NotFound => libc::ENOENT,
			Self::AlreadyExists => libc::EEXIST,
			Self::IsADirectory => libc::EISDIR,
			Self::NoSpace => libc::ENOSPC,
			Self::NameTooLong => libc::ENAMETOOLONG,
			Self::Io(_) => libc::EIO,
		}
	}
}

impl PartialEq for Ext2Error {
	fn eq(&self, other: &Self) -> bool {
		self.errno() == other.errno()
	}
}

impl Eq for Ext2Error {}

/// Result type returned by every namespace operation.
pub type Result<T> = std::result::Result<T, Ext2Error>;
