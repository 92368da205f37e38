//! On-disk layout: classic ext2, 1 KiB blocks, single block group, revision 0.
//!
//! These structures are the wire format this crate reads and writes; they
//! are not redesigned here, only given Rust field types. Layout mirrors
//! `mkfs/src/ext2.rs`'s structs, trimmed to the single block group this
//! crate assumes.

use std::mem::size_of;

/// Size of a block in bytes. The only block size this crate supports.
pub const BLOCK_SIZE: u32 = 1024;
/// Block holding the superblock.
pub const SUPERBLOCK_BLOCK: u32 = 1;
/// Block holding the (single) group descriptor.
pub const GROUP_DESC_BLOCK: u32 = 2;
/// ext2 magic number.
pub const EXT2_MAGIC: u16 = 0xef53;
/// The root directory's inode number.
pub const ROOT_INODE: u32 = 2;
/// Default floor below which `alloc_inode` never returns a number.
pub const DEFAULT_FIRST_NON_RESERVED_INODE: u32 = 11;
/// Maximum path length this crate's path resolver will accept.
pub const PATH_MAX: usize = 4096;
/// Maximum length of a single path component (ext2 `EXT2_NAME_LEN`).
pub const NAME_MAX: usize = 255;

/// Number of direct block pointers in an inode.
pub const DIRECT_POINTERS: usize = 12;
/// Index of the single-indirect pointer within `i_block`.
pub const INDIRECT_INDEX: usize = 12;
/// Total number of block pointer slots in an inode (direct + 3 indirect).
pub const TOTAL_POINTERS: usize = 15;
/// Number of 32-bit block numbers that fit in one indirect block.
pub const PTRS_PER_INDIRECT_BLOCK: usize = BLOCK_SIZE as usize / size_of::<u32>();

/// `i_mode` type bits.
pub mod mode {
	pub const IFDIR: u16 = 0x4000;
	pub const IFREG: u16 = 0x8000;
	pub const IFLNK: u16 = 0xa000;
	pub const TYPE_MASK: u16 = 0xf000;
}

/// Directory entry `file_type` tags.
pub mod file_type {
	pub const UNKNOWN: u8 = 0;
	pub const REG_FILE: u8 = 1;
	pub const DIR: u8 = 2;
	pub const SYMLINK: u8 = 7;
}

/// The ext2 superblock. Occupies block 1 in full (1 KiB).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct Superblock {
	pub s_inodes_count: u32,
	pub s_blocks_count: u32,
	pub s_r_blocks_count: u32,
	pub s_free_blocks_count: u32,
	pub s_free_inodes_count: u32,
	pub s_first_data_block: u32,
	pub s_log_block_size: u32,
	pub s_log_frag_size: i32,
	pub s_blocks_per_group: u32,
	pub s_frags_per_group: u32,
	pub s_inodes_per_group: u32,
	pub s_mtime: u32,
	pub s_wtime: u32,
	pub s_mnt_count: u16,
	pub s_max_mnt_count: u16,
	pub s_magic: u16,
	pub s_state: u16,
	pub s_errors: u16,
	pub s_minor_rev_level: u16,
	pub s_lastcheck: u32,
	pub s_checkinterval: u32,
	pub s_creator_os: u32,
	pub s_rev_level: u32,
	pub s_def_resuid: u16,
	pub s_def_resgid: u16,
	// -- extended (revision 1) fields --
	/// First inode usable for standard files (the reserved-inode floor).
	pub s_first_ino: u32,
	pub s_inode_size: u16,
	pub s_block_group_nr: u16,
	pub s_feature_compat: u32,
	pub s_feature_incompat: u32,
	pub s_feature_ro_compat: u32,
	pub s_uuid: [u8; 16],
	pub s_volume_name: [u8; 16],
	pub s_last_mounted: [u8; 64],
	pub s_algo_bitmap: u32,
	_reserved: [u8; 1024 - 204],
}

const _: () = assert!(size_of::<Superblock>() == BLOCK_SIZE as usize);

impl Superblock {
	/// Builds a fresh, zeroed superblock for a single-group image.
	pub fn new(total_blocks: u32, total_inodes: u32, timestamp: u32) -> Self {
		Self {
			s_inodes_count: total_inodes,
			s_blocks_count: total_blocks,
			s_r_blocks_count: 0,
			s_free_blocks_count: 0,
			s_free_inodes_count: 0,
			s_first_data_block: 1,
			s_log_block_size: 0,
			s_log_frag_size: 0,
			s_blocks_per_group: total_blocks,
			s_frags_per_group: total_blocks,
			s_inodes_per_group: total_inodes,
			s_mtime: 0,
			s_wtime: timestamp,
			s_mnt_count: 0,
			s_max_mnt_count: 0xffff,
			s_magic: EXT2_MAGIC,
			s_state: 1,
			s_errors: 2,
			s_minor_rev_level: 0,
			s_lastcheck: timestamp,
			s_checkinterval: 0,
			s_creator_os: 0,
			s_rev_level: 1,
			s_def_resuid: 0,
			s_def_resgid: 0,
			s_first_ino: DEFAULT_FIRST_NON_RESERVED_INODE,
			s_inode_size: size_of::<Inode>() as u16,
			s_block_group_nr: 0,
			s_feature_compat: 0,
			s_feature_incompat: 0,
			s_feature_ro_compat: 0,
			s_uuid: [0; 16],
			s_volume_name: [0; 16],
			s_last_mounted: [0; 64],
			s_algo_bitmap: 0,
			_reserved: [0; 1024 - 204],
		}
	}
}

/// The (single) block group descriptor.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct GroupDescriptor {
	pub bg_block_bitmap: u32,
	pub bg_inode_bitmap: u32,
	pub bg_inode_table: u32,
	pub bg_free_blocks_count: u16,
	pub bg_free_inodes_count: u16,
	pub bg_used_dirs_count: u16,
	pub bg_pad: u16,
	_reserved: [u8; 12],
}

const _: () = assert!(size_of::<GroupDescriptor>() == 32);

impl GroupDescriptor {
	pub fn new(block_bitmap: u32, inode_bitmap: u32, inode_table: u32) -> Self {
		Self {
			bg_block_bitmap: block_bitmap,
			bg_inode_bitmap: inode_bitmap,
			bg_inode_table: inode_table,
			bg_free_blocks_count: 0,
			bg_free_inodes_count: 0,
			bg_used_dirs_count: 0,
			bg_pad: 0,
			_reserved: [0; 12],
		}
	}
}

/// A fixed-size inode record (revision 0 size: 128 bytes).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct Inode {
	pub i_mode: u16,
	pub i_uid: u16,
	pub i_size: u32,
	pub i_atime: u32,
	pub i_ctime: u32,
	pub i_mtime: u32,
	pub i_dtime: u32,
	pub i_gid: u16,
	pub i_links_count: u16,
	pub i_blocks: u32,
	pub i_flags: u32,
	pub i_osd1: u32,
	pub i_block: [u32; TOTAL_POINTERS],
	pub i_generation: u32,
	pub i_file_acl: u32,
	pub i_dir_acl: u32,
	pub i_faddr: u32,
	pub i_osd2: [u8; 12],
}

const _: () = assert!(size_of::<Inode>() == 128);

impl Inode {
	pub const fn zeroed() -> Self {
		Self {
			i_mode: 0,
			i_uid: 0,
			i_size: 0,
			i_atime: 0,
			i_ctime: 0,
			i_mtime: 0,
			i_dtime: 0,
			i_gid: 0,
			i_links_count: 0,
			i_blocks: 0,
			i_flags: 0,
			i_osd1: 0,
			i_block: [0; TOTAL_POINTERS],
			i_generation: 0,
			i_file_acl: 0,
			i_dir_acl: 0,
			i_faddr: 0,
			i_osd2: [0; 12],
		}
	}

	/// The inode's type tag, independent of permission bits.
	pub fn file_type(&self) -> u16 {
		self.i_mode & mode::TYPE_MASK
	}

	pub fn is_dir(&self) -> bool {
		self.file_type() == mode::IFDIR
	}

	pub fn is_symlink(&self) -> bool {
		self.file_type() == mode::IFLNK
	}
}

/// The fixed-size header of a directory entry; `name` follows immediately
/// after for `name_len` bytes.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct DirEntryHeader {
	pub inode: u32,
	pub rec_len: u16,
	pub name_len: u8,
	pub file_type: u8,
}

pub const DIR_ENTRY_HEADER_LEN: usize = size_of::<DirEntryHeader>();

const _: () = assert!(DIR_ENTRY_HEADER_LEN == 8);

/// Current wall-clock time as a 32-bit Unix timestamp, for `i_ctime` /
/// `i_mtime` / `i_atime` / `i_dtime`. Mirrors the source's bare `time(NULL)`.
pub(crate) fn now() -> u32 {
	use std::time::{SystemTime, UNIX_EPOCH};
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("system clock before Unix epoch")
		.as_secs() as u32
}

/// Rounds `n` up to the next multiple of 4.
pub const fn align4(n: usize) -> usize {
	(n + 3) & !3
}

/// Minimum record length able to hold a name of the given length.
pub const fn min_rec_len(name_len: usize) -> usize {
	align4(DIR_ENTRY_HEADER_LEN + name_len)
}
