use std::fmt;

use super::error::*;
use crate::crypto::IV_SIZE;

/// Type tag at the start of every Comfy Archive record, stored as a little-endian [`u32`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryType {
	/// `file`
	File,
	/// `dir\0`
	Directory,
	/// `root`, only ever carried by the top-level directory record
	Root,
	/// `null`
	None,
}

impl EntryType {
	/// The raw tag value of this entry type
	pub const fn tag(self) -> u32 {
		match self {
			EntryType::File => u32::from_le_bytes(*b"file"),
			EntryType::Directory => u32::from_le_bytes(*b"dir\0"),
			EntryType::Root => u32::from_le_bytes(*b"root"),
			EntryType::None => u32::from_le_bytes(*b"null"),
		}
	}

	/// Identify an entry type from its raw tag
	pub fn from_tag(tag: u32) -> Option<EntryType> {
		[EntryType::File, EntryType::Directory, EntryType::Root, EntryType::None]
			.into_iter()
			.find(|kind| kind.tag() == tag)
	}
}

/// Archive-wide flags of a Comfy Archive, stored as a little-endian [`u64`]
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ArchiveFlags {
	bits: u64,
}

impl ArchiveFlags {
	/// Pointers and sizes are 64 bits wide
	pub const WIDE_ADDRESSES: u64 = 1 << 0;
	/// File and directory names are obfuscated, see [`xor_obfuscate`](crate::crypto_utils::xor_obfuscate)
	pub const ENCRYPTED_STRINGS: u64 = 1 << 1;
	/// Written by a trusted tool chain
	pub const VERIFIED: u64 = 1 << 2;

	/// Construct from raw bits
	#[inline(always)]
	pub fn from_bits(bits: u64) -> ArchiveFlags {
		ArchiveFlags { bits }
	}

	/// Returns a copy of the underlying number
	#[inline(always)]
	pub fn bits(&self) -> u64 {
		self.bits
	}

	/// Sets or clears the bits in `mask`
	pub fn set(&mut self, mask: u64, toggle: bool) -> u64 {
		if toggle {
			self.bits |= mask;
		} else {
			self.bits &= !mask;
		}

		self.bits
	}

	/// Checks whether the given flag is set
	#[inline(always)]
	pub fn contains(&self, mask: u64) -> bool {
		(self.bits & mask) != 0
	}
}

impl fmt::Debug for ArchiveFlags {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let wide = if self.contains(ArchiveFlags::WIDE_ADDRESSES) { 'W' } else { '-' };
		let strings = if self.contains(ArchiveFlags::ENCRYPTED_STRINGS) { 'S' } else { '-' };
		let verified = if self.contains(ArchiveFlags::VERIFIED) { 'V' } else { '-' };

		write!(f, "ArchiveFlags[{}{}{}]: {:#x}", wide, strings, verified, self.bits)
	}
}

/// Per-record flags of a Comfy Archive, stored as a little-endian [`u32`]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct EntryFlags {
	bits: u32,
}

impl EntryFlags {
	/// Written by a trusted tool chain
	pub const VERIFIED: u32 = 1 << 0;
	/// Reserved for encrypted file data, never set by this crate
	pub const IS_ENCRYPTED: u32 = 1 << 1;
	/// Reserved for compressed file data, never set by this crate
	pub const IS_COMPRESSED: u32 = 1 << 2;

	/// Construct from raw bits
	#[inline(always)]
	pub fn from_bits(bits: u32) -> EntryFlags {
		EntryFlags { bits }
	}

	/// Returns a copy of the underlying number
	#[inline(always)]
	pub fn bits(&self) -> u32 {
		self.bits
	}

	/// Sets or clears the bits in `mask`
	pub fn set(&mut self, mask: u32, toggle: bool) -> u32 {
		if toggle {
			self.bits |= mask;
		} else {
			self.bits &= !mask;
		}

		self.bits
	}

	/// Checks whether the given flag is set
	#[inline(always)]
	pub fn contains(&self, mask: u32) -> bool {
		(self.bits & mask) != 0
	}
}

/// The fixed 64 byte header of a Comfy Archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComfyHeader {
	/// Format major version, readers refuse anything but [`COMFY_VERSION_MAJOR`](crate::COMFY_VERSION_MAJOR)
	pub major: u8,
	/// Format minor version
	pub minor: u8,
	/// Seconds since the unix epoch at build time
	pub creation_date: u64,
	/// Archive-wide flags
	pub flags: ArchiveFlags,
	/// Random per-archive IV, reserved for data encryption
	pub iv: [u8; IV_SIZE],
	/// Size of the record, pool and string region that starts at `data_offset`
	pub data_size: u64,
	/// Absolute offset of the root directory record
	pub data_offset: u64,
}

impl ComfyHeader {
	/// Size of the header in bytes
	pub const SIZE: usize = 64;
	/// Offset of the `data_size` field, patched once the record region is laid out
	pub const DATA_SIZE_OFFSET: u64 = 48;

	pub(crate) const RESERVED_VERSION: u16 = 0xCCCC;
	pub(crate) const CREATOR_ID: [u8; 4] = *b"cmfy";
	pub(crate) const RESERVED_ID: [u8; 4] = [0x90; 4];

	/// Parses a header, validating the magic and the major version
	pub fn from_bytes(bytes: &[u8; ComfyHeader::SIZE]) -> InternalResult<ComfyHeader> {
		let magic = [bytes[0], bytes[1], bytes[2], bytes[3]];
		if magic != crate::COMFY_MAGIC {
			return Err(InternalError::UnrecognizedFormat(magic));
		}

		let major = bytes[4];
		if major != crate::COMFY_VERSION_MAJOR {
			return Err(InternalError::IncompatibleArchiveVersionError(major));
		}

		let mut iv = [0u8; IV_SIZE];
		iv.copy_from_slice(&bytes[32..48]);

		Ok(ComfyHeader {
			major,
			minor: bytes[5],
			creation_date: read_u64(bytes, 16),
			flags: ArchiveFlags::from_bits(read_u64(bytes, 24)),
			iv,
			data_size: read_u64(bytes, 48),
			data_offset: read_u64(bytes, 56),
		})
	}

	/// Serializes the header into its on-disk form
	pub fn to_bytes(&self) -> [u8; ComfyHeader::SIZE] {
		let mut bytes = [0u8; ComfyHeader::SIZE];

		bytes[0..4].copy_from_slice(&crate::COMFY_MAGIC);
		bytes[4] = self.major;
		bytes[5] = self.minor;
		bytes[6..8].copy_from_slice(&ComfyHeader::RESERVED_VERSION.to_le_bytes());
		bytes[8..12].copy_from_slice(&ComfyHeader::CREATOR_ID);
		bytes[12..16].copy_from_slice(&ComfyHeader::RESERVED_ID);
		bytes[16..24].copy_from_slice(&self.creation_date.to_le_bytes());
		bytes[24..32].copy_from_slice(&self.flags.bits().to_le_bytes());
		bytes[32..48].copy_from_slice(&self.iv);
		bytes[48..56].copy_from_slice(&self.data_size.to_le_bytes());
		bytes[56..64].copy_from_slice(&self.data_offset.to_le_bytes());

		bytes
	}
}

#[inline(always)]
fn read_u64(bytes: &[u8], at: usize) -> u64 {
	let mut word = [0u8; 8];
	word.copy_from_slice(&bytes[at..at + 8]);
	u64::from_le_bytes(word)
}

/// type + flags + name pointer + size + data pointer
pub(crate) const FILE_RECORD_SIZE: u64 = 32;
/// type + flags + name pointer + entry count + entries pointer + subdirectory count + subdirectories pointer
pub(crate) const DIRECTORY_RECORD_SIZE: u64 = 48;

/// Deepest directory nesting a Comfy Archive may carry, the root sits at depth 0.
/// Readers treat anything deeper as a cyclic pointer graph, so writers refuse to produce it
pub const MAX_DIRECTORY_DEPTH: usize = 256;
