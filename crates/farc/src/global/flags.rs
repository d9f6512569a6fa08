use std::fmt;
use super::error::*;

/// Abstracted access to the archive-wide flags word of an `FARC` header.
/// Basically just a tiny, [`bitflags`](https://github.com/bitflags/bitflags)
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Flags {
	pub(crate) bits: u32,
}

impl Flags {
	/// Reserved bit, never set by this crate
	pub const RESERVED_FLAG: u32 = 1 << 0;
	/// The size in bytes of any flags word
	pub const BYTES: usize = 4;

	/// Entry data is gzip compressed
	pub const COMPRESSED_FLAG: u32 = 1 << 1;
	/// Entry data is AES encrypted, see [`EncryptionFormat`](crate::global::header::EncryptionFormat)
	pub const ENCRYPTED_FLAG: u32 = 1 << 2;

	/// Construct a `Flags` struct from a `u32` number
	#[inline(always)]
	pub fn from_bits(bits: u32) -> Self {
		Flags { bits }
	}

	/// Returns a copy of the underlying number.
	#[inline(always)]
	pub fn bits(&self) -> u32 {
		self.bits
	}

	/// Create a new empty instance
	#[inline(always)]
	pub fn new() -> Self {
		Flags { bits: 0 }
	}

	/// Set a bit into the underlying [`u32`], will fail if the reserved bit is part of the mask.
	/// The `toggle` parameter specifies whether to insert the flags (when true), or to pop the flag, (when false).
	pub fn set(&mut self, bit: u32, toggle: bool) -> InternalResult<u32> {
		if (Flags::RESERVED_FLAG & bit) != 0 {
			return Err(InternalError::RestrictedFlagAccessError);
		} else {
			self.force_set(bit, toggle)
		}

		Ok(self.bits)
	}

	pub(crate) fn force_set(&mut self, mask: u32, toggle: bool) {
		if toggle {
			self.bits |= mask;
		} else {
			self.bits &= !mask;
		}
	}

	#[inline(always)]
	/// Checks whether the given flag is set.
	pub fn contains(&self, bit: u32) -> bool {
		(self.bits & bit) != 0
	}
}

#[rustfmt::skip]
impl fmt::Display for Flags {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let compressed = if self.contains(Flags::COMPRESSED_FLAG) { 'C' } else { '-' };
		let encrypted = if self.contains(Flags::ENCRYPTED_FLAG) { 'E' } else { '-' };
		let reserved = if self.contains(Flags::RESERVED_FLAG) { 'R' } else { '-' };

		write!(f, "Flags[{}{}{}]", compressed, encrypted, reserved)
	}
}

#[rustfmt::skip]
impl fmt::Debug for Flags {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let compressed = if self.contains(Flags::COMPRESSED_FLAG) { 'C' } else { '-' };
		let encrypted = if self.contains(Flags::ENCRYPTED_FLAG) { 'E' } else { '-' };
		let reserved = if self.contains(Flags::RESERVED_FLAG) { 'R' } else { '-' };

		write!(
			f,
			"Flags[{}{}{}]: <{}u32 : {:#010b}>",
			compressed, encrypted, reserved, self.bits, self.bits
		)
	}
}
