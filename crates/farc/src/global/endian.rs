/// Reverses the byte order of a [`u16`]
#[inline(always)]
pub const fn byte_swap_u16(value: u16) -> u16 {
	value.swap_bytes()
}

/// Reverses the byte order of a [`u32`]
#[inline(always)]
pub const fn byte_swap_u32(value: u32) -> u32 {
	value.swap_bytes()
}

/// Reverses the byte order of a [`u64`]
#[inline(always)]
pub const fn byte_swap_u64(value: u64) -> u64 {
	value.swap_bytes()
}

/// Byte order of multi-byte integers in a written stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
	/// Least significant byte first, used by the Comfy Archive
	#[default]
	Little,
	/// Most significant byte first, used by every `FArc` header
	Big,
}

impl Endianness {
	/// The byte order of the host
	#[inline(always)]
	pub const fn native() -> Endianness {
		if cfg!(target_endian = "big") {
			Endianness::Big
		} else {
			Endianness::Little
		}
	}

	#[inline(always)]
	fn is_native(self) -> bool {
		self == Endianness::native()
	}

	/// Encodes a [`u16`] in this byte order
	pub fn u16_bytes(self, value: u16) -> [u8; 2] {
		let value = if self.is_native() { value } else { byte_swap_u16(value) };
		value.to_ne_bytes()
	}

	/// Encodes a [`u32`] in this byte order
	pub fn u32_bytes(self, value: u32) -> [u8; 4] {
		let value = if self.is_native() { value } else { byte_swap_u32(value) };
		value.to_ne_bytes()
	}

	/// Encodes a [`u64`] in this byte order
	pub fn u64_bytes(self, value: u64) -> [u8; 8] {
		let value = if self.is_native() { value } else { byte_swap_u64(value) };
		value.to_ne_bytes()
	}

	/// Decodes a [`u32`] stored in this byte order
	pub fn read_u32(self, bytes: [u8; 4]) -> u32 {
		let value = u32::from_ne_bytes(bytes);
		if self.is_native() {
			value
		} else {
			byte_swap_u32(value)
		}
	}
}
