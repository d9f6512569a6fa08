use std::{
	collections::{HashMap, VecDeque},
	fmt, mem,
	io::{Seek, SeekFrom, Write},
};

use crate::global::{endian::Endianness, error::*};

/// Width of every pointer and size field written through a [`StreamWriter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerWidth {
	/// 32-bit offsets, as used by `FArc` archives
	#[default]
	Bits32,
	/// 64-bit offsets, as used by Comfy Archives
	Bits64,
}

impl PointerWidth {
	/// Size of one pointer in bytes
	#[inline(always)]
	pub const fn bytes(self) -> u64 {
		match self {
			PointerWidth::Bits32 => 4,
			PointerWidth::Bits64 => 8,
		}
	}
}

type Resolver<'a, W> = Box<dyn FnOnce(&mut StreamWriter<'a, W>) -> InternalResult + 'a>;

/// A placeholder written during the structural pass, resolved during a flush
pub struct PendingPatch<'a, W> {
	/// Position of the placeholder
	pub location: u64,
	/// Subtracted from the resolved offset, only used by the pointer pool
	pub base: u64,
	resolver: Resolver<'a, W>,
}

impl<'a, W> fmt::Debug for PendingPatch<'a, W> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "PendingPatch {{ location: {:#x}, base: {:#x} }}", self.location, self.base)
	}
}

/// Writes integers in a fixed byte order and pointer width, deferring pointers and late values into three pools:
/// - the pointer pool, where each resolver writes a block and the placeholder receives the block's offset
/// - the delayed pool, where each resolver overwrites its placeholder in place
/// - the string pool, where every distinct string is written once and placeholders receive its offset
///
/// Placeholders are always written as a null pointer of the configured width.
pub struct StreamWriter<'a, W> {
	target: W,
	endianness: Endianness,
	width: PointerWidth,

	pointer_pool: VecDeque<PendingPatch<'a, W>>,
	delayed_pool: Vec<PendingPatch<'a, W>>,
	string_pool: Vec<(u64, Vec<u8>)>,
}

impl<'a, W> fmt::Debug for StreamWriter<'a, W> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("StreamWriter")
			.field("endianness", &self.endianness)
			.field("width", &self.width)
			.field("pointer_pool", &self.pointer_pool.len())
			.field("delayed_pool", &self.delayed_pool.len())
			.field("string_pool", &self.string_pool.len())
			.finish()
	}
}

impl<'a, W: Write + Seek> StreamWriter<'a, W> {
	/// Wraps a seekable target, writing continues from its current position
	pub fn new(target: W, endianness: Endianness, width: PointerWidth) -> StreamWriter<'a, W> {
		StreamWriter {
			target,
			endianness,
			width,
			pointer_pool: VecDeque::new(),
			delayed_pool: Vec::new(),
			string_pool: Vec::new(),
		}
	}

	/// The byte order used by every integer write
	#[inline(always)]
	pub fn endianness(&self) -> Endianness {
		self.endianness
	}

	/// The width used by pointer and size writes
	#[inline(always)]
	pub fn pointer_width(&self) -> PointerWidth {
		self.width
	}

	/// Direct access to the target, for bulk data that needs no byte order handling
	#[inline(always)]
	pub fn inner_mut(&mut self) -> &mut W {
		&mut self.target
	}

	/// Unwraps the target. Anything left in the pools is dropped unresolved
	pub fn into_inner(self) -> W {
		self.target
	}

	/// Current position of the target
	pub fn position(&mut self) -> InternalResult<u64> {
		Ok(self.target.stream_position()?)
	}

	/// Moves to an absolute position
	pub fn seek(&mut self, position: u64) -> InternalResult<u64> {
		Ok(self.target.seek(SeekFrom::Start(position))?)
	}

	/// Moves to the end of everything written so far and returns that length
	pub fn seek_end(&mut self) -> InternalResult<u64> {
		Ok(self.target.seek(SeekFrom::End(0))?)
	}

	/// Writes raw bytes
	#[inline]
	pub fn write_bytes(&mut self, bytes: &[u8]) -> InternalResult {
		Ok(self.target.write_all(bytes)?)
	}

	/// Writes a single byte
	pub fn write_u8(&mut self, value: u8) -> InternalResult {
		self.write_bytes(&[value])
	}

	/// Writes a [`u16`] in the configured byte order
	pub fn write_u16(&mut self, value: u16) -> InternalResult {
		let bytes = self.endianness.u16_bytes(value);
		self.write_bytes(&bytes)
	}

	/// Writes a [`u32`] in the configured byte order
	pub fn write_u32(&mut self, value: u32) -> InternalResult {
		let bytes = self.endianness.u32_bytes(value);
		self.write_bytes(&bytes)
	}

	/// Writes a [`u64`] in the configured byte order
	pub fn write_u64(&mut self, value: u64) -> InternalResult {
		let bytes = self.endianness.u64_bytes(value);
		self.write_bytes(&bytes)
	}

	/// Writes a pointer of the configured width, failing if a 32-bit pointer can't hold `value`
	pub fn write_ptr(&mut self, value: u64) -> InternalResult {
		match self.width {
			PointerWidth::Bits64 => self.write_u64(value),
			PointerWidth::Bits32 => {
				let value = u32::try_from(value).map_err(|_| {
					InternalError::OtherError(format!("Offset {:#x} does not fit in a 32-bit pointer", value).into())
				})?;
				self.write_u32(value)
			},
		}
	}

	/// Sizes share the width of pointers
	#[inline(always)]
	pub fn write_size(&mut self, value: u64) -> InternalResult {
		self.write_ptr(value)
	}

	/// Writes `string` followed by a NUL terminator
	pub fn write_str(&mut self, string: &[u8]) -> InternalResult {
		self.write_bytes(string)?;
		self.write_u8(0)
	}

	/// Pads with [`PADDING_VALUE`](crate::PADDING_VALUE) up to the next multiple of `alignment`
	pub fn write_alignment_padding(&mut self, alignment: u64) -> InternalResult {
		if alignment <= 1 {
			return Ok(());
		}

		let position = self.position()?;
		let padding = (alignment - position % alignment) % alignment;

		self.write_bytes(&vec![crate::PADDING_VALUE; padding as usize])
	}

	/// Writes a placeholder, resolved by [`flush_string_pool`](StreamWriter::flush_string_pool) to the offset of `string`
	pub fn write_str_ptr(&mut self, string: impl Into<Vec<u8>>) -> InternalResult {
		let location = self.position()?;
		self.string_pool.push((location, string.into()));
		self.write_ptr(0)
	}

	/// Writes a placeholder, resolved by [`flush_pointer_pool`](StreamWriter::flush_pointer_pool).
	/// The placeholder receives `offset - base`, where `offset` is the position `resolver` starts writing at.
	pub fn write_func_ptr<F>(&mut self, base: u64, resolver: F) -> InternalResult
	where
		F: FnOnce(&mut StreamWriter<'a, W>) -> InternalResult + 'a,
	{
		let location = self.position()?;
		self.pointer_pool.push_back(PendingPatch {
			location,
			base,
			resolver: Box::new(resolver),
		});

		self.write_ptr(0)
	}

	/// Writes a placeholder, [`flush_delayed_pool`](StreamWriter::flush_delayed_pool) later seeks back and lets `resolver` overwrite it
	pub fn write_delayed<F>(&mut self, resolver: F) -> InternalResult
	where
		F: FnOnce(&mut StreamWriter<'a, W>) -> InternalResult + 'a,
	{
		let location = self.position()?;
		self.delayed_pool.push(PendingPatch {
			location,
			base: 0,
			resolver: Box::new(resolver),
		});

		self.write_ptr(0)
	}

	/// Resolves pointer placeholders in FIFO order. Resolvers may queue further pointers, which are resolved in the same flush
	pub fn flush_pointer_pool(&mut self) -> InternalResult {
		while let Some(patch) = self.pointer_pool.pop_front() {
			let offset = self.position()?;

			let relative = offset.checked_sub(patch.base).ok_or_else(|| {
				InternalError::OtherError(format!("Pointer base {:#x} lies past its target {:#x}", patch.base, offset).into())
			})?;

			self.seek(patch.location)?;
			self.write_ptr(relative)?;

			self.seek(offset)?;
			(patch.resolver)(self)?;
		}

		Ok(())
	}

	/// Lets every delayed resolver overwrite its placeholder, the position is restored after each
	pub fn flush_delayed_pool(&mut self) -> InternalResult {
		for patch in mem::take(&mut self.delayed_pool) {
			let offset = self.position()?;

			self.seek(patch.location)?;
			(patch.resolver)(self)?;

			self.seek(offset)?;
		}

		Ok(())
	}

	/// Writes every pooled string at the current position, identical strings are only written once
	pub fn flush_string_pool(&mut self) -> InternalResult {
		let mut written: HashMap<Vec<u8>, u64> = HashMap::new();

		for (location, string) in mem::take(&mut self.string_pool) {
			let offset = self.position()?;
			let existing = written.get(&string).copied();

			self.seek(location)?;
			self.write_ptr(existing.unwrap_or(offset))?;
			self.seek(offset)?;

			if existing.is_none() {
				self.write_str(&string)?;
				written.insert(string, offset);
			}
		}

		Ok(())
	}
}
