use std::fmt;
#[cfg(feature = "archive")]
use std::io::{Cursor, Read, Seek, SeekFrom};

#[cfg(feature = "archive")]
use byteorder::{BigEndian, ReadBytesExt};

#[cfg(feature = "archive")]
use super::error::*;
use super::flags::Flags;
use crate::crypto::{self, IV_SIZE};

/// Any alignment value at or above this is implausible, see [`has_encrypted_entries`]
pub const REASONABLE_ALIGNMENT_THRESHOLD: u32 = 0x1000;

/// The four byte magic at the start of every `FArc` family archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
	/// `FArc`, flat header with uncompressed data
	UnCompressed,
	/// `FArC`, flat header with gzip compressed data
	Compressed,
	/// `FARC`, header with an explicit flags word, optionally modern and encrypted
	Extended,
	/// `FARc`, reserved, read with the flat layout
	Reserved,
}

impl Signature {
	/// The raw magic bytes of this signature
	pub const fn magic(self) -> [u8; 4] {
		match self {
			Signature::UnCompressed => *b"FArc",
			Signature::Compressed => *b"FArC",
			Signature::Extended => *b"FARC",
			Signature::Reserved => *b"FARc",
		}
	}

	/// Identify a signature from its raw magic bytes
	pub fn from_magic(magic: [u8; 4]) -> Option<Signature> {
		match &magic {
			b"FArc" => Some(Signature::UnCompressed),
			b"FArC" => Some(Signature::Compressed),
			b"FARC" => Some(Signature::Extended),
			b"FARc" => Some(Signature::Reserved),
			_ => None,
		}
	}
}

impl fmt::Display for Signature {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let magic = self.magic();
		write!(f, "{}", String::from_utf8_lossy(&magic))
	}
}

/// Which AES scheme protects the entry data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncryptionFormat {
	/// Plain data
	#[default]
	None,
	/// AES-128-ECB with [`CLASSIC_KEY`](crate::crypto::CLASSIC_KEY)
	Classic,
	/// AES-128-CBC with [`MODERN_KEY`](crate::crypto::MODERN_KEY) and the IV stored in the header
	Modern,
}

/// Decides whether the eight bytes following an `FARC` flags word are `alignment + padding` or the start of an AES IV.
///
/// The entry table is encrypted when the archive is encrypted, the second probed word is non-zero (modern layout)
/// and the first probed word is too large to be an alignment. Writers of the format rely on this exact rule.
#[inline]
pub fn has_encrypted_entries(flags: Flags, is_modern: bool, probed_alignment: u32) -> bool {
	flags.contains(Flags::ENCRYPTED_FLAG) && is_modern && probed_alignment >= REASONABLE_ALIGNMENT_THRESHOLD
}

/// Global metadata of an opened archive
#[derive(Debug, Clone)]
pub struct Header {
	/// Which of the four magic values opened the source
	pub signature: Signature,
	/// Archive-wide flags, synthesized from the signature for the flat layouts
	pub flags: Flags,
	/// Data alignment boundary, typically 16
	pub alignment: u32,
	/// Entries carry a trailing reserved word and the table is parsed by count
	pub is_modern: bool,
	/// The AES scheme protecting entry data
	pub encryption_format: EncryptionFormat,
	/// CBC initialization vector, only meaningful with [`EncryptionFormat::Modern`]
	pub iv: [u8; IV_SIZE],
}

impl Default for Header {
	#[inline(always)]
	fn default() -> Header {
		Header {
			signature: Signature::UnCompressed,
			flags: Flags::default(),
			alignment: 0,
			is_modern: false,
			encryption_format: EncryptionFormat::None,
			iv: crypto::DUMMY_IV,
		}
	}
}

/// The raw entry table carved out of the header, and how it must be walked
#[cfg(feature = "archive")]
#[derive(Debug)]
pub(crate) enum EntryTable {
	/// Parse entries until the bytes run out
	ByRange(Cursor<Vec<u8>>),
	/// Parse exactly `count` entries
	ByCount { table: Cursor<Vec<u8>>, count: u32 },
}

impl Header {
	/// Length of the magic and header size words that open every header
	pub const BASE_SIZE: u64 = 8;

	/// `FArc` headers with a size this small hold no entries at all
	pub const EMPTY_HEADER_SIZE: u32 = 4;

	/// Bytes skipped at the start of every decrypted entry in the modern scheme
	#[inline(always)]
	pub fn data_offset(&self) -> usize {
		match self.encryption_format {
			EncryptionFormat::Modern => 16,
			EncryptionFormat::None | EncryptionFormat::Classic => 0,
		}
	}
}

#[cfg(feature = "archive")]
impl Header {
	/// Reads and classifies the header of the given source, returning the metadata and the raw entry table.
	/// The handle is expected to be positioned at the start of the archive.
	pub(crate) fn from_handle<T: Read + Seek>(handle: &mut T, length: u64) -> InternalResult<(Header, EntryTable)> {
		if length <= Header::BASE_SIZE {
			return Err(InternalError::TruncatedArchive(format!(
				"A source of {} bytes can't hold an archive header",
				length
			)));
		}

		let mut magic = [0u8; 4];
		handle.read_exact(&mut magic)?;
		let header_size = handle.read_u32::<BigEndian>()?;

		// Empty but valid
		if &magic == b"FArc" && header_size <= Header::EMPTY_HEADER_SIZE {
			let empty = EntryTable::ByRange(Cursor::new(Vec::new()));
			return Ok((Header::default(), empty));
		}

		let signature = Signature::from_magic(magic).ok_or(InternalError::UnrecognizedFormat(magic))?;

		if length <= Header::BASE_SIZE + header_size as u64 {
			return Err(InternalError::TruncatedArchive(format!(
				"Header claims {} bytes, the source is only {} bytes long",
				header_size, length
			)));
		}

		match signature {
			Signature::UnCompressed | Signature::Compressed | Signature::Reserved => {
				Header::parse_flat(handle, signature, header_size)
			},
			Signature::Extended => Header::parse_extended(handle, header_size),
		}
	}

	fn parse_flat<T: Read>(handle: &mut T, signature: Signature, header_size: u32) -> InternalResult<(Header, EntryTable)> {
		let alignment = handle.read_u32::<BigEndian>()?;

		let mut flags = Flags::new();
		if signature == Signature::Compressed {
			flags.force_set(Flags::COMPRESSED_FLAG, true);
		}

		let table = read_region(handle, checked_table_size(header_size, 4)?, "the entry table")?;
		let header = Header {
			signature,
			flags,
			alignment,
			..Header::default()
		};

		Ok((header, EntryTable::ByRange(Cursor::new(table))))
	}

	fn parse_extended<T: Read + Seek>(handle: &mut T, header_size: u32) -> InternalResult<(Header, EntryTable)> {
		let flags = Flags::from_bits(handle.read_u32::<BigEndian>()?);
		let _reserved = handle.read_u32::<BigEndian>()?;

		// Either `alignment + padding` or the first half of the AES IV
		let mut alignment = handle.read_u32::<BigEndian>()?;
		let is_modern = handle.read_u32::<BigEndian>()? != 0;

		let encrypted_entries = has_encrypted_entries(flags, is_modern, alignment);
		let encryption_format = match (flags.contains(Flags::ENCRYPTED_FLAG), encrypted_entries) {
			(false, _) => EncryptionFormat::None,
			(true, false) => EncryptionFormat::Classic,
			(true, true) => EncryptionFormat::Modern,
		};

		let mut header = Header {
			signature: Signature::Extended,
			flags,
			alignment,
			is_modern,
			encryption_format,
			iv: crypto::DUMMY_IV,
		};

		if encrypted_entries {
			handle.seek(SeekFrom::Start(16))?;
			handle.read_exact(&mut header.iv)?;

			let mut table = read_region(
				handle,
				crate::crypto_utils::padded_size(header_size as usize),
				"the encrypted entry table",
			)?;

			let decryptor = crypto::Encryptor::new(encryption_format, header.iv)
				.ok_or_else(|| InternalError::CorruptArchive("Encrypted entry table without a cipher".to_string()))?;
			decryptor.decrypt(&mut table)?;

			table.truncate(header_size as usize);
			let mut table = Cursor::new(table);

			header.alignment = read_word(&mut table, "the decrypted table prelude")?;
			let _reserved = read_word(&mut table, "the decrypted table prelude")?;
			let count = read_word(&mut table, "the decrypted table prelude")?;
			let _reserved = read_word(&mut table, "the decrypted table prelude")?;

			return Ok((header, EntryTable::ByCount { table, count }));
		}

		handle.seek(SeekFrom::Start(20))?;
		let mut table = Cursor::new(read_region(handle, checked_table_size(header_size, 12)?, "the entry table")?);

		if is_modern {
			let _reserved = read_word(&mut table, "the table prelude")?;
			let count = read_word(&mut table, "the table prelude")?;
			alignment = read_word(&mut table, "the table prelude")?;

			header.alignment = alignment;
			Ok((header, EntryTable::ByCount { table, count }))
		} else {
			table.set_position(8);
			Ok((header, EntryTable::ByRange(table)))
		}
	}
}

#[cfg(feature = "archive")]
fn read_word(table: &mut Cursor<Vec<u8>>, context: &str) -> InternalResult<u32> {
	table
		.read_u32::<BigEndian>()
		.map_err(|err| InternalError::truncated(err, context))
}

#[cfg(feature = "archive")]
fn checked_table_size(header_size: u32, consumed: u32) -> InternalResult<usize> {
	header_size.checked_sub(consumed).map(|size| size as usize).ok_or_else(|| {
		InternalError::CorruptArchive(format!(
			"Header size of {} bytes is too small to hold the {} byte header prelude",
			header_size, consumed
		))
	})
}

#[cfg(feature = "archive")]
fn read_region<T: Read>(handle: &mut T, size: usize, context: &str) -> InternalResult<Vec<u8>> {
	let mut buffer = vec![0u8; size];
	handle
		.read_exact(&mut buffer)
		.map_err(|err| InternalError::truncated(err, context))?;

	Ok(buffer)
}
