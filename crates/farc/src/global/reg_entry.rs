use std::{fmt, sync::Arc};

#[cfg(feature = "archive")]
use std::io::{BufRead, Cursor};

#[cfg(feature = "archive")]
use byteorder::{BigEndian, ReadBytesExt};

#[cfg(feature = "archive")]
use super::{
	error::*,
	header::{EntryTable, Signature},
};

/// Stand-alone meta-data for an archive entry. This can be fetched without reading from the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
	/// Name of the entry, unique within an archive by convention only
	pub id: Arc<str>,
	/// Location of the entry's data, as an offset of bytes from the beginning of the source
	pub offset: u64,
	/// Number of bytes the entry occupies in the source
	pub compressed_size: u64,
	/// Number of bytes the entry decodes to, equal to `compressed_size` for plain entries
	pub original_size: u64,
}

impl RegistryEntry {
	#[inline(always)]
	pub(crate) fn empty() -> RegistryEntry {
		RegistryEntry {
			id: Arc::from("None"),
			offset: 0,
			compressed_size: 0,
			original_size: 0,
		}
	}

	/// Parses one entry from the table cursor, advancing it past the entry's trailing fields
	#[cfg(feature = "archive")]
	pub(crate) fn from_handle(
		table: &mut Cursor<Vec<u8>>, signature: Signature, is_modern: bool, length: u64,
	) -> InternalResult<RegistryEntry> {
		let mut name = Vec::new();
		table
			.read_until(0, &mut name)
			.map_err(|err| InternalError::truncated(err, "an entry name"))?;

		if name.last() == Some(&0) {
			name.pop();
		} else {
			return Err(InternalError::TruncatedArchive(
				"Entry table ended inside an unterminated entry name".to_string(),
			));
		}

		if name.is_empty() {
			return Err(InternalError::CorruptArchive(format!(
				"Empty entry name at table position {}, the header is corrupt or misaligned",
				table.position() - 1
			)));
		}

		let id: Arc<str> = Arc::from(String::from_utf8_lossy(&name).as_ref());
		let context = "the fields of an entry";

		let offset = table.read_u32::<BigEndian>().map_err(|e| InternalError::truncated(e, context))? as u64;
		let compressed_size = table.read_u32::<BigEndian>().map_err(|e| InternalError::truncated(e, context))? as u64;

		let original_size = match signature {
			Signature::UnCompressed => compressed_size,
			Signature::Compressed | Signature::Extended | Signature::Reserved => {
				table.read_u32::<BigEndian>().map_err(|e| InternalError::truncated(e, context))? as u64
			},
		};

		if is_modern {
			let _reserved = table.read_u32::<BigEndian>().map_err(|e| InternalError::truncated(e, context))?;
		}

		let end = offset + compressed_size;
		if end > length {
			return Err(InternalError::EntryOutOfBounds {
				id: id.to_string(),
				end,
				length,
			});
		}

		Ok(RegistryEntry {
			id,
			offset,
			compressed_size,
			original_size,
		})
	}

	/// Walks a whole entry table, either until its bytes run out or until the announced count is reached
	#[cfg(feature = "archive")]
	pub(crate) fn parse_table(
		table: EntryTable, signature: Signature, is_modern: bool, length: u64,
	) -> InternalResult<Vec<RegistryEntry>> {
		match table {
			EntryTable::ByRange(mut table) => {
				let mut entries = Vec::new();
				let end = table.get_ref().len() as u64;

				while table.position() < end {
					entries.push(RegistryEntry::from_handle(&mut table, signature, is_modern, length)?);
				}

				Ok(entries)
			},
			EntryTable::ByCount { mut table, count } => {
				let mut entries = Vec::with_capacity(count.min(0x10000) as usize);
				let end = table.get_ref().len() as u64;

				for index in 0..count {
					if table.position() >= end {
						return Err(InternalError::CorruptArchive(format!(
							"Header announces {} entries but its table ends after {}",
							count, index
						)));
					}

					entries.push(RegistryEntry::from_handle(&mut table, signature, is_modern, length)?);
				}

				Ok(entries)
			},
		}
	}
}

impl Default for RegistryEntry {
	#[inline(always)]
	fn default() -> RegistryEntry {
		RegistryEntry::empty()
	}
}

impl fmt::Display for RegistryEntry {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(
			f,
			"[RegistryEntry] id: {}, offset: {}, compressed_size: {}, original_size: {}",
			self.id, self.offset, self.compressed_size, self.original_size
		)
	}
}
