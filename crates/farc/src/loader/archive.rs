use std::{
	fmt,
	fs::File,
	io::{BufReader, Read, Seek, SeekFrom},
	path::Path,
	sync::{Mutex, PoisonError},
};

use super::{config::ArchiveConfig, resource::Resource};
use crate::{
	crypto::{Encryptor, BLOCK_SIZE},
	crypto_utils::{align_up, padded_size},
	global::{error::*, flags::Flags, header::Header, reg_entry::RegistryEntry},
};

#[cfg(feature = "compression")]
use crate::global::compressor::Compressor;

/// Parses an `FArc`, `FArC`, `FARc` or `FARC` archive from a read handle.
/// > Wraps handle in a [`Mutex`] internally for shared access, use [`fetch_mut`](Archive::fetch_mut) for lock-free access.
#[derive(Debug)]
pub struct Archive<T> {
	/// Locked for the span of a single entry read, everything else is shared lock-free
	handle: Mutex<T>,
	length: u64,

	// Registry Data
	header: Header,
	entries: Vec<RegistryEntry>,
	config: ArchiveConfig,

	decryptor: Option<Encryptor>,
}

impl<T> fmt::Display for Archive<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let (stored, original) = self
			.entries
			.iter()
			.fold((0u64, 0u64), |(s, o), entry| (s + entry.compressed_size, o + entry.original_size));

		write!(
			f,
			"[Archive Header] Signature: {}, Flags: {}, Alignment: {}, Encryption: {:?}, Members: {}, Stored Size: {stored}B, Original Size: {original}B",
			self.header.signature,
			self.header.flags,
			self.header.alignment,
			self.header.encryption_format,
			self.entries.len(),
		)
	}
}

impl<T> Archive<T> {
	/// Consume the [Archive] and return the underlying handle
	pub fn into_inner(self) -> T {
		self.handle.into_inner().unwrap_or_else(PoisonError::into_inner)
	}

	/// Finds the first entry whose name matches `id` under the configured [`NameComparison`](crate::archive::NameComparison).
	/// A miss is not an error, use [`fetch`](Archive::fetch) to surface one.
	pub fn find_entry(&self, id: impl AsRef<str>) -> Option<&RegistryEntry> {
		let id = id.as_ref();
		self.entries.iter().find(|entry| self.config.name_comparison.matches(&entry.id, id))
	}

	/// Fetch a cloned [`RegistryEntry`] from this [`Archive`].
	pub fn fetch_entry(&self, id: impl AsRef<str>) -> Option<RegistryEntry> {
		self.find_entry(id).cloned()
	}

	/// All entries in on-disk order
	#[inline(always)]
	pub fn entries(&self) -> &[RegistryEntry] {
		&self.entries
	}

	/// Global metadata parsed from the header
	#[inline(always)]
	pub fn header(&self) -> &Header {
		&self.header
	}

	/// Global flags extracted from the `Header` section of the source
	#[inline(always)]
	pub fn flags(&self) -> &Flags {
		&self.header.flags
	}

	/// Total length of the source in bytes
	#[inline(always)]
	pub fn len(&self) -> u64 {
		self.length
	}

	/// Whether the archive holds no entries
	#[inline(always)]
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// The configuration the archive was parsed with
	#[inline(always)]
	pub fn config(&self) -> &ArchiveConfig {
		&self.config
	}
}

impl Archive<BufReader<File>> {
	/// Opens and parses the archive at `path`.
	/// Any failure, be it a missing file or a malformed header, is logged and collapses to `None`.
	pub fn open(path: impl AsRef<Path>) -> Option<Archive<BufReader<File>>> {
		let path = path.as_ref();

		let file = match File::open(path) {
			Ok(file) => file,
			Err(err) => {
				log::error!("Unable to open archive {}: {}", path.display(), err);
				return None;
			},
		};

		match Archive::new(BufReader::new(file)) {
			Ok(archive) => Some(archive),
			Err(err) => {
				log::error!("Unable to parse archive {}: {}", path.display(), err);
				None
			},
		}
	}
}

impl<T> Archive<T>
where
	T: Read + Seek,
{
	/// Parses an [`Archive`] from the given source with the default [`ArchiveConfig`]
	pub fn new(handle: T) -> InternalResult<Archive<T>> {
		Archive::with_config(handle, ArchiveConfig::default())
	}

	/// Parses an [`Archive`] from the given source
	pub fn with_config(mut handle: T, config: ArchiveConfig) -> InternalResult<Archive<T>> {
		let length = handle.seek(SeekFrom::End(0))?;
		handle.seek(SeekFrom::Start(0))?;

		let (header, table) = Header::from_handle(&mut handle, length)?;
		let entries = RegistryEntry::parse_table(table, header.signature, header.is_modern, length)?;
		let decryptor = Encryptor::new(header.encryption_format, header.iv);

		log::debug!(
			"Parsed {} header: flags {:?}, alignment {}, modern {}, encryption {:?}, {} entries",
			header.signature,
			header.flags,
			header.alignment,
			header.is_modern,
			header.encryption_format,
			entries.len()
		);

		Ok(Archive {
			handle: Mutex::new(handle),
			length,
			header,
			entries,
			config,
			decryptor,
		})
	}

	/// Decodes the content of `entry` into `output`, which must be exactly `entry.original_size` bytes long.
	/// Locks the underlying [`Mutex`] while the raw bytes are read.
	pub fn read_entry_into(&self, entry: &RegistryEntry, output: &mut [u8]) -> InternalResult {
		let mut guard = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
		self.decode(&mut *guard, entry, output)
	}

	/// Fetch a [`Resource`] with the given `ID`.
	/// > Locks the underlying [`Mutex`], for a cheaper non-locking operation refer to `Archive::fetch_mut`
	pub fn fetch(&self, id: impl AsRef<str>) -> InternalResult<Resource> {
		let entry = self
			.find_entry(&id)
			.ok_or_else(|| InternalError::MissingResourceError(id.as_ref().to_string()))?;

		let mut data = vec![0u8; entry.original_size as usize];
		self.read_entry_into(entry, &mut data)?;

		Ok(Resource {
			id: entry.id.clone(),
			data: data.into_boxed_slice(),
			flags: self.header.flags,
		})
	}

	/// Cheaper alternative to [`fetch`](Archive::fetch) that doesn't lock the underlying [Mutex]
	pub fn fetch_mut(&mut self, id: impl AsRef<str>) -> InternalResult<Resource> {
		let entry = self
			.find_entry(&id)
			.cloned()
			.ok_or_else(|| InternalError::MissingResourceError(id.as_ref().to_string()))?;

		let mut data = vec![0u8; entry.original_size as usize];
		let handle = self.handle.get_mut().unwrap_or_else(PoisonError::into_inner);

		Archive::decode_with(&self.header, self.decryptor.as_ref(), self.length, handle, &entry, &mut data)?;

		Ok(Resource {
			id: entry.id,
			data: data.into_boxed_slice(),
			flags: self.header.flags,
		})
	}

	#[inline(always)]
	fn decode(&self, handle: &mut T, entry: &RegistryEntry, output: &mut [u8]) -> InternalResult {
		Archive::decode_with(&self.header, self.decryptor.as_ref(), self.length, handle, entry, output)
	}

	fn decode_with(
		header: &Header, decryptor: Option<&Encryptor>, length: u64, handle: &mut T, entry: &RegistryEntry, output: &mut [u8],
	) -> InternalResult {
		if output.len() as u64 != entry.original_size {
			return Err(InternalError::BufferSizeMismatch {
				expected: entry.original_size,
				found: output.len(),
			});
		}

		let data_offset = header.data_offset();
		let compressed = header.flags.contains(Flags::COMPRESSED_FLAG);
		let encrypted = header.flags.contains(Flags::ENCRYPTED_FLAG);

		handle.seek(SeekFrom::Start(entry.offset))?;

		match (compressed, encrypted) {
			(false, false) => read_exact(handle, output, entry),
			(true, _) => {
				let alignment = match header.alignment {
					a if a.is_power_of_two() => a as u64,
					_ => BLOCK_SIZE as u64,
				};

				// The block is over-read, the decoder stops at the end of the gzip member
				let size = (align_up(entry.compressed_size, alignment) + 16).min(length - entry.offset);
				let mut block = vec![0u8; size as usize];
				read_exact(handle, &mut block, entry)?;

				if encrypted {
					block.truncate(block.len() - block.len() % BLOCK_SIZE);
					decrypt(decryptor, &mut block)?;
				}

				let start = data_offset.min(block.len());
				inflate(&block[start..], output)
			},
			(false, true) => {
				let padded = padded_size(output.len()) + data_offset;

				if padded == output.len() {
					read_exact(handle, output, entry)?;
					return decrypt(decryptor, output);
				}

				let mut block = vec![0u8; padded];
				read_exact(handle, &mut block, entry)?;
				decrypt(decryptor, &mut block)?;

				output.copy_from_slice(&block[data_offset..data_offset + output.len()]);
				Ok(())
			},
		}
	}
}

fn read_exact<R: Read>(handle: &mut R, buffer: &mut [u8], entry: &RegistryEntry) -> InternalResult {
	handle
		.read_exact(buffer)
		.map_err(|err| InternalError::truncated(err, &format!("the data of entry {}", entry.id)))
}

fn decrypt(decryptor: Option<&Encryptor>, data: &mut [u8]) -> InternalResult {
	match decryptor {
		Some(decryptor) => decryptor.decrypt(data),
		None => Err(InternalError::CryptoError(
			"Archive is flagged as encrypted but carries no usable encryption format".to_string(),
		)),
	}
}

#[cfg(feature = "compression")]
fn inflate(source: &[u8], output: &mut [u8]) -> InternalResult {
	Compressor::new(source).decompress(output)
}

#[cfg(not(feature = "compression"))]
fn inflate(_source: &[u8], _output: &mut [u8]) -> InternalResult {
	Err(InternalError::MissingFeatureError("compression"))
}
