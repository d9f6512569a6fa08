use std::{
	fmt,
	fs::File,
	io::{BufReader, Read, Seek, SeekFrom},
	path::Path,
	sync::{Arc, Mutex, PoisonError},
};

use byteorder::{ByteOrder, LittleEndian};

use super::{config::ArchiveConfig, resource::Resource};
use crate::{
	crypto_utils::xor_obfuscate,
	global::{
		comfy::{ArchiveFlags, ComfyHeader, EntryFlags, EntryType, DIRECTORY_RECORD_SIZE, FILE_RECORD_SIZE, MAX_DIRECTORY_DEPTH},
		error::*,
		flags::Flags,
	},
};

/// Separator between nested directory names in lookup paths
pub const DIRECTORY_SEPARATOR: char = '/';

/// A file record of a mounted [`ComfyArchive`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComfyFile {
	/// Decoded file name, without any directory component
	pub name: Arc<str>,
	/// Record flags
	pub flags: EntryFlags,
	/// Size of the file data in bytes
	pub size: u64,
	/// Absolute offset of the file data in the source
	pub offset: u64,
}

/// A directory record of a mounted [`ComfyArchive`], the top level one carries [`EntryType::Root`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComfyDirectory {
	/// Either [`EntryType::Root`] or [`EntryType::Directory`]
	pub kind: EntryType,
	/// Decoded directory name
	pub name: Arc<str>,
	/// Record flags
	pub flags: EntryFlags,
	/// Files directly inside this directory, in on-disk order
	pub files: Vec<ComfyFile>,
	/// Subdirectories, in on-disk order
	pub directories: Vec<ComfyDirectory>,
}

impl ComfyDirectory {
	/// Looks up a file directly inside this directory
	pub fn file(&self, name: &str, config: &ArchiveConfig) -> Option<&ComfyFile> {
		self.files.iter().find(|file| config.name_comparison.matches(&file.name, name))
	}

	/// Looks up a subdirectory directly inside this directory
	pub fn directory(&self, name: &str, config: &ArchiveConfig) -> Option<&ComfyDirectory> {
		self.directories
			.iter()
			.find(|directory| config.name_comparison.matches(&directory.name, name))
	}

	fn collect_files<'a>(&'a self, prefix: &str, output: &mut Vec<(String, &'a ComfyFile)>) {
		for file in &self.files {
			output.push((format!("{}{}", prefix, file.name), file));
		}

		for directory in &self.directories {
			let prefix = format!("{}{}{}", prefix, directory.name, DIRECTORY_SEPARATOR);
			directory.collect_files(&prefix, output);
		}
	}
}

/// A mounted 64-bit Comfy Archive: the record tree is decoded once, file data is read on demand.
/// > Wraps handle in a [`Mutex`] internally for shared access, use [`fetch_mut`](ComfyArchive::fetch_mut) for lock-free access.
#[derive(Debug)]
pub struct ComfyArchive<T> {
	handle: Mutex<T>,
	length: u64,

	header: ComfyHeader,
	root: ComfyDirectory,
	config: ArchiveConfig,
}

impl<T> fmt::Display for ComfyArchive<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let files = self.files();
		let bytes: u64 = files.iter().map(|(_, file)| file.size).sum();

		write!(
			f,
			"[ComfyArchive Header] Version: {}.{}, Root: {}, Files: {}, Data Size: {bytes}B, Flags: {:?}",
			self.header.major,
			self.header.minor,
			self.root.name,
			files.len(),
			self.header.flags,
		)
	}
}

impl<T> ComfyArchive<T> {
	/// The parsed 64 byte header
	#[inline(always)]
	pub fn header(&self) -> &ComfyHeader {
		&self.header
	}

	/// The top level directory record
	#[inline(always)]
	pub fn root(&self) -> &ComfyDirectory {
		&self.root
	}

	/// Total length of the source in bytes
	#[inline(always)]
	pub fn len(&self) -> u64 {
		self.length
	}

	/// Whether the archive holds no files at all
	pub fn is_empty(&self) -> bool {
		self.files().is_empty()
	}

	/// Consume the [ComfyArchive] and return the underlying handle
	pub fn into_inner(self) -> T {
		self.handle.into_inner().unwrap_or_else(PoisonError::into_inner)
	}

	/// Finds a file by its `/` separated path. A path without separator is looked up in the root directory.
	pub fn find_file(&self, path: &str) -> Option<&ComfyFile> {
		if path.is_empty() {
			return None;
		}

		match path.rsplit_once(DIRECTORY_SEPARATOR) {
			None => self.root.file(path, &self.config),
			Some((directory, name)) => self.find_directory(directory)?.file(name, &self.config),
		}
	}

	/// Finds a nested directory by its `/` separated path
	pub fn find_directory(&self, path: &str) -> Option<&ComfyDirectory> {
		path.split(DIRECTORY_SEPARATOR)
			.try_fold(&self.root, |parent, segment| parent.directory(segment, &self.config))
	}

	/// Every file in the archive along with its full `/` joined path, depth first
	pub fn files(&self) -> Vec<(String, &ComfyFile)> {
		let mut files = Vec::new();
		self.root.collect_files("", &mut files);
		files
	}
}

impl ComfyArchive<BufReader<File>> {
	/// Mounts the archive at `path`, any failure is logged and collapses to `None`
	pub fn mount(path: impl AsRef<Path>) -> Option<ComfyArchive<BufReader<File>>> {
		let path = path.as_ref();

		let file = match File::open(path) {
			Ok(file) => file,
			Err(err) => {
				log::error!("Unable to open comfy archive {}: {}", path.display(), err);
				return None;
			},
		};

		match ComfyArchive::new(BufReader::new(file)) {
			Ok(archive) => Some(archive),
			Err(err) => {
				log::error!("Unable to mount comfy archive {}: {}", path.display(), err);
				None
			},
		}
	}
}

impl<T> ComfyArchive<T>
where
	T: Read + Seek,
{
	/// Parses a [`ComfyArchive`] with the default [`ArchiveConfig`]
	pub fn new(handle: T) -> InternalResult<ComfyArchive<T>> {
		ComfyArchive::with_config(handle, ArchiveConfig::default())
	}

	/// Reads the header and decodes the whole record tree
	pub fn with_config(mut handle: T, config: ArchiveConfig) -> InternalResult<ComfyArchive<T>> {
		let length = handle.seek(SeekFrom::End(0))?;
		handle.seek(SeekFrom::Start(0))?;

		let mut bytes = [0u8; ComfyHeader::SIZE];
		handle
			.read_exact(&mut bytes)
			.map_err(|err| InternalError::truncated(err, "the comfy archive header"))?;

		let header = ComfyHeader::from_bytes(&bytes)?;

		let region_end = header
			.data_offset
			.checked_add(header.data_size)
			.filter(|end| header.data_offset >= ComfyHeader::SIZE as u64 && *end <= length)
			.ok_or_else(|| {
				InternalError::TruncatedArchive(format!(
					"Record region [{}; {}) lies outside the {} byte source",
					header.data_offset, header.data_size, length
				))
			})?;

		let mut data = vec![0u8; (region_end - header.data_offset) as usize];
		handle.seek(SeekFrom::Start(header.data_offset))?;
		handle
			.read_exact(&mut data)
			.map_err(|err| InternalError::truncated(err, "the comfy record region"))?;

		let region = Region {
			data: &data,
			base: header.data_offset,
			length,
			encrypted_strings: header.flags.contains(ArchiveFlags::ENCRYPTED_STRINGS),
		};

		let root = region.directory(header.data_offset, EntryType::Root, 0)?;
		log::debug!(
			"Mounted comfy archive v{}.{}, flags {:?}, {} byte record region",
			header.major,
			header.minor,
			header.flags,
			header.data_size
		);

		Ok(ComfyArchive {
			handle: Mutex::new(handle),
			length,
			header,
			root,
			config,
		})
	}

	/// Reads the data of `file` into `output`, which must be exactly `file.size` bytes long.
	/// Locks the underlying [`Mutex`] for the duration of the read.
	pub fn read_file_into(&self, file: &ComfyFile, output: &mut [u8]) -> InternalResult {
		let mut guard = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
		read_file(&mut *guard, file, output)
	}

	/// Fetch a [`Resource`] by its `/` separated path
	pub fn fetch(&self, path: impl AsRef<str>) -> InternalResult<Resource> {
		let path = path.as_ref();
		let file = self
			.find_file(path)
			.ok_or_else(|| InternalError::MissingResourceError(path.to_string()))?;

		let mut data = vec![0u8; file.size as usize];
		self.read_file_into(file, &mut data)?;

		Ok(Resource {
			id: Arc::from(path),
			data: data.into_boxed_slice(),
			flags: Flags::new(),
		})
	}

	/// Cheaper alternative to [`fetch`](ComfyArchive::fetch) that doesn't lock the underlying [Mutex]
	pub fn fetch_mut(&mut self, path: impl AsRef<str>) -> InternalResult<Resource> {
		let path = path.as_ref();
		let file = self
			.find_file(path)
			.cloned()
			.ok_or_else(|| InternalError::MissingResourceError(path.to_string()))?;

		let mut data = vec![0u8; file.size as usize];
		let handle = self.handle.get_mut().unwrap_or_else(PoisonError::into_inner);
		read_file(handle, &file, &mut data)?;

		Ok(Resource {
			id: Arc::from(path),
			data: data.into_boxed_slice(),
			flags: Flags::new(),
		})
	}
}

fn read_file<T: Read + Seek>(handle: &mut T, file: &ComfyFile, output: &mut [u8]) -> InternalResult {
	if output.len() as u64 != file.size {
		return Err(InternalError::BufferSizeMismatch {
			expected: file.size,
			found: output.len(),
		});
	}

	handle.seek(SeekFrom::Start(file.offset))?;
	handle
		.read_exact(output)
		.map_err(|err| InternalError::truncated(err, &format!("the data of {}", file.name)))
}

// The in-memory record region, addressed with absolute file offsets
struct Region<'a> {
	data: &'a [u8],
	base: u64,
	length: u64,
	encrypted_strings: bool,
}

impl<'a> Region<'a> {
	fn slice(&self, pointer: u64, size: u64) -> InternalResult<&'a [u8]> {
		pointer
			.checked_sub(self.base)
			.and_then(|start| Some((start, start.checked_add(size)?)))
			.filter(|(_, end)| *end <= self.data.len() as u64)
			.map(|(start, end)| &self.data[start as usize..end as usize])
			.ok_or_else(|| {
				InternalError::CorruptArchive(format!(
					"Pointer {:#x} (+{} bytes) escapes the record region [{:#x}; {:#x})",
					pointer,
					size,
					self.base,
					self.base + self.data.len() as u64
				))
			})
	}

	fn array(&self, pointer: u64, count: u64, record_size: u64) -> InternalResult<&'a [u8]> {
		if count == 0 {
			return Ok(&[]);
		}

		let size = count.checked_mul(record_size).ok_or_else(|| {
			InternalError::CorruptArchive(format!("Record count {} overflows the address space", count))
		})?;

		self.slice(pointer, size)
	}

	fn name(&self, pointer: u64) -> InternalResult<Arc<str>> {
		if pointer == 0 {
			return Ok(Arc::from(""));
		}

		// At least the terminator must lie inside the region
		self.slice(pointer, 1)?;
		let tail = &self.data[(pointer - self.base) as usize..];

		let end = tail.iter().position(|b| *b == 0).ok_or_else(|| {
			InternalError::CorruptArchive(format!("Unterminated name at {:#x}", pointer))
		})?;

		let mut name = tail[..end].to_vec();
		if self.encrypted_strings {
			xor_obfuscate(&mut name);
		}

		Ok(Arc::from(String::from_utf8_lossy(&name).as_ref()))
	}

	fn entry_type(&self, record: &[u8], expected: EntryType) -> InternalResult<EntryType> {
		let tag = LittleEndian::read_u32(&record[0..4]);

		match EntryType::from_tag(tag) {
			Some(kind) if kind == expected => Ok(kind),
			Some(kind) => Err(InternalError::CorruptArchive(format!(
				"Expected a {:?} record, found a {:?} record",
				expected, kind
			))),
			None => Err(InternalError::CorruptArchive(format!(
				"Unknown record tag {:02X?}",
				tag.to_le_bytes()
			))),
		}
	}

	fn file(&self, record: &[u8]) -> InternalResult<ComfyFile> {
		self.entry_type(record, EntryType::File)?;

		let name = self.name(LittleEndian::read_u64(&record[8..16]))?;
		let size = LittleEndian::read_u64(&record[16..24]);
		let offset = LittleEndian::read_u64(&record[24..32]);

		match offset.checked_add(size) {
			Some(end) if end <= self.length => Ok(ComfyFile {
				name,
				flags: EntryFlags::from_bits(LittleEndian::read_u32(&record[4..8])),
				size,
				offset,
			}),
			_ => Err(InternalError::EntryOutOfBounds {
				id: name.to_string(),
				end: offset.saturating_add(size),
				length: self.length,
			}),
		}
	}

	fn directory(&self, pointer: u64, expected: EntryType, depth: usize) -> InternalResult<ComfyDirectory> {
		if depth > MAX_DIRECTORY_DEPTH {
			return Err(InternalError::CorruptArchive(format!(
				"Directories nest deeper than {} levels",
				MAX_DIRECTORY_DEPTH
			)));
		}

		let record = self.slice(pointer, DIRECTORY_RECORD_SIZE)?;
		let kind = self.entry_type(record, expected)?;

		let name = self.name(LittleEndian::read_u64(&record[8..16]))?;
		let flags = EntryFlags::from_bits(LittleEndian::read_u32(&record[4..8]));

		let file_count = LittleEndian::read_u64(&record[16..24]);
		let files_pointer = LittleEndian::read_u64(&record[24..32]);
		let directory_count = LittleEndian::read_u64(&record[32..40]);
		let directories_pointer = LittleEndian::read_u64(&record[40..48]);

		let files = self
			.array(files_pointer, file_count, FILE_RECORD_SIZE)?
			.chunks_exact(FILE_RECORD_SIZE as usize)
			.map(|record| self.file(record))
			.collect::<InternalResult<Vec<_>>>()?;

		self.array(directories_pointer, directory_count, DIRECTORY_RECORD_SIZE)?;
		let directories = (0..directory_count)
			.map(|index| {
				self.directory(
					directories_pointer + index * DIRECTORY_RECORD_SIZE,
					EntryType::Directory,
					depth + 1,
				)
			})
			.collect::<InternalResult<Vec<_>>>()?;

		Ok(ComfyDirectory {
			kind,
			name,
			flags,
			files,
			directories,
		})
	}
}
