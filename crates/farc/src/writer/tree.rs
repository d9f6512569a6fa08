use std::{
	cell::RefCell,
	fs::{self, File},
	io::{self, BufReader, Seek, Write},
	mem,
	path::{Path, PathBuf},
	rc::Rc,
	time::{SystemTime, UNIX_EPOCH},
};

use super::{
	config::TreeConfig,
	stream::{PointerWidth, StreamWriter},
};
use crate::{
	crypto_utils::{gen_iv, xor_obfuscate},
	global::{
		comfy::{ArchiveFlags, ComfyHeader, EntryFlags, EntryType, MAX_DIRECTORY_DEPTH},
		endian::Endianness,
		error::*,
	},
};

// Every record block and file is aligned to this
const RECORD_ALIGNMENT: u64 = 16;

/// A file registered for a Comfy Archive, read from `source` when the archive is dumped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
	/// Plain file name, obfuscated on write if the archive encrypts strings
	pub name: String,
	/// Record flags
	pub flags: EntryFlags,
	/// Where the file data is read from
	pub source: PathBuf,
}

/// A directory registered for a Comfy Archive, either the root or a nested directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryNode {
	/// [`EntryType::Root`] for the top level directory, [`EntryType::Directory`] otherwise
	pub kind: EntryType,
	/// Plain directory name, obfuscated on write if the archive encrypts strings
	pub name: String,
	/// Record flags
	pub flags: EntryFlags,
	/// Files and subdirectories, in registration order
	pub children: Vec<TreeNode>,
}

/// One node of the tree being built
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
	/// A file leaf
	File(FileNode),
	/// A nested directory
	Directory(DirectoryNode),
}

impl DirectoryNode {
	fn new(kind: EntryType, name: String) -> DirectoryNode {
		DirectoryNode {
			kind,
			name,
			flags: EntryFlags::from_bits(EntryFlags::VERIFIED),
			children: Vec::new(),
		}
	}

	/// Files directly inside this directory, in registration order
	pub fn files(&self) -> impl Iterator<Item = &FileNode> {
		self.children.iter().filter_map(|node| match node {
			TreeNode::File(file) => Some(file),
			TreeNode::Directory(_) => None,
		})
	}

	/// Subdirectories directly inside this directory, in registration order
	pub fn directories(&self) -> impl Iterator<Item = &DirectoryNode> {
		self.children.iter().filter_map(|node| match node {
			TreeNode::File(_) => None,
			TreeNode::Directory(directory) => Some(directory),
		})
	}
}

fn file_name(path: &Path) -> InternalResult<String> {
	let name = match path.file_name() {
		Some(name) => name.to_string_lossy().into_owned(),
		None => fs::canonicalize(path)?
			.file_name()
			.map(|name| name.to_string_lossy().into_owned())
			.unwrap_or_default(),
	};

	Ok(name)
}

// A file record whose size and data pointer are patched once its data is written
struct PendingFile<'n> {
	location: u64,
	path: String,
	file: &'n FileNode,
}

// Shared by every record resolver queued during one dump
struct RecordContext<'n> {
	pending: RefCell<Vec<PendingFile<'n>>>,
	encrypt_strings: bool,
}

impl<'n> RecordContext<'n> {
	fn encode_name(&self, name: &str) -> Vec<u8> {
		let mut bytes = name.as_bytes().to_vec();
		if self.encrypt_strings {
			xor_obfuscate(&mut bytes);
		}

		bytes
	}
}

// Names are stored NUL terminated, after obfuscation when the archive encrypts strings
fn is_storable(name: &str, encrypt_strings: bool) -> bool {
	let mut bytes = name.as_bytes().to_vec();
	if encrypt_strings {
		xor_obfuscate(&mut bytes);
	}

	!bytes.contains(&0)
}

fn validate_tree(directory: &DirectoryNode, path: &str, depth: usize, encrypt_strings: bool) -> InternalResult {
	if depth > MAX_DIRECTORY_DEPTH {
		return Err(InternalError::DirectoryDepthError(path.to_string()));
	}

	if !is_storable(&directory.name, encrypt_strings) {
		return Err(InternalError::InvalidIDError(path.to_string()));
	}

	for file in directory.files() {
		if file.name.is_empty() || !is_storable(&file.name, encrypt_strings) {
			return Err(InternalError::InvalidIDError(format!("{}{}", path, file.name)));
		}
	}

	directory.directories().try_for_each(|sub| {
		let path = format!("{}{}/", path, sub.name);
		validate_tree(sub, &path, depth + 1, encrypt_strings)
	})
}

fn write_file_record<'n, W: Write + Seek>(
	writer: &mut StreamWriter<'n, W>, file: &'n FileNode, prefix: &str, context: &RecordContext<'n>,
) -> InternalResult {
	writer.write_u32(EntryType::File.tag())?;
	writer.write_u32(file.flags.bits())?;
	writer.write_str_ptr(context.encode_name(&file.name))?;

	let location = writer.position()?;
	context.pending.borrow_mut().push(PendingFile {
		location,
		path: format!("{}{}", prefix, file.name),
		file,
	});

	// Placeholders, overwritten with size + data pointer
	writer.write_u32(u32::from_le_bytes(*b"size"))?;
	writer.write_u32(0)?;
	writer.write_u32(u32::from_le_bytes(*b"ptr\0"))?;
	writer.write_u32(0)
}

fn write_directory_record<'n, W: Write + Seek>(
	writer: &mut StreamWriter<'n, W>, directory: &'n DirectoryNode, prefix: String, context: &Rc<RecordContext<'n>>,
) -> InternalResult {
	writer.write_u32(directory.kind.tag())?;
	writer.write_u32(directory.flags.bits())?;
	writer.write_str_ptr(context.encode_name(&directory.name))?;

	let file_count = directory.files().count() as u64;
	writer.write_u64(file_count)?;

	if file_count == 0 {
		writer.write_ptr(0)?;
	} else {
		let (prefix, context) = (prefix.clone(), context.clone());
		writer.write_func_ptr(0, move |w| {
			directory
				.files()
				.try_for_each(|file| write_file_record(w, file, &prefix, &context))
		})?;
	}

	let directory_count = directory.directories().count() as u64;
	writer.write_u64(directory_count)?;

	if directory_count == 0 {
		writer.write_ptr(0)
	} else {
		let context = context.clone();
		writer.write_func_ptr(0, move |w| {
			directory.directories().try_for_each(|sub| {
				let prefix = format!("{}{}/", prefix, sub.name);
				write_directory_record(w, sub, prefix, &context)
			})
		})
	}
}

/// Builds a Comfy Archive from a directory tree.
///
/// Registration walks the filesystem and only records names and paths, file data is streamed in during [`dump`](TreeBuilder::dump).
/// Entries of a directory are registered in file name order so the output is deterministic.
///
/// [`dump`](TreeBuilder::dump) checks the tree before writing anything. It fails with [`InternalError::DirectoryDepthError`]
/// when directories nest deeper than [`MAX_DIRECTORY_DEPTH`], and with [`InternalError::InvalidIDError`] when a name
/// would read back truncated: a NUL byte, or with `encrypt_strings` a `0xCC` byte, which obfuscates to NUL.
#[derive(Debug)]
pub struct TreeBuilder<'a> {
	config: TreeConfig<'a>,
	root: DirectoryNode,
}

impl<'a> TreeBuilder<'a> {
	/// A builder with an empty, unnamed root
	pub fn new(config: TreeConfig<'a>) -> TreeBuilder<'a> {
		TreeBuilder {
			config,
			root: DirectoryNode::new(EntryType::Root, String::new()),
		}
	}

	/// The root node
	#[inline(always)]
	pub fn root(&self) -> &DirectoryNode {
		&self.root
	}

	/// The root node, for registering entries by hand
	#[inline(always)]
	pub fn root_mut(&mut self) -> &mut DirectoryNode {
		&mut self.root
	}

	/// Replaces the root with one named after `path` and registers everything inside it
	pub fn register_root(&mut self, path: impl AsRef<Path>) -> InternalResult {
		let path = path.as_ref();

		let mut root = DirectoryNode::new(EntryType::Root, file_name(path)?);
		self.register_children(&mut root, path)?;
		self.root = root;

		Ok(())
	}

	/// Registers `path` as a subdirectory of `parent`, recursively
	pub fn register_directory(&self, parent: &mut DirectoryNode, path: impl AsRef<Path>) -> InternalResult {
		let path = path.as_ref();

		let mut directory = DirectoryNode::new(EntryType::Directory, file_name(path)?);
		self.register_children(&mut directory, path)?;
		parent.children.push(TreeNode::Directory(directory));

		Ok(())
	}

	/// Registers `path` as a file inside `parent`, the file is only read during [`dump`](TreeBuilder::dump)
	pub fn register_file(&self, parent: &mut DirectoryNode, path: impl AsRef<Path>) -> InternalResult {
		let path = path.as_ref();

		parent.children.push(TreeNode::File(FileNode {
			name: file_name(path)?,
			flags: EntryFlags::from_bits(EntryFlags::VERIFIED),
			source: path.to_path_buf(),
		}));

		Ok(())
	}

	fn register_children(&self, directory: &mut DirectoryNode, path: &Path) -> InternalResult {
		let mut entries = fs::read_dir(path)?
			.map(|entry| entry.map(|e| e.path()))
			.collect::<io::Result<Vec<_>>>()?;
		entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

		for entry in entries {
			if entry.is_dir() {
				self.register_directory(directory, &entry)?;
			} else if entry.is_file() {
				self.register_file(directory, &entry)?;
			} else {
				log::warn!("Skipping {}, it is neither a file nor a directory", entry.display());
			}
		}

		Ok(())
	}

	/// Writes the archive into `target`: header, record tree, string pool, then file data. Returns the number of bytes written
	pub fn dump<W: Write + Seek>(&self, target: W) -> InternalResult<u64> {
		validate_tree(&self.root, "", 0, self.config.encrypt_strings)?;

		let mut flags = ArchiveFlags::default();
		flags.set(ArchiveFlags::WIDE_ADDRESSES, true);
		flags.set(ArchiveFlags::VERIFIED, true);
		flags.set(ArchiveFlags::ENCRYPTED_STRINGS, self.config.encrypt_strings);

		let header = ComfyHeader {
			major: crate::COMFY_VERSION_MAJOR,
			minor: crate::COMFY_VERSION_MINOR,
			creation_date: SystemTime::now()
				.duration_since(UNIX_EPOCH)
				.map(|elapsed| elapsed.as_secs())
				.unwrap_or(0),
			flags,
			iv: gen_iv(),
			data_size: 0,
			data_offset: ComfyHeader::SIZE as u64,
		};

		let context = Rc::new(RecordContext {
			pending: RefCell::new(Vec::new()),
			encrypt_strings: self.config.encrypt_strings,
		});

		let mut writer = StreamWriter::new(target, Endianness::Little, PointerWidth::Bits64);
		writer.seek(0)?;
		writer.write_bytes(&header.to_bytes())?;

		write_directory_record(&mut writer, &self.root, String::new(), &context)?;
		writer.write_ptr(0)?;
		writer.write_alignment_padding(RECORD_ALIGNMENT)?;

		writer.flush_pointer_pool()?;
		writer.write_alignment_padding(RECORD_ALIGNMENT)?;
		writer.flush_delayed_pool()?;
		writer.flush_pointer_pool()?;
		writer.flush_string_pool()?;

		let records_end = writer.seek_end()?;
		writer.seek(ComfyHeader::DATA_SIZE_OFFSET)?;
		writer.write_u64(records_end - header.data_offset)?;

		writer.seek_end()?;
		writer.write_alignment_padding(RECORD_ALIGNMENT)?;

		let pending = mem::take(&mut *context.pending.borrow_mut());
		let mut patches = Vec::with_capacity(pending.len());

		for PendingFile { location, path, file } in pending {
			let offset = writer.position()?;

			let size = match File::open(&file.source) {
				Ok(handle) => io::copy(&mut BufReader::new(handle), writer.inner_mut())?,
				Err(source) if self.config.strict => {
					return Err(InternalError::MissingSourceError {
						path: file.source.clone(),
						source,
					})
				},
				Err(err) => {
					log::warn!("Writing {} as an empty file, its source {} is unreadable: {}", path, file.source.display(), err);
					0
				},
			};

			writer.write_alignment_padding(RECORD_ALIGNMENT)?;
			patches.push((location, size, offset));

			if let Some(callback) = self.config.progress_callback {
				callback(&path, size);
			}
		}

		for (location, size, offset) in patches.iter().copied() {
			writer.seek(location)?;
			writer.write_u64(size)?;
			writer.write_ptr(offset)?;
		}

		writer.seek_end()?;
		writer.write_alignment_padding(RECORD_ALIGNMENT)?;

		let length = writer.position()?;
		log::debug!(
			"Wrote comfy archive: {} files, {} byte record region, {} bytes total",
			patches.len(),
			records_end - header.data_offset,
			length
		);

		Ok(length)
	}
}
