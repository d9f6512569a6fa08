use std::{
	cell::Cell,
	collections::HashSet,
	fs::{self, File},
	io::{self, BufReader, Cursor, Read, Seek, Write},
	path::Path,
	rc::Rc,
	sync::Arc,
};

mod config;
mod leaf;
mod stream;
mod tree;

pub use config::{BuilderConfig, TreeConfig};
pub use leaf::{Leaf, LeafHandle, Writable};
pub use stream::{PendingPatch, PointerWidth, StreamWriter};
pub use tree::{DirectoryNode, FileNode, TreeBuilder, TreeNode};

#[cfg(feature = "compression")]
use crate::global::compressor::Compressor;

use crate::global::{endian::Endianness, error::*, header::Signature, reg_entry::RegistryEntry};

// A leaf's data source, opened and ready to be streamed into the target
enum Source<'s, 'a> {
	Buffer(&'s [u8]),
	Reader(&'s mut Box<dyn Read + 'a>),
	Owned(Cursor<Vec<u8>>),
	File(BufReader<File>),
}

impl<'s, 'a> Read for Source<'s, 'a> {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		match self {
			Source::Buffer(buffer) => buffer.read(buf),
			Source::Reader(reader) => reader.read(buf),
			Source::Owned(cursor) => cursor.read(buf),
			Source::File(file) => file.read(buf),
		}
	}
}

impl<'s, 'a> Source<'s, 'a> {
	// `None` when a path source is missing and the build is lenient
	fn resolve(handle: &'s mut LeafHandle<'a>, strict: bool) -> InternalResult<Option<Source<'s, 'a>>> {
		let source = match handle {
			LeafHandle::Buffer(buffer) => Source::Buffer(*buffer),
			LeafHandle::Reader(reader) => Source::Reader(reader),
			LeafHandle::Writable(writable) => {
				let mut buffer = Vec::new();
				writable.write_to(&mut buffer)?;
				Source::Owned(Cursor::new(buffer))
			},
			LeafHandle::Path(path) => match File::open(path.as_path()) {
				Ok(file) => Source::File(BufReader::new(file)),
				Err(source) if strict => {
					return Err(InternalError::MissingSourceError {
						path: path.clone(),
						source,
					})
				},
				Err(err) => {
					log::warn!("Skipping unreadable source file {}: {}", path.display(), err);
					return Ok(None);
				},
			},
		};

		Ok(Some(source))
	}
}

fn validate_ids(leaves: &[Leaf<'_>]) -> InternalResult {
	if let Some(leaf) = leaves.iter().find(|leaf| leaf.id.is_empty() || leaf.id.contains('\0')) {
		return Err(InternalError::InvalidIDError(leaf.id.to_string()));
	}

	let set = leaves.iter().map(|l| l.id.as_ref()).collect::<HashSet<_>>();

	if set.len() < leaves.len() {
		for (idx, leaf) in leaves.iter().enumerate() {
			let slice = &leaves[idx + 1..];

			// find duplicate
			if slice.iter().any(|l| l.id == leaf.id) {
				return Err(InternalError::DuplicateLeafID(leaf.id.to_string()));
			}
		}
	}

	Ok(())
}

#[cfg(feature = "compression")]
fn compress_into<W: Write + Seek>(writer: &mut StreamWriter<'_, W>, source: &mut Source<'_, '_>) -> InternalResult<(u64, u64)> {
	let report = Compressor::new(source).compress(writer.inner_mut())?;
	Ok((report.compressed_size, report.original_size))
}

#[cfg(not(feature = "compression"))]
fn compress_into<W: Write + Seek>(_: &mut StreamWriter<'_, W>, _: &mut Source<'_, '_>) -> InternalResult<(u64, u64)> {
	Err(InternalError::MissingFeatureError("compression"))
}

/// Writes a flat `FArc` (or `FArC` when [`compress`](BuilderConfig::compress) is set) archive holding every [`Leaf`] into the target.
///
/// Leaves are written in order. Each entry's data starts on a multiple of [`alignment`](BuilderConfig::alignment)
/// and the gap is padded with [`PADDING_VALUE`](crate::PADDING_VALUE). Offsets and sizes are patched in once the data is written,
/// so the target must be seekable. Returns the number of bytes written.
pub fn dump<'a, W: Write + Seek>(target: W, leaves: &mut [Leaf<'a>], config: &BuilderConfig) -> InternalResult<u64> {
	validate_ids(leaves)?;

	#[cfg(not(feature = "compression"))]
	if config.compress {
		return Err(InternalError::MissingFeatureError("compression"));
	}

	let mut sources = Vec::with_capacity(leaves.len());
	for leaf in leaves.iter_mut() {
		if let Some(source) = Source::resolve(&mut leaf.handle, config.strict)? {
			sources.push((leaf.id.clone(), source));
		}
	}

	let signature = if config.compress { Signature::Compressed } else { Signature::UnCompressed };
	let compress = config.compress;
	let alignment = config.alignment as u64;
	let count = sources.len();

	let mut writer = StreamWriter::new(target, Endianness::Big, PointerWidth::Bits32);
	writer.seek(0)?;

	writer.write_bytes(&signature.magic())?;
	let header_size = Rc::new(Cell::new(0u32));
	{
		let header_size = header_size.clone();
		writer.write_delayed(move |w| w.write_u32(header_size.get()))?;
	}
	writer.write_u32(config.alignment)?;

	for (id, mut source) in sources {
		writer.write_str(id.as_bytes())?;

		let compressed_size = Rc::new(Cell::new(0u64));
		let original_size = Rc::new(Cell::new(0u64));

		{
			let (compressed_size, original_size) = (compressed_size.clone(), original_size.clone());

			writer.write_func_ptr(0, move |w| {
				let offset = w.position()?;

				let (stored, original) = if compress {
					compress_into(w, &mut source)?
				} else {
					let written = io::copy(&mut source, w.inner_mut())?;
					(written, written)
				};

				compressed_size.set(stored);
				original_size.set(original);
				w.write_alignment_padding(alignment)?;

				if let Some(callback) = config.progress_callback {
					callback(&RegistryEntry {
						id,
						offset,
						compressed_size: stored,
						original_size: original,
					});
				}

				Ok(())
			})?;
		}

		if compress {
			writer.write_delayed(move |w| w.write_size(compressed_size.get()))?;
		}

		writer.write_delayed(move |w| w.write_size(original_size.get()))?;
	}

	// Everything after the magic and the size word itself
	let table_end = writer.position()?;
	let size = u32::try_from(table_end - 8)
		.map_err(|_| InternalError::OtherError(format!("Header of {} bytes overflows its size field", table_end - 8).into()))?;
	header_size.set(size);

	writer.write_alignment_padding(alignment)?;
	writer.flush_pointer_pool()?;
	writer.flush_delayed_pool()?;
	writer.write_alignment_padding(alignment)?;

	let length = writer.position()?;
	log::debug!(
		"Wrote {} archive: {} entries, {} byte header, {} bytes total",
		signature,
		count,
		size,
		length
	);

	Ok(length)
}

/// Collects [`Leaf`]s for a flat archive, rejecting duplicate IDs as they are added
#[derive(Debug, Default)]
pub struct Builder<'a> {
	leaves: Vec<Leaf<'a>>,
	id_set: HashSet<Arc<str>>,
	config: BuilderConfig<'a>,
}

impl<'a> Builder<'a> {
	/// Instantiates a new [`Builder`] writing with the given settings
	pub fn new(config: BuilderConfig<'a>) -> Builder<'a> {
		Builder {
			leaves: Vec::new(),
			id_set: HashSet::new(),
			config,
		}
	}

	/// Directly add a [`Leaf`] to the [`Builder`]
	pub fn add_leaf(&mut self, leaf: Leaf<'a>) -> InternalResult {
		// Make sure no two leaves are written with the same ID
		if !self.id_set.insert(leaf.id.clone()) {
			Err(InternalError::DuplicateLeafID(leaf.id.to_string()))
		} else {
			self.leaves.push(leaf);
			Ok(())
		}
	}

	/// Add a [`Read`] handle under the given ID
	pub fn add<R: Read + 'a, S: AsRef<str>>(&mut self, handle: R, id: S) -> InternalResult {
		self.add_leaf(Leaf::new(handle, id))
	}

	/// Adds every regular file directly inside `path` as a path [`Leaf`], named after the file.
	/// The files are only opened once the archive is dumped.
	pub fn add_dir(&mut self, path: impl AsRef<Path>) -> InternalResult {
		let mut files = fs::read_dir(path)?
			.map(|entry| entry.map(|e| e.path()))
			.collect::<io::Result<Vec<_>>>()?;
		files.sort();

		for file in files.into_iter().filter(|p| p.is_file()) {
			let id = match file.file_name() {
				Some(name) => name.to_string_lossy().into_owned(),
				None => continue,
			};

			self.add_leaf(Leaf::from_path(file, id))?;
		}

		Ok(())
	}

	/// Number of leaves queued so far
	pub fn len(&self) -> usize {
		self.leaves.len()
	}

	/// Whether no leaves have been queued
	pub fn is_empty(&self) -> bool {
		self.leaves.is_empty()
	}

	/// Writes all queued leaves into `target`, see [`dump`]
	pub fn dump<W: Write + Seek>(&mut self, target: W) -> InternalResult<u64> {
		dump(target, &mut self.leaves, &self.config)
	}
}
