use std::{
	fmt,
	io::{self, Read, Write},
	path::PathBuf,
	sync::Arc,
};

/// An object that knows how to serialize itself, embedded through [`LeafHandle::Writable`]
pub trait Writable {
	/// Writes the complete serialized form of `self` into `output`
	fn write_to(&self, output: &mut dyn Write) -> io::Result<()>;
}

impl Writable for Vec<u8> {
	fn write_to(&self, output: &mut dyn Write) -> io::Result<()> {
		output.write_all(self)
	}
}

impl Writable for String {
	fn write_to(&self, output: &mut dyn Write) -> io::Result<()> {
		output.write_all(self.as_bytes())
	}
}

/// Where the data of a [`Leaf`] comes from
pub enum LeafHandle<'a> {
	/// A raw byte buffer, embedded as is
	Buffer(&'a [u8]),
	/// Any read handle, read to its end during [`dump`](crate::writer::dump)
	Reader(Box<dyn Read + 'a>),
	/// An object serialized during [`dump`](crate::writer::dump)
	Writable(&'a dyn Writable),
	/// A file opened during [`dump`](crate::writer::dump), unreadable files are skipped unless the build is strict
	Path(PathBuf),
}

impl<'a> fmt::Debug for LeafHandle<'a> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			LeafHandle::Buffer(buffer) => write!(f, "Buffer({} bytes)", buffer.len()),
			LeafHandle::Reader(_) => f.write_str("Reader"),
			LeafHandle::Writable(_) => f.write_str("Writable"),
			LeafHandle::Path(path) => write!(f, "Path({})", path.display()),
		}
	}
}

/// A named ([`ID`](Leaf::id)) wrapper around a data source, one entry of a flat archive
#[derive(Debug)]
pub struct Leaf<'a> {
	/// source data
	pub handle: LeafHandle<'a>,
	/// The `ID` under which the embedded data will be referenced
	pub id: Arc<str>,
}

impl<'a> Leaf<'a> {
	/// Creates a new [`Leaf`] wrapping around the given [`Read`] handle, with an ID
	pub fn new<R: Read + 'a, S: AsRef<str>>(handle: R, id: S) -> Leaf<'a> {
		Leaf {
			handle: LeafHandle::Reader(Box::new(handle)),
			id: Arc::from(id.as_ref()),
		}
	}

	/// Wraps a raw buffer, which is written without an intermediate copy
	pub fn from_buffer<S: AsRef<str>>(buffer: &'a [u8], id: S) -> Leaf<'a> {
		Leaf {
			handle: LeafHandle::Buffer(buffer),
			id: Arc::from(id.as_ref()),
		}
	}

	/// Wraps an object serialized during [`dump`](crate::writer::dump)
	pub fn from_writable<S: AsRef<str>>(writable: &'a dyn Writable, id: S) -> Leaf<'a> {
		Leaf {
			handle: LeafHandle::Writable(writable),
			id: Arc::from(id.as_ref()),
		}
	}

	/// Wraps a filesystem path, the file is only opened during [`dump`](crate::writer::dump)
	pub fn from_path<P: Into<PathBuf>, S: AsRef<str>>(path: P, id: S) -> Leaf<'a> {
		Leaf {
			handle: LeafHandle::Path(path.into()),
			id: Arc::from(id.as_ref()),
		}
	}

	/// Setter for the [`id`](Leaf::id) field
	pub fn id<S: AsRef<str>>(mut self, id: S) -> Self {
		self.id = Arc::from(id.as_ref());
		self
	}
}
