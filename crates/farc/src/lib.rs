#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(clippy::or_fun_call)]
#![deny(missing_docs)]

/*!
Reader and writer for the `FArc` family of game asset containers, and for the 64-bit pointer based "Comfy Archive".

### 🔫 Cargo Features
- `archive`: Enables the [`Archive`](archive::Archive) and [`ComfyArchive`](archive::ComfyArchive) loaders.
- `builder`: Enables the flat [`dump`](builder::dump) writer and the [`TreeBuilder`](builder::TreeBuilder).
- `crypto`: Pulls `aes` and `cbc`, needed to read encrypted (`Encrypted` flag) archives.
- `compression`: Pulls `flate2`, needed to read and write `FArC` (gzip compressed) archives.
- `default`: Enables all the above features.

### 🀄 Show me some code _dang it!_

```
use std::io::Cursor;
use farc::prelude::*;

let mut leaves = [
	Leaf::new(b"Hello, Miku!".as_slice(), "hello.txt"),
	Leaf::new([12, 23, 34, 45, 56, 67, 78, 90, 69].as_slice(), "ftstep.bin"),
];

let mut target = Cursor::new(Vec::new());
let config = BuilderConfig::default().compress(true);
dump(&mut target, &mut leaves, &config).unwrap();

// roundtrip
let mut archive = Archive::new(target).unwrap();
let resource = archive.fetch_mut("ftstep.bin").unwrap();

assert_eq!(resource.data.as_ref(), [12, 23, 34, 45, 56, 67, 78, 90, 69].as_slice());
```
*/

/// All tests are included in this module.
mod tests;

pub(crate) mod global;

#[cfg(feature = "archive")]
#[cfg_attr(docsrs, doc(cfg(feature = "archive")))]
pub(crate) mod loader;

#[cfg(feature = "builder")]
#[cfg_attr(docsrs, doc(cfg(feature = "builder")))]
pub(crate) mod writer;

/// Default data alignment of written archives
pub const DEFAULT_ALIGNMENT: u32 = 16;

/// Byte used for every alignment padding run, ie `0xCC`
pub const PADDING_VALUE: u8 = 0xCC;

/// Size of the chunks fed through the gzip compressor, 16KiB
pub const CHUNK_SIZE: usize = 0x4000;

/// Magic sequence of a Comfy Archive
pub const COMFY_MAGIC: [u8; 4] = [0xCF, 0x5C, 0xAC, 0x90];

/// Major version of Comfy Archives written and understood by this crate
pub const COMFY_VERSION_MAJOR: u8 = 1;

/// Minor version of Comfy Archives written by this crate
pub const COMFY_VERSION_MINOR: u8 = 0;

/// Consolidated crate imports.
pub mod prelude {
	pub use crate::global::{
		error::*,
		flags::Flags,
		header::{EncryptionFormat, Header, Signature},
		reg_entry::RegistryEntry,
	};

	#[cfg(feature = "archive")]
	pub use crate::archive::*;

	#[cfg(feature = "builder")]
	pub use crate::builder::*;

	#[cfg(feature = "compression")]
	pub use crate::global::compressor::*;
}

/// Byte ordering helpers, the legacy format is big-endian while the Comfy Archive is little-endian
pub mod endian {
	pub use crate::global::endian::*;
}

/// AES-128 primitives and the fixed keys used by the format
pub mod crypto;

/// Archive creation logic and data structures: [`dump`](crate::builder::dump), [`Leaf`](crate::builder::Leaf) and [`TreeBuilder`](crate::builder::TreeBuilder)
#[cfg(feature = "builder")]
#[cfg_attr(docsrs, doc(cfg(feature = "builder")))]
pub mod builder {
	pub use crate::writer::*;
	pub use crate::global::{
		comfy::{ArchiveFlags, EntryFlags, EntryType, MAX_DIRECTORY_DEPTH},
		error::*,
		flags::Flags,
	};
}

/// Archive reading logic and data-structures, [`Archive`](crate::archive::Archive), [`ComfyArchive`](crate::archive::ComfyArchive) and [`Resource`](crate::archive::Resource)
#[cfg(feature = "archive")]
#[cfg_attr(docsrs, doc(cfg(feature = "archive")))]
pub mod archive {
	pub use crate::loader::{
		archive::Archive,
		comfy::{ComfyArchive, ComfyDirectory, ComfyFile},
		config::{ArchiveConfig, NameComparison},
		resource::Resource,
	};
	pub use crate::global::{
		comfy::{ArchiveFlags, ComfyHeader, EntryFlags, EntryType, MAX_DIRECTORY_DEPTH},
		error::*,
		flags::Flags,
		header::{EncryptionFormat, Header, Signature},
		reg_entry::RegistryEntry,
	};
}

/// Some utility functions to keep you happy
pub mod crypto_utils;
