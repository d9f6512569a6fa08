#![cfg(test)]
// Mirrors how users are expected to drive the crate, plus a few hand assembled archives for the layouts no writer emits

use std::{
	cell::Cell,
	fs,
	io::{Cursor, Write},
	path::Path,
};

use byteorder::{BigEndian, WriteBytesExt};

use crate::prelude::*;

const POEM: &[u8] = b"Sakura no hanabira ga maichiru naka de, utau koe dake ga nokotta!";

fn lorem(len: usize) -> Vec<u8> {
	b"Lorem ipsum dolor sit amet, consectetur adipiscing elit. "
		.iter()
		.copied()
		.cycle()
		.take(len)
		.collect()
}

fn write_tree(root: &Path, files: &[(&str, &[u8])]) -> InternalResult {
	for (path, data) in files {
		let path = root.join(path);
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)?;
		}

		fs::write(path, data)?;
	}

	Ok(())
}

#[cfg(feature = "crypto")]
mod fixtures {
	use super::*;
	use crate::crypto::{self, CLASSIC_KEY, MODERN_KEY};
	pub use crate::crypto_utils::{align_up, padded_size};

	pub const IV: [u8; 16] = [
		0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1A, 0x1B, 0x1C, 0x1D, 0x1E, 0x1F, 0x20,
	];

	/// One entry of a hand assembled `FARC` archive, `stored` is written verbatim
	pub struct Entry {
		pub name: &'static str,
		pub stored: Vec<u8>,
		pub compressed_size: u32,
		pub original_size: u32,
	}

	/// 16 bytes of junk followed by the payload, zero padded and sealed with the modern key
	pub fn seal_modern(payload: &[u8]) -> InternalResult<Vec<u8>> {
		let mut block = vec![0xAA; 16];
		block.extend_from_slice(payload);
		block.resize(padded_size(block.len()), 0);

		crypto::encrypt_cbc(&mut block, &MODERN_KEY, &IV)?;
		Ok(block)
	}

	pub fn seal_classic(payload: &[u8]) -> InternalResult<Vec<u8>> {
		let mut block = payload.to_vec();
		block.resize(padded_size(block.len()), 0);

		crypto::encrypt_ecb(&mut block, &CLASSIC_KEY)?;
		Ok(block)
	}

	fn entry_table(entries: &[Entry], data_start: u64, modern: bool) -> InternalResult<Vec<u8>> {
		let mut table = Vec::new();
		let mut offset = data_start;

		for entry in entries {
			table.write_all(entry.name.as_bytes())?;
			table.write_u8(0)?;
			table.write_u32::<BigEndian>(offset as u32)?;
			table.write_u32::<BigEndian>(entry.compressed_size)?;
			table.write_u32::<BigEndian>(entry.original_size)?;

			if modern {
				table.write_u32::<BigEndian>(0)?;
			}

			offset = align_up(offset + entry.stored.len() as u64, 16);
		}

		Ok(table)
	}

	fn table_len(entries: &[Entry], modern: bool) -> usize {
		let per_entry = if modern { 16 } else { 12 };
		entries.iter().map(|e| e.name.len() + 1 + per_entry).sum()
	}

	fn append_data(archive: &mut Vec<u8>, entries: &[Entry]) {
		for entry in entries {
			archive.resize(align_up(archive.len() as u64, 16) as usize, crate::PADDING_VALUE);
			archive.extend_from_slice(&entry.stored);
		}

		archive.resize(align_up(archive.len() as u64, 16) as usize, crate::PADDING_VALUE);
	}

	/// Extended header, plain table, classic layout: entries start right after the two probed words
	pub fn classic(flags: u32, entries: &[Entry]) -> InternalResult<Vec<u8>> {
		let table_end = 28 + table_len(entries, false);
		let data_start = align_up(table_end as u64, 16);

		let mut archive = Vec::new();
		archive.write_all(b"FARC")?;
		archive.write_u32::<BigEndian>(table_end as u32 - 8)?;
		archive.write_u32::<BigEndian>(flags)?;
		archive.write_u32::<BigEndian>(0)?;
		archive.write_u32::<BigEndian>(16)?;
		archive.write_u32::<BigEndian>(0)?;
		archive.write_u32::<BigEndian>(0)?;
		archive.extend(entry_table(entries, data_start, false)?);

		append_data(&mut archive, entries);
		Ok(archive)
	}

	/// Extended header, plain table, modern layout: a counted table with a trailing reserved word per entry
	pub fn modern_plain(flags: u32, entries: &[Entry]) -> InternalResult<Vec<u8>> {
		let table_end = 32 + table_len(entries, true);
		let data_start = align_up(table_end as u64, 16);

		let mut archive = Vec::new();
		archive.write_all(b"FARC")?;
		archive.write_u32::<BigEndian>(table_end as u32 - 8)?;
		archive.write_u32::<BigEndian>(flags)?;
		archive.write_u32::<BigEndian>(0)?;
		archive.write_u32::<BigEndian>(16)?;
		archive.write_u32::<BigEndian>(1)?;
		archive.write_u32::<BigEndian>(entries.len() as u32)?;
		archive.write_u32::<BigEndian>(16)?;
		archive.extend(entry_table(entries, data_start, true)?);

		append_data(&mut archive, entries);
		Ok(archive)
	}

	/// Extended header with the IV in place of the alignment and a CBC sealed, counted table
	pub fn modern_encrypted(flags: u32, entries: &[Entry]) -> InternalResult<Vec<u8>> {
		let header_size = 16 + table_len(entries, true);
		let data_start = align_up((32 + padded_size(header_size)) as u64, 16);

		let mut table = Vec::new();
		table.write_u32::<BigEndian>(16)?;
		table.write_u32::<BigEndian>(0)?;
		table.write_u32::<BigEndian>(entries.len() as u32)?;
		table.write_u32::<BigEndian>(0)?;
		table.extend(entry_table(entries, data_start, true)?);
		table.resize(padded_size(table.len()), 0);
		crypto::encrypt_cbc(&mut table, &MODERN_KEY, &IV)?;

		let mut archive = Vec::new();
		archive.write_all(b"FARC")?;
		archive.write_u32::<BigEndian>(header_size as u32)?;
		archive.write_u32::<BigEndian>(flags)?;
		archive.write_u32::<BigEndian>(0)?;
		archive.write_all(&IV)?;
		archive.extend(table);

		append_data(&mut archive, entries);
		Ok(archive)
	}
}

#[cfg(feature = "compression")]
fn gzip(data: &[u8]) -> InternalResult<Vec<u8>> {
	let mut compressed = Vec::new();
	Compressor::new(data).compress(&mut compressed)?;
	Ok(compressed)
}

#[test]
fn flag_restricted_access() {
	let mut flag = Flags::new();

	// This should return an error
	if let Err(error) = flag.set(Flags::RESERVED_FLAG, true) {
		assert!(matches!(error, InternalError::RestrictedFlagAccessError));
	} else {
		panic!("Access to restricted flags has been allowed, this should not be feasible")
	};

	assert_eq!(flag.set(Flags::ENCRYPTED_FLAG, true).unwrap(), Flags::ENCRYPTED_FLAG);
}

#[test]
fn signature_magic() {
	for signature in [Signature::UnCompressed, Signature::Compressed, Signature::Extended, Signature::Reserved] {
		assert_eq!(Signature::from_magic(signature.magic()), Some(signature));
	}

	assert_eq!(Signature::Extended.to_string(), "FARC");
	assert_eq!(Signature::from_magic(*b"farc"), None);
}

#[test]
fn encryption_probe() {
	use crate::global::header::has_encrypted_entries;

	let encrypted = Flags::from_bits(Flags::ENCRYPTED_FLAG);

	assert!(has_encrypted_entries(encrypted, true, 0x1000));
	assert!(!has_encrypted_entries(encrypted, true, 0x0FFF));
	assert!(!has_encrypted_entries(encrypted, false, 0x8000_0000));
	assert!(!has_encrypted_entries(Flags::new(), true, 0x8000_0000));
}

#[test]
#[cfg(all(feature = "archive", feature = "builder"))]
fn flat_roundtrip() -> InternalResult {
	let lorem = lorem(3000);
	let greeting = String::from("Hello, Miku!");

	let mut leaves = [
		Leaf::new(POEM, "poem.txt"),
		Leaf::from_buffer(&lorem, "lorem.txt"),
		Leaf::from_writable(&greeting, "greeting.txt"),
		Leaf::from_buffer(&[], "empty.bin"),
	];

	let written = Cell::new(0);
	let callback = |_: &RegistryEntry| written.set(written.get() + 1);
	let config = BuilderConfig::default().alignment(0x20).callback(&callback);

	let mut target = Cursor::new(Vec::new());
	let length = dump(&mut target, &mut leaves, &config)?;

	assert_eq!(written.get(), 4);
	assert_eq!(length, target.get_ref().len() as u64);
	assert_eq!(&target.get_ref()[..4], b"FArc");
	assert_eq!(length % 0x20, 0);

	let mut archive = Archive::new(target)?;
	assert_eq!(archive.header().signature, Signature::UnCompressed);
	assert_eq!(archive.header().alignment, 0x20);
	assert_eq!(archive.entries().len(), 4);

	let names = archive.entries().iter().map(|e| e.id.as_ref()).collect::<Vec<_>>();
	assert_eq!(names, ["poem.txt", "lorem.txt", "greeting.txt", "empty.bin"]);

	for entry in archive.entries() {
		assert_eq!(entry.offset % 0x20, 0);
		assert_eq!(entry.compressed_size, entry.original_size);
	}

	assert_eq!(archive.fetch("poem.txt")?.data.as_ref(), POEM);
	assert_eq!(archive.fetch_mut("lorem.txt")?.data.as_ref(), lorem.as_slice());
	assert_eq!(archive.fetch_mut("greeting.txt")?.data.as_ref(), b"Hello, Miku!");
	assert!(archive.fetch("empty.bin")?.data.is_empty());

	Ok(())
}

#[test]
#[cfg(all(feature = "archive", feature = "builder", feature = "compression"))]
fn compressed_roundtrip() -> InternalResult {
	let lorem = lorem(10_000);
	let mut leaves = [Leaf::new(POEM, "poem.txt"), Leaf::from_buffer(&lorem, "lorem.txt")];

	let mut target = Cursor::new(Vec::new());
	dump(&mut target, &mut leaves, &BuilderConfig::default().compress(true))?;
	assert_eq!(&target.get_ref()[..4], b"FArC");

	let archive = Archive::new(target)?;
	assert!(archive.flags().contains(Flags::COMPRESSED_FLAG));

	let entry = archive.fetch_entry("lorem.txt").unwrap();
	assert_eq!(entry.original_size, 10_000);
	assert!(entry.compressed_size < entry.original_size);

	assert_eq!(archive.fetch("lorem.txt")?.data.as_ref(), lorem.as_slice());
	assert_eq!(archive.fetch("poem.txt")?.data.as_ref(), POEM);

	Ok(())
}

#[test]
#[cfg(all(feature = "archive", feature = "builder"))]
fn empty_archive() -> InternalResult {
	let mut target = Cursor::new(Vec::new());
	dump(&mut target, &mut [], &BuilderConfig::default())?;

	let archive = Archive::new(target)?;
	assert!(archive.is_empty());
	assert!(archive.fetch_entry("anything").is_none());
	assert!(matches!(archive.fetch("anything"), Err(InternalError::MissingResourceError(_))));

	Ok(())
}

#[test]
#[cfg(feature = "builder")]
fn builder_rejects_bad_ids() {
	let mut builder = Builder::default();
	builder.add(POEM, "poem").unwrap();

	assert!(matches!(builder.add(POEM, "poem"), Err(InternalError::DuplicateLeafID(_))));
	assert_eq!(builder.len(), 1);

	let mut leaves = [Leaf::new(POEM, "bad\0name")];
	let result = dump(Cursor::new(Vec::new()), &mut leaves, &BuilderConfig::default());
	assert!(matches!(result, Err(InternalError::InvalidIDError(_))));

	let mut leaves = [Leaf::new(POEM, "same"), Leaf::new(POEM, "same")];
	let result = dump(Cursor::new(Vec::new()), &mut leaves, &BuilderConfig::default());
	assert!(matches!(result, Err(InternalError::DuplicateLeafID(_))));
}

#[test]
#[cfg(all(feature = "archive", feature = "builder"))]
fn builder_from_dir() -> InternalResult {
	let dir = tempfile::tempdir()?;
	write_tree(dir.path(), &[
			("b.txt", b"bravo".as_slice()),
			("a.txt", b"alpha".as_slice()),
			("nested/c.txt", b"charlie".as_slice()),
		])?;

	let mut builder = Builder::new(BuilderConfig::default());
	builder.add_dir(dir.path())?;
	assert_eq!(builder.len(), 2);

	let mut target = Cursor::new(Vec::new());
	builder.dump(&mut target)?;

	let archive = Archive::new(target)?;
	let names = archive.entries().iter().map(|e| e.id.as_ref()).collect::<Vec<_>>();
	assert_eq!(names, ["a.txt", "b.txt"]);
	assert_eq!(archive.fetch("b.txt")?.data.as_ref(), b"bravo");

	Ok(())
}

#[test]
#[cfg(all(feature = "archive", feature = "builder"))]
fn missing_path_source() -> InternalResult {
	let dir = tempfile::tempdir()?;
	let missing = dir.path().join("missing.bin");

	let mut leaves = [Leaf::from_path(&missing, "missing.bin"), Leaf::new(POEM, "poem.txt")];
	let mut target = Cursor::new(Vec::new());
	dump(&mut target, &mut leaves, &BuilderConfig::default())?;

	let archive = Archive::new(target)?;
	assert_eq!(archive.entries().len(), 1);
	assert!(archive.fetch_entry("missing.bin").is_none());

	let mut leaves = [Leaf::from_path(&missing, "missing.bin")];
	let result = dump(Cursor::new(Vec::new()), &mut leaves, &BuilderConfig::default().strict(true));
	assert!(matches!(result, Err(InternalError::MissingSourceError { .. })));

	Ok(())
}

#[test]
#[cfg(all(feature = "archive", feature = "builder"))]
fn name_comparison() -> InternalResult {
	let mut leaves = [Leaf::new(POEM, "Rom/Poem.TXT")];
	let mut target = Cursor::new(Vec::new());
	dump(&mut target, &mut leaves, &BuilderConfig::default())?;

	let archive = Archive::new(target)?;
	assert!(archive.fetch_entry("rom/poem.txt").is_none());

	let archive = Archive::with_config(archive.into_inner(), ArchiveConfig::default().case_insensitive())?;
	assert_eq!(archive.fetch("rom/poem.txt")?.data.as_ref(), POEM);

	Ok(())
}

#[test]
#[cfg(feature = "archive")]
fn malformed_headers() {
	let parse = |bytes: &[u8]| Archive::new(Cursor::new(bytes.to_vec()));

	assert!(matches!(parse(b"FArc\0\0"), Err(InternalError::TruncatedArchive(_))));
	assert!(matches!(parse(b"ZIP!\0\0\0\x10\0\0\0\0\0\0\0\0"), Err(InternalError::UnrecognizedFormat(_))));
	assert!(matches!(parse(b"FArc\0\0\x01\0\0\0\0\x10\0\0\0\0"), Err(InternalError::TruncatedArchive(_))));

	// A single entry claiming data far past the end of the source
	let mut bytes = b"FArc\0\0\0\x10\0\0\0\x10".to_vec();
	bytes.extend_from_slice(b"big\0\0\0\0\x20\0\0\x10\0");
	bytes.resize(0x30, 0xCC);
	assert!(matches!(parse(&bytes), Err(InternalError::EntryOutOfBounds { .. })));

	// Entry table cut in the middle of a size field
	let mut bytes = b"FArc\0\0\0\x0C\0\0\0\x10".to_vec();
	bytes.extend_from_slice(b"cut\0\0\0\0\0\0\0\0\0");
	assert!(parse(&bytes).is_err());
}

#[test]
#[cfg(all(feature = "archive", feature = "crypto"))]
fn classic_encrypted() -> InternalResult {
	use fixtures::*;

	let aligned = lorem(32);
	let entries = [
		Entry {
			name: "poem.txt",
			stored: seal_classic(POEM)?,
			compressed_size: padded_size(POEM.len()) as u32,
			original_size: POEM.len() as u32,
		},
		Entry {
			name: "aligned.bin",
			stored: seal_classic(&aligned)?,
			compressed_size: 32,
			original_size: 32,
		},
	];

	let archive = Archive::new(Cursor::new(classic(Flags::ENCRYPTED_FLAG, &entries)?))?;
	assert_eq!(archive.header().signature, Signature::Extended);
	assert_eq!(archive.header().encryption_format, EncryptionFormat::Classic);
	assert!(!archive.header().is_modern);

	assert_eq!(archive.fetch("poem.txt")?.data.as_ref(), POEM);
	assert_eq!(archive.fetch("aligned.bin")?.data.as_ref(), aligned.as_slice());

	Ok(())
}

#[test]
#[cfg(all(feature = "archive", feature = "compression", feature = "crypto"))]
fn modern_plain_compressed() -> InternalResult {
	use fixtures::*;

	let lorem = lorem(4000);
	let stored = gzip(&lorem)?;
	let entries = [Entry {
		name: "lorem.txt",
		compressed_size: stored.len() as u32,
		original_size: lorem.len() as u32,
		stored,
	}];

	let archive = Archive::new(Cursor::new(modern_plain(Flags::COMPRESSED_FLAG, &entries)?))?;
	assert!(archive.header().is_modern);
	assert_eq!(archive.header().alignment, 16);
	assert_eq!(archive.header().encryption_format, EncryptionFormat::None);

	assert_eq!(archive.fetch("lorem.txt")?.data.as_ref(), lorem.as_slice());
	Ok(())
}

#[test]
#[cfg(all(feature = "archive", feature = "crypto"))]
fn modern_encrypted_entries() -> InternalResult {
	use fixtures::*;

	let entries = [
		Entry {
			name: "poem.txt",
			stored: seal_modern(POEM)?,
			compressed_size: (16 + padded_size(POEM.len())) as u32,
			original_size: POEM.len() as u32,
		},
		Entry {
			name: "block.bin",
			stored: seal_modern(&[7u8; 16])?,
			compressed_size: 32,
			original_size: 16,
		},
	];

	let archive = Archive::new(Cursor::new(modern_encrypted(Flags::ENCRYPTED_FLAG, &entries)?))?;
	assert_eq!(archive.header().encryption_format, EncryptionFormat::Modern);
	assert_eq!(archive.header().iv, IV);
	assert_eq!(archive.header().alignment, 16);
	assert_eq!(archive.entries().len(), 2);

	assert_eq!(archive.fetch("poem.txt")?.data.as_ref(), POEM);
	assert_eq!(archive.fetch("block.bin")?.data.as_ref(), [7u8; 16].as_slice());

	Ok(())
}

#[test]
#[cfg(all(feature = "archive", feature = "compression", feature = "crypto"))]
fn modern_encrypted_compressed() -> InternalResult {
	use fixtures::*;

	let lorem = lorem(5000);
	let compressed = gzip(&lorem)?;
	let entries = [
		Entry {
			name: "lorem.txt",
			stored: seal_modern(&compressed)?,
			compressed_size: compressed.len() as u32,
			original_size: lorem.len() as u32,
		},
		Entry {
			name: "poem.txt",
			stored: seal_modern(&gzip(POEM)?)?,
			compressed_size: gzip(POEM)?.len() as u32,
			original_size: POEM.len() as u32,
		},
	];

	let flags = Flags::ENCRYPTED_FLAG | Flags::COMPRESSED_FLAG;
	let mut archive = Archive::new(Cursor::new(modern_encrypted(flags, &entries)?))?;

	assert_eq!(archive.fetch_mut("lorem.txt")?.data.as_ref(), lorem.as_slice());
	assert_eq!(archive.fetch_mut("poem.txt")?.data.as_ref(), POEM);

	Ok(())
}

#[test]
#[cfg(feature = "archive")]
fn read_into_checks_size() -> InternalResult {
	let mut bytes = b"FArc\0\0\0\x0F\0\0\0\x10".to_vec();
	bytes.extend_from_slice(b"ab\0\0\0\0\x20\0\0\0\x04\0");
	bytes.resize(0x20, 0xCC);
	bytes.extend_from_slice(b"miku");

	let archive = Archive::new(Cursor::new(bytes))?;
	let entry = archive.fetch_entry("ab").unwrap();
	assert_eq!(entry.offset, 0x20);

	let mut short = [0u8; 3];
	assert!(matches!(
		archive.read_entry_into(&entry, &mut short),
		Err(InternalError::BufferSizeMismatch { expected: 4, found: 3 })
	));

	let mut exact = [0u8; 4];
	archive.read_entry_into(&entry, &mut exact)?;
	assert_eq!(&exact, b"miku");

	Ok(())
}

#[test]
#[cfg(all(feature = "archive", feature = "builder"))]
fn tree_roundtrip() -> InternalResult {
	let dir = tempfile::tempdir()?;
	let lorem = lorem(1000);

	write_tree(
		dir.path(),
		&[
			("a.txt", b"alpha".as_slice()),
			("sub/b.bin", lorem.as_slice()),
			("sub/z.txt", b"zulu".as_slice()),
			("only_dirs/inner/c.bin", [1u8, 2, 3, 4, 5].as_slice()),
		],
	)?;
	fs::create_dir(dir.path().join("empty"))?;

	let progress = Cell::new(0);
	let callback = |_: &str, _: u64| progress.set(progress.get() + 1);

	let mut builder = TreeBuilder::new(TreeConfig::default().callback(&callback));
	builder.register_root(dir.path())?;

	let mut target = Cursor::new(Vec::new());
	let length = builder.dump(&mut target)?;

	assert_eq!(progress.get(), 4);
	assert_eq!(length, target.get_ref().len() as u64);
	assert_eq!(length % 16, 0);
	assert_eq!(&target.get_ref()[..4], &crate::COMFY_MAGIC);

	let archive = ComfyArchive::new(target)?;
	let header = archive.header();
	assert_eq!(header.data_offset, 64);
	assert!(header.flags.contains(ArchiveFlags::WIDE_ADDRESSES | ArchiveFlags::VERIFIED));
	assert!(!header.flags.contains(ArchiveFlags::ENCRYPTED_STRINGS));

	let root = archive.root();
	let root_name = dir.path().file_name().unwrap().to_string_lossy();
	assert_eq!(root.kind, EntryType::Root);
	assert_eq!(root.name.as_ref(), root_name.as_ref());
	assert_eq!(root.files.iter().map(|f| f.name.as_ref()).collect::<Vec<_>>(), ["a.txt"]);
	assert_eq!(
		root.directories.iter().map(|d| d.name.as_ref()).collect::<Vec<_>>(),
		["empty", "only_dirs", "sub"]
	);

	let empty = archive.find_directory("empty").unwrap();
	assert!(empty.files.is_empty() && empty.directories.is_empty());

	let only_dirs = archive.find_directory("only_dirs").unwrap();
	assert!(only_dirs.files.is_empty());
	assert_eq!(only_dirs.directories[0].kind, EntryType::Directory);

	let sub = archive.find_directory("sub").unwrap();
	assert_eq!(sub.files.iter().map(|f| f.name.as_ref()).collect::<Vec<_>>(), ["b.bin", "z.txt"]);

	for (_, file) in archive.files() {
		assert_eq!(file.offset % 16, 0);
		assert!(file.offset >= header.data_offset + header.data_size);
	}

	assert_eq!(archive.fetch("a.txt")?.data.as_ref(), b"alpha");
	assert_eq!(archive.fetch("sub/b.bin")?.data.as_ref(), lorem.as_slice());
	assert_eq!(archive.fetch("sub/z.txt")?.data.as_ref(), b"zulu");
	assert_eq!(archive.fetch("only_dirs/inner/c.bin")?.data.as_ref(), [1, 2, 3, 4, 5].as_slice());

	assert!(archive.find_file("sub/missing.txt").is_none());
	assert!(archive.find_file("nowhere/a.txt").is_none());
	assert!(matches!(archive.fetch("b.bin"), Err(InternalError::MissingResourceError(_))));

	Ok(())
}

#[test]
#[cfg(all(feature = "archive", feature = "builder"))]
fn tree_string_pool() -> InternalResult {
	let dir = tempfile::tempdir()?;
	write_tree(dir.path(), &[
			("left/shared_name.txt", b"left".as_slice()),
			("right/shared_name.txt", b"right".as_slice()),
		])?;

	let mut builder = TreeBuilder::new(TreeConfig::default());
	builder.register_root(dir.path())?;

	let mut target = Cursor::new(Vec::new());
	builder.dump(&mut target)?;

	let needle = b"shared_name.txt\0";
	let occurrences = target.get_ref().windows(needle.len()).filter(|w| *w == needle).count();
	assert_eq!(occurrences, 1);

	let archive = ComfyArchive::new(target)?;
	assert_eq!(archive.fetch("left/shared_name.txt")?.data.as_ref(), b"left");
	assert_eq!(archive.fetch("right/shared_name.txt")?.data.as_ref(), b"right");

	Ok(())
}

#[test]
#[cfg(all(feature = "archive", feature = "builder"))]
fn tree_encrypted_strings() -> InternalResult {
	let dir = tempfile::tempdir()?;
	write_tree(dir.path(), &[("secret_folder/secret_name.txt", POEM)])?;

	let mut builder = TreeBuilder::new(TreeConfig::default().encrypt_strings(true));
	builder.register_root(dir.path())?;

	let mut target = Cursor::new(Vec::new());
	builder.dump(&mut target)?;

	assert!(!target.get_ref().windows(6).any(|w| w == b"secret"));

	let archive = ComfyArchive::new(target)?;
	assert!(archive.header().flags.contains(ArchiveFlags::ENCRYPTED_STRINGS));
	assert_eq!(archive.fetch("secret_folder/secret_name.txt")?.data.as_ref(), POEM);

	Ok(())
}

#[test]
#[cfg(all(feature = "archive", feature = "builder"))]
fn tree_obfuscated_name_bytes() -> InternalResult {
	// U+0301 is encoded as CC 81, the lead byte obfuscates to NUL
	let accented = "e\u{0301}.txt";

	let dir = tempfile::tempdir()?;
	write_tree(dir.path(), &[(accented, POEM)])?;

	let mut builder = TreeBuilder::new(TreeConfig::default().encrypt_strings(true));
	builder.register_root(dir.path())?;

	let mut target = Cursor::new(Vec::new());
	let result = builder.dump(&mut target);
	assert!(matches!(result, Err(InternalError::InvalidIDError(ref id)) if id == accented));
	assert!(target.get_ref().is_empty());

	// Without obfuscation the same name survives untouched
	let mut builder = TreeBuilder::new(TreeConfig::default());
	builder.register_root(dir.path())?;

	let mut target = Cursor::new(Vec::new());
	builder.dump(&mut target)?;

	let archive = ComfyArchive::new(target)?;
	let names = archive.files().into_iter().map(|(path, _)| path).collect::<Vec<_>>();
	assert_eq!(names, vec![accented.to_string()]);
	assert_eq!(archive.fetch(accented)?.data.as_ref(), POEM);

	Ok(())
}

#[cfg(feature = "builder")]
fn directory_chain(levels: usize) -> DirectoryNode {
	let link = |level: usize, children: Vec<TreeNode>| DirectoryNode {
		kind: EntryType::Directory,
		name: format!("d{}", level),
		flags: EntryFlags::from_bits(EntryFlags::VERIFIED),
		children,
	};

	(1..levels).rev().fold(link(levels, Vec::new()), |inner, level| {
		link(level, vec![TreeNode::Directory(inner)])
	})
}

#[test]
#[cfg(all(feature = "archive", feature = "builder"))]
fn tree_depth_limit() -> InternalResult {
	let mut builder = TreeBuilder::new(TreeConfig::default());
	builder.root_mut().children.push(TreeNode::Directory(directory_chain(MAX_DIRECTORY_DEPTH)));

	let mut target = Cursor::new(Vec::new());
	builder.dump(&mut target)?;

	let archive = ComfyArchive::new(target)?;
	let deepest = (1..=MAX_DIRECTORY_DEPTH).map(|level| format!("d{}", level)).collect::<Vec<_>>().join("/");
	assert!(archive.find_directory(&deepest).is_some());

	// One level more would no longer mount, so it is never written
	let mut builder = TreeBuilder::new(TreeConfig::default());
	builder.root_mut().children.push(TreeNode::Directory(directory_chain(MAX_DIRECTORY_DEPTH + 1)));

	let mut target = Cursor::new(Vec::new());
	assert!(matches!(
		builder.dump(&mut target),
		Err(InternalError::DirectoryDepthError(_))
	));
	assert!(target.get_ref().is_empty());

	Ok(())
}

#[test]
#[cfg(all(feature = "archive", feature = "builder"))]
fn tree_missing_source() -> InternalResult {
	let dir = tempfile::tempdir()?;
	write_tree(dir.path(), &[("gone.txt", b"soon gone".as_slice()), ("kept.txt", b"kept".as_slice())])?;

	let mut builder = TreeBuilder::new(TreeConfig::default());
	builder.register_root(dir.path())?;
	fs::remove_file(dir.path().join("gone.txt"))?;

	let mut target = Cursor::new(Vec::new());
	builder.dump(&mut target)?;

	let archive = ComfyArchive::new(target)?;
	assert_eq!(archive.find_file("gone.txt").unwrap().size, 0);
	assert_eq!(archive.fetch("kept.txt")?.data.as_ref(), b"kept");

	let mut strict = TreeBuilder::new(TreeConfig::default().strict(true));
	strict.register_root(dir.path())?;
	fs::remove_file(dir.path().join("kept.txt"))?;

	let result = strict.dump(Cursor::new(Vec::new()));
	assert!(matches!(result, Err(InternalError::MissingSourceError { .. })));

	Ok(())
}

#[test]
#[cfg(feature = "archive")]
fn comfy_rejects_garbage() {
	let parse = |bytes: Vec<u8>| ComfyArchive::new(Cursor::new(bytes));

	assert!(matches!(parse(vec![0u8; 16]), Err(InternalError::TruncatedArchive(_))));
	assert!(matches!(parse(vec![0u8; 64]), Err(InternalError::UnrecognizedFormat(_))));

	let mut header = ComfyHeader {
		major: crate::COMFY_VERSION_MAJOR + 1,
		minor: 0,
		creation_date: 0,
		flags: ArchiveFlags::default(),
		iv: [0; 16],
		data_size: 0,
		data_offset: 64,
	};
	assert!(matches!(
		parse(header.to_bytes().to_vec()),
		Err(InternalError::IncompatibleArchiveVersionError(_))
	));

	// Record region running past the end of the source
	header.major = crate::COMFY_VERSION_MAJOR;
	header.data_size = 0x100;
	assert!(matches!(parse(header.to_bytes().to_vec()), Err(InternalError::TruncatedArchive(_))));

	// Root record with a file tag
	header.data_size = 48;
	let mut bytes = header.to_bytes().to_vec();
	bytes.extend_from_slice(&EntryType::File.tag().to_le_bytes());
	bytes.resize(64 + 48, 0);
	assert!(matches!(parse(bytes), Err(InternalError::CorruptArchive(_))));
}

// Flat header with the given magic, every entry's data is stored as is
#[cfg(feature = "archive")]
fn flat_archive(magic: &[u8; 4], alignment: u32, entries: &[(&str, &[u8], u32)]) -> InternalResult<Vec<u8>> {
	let with_original = magic != b"FArc";
	let per_entry = if with_original { 12 } else { 8 };
	let table_end = 12 + entries.iter().map(|(name, ..)| name.len() + 1 + per_entry).sum::<usize>();

	let align = |position: usize| (position + alignment as usize - 1) / alignment as usize * alignment as usize;

	let mut archive = Vec::new();
	archive.write_all(magic)?;
	archive.write_u32::<BigEndian>(table_end as u32 - 8)?;
	archive.write_u32::<BigEndian>(alignment)?;

	let mut offset = align(table_end);
	for (name, data, original_size) in entries {
		archive.write_all(name.as_bytes())?;
		archive.write_u8(0)?;
		archive.write_u32::<BigEndian>(offset as u32)?;
		archive.write_u32::<BigEndian>(data.len() as u32)?;

		if with_original {
			archive.write_u32::<BigEndian>(*original_size)?;
		}

		offset = align(offset + data.len());
	}

	for (_, data, _) in entries {
		archive.resize(align(archive.len()), crate::PADDING_VALUE);
		archive.extend_from_slice(data);
	}

	archive.resize(align(archive.len()), crate::PADDING_VALUE);
	Ok(archive)
}

// xorshift, enough to produce incompressible test data without extra dependencies
fn noise(len: usize, mut state: u64) -> Vec<u8> {
	(0..len)
		.map(|_| {
			state ^= state << 13;
			state ^= state >> 7;
			state ^= state << 17;
			(state >> 24) as u8
		})
		.collect()
}

#[test]
#[cfg(feature = "archive")]
fn property_scenario() -> InternalResult {
	let content = b"volume=0.85\nsubtitles=off\nlang=jp-JP\n";
	assert_eq!(content.len(), 37);

	let bytes = flat_archive(b"FArc", 16, &[("property.txt", content.as_slice(), 37)])?;
	let archive = Archive::new(Cursor::new(bytes))?;

	let entry = archive.find_entry("property.txt").unwrap();
	assert_eq!((entry.compressed_size, entry.original_size), (37, 37));
	assert_eq!(archive.fetch("property.txt")?.data.as_ref(), content.as_slice());

	// Lookups are case sensitive unless configured otherwise
	assert!(archive.find_entry("PROPERTY.TXT").is_none());

	let archive = Archive::with_config(archive.into_inner(), ArchiveConfig::default().case_insensitive())?;
	assert_eq!(archive.fetch("PROPERTY.TXT")?.data.as_ref(), content.as_slice());

	let first_letter = NameComparison::Custom(|stored, key| stored.chars().next() == key.chars().next());
	let archive = Archive::with_config(archive.into_inner(), ArchiveConfig::default().name_comparison(first_letter))?;
	assert_eq!(archive.find_entry("pineapple").unwrap().id.as_ref(), "property.txt");

	Ok(())
}

#[test]
#[cfg(feature = "archive")]
fn flat_signatures() -> InternalResult {
	let archive = Archive::new(Cursor::new(flat_archive(b"FArc", 32, &[("a", b"abc".as_slice(), 3)])?))?;
	assert_eq!(archive.header().signature, Signature::UnCompressed);
	assert_eq!(archive.header().alignment, 32);
	assert!(!archive.header().is_modern);
	assert_eq!(archive.flags().bits(), 0);

	let archive = Archive::new(Cursor::new(flat_archive(b"FARc", 16, &[("a", b"abc".as_slice(), 3)])?))?;
	assert_eq!(archive.header().signature, Signature::Reserved);
	assert_eq!(archive.flags().bits(), 0);
	assert_eq!(archive.fetch("a")?.data.as_ref(), b"abc");

	#[cfg(feature = "compression")]
	{
		let compressed = gzip(POEM)?;
		let bytes = flat_archive(b"FArC", 16, &[("poem.txt", &compressed, POEM.len() as u32)])?;

		let archive = Archive::new(Cursor::new(bytes))?;
		assert_eq!(archive.header().signature, Signature::Compressed);
		assert!(archive.flags().contains(Flags::COMPRESSED_FLAG));
		assert_eq!(archive.fetch("poem.txt")?.data.as_ref(), POEM);
	}

	Ok(())
}

#[test]
#[cfg(feature = "archive")]
fn flat_bounds_rejection() -> InternalResult {
	for magic in [b"FArc", b"FArC", b"FARc"] {
		let mut bytes = flat_archive(magic, 16, &[("big.bin", [0u8; 8].as_slice(), 8)])?;

		// Drop the last data byte
		bytes.truncate(bytes.len() - 16 + 7);
		assert!(
			matches!(Archive::new(Cursor::new(bytes)), Err(InternalError::EntryOutOfBounds { .. })),
			"{:?}",
			magic
		);
	}

	Ok(())
}

#[test]
#[cfg(all(feature = "archive", feature = "crypto"))]
fn extended_bounds_rejection() -> InternalResult {
	use fixtures::*;

	let oversized = || {
		[Entry {
			name: "big.bin",
			stored: vec![0u8; 32],
			compressed_size: 0x10_0000,
			original_size: 32,
		}]
	};

	let variants = [
		classic(0, &oversized())?,
		modern_plain(0, &oversized())?,
		modern_encrypted(Flags::ENCRYPTED_FLAG, &oversized())?,
	];

	for bytes in variants {
		assert!(matches!(
			Archive::new(Cursor::new(bytes)),
			Err(InternalError::EntryOutOfBounds { .. })
		));
	}

	// A modern table announcing more entries than it holds
	let entries = [Entry {
		name: "small.bin",
		stored: vec![0u8; 32],
		compressed_size: 32,
		original_size: 32,
	}];

	let mut bytes = modern_plain(0, &entries)?;
	bytes[24..28].copy_from_slice(&2u32.to_be_bytes());
	assert!(matches!(Archive::new(Cursor::new(bytes)), Err(InternalError::CorruptArchive(_))));

	Ok(())
}

#[test]
#[cfg(all(feature = "archive", feature = "crypto"))]
fn plain_extended_header() -> InternalResult {
	use fixtures::*;

	let entries = [Entry {
		name: "plain.txt",
		stored: POEM.to_vec(),
		compressed_size: POEM.len() as u32,
		original_size: POEM.len() as u32,
	}];

	let archive = Archive::new(Cursor::new(classic(0, &entries)?))?;
	assert_eq!(archive.header().signature, Signature::Extended);
	assert_eq!(archive.header().encryption_format, EncryptionFormat::None);
	assert_eq!(archive.header().alignment, 16);
	assert!(!archive.header().is_modern);
	assert_eq!(archive.fetch("plain.txt")?.data.as_ref(), POEM);

	Ok(())
}

#[test]
#[cfg(all(feature = "archive", feature = "crypto", feature = "compression"))]
fn classic_encrypted_compressed() -> InternalResult {
	use fixtures::*;

	let lorem = lorem(2500);
	let compressed = gzip(&lorem)?;
	let entries = [Entry {
		name: "lorem.txt",
		stored: seal_classic(&compressed)?,
		compressed_size: compressed.len() as u32,
		original_size: lorem.len() as u32,
	}];

	let flags = Flags::ENCRYPTED_FLAG | Flags::COMPRESSED_FLAG;
	let archive = Archive::new(Cursor::new(classic(flags, &entries)?))?;
	assert_eq!(archive.header().encryption_format, EncryptionFormat::Classic);
	assert_eq!(archive.fetch("lorem.txt")?.data.as_ref(), lorem.as_slice());

	Ok(())
}

#[test]
#[cfg(feature = "crypto")]
fn cipher_inverse() -> InternalResult {
	use crate::crypto::*;

	let iv = [0x42u8; IV_SIZE];

	for size in [16, 32, 256, 4096] {
		let plain = noise(size, size as u64);

		let mut ecb = plain.clone();
		encrypt_ecb(&mut ecb, &CLASSIC_KEY)?;
		assert_ne!(ecb, plain);
		decrypt_ecb(&mut ecb, &CLASSIC_KEY)?;
		assert_eq!(ecb, plain);

		let mut cbc = plain.clone();
		encrypt_cbc(&mut cbc, &MODERN_KEY, &iv)?;
		assert_ne!(cbc, plain);
		decrypt_cbc(&mut cbc, &MODERN_KEY, &iv)?;
		assert_eq!(cbc, plain);
	}

	let mut ragged = [0u8; 17];
	assert!(matches!(decrypt_ecb(&mut ragged, &CLASSIC_KEY), Err(InternalError::CryptoError(_))));
	assert!(matches!(
		decrypt_cbc(&mut ragged, &MODERN_KEY, &iv),
		Err(InternalError::CryptoError(_))
	));

	Ok(())
}

#[test]
#[cfg(feature = "compression")]
fn compression_roundtrip() -> InternalResult {
	let inputs = [
		Vec::new(),
		vec![0x39; crate::CHUNK_SIZE * 3 + 1],
		noise(crate::CHUNK_SIZE + 7, 0x5EED),
		lorem(4 * 1024 * 1024),
	];

	for input in inputs {
		let mut compressed = Vec::new();
		let report = Compressor::new(input.as_slice()).compress(&mut compressed)?;

		assert_eq!(report.original_size, input.len() as u64);
		assert_eq!(report.compressed_size, compressed.len() as u64);
		assert_eq!(&compressed[..2], &[0x1F, 0x8B]);

		let mut output = vec![0u8; input.len()];
		Compressor::new(compressed.as_slice()).decompress(&mut output)?;
		assert_eq!(output, input);
	}

	Ok(())
}

#[test]
#[cfg(feature = "compression")]
fn checksum_tolerance() -> InternalResult {
	let mut compressed = gzip(POEM)?;

	// Corrupt the CRC32 of the gzip trailer, then pad the member like an aligned archive would
	let crc = compressed.len() - 8;
	compressed[crc] ^= 0xFF;
	compressed.extend_from_slice(&[crate::PADDING_VALUE; 11]);

	let mut output = vec![0u8; POEM.len()];
	Compressor::new(compressed.as_slice()).decompress(&mut output)?;
	assert_eq!(output.as_slice(), POEM);

	// Running out of data before the output is full is still an error
	let truncated = &compressed[..compressed.len() / 2];
	let mut output = vec![0u8; POEM.len()];
	assert!(matches!(
		Compressor::new(truncated).decompress(&mut output),
		Err(InternalError::DeCompressionError(_))
	));

	Ok(())
}

#[test]
#[cfg(feature = "builder")]
fn stream_writer_pools() -> InternalResult {
	use crate::endian::Endianness;

	let mut writer = StreamWriter::new(Cursor::new(Vec::new()), Endianness::Big, PointerWidth::Bits32);

	// 0x00: pointer to an outer block, which itself queues a pointer to an inner block
	writer.write_func_ptr(0, |w| {
		w.write_u32(0xAAAA_AAAA)?;
		w.write_func_ptr(0, |w| w.write_u32(0xBBBB_BBBB))
	})?;
	// 0x04: relative pointer, resolved against base 4
	writer.write_func_ptr(4, |w| w.write_u32(0xCCCC_CCCC))?;
	// 0x08: delayed value
	writer.write_delayed(|w| w.write_u32(0x1234_5678))?;
	// 0x0C, 0x10, 0x14: strings, the third repeats the first
	writer.write_str_ptr("miku")?;
	writer.write_str_ptr("rin")?;
	writer.write_str_ptr("miku")?;

	writer.flush_pointer_pool()?;
	writer.flush_delayed_pool()?;
	writer.flush_string_pool()?;

	let bytes = writer.into_inner().into_inner();
	let word = |at: usize| u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);

	// outer block at 0x18, the relative block follows it, the inner block is queued last
	assert_eq!(word(0x00), 0x18);
	assert_eq!(word(0x18), 0xAAAA_AAAA);
	assert_eq!(word(0x1C), 0x24);
	assert_eq!(word(0x04), 0x20 - 4);
	assert_eq!(word(0x20), 0xCCCC_CCCC);
	assert_eq!(word(0x24), 0xBBBB_BBBB);
	assert_eq!(word(0x08), 0x1234_5678);

	assert_eq!(word(0x0C), 0x28);
	assert_eq!(word(0x10), 0x2D);
	assert_eq!(word(0x14), 0x28);
	assert_eq!(&bytes[0x28..], b"miku\0rin\0");

	Ok(())
}

#[test]
#[cfg(feature = "builder")]
fn stream_writer_alignment() -> InternalResult {
	use crate::endian::Endianness;

	let mut writer = StreamWriter::new(Cursor::new(Vec::new()), Endianness::Little, PointerWidth::Bits64);
	writer.write_u8(1)?;
	writer.write_alignment_padding(16)?;
	assert_eq!(writer.position()?, 16);

	writer.write_alignment_padding(16)?;
	assert_eq!(writer.position()?, 16);

	writer.write_ptr(u64::MAX)?;
	assert_eq!(writer.position()?, 24);

	let bytes = writer.into_inner().into_inner();
	assert!(bytes[1..16].iter().all(|b| *b == crate::PADDING_VALUE));

	let mut narrow = StreamWriter::new(Cursor::new(Vec::new()), Endianness::Big, PointerWidth::Bits32);
	assert!(narrow.write_ptr(u32::MAX as u64 + 1).is_err());

	Ok(())
}
