use std::{
	collections::HashMap,
	fs::File,
	io::{BufReader, Read},
	path::Path,
};

use clap::ArgMatches;
use anyhow::Result;
use farc::prelude::{Archive, ArchiveConfig, ComfyArchive};

use crate::keys::key_names;

// A common progress bar style for all commands
const PROGRESS_BAR_STYLE: &str = "{wide_bar} {pos:>7}/{len:7} ETA {eta_precise}";

// Trait that must be implemented by all subcommands
pub trait CommandTrait: Sync {
	fn evaluate(&self, args: &ArgMatches) -> Result<()>;
}

// All sub-commands are defined in the below modules
pub mod build;
pub mod list;
pub mod pack;
pub mod pipe;
pub mod unpack;

pub fn build_commands() -> HashMap<&'static str, Box<dyn CommandTrait>> {
	let mut map: HashMap<&'static str, Box<dyn CommandTrait>> = HashMap::new();

	map.insert("list", Box::new(list::Evaluator));
	map.insert("unpack", Box::new(unpack::Evaluator));
	map.insert("pipe", Box::new(pipe::Evaluator));
	map.insert("pack", Box::new(pack::Evaluator));
	map.insert("build", Box::new(build::Evaluator));

	map
}

/// Either archive family, picked by the magic of the source
pub enum Opened {
	Flat(Archive<BufReader<File>>),
	Comfy(ComfyArchive<BufReader<File>>),
}

/// Lookup settings of the commands that accept `--ignore-case`
pub fn lookup_config(args: &ArgMatches) -> ArchiveConfig {
	if args.is_present(key_names::IGNORE_CASE) {
		ArchiveConfig::default().case_insensitive()
	} else {
		ArchiveConfig::default()
	}
}

pub fn open_archive(path: impl AsRef<Path>, config: ArchiveConfig) -> Result<Opened> {
	let path = path.as_ref();

	let mut magic = [0u8; 4];
	File::open(path)?.read_exact(&mut magic)?;

	let handle = BufReader::new(File::open(path)?);
	let opened = if magic == farc::COMFY_MAGIC {
		Opened::Comfy(ComfyArchive::with_config(handle, config)?)
	} else {
		Opened::Flat(Archive::with_config(handle, config)?)
	};

	Ok(opened)
}
