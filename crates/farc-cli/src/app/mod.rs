use std::collections::HashMap;
use clap::{Command, Arg};

use crate::keys::key_names;
use crate::commands;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn build_app<'a>(key_map: HashMap<&'static str, Arg<'a>>) -> Command<'a> {
	Command::new("farc")
		.about("A command-line interface for reading and writing FArc and Comfy Archive files")
		.version(self::VERSION)
		.subcommand(
			Command::new("list")
				.version(commands::list::VERSION)
				.about("Lists all the entries in an archive and their metadata")
				.arg(key_map.get(key_names::INPUT).unwrap())
				.arg(key_map.get(key_names::SORT).unwrap()),
		)
		.subcommand(
			Command::new("unpack")
				.version(commands::unpack::VERSION)
				.about("Unpacks an archive")
				// Files
				.arg(key_map.get(key_names::OUTPUT).unwrap())
				.arg(key_map.get(key_names::INPUT).unwrap())
				// modifiers
				.arg(key_map.get(key_names::JOBS).unwrap())
				.arg(key_map.get(key_names::IGNORE_CASE).unwrap()),
		)
		.subcommand(
			Command::new("pipe")
				.version(commands::pipe::VERSION)
				.about("Pipes a Resource from an archive to stdout")
				.arg(key_map.get(key_names::INPUT).unwrap())
				.arg(key_map.get(key_names::RESOURCE).unwrap())
				.arg(key_map.get(key_names::IGNORE_CASE).unwrap()),
		)
		.subcommand(
			Command::new("pack")
				.version(commands::pack::VERSION)
				.about("Packages all input files into a flat FArc archive")
				// Output file
				.arg(key_map.get(key_names::OUTPUT).unwrap())
				// Data sources
				.arg(key_map.get(key_names::INPUT).unwrap())
				.arg(key_map.get(key_names::DIR_INPUT).unwrap())
				.arg(key_map.get(key_names::DIR_INPUT_REC).unwrap())
				.arg(key_map.get(key_names::EXCLUDE).unwrap())
				// Modifiers
				.arg(key_map.get(key_names::COMPRESS).unwrap())
				.arg(key_map.get(key_names::ALIGNMENT).unwrap())
				.arg(key_map.get(key_names::STRICT).unwrap())
				.arg(key_map.get(key_names::TRUNCATE).unwrap()),
		)
		.subcommand(
			Command::new("build")
				.version(commands::build::VERSION)
				.about("Builds a Comfy Archive from a directory tree")
				.arg(key_map.get(key_names::INPUT).unwrap())
				.arg(key_map.get(key_names::OUTPUT).unwrap())
				.arg(key_map.get(key_names::ENCRYPT_STRINGS).unwrap())
				.arg(key_map.get(key_names::STRICT).unwrap()),
		)
}
