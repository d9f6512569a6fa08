use tabled::{
	Table, Tabled,
	settings::{*, object::Columns},
};
use farc::prelude::ArchiveConfig;
use indicatif::HumanBytes;

use super::{CommandTrait, Opened};
use crate::keys::key_names;

pub const VERSION: &str = "0.1.0";

/// This command lists the entries in an archive in tabulated form
pub struct Evaluator;

impl CommandTrait for Evaluator {
	fn evaluate(&self, args: &clap::ArgMatches) -> anyhow::Result<()> {
		let archive_path = match args.value_of(key_names::INPUT) {
			Some(path) => path,
			None => {
				anyhow::bail!("Please provide an input archive file using the -i or --input keys!")
			},
		};

		let mut rows = match super::open_archive(archive_path, ArchiveConfig::default())? {
			Opened::Flat(archive) => {
				// log basic metadata
				println!("{}", archive);

				archive
					.entries()
					.iter()
					.map(|entry| Row {
						name: entry.id.to_string(),
						size: entry.original_size,
						stored: entry.compressed_size,
						offset: entry.offset,
					})
					.collect::<Vec<_>>()
			},
			Opened::Comfy(archive) => {
				println!("{}", archive);

				archive
					.files()
					.into_iter()
					.map(|(path, file)| Row {
						name: path,
						size: file.size,
						stored: file.size,
						offset: file.offset,
					})
					.collect::<Vec<_>>()
			},
		};

		// Sort the entries accordingly
		match args.value_of(key_names::SORT) {
			Some("alphabetical") => rows.sort_by(|a, b| a.name.cmp(&b.name)),
			Some("alphabetical-reversed") => rows.sort_by(|a, b| b.name.cmp(&a.name)),
			Some("size-ascending") => rows.sort_by(|a, b| a.size.cmp(&b.size)),
			Some("size-descending") => rows.sort_by(|a, b| b.size.cmp(&a.size)),
			Some(sort) => anyhow::bail!("Unknown sort option provided: {}. Valid sort types are: 'alphabetical' 'alphabetical-reversed' 'size-ascending' 'size-descending'", sort),
			_ => (),
		};

		let table_entries: Vec<FileTableEntry> = rows
			.iter()
			.map(|row| FileTableEntry {
				name: &row.name,
				size: HumanBytes(row.size).to_string(),
				stored: HumanBytes(row.stored).to_string(),
				offset: format!("{:#x}", row.offset),
			})
			.collect();

		let mut table = Table::new(table_entries);
		table
			.with(Style::rounded())
			.with(Modify::list(Columns::new(..1), Alignment::left()));

		println!("{}", table);

		Ok(())
	}
}

struct Row {
	name: String,
	size: u64,
	stored: u64,
	offset: u64,
}

#[derive(Tabled)]
struct FileTableEntry<'a> {
	name: &'a str,
	size: String,
	stored: String,
	offset: String,
}
