use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
	str::FromStr,
	thread,
	time::Instant,
};

use farc::prelude::*;
use indicatif::{ProgressBar, ProgressStyle};

use super::{CommandTrait, Opened};
use crate::keys::key_names;

pub const VERSION: &str = "0.1.0";

/// This command extracts an archive into the specified output folder
pub struct Evaluator;

impl CommandTrait for Evaluator {
	fn evaluate(&self, args: &clap::ArgMatches) -> anyhow::Result<()> {
		let input_path = match args.value_of(key_names::INPUT) {
			Some(path) => path,
			None => anyhow::bail!("Please provide an input path using the -i or --input key"),
		};

		let output_path = match args.value_of(key_names::OUTPUT) {
			Some(path) => PathBuf::from_str(path)?,
			None => Default::default(),
		};

		if output_path.is_file() {
			anyhow::bail!("Please provide a directory|folder path as the value of -o | --output")
		};

		let num_threads = args
			.value_of(key_names::JOBS)
			.and_then(|v| v.parse::<usize>().ok())
			.filter(|s| *s > 0)
			.unwrap_or_else(num_cpus::get);

		match super::open_archive(input_path, super::lookup_config(args))? {
			Opened::Flat(archive) => {
				let entries = archive
					.entries()
					.iter()
					.map(|entry| (entry.id.to_string(), entry.original_size))
					.collect::<Vec<_>>();

				extract(&entries, &|id: &str| archive.fetch(id), num_threads, output_path)
			},
			Opened::Comfy(archive) => {
				let entries = archive
					.files()
					.into_iter()
					.map(|(path, file)| (path, file.size))
					.collect::<Vec<_>>();

				extract(&entries, &|id: &str| archive.fetch(id), num_threads, output_path)
			},
		}
	}
}

// Maps an entry name onto the output folder, dropping components that would escape it
fn save_path(target_folder: &Path, id: &str) -> PathBuf {
	let mut path = target_folder.to_path_buf();
	id.split(['/', '\\'])
		.filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
		.for_each(|segment| path.push(segment));

	path
}

fn extract(
	entries: &[(String, u64)], fetch: &(dyn Fn(&str) -> InternalResult<Resource> + Sync), jobs: usize, target_folder: PathBuf,
) -> anyhow::Result<()> {
	// For measuring the time difference
	let time = Instant::now();
	fs::create_dir_all(&target_folder)?;

	let total_size = entries.iter().map(|(_, size)| *size).sum();
	let pbar = ProgressBar::new(total_size);

	pbar.set_style(
		ProgressStyle::default_bar()
			.template(super::PROGRESS_BAR_STYLE)?
			.progress_chars("█░-"),
	);

	// Extract all entries in parallel
	let chunk_size = ((entries.len() + jobs - 1) / jobs).max(1);

	thread::scope(|s| -> anyhow::Result<()> {
		let handles = entries
			.chunks(chunk_size)
			.map(|chunk| {
				let pbar = pbar.clone();
				let target_folder = target_folder.clone();

				s.spawn(move || -> anyhow::Result<()> {
					for (id, size) in chunk {
						// Set's the Progress Bar message
						pbar.set_message(id.to_string());

						// Process filesystem
						let save_path = save_path(&target_folder, id);
						if let Some(parent_dir) = save_path.parent() {
							fs::create_dir_all(parent_dir)?;
						};

						// Write to file and update process queue
						let resource = fetch(id)?;
						let mut file = File::create(save_path)?;
						file.write_all(&resource.data)?;

						// Increment Progress Bar
						pbar.inc(*size);
					}

					Ok(())
				})
			})
			.collect::<Vec<_>>();

		for handle in handles {
			match handle.join() {
				Ok(result) => result?,
				Err(_) => anyhow::bail!("An extraction thread panicked"),
			}
		}

		Ok(())
	})?;

	// Finished extracting
	pbar.finish();
	println!(
		"Extracted {} files in {}s",
		entries.len(),
		time.elapsed().as_secs_f64()
	);

	Ok(())
}
