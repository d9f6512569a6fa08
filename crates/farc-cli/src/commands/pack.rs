use std::{
	collections::HashSet,
	fs,
	path::{Path, PathBuf},
};

use tempfile::NamedTempFile;
use farc::prelude::*;
use indicatif::{ProgressBar, ProgressStyle};
use walkdir::WalkDir;

use super::CommandTrait;
use crate::keys::key_names;

pub const VERSION: &str = "0.1.0";

// The ID of a file found under `root`, always `/` separated
fn relative_id(root: &Path, path: &Path) -> String {
	let relative = path.strip_prefix(root).unwrap_or(path);
	relative
		.iter()
		.map(|segment| segment.to_string_lossy())
		.collect::<Vec<_>>()
		.join("/")
}

/// This command packs files into a flat `FArc` or `FArC` archive
pub struct Evaluator;

impl CommandTrait for Evaluator {
	fn evaluate(&self, args: &clap::ArgMatches) -> anyhow::Result<()> {
		// Prepare output file
		let output_path = match args.value_of(key_names::OUTPUT) {
			Some(path) => PathBuf::from(path),
			None => anyhow::bail!("Please provide an output path using the -o or --output key"),
		};

		// Extract entries to be excluded
		let excludes = match args.values_of(key_names::EXCLUDE) {
			Some(val) => val
				.filter_map(|f| {
					let path = PathBuf::from(f);

					match path.canonicalize() {
						Ok(path) => Some(path),
						Err(err) => {
							log::warn!("Failed to evaluate: {}. Skipping due to error: {}", path.display(), err);
							None
						},
					}
				})
				.collect::<HashSet<PathBuf>>(),
			None => HashSet::new(),
		};

		// Used to filter invalid inputs and excluded inputs
		let path_filter = |path: &Path| match path.canonicalize() {
			Ok(canonical) => !excludes.contains(&canonical) && canonical.is_file(),
			Err(err) => {
				log::warn!("Failed to evaluate: {}. Skipping due to error: {}", path.display(), err);
				false
			},
		};

		// Extract the inputs, as (source, id) pairs
		let mut inputs: Vec<(PathBuf, String)> = vec![];

		if let Some(val) = args.values_of(key_names::INPUT) {
			val.map(PathBuf::from).filter(|f| path_filter(f)).for_each(|p| {
				let id = p
					.file_name()
					.map(|name| name.to_string_lossy().into_owned())
					.unwrap_or_else(|| p.to_string_lossy().into_owned());
				inputs.push((p, id))
			});
		};

		// Extract directory inputs, and recursive directory inputs
		let directories = args
			.values_of(key_names::DIR_INPUT)
			.into_iter()
			.flatten()
			.map(|dir| (dir, 1))
			.chain(
				args.values_of(key_names::DIR_INPUT_REC)
					.into_iter()
					.flatten()
					.map(|dir| (dir, usize::MAX)),
			);

		for (dir, depth) in directories {
			let root = PathBuf::from(dir);

			for entry in WalkDir::new(&root).max_depth(depth).sort_by_file_name() {
				let path = entry?.into_path();
				if path_filter(&path) {
					let id = relative_id(&root, &path);
					inputs.push((path, id));
				}
			}
		}

		// Read valueless flags
		let compress = args.is_present(key_names::COMPRESS);
		let strict = args.is_present(key_names::STRICT);
		let truncate = args.is_present(key_names::TRUNCATE);

		let alignment = match args.value_of(key_names::ALIGNMENT) {
			Some(alignment) => alignment.parse::<u32>()?,
			None => farc::DEFAULT_ALIGNMENT,
		};

		let progress = ProgressBar::new(inputs.len() as u64 + 5 + if truncate { 3 } else { 0 });
		progress.set_style(
			ProgressStyle::default_bar()
				.template(super::PROGRESS_BAR_STYLE)?
				.progress_chars("█░-"),
		);

		// Since it wraps it's internal state in an arc, we can safely clone and send across threads
		let callback = |entry: &RegistryEntry| {
			progress.inc(1);
			progress.set_message(entry.id.to_string());
		};

		let config = BuilderConfig::default()
			.alignment(alignment)
			.compress(compress)
			.strict(strict)
			.callback(&callback);

		// Construct the builder
		let mut builder = Builder::new(config);
		for (path, id) in &inputs {
			builder.add_leaf(Leaf::from_path(path, id))?;
		}

		// Inform of success in input queue
		progress.inc(2);

		let parent = match output_path.parent() {
			Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
			_ => PathBuf::from("."),
		};

		let mut temporary_file = NamedTempFile::new_in(parent)?;
		let bytes_written = builder.dump(&mut temporary_file)?;
		temporary_file.persist(&output_path)?;

		progress.println(format!(
			"Generated a new archive @ {}; Bytes written: {}",
			output_path.display(),
			bytes_written
		));

		// Truncate original files
		if truncate {
			for (path, _) in inputs {
				fs::remove_file(&path)?;
				progress.println(format!("Truncated original file @ {}", path.display()));
			}

			progress.inc(3);
		};

		progress.inc(3);
		progress.finish();

		Ok(())
	}
}
