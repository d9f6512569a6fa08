use std::path::PathBuf;

use tempfile::NamedTempFile;
use farc::prelude::*;
use indicatif::{ProgressBar, ProgressStyle};
use walkdir::WalkDir;

use super::CommandTrait;
use crate::keys::key_names;

pub const VERSION: &str = "0.1.0";

/// This command builds a Comfy Archive mirroring a directory tree
pub struct Evaluator;

impl CommandTrait for Evaluator {
	fn evaluate(&self, args: &clap::ArgMatches) -> anyhow::Result<()> {
		let input_path = match args.value_of(key_names::INPUT) {
			Some(path) => PathBuf::from(path),
			None => anyhow::bail!("Please provide the root directory using the -i or --input key"),
		};

		if !input_path.is_dir() {
			anyhow::bail!("{} is not a directory", input_path.display())
		}

		let output_path = match args.value_of(key_names::OUTPUT) {
			Some(path) => PathBuf::from(path),
			None => anyhow::bail!("Please provide an output path using the -o or --output key"),
		};

		// Only used to size the progress bar
		let file_count = WalkDir::new(&input_path)
			.into_iter()
			.filter_map(Result::ok)
			.filter(|entry| entry.file_type().is_file())
			.count();

		let progress = ProgressBar::new(file_count as u64);
		progress.set_style(
			ProgressStyle::default_bar()
				.template(super::PROGRESS_BAR_STYLE)?
				.progress_chars("█░-"),
		);

		let callback = |path: &str, _: u64| {
			progress.inc(1);
			progress.set_message(path.to_string());
		};

		let config = TreeConfig::default()
			.encrypt_strings(args.is_present(key_names::ENCRYPT_STRINGS))
			.strict(args.is_present(key_names::STRICT))
			.callback(&callback);

		let mut builder = TreeBuilder::new(config);
		builder.register_root(&input_path)?;

		let parent = match output_path.parent() {
			Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
			_ => PathBuf::from("."),
		};

		let mut temporary_file = NamedTempFile::new_in(parent)?;
		let bytes_written = builder.dump(&mut temporary_file)?;
		temporary_file.persist(&output_path)?;

		progress.finish();
		println!(
			"Generated a new comfy archive @ {}; Bytes written: {}",
			output_path.display(),
			bytes_written
		);

		Ok(())
	}
}
