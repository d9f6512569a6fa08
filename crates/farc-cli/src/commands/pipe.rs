use std::io::{self, Write};

use super::{CommandTrait, Opened};
use crate::keys::key_names;

pub const VERSION: &str = "0.1.0";

/// This command writes the bytes of a single resource to stdout
pub struct Evaluator;

impl CommandTrait for Evaluator {
	fn evaluate(&self, args: &clap::ArgMatches) -> anyhow::Result<()> {
		let input_path = match args.value_of(key_names::INPUT) {
			Some(path) => path,
			None => anyhow::bail!("Please provide an input path using the -i or --input key"),
		};

		let resource = match args.value_of(key_names::RESOURCE) {
			Some(resource) => resource,
			None => anyhow::bail!("Please provide a resource to extract using the -r or --resource key"),
		};

		let resource = match super::open_archive(input_path, super::lookup_config(args))? {
			Opened::Flat(mut archive) => archive.fetch_mut(resource)?,
			Opened::Comfy(mut archive) => archive.fetch_mut(resource)?,
		};

		let stdout = io::stdout();
		{
			let mut handle = stdout.lock();
			handle.write_all(&resource.data)?;
			handle.flush()?;
		}

		Ok(())
	}
}
