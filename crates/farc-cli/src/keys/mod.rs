use clap::Arg;
use std::collections::HashMap;

pub mod key_names {
	pub(crate) const JOBS: &str = "JOBS";

	pub(crate) const OUTPUT: &str = "OUTPUT";
	pub(crate) const INPUT: &str = "INPUT";
	pub(crate) const RESOURCE: &str = "RESOURCE";

	pub(crate) const DIR_INPUT: &str = "DIR_INPUT";
	pub(crate) const DIR_INPUT_REC: &str = "DIR_INPUT_REC";

	pub(crate) const EXCLUDE: &str = "EXCLUDE";
	pub(crate) const TRUNCATE: &str = "TRUNCATE";

	pub(crate) const COMPRESS: &str = "COMPRESS";
	pub(crate) const ALIGNMENT: &str = "ALIGNMENT";
	pub(crate) const STRICT: &str = "STRICT";
	pub(crate) const ENCRYPT_STRINGS: &str = "ENCRYPT_STRINGS";
	pub(crate) const IGNORE_CASE: &str = "IGNORE_CASE";

	pub(crate) const SORT: &str = "SORT";
}

pub fn build_keys<'a>() -> HashMap<&'static str, Arg<'a>> {
	/* please only use this function once during the lifecycle of the program */
	let mut map = HashMap::with_capacity(16);

	/* The various keys usable in the CLI */
	// Number of threads to spawn during processing
	map.insert(
		key_names::JOBS,
		Arg::new(key_names::JOBS)
			.short('j')
			.long("jobs")
			.value_name(key_names::JOBS)
			.help("How many threads to spawn during extraction, defaults to number of threads on system")
			.required(false)
			.takes_value(true)
			.number_of_values(1),
	);

	// A general output target
	map.insert(
		key_names::OUTPUT,
		Arg::new(key_names::OUTPUT)
			.short('o')
			.long("output")
			.value_name(key_names::OUTPUT)
			.help("A general output target, for example a file to write to")
			.required(false)
			.takes_value(true)
			.number_of_values(1),
	);

	// A resource to focus on and extract
	map.insert(
		key_names::RESOURCE,
		Arg::new(key_names::RESOURCE)
			.short('r')
			.long("resource")
			.value_name(key_names::RESOURCE)
			.help("An exact resource to extract from the archive, nested Comfy Archive files are addressed as dir/file")
			.required(false)
			.takes_value(true)
			.number_of_values(1),
	);

	// A general input source
	map.insert(
		key_names::INPUT,
		Arg::new(key_names::INPUT)
			.long("input")
			.short('i')
			.value_name(key_names::INPUT)
			.help("A general list of input sources, like paths to files")
			.required(false)
			.takes_value(true)
			.multiple_values(true),
	);

	// add all files in a directory into the input queue
	map.insert(
		key_names::DIR_INPUT,
		Arg::new(key_names::DIR_INPUT)
			.long("directory")
			.short('d')
			.value_name(key_names::DIR_INPUT)
			.help("Add all files in a directory into the input queue")
			.required(false)
			.takes_value(true)
			.multiple_values(true),
	);

	// same as above, only that it adds files from the directory recursively
	map.insert(
		key_names::DIR_INPUT_REC,
		Arg::new(key_names::DIR_INPUT_REC)
			.long("directory-r")
			.short('r')
			.value_name(key_names::DIR_INPUT_REC)
			.help("Recursively add all files in a directory into the input queue")
			.required(false)
			.takes_value(true)
			.multiple_values(true),
	);

	// exclude the given files from the write queue
	map.insert(
		key_names::EXCLUDE,
		Arg::new(key_names::EXCLUDE)
			.long("exclude")
			.short('x')
			.value_name(key_names::EXCLUDE)
			.help("Exclude the given paths from the input queue")
			.required(false)
			.takes_value(true)
			.multiple_values(true),
	);

	// Deletes the original files after they have been processed successfully
	map.insert(
		key_names::TRUNCATE,
		Arg::new(key_names::TRUNCATE)
			.long("truncate")
			.short('t')
			.value_name(key_names::TRUNCATE)
			.help("Deletes the original files after they have been packed successfully")
			.required(false)
			.takes_value(false),
	);

	// Write a gzip compressed FArC instead of a plain FArc
	map.insert(
		key_names::COMPRESS,
		Arg::new(key_names::COMPRESS)
			.long("compress")
			.short('c')
			.value_name(key_names::COMPRESS)
			.help("Gzip every entry and write an FArC archive instead of a plain FArc")
			.required(false)
			.takes_value(false),
	);

	// Data alignment of the written archive
	map.insert(
		key_names::ALIGNMENT,
		Arg::new(key_names::ALIGNMENT)
			.long("alignment")
			.short('a')
			.value_name(key_names::ALIGNMENT)
			.help("The boundary every entry's data is aligned to, defaults to 16")
			.required(false)
			.takes_value(true)
			.number_of_values(1)
			.validator(|alignment| match alignment.parse::<u32>() {
				Ok(value) if value.is_power_of_two() => Ok(()),
				_ => Err(format!("Please provide a power of two as the alignment, not: {}", alignment)),
			}),
	);

	// Fail on unreadable inputs instead of skipping them
	map.insert(
		key_names::STRICT,
		Arg::new(key_names::STRICT)
			.long("strict")
			.value_name(key_names::STRICT)
			.help("Abort when an input can't be read, instead of skipping it with a warning")
			.required(false)
			.takes_value(false),
	);

	// Obfuscate the names in a Comfy Archive
	map.insert(
		key_names::ENCRYPT_STRINGS,
		Arg::new(key_names::ENCRYPT_STRINGS)
			.long("encrypt-strings")
			.value_name(key_names::ENCRYPT_STRINGS)
			.help("Obfuscate every name in the Comfy Archive, this is a reversible XOR and not real encryption")
			.required(false)
			.takes_value(false),
	);

	// Case insensitive name lookups
	map.insert(
		key_names::IGNORE_CASE,
		Arg::new(key_names::IGNORE_CASE)
			.long("ignore-case")
			.value_name(key_names::IGNORE_CASE)
			.help("Match entry names ignoring ASCII case")
			.required(false)
			.takes_value(false),
	);

	// How to order the listed entries
	map.insert(
		key_names::SORT,
		Arg::new(key_names::SORT)
			.long("sort")
			.value_name(key_names::SORT)
			.help("How to sort entries within the table, either based on size or alphabetically")
			.required(false)
			.takes_value(true)
			.number_of_values(1),
	);

	map
}
