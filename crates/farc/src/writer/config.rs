use std::fmt;

use crate::global::reg_entry::RegistryEntry;

/// Settings for [`dump`](crate::writer::dump), the flat `FArc`/`FArC` writer
#[derive(Clone)]
pub struct BuilderConfig<'a> {
	/// Data alignment boundary, every entry's data starts on a multiple of this. Defaults to [`DEFAULT_ALIGNMENT`](crate::DEFAULT_ALIGNMENT)
	pub alignment: u32,
	/// Writes an `FArC` archive with gzip compressed entries instead of a plain `FArc`
	pub compress: bool,
	/// Fail with [`MissingSourceError`](crate::prelude::InternalError::MissingSourceError) instead of skipping unreadable path sources
	pub strict: bool,
	/// Called once per entry, after its data has been written
	pub progress_callback: Option<&'a dyn Fn(&RegistryEntry)>,
}

impl<'a> BuilderConfig<'a> {
	/// Setter for the [`alignment`](BuilderConfig::alignment) field
	pub fn alignment(mut self, alignment: u32) -> Self {
		self.alignment = alignment;
		self
	}

	///```
	/// use farc::prelude::BuilderConfig;
	///
	/// let config = BuilderConfig::default().compress(true);
	/// assert!(config.compress);
	///```
	pub fn compress(mut self, compress: bool) -> Self {
		self.compress = compress;
		self
	}

	/// Setter for the [`strict`](BuilderConfig::strict) field
	pub fn strict(mut self, strict: bool) -> Self {
		self.strict = strict;
		self
	}

	/// Setter for the [`progress_callback`](BuilderConfig::progress_callback) field
	pub fn callback(mut self, callback: &'a dyn Fn(&RegistryEntry)) -> Self {
		self.progress_callback = Some(callback);
		self
	}
}

impl<'a> Default for BuilderConfig<'a> {
	fn default() -> BuilderConfig<'a> {
		BuilderConfig {
			alignment: crate::DEFAULT_ALIGNMENT,
			compress: false,
			strict: false,
			progress_callback: None,
		}
	}
}

impl<'a> fmt::Debug for BuilderConfig<'a> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("BuilderConfig")
			.field("alignment", &self.alignment)
			.field("compress", &self.compress)
			.field("strict", &self.strict)
			.field("progress_callback", &self.progress_callback.is_some())
			.finish()
	}
}

/// Settings for [`TreeBuilder`](crate::writer::TreeBuilder), the Comfy Archive writer
#[derive(Clone, Default)]
pub struct TreeConfig<'a> {
	/// Obfuscates every name with [`xor_obfuscate`](crate::crypto_utils::xor_obfuscate) and sets the `ENCRYPTED_STRINGS` archive flag
	pub encrypt_strings: bool,
	/// Fail with [`MissingSourceError`](crate::prelude::InternalError::MissingSourceError) instead of writing an empty file
	pub strict: bool,
	/// Called with the full `/` joined path of every file, after its data has been written
	pub progress_callback: Option<&'a dyn Fn(&str, u64)>,
}

impl<'a> TreeConfig<'a> {
	/// Setter for the [`encrypt_strings`](TreeConfig::encrypt_strings) field
	pub fn encrypt_strings(mut self, encrypt_strings: bool) -> Self {
		self.encrypt_strings = encrypt_strings;
		self
	}

	/// Setter for the [`strict`](TreeConfig::strict) field
	pub fn strict(mut self, strict: bool) -> Self {
		self.strict = strict;
		self
	}

	/// Setter for the [`progress_callback`](TreeConfig::progress_callback) field
	pub fn callback(mut self, callback: &'a dyn Fn(&str, u64)) -> Self {
		self.progress_callback = Some(callback);
		self
	}
}

impl<'a> fmt::Debug for TreeConfig<'a> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TreeConfig")
			.field("encrypt_strings", &self.encrypt_strings)
			.field("strict", &self.strict)
			.field("progress_callback", &self.progress_callback.is_some())
			.finish()
	}
}
