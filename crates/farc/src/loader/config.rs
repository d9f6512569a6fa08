/// How entry names are compared against a lookup key
#[derive(Clone, Copy, Default)]
pub enum NameComparison {
	/// Byte-for-byte equality
	#[default]
	CaseSensitive,
	/// Equality after ASCII case folding
	CaseInsensitive,
	/// A caller supplied predicate, called as `predicate(stored_name, lookup_key)`
	Custom(fn(&str, &str) -> bool),
}

impl NameComparison {
	/// Whether `stored` matches the lookup `key` under this comparison
	#[inline]
	pub fn matches(&self, stored: &str, key: &str) -> bool {
		match self {
			NameComparison::CaseSensitive => stored == key,
			NameComparison::CaseInsensitive => stored.eq_ignore_ascii_case(key),
			NameComparison::Custom(predicate) => predicate(stored, key),
		}
	}
}

impl std::fmt::Debug for NameComparison {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			NameComparison::CaseSensitive => f.write_str("CaseSensitive"),
			NameComparison::CaseInsensitive => f.write_str("CaseInsensitive"),
			NameComparison::Custom(_) => f.write_str("Custom(..)"),
		}
	}
}

/// Settings used when opening an [`Archive`](crate::archive::Archive) or mounting a [`ComfyArchive`](crate::archive::ComfyArchive)
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveConfig {
	/// Used by every name lookup, case-sensitive unless told otherwise
	pub name_comparison: NameComparison,
}

impl ArchiveConfig {
	/// Setter for the [`name_comparison`](ArchiveConfig::name_comparison) field
	pub fn name_comparison(mut self, comparison: NameComparison) -> ArchiveConfig {
		self.name_comparison = comparison;
		self
	}

	/// Shorthand for `name_comparison(NameComparison::CaseInsensitive)`
	pub fn case_insensitive(self) -> ArchiveConfig {
		self.name_comparison(NameComparison::CaseInsensitive)
	}
}
