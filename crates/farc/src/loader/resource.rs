use std::{fmt, sync::Arc};

use crate::global::flags::Flags;

/// Basically data obtained from an archive, with its decoded content and the flags it was read with
#[derive(Debug, Clone)]
pub struct Resource {
	/// Name of the entry this resource was read from
	pub id: Arc<str>,
	/// The fully decoded (decrypted and decompressed) data
	pub data: Box<[u8]>,
	/// Archive-wide flags in effect when the data was read
	pub flags: Flags,
}

impl fmt::Display for Resource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"[Resource] id: {}, size: {}B, flags: {}",
			self.id,
			self.data.len(),
			self.flags
		)
	}
}
