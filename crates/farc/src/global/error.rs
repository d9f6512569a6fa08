use std::{error, io, path::PathBuf};
use thiserror::Error;

/// Internal `Result` type alias used by `farc`. Basically equal to: `Result<T, InternalError>`
pub type InternalResult<T = ()> = Result<T, InternalError>;

/// All errors manifestable within `farc` collected into a neat enum
#[derive(Debug, Error)]
pub enum InternalError {
	/// Generic Error
	#[error("[FArcError::GenericError] {0}")]
	OtherError(Box<dyn error::Error + Send + Sync>),
	/// a necessary cargo feature wasn't enabled for a certain action: eg trying to decompress without the `compression` feature
	#[error("[FArcError::MissingFeatureError] Unable to continue with operation, the cargo feature ({0}) is missing")]
	MissingFeatureError(&'static str),
	/// thin wrapper over [io::Error](std::io::Error), captures all IO errors
	#[error("[FArcError::IOError] {0}")]
	IOError(#[from] io::Error),
	/// the first four bytes of the source match none of the known signatures
	#[error("[FArcError::ValidationError] Unrecognized signature found in Header, the source is not a supported archive. Magic found {0:02X?}")]
	UnrecognizedFormat([u8; 4]),
	/// the source is shorter than what its own header claims
	#[error("[FArcError::TruncatedArchiveError] {0}")]
	TruncatedArchive(String),
	/// the header or entry table disagrees with itself
	#[error("[FArcError::CorruptArchiveError] {0}")]
	CorruptArchive(String),
	/// an entry points past the end of the source
	#[error("[FArcError::CorruptArchiveError] Entry: {id} ends at byte {end}, but the source is only {length} bytes long")]
	EntryOutOfBounds {
		/// name of the offending entry
		id: String,
		/// `offset + compressed_size` of the entry
		end: u64,
		/// total length of the source
		length: u64,
	},
	/// the resource was not found
	#[error("[FArcError::MissingResourceError] Resource not found: {0}")]
	MissingResourceError(String),
	/// two leaves found with the same ID, each leaf should have a unique ID
	#[error("[FArcError::LeafAppendError] A leaf with the ID: {0} already exists. Consider changing the ID to prevent collisions")]
	DuplicateLeafID(String),
	/// a leaf ID is empty or contains a NUL byte, neither can be stored in a NUL terminated name table
	#[error("[FArcError::InvalidIDError] The ID: {0:?} can't be stored, IDs must be non-empty and free of bytes that are stored as NUL")]
	InvalidIDError(String),
	/// a source file registered for writing could not be opened
	#[error("[FArcError::MissingSourceError] Unable to read source file: {path:?}, {source}")]
	MissingSourceError {
		/// path of the source file
		path: PathBuf,
		/// error returned by the filesystem
		source: io::Error,
	},
	/// decryption or encryption failed
	#[error("[FArcError::CryptoError] {0}")]
	CryptoError(String),
	/// attempted to set the reserved flag bit, [`Flags::RESERVED_FLAG`](crate::global::flags::Flags::RESERVED_FLAG)
	#[error("[FArcError::RestrictedFlagAccessError] Tried to set reserved bit(s)!")]
	RestrictedFlagAccessError,
	/// a Comfy Archive with an unknown major version, contains the incompatible source's major version
	#[error("[FArcError::IncompatibleArchiveVersionError] The provided archive has major version: {}, while this implementation reads version: {}", .0, crate::COMFY_VERSION_MAJOR)]
	IncompatibleArchiveVersionError(u8),
	/// a registered tree nests directories deeper than [`MAX_DIRECTORY_DEPTH`](crate::global::comfy::MAX_DIRECTORY_DEPTH), contains the offending directory's path
	#[error("[FArcError::DirectoryDepthError] The directory: {:?} lies deeper than {} levels, readers would reject the archive", .0, crate::global::comfy::MAX_DIRECTORY_DEPTH)]
	DirectoryDepthError(String),
	/// the output buffer handed to a read does not match the entry's size
	#[error("[FArcError::BufferSizeMismatch] Expected an output buffer of {expected} bytes, found one of {found} bytes")]
	BufferSizeMismatch {
		/// original size of the entry
		expected: u64,
		/// length of the provided buffer
		found: usize,
	},
	/// structural errors thrown during compression or decompression
	#[error("[FArcError::CompressorDecompressorError] {0}")]
	DeCompressionError(io::Error),
}

impl InternalError {
	/// Maps an unexpected EOF into [`InternalError::TruncatedArchive`], keeping all other IO errors as they are
	pub(crate) fn truncated(err: io::Error, context: &str) -> InternalError {
		match err.kind() {
			io::ErrorKind::UnexpectedEof => InternalError::TruncatedArchive(format!("Source ended while reading {}", context)),
			_ => InternalError::IOError(err),
		}
	}
}
