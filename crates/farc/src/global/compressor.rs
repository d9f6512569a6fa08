#![cfg(feature = "compression")]
#![cfg_attr(docsrs, doc(cfg(feature = "compression")))]

use std::io::{self, Read, Write};

use flate2::{Compression, read::GzDecoder, write::GzEncoder};

use super::error::*;

/// Byte counts produced by one [`Compressor::compress`] run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompressionReport {
	/// Number of bytes read from the source
	pub original_size: u64,
	/// Number of compressed bytes written to the output
	pub compressed_size: u64,
}

// Counts every byte that passes through to the inner writer
struct CountingWriter<W> {
	inner: W,
	count: u64,
}

impl<W: Write> Write for CountingWriter<W> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		let written = self.inner.write(buf)?;
		self.count += written as u64;
		Ok(written)
	}

	fn flush(&mut self) -> io::Result<()> {
		self.inner.flush()
	}
}

/// Exported gzip (window bits 31) compressor used by `farc`
#[derive(Debug)]
#[cfg_attr(docsrs, doc(cfg(feature = "compression")))]
pub struct Compressor<T: Read> {
	data: T,
}

impl<T: Read> Compressor<T> {
	/// Construct a new compressor over a read handle
	pub fn new(data: T) -> Compressor<T> {
		Compressor { data }
	}

	/// Streams the source through a gzip encoder in [`CHUNK_SIZE`](crate::CHUNK_SIZE) chunks.
	/// Compressed output reaches `output` as soon as the encoder produces it, the final chunk is sealed with a finish.
	pub fn compress(&mut self, output: &mut dyn Write) -> InternalResult<CompressionReport> {
		let mut encoder = GzEncoder::new(CountingWriter { inner: output, count: 0 }, Compression::default());
		let mut chunk = vec![0u8; crate::CHUNK_SIZE];
		let mut original_size = 0u64;

		loop {
			let read = match self.data.read(&mut chunk) {
				Ok(0) => break,
				Ok(read) => read,
				Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
				Err(err) => return Err(err.into()),
			};

			encoder.write_all(&chunk[..read])?;
			original_size += read as u64;
		}

		let counter = encoder.finish()?;

		Ok(CompressionReport {
			original_size,
			compressed_size: counter.count,
		})
	}

	/// Inflates a whole gzip member into `output`, which must be sized to the expected decompressed length.
	///
	/// A failure that only surfaces after `output` is full (the trailing checksum of a member whose
	/// last block was disturbed by alignment padding) is logged and ignored, the decoded bytes are kept.
	pub fn decompress(&mut self, output: &mut [u8]) -> InternalResult {
		let mut decoder = GzDecoder::new(&mut self.data);
		decoder.read_exact(output).map_err(InternalError::DeCompressionError)?;

		let mut probe = [0u8; 1];
		match decoder.read(&mut probe) {
			Ok(0) => (),
			Ok(_) => log::warn!(
				"Compressed stream holds more than the expected {} bytes, the excess is ignored",
				output.len()
			),
			Err(err) => log::warn!(
				"Ignoring inflate error raised after all {} expected bytes were decoded: {}",
				output.len(),
				err
			),
		};

		Ok(())
	}
}
