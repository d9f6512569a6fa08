use std::fmt;

#[cfg(feature = "crypto")]
use aes::{
	Aes128, Block,
	cipher::{BlockDecrypt, BlockEncrypt, KeyInit},
};
#[cfg(feature = "crypto")]
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::NoPadding};

use crate::global::{error::*, header::EncryptionFormat};

/// Size of an AES block, every encrypted region is padded to a multiple of this
pub const BLOCK_SIZE: usize = 16;

/// Size of both AES-128 keys
pub const KEY_SIZE: usize = 16;

/// Size of the CBC initialization vector stored in modern headers
pub const IV_SIZE: usize = 16;

/// Key of the "classic" ECB scheme, the name of the base game data file
pub const CLASSIC_KEY: [u8; KEY_SIZE] = *b"project_diva.bin";

/// Key of the "modern" CBC scheme
pub const MODERN_KEY: [u8; KEY_SIZE] = [
	0x13, 0x72, 0xD5, 0x7B, 0x6E, 0x9E, 0x31, 0xEB, 0xA2, 0x39, 0xB8, 0x3C, 0x15, 0x57, 0xC6, 0xBB,
];

/// Placeholder IV held by a header until the real one is read
pub const DUMMY_IV: [u8; IV_SIZE] = [0xCC; IV_SIZE];

#[cfg(feature = "crypto")]
type Aes128CbcDec = cbc::Decryptor<Aes128>;
#[cfg(feature = "crypto")]
type Aes128CbcEnc = cbc::Encryptor<Aes128>;

fn validate_length(len: usize) -> InternalResult {
	if len % BLOCK_SIZE != 0 {
		return Err(InternalError::CryptoError(format!(
			"Buffer of {} bytes is not a multiple of the AES block size ({})",
			len, BLOCK_SIZE
		)));
	}

	Ok(())
}

/// Decrypts `data` in place with AES-128-ECB. `data.len()` must be a multiple of [`BLOCK_SIZE`]
#[cfg(feature = "crypto")]
pub fn decrypt_ecb(data: &mut [u8], key: &[u8; KEY_SIZE]) -> InternalResult {
	validate_length(data.len())?;

	let cipher = Aes128::new(key.into());
	for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
		cipher.decrypt_block(Block::from_mut_slice(chunk));
	}

	Ok(())
}

/// Encrypts `data` in place with AES-128-ECB. `data.len()` must be a multiple of [`BLOCK_SIZE`]
#[cfg(feature = "crypto")]
pub fn encrypt_ecb(data: &mut [u8], key: &[u8; KEY_SIZE]) -> InternalResult {
	validate_length(data.len())?;

	let cipher = Aes128::new(key.into());
	for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
		cipher.encrypt_block(Block::from_mut_slice(chunk));
	}

	Ok(())
}

/// Decrypts `data` in place with AES-128-CBC. `data.len()` must be a multiple of [`BLOCK_SIZE`]
#[cfg(feature = "crypto")]
pub fn decrypt_cbc(data: &mut [u8], key: &[u8; KEY_SIZE], iv: &[u8; IV_SIZE]) -> InternalResult {
	validate_length(data.len())?;

	Aes128CbcDec::new(key.into(), iv.into())
		.decrypt_padded_mut::<NoPadding>(data)
		.map_err(|err| InternalError::CryptoError(err.to_string()))?;

	Ok(())
}

/// Encrypts `data` in place with AES-128-CBC. `data.len()` must be a multiple of [`BLOCK_SIZE`]
#[cfg(feature = "crypto")]
pub fn encrypt_cbc(data: &mut [u8], key: &[u8; KEY_SIZE], iv: &[u8; IV_SIZE]) -> InternalResult {
	validate_length(data.len())?;

	let len = data.len();
	Aes128CbcEnc::new(key.into(), iv.into())
		.encrypt_padded_mut::<NoPadding>(data, len)
		.map_err(|err| InternalError::CryptoError(err.to_string()))?;

	Ok(())
}

#[cfg(feature = "archive")]
/// Decryption state of one opened archive, picks the key and mode from the header's [`EncryptionFormat`]
pub(crate) struct Encryptor {
	format: EncryptionFormat,
	iv: [u8; IV_SIZE],
}

#[cfg(feature = "archive")]
impl fmt::Debug for Encryptor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "[FArc::Encryptor] format: {:?}, iv: {:02X?}", self.format, self.iv)
	}
}

#[cfg(feature = "archive")]
impl Encryptor {
	/// `None` when the archive is not encrypted at all
	pub(crate) fn new(format: EncryptionFormat, iv: [u8; IV_SIZE]) -> Option<Encryptor> {
		match format {
			EncryptionFormat::None => None,
			EncryptionFormat::Classic | EncryptionFormat::Modern => Some(Encryptor { format, iv }),
		}
	}

	#[cfg(feature = "crypto")]
	pub(crate) fn decrypt(&self, data: &mut [u8]) -> InternalResult {
		match self.format {
			EncryptionFormat::Classic => decrypt_ecb(data, &CLASSIC_KEY),
			EncryptionFormat::Modern => decrypt_cbc(data, &MODERN_KEY, &self.iv),
			EncryptionFormat::None => validate_length(data.len()),
		}
	}

	#[cfg(not(feature = "crypto"))]
	pub(crate) fn decrypt(&self, data: &mut [u8]) -> InternalResult {
		validate_length(data.len())?;
		Err(InternalError::MissingFeatureError("crypto"))
	}
}
