use crate::crypto::{BLOCK_SIZE, IV_SIZE};

/// Rounds `size` up to the next multiple of the AES block size
#[inline(always)]
pub const fn padded_size(size: usize) -> usize {
	(size + (BLOCK_SIZE - 1)) & !(BLOCK_SIZE - 1)
}

/// Rounds `position` up to the next multiple of `alignment`, `alignment` must be a power of two
#[inline(always)]
pub const fn align_up(position: u64, alignment: u64) -> u64 {
	(position + (alignment - 1)) & !(alignment - 1)
}

/// The weak, reversible name transform applied when a Comfy Archive sets `EncryptedStrings`.
/// This is obfuscation and nothing more, applying it twice yields the input.
pub fn xor_obfuscate(bytes: &mut [u8]) {
	bytes.iter_mut().for_each(|b| *b ^= 0xCC);
}

/// Use this function to generate a random IV using the thread local RNG
#[cfg(feature = "builder")]
#[inline(always)]
pub fn gen_iv() -> [u8; IV_SIZE] {
	rand::random()
}
