//! AES-256 decryption support for pak and IoStore containers.
//!
//! Containers encrypt their indices and payload blocks with AES-256 in ECB
//! mode, without an IV and without padding. Encrypted regions are always
//! stored padded to a multiple of [`AES_BLOCK_SIZE`], so readers round the
//! read length up with [`align_up`] and decrypt the full padded buffer in
//! place.
//!
//! Keys are addressed by a [`Guid`]. A [`KeyChain`] maps identifiers to keys
//! and carries one designated principal key, used when a container does not
//! declare its own key identifier.

mod guid;
mod keychain;
mod keyfile;

use aes::Aes256;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};

use crate::{Error, Result};

pub use guid::Guid;
pub use keychain::{AesKey, KeyChain, NamedKey};
pub use keyfile::{load_key_chain, parse_key_chain};

/// AES block size in bytes.
pub const AES_BLOCK_SIZE: usize = 16;

/// Rounds `len` up to the next multiple of [`AES_BLOCK_SIZE`].
pub fn align_up(len: u64) -> u64 {
    let block = AES_BLOCK_SIZE as u64;
    len.div_ceil(block) * block
}

/// Rounds `len` down to a multiple of [`AES_BLOCK_SIZE`].
pub fn align_down(len: usize) -> usize {
    len & !(AES_BLOCK_SIZE - 1)
}

fn check_aligned(data: &[u8]) -> Result<()> {
    if data.len() % AES_BLOCK_SIZE != 0 {
        return Err(Error::InvalidFormat(format!(
            "encrypted length {} is not a multiple of the AES block size",
            data.len()
        )));
    }
    Ok(())
}

/// Decrypts `data` in place with AES-256-ECB.
///
/// # Errors
///
/// Returns [`Error::InvalidFormat`] if the length of `data` is not a
/// multiple of [`AES_BLOCK_SIZE`].
pub fn decrypt_in_place(key: &AesKey, data: &mut [u8]) -> Result<()> {
    check_aligned(data)?;
    let cipher = Aes256::new(GenericArray::from_slice(key.as_bytes()));
    for block in data.chunks_exact_mut(AES_BLOCK_SIZE) {
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
    }
    Ok(())
}

/// Encrypts `data` in place with AES-256-ECB.
///
/// The inverse of [`decrypt_in_place`]. Containers are only ever read by
/// this crate; encryption is exposed for producing test vectors.
///
/// # Errors
///
/// Returns [`Error::InvalidFormat`] if the length of `data` is not a
/// multiple of [`AES_BLOCK_SIZE`].
pub fn encrypt_in_place(key: &AesKey, data: &mut [u8]) -> Result<()> {
    check_aligned(data)?;
    let cipher = Aes256::new(GenericArray::from_slice(key.as_bytes()));
    for block in data.chunks_exact_mut(AES_BLOCK_SIZE) {
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }
    Ok(())
}
