//! Key chain assembly for CLI operations.

use std::path::Path;

use paktools::crypto::{AesKey, KeyChain, load_key_chain};

/// Builds the key chain from a key file and a single command-line key.
///
/// The command-line key, when given, becomes the principal key and takes
/// precedence over the key file's primary key.
pub fn build_key_chain(crypto_keys: Option<&Path>, aes_key: Option<&str>) -> paktools::Result<KeyChain> {
    let mut keys = match crypto_keys {
        Some(path) => {
            let keys = load_key_chain(path)?;
            log::debug!("Loaded {} keys from {}", keys.len(), path.display());
            keys
        }
        None => KeyChain::new(),
    };

    if let Some(text) = aes_key {
        keys = keys.with_principal_key(AesKey::parse(text)?);
    }

    Ok(keys)
}
