//! Loading a [`KeyChain`] from a `crypto.json` file.
//!
//! The file layout is the one written by the engine's crypto settings:
//!
//! ```json
//! {
//!   "EncryptionKey": { "Name": "Default", "Guid": "", "Key": "<base64>" },
//!   "SecondaryEncryptionKeys": [
//!     { "Name": "DLC", "Guid": "0123...CDEF", "Key": "<base64>" }
//!   ]
//! }
//! ```
//!
//! The primary key becomes the principal key. Secondary keys are added under
//! their GUIDs. Unknown fields are ignored.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::{AesKey, Guid, KeyChain, NamedKey};
use crate::{Error, Result};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CryptoSettings {
    #[serde(default)]
    encryption_key: Option<KeyRecord>,
    #[serde(default)]
    secondary_encryption_keys: Vec<KeyRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KeyRecord {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    guid: Option<String>,
    #[serde(default)]
    key: Option<String>,
}

impl KeyRecord {
    fn guid(&self) -> Result<Guid> {
        match self.guid.as_deref().map(str::trim) {
            None | Some("") => Ok(Guid::ZERO),
            Some(text) => text.parse(),
        }
    }

    fn key(&self) -> Result<Option<AesKey>> {
        match self.key.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => AesKey::from_base64(text).map(Some),
        }
    }

    fn name(&self) -> String {
        self.name.clone().unwrap_or_default()
    }
}

/// Parses a key chain from the text of a `crypto.json` file.
///
/// # Errors
///
/// Returns [`Error::KeyFile`] for malformed JSON and [`Error::InvalidKey`]
/// for keys or GUIDs that do not decode.
pub fn parse_key_chain(text: &str) -> Result<KeyChain> {
    let settings: CryptoSettings = serde_json::from_str(text)?;
    let mut chain = KeyChain::new();

    if let Some(record) = &settings.encryption_key {
        if let Some(key) = record.key()? {
            let guid = record.guid()?;
            chain = chain
                .with_key(NamedKey::new(guid, record.name(), key))
                .with_principal(guid);
        }
    }

    for record in &settings.secondary_encryption_keys {
        let guid = record.guid()?;
        if !guid.is_valid() {
            return Err(Error::InvalidKey(format!(
                "secondary key '{}' has no GUID",
                record.name()
            )));
        }
        match record.key()? {
            Some(key) => chain = chain.with_key(NamedKey::new(guid, record.name(), key)),
            None => log::warn!("Secondary key {} has no key data, skipping", guid),
        }
    }

    log::debug!("Loaded {} encryption key(s)", chain.len());
    Ok(chain)
}

/// Reads and parses a `crypto.json` file.
pub fn load_key_chain(path: impl AsRef<Path>) -> Result<KeyChain> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    parse_key_chain(&text)
}
