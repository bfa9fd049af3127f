//! The key directory: AES keys addressed by GUID plus one principal key.

use std::collections::HashMap;
use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use zeroize::Zeroizing;

use super::Guid;
use crate::{Error, Result};

/// Size of an AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;

/// A 256-bit AES key. The bytes are wiped on drop.
#[derive(Clone)]
pub struct AesKey {
    bytes: Zeroizing<[u8; KEY_SIZE]>,
}

impl AesKey {
    /// Creates a key from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    /// Creates a key from a slice, which must be exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            Error::InvalidKey(format!(
                "expected {} key bytes, got {}",
                KEY_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self::from_bytes(array))
    }

    /// Parses 64 hex digits, with an optional `0x` prefix.
    pub fn from_hex(text: &str) -> Result<Self> {
        let text = text.trim();
        let digits = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .unwrap_or(text);
        let bytes = Zeroizing::new(
            hex::decode(digits).map_err(|e| Error::InvalidKey(format!("invalid hex: {}", e)))?,
        );
        Self::from_slice(&bytes)
    }

    /// Parses a standard base64 encoded key, the form used by key chain files.
    pub fn from_base64(text: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            BASE64
                .decode(text.trim())
                .map_err(|e| Error::InvalidKey(format!("invalid base64: {}", e)))?,
        );
        Self::from_slice(&bytes)
    }

    /// Parses a key given either as hex or as base64.
    ///
    /// Text that is 64 hex digits (after an optional `0x`) is read as hex,
    /// anything else as base64.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.len() == KEY_SIZE * 2 && digits.chars().all(|c| c.is_ascii_hexdigit()) {
            Self::from_hex(digits)
        } else {
            Self::from_base64(trimmed)
        }
    }

    /// Returns the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl fmt::Debug for AesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Don't expose key material in debug output
        f.debug_struct("AesKey").finish_non_exhaustive()
    }
}

impl PartialEq for AesKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes[..] == other.bytes[..]
    }
}

impl Eq for AesKey {}

/// A key together with its identifier and display name.
#[derive(Debug, Clone)]
pub struct NamedKey {
    /// Identifier the containers refer to.
    pub guid: Guid,
    /// Human readable name from the key file.
    pub name: String,
    /// The key itself.
    pub key: AesKey,
}

impl NamedKey {
    /// Creates a named key.
    pub fn new(guid: Guid, name: impl Into<String>, key: AesKey) -> Self {
        Self {
            guid,
            name: name.into(),
            key,
        }
    }
}

/// Maps key identifiers to AES keys.
///
/// A key chain is assembled once, before any container is opened, and is
/// read-only afterwards. One key may be designated as the principal key; it
/// decrypts data whose container declares no key identifier, or whose
/// identifier is not present in the chain.
///
/// # Example
///
/// ```rust
/// use paktools::crypto::{AesKey, Guid, KeyChain, NamedKey};
///
/// let guid = Guid::new(1, 2, 3, 4);
/// let keys = KeyChain::new()
///     .with_principal_key(AesKey::from_bytes([1; 32]))
///     .with_key(NamedKey::new(guid, "dlc", AesKey::from_bytes([2; 32])));
///
/// assert_eq!(keys.resolve(&guid), keys.lookup(&guid));
/// assert_eq!(keys.resolve(&Guid::new(9, 9, 9, 9)), keys.principal());
/// ```
#[derive(Debug, Clone, Default)]
pub struct KeyChain {
    keys: HashMap<Guid, NamedKey>,
    principal: Option<Guid>,
}

impl KeyChain {
    /// Creates an empty key chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a key, replacing any key with the same identifier.
    pub fn with_key(mut self, key: NamedKey) -> Self {
        self.keys.insert(key.guid, key);
        self
    }

    /// Adds `key` under the zero identifier and makes it the principal key.
    pub fn with_principal_key(self, key: AesKey) -> Self {
        self.with_key(NamedKey::new(Guid::ZERO, "principal", key))
            .with_principal(Guid::ZERO)
    }

    /// Designates the key stored under `guid` as the principal key.
    ///
    /// Has no effect if no key with that identifier is present.
    pub fn with_principal(mut self, guid: Guid) -> Self {
        if self.keys.contains_key(&guid) {
            self.principal = Some(guid);
        }
        self
    }

    /// Returns the key registered under `guid`.
    pub fn lookup(&self, guid: &Guid) -> Option<&AesKey> {
        self.keys.get(guid).map(|named| &named.key)
    }

    /// Returns the principal key.
    pub fn principal(&self) -> Option<&AesKey> {
        self.principal.as_ref().and_then(|guid| self.lookup(guid))
    }

    /// Returns the key for `guid`, falling back to the principal key.
    pub fn resolve(&self, guid: &Guid) -> Option<&AesKey> {
        self.lookup(guid).or_else(|| self.principal())
    }

    /// Returns `true` if a key is registered under `guid`.
    pub fn contains(&self, guid: &Guid) -> bool {
        self.keys.contains_key(guid)
    }

    /// Returns the number of keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if the chain holds no keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterates over all named keys in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &NamedKey> {
        self.keys.values()
    }
}
