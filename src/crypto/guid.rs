//! Key identifiers.

use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;

use crate::Error;
use crate::format::reader::read_u32_le;

/// A 128-bit key identifier, stored on disk as four little-endian `u32`s.
///
/// The all-zero value means "no identifier"; containers carrying it are
/// decrypted with the principal key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Guid {
    a: u32,
    b: u32,
    c: u32,
    d: u32,
}

impl Guid {
    /// The all-zero identifier.
    pub const ZERO: Guid = Guid::new(0, 0, 0, 0);

    /// Creates an identifier from its four components.
    pub const fn new(a: u32, b: u32, c: u32, d: u32) -> Self {
        Self { a, b, c, d }
    }

    /// Returns `true` unless every component is zero.
    pub fn is_valid(&self) -> bool {
        (self.a | self.b | self.c | self.d) != 0
    }

    /// Reads an identifier in its on-disk layout.
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Self {
            a: read_u32_le(r)?,
            b: read_u32_le(r)?,
            c: read_u32_le(r)?,
            d: read_u32_le(r)?,
        })
    }

    /// Returns the on-disk byte layout.
    pub fn to_bytes(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[0..4].copy_from_slice(&self.a.to_le_bytes());
        out[4..8].copy_from_slice(&self.b.to_le_bytes());
        out[8..12].copy_from_slice(&self.c.to_le_bytes());
        out[12..16].copy_from_slice(&self.d.to_le_bytes());
        out
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}{:08X}{:08X}{:08X}", self.a, self.b, self.c, self.d)
    }
}

impl FromStr for Guid {
    type Err = Error;

    /// Parses 32 hex digits; hyphens and surrounding braces are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s
            .trim()
            .trim_start_matches('{')
            .trim_end_matches('}')
            .chars()
            .filter(|c| *c != '-')
            .collect();

        if digits.len() != 32 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidKey(format!("malformed key GUID '{}'", s)));
        }

        let part = |i: usize| {
            u32::from_str_radix(&digits[i * 8..(i + 1) * 8], 16)
                .map_err(|e| Error::InvalidKey(format!("malformed key GUID '{}': {}", s, e)))
        };
        Ok(Self::new(part(0)?, part(1)?, part(2)?, part(3)?))
    }
}
