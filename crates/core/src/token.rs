//! Token wire format.
//!
//! A token is exactly 67 ASCII characters: a three digit, zero padded level
//! followed by the 64 character content hash of an identifier.

use crate::hash::{ContentHash, HASH_HEX_LEN};
use crate::quota::Level;
use serde::{Deserialize, Serialize};

/// Width of the level prefix.
pub const LEVEL_FIELD_LEN: usize = 3;

/// Total token length.
pub const TOKEN_LEN: usize = LEVEL_FIELD_LEN + HASH_HEX_LEN;

/// The parts of a well-formed token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecodedToken {
    /// Quota level from the prefix.
    pub level: Level,
    /// Content hash to resolve against the index.
    pub hash: ContentHash,
}

impl DecodedToken {
    /// Parse a raw token string.
    pub fn decode(token: &str) -> crate::Result<Self> {
        let bytes = token.as_bytes();
        if bytes.len() != TOKEN_LEN {
            return Err(crate::Error::InvalidFormat(format!(
                "expected {TOKEN_LEN} characters, got {}",
                bytes.len()
            )));
        }

        let level = parse_level_field(&bytes[..LEVEL_FIELD_LEN])?;
        // The prefix is ASCII, so byte offset LEVEL_FIELD_LEN is a char boundary.
        let hash = ContentHash::from_hex(&token[LEVEL_FIELD_LEN..])
            .map_err(|e| crate::Error::InvalidFormat(e.to_string()))?;

        Ok(Self { level, hash })
    }

    /// Render in wire format.
    pub fn encode(&self) -> String {
        encode(self.level, &self.hash)
    }
}

/// Render a level and hash in wire format.
pub fn encode(level: Level, hash: &ContentHash) -> String {
    format!("{:03}{}", level.value(), hash)
}

/// Parse the level prefix: digits only, leading zeros stripped, all zeros is level 0.
fn parse_level_field(field: &[u8]) -> crate::Result<Level> {
    if !field.iter().all(u8::is_ascii_digit) {
        return Err(crate::Error::InvalidFormat(format!(
            "level prefix is not numeric: {:?}",
            String::from_utf8_lossy(field)
        )));
    }
    let value = field
        .iter()
        .skip_while(|&&d| d == b'0')
        .fold(0u16, |acc, d| acc * 10 + u16::from(d - b'0'));
    Ok(Level::new(value))
}

/// A `level-hash` pair as accepted by the combined lookup endpoint.
///
/// The level is kept verbatim so it can be echoed back exactly as supplied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelHash {
    /// Level digits as supplied.
    pub level: String,
    /// Content hash to resolve.
    pub hash: ContentHash,
}

impl LevelHash {
    /// Parse `<level>-<hash>`.
    pub fn parse(input: &str) -> crate::Result<Self> {
        let mut parts = input.split('-');
        let (Some(level), Some(hash), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(crate::Error::InvalidFormat(
                "expected format: level-hash".to_string(),
            ));
        };
        if level.is_empty() || !level.bytes().all(|b| b.is_ascii_digit()) {
            return Err(crate::Error::InvalidLevel(format!(
                "level must be numeric: {level:?}"
            )));
        }
        Ok(Self {
            level: level.to_string(),
            hash: ContentHash::from_hex(hash)?,
        })
    }
}
