use crate::error::CodecError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// The symbol `0` encodes to. Every other code must not start with it.
const ZERO_SYMBOL: &str = "1";

/// A short code encoded as a base58 string (Bitcoin alphabet).
///
/// The encoding is the integer's base58 representation: no fixed width and no
/// padding, so it grows logarithmically with the value. `0` encodes to `"1"`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ShortCodeBase58(String);

impl ShortCodeBase58 {
    /// Encodes a 64-bit identifier.
    ///
    /// # Examples
    ///
    /// ```
    /// use wormhole_core::base58::ShortCodeBase58;
    ///
    /// assert_eq!(ShortCodeBase58::from_id(0).as_str(), "1");
    /// assert_eq!(ShortCodeBase58::from_id(58).as_str(), "21");
    /// ```
    pub fn from_id(id: u64) -> Self {
        let bytes = id.to_be_bytes();
        // Leading zero bytes would each become a '1' prefix; strip them so the
        // output is the plain positional representation of the integer.
        let Some(first) = bytes.iter().position(|b| *b != 0) else {
            return Self(ZERO_SYMBOL.to_string());
        };
        Self(bs58::encode(&bytes[first..]).into_string())
    }

    /// Parses and validates an encoded short code.
    pub fn parse(code: &str) -> Result<Self, CodecError> {
        Self::decode(code)?;
        Ok(Self(code.to_string()))
    }

    /// Decodes a short code back into the identifier it was produced from.
    pub fn decode(code: &str) -> Result<u64, CodecError> {
        if code.is_empty() {
            return Err(CodecError::Empty);
        }
        if code == ZERO_SYMBOL {
            return Ok(0);
        }
        if code.starts_with(ZERO_SYMBOL) {
            return Err(CodecError::NonCanonical(code.to_string()));
        }

        let bytes = bs58::decode(code)
            .into_vec()
            .map_err(|e| CodecError::Malformed(format!("{code}: {e}")))?;
        if bytes.len() > 8 {
            return Err(CodecError::Overflow(code.to_string()));
        }

        let mut buf = [0_u8; 8];
        buf[8 - bytes.len()..].copy_from_slice(&bytes);
        Ok(u64::from_be_bytes(buf))
    }

    /// Returns the identifier this code encodes.
    pub fn id(&self) -> u64 {
        // Construction paths only admit valid codes.
        Self::decode(&self.0).unwrap_or_default()
    }

    /// Returns the short code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ShortCodeBase58 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ShortCodeBase58").field(&self.0).finish()
    }
}

impl Display for ShortCodeBase58 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for ShortCodeBase58 {
    fn from(id: u64) -> Self {
        Self::from_id(id)
    }
}

impl FromStr for ShortCodeBase58 {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ShortCodeBase58 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ShortCodeBase58 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
