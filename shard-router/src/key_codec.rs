//! Normalization of client-supplied keys into canonical keys.
//!
//! A client key is an `(encoding, data)` pair. The canonical form is what gets
//! hashed for shard selection and what is sent to the backend as the key.

use crate::errors::{Result, ShardRouterError};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use std::fmt;

/// Normalized key used for hashing and as the backend wire key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyEncoding {
    Plain,
    Binary,
}

impl KeyEncoding {
    /// Parses a client encoding tag. A missing or empty tag means `Plain`.
    pub fn parse(tag: Option<&str>) -> Result<Self> {
        match tag {
            None | Some("") | Some("plain") => Ok(KeyEncoding::Plain),
            Some("binary") => Ok(KeyEncoding::Binary),
            Some(other) => Err(ShardRouterError::InvalidEncoding(other.to_string())),
        }
    }
}

/// How `binary` payloads are checked before being re-encoded.
///
/// Only `permissive` exists today: the data is accepted as-is and no
/// byte-level validation is performed.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BinaryKeyValidation {
    #[default]
    Permissive,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct KeyCodec {
    binary_validation: BinaryKeyValidation,
}

impl KeyCodec {
    pub fn new(binary_validation: BinaryKeyValidation) -> Self {
        Self { binary_validation }
    }

    /// Decodes a client key into its canonical form.
    ///
    /// `plain` keys are used unchanged. `binary` keys are re-encoded with
    /// standard base64 so the canonical key is printable and reversible.
    pub fn normalize(&self, encoding: Option<&str>, data: &str) -> Result<CanonicalKey> {
        match KeyEncoding::parse(encoding)? {
            KeyEncoding::Plain => Ok(CanonicalKey(data.to_string())),
            KeyEncoding::Binary => match self.binary_validation {
                BinaryKeyValidation::Permissive => Ok(CanonicalKey(STANDARD.encode(data))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_is_unchanged() {
        let codec = KeyCodec::default();
        assert_eq!(codec.normalize(Some("plain"), "k1").unwrap().as_str(), "k1");
        assert_eq!(codec.normalize(None, "k1").unwrap().as_str(), "k1");
        assert_eq!(codec.normalize(Some(""), "").unwrap().as_str(), "");
    }

    #[test]
    fn test_binary_is_base64() {
        let codec = KeyCodec::default();
        let key = codec.normalize(Some("binary"), "hello").unwrap();
        assert_eq!(key.as_str(), "aGVsbG8=");
        assert_eq!(STANDARD.decode(key.as_str()).unwrap(), b"hello");
    }

    #[test]
    fn test_binary_accepts_anything() {
        let codec = KeyCodec::new(BinaryKeyValidation::Permissive);
        let key = codec.normalize(Some("binary"), "\u{0}\u{ff}not really binary").unwrap();
        assert!(!key.as_str().is_empty());
    }

    #[test]
    fn test_binary_and_plain_meet() {
        // A plain key that already spells the base64 form is the same backend key.
        let codec = KeyCodec::default();
        let binary = codec.normalize(Some("binary"), "hello").unwrap();
        let plain = codec.normalize(Some("plain"), "aGVsbG8=").unwrap();
        assert_eq!(binary, plain);
    }

    #[test]
    fn test_unknown_encoding() {
        let codec = KeyCodec::default();
        let err = codec.normalize(Some("hex"), "abcd").unwrap_err();
        assert!(matches!(err, ShardRouterError::InvalidEncoding(tag) if tag == "hex"));
        assert!(KeyEncoding::parse(Some("Plain")).is_err());
    }
}
