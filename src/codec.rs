//! Pluggable marshal/unmarshal strategies.
//!
//! A [`Codec`] converts between application values and the bytes kept in the
//! store. Codecs are object-safe so the default can be swapped per service or
//! per call; typed access goes through `serde_json::Value` as the common
//! intermediate form, which lets one codec object serve every Rust type.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Codec shared between services, calls and result values.
pub type SharedCodec = Arc<dyn Codec>;

/// Encoding strategy for stored values.
pub trait Codec: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Encode an intermediate value into stored bytes.
    fn marshal(&self, value: &serde_json::Value) -> Result<Vec<u8>>;

    /// Decode stored bytes into an intermediate value.
    fn unmarshal(&self, raw: &[u8]) -> Result<serde_json::Value>;

    /// Whether `raw` is this codec's encoding of an explicit nil.
    fn is_nil(&self, _raw: &[u8]) -> bool {
        false
    }
}

impl fmt::Debug for dyn Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Codec({})", self.name())
    }
}

/// Marshal any serializable value with `codec`.
pub fn encode<T: Serialize + ?Sized>(codec: &dyn Codec, value: &T) -> Result<Vec<u8>> {
    let value = serde_json::to_value(value)?;
    codec.marshal(&value)
}

/// Unmarshal `raw` into `T` with `codec`.
pub fn decode<T: DeserializeOwned>(codec: &dyn Codec, raw: &[u8]) -> Result<T> {
    let value = codec.unmarshal(raw)?;
    serde_json::from_value(value).map_err(Into::into)
}

/// JSON encoding for every value. `null` is the nil encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn marshal(&self, value: &serde_json::Value) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(Into::into)
    }

    fn unmarshal(&self, raw: &[u8]) -> Result<serde_json::Value> {
        serde_json::from_slice(raw).map_err(Into::into)
    }

    fn is_nil(&self, raw: &[u8]) -> bool {
        raw == b"null"
    }
}

/// Strings stored as bare UTF-8, everything else as JSON.
///
/// Reading bytes that do not parse as JSON yields a string, so keys written
/// by other tools as plain text stay readable. A string whose text is itself
/// valid JSON (`"42"`, `"true"`) reads back as that JSON value.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainCodec;

impl Codec for PlainCodec {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn marshal(&self, value: &serde_json::Value) -> Result<Vec<u8>> {
        match value {
            serde_json::Value::String(s) => Ok(s.as_bytes().to_vec()),
            other => serde_json::to_vec(other).map_err(Into::into),
        }
    }

    fn unmarshal(&self, raw: &[u8]) -> Result<serde_json::Value> {
        if let Ok(value) = serde_json::from_slice::<serde_json::Value>(raw) {
            return Ok(value);
        }
        let text = std::str::from_utf8(raw)
            .map_err(|e| Error::Codec(format!("plain value is not utf-8: {}", e)))?;
        Ok(serde_json::Value::String(text.to_string()))
    }
}

/// The default codec.
pub fn json() -> SharedCodec {
    Arc::new(JsonCodec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct User {
        name: String,
        age: u32,
    }

    #[test]
    fn test_json_struct() {
        let user = User {
            name: "alice".to_string(),
            age: 30,
        };
        let raw = encode(&JsonCodec, &user).unwrap();
        assert_eq!(raw, br#"{"age":30,"name":"alice"}"#);

        let back: User = decode(&JsonCodec, &raw).unwrap();
        assert_eq!(back, user);
    }

    #[test]
    fn test_json_string_is_quoted() {
        let raw = encode(&JsonCodec, "alice").unwrap();
        assert_eq!(raw, b"\"alice\"");
    }

    #[test]
    fn test_json_nil_encoding() {
        let raw = encode(&JsonCodec, &Option::<u32>::None).unwrap();
        assert!(JsonCodec.is_nil(&raw));
        assert!(!JsonCodec.is_nil(b"0"));
    }

    #[test]
    fn test_json_rejects_garbage() {
        let err = decode::<u32>(&JsonCodec, b"not json").unwrap_err();
        assert!(matches!(err, Error::Codec(_)));
    }

    #[test]
    fn test_plain_string_is_bare() {
        let raw = encode(&PlainCodec, "alice").unwrap();
        assert_eq!(raw, b"alice");

        let back: String = decode(&PlainCodec, &raw).unwrap();
        assert_eq!(back, "alice");
    }

    #[test]
    fn test_plain_numbers_use_json() {
        let raw = encode(&PlainCodec, &42u64).unwrap();
        assert_eq!(raw, b"42");

        let back: u64 = decode(&PlainCodec, &raw).unwrap();
        assert_eq!(back, 42);
    }

    #[test]
    fn test_plain_rejects_invalid_utf8() {
        let err = decode::<String>(&PlainCodec, &[0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, Error::Codec(_)));
    }

    #[test]
    fn test_codec_debug() {
        let codec = json();
        assert_eq!(format!("{:?}", codec), "Codec(json)");
    }
}
