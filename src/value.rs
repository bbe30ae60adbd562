//! The outcome of a read.
//!
//! A [`Value`] keeps the four outcomes of a store read apart: the key or
//! field was absent, the store held an explicit nil, the round trip failed,
//! or bytes came back. Present bytes are decoded lazily with the codec bound
//! when the value was built, so one value can be decoded into different
//! types at different call sites without another round trip.

use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;

use crate::codec::{self, SharedCodec};
use crate::driver::Reply;
use crate::error::{DecodeError, Error, Result};

/// Field name to value, as returned by hash reads.
pub type ValueMap = HashMap<String, Value>;

/// Values in store order, as returned by set reads.
pub type ValueList = Vec<Value>;

enum State {
    Absent,
    Nil(Vec<u8>),
    Failed(Error),
    Present(Vec<u8>),
}

/// Result of a single read.
pub struct Value {
    state: State,
    codec: SharedCodec,
}

impl Value {
    /// The key or field was not in the store.
    pub fn absent(codec: SharedCodec) -> Self {
        Self {
            state: State::Absent,
            codec,
        }
    }

    /// The store holds `raw`, the codec's encoding of nil.
    pub fn nil(raw: Vec<u8>, codec: SharedCodec) -> Self {
        Self {
            state: State::Nil(raw),
            codec,
        }
    }

    /// The read itself failed.
    pub fn failed(err: Error, codec: SharedCodec) -> Self {
        Self {
            state: State::Failed(err),
            codec,
        }
    }

    /// Bytes came back; `codec` decodes them on demand.
    pub fn present(raw: Vec<u8>, codec: SharedCodec) -> Self {
        Self {
            state: State::Present(raw),
            codec,
        }
    }

    /// Build from a driver read reply.
    ///
    /// The nil reply means absence. Bytes the codec recognises as its own nil
    /// encoding mean an explicit nil.
    pub fn from_reply(reply: Reply, codec: SharedCodec) -> Self {
        match reply {
            Reply::Nil => Self::absent(codec),
            Reply::Bulk(raw) if codec.is_nil(&raw) => Self::nil(raw, codec),
            Reply::Bulk(raw) => Self::present(raw, codec),
        }
    }

    /// Build from a driver read result, routing errors into the value.
    pub fn from_result(result: Result<Reply>, codec: SharedCodec) -> Self {
        match result {
            Ok(reply) => Self::from_reply(reply, codec),
            Err(err) => Self::failed(err, codec),
        }
    }

    /// False only when the key or field was absent.
    pub fn exists(&self) -> bool {
        !matches!(self.state, State::Absent)
    }

    /// True when the store holds an explicit nil.
    pub fn is_nil(&self) -> bool {
        matches!(self.state, State::Nil(_))
    }

    /// The transport or driver failure, if the read failed.
    pub fn error(&self) -> Option<&Error> {
        match &self.state {
            State::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// The stored bytes, if the read returned any.
    pub fn raw(&self) -> Option<&[u8]> {
        match &self.state {
            State::Present(raw) | State::Nil(raw) => Some(raw.as_slice()),
            _ => None,
        }
    }

    /// The codec bound at construction.
    pub fn codec(&self) -> &SharedCodec {
        &self.codec
    }

    /// Decode into `T`.
    ///
    /// Fails with the read's own error, with [`DecodeError::Absent`] when
    /// there are no bytes, with [`DecodeError::Nil`] when the stored nil does
    /// not fit `T`, or with [`DecodeError::Codec`] when the codec rejects the
    /// bytes. A nil decodes into targets that accept it, such as `Option<T>`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        match &self.state {
            State::Failed(err) => Err(err.clone()),
            State::Absent => Err(DecodeError::Absent.into()),
            State::Nil(raw) => {
                codec::decode(self.codec.as_ref(), raw).map_err(|_| DecodeError::Nil.into())
            }
            State::Present(raw) => codec::decode(self.codec.as_ref(), raw)
                .map_err(|e| DecodeError::Codec(e.to_string()).into()),
        }
    }

    /// Decode into `T`, mapping absence and nil to `None`.
    pub fn decode_opt<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        match &self.state {
            State::Absent => Ok(None),
            _ => self.decode::<Option<T>>(),
        }
    }

    /// The stored bytes as UTF-8 text, bypassing the codec.
    pub fn as_string(&self) -> Result<String> {
        match &self.state {
            State::Failed(err) => Err(err.clone()),
            State::Absent => Err(DecodeError::Absent.into()),
            State::Present(raw) | State::Nil(raw) => String::from_utf8(raw.clone())
                .map_err(|e| DecodeError::Codec(e.to_string()).into()),
        }
    }

    /// Split into the read error and the value itself.
    pub fn into_result(self) -> Result<Self> {
        match self.state {
            State::Failed(err) => Err(err),
            _ => Ok(self),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            State::Absent => write!(f, "Value::Absent"),
            State::Nil(_) => write!(f, "Value::Nil"),
            State::Failed(err) => write!(f, "Value::Failed({})", err),
            State::Present(raw) => write!(
                f,
                "Value::Present({}, {:?})",
                self.codec.name(),
                String::from_utf8_lossy(raw)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{json, PlainCodec};
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct User {
        name: String,
    }

    #[test]
    fn test_absent() {
        let value = Value::from_reply(Reply::Nil, json());
        assert!(!value.exists());
        assert!(!value.is_nil());
        assert!(value.error().is_none());
        assert!(value.raw().is_none());
        assert_eq!(
            value.decode::<String>(),
            Err(Error::Decode(DecodeError::Absent))
        );
        assert_eq!(value.decode_opt::<String>(), Ok(None));
    }

    #[test]
    fn test_nil() {
        let value = Value::from_reply(Reply::Bulk(b"null".to_vec()), json());
        assert!(value.exists());
        assert!(value.is_nil());
        assert!(value.error().is_none());
        assert_eq!(value.raw(), Some(&b"null"[..]));
        assert_eq!(value.decode::<u32>(), Err(Error::Decode(DecodeError::Nil)));
        assert_eq!(value.decode::<Option<u32>>(), Ok(None));
        assert_eq!(value.decode::<()>(), Ok(()));
        assert_eq!(value.decode_opt::<u32>(), Ok(None));
    }

    #[test]
    fn test_present_null_decodes_into_option() {
        let value = Value::present(b"null".to_vec(), json());
        assert!(!value.is_nil());
        assert_eq!(value.decode::<Option<u32>>(), Ok(None));
        assert_eq!(value.decode_opt::<u32>(), Ok(None));

        let value = Value::present(b"7".to_vec(), json());
        assert_eq!(value.decode_opt::<u32>(), Ok(Some(7)));
    }

    #[test]
    fn test_failed() {
        let err = Error::Driver("connection refused".to_string());
        let value = Value::from_result(Err(err.clone()), json());
        assert!(value.exists());
        assert!(!value.is_nil());
        assert_eq!(value.error(), Some(&err));
        assert_eq!(value.decode::<String>(), Err(err.clone()));
        assert_eq!(value.decode_opt::<String>(), Err(err.clone()));
        assert_eq!(value.into_result().unwrap_err(), err);
    }

    #[test]
    fn test_present_decodes_repeatedly() {
        let value = Value::present(br#"{"name":"alice"}"#.to_vec(), json());
        assert!(value.exists());
        assert!(value.error().is_none());

        let user: User = value.decode().unwrap();
        assert_eq!(user.name, "alice");

        // Same bytes, different target type.
        let raw: serde_json::Value = value.decode().unwrap();
        assert_eq!(raw["name"], "alice");
        assert_eq!(value.as_string().unwrap(), r#"{"name":"alice"}"#);
    }

    #[test]
    fn test_codec_error_on_decode() {
        let value = Value::present(b"not json".to_vec(), json());
        let err = value.decode::<User>().unwrap_err();
        assert!(matches!(err, Error::Decode(DecodeError::Codec(_))));

        let value = Value::present(b"\"alice\"".to_vec(), json());
        assert!(matches!(
            value.decode::<u64>(),
            Err(Error::Decode(DecodeError::Codec(_)))
        ));
    }

    #[test]
    fn test_bound_codec_is_used() {
        let value = Value::from_reply(Reply::Bulk(b"alice".to_vec()), Arc::new(PlainCodec));
        assert_eq!(value.decode::<String>().unwrap(), "alice");
        assert_eq!(value.codec().name(), "plain");

        // The plain codec has no nil encoding.
        let value = Value::from_reply(Reply::Bulk(b"null".to_vec()), Arc::new(PlainCodec));
        assert!(!value.is_nil());
        assert_eq!(value.decode::<Option<String>>(), Ok(None));
    }

    #[test]
    fn test_debug() {
        let value = Value::present(b"1".to_vec(), json());
        assert_eq!(format!("{:?}", value), "Value::Present(json, \"1\")");
        assert_eq!(format!("{:?}", Value::absent(json())), "Value::Absent");
    }
}
