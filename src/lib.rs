//! # typed-kv
//!
//! Typed access to a Redis-compatible key-value store.
//!
//! Callers get structured string, hash, set and key operations instead of
//! raw byte commands:
//!
//! - **Result values**: every read yields a [`Value`] that keeps "absent",
//!   "explicit nil", "transport error" and "bytes" apart, and decodes lazily
//!   into whatever type the caller asks for.
//! - **Call options**: each call starts from the client's defaults (context,
//!   key prefix, codec, TTL) and applies per-call overrides in order, on its
//!   own copy.
//! - **Atomic write + expire**: multi-field hash writes with a TTL go to the
//!   store as one transaction.
//!
//! ## Drivers
//!
//! The store itself sits behind the [`Driver`] trait.
//!
//! - [`MemoryDriver`]: In-process store with Redis semantics (testing and development)
//! - `RedisDriver`: A Redis server over a managed connection (`redis` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use typed_kv::{Client, HashOps};
//!
//! #[tokio::main]
//! async fn main() -> typed_kv::Result<()> {
//!     let client = Client::memory();
//!
//!     client.hash_set_one("user:1", "name", "alice", &[]).await?;
//!
//!     let name = client.hash_get("user:1", "name", &[]).await;
//!     println!("name: {}", name.decode::<String>()?);
//!
//!     let missing = client.hash_get("user:1", "email", &[]).await;
//!     assert!(!missing.exists());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Per-call overrides
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use std::time::Duration;
//! use typed_kv::options::{with_key_prefix, with_timeout, with_ttl_secs};
//! use typed_kv::{Client, HashOps, SetOps};
//!
//! #[tokio::main]
//! async fn main() -> typed_kv::Result<()> {
//!     let client = Client::memory();
//!
//!     // Fields and expiration are written atomically.
//!     let session = HashMap::from([("user".to_string(), "alice")]);
//!     client
//!         .hash_set("session:42", &session, &[with_ttl_secs(3600)])
//!         .await?;
//!
//!     // A different namespace and a tighter deadline, for this call only.
//!     client
//!         .set_add_member(
//!             "tags",
//!             "rust",
//!             &[with_key_prefix("tenant-a:"), with_timeout(Duration::from_millis(50))],
//!         )
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod hash;
pub mod key;
pub mod memory;
pub mod options;
#[cfg(feature = "redis")]
pub mod redis_driver;
pub mod set;
pub mod string;
pub mod value;

// Re-export main types
pub use client::{Client, Store};
pub use codec::{Codec, JsonCodec, PlainCodec, SharedCodec};
pub use config::{CodecKind, Config, ServiceConfig};
pub use context::{CancelHandle, Context};
pub use driver::{Command, Driver, KeyTtl, Reply};
pub use error::{DecodeError, Error, Result};
pub use hash::{HashOps, HashService};
pub use key::{KeyOps, KeyService};
pub use memory::MemoryDriver;
pub use options::{CallOption, CallOptions, Ttl};
#[cfg(feature = "redis")]
pub use redis_driver::RedisDriver;
pub use set::{SetOps, SetService};
pub use string::{StringOps, StringService};
pub use value::{Value, ValueList, ValueMap};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::client::{Client, Store};
    pub use crate::context::Context;
    pub use crate::error::{DecodeError, Error, Result};
    pub use crate::hash::HashOps;
    pub use crate::key::KeyOps;
    pub use crate::options::{
        with_codec, with_context, with_key_prefix, with_timeout, with_ttl, with_ttl_secs,
        without_expiration, CallOption, Ttl,
    };
    pub use crate::set::SetOps;
    pub use crate::string::StringOps;
    pub use crate::value::Value;
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use proptest::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Record {
        id: u64,
        name: String,
        tags: Vec<String>,
        score: Option<i32>,
    }

    fn record() -> impl Strategy<Value = Record> {
        (
            any::<u64>(),
            "[a-zA-Z0-9 ]{0,16}",
            prop::collection::vec("[a-z]{1,8}", 0..4),
            any::<Option<i32>>(),
        )
            .prop_map(|(id, name, tags, score)| Record {
                id,
                name,
                tags,
                score,
            })
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_memory_client_basic() {
        let client = Client::memory();

        client.string_set("greeting", "hello", &[]).await.unwrap();
        let value = client.string_get("greeting", &[]).await;
        assert_eq!(value.decode::<String>().unwrap(), "hello");
    }

    #[test]
    fn test_tracing_does_not_need_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        runtime().block_on(async {
            let client = Client::memory();
            client.key_delete(&["x"], &[]).await.unwrap();
        });
    }

    proptest! {
        #[test]
        fn hash_round_trip(value in record(), field in "[a-z]{1,8}") {
            let rt = runtime();
            let decoded: Record = rt.block_on(async {
                let client = Client::memory();
                client.hash_set_one("records", &field, &value, &[]).await.unwrap();
                client.hash_get("records", &field, &[]).await.decode().unwrap()
            });
            prop_assert_eq!(decoded, value);
        }

        #[test]
        fn string_round_trip(value in record(), prefix in "[a-z]{0,4}:") {
            let rt = runtime();
            let decoded: Record = rt.block_on(async {
                let client = Client::memory();
                let opts = [with_key_prefix(prefix)];
                client.string_set("r", &value, &opts).await.unwrap();
                client.string_get("r", &opts).await.decode().unwrap()
            });
            prop_assert_eq!(decoded, value);
        }

        #[test]
        fn set_membership_round_trip(members in prop::collection::hash_set("[a-z]{1,6}", 0..8)) {
            let rt = runtime();
            let (found, all) = rt.block_on(async {
                let client = Client::memory();
                for m in &members {
                    client.set_add_member("s", m, &[]).await.unwrap();
                }
                let mut found = true;
                for m in &members {
                    found &= client.set_is_member("s", m, &[]).await.unwrap();
                }
                let all: Vec<String> = client
                    .set_members("s", &[])
                    .await
                    .unwrap()
                    .iter()
                    .map(|v| v.decode().unwrap())
                    .collect();
                (found, all)
            });
            prop_assert!(found);
            prop_assert_eq!(all.len(), members.len());
            prop_assert!(all.iter().all(|m| members.contains(m)));
        }
    }
}
