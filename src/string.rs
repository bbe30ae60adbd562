//! String service.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::codec;
use crate::config::ServiceConfig;
use crate::error::Result;
use crate::key::KeyService;
use crate::options::CallOption;
use crate::value::Value;

/// Operations on string keys.
#[async_trait]
pub trait StringOps: Send + Sync {
    /// Read `key`.
    async fn string_get(&self, key: &str, opts: &[CallOption]) -> Value;

    /// Write `key`. A TTL in the options is applied by the same command;
    /// without one the key keeps its current expiration.
    async fn string_set<T>(&self, key: &str, value: &T, opts: &[CallOption]) -> Result<()>
    where
        T: Serialize + ?Sized + Sync;

    /// Write `key` only if it does not exist. Returns true if written.
    async fn string_set_nx<T>(&self, key: &str, value: &T, opts: &[CallOption]) -> Result<bool>
    where
        T: Serialize + ?Sized + Sync;

    /// Delete `key`. Returns true if it existed.
    async fn string_delete(&self, key: &str, opts: &[CallOption]) -> Result<bool>;
}

/// String service.
#[derive(Clone)]
pub struct StringService {
    base: KeyService,
}

impl StringService {
    /// Create over shared defaults.
    pub fn new(config: Arc<ServiceConfig>) -> Self {
        Self {
            base: KeyService::new(config),
        }
    }
}

#[async_trait]
impl StringOps for StringService {
    async fn string_get(&self, key: &str, opts: &[CallOption]) -> Value {
        let options = self.base.prepare(opts);
        let key = match options.resolve_key(key) {
            Ok(key) => key,
            Err(err) => return Value::failed(err, options.codec),
        };
        debug!(key = %key, "string_get");

        let reply = options.ctx.run(self.base.driver().get(&key)).await;
        trace!(key = %key, reply = ?reply, "string_get reply");
        Value::from_result(reply, options.codec)
    }

    async fn string_set<T>(&self, key: &str, value: &T, opts: &[CallOption]) -> Result<()>
    where
        T: Serialize + ?Sized + Sync,
    {
        let options = self.base.prepare(opts);
        let data = codec::encode(options.codec.as_ref(), value)?;
        let key = options.resolve_key(key)?;
        debug!(key = %key, ttl = ?options.ttl, "string_set");

        options
            .ctx
            .run(self.base.driver().set(&key, data, options.ttl.duration()))
            .await
    }

    async fn string_set_nx<T>(&self, key: &str, value: &T, opts: &[CallOption]) -> Result<bool>
    where
        T: Serialize + ?Sized + Sync,
    {
        let options = self.base.prepare(opts);
        let data = codec::encode(options.codec.as_ref(), value)?;
        let key = options.resolve_key(key)?;
        debug!(key = %key, ttl = ?options.ttl, "string_set_nx");

        options
            .ctx
            .run(self.base.driver().set_nx(&key, data, options.ttl.duration()))
            .await
    }

    async fn string_delete(&self, key: &str, opts: &[CallOption]) -> Result<bool> {
        let options = self.base.prepare(opts);
        let key = options.resolve_key(key)?;
        debug!(key = %key, "string_delete");

        let removed = options.ctx.run(self.base.driver().del(&[key])).await?;
        Ok(removed > 0)
    }
}
