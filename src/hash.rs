//! Hash service.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::codec;
use crate::config::ServiceConfig;
use crate::driver::Command;
use crate::error::Result;
use crate::key::KeyService;
use crate::options::CallOption;
use crate::value::{Value, ValueMap};

/// Operations on hash keys.
#[async_trait]
pub trait HashOps: Send + Sync {
    /// Read one field.
    async fn hash_get(&self, key: &str, field: &str, opts: &[CallOption]) -> Value;

    /// Read every field. Empty when the hash does not exist.
    async fn hash_get_all(&self, key: &str, opts: &[CallOption]) -> Result<ValueMap>;

    /// Whether `field` is set.
    async fn hash_field_exists(&self, key: &str, field: &str, opts: &[CallOption])
        -> Result<bool>;

    /// Write one field. Never touches the key's expiration.
    async fn hash_set_one<T>(
        &self,
        key: &str,
        field: &str,
        value: &T,
        opts: &[CallOption],
    ) -> Result<()>
    where
        T: Serialize + ?Sized + Sync;

    /// Write several fields. With a TTL in the options, the write and the
    /// expiration are applied as one atomic unit.
    async fn hash_set<T>(
        &self,
        key: &str,
        values: &HashMap<String, T>,
        opts: &[CallOption],
    ) -> Result<()>
    where
        T: Serialize + Sync;

    /// Remove fields. Missing fields are ignored.
    async fn hash_delete(&self, key: &str, fields: &[&str], opts: &[CallOption]) -> Result<()>;
}

/// Hash service.
#[derive(Clone)]
pub struct HashService {
    base: KeyService,
}

impl HashService {
    /// Create over shared defaults.
    pub fn new(config: Arc<ServiceConfig>) -> Self {
        Self {
            base: KeyService::new(config),
        }
    }
}

#[async_trait]
impl HashOps for HashService {
    async fn hash_get(&self, key: &str, field: &str, opts: &[CallOption]) -> Value {
        let options = self.base.prepare(opts);
        let key = match options.resolve_key(key) {
            Ok(key) => key,
            Err(err) => return Value::failed(err, options.codec),
        };
        debug!(key = %key, field = %field, "hash_get");

        let reply = options.ctx.run(self.base.driver().hget(&key, field)).await;
        trace!(key = %key, field = %field, reply = ?reply, "hash_get reply");
        Value::from_result(reply, options.codec)
    }

    async fn hash_get_all(&self, key: &str, opts: &[CallOption]) -> Result<ValueMap> {
        let options = self.base.prepare(opts);
        let key = options.resolve_key(key)?;
        debug!(key = %key, "hash_get_all");

        let fields = options.ctx.run(self.base.driver().hgetall(&key)).await?;
        trace!(key = %key, fields = fields.len(), "hash_get_all reply");
        Ok(fields
            .into_iter()
            .map(|(field, raw)| {
                let value = Value::present(raw, options.codec.clone());
                (field, value)
            })
            .collect())
    }

    async fn hash_field_exists(
        &self,
        key: &str,
        field: &str,
        opts: &[CallOption],
    ) -> Result<bool> {
        let options = self.base.prepare(opts);
        let key = options.resolve_key(key)?;
        debug!(key = %key, field = %field, "hash_field_exists");

        let reply = options.ctx.run(self.base.driver().hget(&key, field)).await?;
        Ok(!reply.is_nil())
    }

    async fn hash_set_one<T>(
        &self,
        key: &str,
        field: &str,
        value: &T,
        opts: &[CallOption],
    ) -> Result<()>
    where
        T: Serialize + ?Sized + Sync,
    {
        let options = self.base.prepare(opts);
        let data = codec::encode(options.codec.as_ref(), value)?;
        let key = options.resolve_key(key)?;
        debug!(key = %key, field = %field, "hash_set_one");

        options
            .ctx
            .run(self.base.driver().hset(&key, vec![(field.to_string(), data)]))
            .await?;
        Ok(())
    }

    async fn hash_set<T>(
        &self,
        key: &str,
        values: &HashMap<String, T>,
        opts: &[CallOption],
    ) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let options = self.base.prepare(opts);
        let mut fields = Vec::with_capacity(values.len());
        for (field, value) in values {
            fields.push((field.clone(), codec::encode(options.codec.as_ref(), value)?));
        }
        if fields.is_empty() {
            // HSET needs at least one field.
            return Ok(());
        }
        let key = options.resolve_key(key)?;
        debug!(key = %key, fields = fields.len(), ttl = ?options.ttl, "hash_set");

        let driver = self.base.driver();
        match options.ttl.duration() {
            None => {
                options.ctx.run(driver.hset(&key, fields)).await?;
            }
            Some(ttl) => {
                let commands = vec![Command::hset(key.clone(), fields), Command::expire(key, ttl)];
                options.ctx.run(driver.exec(commands)).await?;
            }
        }
        Ok(())
    }

    async fn hash_delete(&self, key: &str, fields: &[&str], opts: &[CallOption]) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let options = self.base.prepare(opts);
        let key = options.resolve_key(key)?;
        let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        debug!(key = %key, fields = ?fields, "hash_delete");

        options
            .ctx
            .run(self.base.driver().hdel(&key, &fields))
            .await?;
        Ok(())
    }
}
