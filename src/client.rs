//! Client facade.
//!
//! [`Client`] holds one service per data type, all built over one shared
//! [`ServiceConfig`], and implements every capability trait by delegation.
//! Code that only needs the capabilities should depend on [`Store`] (or the
//! narrower `*Ops` traits), not on `Client`.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::{Config, ServiceConfig};
use crate::driver::{Driver, KeyTtl};
use crate::error::Result;
use crate::hash::{HashOps, HashService};
use crate::key::{KeyOps, KeyService};
use crate::memory::MemoryDriver;
use crate::options::CallOption;
use crate::set::{SetOps, SetService};
use crate::string::{StringOps, StringService};
use crate::value::{Value, ValueList, ValueMap};

/// Every capability of the typed store.
pub trait Store: KeyOps + StringOps + HashOps + SetOps {}

impl<T: KeyOps + StringOps + HashOps + SetOps> Store for T {}

/// Typed access to a Redis-compatible store.
///
/// Cheap to clone; clones share the driver and defaults. Safe to use from
/// many tasks at once: every call works on its own copy of the options.
#[derive(Clone)]
pub struct Client {
    config: Arc<ServiceConfig>,
    keys: KeyService,
    strings: StringService,
    hashes: HashService,
    sets: SetService,
}

impl Client {
    /// Build every service over `config`.
    pub fn new(config: ServiceConfig) -> Self {
        let config = Arc::new(config);
        info!(
            codec = config.codec().name(),
            key_prefix = config.key_prefix(),
            "typed store client created"
        );
        Self {
            keys: KeyService::new(config.clone()),
            strings: StringService::new(config.clone()),
            hashes: HashService::new(config.clone()),
            sets: SetService::new(config.clone()),
            config,
        }
    }

    /// Build from a driver and serializable config.
    pub fn from_config(driver: Arc<dyn Driver>, config: &Config) -> Result<Self> {
        Ok(Self::new(ServiceConfig::new(driver, config)?))
    }

    /// A client over a fresh [`MemoryDriver`] with default settings.
    pub fn memory() -> Self {
        Self::new(ServiceConfig::builder(Arc::new(MemoryDriver::new())).build())
    }

    /// Connect to the Redis server at `url` and build from `config`.
    #[cfg(feature = "redis")]
    pub async fn redis(url: &str, config: &Config) -> Result<Self> {
        config.validate()?;
        let driver = crate::redis_driver::RedisDriver::connect(url).await?;
        Self::from_config(Arc::new(driver), config)
    }

    /// Key-level operations.
    pub fn keys(&self) -> &KeyService {
        &self.keys
    }

    /// String operations.
    pub fn strings(&self) -> &StringService {
        &self.strings
    }

    /// Hash operations.
    pub fn hashes(&self) -> &HashService {
        &self.hashes
    }

    /// Set operations.
    pub fn sets(&self) -> &SetService {
        &self.sets
    }

    /// The shared defaults.
    pub fn config(&self) -> &Arc<ServiceConfig> {
        &self.config
    }
}

#[async_trait]
impl KeyOps for Client {
    async fn key_exists(&self, key: &str, opts: &[CallOption]) -> Result<bool> {
        self.keys.key_exists(key, opts).await
    }

    async fn key_delete(&self, keys: &[&str], opts: &[CallOption]) -> Result<usize> {
        self.keys.key_delete(keys, opts).await
    }

    async fn key_expire(&self, key: &str, ttl: Duration, opts: &[CallOption]) -> Result<bool> {
        self.keys.key_expire(key, ttl, opts).await
    }

    async fn key_persist(&self, key: &str, opts: &[CallOption]) -> Result<bool> {
        self.keys.key_persist(key, opts).await
    }

    async fn key_ttl(&self, key: &str, opts: &[CallOption]) -> Result<KeyTtl> {
        self.keys.key_ttl(key, opts).await
    }
}

#[async_trait]
impl StringOps for Client {
    async fn string_get(&self, key: &str, opts: &[CallOption]) -> Value {
        self.strings.string_get(key, opts).await
    }

    async fn string_set<T>(&self, key: &str, value: &T, opts: &[CallOption]) -> Result<()>
    where
        T: Serialize + ?Sized + Sync,
    {
        self.strings.string_set(key, value, opts).await
    }

    async fn string_set_nx<T>(&self, key: &str, value: &T, opts: &[CallOption]) -> Result<bool>
    where
        T: Serialize + ?Sized + Sync,
    {
        self.strings.string_set_nx(key, value, opts).await
    }

    async fn string_delete(&self, key: &str, opts: &[CallOption]) -> Result<bool> {
        self.strings.string_delete(key, opts).await
    }
}

#[async_trait]
impl HashOps for Client {
    async fn hash_get(&self, key: &str, field: &str, opts: &[CallOption]) -> Value {
        self.hashes.hash_get(key, field, opts).await
    }

    async fn hash_get_all(&self, key: &str, opts: &[CallOption]) -> Result<ValueMap> {
        self.hashes.hash_get_all(key, opts).await
    }

    async fn hash_field_exists(
        &self,
        key: &str,
        field: &str,
        opts: &[CallOption],
    ) -> Result<bool> {
        self.hashes.hash_field_exists(key, field, opts).await
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
        self.hashes.hash_set_one(key, field, value, opts).await
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
        self.hashes.hash_set(key, values, opts).await
    }

    async fn hash_delete(&self, key: &str, fields: &[&str], opts: &[CallOption]) -> Result<()> {
        self.hashes.hash_delete(key, fields, opts).await
    }
}

#[async_trait]
impl SetOps for Client {
    async fn set_members(&self, key: &str, opts: &[CallOption]) -> Result<ValueList> {
        self.sets.set_members(key, opts).await
    }

    async fn set_add_member<T>(&self, key: &str, value: &T, opts: &[CallOption]) -> Result<()>
    where
        T: Serialize + ?Sized + Sync,
    {
        self.sets.set_add_member(key, value, opts).await
    }

    async fn set_remove_member<T>(&self, key: &str, value: &T, opts: &[CallOption]) -> Result<()>
    where
        T: Serialize + ?Sized + Sync,
    {
        self.sets.set_remove_member(key, value, opts).await
    }

    async fn set_is_member<T>(&self, key: &str, value: &T, opts: &[CallOption]) -> Result<bool>
    where
        T: Serialize + ?Sized + Sync,
    {
        self.sets.set_is_member(key, value, opts).await
    }
}
