//! Key service - the shared base of every data-type service.
//!
//! Holds the shared [`ServiceConfig`], derives per-call options, and offers
//! the key-level primitives (exists, delete, expire, persist, ttl) that work
//! the same whatever the key holds.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::ServiceConfig;
use crate::driver::{Driver, KeyTtl};
use crate::error::Result;
use crate::options::{CallOption, CallOptions};

/// Key-level operations.
#[async_trait]
pub trait KeyOps: Send + Sync {
    /// Whether `key` exists.
    async fn key_exists(&self, key: &str, opts: &[CallOption]) -> Result<bool>;

    /// Delete keys. Returns how many existed.
    async fn key_delete(&self, keys: &[&str], opts: &[CallOption]) -> Result<usize>;

    /// Set `key` to expire after `ttl`. Returns false if it does not exist.
    async fn key_expire(&self, key: &str, ttl: Duration, opts: &[CallOption]) -> Result<bool>;

    /// Remove the expiration of `key`. Returns true if one was removed.
    async fn key_persist(&self, key: &str, opts: &[CallOption]) -> Result<bool>;

    /// Remaining lifetime of `key`.
    async fn key_ttl(&self, key: &str, opts: &[CallOption]) -> Result<KeyTtl>;
}

/// Shared base service.
#[derive(Clone)]
pub struct KeyService {
    config: Arc<ServiceConfig>,
}

impl KeyService {
    /// Create over shared defaults.
    pub fn new(config: Arc<ServiceConfig>) -> Self {
        Self { config }
    }

    /// A fresh copy of the defaults for one call.
    pub fn create_default_call_options(&self) -> CallOptions {
        self.config.call_options()
    }

    /// Defaults with the caller's overrides applied.
    ///
    /// The configured timeout still bounds the call when an override
    /// replaced the context.
    pub fn prepare(&self, opts: &[CallOption]) -> CallOptions {
        let mut options = self.create_default_call_options();
        options.apply(opts);
        if let Some(timeout) = self.config.timeout() {
            options.ctx = options.ctx.with_timeout(timeout);
        }
        options
    }

    /// The driver handle.
    pub fn driver(&self) -> &dyn Driver {
        &**self.config.driver()
    }

    /// The shared defaults.
    pub fn config(&self) -> &Arc<ServiceConfig> {
        &self.config
    }
}

#[async_trait]
impl KeyOps for KeyService {
    async fn key_exists(&self, key: &str, opts: &[CallOption]) -> Result<bool> {
        let options = self.prepare(opts);
        let key = options.resolve_key(key)?;
        debug!(key = %key, "key_exists");

        let count = options.ctx.run(self.driver().exists(&[key])).await?;
        Ok(count > 0)
    }

    async fn key_delete(&self, keys: &[&str], opts: &[CallOption]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let options = self.prepare(opts);
        let keys = keys
            .iter()
            .map(|k| options.resolve_key(k))
            .collect::<Result<Vec<_>>>()?;
        debug!(keys = ?keys, "key_delete");

        options.ctx.run(self.driver().del(&keys)).await
    }

    async fn key_expire(&self, key: &str, ttl: Duration, opts: &[CallOption]) -> Result<bool> {
        let options = self.prepare(opts);
        let key = options.resolve_key(key)?;
        debug!(key = %key, ttl = ?ttl, "key_expire");

        options.ctx.run(self.driver().expire(&key, ttl)).await
    }

    async fn key_persist(&self, key: &str, opts: &[CallOption]) -> Result<bool> {
        let options = self.prepare(opts);
        let key = options.resolve_key(key)?;
        debug!(key = %key, "key_persist");

        options.ctx.run(self.driver().persist(&key)).await
    }

    async fn key_ttl(&self, key: &str, opts: &[CallOption]) -> Result<KeyTtl> {
        let options = self.prepare(opts);
        let key = options.resolve_key(key)?;
        debug!(key = %key, "key_ttl");

        options.ctx.run(self.driver().ttl(&key)).await
    }
}
