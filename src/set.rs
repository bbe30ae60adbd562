//! Set service.
//!
//! A set that does not exist reads as an empty set, unlike string and hash
//! reads which report absence. Membership is decided on encoded bytes, so
//! probes must be encoded with the codec the members were written with.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::codec;
use crate::config::ServiceConfig;
use crate::error::Result;
use crate::key::KeyService;
use crate::options::CallOption;
use crate::value::{Value, ValueList};

/// Operations on set keys.
#[async_trait]
pub trait SetOps: Send + Sync {
    /// Every member. Empty when the set does not exist.
    async fn set_members(&self, key: &str, opts: &[CallOption]) -> Result<ValueList>;

    /// Add a member.
    async fn set_add_member<T>(&self, key: &str, value: &T, opts: &[CallOption]) -> Result<()>
    where
        T: Serialize + ?Sized + Sync;

    /// Remove a member. Removing a non-member is not an error.
    async fn set_remove_member<T>(&self, key: &str, value: &T, opts: &[CallOption]) -> Result<()>
    where
        T: Serialize + ?Sized + Sync;

    /// Whether the encoded `value` is a member.
    async fn set_is_member<T>(&self, key: &str, value: &T, opts: &[CallOption]) -> Result<bool>
    where
        T: Serialize + ?Sized + Sync;
}

/// Set service.
#[derive(Clone)]
pub struct SetService {
    base: KeyService,
}

impl SetService {
    /// Create over shared defaults.
    pub fn new(config: Arc<ServiceConfig>) -> Self {
        Self {
            base: KeyService::new(config),
        }
    }
}

#[async_trait]
impl SetOps for SetService {
    async fn set_members(&self, key: &str, opts: &[CallOption]) -> Result<ValueList> {
        let options = self.base.prepare(opts);
        let key = options.resolve_key(key)?;
        debug!(key = %key, "set_members");

        let members = options.ctx.run(self.base.driver().smembers(&key)).await?;
        trace!(key = %key, members = members.len(), "set_members reply");
        Ok(members
            .into_iter()
            .map(|raw| Value::present(raw, options.codec.clone()))
            .collect())
    }

    async fn set_add_member<T>(&self, key: &str, value: &T, opts: &[CallOption]) -> Result<()>
    where
        T: Serialize + ?Sized + Sync,
    {
        let options = self.base.prepare(opts);
        let member = codec::encode(options.codec.as_ref(), value)?;
        let key = options.resolve_key(key)?;
        debug!(key = %key, "set_add_member");

        options
            .ctx
            .run(self.base.driver().sadd(&key, vec![member]))
            .await?;
        Ok(())
    }

    async fn set_remove_member<T>(&self, key: &str, value: &T, opts: &[CallOption]) -> Result<()>
    where
        T: Serialize + ?Sized + Sync,
    {
        let options = self.base.prepare(opts);
        let member = codec::encode(options.codec.as_ref(), value)?;
        let key = options.resolve_key(key)?;
        debug!(key = %key, "set_remove_member");

        options
            .ctx
            .run(self.base.driver().srem(&key, &[member]))
            .await?;
        Ok(())
    }

    async fn set_is_member<T>(&self, key: &str, value: &T, opts: &[CallOption]) -> Result<bool>
    where
        T: Serialize + ?Sized + Sync,
    {
        let options = self.base.prepare(opts);
        let member = codec::encode(options.codec.as_ref(), value)?;
        let key = options.resolve_key(key)?;
        debug!(key = %key, "set_is_member");

        options
            .ctx
            .run(self.base.driver().sismember(&key, &member))
            .await
    }
}
