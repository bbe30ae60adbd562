//! Driver trait - the boundary to the backing store.
//!
//! A driver owns the transport to a Redis-compatible store and exposes one
//! method per command the services need, plus [`Driver::exec`] for atomic
//! multi-command units. Keys reaching a driver are already prefixed; values
//! are already encoded.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Reply to a single-value read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The store's nil reply: nothing stored under the key or field.
    Nil,
    /// Stored bytes.
    Bulk(Vec<u8>),
}

impl Reply {
    /// Returns the bytes, if any.
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Reply::Nil => None,
            Reply::Bulk(bytes) => Some(bytes),
        }
    }

    /// Returns true for the nil reply.
    pub fn is_nil(&self) -> bool {
        matches!(self, Reply::Nil)
    }
}

impl From<Option<Vec<u8>>> for Reply {
    fn from(value: Option<Vec<u8>>) -> Self {
        value.map_or(Reply::Nil, Reply::Bulk)
    }
}

/// Remaining lifetime of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// The key does not exist.
    Missing,
    /// The key exists without an expiration.
    Persistent,
    /// The key expires after the given duration.
    Expires(Duration),
}

impl KeyTtl {
    /// Decode the store's `-2` / `-1` / seconds convention.
    pub fn from_secs(secs: i64) -> Self {
        match secs {
            -2 => KeyTtl::Missing,
            s if s < 0 => KeyTtl::Persistent,
            s => KeyTtl::Expires(Duration::from_secs(s as u64)),
        }
    }

    /// Decode the millisecond form of the same convention (`PTTL`).
    pub fn from_millis(ms: i64) -> Self {
        match ms {
            -2 => KeyTtl::Missing,
            m if m < 0 => KeyTtl::Persistent,
            m => KeyTtl::Expires(Duration::from_millis(m as u64)),
        }
    }
}

/// A write inside an atomic unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Set hash fields.
    HSet {
        key: String,
        fields: Vec<(String, Vec<u8>)>,
    },
    /// Set a key's expiration.
    Expire { key: String, ttl: Duration },
}

impl Command {
    /// Create an HSet command.
    pub fn hset(key: impl Into<String>, fields: Vec<(String, Vec<u8>)>) -> Self {
        Self::HSet {
            key: key.into(),
            fields,
        }
    }

    /// Create an Expire command.
    pub fn expire(key: impl Into<String>, ttl: Duration) -> Self {
        Self::Expire {
            key: key.into(),
            ttl,
        }
    }

    /// The key the command writes.
    pub fn key(&self) -> &str {
        match self {
            Command::HSet { key, .. } | Command::Expire { key, .. } => key,
        }
    }

    /// Command name as the store spells it.
    pub fn name(&self) -> &'static str {
        match self {
            Command::HSet { .. } => "HSET",
            Command::Expire { .. } => "EXPIRE",
        }
    }
}

/// The store client consumed by every service.
///
/// Implementations must be safe to share across concurrent callers.
/// Missing keys and fields are never errors: reads return [`Reply::Nil`],
/// collection reads return empty collections.
#[async_trait]
pub trait Driver: Send + Sync {
    // ==================== strings ====================

    /// GET.
    async fn get(&self, key: &str) -> Result<Reply>;

    /// SET. With a TTL the expiration is applied by the same command;
    /// without one the key keeps its current expiration (KEEPTTL).
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// SET NX. Returns true if the key was written.
    async fn set_nx(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool>;

    // ==================== hashes ====================

    /// HGET.
    async fn hget(&self, key: &str, field: &str) -> Result<Reply>;

    /// HSET with one or more fields. Returns the number of new fields.
    async fn hset(&self, key: &str, fields: Vec<(String, Vec<u8>)>) -> Result<usize>;

    /// HGETALL. Empty when the key does not exist.
    async fn hgetall(&self, key: &str) -> Result<Vec<(String, Vec<u8>)>>;

    /// HDEL. Returns the number of removed fields.
    async fn hdel(&self, key: &str, fields: &[String]) -> Result<usize>;

    // ==================== sets ====================

    /// SADD. Returns the number of new members.
    async fn sadd(&self, key: &str, members: Vec<Vec<u8>>) -> Result<usize>;

    /// SREM. Returns the number of removed members.
    async fn srem(&self, key: &str, members: &[Vec<u8>]) -> Result<usize>;

    /// SISMEMBER.
    async fn sismember(&self, key: &str, member: &[u8]) -> Result<bool>;

    /// SMEMBERS. Empty when the key does not exist.
    async fn smembers(&self, key: &str) -> Result<Vec<Vec<u8>>>;

    // ==================== keys ====================

    /// EXISTS. Returns how many of `keys` exist.
    async fn exists(&self, keys: &[String]) -> Result<usize>;

    /// DEL. Returns how many keys were removed.
    async fn del(&self, keys: &[String]) -> Result<usize>;

    /// EXPIRE. Returns false if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// PERSIST. Returns true if an expiration was removed.
    async fn persist(&self, key: &str) -> Result<bool>;

    /// TTL.
    async fn ttl(&self, key: &str) -> Result<KeyTtl>;

    // ==================== transactions ====================

    /// Execute commands as one atomic unit.
    ///
    /// No reader observes a state between two commands of the unit. A
    /// failing command fails the unit with [`Error::Transaction`]; whether
    /// the other commands were applied is up to the store.
    ///
    /// [`Error::Transaction`]: crate::Error::Transaction
    async fn exec(&self, commands: Vec<Command>) -> Result<()>;
}
