//! In-memory driver.
//!
//! Redis-compatible semantics for the commands in [`Driver`]: typed entries,
//! lazy expiry, empty hashes and sets disappear, `WRONGTYPE` on mismatched
//! access. Data is lost on process exit. Use for testing and development.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::driver::{Command, Driver, KeyTtl, Reply};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
enum Data {
    String(Vec<u8>),
    Hash(HashMap<String, Vec<u8>>),
    Set(HashSet<Vec<u8>>),
}

#[derive(Debug, Clone)]
struct Entry {
    data: Data,
    expire_at: Option<Instant>,
}

impl Entry {
    fn new(data: Data) -> Self {
        Self {
            data,
            expire_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expire_at.is_some_and(|t| now >= t)
    }
}

type Keyspace = HashMap<String, Entry>;

/// In-memory implementation of [`Driver`].
///
/// Cloning shares the underlying keyspace. All commands, including the
/// commands of one [`Driver::exec`] unit, run under a single lock.
#[derive(Clone, Default)]
pub struct MemoryDriver {
    data: Arc<RwLock<Keyspace>>,
}

impl MemoryDriver {
    /// Create an empty driver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.data
            .read()
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    /// Check if there are no live keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every key.
    pub fn clear(&self) {
        self.data.write().clear();
    }

    /// Drop expired keys eagerly. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut data = self.data.write();
        let before = data.len();
        data.retain(|_, e| !e.is_expired(now));
        before - data.len()
    }

    fn live<'a>(data: &'a Keyspace, key: &str) -> Option<&'a Entry> {
        data.get(key).filter(|e| !e.is_expired(Instant::now()))
    }
}

/// Drops `key` if it has expired so writes see a fresh slot.
fn evict_expired(data: &mut Keyspace, key: &str) {
    if data.get(key).is_some_and(|e| e.is_expired(Instant::now())) {
        data.remove(key);
    }
}

fn apply_set(data: &mut Keyspace, key: &str, value: Vec<u8>, ttl: Option<Duration>) {
    evict_expired(data, key);
    let mut entry = Entry::new(Data::String(value));
    entry.expire_at = match ttl {
        Some(ttl) => Some(Instant::now() + ttl),
        None => data.get(key).and_then(|e| e.expire_at),
    };
    data.insert(key.to_string(), entry);
}

fn apply_hset(data: &mut Keyspace, key: &str, fields: Vec<(String, Vec<u8>)>) -> Result<usize> {
    evict_expired(data, key);
    let entry = data
        .entry(key.to_string())
        .or_insert_with(|| Entry::new(Data::Hash(HashMap::new())));
    let Data::Hash(hash) = &mut entry.data else {
        return Err(Error::WrongType);
    };
    let mut added = 0;
    for (field, value) in fields {
        if hash.insert(field, value).is_none() {
            added += 1;
        }
    }
    Ok(added)
}

fn apply_hdel(data: &mut Keyspace, key: &str, fields: &[String]) -> Result<usize> {
    evict_expired(data, key);
    let Some(entry) = data.get_mut(key) else {
        return Ok(0);
    };
    let Data::Hash(hash) = &mut entry.data else {
        return Err(Error::WrongType);
    };
    let removed = fields.iter().filter(|f| hash.remove(*f).is_some()).count();
    if hash.is_empty() {
        data.remove(key);
    }
    Ok(removed)
}

fn apply_sadd(data: &mut Keyspace, key: &str, members: Vec<Vec<u8>>) -> Result<usize> {
    evict_expired(data, key);
    let entry = data
        .entry(key.to_string())
        .or_insert_with(|| Entry::new(Data::Set(HashSet::new())));
    let Data::Set(set) = &mut entry.data else {
        return Err(Error::WrongType);
    };
    Ok(members.into_iter().filter(|m| set.insert(m.clone())).count())
}

fn apply_srem(data: &mut Keyspace, key: &str, members: &[Vec<u8>]) -> Result<usize> {
    evict_expired(data, key);
    let Some(entry) = data.get_mut(key) else {
        return Ok(0);
    };
    let Data::Set(set) = &mut entry.data else {
        return Err(Error::WrongType);
    };
    let removed = members.iter().filter(|m| set.remove(*m)).count();
    if set.is_empty() {
        data.remove(key);
    }
    Ok(removed)
}

fn apply_del(data: &mut Keyspace, keys: &[String]) -> usize {
    keys.iter()
        .filter(|key| {
            evict_expired(data, key);
            data.remove(key.as_str()).is_some()
        })
        .count()
}

fn apply_expire(data: &mut Keyspace, key: &str, ttl: Duration) -> bool {
    evict_expired(data, key);
    if ttl.is_zero() {
        return data.remove(key).is_some();
    }
    match data.get_mut(key) {
        Some(entry) => {
            entry.expire_at = Some(Instant::now() + ttl);
            true
        }
        None => false,
    }
}

fn apply_persist(data: &mut Keyspace, key: &str) -> bool {
    evict_expired(data, key);
    data.get_mut(key)
        .is_some_and(|entry| entry.expire_at.take().is_some())
}

fn apply(data: &mut Keyspace, command: Command) -> Result<()> {
    match command {
        Command::HSet { key, fields } => {
            apply_hset(data, &key, fields)?;
        }
        Command::Expire { key, ttl } => {
            apply_expire(data, &key, ttl);
        }
    }
    Ok(())
}

fn touched_keys(commands: &[Command]) -> Vec<String> {
    let mut keys: Vec<String> = commands.iter().map(|c| c.key().to_string()).collect();
    keys.sort();
    keys.dedup();
    keys
}

#[async_trait]
impl Driver for MemoryDriver {
    async fn get(&self, key: &str) -> Result<Reply> {
        let data = self.data.read();
        match Self::live(&data, key) {
            None => Ok(Reply::Nil),
            Some(Entry {
                data: Data::String(value),
                ..
            }) => Ok(Reply::Bulk(value.clone())),
            Some(_) => Err(Error::WrongType),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        apply_set(&mut self.data.write(), key, value, ttl);
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool> {
        let mut data = self.data.write();
        evict_expired(&mut data, key);
        if data.contains_key(key) {
            return Ok(false);
        }
        apply_set(&mut data, key, value, ttl);
        Ok(true)
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Reply> {
        let data = self.data.read();
        match Self::live(&data, key) {
            None => Ok(Reply::Nil),
            Some(Entry {
                data: Data::Hash(hash),
                ..
            }) => Ok(hash.get(field).cloned().into()),
            Some(_) => Err(Error::WrongType),
        }
    }

    async fn hset(&self, key: &str, fields: Vec<(String, Vec<u8>)>) -> Result<usize> {
        apply_hset(&mut self.data.write(), key, fields)
    }

    async fn hgetall(&self, key: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let data = self.data.read();
        match Self::live(&data, key) {
            None => Ok(Vec::new()),
            Some(Entry {
                data: Data::Hash(hash),
                ..
            }) => Ok(hash.iter().map(|(f, v)| (f.clone(), v.clone())).collect()),
            Some(_) => Err(Error::WrongType),
        }
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> Result<usize> {
        apply_hdel(&mut self.data.write(), key, fields)
    }

    async fn sadd(&self, key: &str, members: Vec<Vec<u8>>) -> Result<usize> {
        apply_sadd(&mut self.data.write(), key, members)
    }

    async fn srem(&self, key: &str, members: &[Vec<u8>]) -> Result<usize> {
        apply_srem(&mut self.data.write(), key, members)
    }

    async fn sismember(&self, key: &str, member: &[u8]) -> Result<bool> {
        let data = self.data.read();
        match Self::live(&data, key) {
            None => Ok(false),
            Some(Entry {
                data: Data::Set(set),
                ..
            }) => Ok(set.contains(member)),
            Some(_) => Err(Error::WrongType),
        }
    }

    async fn smembers(&self, key: &str) -> Result<Vec<Vec<u8>>> {
        let data = self.data.read();
        match Self::live(&data, key) {
            None => Ok(Vec::new()),
            Some(Entry {
                data: Data::Set(set),
                ..
            }) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(Error::WrongType),
        }
    }

    async fn exists(&self, keys: &[String]) -> Result<usize> {
        let data = self.data.read();
        Ok(keys.iter().filter(|k| Self::live(&data, k).is_some()).count())
    }

    async fn del(&self, keys: &[String]) -> Result<usize> {
        Ok(apply_del(&mut self.data.write(), keys))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        Ok(apply_expire(&mut self.data.write(), key, ttl))
    }

    async fn persist(&self, key: &str) -> Result<bool> {
        Ok(apply_persist(&mut self.data.write(), key))
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        let data = self.data.read();
        let now = Instant::now();
        Ok(match Self::live(&data, key) {
            None => KeyTtl::Missing,
            Some(Entry {
                expire_at: None, ..
            }) => KeyTtl::Persistent,
            Some(Entry {
                expire_at: Some(t),
                ..
            }) => KeyTtl::Expires(t.saturating_duration_since(now)),
        })
    }

    async fn exec(&self, commands: Vec<Command>) -> Result<()> {
        let keys = touched_keys(&commands);
        let names: Vec<&str> = commands.iter().map(Command::name).collect();
        debug!(commands = ?names, "exec");

        let mut data = self.data.write();

        // Stage the touched entries so a failing command leaves the keyspace as it was.
        let mut staged: Keyspace = keys
            .iter()
            .filter_map(|k| Self::live(&data, k).map(|e| (k.clone(), e.clone())))
            .collect();
        for command in commands {
            let name = command.name();
            apply(&mut staged, command)
                .map_err(|e| Error::Transaction(format!("{} failed: {}", name, e)))?;
        }

        for key in keys {
            match staged.remove(&key) {
                Some(entry) => {
                    data.insert(key, entry);
                }
                None => {
                    data.remove(&key);
                }
            }
        }
        trace!("exec committed");
        Ok(())
    }
}
