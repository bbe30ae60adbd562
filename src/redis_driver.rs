//! Redis driver.
//!
//! Talks to a Redis-compatible server through a [`ConnectionManager`], which
//! multiplexes one connection and reconnects after failures. Atomic units
//! run as `MULTI`/`EXEC` pipelines. A command that fails inside `EXEC` does
//! not roll back the others, as on any Redis server; the unit still reports
//! [`Error::Transaction`].

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Cmd, FromRedisValue, Pipeline, RedisError};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::driver::{Command, Driver, KeyTtl, Reply};
use crate::error::{Error, Result};

/// [`Driver`] backed by a Redis server.
///
/// Cheap to clone; clones share the managed connection.
#[derive(Clone)]
pub struct RedisDriver {
    conn: ConnectionManager,
}

impl RedisDriver {
    /// Connect to the server at `url` (`redis://host:port/db`).
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("connected to redis");
        Ok(Self { conn })
    }

    /// Wrap an existing managed connection.
    pub fn from_manager(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    async fn query<T: FromRedisValue>(&self, cmd: &Cmd) -> Result<T> {
        let mut conn = self.conn.clone();
        Ok(cmd.query_async(&mut conn).await?)
    }
}

/// Millisecond precision, never rounding a positive duration down to zero.
fn millis(ttl: Duration) -> u64 {
    match u64::try_from(ttl.as_millis()) {
        Ok(0) if !ttl.is_zero() => 1,
        Ok(ms) => ms,
        Err(_) => u64::MAX,
    }
}

fn reply(value: redis::Value) -> Result<Reply> {
    match value {
        redis::Value::Nil => Ok(Reply::Nil),
        other => Ok(Reply::Bulk(Vec::<u8>::from_redis_value(&other)?)),
    }
}

fn set_cmd(key: &str, value: &[u8], ttl: Option<Duration>, nx: bool) -> Cmd {
    let mut cmd = redis::cmd("SET");
    cmd.arg(key).arg(value);
    if nx {
        cmd.arg("NX");
    }
    match ttl {
        Some(ttl) => {
            cmd.arg("PX").arg(millis(ttl));
        }
        None if !nx => {
            cmd.arg("KEEPTTL");
        }
        None => {}
    }
    cmd
}

fn hset_cmd(key: &str, fields: &[(String, Vec<u8>)]) -> Cmd {
    let mut cmd = redis::cmd("HSET");
    cmd.arg(key);
    for (field, value) in fields {
        cmd.arg(field).arg(value);
    }
    cmd
}

fn transaction(commands: &[Command]) -> Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic();
    for command in commands {
        match command {
            Command::HSet { key, fields } => {
                pipe.cmd("HSET").arg(key);
                for (field, value) in fields {
                    pipe.arg(field).arg(value);
                }
            }
            Command::Expire { key, ttl } => {
                pipe.cmd("PEXPIRE").arg(key).arg(millis(*ttl));
            }
        }
        pipe.ignore();
    }
    pipe
}

fn transaction_error(err: RedisError) -> Error {
    if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
        Error::from(err)
    } else {
        Error::Transaction(err.to_string())
    }
}

#[async_trait]
impl Driver for RedisDriver {
    async fn get(&self, key: &str) -> Result<Reply> {
        reply(self.query(redis::cmd("GET").arg(key)).await?)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let _: redis::Value = self.query(&set_cmd(key, &value, ttl, false)).await?;
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool> {
        let written: redis::Value = self.query(&set_cmd(key, &value, ttl, true)).await?;
        Ok(!matches!(written, redis::Value::Nil))
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Reply> {
        reply(self.query(redis::cmd("HGET").arg(key).arg(field)).await?)
    }

    async fn hset(&self, key: &str, fields: Vec<(String, Vec<u8>)>) -> Result<usize> {
        if fields.is_empty() {
            return Ok(0);
        }
        self.query(&hset_cmd(key, &fields)).await
    }

    async fn hgetall(&self, key: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let fields: HashMap<String, Vec<u8>> =
            self.query(redis::cmd("HGETALL").arg(key)).await?;
        Ok(fields.into_iter().collect())
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> Result<usize> {
        if fields.is_empty() {
            return Ok(0);
        }
        self.query(redis::cmd("HDEL").arg(key).arg(fields)).await
    }

    async fn sadd(&self, key: &str, members: Vec<Vec<u8>>) -> Result<usize> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut cmd = redis::cmd("SADD");
        cmd.arg(key);
        for member in &members {
            cmd.arg(member);
        }
        self.query(&cmd).await
    }

    async fn srem(&self, key: &str, members: &[Vec<u8>]) -> Result<usize> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut cmd = redis::cmd("SREM");
        cmd.arg(key);
        for member in members {
            cmd.arg(member);
        }
        self.query(&cmd).await
    }

    async fn sismember(&self, key: &str, member: &[u8]) -> Result<bool> {
        self.query(redis::cmd("SISMEMBER").arg(key).arg(member)).await
    }

    async fn smembers(&self, key: &str) -> Result<Vec<Vec<u8>>> {
        self.query(redis::cmd("SMEMBERS").arg(key)).await
    }

    async fn exists(&self, keys: &[String]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.query(redis::cmd("EXISTS").arg(keys)).await
    }

    async fn del(&self, keys: &[String]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.query(redis::cmd("DEL").arg(keys)).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.query(redis::cmd("PEXPIRE").arg(key).arg(millis(ttl)))
            .await
    }

    async fn persist(&self, key: &str) -> Result<bool> {
        self.query(redis::cmd("PERSIST").arg(key)).await
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        let ms: i64 = self.query(redis::cmd("PTTL").arg(key)).await?;
        Ok(KeyTtl::from_millis(ms))
    }

    async fn exec(&self, commands: Vec<Command>) -> Result<()> {
        if commands.is_empty() {
            return Ok(());
        }
        let names: Vec<&str> = commands.iter().map(Command::name).collect();
        debug!(commands = ?names, "exec");

        let mut conn = self.conn.clone();
        let () = transaction(&commands)
            .query_async(&mut conn)
            .await
            .map_err(transaction_error)?;
        Ok(())
    }
}
