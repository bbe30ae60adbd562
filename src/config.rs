//! Configuration and shared service defaults.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::codec::{JsonCodec, PlainCodec, SharedCodec};
use crate::context::Context;
use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::options::{CallOptions, Ttl};

/// Maximum key prefix length in bytes.
pub const MAX_PREFIX_LENGTH: usize = 256;

/// Built-in codecs selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    /// [`JsonCodec`].
    #[default]
    Json,
    /// [`PlainCodec`].
    Plain,
}

impl CodecKind {
    /// Instantiate the codec.
    pub fn build(self) -> SharedCodec {
        match self {
            CodecKind::Json => Arc::new(JsonCodec),
            CodecKind::Plain => Arc::new(PlainCodec),
        }
    }
}

/// Serializable defaults for a client.
///
/// ```
/// let config = typed_kv::Config::from_json(r#"{"key_prefix": "app:", "default_ttl_secs": 60}"#)?;
/// assert_eq!(config.key_prefix, "app:");
/// # Ok::<(), typed_kv::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Prepended to every key.
    pub key_prefix: String,
    /// Expiration for writes; `None` leaves expirations untouched.
    pub default_ttl_secs: Option<u64>,
    /// Codec for values.
    pub codec: CodecKind,
    /// Upper bound on every driver round trip, kept even when a call
    /// overrides the context.
    pub default_timeout_ms: Option<u64>,
}

impl Config {
    /// Parse from JSON and validate.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the default expiration.
    pub fn with_default_ttl_secs(mut self, secs: u64) -> Self {
        self.default_ttl_secs = Some(secs);
        self
    }

    /// Set the codec.
    pub fn with_codec(mut self, codec: CodecKind) -> Self {
        self.codec = codec;
        self
    }

    /// Set the per-call timeout.
    pub fn with_default_timeout_ms(mut self, ms: u64) -> Self {
        self.default_timeout_ms = Some(ms);
        self
    }

    /// Check the values are usable.
    pub fn validate(&self) -> Result<()> {
        if self.key_prefix.len() > MAX_PREFIX_LENGTH {
            return Err(Error::Config(format!(
                "key_prefix exceeds maximum length of {} bytes",
                MAX_PREFIX_LENGTH
            )));
        }
        if self.default_ttl_secs == Some(0) {
            return Err(Error::Config(
                "default_ttl_secs must be positive; omit it for no expiration".to_string(),
            ));
        }
        if self.default_timeout_ms == Some(0) {
            return Err(Error::Config(
                "default_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn ttl(&self) -> Ttl {
        self.default_ttl_secs.map_or(Ttl::NoExpiration, Ttl::from_secs)
    }
}

/// Defaults shared read-only by every service of a client.
pub struct ServiceConfig {
    driver: Arc<dyn Driver>,
    codec: SharedCodec,
    key_prefix: String,
    ctx: Context,
    ttl: Ttl,
    timeout: Option<Duration>,
}

impl ServiceConfig {
    /// Build from a driver and serializable config.
    pub fn new(driver: Arc<dyn Driver>, config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            driver,
            codec: config.codec.build(),
            key_prefix: config.key_prefix.clone(),
            ctx: Context::background(),
            ttl: config.ttl(),
            timeout: config.default_timeout_ms.map(Duration::from_millis),
        })
    }

    /// Start from defaults: JSON codec, no prefix, no expiration.
    pub fn builder(driver: Arc<dyn Driver>) -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self {
                driver,
                codec: Arc::new(JsonCodec),
                key_prefix: String::new(),
                ctx: Context::background(),
                ttl: Ttl::NoExpiration,
                timeout: None,
            },
        }
    }

    /// A fresh per-call copy of the defaults.
    ///
    /// The configured timeout starts counting here, once per call.
    pub fn call_options(&self) -> CallOptions {
        let ctx = match self.timeout {
            Some(timeout) => self.ctx.with_timeout(timeout),
            None => self.ctx.clone(),
        };
        CallOptions {
            ctx,
            key_prefix: self.key_prefix.clone(),
            codec: self.codec.clone(),
            ttl: self.ttl,
        }
    }

    /// The driver handle.
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// The default codec.
    pub fn codec(&self) -> &SharedCodec {
        &self.codec
    }

    /// The default key prefix.
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// The per-call timeout, if configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Builder for [`ServiceConfig`].
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    /// Default codec.
    pub fn codec(mut self, codec: SharedCodec) -> Self {
        self.config.codec = codec;
        self
    }

    /// Default key prefix.
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.key_prefix = prefix.into();
        self
    }

    /// Default context, e.g. one canceled at shutdown.
    pub fn context(mut self, ctx: Context) -> Self {
        self.config.ctx = ctx;
        self
    }

    /// Default expiration for writes.
    pub fn ttl(mut self, ttl: Ttl) -> Self {
        self.config.ttl = ttl;
        self
    }

    /// Per-call timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Finish.
    pub fn build(self) -> ServiceConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDriver;

    #[test]
    fn test_config_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.codec, CodecKind::Json);
        assert!(config.default_ttl_secs.is_none());
    }

    #[test]
    fn test_config_from_json() {
        let config = Config::from_json(
            r#"{"key_prefix": "app:", "default_ttl_secs": 60, "codec": "plain", "default_timeout_ms": 500}"#,
        )
        .unwrap();
        assert_eq!(config.key_prefix, "app:");
        assert_eq!(config.default_ttl_secs, Some(60));
        assert_eq!(config.codec, CodecKind::Plain);
        assert_eq!(config.default_timeout_ms, Some(500));
    }

    #[test]
    fn test_config_rejects_bad_values() {
        assert!(matches!(
            Config::from_json(r#"{"default_ttl_secs": 0}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_json(r#"{"codec": "xml"}"#),
            Err(Error::Config(_))
        ));
        let long = Config::default().with_key_prefix("p".repeat(MAX_PREFIX_LENGTH + 1));
        assert!(long.validate().is_err());
    }

    #[test]
    fn test_service_config_from_config() {
        let config = Config::default()
            .with_key_prefix("app:")
            .with_default_ttl_secs(30)
            .with_codec(CodecKind::Plain);
        let shared = ServiceConfig::new(Arc::new(MemoryDriver::new()), &config).unwrap();

        let opts = shared.call_options();
        assert_eq!(opts.key_prefix, "app:");
        assert_eq!(opts.ttl, Ttl::from_secs(30));
        assert_eq!(opts.codec.name(), "plain");
        assert!(opts.ctx.deadline().is_none());
    }

    #[tokio::test]
    async fn test_timeout_starts_per_call() {
        let shared = ServiceConfig::builder(Arc::new(MemoryDriver::new()))
            .timeout(Duration::from_secs(5))
            .build();

        let first = shared.call_options();
        let second = shared.call_options();
        assert!(first.ctx.deadline().is_some());
        assert!(second.ctx.deadline() >= first.ctx.deadline());
    }

    #[test]
    fn test_builder() {
        let shared = ServiceConfig::builder(Arc::new(MemoryDriver::new()))
            .key_prefix("svc:")
            .codec(Arc::new(PlainCodec))
            .ttl(Ttl::from_secs(9))
            .build();
        assert_eq!(shared.key_prefix(), "svc:");
        assert_eq!(shared.codec().name(), "plain");
        assert_eq!(shared.call_options().ttl, Ttl::from_secs(9));
    }
}
