//! Per-call options.
//!
//! Every operation starts from a fresh [`CallOptions`] copied from the
//! service defaults, then applies the caller's [`CallOption`] overrides in
//! order. The copy belongs to that one call, so overrides never leak into
//! concurrent calls.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::codec::SharedCodec;
use crate::context::Context;
use crate::error::{Error, Result};

/// Expiration to apply with a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ttl {
    /// Leave the key's expiration as it is.
    #[default]
    NoExpiration,
    /// Expire the key after the duration.
    After(Duration),
}

impl Ttl {
    /// Expire after `duration`. A zero duration means no expiration.
    pub fn new(duration: Duration) -> Self {
        if duration.is_zero() {
            Ttl::NoExpiration
        } else {
            Ttl::After(duration)
        }
    }

    /// Expire after `secs` seconds. Zero means no expiration.
    pub fn from_secs(secs: u64) -> Self {
        Ttl::new(Duration::from_secs(secs))
    }

    /// The duration, unless this is the no-expiration sentinel or zero.
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Ttl::After(d) if !d.is_zero() => Some(*d),
            _ => None,
        }
    }
}

impl From<Option<Duration>> for Ttl {
    fn from(value: Option<Duration>) -> Self {
        value.map_or(Ttl::NoExpiration, Ttl::new)
    }
}

/// Resolved options for one call.
#[derive(Debug, Clone)]
pub struct CallOptions {
    /// Cancellation and deadline for the driver round trip.
    pub ctx: Context,
    /// Prepended to every key of the call.
    pub key_prefix: String,
    /// Marshals written values and is bound to read values.
    pub codec: SharedCodec,
    /// Expiration for writes that support one.
    pub ttl: Ttl,
}

impl CallOptions {
    /// Apply overrides in order. Later overrides win.
    pub fn apply(&mut self, opts: &[CallOption]) {
        for opt in opts {
            (opt.0)(self);
        }
    }

    /// Prefix `key` for the store.
    ///
    /// Fails with [`Error::InvalidKey`] when the prefixed key is empty.
    pub fn resolve_key(&self, key: &str) -> Result<String> {
        let mut resolved = String::with_capacity(self.key_prefix.len() + key.len());
        resolved.push_str(&self.key_prefix);
        resolved.push_str(key);
        if resolved.is_empty() {
            return Err(Error::InvalidKey("key cannot be empty".to_string()));
        }
        Ok(resolved)
    }
}

/// A single override of one [`CallOptions`] field.
#[derive(Clone)]
pub struct CallOption(Arc<dyn Fn(&mut CallOptions) + Send + Sync>);

impl CallOption {
    /// Build an override from a closure.
    pub fn new(f: impl Fn(&mut CallOptions) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

impl fmt::Debug for CallOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CallOption")
    }
}

/// Use `ctx` for the call.
pub fn with_context(ctx: Context) -> CallOption {
    CallOption::new(move |o| o.ctx = ctx.clone())
}

/// Bound the call by `timeout`, keeping any earlier deadline.
pub fn with_timeout(timeout: Duration) -> CallOption {
    CallOption::new(move |o| o.ctx = o.ctx.with_timeout(timeout))
}

/// Replace the key prefix for the call.
pub fn with_key_prefix(prefix: impl Into<String>) -> CallOption {
    let prefix = prefix.into();
    CallOption::new(move |o| o.key_prefix = prefix.clone())
}

/// Use `codec` for the call.
pub fn with_codec(codec: SharedCodec) -> CallOption {
    CallOption::new(move |o| o.codec = codec.clone())
}

/// Expire written keys after `ttl`. A zero `ttl` means no expiration.
pub fn with_ttl(ttl: Duration) -> CallOption {
    let ttl = Ttl::new(ttl);
    CallOption::new(move |o| o.ttl = ttl)
}

/// Expire written keys after `secs` seconds.
pub fn with_ttl_secs(secs: u64) -> CallOption {
    with_ttl(Duration::from_secs(secs))
}

/// Leave the expiration of written keys untouched.
pub fn without_expiration() -> CallOption {
    CallOption::new(|o| o.ttl = Ttl::NoExpiration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{json, PlainCodec};
    use proptest::prelude::*;

    fn defaults() -> CallOptions {
        CallOptions {
            ctx: Context::background(),
            key_prefix: "app:".to_string(),
            codec: json(),
            ttl: Ttl::NoExpiration,
        }
    }

    #[test]
    fn test_no_overrides_keeps_defaults() {
        let mut opts = defaults();
        opts.apply(&[]);
        assert_eq!(opts.key_prefix, "app:");
        assert_eq!(opts.ttl, Ttl::NoExpiration);
        assert_eq!(opts.codec.name(), "json");
    }

    #[test]
    fn test_last_ttl_wins() {
        let mut opts = defaults();
        opts.apply(&[with_ttl_secs(10), with_ttl_secs(20)]);
        assert_eq!(opts.ttl, Ttl::from_secs(20));

        opts.apply(&[without_expiration()]);
        assert_eq!(opts.ttl, Ttl::NoExpiration);
    }

    #[test]
    fn test_overrides_touch_one_field() {
        let mut opts = defaults();
        opts.apply(&[with_codec(Arc::new(PlainCodec))]);
        assert_eq!(opts.codec.name(), "plain");
        assert_eq!(opts.key_prefix, "app:");
        assert_eq!(opts.ttl, Ttl::NoExpiration);
    }

    #[test]
    fn test_resolve_key() {
        let mut opts = defaults();
        assert_eq!(opts.resolve_key("user:1").unwrap(), "app:user:1");

        opts.apply(&[with_key_prefix("tenant-a:"), with_key_prefix("tenant-b:")]);
        assert_eq!(opts.resolve_key("user:1").unwrap(), "tenant-b:user:1");
    }

    #[test]
    fn test_resolve_empty_key() {
        let mut opts = defaults();
        assert_eq!(opts.resolve_key("").unwrap(), "app:");

        opts.apply(&[with_key_prefix("")]);
        assert!(matches!(opts.resolve_key(""), Err(Error::InvalidKey(_))));
    }

    #[test]
    fn test_derived_copies_are_independent() {
        let base = defaults();
        let mut a = base.clone();
        a.apply(&[with_key_prefix("a:"), with_ttl_secs(5)]);

        assert_eq!(base.key_prefix, "app:");
        assert_eq!(base.ttl, Ttl::NoExpiration);
        assert_eq!(a.key_prefix, "a:");
    }

    #[test]
    fn test_with_timeout_sets_deadline() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async {
            let mut opts = defaults();
            assert!(opts.ctx.deadline().is_none());
            opts.apply(&[with_timeout(Duration::from_secs(1))]);
            assert!(opts.ctx.deadline().is_some());
        });
    }

    #[test]
    fn test_ttl_conversions() {
        assert_eq!(Ttl::from(None), Ttl::NoExpiration);
        assert_eq!(
            Ttl::from(Some(Duration::from_secs(3))),
            Ttl::After(Duration::from_secs(3))
        );
        assert_eq!(Ttl::from_secs(3).duration(), Some(Duration::from_secs(3)));
        assert_eq!(Ttl::NoExpiration.duration(), None);
    }

    #[test]
    fn test_zero_ttl_means_no_expiration() {
        assert_eq!(Ttl::new(Duration::ZERO), Ttl::NoExpiration);
        assert_eq!(Ttl::from_secs(0), Ttl::NoExpiration);
        assert_eq!(Ttl::from(Some(Duration::ZERO)), Ttl::NoExpiration);

        let mut opts = defaults();
        opts.apply(&[with_ttl_secs(30), with_ttl(Duration::ZERO)]);
        assert_eq!(opts.ttl, Ttl::NoExpiration);
        assert_eq!(Ttl::After(Duration::ZERO).duration(), None);
    }

    proptest! {
        #[test]
        fn last_override_wins(ttls in prop::collection::vec(1u64..100_000, 1..8)) {
            let overrides: Vec<CallOption> = ttls.iter().map(|s| with_ttl_secs(*s)).collect();
            let mut opts = defaults();
            opts.apply(&overrides);
            prop_assert_eq!(opts.ttl, Ttl::from_secs(*ttls.last().unwrap()));
        }

        #[test]
        fn prefix_applied_once(prefix in "[a-z]{0,8}:?", key in "[a-z0-9:]{1,16}") {
            let mut opts = defaults();
            opts.apply(&[with_key_prefix(prefix.clone())]);
            let resolved = opts.resolve_key(&key).unwrap();
            prop_assert_eq!(resolved, format!("{}{}", prefix, key));
        }
    }
}
