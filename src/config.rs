//! Relay configuration.
//!
//! All settings come from the process environment and are read once at
//! startup. Request handling never consults the environment.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::forward::{DisconnectPolicy, RetryPolicy};
use crate::routing::{PayloadPolicy, RouteTable, RoutingPolicy, UnmappedRoute};
use crate::types::WebhookSecret;

pub const ENV_SECRET: &str = "RELAY_SECRET";
pub const ENV_API: &str = "RELAY_API";
pub const ENV_TIMEOUT: &str = "RELAY_TIMEOUT";
pub const ENV_RETRY: &str = "RELAY_RETRY";
pub const ENV_MIN_BACKOFF: &str = "RELAY_MIN_BACKOFF";
pub const ENV_MAX_BACKOFF: &str = "RELAY_MAX_BACKOFF";
pub const ENV_ROUTES: &str = "RELAY_ROUTES";
pub const ENV_PAYLOAD_POLICY: &str = "RELAY_PAYLOAD_POLICY";
pub const ENV_UNMAPPED_ROUTE: &str = "RELAY_UNMAPPED_ROUTE";
pub const ENV_ON_DISCONNECT: &str = "RELAY_ON_DISCONNECT";
pub const ENV_MAX_BODY_BYTES: &str = "RELAY_MAX_BODY_BYTES";
pub const ENV_LISTEN: &str = "RELAY_LISTEN";

/// Default endpoint base: functions behind a gateway named `gateway`.
pub const DEFAULT_ENDPOINT_BASE: &str = "http://gateway:8080/function/";

/// Default cap on inbound body size (2 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Default listen address.
pub const DEFAULT_LISTEN_ADDR: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), 8080);

/// Errors from loading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Immutable relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Shared HMAC secret.
    pub secret: WebhookSecret,

    /// Prefix of every outbound URL; the function name is appended verbatim.
    pub endpoint_base: String,

    pub retry: RetryPolicy,
    pub routes: RouteTable,
    pub routing: RoutingPolicy,
    pub on_disconnect: DisconnectPolicy,

    /// Inbound bodies larger than this are rejected while reading.
    pub max_body_bytes: usize,

    pub listen_addr: SocketAddr,
}

impl RelayConfig {
    /// Creates a configuration with the given secret and all defaults.
    pub fn new(secret: WebhookSecret) -> Self {
        RelayConfig {
            secret,
            endpoint_base: DEFAULT_ENDPOINT_BASE.to_string(),
            retry: RetryPolicy::default(),
            routes: RouteTable::new(),
            routing: RoutingPolicy::default(),
            on_disconnect: DisconnectPolicy::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            listen_addr: DEFAULT_LISTEN_ADDR,
        }
    }

    pub fn with_endpoint_base(mut self, endpoint_base: impl Into<String>) -> Self {
        self.endpoint_base = endpoint_base.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_routes(mut self, routes: RouteTable) -> Self {
        self.routes = routes;
        self
    }

    pub fn with_routing(mut self, routing: RoutingPolicy) -> Self {
        self.routing = routing;
        self
    }

    pub fn with_on_disconnect(mut self, on_disconnect: DisconnectPolicy) -> Self {
        self.on_disconnect = on_disconnect;
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration from an arbitrary variable lookup.
    ///
    /// Unset and empty variables take their defaults, except `RELAY_SECRET`
    /// which is required.
    ///
    /// ```
    /// use std::time::Duration;
    /// use webhook_relay::config::RelayConfig;
    ///
    /// let config = RelayConfig::from_lookup(|name| match name {
    ///     "RELAY_SECRET" => Some("1234".to_string()),
    ///     "RELAY_TIMEOUT" => Some("14s".to_string()),
    ///     _ => None,
    /// })
    /// .unwrap();
    ///
    /// assert_eq!(config.retry.min_backoff, Duration::from_secs(2));
    /// assert_eq!(config.retry.max_attempts, 4);
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let secret = get(ENV_SECRET).ok_or(ConfigError::Missing(ENV_SECRET))?;

        let timeout = match get(ENV_TIMEOUT) {
            Some(raw) => parse_duration(ENV_TIMEOUT, &raw)?,
            None => RetryPolicy::DEFAULT_TIMEOUT,
        };
        let retries = match get(ENV_RETRY) {
            Some(raw) => parse_value::<u32>(ENV_RETRY, &raw)?,
            None => RetryPolicy::DEFAULT_RETRIES,
        };

        let mut retry = RetryPolicy::from_timeout(timeout, retries);
        let min_backoff = match get(ENV_MIN_BACKOFF) {
            Some(raw) => parse_duration(ENV_MIN_BACKOFF, &raw)?,
            None => retry.min_backoff,
        };
        let max_backoff = match get(ENV_MAX_BACKOFF) {
            Some(raw) => parse_duration(ENV_MAX_BACKOFF, &raw)?,
            None => retry.max_backoff,
        };
        retry = retry.with_backoff(min_backoff, max_backoff);

        let routes = match get(ENV_ROUTES) {
            Some(raw) => RouteTable::parse(&raw).map_err(|e| ConfigError::Invalid {
                var: ENV_ROUTES,
                reason: e.to_string(),
            })?,
            None => RouteTable::new(),
        };

        let routing = RoutingPolicy {
            payload: parse_or_default::<PayloadPolicy>(ENV_PAYLOAD_POLICY, get(ENV_PAYLOAD_POLICY))?,
            unmapped: parse_or_default::<UnmappedRoute>(ENV_UNMAPPED_ROUTE, get(ENV_UNMAPPED_ROUTE))?,
        };

        let on_disconnect =
            parse_or_default::<DisconnectPolicy>(ENV_ON_DISCONNECT, get(ENV_ON_DISCONNECT))?;

        let max_body_bytes = match get(ENV_MAX_BODY_BYTES) {
            Some(raw) => parse_value::<usize>(ENV_MAX_BODY_BYTES, &raw)?,
            None => DEFAULT_MAX_BODY_BYTES,
        };

        let listen_addr = match get(ENV_LISTEN) {
            Some(raw) => parse_value::<SocketAddr>(ENV_LISTEN, &raw)?,
            None => DEFAULT_LISTEN_ADDR,
        };

        Ok(RelayConfig {
            secret: WebhookSecret::new(secret),
            endpoint_base: get(ENV_API).unwrap_or_else(|| DEFAULT_ENDPOINT_BASE.to_string()),
            retry,
            routes,
            routing,
            on_disconnect,
            max_body_bytes,
            listen_addr,
        })
    }
}

fn parse_duration(var: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(raw.trim()).map_err(|e| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })
}

fn parse_value<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })
}

fn parse_or_default<T>(var: &'static str, raw: Option<String>) -> Result<T, ConfigError>
where
    T: FromStr + Default,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => parse_value(var, &raw),
        None => Ok(T::default()),
    }
}
