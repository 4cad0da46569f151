//! Server configuration
//!
//! `ServerConfig` is assembled once at startup, from the process
//! environment (after `.env` is loaded) or through the builder in tests,
//! and handed to `create_app`. Nothing reads the environment after that.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Flush policy for one kind of buffered writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    /// Interval of the background flush ticker
    pub flush_every: Duration,
    /// Buffer length above which `add` triggers an immediate flush
    pub max_size: usize,
}

impl BatchPolicy {
    pub const fn new(flush_every: Duration, max_size: usize) -> Self {
        Self { flush_every, max_size }
    }
}

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Connection string of the admin database holding the tenants table
    pub admin_database_url: String,
    /// 32-byte secret used to seal tenant credentials
    pub encryption_key: String,
    /// HMAC secret for session tokens
    pub jwt_secret: String,
    pub port: u16,
    /// How long tenant metadata is served from cache before a refresh
    pub tenant_cache_ttl: Duration,
    /// Max connections of each per-tenant database pool
    pub tenant_pool_max_connections: u32,
    pub message_batch: BatchPolicy,
    pub reaction_batch: BatchPolicy,
    /// Flush reactions right after enqueueing so the broadcast can carry the new list
    pub reaction_flush_immediately: bool,
    /// Page size of the history sent on connect and of `load_more_messages`
    pub history_page_size: i64,
    /// Capacity of each connection's outbound queue
    pub outbound_queue_capacity: usize,
    /// Object store endpoint that deletes attachments
    pub media_delete_url: Option<String>,
    /// Bearer token guarding the admin routes; they are not mounted without it
    pub admin_token: Option<String>,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("port", &self.port)
            .field("tenant_cache_ttl", &self.tenant_cache_ttl)
            .field("tenant_pool_max_connections", &self.tenant_pool_max_connections)
            .field("message_batch", &self.message_batch)
            .field("reaction_batch", &self.reaction_batch)
            .field("reaction_flush_immediately", &self.reaction_flush_immediately)
            .field("history_page_size", &self.history_page_size)
            .field("outbound_queue_capacity", &self.outbound_queue_capacity)
            .field("media_delete_url", &self.media_delete_url)
            .field("admin_routes", &self.admin_token.is_some())
            .finish_non_exhaustive()
    }
}

impl ServerConfig {
    /// Create a new ServerConfigBuilder
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Load configuration from the process environment
    ///
    /// `ADMIN_DATABASE_URL` falls back to `DATABASE_URL`. Every other
    /// variable is optional except `TENANT_ENCRYPTION_KEY` and `JWT_SECRET`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = Self::builder();

        if let Some(url) = env("ADMIN_DATABASE_URL").or_else(|| env("DATABASE_URL")) {
            builder = builder.admin_database_url(url);
        }
        if let Some(key) = env("TENANT_ENCRYPTION_KEY") {
            builder = builder.encryption_key(key);
        }
        if let Some(secret) = env("JWT_SECRET") {
            builder = builder.jwt_secret(secret);
        }
        if let Some(port) = parse_env("SERVER_PORT")? {
            builder = builder.port(port);
        }
        if let Some(secs) = parse_env::<u64>("TENANT_CACHE_TTL_SECS")? {
            builder = builder.tenant_cache_ttl(Duration::from_secs(secs));
        }
        if let Some(max) = parse_env("TENANT_POOL_MAX_CONNECTIONS")? {
            builder = builder.tenant_pool_max_connections(max);
        }

        let mut message_batch = builder.message_batch;
        if let Some(ms) = parse_env::<u64>("MESSAGE_FLUSH_INTERVAL_MS")? {
            message_batch.flush_every = Duration::from_millis(ms);
        }
        if let Some(max) = parse_env("MESSAGE_BATCH_MAX")? {
            message_batch.max_size = max;
        }
        builder = builder.message_batch(message_batch);

        let mut reaction_batch = builder.reaction_batch;
        if let Some(ms) = parse_env::<u64>("REACTION_FLUSH_INTERVAL_MS")? {
            reaction_batch.flush_every = Duration::from_millis(ms);
        }
        if let Some(max) = parse_env("REACTION_BATCH_MAX")? {
            reaction_batch.max_size = max;
        }
        builder = builder.reaction_batch(reaction_batch);

        if let Some(immediate) = parse_env("REACTION_FLUSH_IMMEDIATELY")? {
            builder = builder.reaction_flush_immediately(immediate);
        }
        if let Some(size) = parse_env("HISTORY_PAGE_SIZE")? {
            builder = builder.history_page_size(size);
        }
        if let Some(capacity) = parse_env("OUTBOUND_QUEUE_CAPACITY")? {
            builder = builder.outbound_queue_capacity(capacity);
        }
        if let Some(url) = env("MEDIA_DELETE_URL") {
            builder = builder.media_delete_url(url);
        }
        if let Some(token) = env("ADMIN_TOKEN") {
            builder = builder.admin_token(token);
        }

        builder.build()
    }
}

/// Builder for ServerConfig
#[derive(Debug, Clone)]
pub struct ServerConfigBuilder {
    admin_database_url: Option<String>,
    encryption_key: Option<String>,
    jwt_secret: Option<String>,
    port: u16,
    tenant_cache_ttl: Duration,
    tenant_pool_max_connections: u32,
    message_batch: BatchPolicy,
    reaction_batch: BatchPolicy,
    reaction_flush_immediately: bool,
    history_page_size: i64,
    outbound_queue_capacity: usize,
    media_delete_url: Option<String>,
    admin_token: Option<String>,
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        Self {
            admin_database_url: None,
            encryption_key: None,
            jwt_secret: None,
            port: 3000,
            tenant_cache_ttl: Duration::from_secs(60),
            tenant_pool_max_connections: 10,
            message_batch: BatchPolicy::new(Duration::from_secs(5), 30),
            reaction_batch: BatchPolicy::new(Duration::from_secs(5), 50),
            reaction_flush_immediately: true,
            history_page_size: 30,
            outbound_queue_capacity: 256,
            media_delete_url: None,
            admin_token: None,
        }
    }
}

impl ServerConfigBuilder {
    pub fn admin_database_url(mut self, url: impl Into<String>) -> Self {
        self.admin_database_url = Some(url.into());
        self
    }

    pub fn encryption_key(mut self, key: impl Into<String>) -> Self {
        self.encryption_key = Some(key.into());
        self
    }

    pub fn jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.jwt_secret = Some(secret.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn tenant_cache_ttl(mut self, ttl: Duration) -> Self {
        self.tenant_cache_ttl = ttl;
        self
    }

    pub fn tenant_pool_max_connections(mut self, max: u32) -> Self {
        self.tenant_pool_max_connections = max;
        self
    }

    pub fn message_batch(mut self, policy: BatchPolicy) -> Self {
        self.message_batch = policy;
        self
    }

    pub fn reaction_batch(mut self, policy: BatchPolicy) -> Self {
        self.reaction_batch = policy;
        self
    }

    pub fn reaction_flush_immediately(mut self, immediate: bool) -> Self {
        self.reaction_flush_immediately = immediate;
        self
    }

    pub fn history_page_size(mut self, size: i64) -> Self {
        self.history_page_size = size;
        self
    }

    pub fn outbound_queue_capacity(mut self, capacity: usize) -> Self {
        self.outbound_queue_capacity = capacity;
        self
    }

    pub fn media_delete_url(mut self, url: impl Into<String>) -> Self {
        self.media_delete_url = Some(url.into());
        self
    }

    pub fn admin_token(mut self, token: impl Into<String>) -> Self {
        self.admin_token = Some(token.into());
        self
    }

    /// Build the configuration
    ///
    /// Fails when a required value is missing or a numeric value is zero.
    pub fn build(self) -> Result<ServerConfig, ConfigError> {
        if self.history_page_size <= 0 {
            return Err(ConfigError::invalid("HISTORY_PAGE_SIZE", self.history_page_size));
        }
        if self.outbound_queue_capacity == 0 {
            return Err(ConfigError::invalid("OUTBOUND_QUEUE_CAPACITY", 0));
        }
        if self.message_batch.max_size == 0 || self.message_batch.flush_every.is_zero() {
            return Err(ConfigError::invalid("MESSAGE_BATCH", format!("{:?}", self.message_batch)));
        }
        if self.reaction_batch.max_size == 0 || self.reaction_batch.flush_every.is_zero() {
            return Err(ConfigError::invalid("REACTION_BATCH", format!("{:?}", self.reaction_batch)));
        }

        Ok(ServerConfig {
            admin_database_url: self
                .admin_database_url
                .ok_or(ConfigError::MissingValue("ADMIN_DATABASE_URL"))?,
            encryption_key: self
                .encryption_key
                .ok_or(ConfigError::MissingValue("TENANT_ENCRYPTION_KEY"))?,
            jwt_secret: self.jwt_secret.ok_or(ConfigError::MissingValue("JWT_SECRET"))?,
            port: self.port,
            tenant_cache_ttl: self.tenant_cache_ttl,
            tenant_pool_max_connections: self.tenant_pool_max_connections,
            message_batch: self.message_batch,
            reaction_batch: self.reaction_batch,
            reaction_flush_immediately: self.reaction_flush_immediately,
            history_page_size: self.history_page_size,
            outbound_queue_capacity: self.outbound_queue_capacity,
            media_delete_url: self.media_delete_url,
            admin_token: self.admin_token,
        })
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
    #[error("missing value: {0}")]
    MissingValue(&'static str),
}

impl ConfigError {
    fn invalid(name: &'static str, value: impl ToString) -> Self {
        Self::InvalidValue {
            name,
            value: value.to_string(),
        }
    }
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::invalid(name, raw)),
        None => Ok(None),
    }
}
