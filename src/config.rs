//! Server configuration.

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 5000;

/// Default session token TTL in seconds (1 hour).
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

/// Default password-reset token TTL in seconds (1 hour).
pub const DEFAULT_RESET_TTL_SECS: i64 = 3600;

/// Default cleanup interval in seconds (5 minutes).
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 300;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// SQLite file path. `None` keeps everything in memory.
    pub database_path: Option<String>,
    /// HMAC key for session tokens. `None` generates one per process.
    pub token_secret: Option<String>,
    pub token_ttl_secs: i64,
    pub reset_ttl_secs: i64,
    pub cleanup_interval_secs: u64,
    /// CORS origins. Empty allows any origin.
    pub allowed_origins: Vec<String>,
    pub log_json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_path: None,
            token_secret: None,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            reset_ttl_secs: DEFAULT_RESET_TTL_SECS,
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
            allowed_origins: Vec::new(),
            log_json: false,
        }
    }
}
