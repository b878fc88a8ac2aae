//! Hearth server binary.
//!
//! Serves the REST API and the `/ws` realtime gateway from one port.

use std::time::Duration;

use clap::Parser;

use hearth::{api, AppState, Database, ServerConfig};

// ── CLI Arguments ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "hearth", version, about = "Hearth social networking server")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 5000, env = "HEARTH_PORT")]
    port: u16,

    /// SQLite database file. In-memory when unset.
    #[arg(long, env = "HEARTH_DATABASE")]
    database: Option<String>,

    /// Secret for signing session tokens. Random per process when unset.
    #[arg(long, env = "HEARTH_TOKEN_SECRET", hide_env_values = true)]
    token_secret: Option<String>,

    /// Session token TTL in seconds
    #[arg(long, default_value_t = 3600, env = "HEARTH_TOKEN_TTL_SECS")]
    token_ttl_secs: i64,

    /// Password-reset token TTL in seconds
    #[arg(long, default_value_t = 3600, env = "HEARTH_RESET_TTL_SECS")]
    reset_ttl_secs: i64,

    /// Cleanup interval in seconds
    #[arg(long, default_value_t = 300, env = "HEARTH_CLEANUP_INTERVAL_SECS")]
    cleanup_interval_secs: u64,

    /// Allowed CORS origins (comma-separated). Any origin when empty.
    #[arg(long, env = "HEARTH_ALLOWED_ORIGINS", value_delimiter = ',')]
    allowed_origins: Vec<String>,

    /// Emit logs as JSON
    #[arg(long, env = "HEARTH_LOG_JSON")]
    log_json: bool,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        ServerConfig {
            port: args.port,
            database_path: args.database,
            token_secret: args.token_secret,
            token_ttl_secs: args.token_ttl_secs,
            reset_ttl_secs: args.reset_ttl_secs,
            cleanup_interval_secs: args.cleanup_interval_secs,
            allowed_origins: args
                .allowed_origins
                .into_iter()
                .filter(|origin| !origin.trim().is_empty())
                .collect(),
            log_json: args.log_json,
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "hearth=info,tower_http=info".into());

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

// ── Entry Point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from(Args::parse());
    init_tracing(config.log_json);

    let db = Database::open(config.database_path.as_deref())?;
    match config.database_path.as_deref() {
        Some(path) => tracing::info!(path = path, "Database opened"),
        None => tracing::warn!("No database path configured; data lives in memory"),
    }

    let port = config.port;
    let cleanup_interval = config.cleanup_interval_secs.max(1);
    let state = AppState::new(db, config);

    // Spawn periodic cleanup task
    let cleanup_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(cleanup_interval));
        loop {
            interval.tick().await;
            cleanup_state.cleanup_expired();
        }
    });

    let app = api::router(state);

    let addr = format!("0.0.0.0:{}", port);
    tracing::info!("Hearth server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults_match_config_defaults() {
        let config = ServerConfig::from(Args::parse_from(["hearth"]));
        let defaults = ServerConfig::default();
        assert_eq!(config.port, defaults.port);
        assert_eq!(config.token_ttl_secs, defaults.token_ttl_secs);
        assert_eq!(config.reset_ttl_secs, defaults.reset_ttl_secs);
        assert_eq!(config.cleanup_interval_secs, defaults.cleanup_interval_secs);
    }

    #[test]
    fn test_allowed_origins_split_on_commas() {
        let config = ServerConfig::from(Args::parse_from([
            "hearth",
            "--allowed-origins",
            "http://a.test,http://b.test",
        ]));
        assert_eq!(config.allowed_origins, vec!["http://a.test", "http://b.test"]);
    }
}
