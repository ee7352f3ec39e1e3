//! HTTP server command
//!
//! Builds the connection pool, then runs the VFS API until Ctrl+C/SIGTERM.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use vfs_server::{run_server, MemoryBackend, PgConnector, Pool, QueryExecutor};

use crate::config::{DatabaseTarget, FileConfig, Settings};

/// Arguments for the serve command
#[derive(Parser, Debug, Clone)]
pub struct ServeArgs {
    /// TOML config file supplying defaults for every option below
    #[arg(long, short = 'c', env = "VFS_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Host to bind to [default: 0.0.0.0]
    #[arg(long, env = "VFS_HOST")]
    pub host: Option<String>,

    /// Port to listen on [default: 5678]
    #[arg(long, short = 'p', env = "VFS_PORT")]
    pub port: Option<u16>,

    /// Database URL (wins over the DB_* settings)
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    #[arg(long, env = "DB_HOST")]
    pub db_host: Option<String>,

    #[arg(long, env = "DB_PORT")]
    pub db_port: Option<u16>,

    #[arg(long, env = "DB_NAME")]
    pub db_name: Option<String>,

    #[arg(long, env = "DB_USER")]
    pub db_user: Option<String>,

    #[arg(long, env = "DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    /// Connections opened at startup [default: 1]
    #[arg(long, env = "VFS_POOL_MIN")]
    pub pool_min: Option<u32>,

    /// Upper bound on live connections [default: 10]
    #[arg(long, env = "VFS_POOL_MAX")]
    pub pool_max: Option<u32>,

    /// Acquisition attempts before giving up [default: 3]
    #[arg(long, env = "VFS_POOL_RETRIES")]
    pub pool_retries: Option<u32>,

    /// Delay between acquisition attempts in milliseconds [default: 1000]
    #[arg(long, env = "VFS_POOL_RETRY_DELAY_MS")]
    pub pool_retry_delay_ms: Option<u64>,

    /// Allowed CORS origins, comma-separated; `*` allows any
    #[arg(long, env = "VFS_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    /// Allowed CORS methods, comma-separated
    #[arg(long, env = "VFS_CORS_METHODS", value_delimiter = ',')]
    pub cors_methods: Vec<String>,

    /// Allowed CORS request headers, comma-separated
    #[arg(long, env = "VFS_CORS_HEADERS", value_delimiter = ',')]
    pub cors_headers: Vec<String>,

    /// Response headers exposed to browsers, comma-separated
    #[arg(long, env = "VFS_CORS_EXPOSE_HEADERS", value_delimiter = ',')]
    pub cors_expose_headers: Vec<String>,

    /// Allow credentialed CORS requests [default: true]
    #[arg(long, env = "VFS_CORS_CREDENTIALS")]
    pub cors_credentials: Option<bool>,

    /// Preflight cache lifetime in seconds [default: 600]
    #[arg(long, env = "VFS_CORS_MAX_AGE")]
    pub cors_max_age: Option<u64>,

    /// Serve from an in-memory database (data is lost on exit)
    #[arg(long)]
    pub memory: bool,
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let settings = Settings::resolve(&args, file)?;

    let pool = match settings.database {
        DatabaseTarget::Memory => {
            tracing::warn!("Using in-memory database; nothing is persisted");
            Pool::connect(MemoryBackend::new(), settings.pool).await
        }
        DatabaseTarget::Url(url) => {
            let connector = PgConnector::from_url(&url).context("Invalid DATABASE_URL")?;
            Pool::connect(connector, settings.pool).await
        }
        DatabaseTarget::Params(db) => {
            tracing::info!(host = %db.host, port = db.port, database = %db.database, "Connecting to PostgreSQL");
            Pool::connect(PgConnector::from_config(&db), settings.pool).await
        }
    }
    .context("Failed to create database pool")?;

    tracing::info!(addr = %settings.server.bind_addr, "Starting VFS API server");

    // Run server (blocks until shutdown)
    run_server(QueryExecutor::new(pool), settings.server)
        .await
        .context("Server error")?;

    Ok(())
}
