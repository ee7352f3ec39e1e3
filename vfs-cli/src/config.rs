//! Configuration loading for `vfsctl serve`
//!
//! Precedence, highest first: command line, environment (including `.env`),
//! TOML file given with `--config`, built-in defaults.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use vfs_server::{CorsConfig, DbConfig, PoolConfig, ServerConfig};

use crate::commands::serve::ServeArgs;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5678;

/// `--config` file layout. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub server: ServerSection,
    pub database: DatabaseSection,
    pub pool: PoolSection,
    pub cors: CorsSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseSection {
    /// Full connection URL; wins over the individual fields
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub name: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSection {
    pub min_connections: Option<u32>,
    pub max_connections: Option<u32>,
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsSection {
    pub allow_origins: Option<Vec<String>>,
    pub allow_methods: Option<Vec<String>>,
    pub allow_headers: Option<Vec<String>>,
    pub expose_headers: Option<Vec<String>>,
    pub allow_credentials: Option<bool>,
    pub max_age_secs: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Where the pool gets its connections
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    Url(String),
    Params(DbConfig),
    Memory,
}

/// Fully resolved settings for one server run
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub pool: PoolConfig,
    pub database: DatabaseTarget,
}

/// Empty list means "not given" for comma-separated flags.
fn list_or(cli: &[String], file: Option<Vec<String>>, default: Vec<String>) -> Vec<String> {
    if !cli.is_empty() {
        cli.to_vec()
    } else {
        file.unwrap_or(default)
    }
}

fn bind_addr(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .with_context(|| format!("Invalid bind address {}:{}", host, port))?
        .next()
        .with_context(|| format!("No address found for {}", host))
}

impl Settings {
    pub fn resolve(args: &ServeArgs, file: FileConfig) -> Result<Self> {
        let host = args
            .host
            .clone()
            .or(file.server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = args.port.or(file.server.port).unwrap_or(DEFAULT_PORT);

        let pool_defaults = PoolConfig::default();
        let pool = PoolConfig {
            min_connections: args
                .pool_min
                .or(file.pool.min_connections)
                .unwrap_or(pool_defaults.min_connections),
            max_connections: args
                .pool_max
                .or(file.pool.max_connections)
                .unwrap_or(pool_defaults.max_connections),
            max_retries: args
                .pool_retries
                .or(file.pool.max_retries)
                .unwrap_or(pool_defaults.max_retries),
            retry_delay: args
                .pool_retry_delay_ms
                .or(file.pool.retry_delay_ms)
                .map(Duration::from_millis)
                .unwrap_or(pool_defaults.retry_delay),
        };
        pool.validate().context("Invalid pool settings")?;

        let cors_defaults = CorsConfig::default();
        let cors = CorsConfig {
            allow_origins: list_or(&args.cors_origins, file.cors.allow_origins, cors_defaults.allow_origins),
            allow_methods: list_or(&args.cors_methods, file.cors.allow_methods, cors_defaults.allow_methods),
            allow_headers: list_or(&args.cors_headers, file.cors.allow_headers, cors_defaults.allow_headers),
            expose_headers: list_or(
                &args.cors_expose_headers,
                file.cors.expose_headers,
                cors_defaults.expose_headers,
            ),
            allow_credentials: args
                .cors_credentials
                .or(file.cors.allow_credentials)
                .unwrap_or(cors_defaults.allow_credentials),
            max_age: args
                .cors_max_age
                .or(file.cors.max_age_secs)
                .map(Duration::from_secs)
                .unwrap_or(cors_defaults.max_age),
        };

        let database = if args.memory {
            DatabaseTarget::Memory
        } else if let Some(url) = args.database_url.clone().or(file.database.url) {
            DatabaseTarget::Url(url)
        } else {
            let defaults = DbConfig::default();
            DatabaseTarget::Params(DbConfig {
                host: args.db_host.clone().or(file.database.host).unwrap_or(defaults.host),
                port: args.db_port.or(file.database.port).unwrap_or(defaults.port),
                database: args.db_name.clone().or(file.database.name).unwrap_or(defaults.database),
                user: args.db_user.clone().or(file.database.user).unwrap_or(defaults.user),
                password: args
                    .db_password
                    .clone()
                    .or(file.database.password)
                    .unwrap_or(defaults.password),
            })
        };

        Ok(Self {
            server: ServerConfig {
                bind_addr: bind_addr(&host, port)?,
                cors,
            },
            pool,
            database,
        })
    }
}
