//! Database connection pool management
//!
//! A bounded set of connections behind a semaphore. Leases are RAII guards:
//! dropping one returns its connection to the idle list exactly once, on
//! every exit path. Acquisition is retried a fixed number of times with a
//! fixed delay; statements themselves are never retried here.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::{DbError, Row, Statement};

/// Default pool bounds.
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Acquisition attempts before giving up with `PoolExhausted`.
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Opens new connections to one database.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> Result<Box<dyn Connection>, DbError>;
}

/// One live database connection.
#[async_trait]
pub trait Connection: Send + 'static {
    /// Round-trip check run before an idle connection is handed out.
    async fn ping(&mut self) -> Result<(), DbError>;

    async fn begin(&mut self) -> Result<(), DbError>;

    /// Run one statement. Row-shaped statements return their rows.
    async fn run(&mut self, statement: &Statement) -> Result<Vec<Row>, DbError>;

    async fn commit(&mut self) -> Result<(), DbError>;

    async fn rollback(&mut self) -> Result<(), DbError>;

    /// A broken connection is discarded on release instead of reused.
    fn is_broken(&self) -> bool;
}

/// Pool sizing and retry policy.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Connections opened eagerly at startup.
    pub min_connections: u32,
    /// Upper bound on live connections.
    pub max_connections: u32,
    /// Acquisition attempts before `PoolExhausted`.
    pub max_retries: u32,
    /// Wait per attempt, and pause after a failed connect.
    pub retry_delay: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: DEFAULT_MIN_CONNECTIONS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<(), DbError> {
        if self.max_connections == 0 {
            return Err(DbError::Config("max_connections must be at least 1".into()));
        }
        if self.min_connections > self.max_connections {
            return Err(DbError::Config(format!(
                "min_connections ({}) exceeds max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }
        if self.max_retries == 0 {
            return Err(DbError::Config("max_retries must be at least 1".into()));
        }
        Ok(())
    }
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    /// Live connections, idle plus leased.
    pub size: u32,
    pub idle: u32,
    pub in_use: u32,
    pub max: u32,
}

/// Shared connection pool. Cheap to clone.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    connector: Box<dyn Connector>,
    config: PoolConfig,
    idle: Mutex<VecDeque<Box<dyn Connection>>>,
    permits: Arc<Semaphore>,
    size: AtomicU32,
}

impl Pool {
    /// Build a pool and open `min_connections` up front.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or an initial connection
    /// cannot be opened.
    pub async fn connect(
        connector: impl Connector,
        config: PoolConfig,
    ) -> Result<Self, DbError> {
        config.validate()?;

        let inner = Arc::new(PoolInner {
            connector: Box::new(connector),
            permits: Arc::new(Semaphore::new(config.max_connections as usize)),
            idle: Mutex::new(VecDeque::with_capacity(config.max_connections as usize)),
            size: AtomicU32::new(0),
            config,
        });

        for _ in 0..inner.config.min_connections {
            let conn = inner.connector.connect().await?;
            inner.size.fetch_add(1, Ordering::SeqCst);
            inner.idle.lock().push_back(conn);
        }

        tracing::info!(
            min = inner.config.min_connections,
            max = inner.config.max_connections,
            "connection pool ready"
        );

        Ok(Self { inner })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Lease a connection, retrying up to `max_retries` times.
    ///
    /// Each attempt waits up to `retry_delay` for a free slot. A failed
    /// connect gives the slot back and sleeps `retry_delay` before the next
    /// attempt. The idle-list lock is never held while waiting.
    pub async fn acquire(&self) -> Result<Lease, DbError> {
        let config = &self.inner.config;
        let mut last_reason = String::new();

        for attempt in 1..=config.max_retries {
            let permit = match tokio::time::timeout(
                config.retry_delay,
                Arc::clone(&self.inner.permits).acquire_owned(),
            )
            .await
            {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => return Err(DbError::PoolClosed),
                Err(_) => {
                    last_reason = format!(
                        "all {} connections are in use",
                        config.max_connections
                    );
                    tracing::warn!(attempt, max_retries = config.max_retries, "connection pool busy");
                    continue;
                }
            };

            match self.checkout(permit).await {
                Ok(lease) => return Ok(lease),
                Err(e) => {
                    last_reason = e.to_string();
                    tracing::warn!(
                        attempt,
                        max_retries = config.max_retries,
                        error = %e,
                        "failed to open database connection"
                    );
                    if attempt < config.max_retries {
                        tokio::time::sleep(config.retry_delay).await;
                    }
                }
            }
        }

        tracing::error!(
            attempts = config.max_retries,
            reason = %last_reason,
            "connection pool exhausted"
        );
        Err(DbError::PoolExhausted {
            attempts: config.max_retries,
            reason: last_reason,
        })
    }

    /// Pair a slot with a live idle connection, or open a new one.
    ///
    /// Idle connections that fail a ping are dropped on the way.
    async fn checkout(&self, permit: OwnedSemaphorePermit) -> Result<Lease, DbError> {
        loop {
            let idle = self.inner.idle.lock().pop_front();
            let Some(mut conn) = idle else {
                break;
            };
            match conn.ping().await {
                Ok(()) => return Ok(self.lease(conn, permit)),
                Err(e) => {
                    let size = self.inner.size.fetch_sub(1, Ordering::SeqCst) - 1;
                    tracing::warn!(size, error = %e, "dropping dead idle connection");
                }
            }
        }

        let conn = self.inner.connector.connect().await?;
        let size = self.inner.size.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(size, "opened database connection");
        Ok(self.lease(conn, permit))
    }

    fn lease(&self, conn: Box<dyn Connection>, permit: OwnedSemaphorePermit) -> Lease {
        Lease {
            conn: Some(conn),
            pool: Arc::clone(&self.inner),
            _permit: permit,
        }
    }

    pub fn status(&self) -> PoolStatus {
        let max = self.inner.config.max_connections;
        let available = self.inner.permits.available_permits() as u32;
        PoolStatus {
            size: self.inner.size.load(Ordering::SeqCst),
            idle: self.inner.idle.lock().len() as u32,
            in_use: max.saturating_sub(available),
            max,
        }
    }

    /// Close the pool. Idle connections are dropped now, leased ones when
    /// their lease ends. Later `acquire` calls fail with `PoolClosed`.
    pub fn close(&self) {
        self.inner.permits.close();
        let drained: Vec<_> = self.inner.idle.lock().drain(..).collect();
        self.inner
            .size
            .fetch_sub(drained.len() as u32, Ordering::SeqCst);
        tracing::info!(closed = drained.len(), "connection pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.permits.is_closed()
    }
}

/// Exclusive hold on one pooled connection.
pub struct Lease {
    conn: Option<Box<dyn Connection>>,
    pool: Arc<PoolInner>,
    // released after the connection is back on the idle list
    _permit: OwnedSemaphorePermit,
}

impl Deref for Lease {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.conn
            .as_deref()
            .expect("lease holds a connection until dropped")
    }
}

impl DerefMut for Lease {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn
            .as_deref_mut()
            .expect("lease holds a connection until dropped")
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };

        if conn.is_broken() || self.pool.permits.is_closed() {
            let size = self.pool.size.fetch_sub(1, Ordering::SeqCst) - 1;
            tracing::debug!(size, "discarding database connection");
            drop(conn);
        } else {
            self.pool.idle.lock().push_back(conn);
        }
    }
}
