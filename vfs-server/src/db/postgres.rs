//! PostgreSQL backend over `sqlx`
//!
//! Connection settings come from `DATABASE_URL` or the individual
//! `DB_HOST`/`DB_PORT`/`DB_NAME`/`DB_USER`/`DB_PASSWORD` variables.

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgConnection};
use sqlx::query::Query;
use sqlx::{Connection as _, Postgres, Row as _};

use super::{Connection, Connector, DbError, Param, Row, Shape, Statement};

/// Database connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "prism_vfs".to_string(),
            user: "prism_user".to_string(),
            password: "prism_password".to_string(),
        }
    }
}

impl DbConfig {
    /// Read settings from `DB_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            database: std::env::var("DB_NAME").unwrap_or(defaults.database),
            user: std::env::var("DB_USER").unwrap_or(defaults.user),
            password: std::env::var("DB_PASSWORD").unwrap_or(defaults.password),
        }
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user)
            .password(&self.password)
    }
}

/// Opens `PgConnection`s.
#[derive(Debug, Clone)]
pub struct PgConnector {
    options: PgConnectOptions,
}

impl PgConnector {
    pub fn new(options: PgConnectOptions) -> Self {
        Self { options }
    }

    /// Build from a `postgres://` URL.
    pub fn from_url(url: &str) -> Result<Self, DbError> {
        let options = url
            .parse::<PgConnectOptions>()
            .map_err(|e| DbError::Config(format!("invalid database URL: {}", e)))?;
        Ok(Self::new(options))
    }

    pub fn from_config(config: &DbConfig) -> Self {
        Self::new(config.connect_options())
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn connect(&self) -> Result<Box<dyn Connection>, DbError> {
        let conn = PgConnection::connect_with(&self.options)
            .await
            .map_err(|e| DbError::Connect(e.to_string()))?;

        Ok(Box::new(PgConn {
            conn,
            in_transaction: false,
            broken: false,
        }))
    }
}

/// One PostgreSQL session.
struct PgConn {
    conn: PgConnection,
    in_transaction: bool,
    broken: bool,
}

impl PgConn {
    async fn simple(&mut self, sql: &'static str) -> Result<(), DbError> {
        let result = sqlx::query(sql).execute(&mut self.conn).await;
        self.check(result).map(|_| ())
    }

    /// Anything other than a server-side error leaves the session unusable.
    fn check<T>(&mut self, result: Result<T, sqlx::Error>) -> Result<T, DbError> {
        result.map_err(|e| {
            if !matches!(e, sqlx::Error::Database(_)) {
                self.broken = true;
            }
            DbError::from(e)
        })
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [Param],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            Param::Text(v) => query.bind(v.as_deref()),
            Param::Uuid(v) => query.bind(*v),
            Param::Int(v) => query.bind(*v),
            Param::Bool(v) => query.bind(*v),
            Param::TextArray(v) => query.bind(v.as_deref()),
            Param::Json(v) => query.bind(v.clone()),
        };
    }
    query
}

#[async_trait]
impl Connection for PgConn {
    async fn ping(&mut self) -> Result<(), DbError> {
        let result = self.conn.ping().await;
        self.check(result)
    }

    async fn begin(&mut self) -> Result<(), DbError> {
        self.simple("BEGIN").await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn run(&mut self, statement: &Statement) -> Result<Vec<Row>, DbError> {
        let sql = statement.sql();
        let query = bind_all(sqlx::query(&sql), statement.params());

        match statement.shape() {
            Shape::Scalar => {
                let result = query.execute(&mut self.conn).await;
                self.check(result)?;
                Ok(Vec::new())
            }
            Shape::Rows => {
                let result = query.fetch_all(&mut self.conn).await;
                let rows = self.check(result)?;
                rows.iter()
                    .map(|r| -> Result<Row, DbError> {
                        let value: serde_json::Value = r.try_get("row")?;
                        match value {
                            serde_json::Value::Object(map) => Ok(Row::new(map)),
                            other => Err(DbError::decode(
                                statement.function(),
                                format!("expected a record, got {}", other),
                            )),
                        }
                    })
                    .collect()
            }
        }
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        self.simple("COMMIT").await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        self.simple("ROLLBACK").await?;
        self.in_transaction = false;
        Ok(())
    }

    fn is_broken(&self) -> bool {
        // a session dropped mid-transaction may still hold locks
        self.broken || self.in_transaction
    }
}
