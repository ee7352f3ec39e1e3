//! Axum server setup
//!
//! Server skeleton with:
//! - Configurable CORS
//! - Tracing middleware
//! - Graceful shutdown on SIGTERM/Ctrl+C, then the pool is closed

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, Method};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::routes;
use crate::db::QueryExecutor;

/// Cross-origin policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsConfig {
    /// Allowed origins; `*` allows any
    pub allow_origins: Vec<String>,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub expose_headers: Vec<String>,
    pub allow_credentials: bool,
    /// Preflight cache lifetime
    pub max_age: Duration,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: vec!["*".to_string()],
            allow_methods: ["GET", "POST", "PUT", "DELETE", "OPTIONS", "PATCH", "HEAD"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            allow_headers: vec!["*".to_string()],
            expose_headers: Vec::new(),
            allow_credentials: true,
            max_age: Duration::from_secs(600),
        }
    }
}

fn is_wildcard(values: &[String]) -> bool {
    values.iter().any(|v| v.trim() == "*")
}

impl CorsConfig {
    /// Build the tower-http layer.
    ///
    /// Browsers reject a literal `*` alongside credentials, so wildcards are
    /// mirrored from the request when credentials are allowed.
    pub fn layer(&self) -> Result<CorsLayer, ServerError> {
        let credentials = self.allow_credentials;

        let origin = if is_wildcard(&self.allow_origins) {
            if credentials {
                AllowOrigin::mirror_request()
            } else {
                AllowOrigin::from(Any)
            }
        } else {
            let origins = self
                .allow_origins
                .iter()
                .map(|o| {
                    HeaderValue::from_str(o.trim())
                        .map_err(|_| ServerError::Cors(format!("invalid origin '{}'", o)))
                })
                .collect::<Result<Vec<_>, _>>()?;
            AllowOrigin::list(origins)
        };

        let methods = if is_wildcard(&self.allow_methods) {
            if credentials {
                AllowMethods::mirror_request()
            } else {
                AllowMethods::from(Any)
            }
        } else {
            let methods = self
                .allow_methods
                .iter()
                .map(|m| {
                    Method::from_bytes(m.trim().to_uppercase().as_bytes())
                        .map_err(|_| ServerError::Cors(format!("invalid method '{}'", m)))
                })
                .collect::<Result<Vec<_>, _>>()?;
            AllowMethods::list(methods)
        };

        let headers = if is_wildcard(&self.allow_headers) {
            if credentials {
                AllowHeaders::mirror_request()
            } else {
                AllowHeaders::from(Any)
            }
        } else {
            AllowHeaders::list(parse_headers(&self.allow_headers)?)
        };

        let mut layer = CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(credentials)
            .max_age(self.max_age);

        if is_wildcard(&self.expose_headers) {
            if credentials {
                tracing::warn!("CORS: wildcard expose-headers ignored while credentials are allowed");
            } else {
                layer = layer.expose_headers(Any);
            }
        } else if !self.expose_headers.is_empty() {
            layer = layer.expose_headers(parse_headers(&self.expose_headers)?);
        }

        Ok(layer)
    }
}

fn parse_headers(values: &[String]) -> Result<Vec<HeaderName>, ServerError> {
    values
        .iter()
        .map(|h| {
            HeaderName::from_bytes(h.trim().as_bytes())
                .map_err(|_| ServerError::Cors(format!("invalid header '{}'", h)))
        })
        .collect()
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (default: 0.0.0.0:5678)
    pub bind_addr: SocketAddr,
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5678)),
            cors: CorsConfig::default(),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: QueryExecutor,
}

/// Build the application router.
pub fn build_router(state: Arc<AppState>, cors: CorsLayer) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::directories::router())
        .merge(routes::files::router())
        .merge(routes::tags::router())
        .merge(routes::search::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server until a shutdown signal, then close the pool.
///
/// # Example
///
/// ```ignore
/// let pool = Pool::connect(PgConnector::from_url(&url)?, PoolConfig::default()).await?;
/// run_server(QueryExecutor::new(pool), ServerConfig::default()).await?;
/// ```
pub async fn run_server(db: QueryExecutor, config: ServerConfig) -> Result<(), ServerError> {
    let cors = config.cors.layer()?;
    if is_wildcard(&config.cors.allow_origins) {
        tracing::warn!("CORS: all origins allowed");
    }

    let pool = db.pool().clone();
    let app = build_router(Arc::new(AppState { db }), cors);

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "Server listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    pool.close();
    served?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid CORS configuration: {0}")]
    Cors(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 5678);
        assert_eq!(config.cors.allow_origins, vec!["*"]);
        assert!(config.cors.allow_credentials);
        assert_eq!(config.cors.max_age, Duration::from_secs(600));
    }

    #[test]
    fn wildcard_with_credentials_builds() {
        assert!(CorsConfig::default().layer().is_ok());
    }

    #[test]
    fn explicit_lists_build() {
        let cors = CorsConfig {
            allow_origins: vec!["http://localhost:3000".into()],
            allow_methods: vec!["get".into(), "post".into()],
            allow_headers: vec!["content-type".into()],
            expose_headers: vec!["x-request-id".into()],
            allow_credentials: false,
            max_age: Duration::from_secs(60),
        };
        assert!(cors.layer().is_ok());
    }

    #[test]
    fn bad_header_rejected() {
        let cors = CorsConfig {
            allow_headers: vec!["bad header".into()],
            ..Default::default()
        };
        assert!(matches!(cors.layer(), Err(ServerError::Cors(_))));
    }
}
