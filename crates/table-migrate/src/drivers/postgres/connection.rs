//! Connection pool for one PostgreSQL endpoint.

use std::time::Duration;

use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio_postgres::config::Host;
use tokio_postgres::{Config as PgConfig, NoTls};
use tracing::{debug, info, warn};

use super::dialect::PostgresDialect;
use crate::config::{Credentials, Role};
use crate::drivers::common::TlsBuilder;
use crate::error::{MigrateError, Result};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// The open source cursor holds one connection; catalog queries need another.
const POOL_MAX_SIZE: usize = 2;

/// Pooled connections to a source or target database.
///
/// Connections are handed out by [`PgDatabase::acquire`] and go back to the
/// pool when the returned handle is dropped, on every exit path.
pub struct PgDatabase {
    pool: Pool,
    role: Role,
    endpoint: String,
    pub(super) dialect: PostgresDialect,
}

impl PgDatabase {
    /// Open a pool and verify that the endpoint accepts the credentials.
    ///
    /// Any failure is a [`MigrateError::Connection`], which aborts the run.
    pub async fn connect(creds: &Credentials) -> Result<Self> {
        let role = creds.role;
        let mut pg_config: PgConfig = creds.dsn.parse().map_err(|e| {
            MigrateError::Config(format!(
                "{}_DSN is not a valid connection string: {}",
                role.env_prefix(),
                e
            ))
        })?;
        pg_config.user(&creds.username);
        pg_config.password(&creds.password);
        pg_config.application_name("table-migrate");
        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(30));
        if pg_config.get_connect_timeout().is_none() {
            pg_config.connect_timeout(POOL_CONNECTION_TIMEOUT);
        }
        if let Some(schema) = &creds.schema {
            pg_config.options(&search_path_option(schema));
        }

        let endpoint = describe_endpoint(&pg_config);
        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let builder = match TlsBuilder::new(creds.ssl_mode).build()? {
            Some(tls) => Pool::builder(Manager::from_config(pg_config, tls, mgr_config)),
            None => {
                warn!(
                    "TLS is disabled for the {} database. Credentials will be transmitted in plaintext.",
                    role
                );
                Pool::builder(Manager::from_config(pg_config, NoTls, mgr_config))
            }
        };
        let pool = builder
            .max_size(POOL_MAX_SIZE)
            .build()
            .map_err(|e| MigrateError::connection(role, e))?;

        let client = pool
            .get()
            .await
            .map_err(|e| MigrateError::connection(role, e))?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| MigrateError::connection(role, e))?;
        drop(client);

        info!("Connected to {} database: {}", role, endpoint);

        Ok(Self {
            pool,
            role,
            endpoint,
            dialect: PostgresDialect::new(),
        })
    }

    /// Host, port and database name, for logging.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Borrow a pooled connection.
    pub async fn acquire(&self, context: &str) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e.to_string(), format!("{} ({})", context, self.role)))
    }

    /// Close the pool; connections still borrowed are closed when returned.
    pub(super) fn close_pool(&self) {
        self.pool.close();
        debug!("Closed {} database pool", self.role);
    }
}

/// Startup option that puts `schema` first on the search path.
fn search_path_option(schema: &str) -> String {
    let quoted = format!("\"{}\"", schema.replace('"', "\"\""));
    let escaped = quoted.replace('\\', "\\\\").replace(' ', "\\ ");
    format!("-c search_path={}", escaped)
}

fn describe_endpoint(config: &PgConfig) -> String {
    let host = match config.get_hosts().first() {
        Some(Host::Tcp(host)) => host.clone(),
        #[cfg(unix)]
        Some(Host::Unix(path)) => path.display().to_string(),
        None => "localhost".to_string(),
    };
    let port = config.get_ports().first().copied().unwrap_or(5432);
    let dbname = config.get_dbname().unwrap_or("<default>");
    format!("{}:{}/{}", host, port, dbname)
}
