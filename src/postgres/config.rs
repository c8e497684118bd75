use std::future::Future;

use bb8::{ManageConnection, Pool, PooledConnection};
use tokio_postgres::{Client, NoTls};
use tracing::{debug, warn};

use crate::error::SqlRunnerError;
use crate::pool::{ConfigAndPool, MiddlewarePool};
use crate::secret::Secret;
use crate::types::DatabaseType;

pub type PgPooledConnection = PooledConnection<'static, PgManager>;

/// Options for configuring a `PostgreSQL` pool.
#[derive(Debug, Clone, Default)]
pub struct PostgresOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<Secret>,
    pub dbname: Option<String>,
    pub max_size: Option<u32>,
}

impl PostgresOptions {
    /// Start from a libpq-style connection string (`host=... user=...` or a `postgres://` URL).
    ///
    /// # Errors
    /// Returns `SqlRunnerError::ConfigError` if the string can't be parsed.
    pub fn from_url(url: &str) -> Result<Self, SqlRunnerError> {
        let config: tokio_postgres::Config = url
            .parse()
            .map_err(|e| SqlRunnerError::ConfigError(format!("invalid connection string: {e}")))?;
        let host = config.get_hosts().first().and_then(|host| match host {
            tokio_postgres::config::Host::Tcp(name) => Some(name.clone()),
            #[allow(unreachable_patterns)]
            _ => None,
        });
        Ok(Self {
            host,
            port: config.get_ports().first().copied().or(Some(5432)),
            user: config.get_user().map(str::to_string),
            password: config
                .get_password()
                .map(|raw| Secret::new(String::from_utf8_lossy(raw).into_owned())),
            dbname: config.get_dbname().map(str::to_string),
            max_size: None,
        })
    }

    fn to_pg_config(&self) -> Result<tokio_postgres::Config, SqlRunnerError> {
        let dbname = required(self.dbname.as_ref(), "dbname")?;
        let host = required(self.host.as_ref(), "host")?;
        let port = required(self.port.as_ref(), "port")?;
        let user = required(self.user.as_ref(), "user")?;

        let mut config = tokio_postgres::Config::new();
        config.dbname(dbname).host(host).port(*port).user(user);
        match &self.password {
            Some(password) => {
                config.password(password.expose());
            }
            None => warn!(%host, %user, "connecting to postgres without a password"),
        }
        Ok(config)
    }
}

fn required<'a, T>(value: Option<&'a T>, name: &str) -> Result<&'a T, SqlRunnerError> {
    value.ok_or_else(|| SqlRunnerError::ConfigError(format!("{name} is required")))
}

/// Fluent builder for `PostgreSQL` options.
#[derive(Debug, Clone, Default)]
pub struct PostgresOptionsBuilder {
    opts: PostgresOptions,
}

impl PostgresOptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.opts.host = Some(host.into());
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.opts.port = Some(port);
        self
    }

    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.opts.user = Some(user.into());
        self
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<Secret>) -> Self {
        self.opts.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn dbname(mut self, dbname: impl Into<String>) -> Self {
        self.opts.dbname = Some(dbname.into());
        self
    }

    #[must_use]
    pub fn max_size(mut self, max_size: u32) -> Self {
        self.opts.max_size = Some(max_size);
        self
    }

    #[must_use]
    pub fn finish(self) -> PostgresOptions {
        self.opts
    }

    /// Build a `ConfigAndPool` for `PostgreSQL`.
    ///
    /// # Errors
    /// Returns `SqlRunnerError::ConfigError` when a required field is missing.
    pub async fn build(self) -> Result<ConfigAndPool, SqlRunnerError> {
        ConfigAndPool::new_postgres(self.finish()).await
    }
}

/// bb8 manager for Postgres clients.
pub struct PgManager {
    config: tokio_postgres::Config,
}

impl PgManager {
    #[must_use]
    pub fn new(config: tokio_postgres::Config) -> Self {
        Self { config }
    }
}

impl ManageConnection for PgManager {
    type Connection = Client;
    type Error = tokio_postgres::Error;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let cfg = self.config.clone();
        async move {
            let (client, connection) = cfg.connect(NoTls).await?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    debug!(error = %e, "postgres connection task ended");
                }
            });
            Ok(client)
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move { conn.simple_query("SELECT 1").await.map(|_| ()) }
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.is_closed()
    }
}

impl ConfigAndPool {
    #[must_use]
    pub fn postgres_builder() -> PostgresOptionsBuilder {
        PostgresOptionsBuilder::new()
    }

    /// Create a bb8-backed `PostgreSQL` pool. Connections are opened lazily on checkout.
    ///
    /// # Errors
    /// Returns `SqlRunnerError::ConfigError` if required config fields are missing.
    pub async fn new_postgres(opts: PostgresOptions) -> Result<Self, SqlRunnerError> {
        let config = opts.to_pg_config()?;
        let mut builder = Pool::builder();
        if let Some(max_size) = opts.max_size {
            if max_size == 0 {
                return Err(SqlRunnerError::ConfigError(
                    "max_size must be at least 1".to_string(),
                ));
            }
            builder = builder.max_size(max_size);
        }
        let pool = builder.build(PgManager::new(config)).await?;
        debug!(
            host = ?opts.host,
            dbname = ?opts.dbname,
            password = ?opts.password,
            "postgres pool ready"
        );

        Ok(ConfigAndPool {
            pool: MiddlewarePool::Postgres(pool),
            db_type: DatabaseType::Postgres,
        })
    }
}
