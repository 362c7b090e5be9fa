//! PostgreSQL provisioning back-end.
//!
//! Databases are created using the external `createdb` program, then opened over a
//! [`tokio_postgres`] connection.

use std::{process::ExitStatus, sync::Arc};

use pristine_pools::{Backend, SchemaHandle};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, warn};

mod schema;

pub use self::schema::{PgSchema, PgTable};

/// Error type used in PostgreSQL back-end.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PgError {
    /// Unable to run database creation program.
    #[error("Unable to run {program}: {source}")]
    Command {
        /// Program name.
        program: String,
        /// Source error.
        source: std::io::Error,
    },
    /// Database creation program failed.
    #[error("{program} exited with {status}: {stderr}")]
    CommandStatus {
        /// Program name.
        program: String,
        /// Exit status.
        status: ExitStatus,
        /// Captured standard error output.
        stderr: String,
    },
    /// Connection or query error.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),
}

/// PostgreSQL back-end configuration.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[non_exhaustive]
pub struct PostgresConfig {
    /// Database creation program.
    #[serde(default = "PostgresConfig::default_createdb")]
    pub createdb: String,
    /// Extra arguments passed to database creation program before database name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub createdb_args: Vec<String>,
    /// Base connection string, without database name.
    ///
    /// Uses `key=value` format, as in `host=localhost user=postgres`.
    #[serde(default)]
    pub connection: String,
    /// Create tables as `UNLOGGED`.
    ///
    /// Speeds up writes considerably, at the cost of crash safety.
    #[serde(default = "PostgresConfig::default_unlogged_tables")]
    pub unlogged_tables: bool,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            createdb: Self::default_createdb(),
            createdb_args: Vec::new(),
            connection: String::new(),
            unlogged_tables: true,
        }
    }
}

impl PostgresConfig {
    fn default_createdb() -> String {
        "createdb".into()
    }

    fn default_unlogged_tables() -> bool {
        true
    }

    /// Set base connection string.
    #[must_use]
    pub fn with_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = connection.into();
        self
    }

    /// Full connection string for a named database.
    #[must_use]
    pub fn connection_for(&self, dbname: &str) -> String {
        let quoted = dbname.replace('\\', "\\\\").replace('\'', "\\'");
        let base = self.connection.trim();
        if base.is_empty() {
            format!("dbname='{quoted}'")
        } else {
            format!("{base} dbname='{quoted}'")
        }
    }
}

/// PostgreSQL provisioning back-end.
#[derive(Clone, Debug)]
pub struct PgBackend {
    config: PostgresConfig,
}

impl PgBackend {
    /// Create back-end from configuration.
    #[must_use]
    pub fn new(config: PostgresConfig) -> Self {
        Self { config }
    }

    /// Back-end configuration.
    #[must_use]
    pub fn config(&self) -> &PostgresConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl Backend for PgBackend {
    type Schema = PgSchema;
    type Handle = PgHandle;
    type Error = PgError;

    async fn create(&self, name: &str) -> Result<(), Self::Error> {
        let program = &self.config.createdb;
        let output = Command::new(program)
            .args(&self.config.createdb_args)
            .arg(name)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| PgError::Command {
                program: program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(PgError::CommandStatus {
                program: program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        debug!(name, "created database");
        Ok(())
    }

    async fn open(&self, name: &str, schema: &Arc<PgSchema>) -> Result<PgHandle, Self::Error> {
        let (client, connection) =
            tokio_postgres::connect(&self.config.connection_for(name), NoTls).await?;
        let conn_name = name.to_owned();
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                warn!(name = conn_name.as_str(), %err, "database connection error");
            }
        });
        Ok(PgHandle {
            client,
            name: name.to_owned(),
            schema: Arc::clone(schema),
            unlogged: self.config.unlogged_tables,
        })
    }
}

/// Open connection to a provisioned database.
pub struct PgHandle {
    client: Client,
    name: String,
    schema: Arc<PgSchema>,
    unlogged: bool,
}

impl PgHandle {
    /// Database client.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Database name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schema this database was prepared with.
    #[must_use]
    pub fn schema(&self) -> &PgSchema {
        &self.schema
    }
}

impl std::fmt::Debug for PgHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgHandle")
            .field("name", &self.name)
            .field("closed", &self.client.is_closed())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl SchemaHandle for PgHandle {
    type Error = PgError;

    async fn drop_schema(&self) -> Result<(), Self::Error> {
        if let Some(sql) = self.schema.drop_sql() {
            self.client.batch_execute(&sql).await?;
        }
        Ok(())
    }

    async fn create_schema(&self) -> Result<(), Self::Error> {
        for sql in self.schema.create_statements(self.unlogged) {
            self.client.batch_execute(&sql).await?;
        }
        Ok(())
    }

    async fn truncate_tables(&self) -> Result<(), Self::Error> {
        if let Some(sql) = self.schema.truncate_sql() {
            self.client.batch_execute(&sql).await?;
        }
        Ok(())
    }
}
