use observability_deps::tracing::info;
use snafu::ResultExt;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::{Result, SqlxSnafu, UnsupportedSchemaVersionSnafu};

/// Lowest Postgres major version this Store supports. Mirrors the
/// original's MongoDB-3.2 floor check at connect time.
const MIN_SERVER_VERSION: i64 = 100_000; // Postgres 10.0, encoded as server_version_num

/// A handle to the persistent document store.
///
/// Every entity-specific repository (`MoleculeRepo`, `ResultRepo`, ...) is a
/// thin wrapper borrowing this handle's pool; `Store` itself only owns the
/// connection pool and the configured `max_limit`.
#[derive(Debug, Clone)]
pub struct Store {
    pub(crate) pool: PgPool,
    max_limit: usize,
}

impl Store {
    /// Connects to `database_uri`, verifying the server is at least
    /// [`MIN_SERVER_VERSION`] and that the expected tables exist (applying
    /// pending migrations if not).
    pub async fn connect(database_uri: &str, max_limit: usize) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_uri)
            .await
            .context(SqlxSnafu)?;

        let server_version: i64 = sqlx::query_scalar("SHOW server_version_num")
            .fetch_one(&pool)
            .await
            .context(SqlxSnafu)?
            .parse()
            .unwrap_or(0);

        if server_version < MIN_SERVER_VERSION {
            return Err(UnsupportedSchemaVersionSnafu {
                found: server_version,
                required: MIN_SERVER_VERSION,
            }
            .build());
        }

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(sqlx::Error::from)
            .context(SqlxSnafu)?;

        info!(database_uri, "connected to store");

        Ok(Self { pool, max_limit })
    }

    /// Wraps an already-constructed pool, e.g. for tests against an
    /// externally managed database.
    pub fn from_pool(pool: PgPool, max_limit: usize) -> Self {
        Self { pool, max_limit }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Clamps a caller-supplied `limit` to `max_limit`:
    /// zero, negative (represented as `None`), or overly large limits all
    /// collapse to `max_limit` rather than erroring.
    pub fn clamp_limit(&self, limit: Option<i64>) -> i64 {
        let max = self.max_limit as i64;
        match limit {
            Some(l) if l > 0 && l <= max => l,
            _ => max,
        }
    }

    pub fn max_limit(&self) -> usize {
        self.max_limit
    }
}
