pub mod connection;
pub mod manager;
pub mod types;

use std::time::Duration;

use deadpool::Runtime;
use deadpool::managed::Pool;

pub use connection::MiddlewarePoolConnection;
pub use manager::{MssqlManager, validate_connection};
pub use types::{MiddlewarePool, PooledObject};

use crate::error::SqlMiddlewareDbError;
use crate::mssql::binding::TypeInferencer;
use crate::mssql::config::{ConnectionDescriptor, MssqlOptions, MssqlOptionsBuilder};
use crate::query::CompiledQuery;
use crate::shaping::QueryOutput;
use crate::types::ResultMode;

// Floor for the idle reaper's tick.
const MIN_REAP_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration and connection pool for a SQL Server
///
/// This struct holds the pool together with everything a checked-out connection needs to
/// dispatch and shape queries: the result mode and the type mapping.
#[derive(Clone, Debug)]
pub struct ConfigAndPool {
    /// The connection pool
    pub pool: MiddlewarePool,
    /// How unclassified responses are shaped
    pub result_mode: ResultMode,
    inferencer: TypeInferencer,
    descriptor: ConnectionDescriptor,
}

impl ConfigAndPool {
    /// Start a fluent builder for an MSSQL pool.
    #[must_use]
    pub fn mssql_builder(server: String, database: String) -> MssqlOptionsBuilder {
        MssqlOptionsBuilder::new(server, database)
    }

    /// Build a pool from options.
    ///
    /// Connections are opened lazily; `pool.min` of them are opened up front and any failure
    /// there is logged rather than returned.
    ///
    /// # Errors
    ///
    /// Returns `SqlMiddlewareDbError::ConfigError` when the authentication settings cannot be
    /// honoured, or `SqlMiddlewareDbError::ConnectionError` if the pool cannot be built.
    pub async fn new_mssql(opts: MssqlOptions) -> Result<Self, SqlMiddlewareDbError> {
        let descriptor = ConnectionDescriptor::from_options(&opts);
        // Surface bad auth settings now rather than on first checkout.
        descriptor.tiberius_config()?;

        tracing::debug!(
            connection_string = %descriptor.redacted_connection_string(),
            result_mode = ?opts.result_mode,
            "pool::initialize"
        );

        let max_size = opts.pool.max.max(1);
        let manager = MssqlManager::new(descriptor.clone());
        let mut builder = Pool::builder(manager)
            .max_size(max_size)
            .runtime(Runtime::Tokio1)
            .create_timeout(Some(descriptor.connection_timeout));
        if let Some(ms) = opts.pool.acquire_timeout_millis {
            builder = builder.wait_timeout(Some(Duration::from_millis(ms)));
        }
        let pool = builder.build().map_err(|e| {
            SqlMiddlewareDbError::ConnectionError(format!("Failed to create SQL Server pool: {e}"))
        })?;

        warm_up(&pool, opts.pool.min.min(max_size)).await;
        if let Some(ms) = opts.pool.idle_timeout_millis {
            spawn_idle_reaper(&pool, Duration::from_millis(ms));
        }

        Ok(ConfigAndPool {
            pool,
            result_mode: opts.result_mode,
            inferencer: TypeInferencer::new(opts.map_binding),
            descriptor,
        })
    }

    /// Check out a connection.
    ///
    /// # Errors
    ///
    /// Returns the connect error when a new connection has to be opened and fails, or
    /// `SqlMiddlewareDbError::PoolError` when no slot frees up within the acquire timeout.
    pub async fn get_connection(&self) -> Result<MiddlewarePoolConnection, SqlMiddlewareDbError> {
        let conn = self.pool.get().await?;
        Ok(MiddlewarePoolConnection::new(
            conn,
            self.result_mode,
            self.inferencer.clone(),
            self.descriptor.debug,
        ))
    }

    /// Check out a connection, run one compiled query and release the connection.
    ///
    /// # Errors
    ///
    /// See [`ConfigAndPool::get_connection`] and [`MiddlewarePoolConnection::run`].
    pub async fn run(&self, query: &CompiledQuery) -> Result<QueryOutput, SqlMiddlewareDbError> {
        let mut conn = self.get_connection().await?;
        conn.run(query).await
    }

    #[must_use]
    pub fn result_mode(&self) -> ResultMode {
        self.result_mode
    }

    /// Settings the pool connects with.
    #[must_use]
    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub fn status(&self) -> deadpool::Status {
        self.pool.status()
    }

    /// Close the pool; idle connections are dropped and checkouts fail from now on.
    pub fn close(&self) {
        tracing::debug!("pool::close");
        self.pool.close();
    }
}

async fn warm_up(pool: &MiddlewarePool, min: usize) {
    if min == 0 {
        return;
    }
    let checkouts = futures_util::future::join_all((0..min).map(|_| pool.get())).await;
    for outcome in checkouts {
        if let Err(e) = outcome {
            tracing::warn!(error = %e, "pool::warm-up connection failed");
        }
    }
}

// Holds only a weak handle, so dropping every `ConfigAndPool` also ends the reaper.
fn spawn_idle_reaper(pool: &MiddlewarePool, idle: Duration) {
    let weak = pool.weak();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(idle.max(MIN_REAP_INTERVAL));
        loop {
            ticker.tick().await;
            let Some(pool) = weak.upgrade() else {
                break;
            };
            if pool.is_closed() {
                break;
            }
            let before = pool.status().size;
            pool.retain(|_, metrics| metrics.last_used() < idle);
            let after = pool.status().size;
            if after < before {
                tracing::debug!(reaped = before - after, "pool::idle connections dropped");
            }
        }
        tracing::trace!("pool::idle reaper stopped");
    });
}
