use std::fmt;

use deadpool::managed::{Manager, Metrics, RecycleError, RecycleResult};

use crate::error::SqlMiddlewareDbError;
use crate::mssql::client::create_mssql_client;
use crate::mssql::config::ConnectionDescriptor;
use crate::mssql::executor::MssqlConnection;

/// Manager for SQL Server connections (used with Deadpool)
#[derive(Clone)]
pub struct MssqlManager {
    descriptor: ConnectionDescriptor,
}

impl fmt::Debug for MssqlManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MssqlManager")
            .field("server", &self.descriptor.server)
            .field("port", &self.descriptor.port)
            .finish()
    }
}

impl MssqlManager {
    #[must_use]
    pub fn new(descriptor: ConnectionDescriptor) -> Self {
        Self { descriptor }
    }

    #[must_use]
    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    /// Open a new raw connection.
    ///
    /// # Errors
    ///
    /// Returns the connect or login failure.
    pub async fn acquire(&self) -> Result<MssqlConnection, SqlMiddlewareDbError> {
        tracing::debug!(
            server = %self.descriptor.server,
            port = self.descriptor.port,
            "connection::new connection requested"
        );
        let client = create_mssql_client(&self.descriptor).await?;
        Ok(MssqlConnection::new(client, self.descriptor.request_timeout))
    }

    /// Close a connection that has left the pool.
    ///
    /// # Errors
    ///
    /// Returns the driver error raised while closing.
    pub async fn destroy(&self, conn: MssqlConnection) -> Result<(), SqlMiddlewareDbError> {
        tracing::debug!("connection::destroy");
        conn.close().await
    }
}

/// A connection may be reused only if it exists and still reports itself connected.
#[must_use]
pub fn validate_connection(conn: Option<&MssqlConnection>) -> bool {
    conn.is_some_and(MssqlConnection::is_connected)
}

impl Manager for MssqlManager {
    type Type = MssqlConnection;
    type Error = SqlMiddlewareDbError;

    async fn create(&self) -> Result<MssqlConnection, SqlMiddlewareDbError> {
        self.acquire().await
    }

    async fn recycle(
        &self,
        conn: &mut MssqlConnection,
        _metrics: &Metrics,
    ) -> RecycleResult<SqlMiddlewareDbError> {
        if !validate_connection(Some(&*conn)) {
            return Err(RecycleError::Backend(SqlMiddlewareDbError::ConnectionError(
                "connection is no longer connected".to_string(),
            )));
        }

        // Health check; deadpool decides what to do with a failing connection.
        if let Err(e) = conn.ping().await {
            tracing::error!(error = %e, "A connection error occurred");
            return Err(RecycleError::Backend(e));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_connection_is_invalid() {
        assert!(!validate_connection(None));
    }
}
