use std::fmt;

use deadpool::managed::Object;

use super::manager::validate_connection;
use super::types::PooledObject;
use crate::dispatch::{Statement, execute_statement};
use crate::error::SqlMiddlewareDbError;
use crate::mssql::binding::TypeInferencer;
use crate::mssql::client::MssqlClient;
use crate::query::CompiledQuery;
use crate::query_builder::QueryBuilder;
use crate::results::Response;
use crate::shaping::{QueryOutput, shape_response};
use crate::types::ResultMode;

/// A connection checked out of the pool, carrying the pool's result mode and type mapping.
pub struct MiddlewarePoolConnection {
    conn: PooledObject,
    result_mode: ResultMode,
    inferencer: TypeInferencer,
    debug: bool,
}

impl fmt::Debug for MiddlewarePoolConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewarePoolConnection")
            .field("conn", &*self.conn)
            .field("result_mode", &self.result_mode)
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

impl MiddlewarePoolConnection {
    pub(crate) fn new(
        conn: PooledObject,
        result_mode: ResultMode,
        inferencer: TypeInferencer,
        debug: bool,
    ) -> Self {
        Self {
            conn,
            result_mode,
            inferencer,
            debug,
        }
    }

    /// Start a fluent query on this connection.
    pub fn query<'q>(&mut self, sql: &'q str) -> QueryBuilder<'_, 'q> {
        QueryBuilder::new(self, sql)
    }

    /// Dispatch a compiled query and shape its response.
    ///
    /// # Errors
    ///
    /// Returns binding, driver, timeout and shaping errors; a connection that timed out or
    /// lost its socket is rejected before anything is sent.
    pub async fn run(&mut self, query: &CompiledQuery) -> Result<QueryOutput, SqlMiddlewareDbError> {
        let statement = Statement::new(&query.sql, query.bindings.clone())?;
        let response = self.execute_statement(&statement).await?;
        shape_response(response, query, self.result_mode)
    }

    /// Dispatch an already validated statement and return every recordset unshaped.
    ///
    /// # Errors
    ///
    /// Returns `SqlMiddlewareDbError::ConnectionError` if the connection is no longer usable,
    /// otherwise whatever the dispatcher returns.
    pub async fn execute_statement(
        &mut self,
        statement: &Statement,
    ) -> Result<Response, SqlMiddlewareDbError> {
        if !self.is_valid() {
            return Err(SqlMiddlewareDbError::ConnectionError(
                "connection is no longer connected".to_string(),
            ));
        }
        execute_statement(&mut *self.conn, statement, &self.inferencer, self.debug).await
    }

    /// Whether the underlying connection is still usable.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        validate_connection(Some(&*self.conn))
    }

    #[must_use]
    pub fn result_mode(&self) -> ResultMode {
        self.result_mode
    }

    /// Raw tiberius client, for statements this crate does not model.
    pub fn client_mut(&mut self) -> &mut MssqlClient {
        self.conn.client_mut()
    }

    /// Detach the connection from the pool and close it.
    ///
    /// # Errors
    ///
    /// Returns the driver error raised while closing.
    pub async fn destroy(self) -> Result<(), SqlMiddlewareDbError> {
        let pool = Object::pool(&self.conn);
        let conn = Object::take(self.conn);
        match pool {
            Some(pool) => pool.manager().destroy(conn).await,
            None => {
                tracing::debug!("connection::destroy");
                conn.close().await
            }
        }
    }
}

