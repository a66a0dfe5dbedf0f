use std::borrow::Cow;

use crate::error::SqlMiddlewareDbError;
use crate::pool::MiddlewarePoolConnection;
use crate::query::CompiledQuery;
use crate::results::{CustomDbRow, ResultSet};
use crate::shaping::{OutputTransform, QueryOutput};
use crate::types::{QueryMethod, RowValues};

/// Fluent builder for one statement on a pooled connection.
///
/// ```rust,no_run
/// # use mssql_middleware::prelude::*;
/// # async fn demo(conn: &mut MiddlewarePoolConnection) -> Result<(), SqlMiddlewareDbError> {
/// let names = conn
///     .query("select name from users where id > ?")
///     .params(&[RowValues::Int(10)])
///     .pluck("name")
///     .await?;
/// # let _ = names;
/// # Ok(())
/// # }
/// ```
pub struct QueryBuilder<'conn, 'q> {
    conn: &'conn mut MiddlewarePoolConnection,
    sql: &'q str,
    params: Cow<'q, [RowValues]>,
    method: QueryMethod,
    returning: Option<String>,
    output: Option<OutputTransform>,
}

impl<'conn, 'q> QueryBuilder<'conn, 'q> {
    pub(crate) fn new(conn: &'conn mut MiddlewarePoolConnection, sql: &'q str) -> Self {
        Self {
            conn,
            sql,
            params: Cow::Borrowed(&[]),
            method: QueryMethod::Raw,
            returning: None,
            output: None,
        }
    }

    /// Provide parameters for this statement, in marker order.
    #[must_use]
    pub fn params(mut self, params: &'q [RowValues]) -> Self {
        self.params = Cow::Borrowed(params);
        self
    }

    /// Provide owned parameters for this statement.
    #[must_use]
    pub fn params_owned(mut self, params: Vec<RowValues>) -> Self {
        self.params = Cow::Owned(params);
        self
    }

    #[must_use]
    pub fn method(mut self, method: QueryMethod) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn returning(mut self, returning: impl Into<String>) -> Self {
        self.returning = Some(returning.into());
        self
    }

    /// Replace the built-in shaping with `output`.
    #[must_use]
    pub fn output(mut self, output: OutputTransform) -> Self {
        self.output = Some(output);
        self
    }

    fn compile(&self, pluck: Option<String>) -> CompiledQuery {
        CompiledQuery {
            sql: self.sql.to_string(),
            bindings: self.params.to_vec(),
            method: self.method,
            pluck,
            returning: self.returning.clone(),
            output: self.output.clone(),
        }
    }

    /// Run with whatever method was set and return the shaped output.
    ///
    /// # Errors
    ///
    /// See [`MiddlewarePoolConnection::run`].
    pub async fn run(self) -> Result<QueryOutput, SqlMiddlewareDbError> {
        let query = self.compile(None);
        self.conn.run(&query).await
    }

    /// Return the first recordset.
    ///
    /// # Errors
    ///
    /// See [`MiddlewarePoolConnection::run`].
    pub async fn select(mut self) -> Result<ResultSet, SqlMiddlewareDbError> {
        self.method = QueryMethod::Select;
        Ok(self.run().await?.into_recordset().unwrap_or_default())
    }

    /// Return the first row of the first recordset, if any.
    ///
    /// # Errors
    ///
    /// See [`MiddlewarePoolConnection::run`].
    pub async fn first(mut self) -> Result<Option<CustomDbRow>, SqlMiddlewareDbError> {
        self.method = QueryMethod::First;
        Ok(self.run().await?.into_row())
    }

    /// Return `column` from every row; rows without it give `RowValues::Null`.
    ///
    /// # Errors
    ///
    /// See [`MiddlewarePoolConnection::run`].
    pub async fn pluck(mut self, column: &str) -> Result<Vec<RowValues>, SqlMiddlewareDbError> {
        self.method = QueryMethod::Pluck;
        let query = self.compile(Some(column.to_string()));
        Ok(self.conn.run(&query).await?.into_values().unwrap_or_default())
    }

    /// Run unclassified and shape by the pool's result mode.
    ///
    /// # Errors
    ///
    /// See [`MiddlewarePoolConnection::run`].
    pub async fn raw(mut self) -> Result<QueryOutput, SqlMiddlewareDbError> {
        self.method = QueryMethod::Raw;
        self.run().await
    }

    /// Row-by-row streaming.
    ///
    /// # Errors
    ///
    /// Always returns `SqlMiddlewareDbError::Unimplemented`.
    pub async fn stream(self) -> Result<(), SqlMiddlewareDbError> {
        Err(SqlMiddlewareDbError::Unimplemented(
            "streaming is not supported by the mssql adapter".to_string(),
        ))
    }
}
