//! Helpers for exercising the adapter without a SQL Server.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;

use crate::dispatch::{DriverConnection, Request};
use crate::error::SqlMiddlewareDbError;
use crate::results::{CustomDbRow, Response, ResultSet};
use crate::types::RowValues;

/// Create a test row with the given column names and values.
#[must_use]
pub fn create_test_row(column_names: Vec<String>, values: Vec<RowValues>) -> CustomDbRow {
    CustomDbRow::new(Arc::new(column_names), values)
}

/// Build a recordset from column names and rows of values.
#[must_use]
pub fn recordset(columns: &[&str], rows: Vec<Vec<RowValues>>) -> ResultSet {
    let mut result_set = ResultSet::with_capacity(rows.len());
    result_set.set_column_names(Arc::new(columns.iter().map(|c| (*c).to_string()).collect()));
    for row in rows {
        result_set.add_row_values(row);
    }
    result_set
}

/// One request seen by a [`RecordingConnection`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Query { sql: String, request: Request },
    Execute { procedure: String, request: Request },
}

/// A `DriverConnection` that records requests and replays canned responses in order.
#[derive(Debug, Default)]
pub struct RecordingConnection {
    pub calls: Vec<RecordedCall>,
    responses: VecDeque<Result<Response, SqlMiddlewareDbError>>,
}

impl RecordingConnection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of the next request.
    #[must_use]
    pub fn respond(mut self, outcome: Result<Response, SqlMiddlewareDbError>) -> Self {
        self.responses.push_back(outcome);
        self
    }

    fn next(&mut self) -> Result<Response, SqlMiddlewareDbError> {
        self.responses.pop_front().unwrap_or_else(|| Ok(Response::default()))
    }
}

#[async_trait]
impl DriverConnection for RecordingConnection {
    async fn query(&mut self, sql: &str, request: Request) -> Result<Response, SqlMiddlewareDbError> {
        self.calls.push(RecordedCall::Query {
            sql: sql.to_string(),
            request,
        });
        self.next()
    }

    async fn execute(
        &mut self,
        procedure: &str,
        request: Request,
    ) -> Result<Response, SqlMiddlewareDbError> {
        self.calls.push(RecordedCall::Execute {
            procedure: procedure.to_string(),
            request,
        });
        self.next()
    }
}
