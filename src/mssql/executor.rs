use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tiberius::Query;

use super::client::MssqlClient;
use super::params::{SqlParam, declaration};
use super::query::build_response;
use crate::dispatch::{BoundParameter, DriverConnection, Request};
use crate::error::SqlMiddlewareDbError;
use crate::results::Response;

/// Whether a connection may still be handed out by the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Liveness {
    connected: bool,
}

impl Default for Liveness {
    fn default() -> Self {
        Self { connected: true }
    }
}

impl Liveness {
    #[must_use]
    pub fn is_connected(self) -> bool {
        self.connected
    }

    /// Pass `outcome` through, marking the connection dead on errors that leave it in an
    /// unknown state.
    ///
    /// # Errors
    ///
    /// Returns `outcome`'s error unchanged.
    pub fn settle<T>(
        &mut self,
        outcome: Result<T, SqlMiddlewareDbError>,
    ) -> Result<T, SqlMiddlewareDbError> {
        if let Err(e) = &outcome
            && e.breaks_connection()
        {
            tracing::debug!(error = %e, "connection::marked disconnected");
            self.connected = false;
        }
        outcome
    }
}

/// A tiberius client plus the liveness flag the pool validates before reuse.
pub struct MssqlConnection {
    client: MssqlClient,
    liveness: Liveness,
    request_timeout: Option<Duration>,
}

impl fmt::Debug for MssqlConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MssqlConnection")
            .field("liveness", &self.liveness)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl MssqlConnection {
    #[must_use]
    pub fn new(client: MssqlClient, request_timeout: Option<Duration>) -> Self {
        Self {
            client,
            liveness: Liveness::default(),
            request_timeout,
        }
    }

    /// False once a request timed out or the socket failed.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.liveness.is_connected()
    }

    /// Direct access to the tiberius client for anything this crate does not wrap.
    pub fn client_mut(&mut self) -> &mut MssqlClient {
        &mut self.client
    }

    /// Run `SELECT 1`, bounded by the request timeout, and mark the connection dead if it
    /// times out or the socket fails.
    ///
    /// # Errors
    ///
    /// Returns the driver or timeout error from the health check.
    pub async fn ping(&mut self) -> Result<(), SqlMiddlewareDbError> {
        let client = &mut self.client;
        let outcome = with_timeout(self.request_timeout, async move {
            client.simple_query("SELECT 1").await?.into_results().await?;
            Ok(())
        })
        .await;
        self.liveness.settle(outcome)
    }

    /// Close the underlying socket.
    ///
    /// # Errors
    ///
    /// Returns the driver error raised while closing.
    pub async fn close(self) -> Result<(), SqlMiddlewareDbError> {
        self.client.close().await?;
        Ok(())
    }
}

/// Await `fut`, failing with `RequestTimeout` once `limit` has passed.
async fn with_timeout<T, F>(limit: Option<Duration>, fut: F) -> Result<T, SqlMiddlewareDbError>
where
    F: Future<Output = Result<T, SqlMiddlewareDbError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| SqlMiddlewareDbError::RequestTimeout(limit))?,
        None => fut.await,
    }
}

/// `EXEC sp_executesql @P1, @P2, @c0 = @P3, ...` with the statement and the parameter
/// declarations as the first two arguments, so the SQL keeps its own parameter names.
fn executesql_batch(params: &[BoundParameter]) -> (String, String) {
    let declarations = params
        .iter()
        .map(|p| format!("@{} {}", p.name, declaration(&p.binding)))
        .collect::<Vec<_>>()
        .join(", ");
    let assignments = params
        .iter()
        .enumerate()
        .map(|(i, p)| format!("@{} = @P{}", p.name, i + 3))
        .collect::<Vec<_>>()
        .join(", ");
    (
        format!("EXEC sp_executesql @P1, @P2, {assignments}"),
        declarations,
    )
}

fn procedure_batch(procedure: &str, params: &[BoundParameter]) -> String {
    let assignments = params
        .iter()
        .enumerate()
        .map(|(i, p)| format!("@{} = @P{}", p.name, i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    if assignments.is_empty() {
        format!("EXEC {procedure}")
    } else {
        format!("EXEC {procedure} {assignments}")
    }
}

// Every parameter is encoded before anything is sent.
fn encode(params: &[BoundParameter]) -> Result<Vec<SqlParam<'_>>, SqlMiddlewareDbError> {
    params
        .iter()
        .map(|p| {
            SqlParam::try_from(&p.binding).map_err(|e| match e {
                SqlMiddlewareDbError::ParameterError(msg) => {
                    SqlMiddlewareDbError::ParameterError(format!("@{}: {msg}", p.name))
                }
                other => other,
            })
        })
        .collect()
}

async fn run_query(
    client: &mut MssqlClient,
    sql: &str,
    params: &[BoundParameter],
) -> Result<Response, SqlMiddlewareDbError> {
    if params.is_empty() {
        let stream = client.simple_query(sql).await?;
        return build_response(stream).await;
    }

    let values = encode(params)?;
    let (batch, declarations) = executesql_batch(params);
    let mut query = Query::new(batch);
    query.bind(sql.to_string());
    query.bind(declarations);
    for value in values {
        query.bind(value);
    }
    let stream = query.query(client).await?;
    build_response(stream).await
}

async fn run_procedure(
    client: &mut MssqlClient,
    procedure: &str,
    params: &[BoundParameter],
) -> Result<Response, SqlMiddlewareDbError> {
    let values = encode(params)?;
    let mut query = Query::new(procedure_batch(procedure, params));
    for value in values {
        query.bind(value);
    }
    let stream = query.query(client).await?;
    build_response(stream).await
}

#[async_trait]
impl DriverConnection for MssqlConnection {
    async fn query(&mut self, sql: &str, request: Request) -> Result<Response, SqlMiddlewareDbError> {
        let outcome = with_timeout(
            self.request_timeout,
            run_query(&mut self.client, sql, &request.params),
        )
        .await;
        self.liveness.settle(outcome)
    }

    async fn execute(
        &mut self,
        procedure: &str,
        request: Request,
    ) -> Result<Response, SqlMiddlewareDbError> {
        let outcome = with_timeout(
            self.request_timeout,
            run_procedure(&mut self.client, procedure, &request.params),
        )
        .await;
        self.liveness.settle(outcome)
    }
}
