use tiberius::{Client, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use super::config::ConnectionDescriptor;
use crate::error::SqlMiddlewareDbError;

/// Type alias for SQL Server client
pub type MssqlClient = Client<Compat<TcpStream>>;

/// Open one authenticated connection described by `descriptor`.
///
/// Connect plus login is bounded by the descriptor's connection timeout. Azure gateways that
/// answer with a routing redirect are followed once.
///
/// # Errors
///
/// Returns `SqlMiddlewareDbError::ConnectionError` on timeout or socket failure,
/// `SqlMiddlewareDbError::ConfigError` for unusable authentication settings, and
/// `SqlMiddlewareDbError::Driver` when the server rejects the login.
pub async fn create_mssql_client(
    descriptor: &ConnectionDescriptor,
) -> Result<MssqlClient, SqlMiddlewareDbError> {
    let limit = descriptor.connection_timeout;
    tokio::time::timeout(limit, connect(descriptor))
        .await
        .map_err(|_| {
            SqlMiddlewareDbError::ConnectionError(format!(
                "Connection timeout expired after {} ms connecting to {}:{}",
                limit.as_millis(),
                descriptor.server,
                descriptor.port
            ))
        })?
}

async fn connect(descriptor: &ConnectionDescriptor) -> Result<MssqlClient, SqlMiddlewareDbError> {
    let config = descriptor.tiberius_config()?;

    let tcp = if descriptor.instance_name.is_some() {
        TcpStream::connect_named(&config).await?
    } else {
        TcpStream::connect(config.get_addr()).await.map_err(|e| {
            SqlMiddlewareDbError::ConnectionError(format!("TCP connection error: {e}"))
        })?
    };
    tcp.set_nodelay(true)
        .map_err(|e| SqlMiddlewareDbError::ConnectionError(format!("TCP setup error: {e}")))?;

    match Client::connect(config.clone(), tcp.compat_write()).await {
        Ok(client) => Ok(client),
        Err(tiberius::error::Error::Routing { host, port }) => {
            tracing::debug!(%host, port, "connection::routing redirect");
            let mut routed = config;
            routed.host(&host);
            routed.port(port);
            let tcp = TcpStream::connect(routed.get_addr()).await.map_err(|e| {
                SqlMiddlewareDbError::ConnectionError(format!("TCP connection error: {e}"))
            })?;
            tcp.set_nodelay(true).map_err(|e| {
                SqlMiddlewareDbError::ConnectionError(format!("TCP setup error: {e}"))
            })?;
            Ok(Client::connect(routed, tcp.compat_write()).await?)
        }
        Err(e) => Err(e.into()),
    }
}
