use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqlMiddlewareDbError {
    /// A value that needs a decimal scale turned out to be integral.
    #[error("Invalid binding: {0}")]
    InvalidBinding(String),

    /// Integral value outside the range SQL Server can take without loss; pass it as text.
    #[error("Bigint must be safe integer or must be passed as string, saw {0}")]
    UnsafeInteger(String),

    #[error("The query is empty")]
    EmptyStatement,

    /// Failure reported by tiberius, with the server's message and error number preserved.
    #[error("{message}")]
    Driver { message: String, code: Option<u32> },

    #[error("Query timeout expired after {} ms", .0.as_millis())]
    RequestTimeout(Duration),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Pool error: {0}")]
    PoolError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),
}

impl SqlMiddlewareDbError {
    /// Server error number, when the failure came from SQL Server itself.
    #[must_use]
    pub fn code(&self) -> Option<u32> {
        match self {
            Self::Driver { code, .. } => *code,
            _ => None,
        }
    }

    /// Whether the failure leaves the underlying connection in an unknown state.
    #[must_use]
    pub fn breaks_connection(&self) -> bool {
        matches!(self, Self::RequestTimeout(_) | Self::ConnectionError(_))
    }
}

impl From<tiberius::error::Error> for SqlMiddlewareDbError {
    fn from(err: tiberius::error::Error) -> Self {
        match err {
            tiberius::error::Error::Server(token) => SqlMiddlewareDbError::Driver {
                message: token.message().to_string(),
                code: Some(token.code()),
            },
            tiberius::error::Error::Io { message, .. } => {
                SqlMiddlewareDbError::ConnectionError(message)
            }
            other => SqlMiddlewareDbError::Driver {
                message: other.to_string(),
                code: None,
            },
        }
    }
}

impl From<deadpool::managed::PoolError<SqlMiddlewareDbError>> for SqlMiddlewareDbError {
    fn from(err: deadpool::managed::PoolError<SqlMiddlewareDbError>) -> Self {
        match err {
            deadpool::managed::PoolError::Backend(inner) => inner,
            other => SqlMiddlewareDbError::PoolError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_is_matchable() {
        let err = SqlMiddlewareDbError::RequestTimeout(Duration::from_millis(2000));
        assert!(err.to_string().contains("Query timeout expired"));
        assert!(err.breaks_connection());
    }

    #[test]
    fn driver_error_keeps_message_and_code() {
        let err = SqlMiddlewareDbError::Driver {
            message: "Invalid object name 'nope'.".to_string(),
            code: Some(208),
        };
        assert_eq!(err.to_string(), "Invalid object name 'nope'.");
        assert_eq!(err.code(), Some(208));
        assert!(!err.breaks_connection());
    }
}
