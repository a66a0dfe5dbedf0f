//! SQL Server adapter for a query-builder style middleware.
//!
//! Compiled statements come in as SQL text with positional `?` markers (or an `exec` call
//! with named `@` parameters) plus an ordered list of values. The adapter infers a wire type
//! for each value, rewrites the markers into named parameters, sends the request over a
//! pooled tiberius connection and shapes the recordsets according to the query method.
//!
//! ```rust,no_run
//! use mssql_middleware::prelude::*;
//!
//! # async fn demo() -> Result<(), SqlMiddlewareDbError> {
//! let pool = ConfigAndPool::mssql_builder("localhost".into(), "master".into())
//!     .credentials("sa".into(), "secret".into())
//!     .trust_server_certificate(true)
//!     .build()
//!     .await?;
//!
//! let query = CompiledQuery::new("select ? as answer", vec![RowValues::Int(42)])
//!     .with_method(QueryMethod::First);
//! let row = pool.run(&query).await?.into_row();
//! # let _ = row;
//! # Ok(())
//! # }
//! ```

pub mod prelude;

pub mod dispatch;
pub mod error;
pub mod mssql;
pub mod pool;
pub mod query;
pub mod query_builder;
pub mod results;
pub mod shaping;
pub mod test_utils;
pub mod translation;
pub mod types;

pub use dispatch::{DriverConnection, Request, Statement, execute_statement};
pub use error::SqlMiddlewareDbError;
pub use pool::{ConfigAndPool, MiddlewarePool, MiddlewarePoolConnection};
pub use query::CompiledQuery;
pub use results::{CustomDbRow, Response, ResultSet};
pub use shaping::{QueryOutput, shape_response};
pub use types::{QueryMethod, ResultMode, RowValues};
