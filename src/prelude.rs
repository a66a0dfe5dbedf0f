//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::dispatch::{DriverConnection, Request, Statement, execute_statement};
pub use crate::error::SqlMiddlewareDbError;
pub use crate::mssql::{
    AuthenticationType, Binding, BindingOptions, ConnectionDescriptor, MapBinding, MssqlClient,
    MssqlOptions, MssqlOptionsBuilder, ParamLength, PoolOptions, TypeInferencer, WireType,
};
pub use crate::pool::{ConfigAndPool, MiddlewarePool, MiddlewarePoolConnection};
pub use crate::query::CompiledQuery;
pub use crate::query_builder::QueryBuilder;
pub use crate::results::{CustomDbRow, Response, ResultSet};
pub use crate::shaping::{OutputTransform, QueryOutput, shape_response};
pub use crate::translation::{position_bindings, rewrite_markers};
pub use crate::types::{QueryMethod, ResultMode, RowValues};
