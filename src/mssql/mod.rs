// MSSQL module - SQL Server side of the adapter
//
// - binding: value -> wire type inference
// - params: wire-typed values handed to tiberius, plus their declarations
// - config: options, defaults and the connection descriptor
// - client: raw client creation
// - query: result stream grouping into recordsets
// - executor: the pooled connection type and request execution

pub mod binding;
pub mod client;
pub mod config;
pub mod executor;
pub mod params;
pub mod query;

pub use binding::{
    Binding, BindingOptions, MapBinding, ParamLength, TypeInferencer, WireType, infer_binding,
};
pub use client::{MssqlClient, create_mssql_client};
pub use config::{
    AuthenticationType, ConnectionDescriptor, MssqlOptions, MssqlOptionsBuilder, PoolOptions,
};
pub use executor::MssqlConnection;
pub use params::SqlParam;
pub use query::{RecordsetCollector, StreamItem, build_response, group_recordsets};
