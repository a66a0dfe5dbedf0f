use deadpool::managed::{Object, Pool};

use super::manager::MssqlManager;

/// Connection pool for SQL Server
pub type MiddlewarePool = Pool<MssqlManager>;

/// A connection checked out of a [`MiddlewarePool`]
pub type PooledObject = Object<MssqlManager>;
