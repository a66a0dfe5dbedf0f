use std::fmt;

use crate::shaping::OutputTransform;
use crate::types::{QueryMethod, RowValues};

/// What the query compiler hands over for one statement.
///
/// Keeps SQL text and bindings together so placeholder numbering stays aligned with the
/// binding order:
/// ```rust
/// use mssql_middleware::prelude::*;
///
/// let query = CompiledQuery::new(
///     "insert into t (id, name) values (?, ?); select @@rowcount",
///     vec![RowValues::Int(1), RowValues::Text("alice".into())],
/// )
/// .with_method(QueryMethod::Insert)
/// .with_returning("@@rowcount");
/// # let _ = query;
/// ```
#[derive(Clone, Default)]
pub struct CompiledQuery {
    /// SQL text with `?` markers, or an `exec` call with `@name` markers.
    pub sql: String,
    /// Values in marker order.
    pub bindings: Vec<RowValues>,
    pub method: QueryMethod,
    /// Column taken from every row when `method` is `Pluck`.
    pub pluck: Option<String>,
    pub returning: Option<String>,
    pub output: Option<OutputTransform>,
}

impl fmt::Debug for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledQuery")
            .field("sql", &self.sql)
            .field("bindings", &self.bindings)
            .field("method", &self.method)
            .field("pluck", &self.pluck)
            .field("returning", &self.returning)
            .field("output", &self.output.is_some())
            .finish()
    }
}

impl CompiledQuery {
    #[must_use]
    pub fn new(sql: impl Into<String>, bindings: Vec<RowValues>) -> Self {
        Self {
            sql: sql.into(),
            bindings,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_method(mut self, method: QueryMethod) -> Self {
        self.method = method;
        self
    }

    /// Pluck `column` from every row; also sets the method to `Pluck`.
    #[must_use]
    pub fn with_pluck(mut self, column: impl Into<String>) -> Self {
        self.method = QueryMethod::Pluck;
        self.pluck = Some(column.into());
        self
    }

    #[must_use]
    pub fn with_returning(mut self, returning: impl Into<String>) -> Self {
        self.returning = Some(returning.into());
        self
    }

    #[must_use]
    pub fn with_output(mut self, output: OutputTransform) -> Self {
        self.output = Some(output);
        self
    }
}
