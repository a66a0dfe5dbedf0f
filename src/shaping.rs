use std::sync::Arc;

use serde::Serialize;

use crate::error::SqlMiddlewareDbError;
use crate::query::CompiledQuery;
use crate::results::{CustomDbRow, Response, ResultSet};
use crate::types::{QueryMethod, ResultMode, RowValues};

/// `returning` value that asks a write for its row count.
pub const ROWCOUNT_RETURNING: &str = "@@rowcount";

/// Caller-supplied reshaping that replaces every built-in rule.
pub type OutputTransform =
    Arc<dyn Fn(Response) -> Result<QueryOutput, SqlMiddlewareDbError> + Send + Sync>;

/// What a query hands back once its response has been shaped.
///
/// Serializes as plain data: a recordset is a list of row objects, a row is an object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutput {
    /// Every recordset of the batch.
    Recordsets(Vec<ResultSet>),
    /// A single recordset.
    Recordset(ResultSet),
    /// First row, if there was one.
    Row(Option<CustomDbRow>),
    /// One column plucked from each row.
    Values(Vec<RowValues>),
    /// A single scalar such as a row count.
    Value(Option<RowValues>),
    /// Anything an output transform chose to build.
    Json(serde_json::Value),
}

impl QueryOutput {
    /// The single recordset, or the first one of several.
    #[must_use]
    pub fn into_recordset(self) -> Option<ResultSet> {
        match self {
            QueryOutput::Recordset(rs) => Some(rs),
            QueryOutput::Recordsets(sets) => sets.into_iter().next(),
            _ => None,
        }
    }

    /// Every recordset; a single one is wrapped in a list.
    #[must_use]
    pub fn into_recordsets(self) -> Option<Vec<ResultSet>> {
        match self {
            QueryOutput::Recordsets(sets) => Some(sets),
            QueryOutput::Recordset(rs) => Some(vec![rs]),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_row(self) -> Option<CustomDbRow> {
        match self {
            QueryOutput::Row(row) => row,
            _ => None,
        }
    }

    #[must_use]
    pub fn into_values(self) -> Option<Vec<RowValues>> {
        match self {
            QueryOutput::Values(values) => Some(values),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_value(self) -> Option<RowValues> {
        match self {
            QueryOutput::Value(value) => value,
            _ => None,
        }
    }
}

/// Shape `response` for `query`; the first matching rule wins.
///
/// 1. the query's output transform;
/// 2. `select` gives the first recordset, `first` its first row;
/// 3. `pluck` gives one column of every row;
/// 4. writes give the first recordset, or the row count when `returning` is `@@rowcount`;
/// 5. anything else follows `mode`.
///
/// # Errors
///
/// Returns `SqlMiddlewareDbError::ParameterError` for `pluck` without a column, or whatever
/// the output transform returns.
pub fn shape_response(
    response: Response,
    query: &CompiledQuery,
    mode: ResultMode,
) -> Result<QueryOutput, SqlMiddlewareDbError> {
    if let Some(transform) = &query.output {
        return transform(response);
    }

    let shaped = match query.method {
        QueryMethod::Select => QueryOutput::Recordset(response.into_recordset()),
        QueryMethod::First => QueryOutput::Row(response.into_recordset().results.into_iter().next()),
        QueryMethod::Pluck => {
            let column = query.pluck.as_deref().ok_or_else(|| {
                SqlMiddlewareDbError::ParameterError("pluck needs a column name".to_string())
            })?;
            QueryOutput::Values(pluck(response, column, mode))
        }
        method if method.is_write() => {
            if query
                .returning
                .as_deref()
                .is_some_and(|r| r.eq_ignore_ascii_case(ROWCOUNT_RETURNING))
            {
                QueryOutput::Value(row_count(&response))
            } else {
                QueryOutput::Recordset(response.into_recordset())
            }
        }
        _ => shape_by_mode(response, mode),
    };

    Ok(shaped)
}

/// Shape an unclassified response according to the pool's result mode.
#[must_use]
pub fn shape_by_mode(response: Response, mode: ResultMode) -> QueryOutput {
    match mode {
        ResultMode::Multi => QueryOutput::Recordsets(response.recordsets),
        ResultMode::Mixed if response.recordsets.len() == 1 => {
            QueryOutput::Recordset(response.into_recordset())
        }
        ResultMode::Mixed => QueryOutput::Recordsets(response.recordsets),
        ResultMode::Default => QueryOutput::Recordset(response.into_recordset()),
    }
}

fn pluck(response: Response, column: &str, mode: ResultMode) -> Vec<RowValues> {
    let recordsets = match mode {
        ResultMode::Default => vec![response.into_recordset()],
        ResultMode::Multi | ResultMode::Mixed => response.recordsets,
    };

    recordsets
        .iter()
        .flat_map(|rs| rs.results.iter())
        .map(|row| row.get(column).cloned().unwrap_or(RowValues::Null))
        .collect()
}

// `SELECT @@ROWCOUNT` comes back as an unnamed column.
fn row_count(response: &Response) -> Option<RowValues> {
    response
        .recordsets
        .first()
        .and_then(ResultSet::first)
        .and_then(|row| row.get(""))
        .cloned()
}
