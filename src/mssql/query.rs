use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use futures_util::TryStreamExt;
use tiberius::{ColumnData, FromSql, QueryItem, QueryStream};

use crate::error::SqlMiddlewareDbError;
use crate::results::{Response, ResultSet};
use crate::types::RowValues;

/// One item of a result stream, reduced to what recordset grouping needs.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    /// Column metadata; starts a new recordset, even one that gets no rows.
    Columns(Vec<String>),
    Row(Vec<RowValues>),
}

/// Groups stream items into recordsets in arrival order.
#[derive(Debug, Default)]
pub struct RecordsetCollector {
    recordsets: Vec<ResultSet>,
    current: Option<ResultSet>,
}

impl RecordsetCollector {
    /// Feed the next item.
    ///
    /// # Errors
    ///
    /// Returns `SqlMiddlewareDbError::ExecutionError` for a row that arrives before any
    /// column metadata.
    pub fn push(&mut self, item: StreamItem) -> Result<(), SqlMiddlewareDbError> {
        match item {
            StreamItem::Columns(names) => {
                if let Some(done) = self.current.take() {
                    self.recordsets.push(done);
                }
                let mut result_set = ResultSet::default();
                result_set.set_column_names(Arc::new(names));
                self.current = Some(result_set);
            }
            StreamItem::Row(values) => {
                let result_set = self.current.as_mut().ok_or_else(|| {
                    SqlMiddlewareDbError::ExecutionError(
                        "SQL Server sent a row before its column metadata".to_string(),
                    )
                })?;
                result_set.add_row_values(values);
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn finish(mut self) -> Response {
        if let Some(done) = self.current.take() {
            self.recordsets.push(done);
        }
        Response::new(self.recordsets)
    }
}

/// Group already-decoded stream items into a `Response`.
///
/// # Errors
///
/// See [`RecordsetCollector::push`].
pub fn group_recordsets(
    items: impl IntoIterator<Item = StreamItem>,
) -> Result<Response, SqlMiddlewareDbError> {
    let mut collector = RecordsetCollector::default();
    for item in items {
        collector.push(item)?;
    }
    Ok(collector.finish())
}

/// Drain every recordset of a query stream into a `Response`.
///
/// Recordsets without rows are kept, with their column names.
///
/// # Errors
///
/// Returns the driver error raised while reading any of the recordsets.
pub async fn build_response(mut stream: QueryStream<'_>) -> Result<Response, SqlMiddlewareDbError> {
    let mut collector = RecordsetCollector::default();
    while let Some(item) = stream.try_next().await? {
        collector.push(stream_item(item))?;
    }
    Ok(collector.finish())
}

fn stream_item(item: QueryItem) -> StreamItem {
    match item {
        QueryItem::Metadata(meta) => StreamItem::Columns(
            meta.columns()
                .iter()
                .map(|col| col.name().to_string())
                .collect(),
        ),
        QueryItem::Row(row) => StreamItem::Row(row.into_iter().map(extract_value).collect()),
    }
}

/// Map one cell to a `RowValues`, NULLs of any type included.
fn extract_value(data: ColumnData<'static>) -> RowValues {
    match data {
        ColumnData::U8(v) => v.map_or(RowValues::Null, |v| RowValues::Int(i64::from(v))),
        ColumnData::I16(v) => v.map_or(RowValues::Null, |v| RowValues::Int(i64::from(v))),
        ColumnData::I32(v) => v.map_or(RowValues::Null, |v| RowValues::Int(i64::from(v))),
        ColumnData::I64(v) => v.map_or(RowValues::Null, RowValues::Int),
        ColumnData::F32(v) => v.map_or(RowValues::Null, |v| RowValues::Float(f64::from(v))),
        ColumnData::F64(v) => v.map_or(RowValues::Null, RowValues::Float),
        ColumnData::Bit(v) => v.map_or(RowValues::Null, RowValues::Bool),
        ColumnData::String(v) => v.map_or(RowValues::Null, |s| RowValues::Text(s.into_owned())),
        ColumnData::Guid(v) => v.map_or(RowValues::Null, |g| RowValues::Text(g.to_string())),
        ColumnData::Binary(v) => v.map_or(RowValues::Null, |b| RowValues::Blob(b.into_owned())),
        ColumnData::Numeric(v) => v.map_or(RowValues::Null, |n| RowValues::Float(numeric_to_f64(n))),
        ColumnData::Xml(v) => v.map_or(RowValues::Null, |x| {
            RowValues::Text(x.into_owned().into_string())
        }),
        ColumnData::Date(_) => temporal::<NaiveDate>(&data)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map_or(RowValues::Null, RowValues::Timestamp),
        ColumnData::Time(_) => temporal::<NaiveTime>(&data)
            .map_or(RowValues::Null, |t| RowValues::Text(t.to_string())),
        ColumnData::DateTimeOffset(_) => temporal::<DateTime<FixedOffset>>(&data)
            .map_or(RowValues::Null, |dt| RowValues::Timestamp(dt.naive_utc())),
        _ => temporal::<NaiveDateTime>(&data).map_or(RowValues::Null, RowValues::Timestamp),
    }
}

#[allow(clippy::cast_precision_loss)]
fn numeric_to_f64(n: tiberius::numeric::Numeric) -> f64 {
    n.value() as f64 / 10f64.powi(i32::from(n.scale()))
}

fn temporal<T>(data: &ColumnData<'static>) -> Option<T>
where
    T: for<'a> FromSql<'a>,
{
    match T::from_sql(data) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "result::unreadable temporal value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> StreamItem {
        StreamItem::Columns(names.iter().map(|n| (*n).to_string()).collect())
    }

    #[test]
    fn empty_recordsets_are_kept_in_order() {
        // select 1 as a; select b from t where 1 = 0; select 2 as c
        let response = group_recordsets([
            columns(&["a"]),
            StreamItem::Row(vec![RowValues::Int(1)]),
            columns(&["b"]),
            columns(&["c"]),
            StreamItem::Row(vec![RowValues::Int(2)]),
        ])
        .unwrap();
        assert_eq!(response.recordsets.len(), 3);
        assert_eq!(response.recordsets[0].len(), 1);
        assert!(response.recordsets[1].is_empty());
        assert_eq!(
            response.recordsets[1].get_column_names().map(|c| c.as_slice()),
            Some(&["b".to_string()][..])
        );
        assert_eq!(response.recordsets[2].first().and_then(|r| r.get("c")), Some(&RowValues::Int(2)));
    }

    #[test]
    fn trailing_empty_recordset_is_kept() {
        let response = group_recordsets([
            columns(&[""]),
            StreamItem::Row(vec![RowValues::Int(1)]),
            columns(&["id"]),
        ])
        .unwrap();
        assert_eq!(response.recordsets.len(), 2);
        assert!(response.recordsets[1].is_empty());
    }

    #[test]
    fn no_metadata_means_no_recordsets() {
        assert!(group_recordsets([]).unwrap().recordsets.is_empty());
    }

    #[test]
    fn row_without_metadata_is_an_error() {
        let err = group_recordsets([StreamItem::Row(vec![RowValues::Null])]).unwrap_err();
        assert!(matches!(err, SqlMiddlewareDbError::ExecutionError(_)));
    }
}
