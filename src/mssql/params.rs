use std::borrow::Cow;
use std::fmt;

use chrono::NaiveDateTime;
use tiberius::{ColumnData, IntoSql};

use super::binding::{Binding, ParamLength, WireType};
use crate::error::SqlMiddlewareDbError;
use crate::types::RowValues;

/// Parameter wrapper handed to tiberius, already coerced to its wire type.
pub enum SqlParam<'a> {
    Int(Option<i32>),
    BigInt(Option<i64>),
    Float(Option<f64>),
    Text(Option<Cow<'a, str>>),
    Bool(Option<bool>),
    DateTime(Option<NaiveDateTime>),
    Binary(Option<Cow<'a, [u8]>>),
}

impl fmt::Debug for SqlParam<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlParam::Int(i) => write!(f, "SqlParam::Int({i:?})"),
            SqlParam::BigInt(i) => write!(f, "SqlParam::BigInt({i:?})"),
            SqlParam::Float(fl) => write!(f, "SqlParam::Float({fl:?})"),
            SqlParam::Text(s) => write!(f, "SqlParam::Text({s:?})"),
            SqlParam::Bool(b) => write!(f, "SqlParam::Bool({b:?})"),
            SqlParam::DateTime(dt) => write!(f, "SqlParam::DateTime({dt:?})"),
            SqlParam::Binary(_) => write!(f, "SqlParam::Binary(...)"),
        }
    }
}

impl<'a> IntoSql<'a> for SqlParam<'a> {
    fn into_sql(self) -> ColumnData<'a> {
        match self {
            SqlParam::Int(i) => ColumnData::I32(i),
            SqlParam::BigInt(i) => ColumnData::I64(i),
            SqlParam::Float(f) => ColumnData::F64(f),
            SqlParam::Text(s) => ColumnData::String(s),
            SqlParam::Bool(b) => ColumnData::Bit(b),
            SqlParam::DateTime(Some(dt)) => dt.into_sql(),
            SqlParam::DateTime(None) => Option::<NaiveDateTime>::None.into_sql(),
            SqlParam::Binary(b) => ColumnData::Binary(b),
        }
    }
}

impl<'a> TryFrom<&'a Binding> for SqlParam<'a> {
    type Error = SqlMiddlewareDbError;

    /// Encode the inferred value as its declared wire type.
    ///
    /// Only `RowValues::Null` becomes a typed NULL; any other value the wire type cannot
    /// carry (typically from a custom mapping) is an error.
    fn try_from(binding: &'a Binding) -> Result<Self, Self::Error> {
        let value = &binding.value;
        let wire_type = binding.wire_type;
        let mismatch = || {
            SqlMiddlewareDbError::ParameterError(format!(
                "{value:?} cannot be sent as {wire_type}"
            ))
        };

        let param = match (wire_type, value) {
            (WireType::NVarChar, value) => SqlParam::Text(text_of(value)),
            (WireType::Int, RowValues::Null) => SqlParam::Int(None),
            (WireType::Int, RowValues::Int(i)) => {
                SqlParam::Int(Some(i32::try_from(*i).map_err(|_| mismatch())?))
            }
            (WireType::BigInt, RowValues::Null) => SqlParam::BigInt(None),
            (WireType::BigInt, RowValues::Int(i)) => SqlParam::BigInt(Some(*i)),
            (WireType::Float, RowValues::Null) => SqlParam::Float(None),
            (WireType::Float, RowValues::Float(f)) => SqlParam::Float(Some(*f)),
            #[allow(clippy::cast_precision_loss)]
            (WireType::Float, RowValues::Int(i)) => SqlParam::Float(Some(*i as f64)),
            (WireType::Bit, RowValues::Null) => SqlParam::Bool(None),
            (WireType::Bit, RowValues::Bool(b)) => SqlParam::Bool(Some(*b)),
            (WireType::DateTime, RowValues::Null) => SqlParam::DateTime(None),
            (WireType::DateTime, RowValues::Timestamp(dt)) => SqlParam::DateTime(Some(*dt)),
            (WireType::VarBinary, RowValues::Null) => SqlParam::Binary(None),
            (WireType::VarBinary, RowValues::Blob(bytes)) => {
                SqlParam::Binary(Some(Cow::Borrowed(bytes.as_slice())))
            }
            _ => return Err(mismatch()),
        };
        Ok(param)
    }
}

fn text_of(value: &RowValues) -> Option<Cow<'_, str>> {
    match value {
        RowValues::Null => None,
        RowValues::Text(s) => Some(Cow::Borrowed(s.as_str())),
        RowValues::Int(i) => Some(Cow::Owned(i.to_string())),
        RowValues::Float(f) => Some(Cow::Owned(f.to_string())),
        RowValues::Bool(b) => Some(Cow::Borrowed(if *b { "1" } else { "0" })),
        RowValues::Timestamp(dt) => Some(Cow::Owned(
            dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
        )),
        RowValues::JSON(json) => Some(Cow::Owned(json.to_string())),
        RowValues::Blob(bytes) => Some(String::from_utf8_lossy(bytes)),
    }
}

/// T-SQL type used when declaring the parameter to `sp_executesql`.
#[must_use]
pub fn declaration(binding: &Binding) -> Cow<'static, str> {
    let length = |fallback: &'static str, name: &str| match binding.options.length {
        Some(ParamLength::Fixed(n)) => Cow::Owned(format!("{name}({n})")),
        Some(ParamLength::Max) | None => Cow::Borrowed(fallback),
    };

    match binding.wire_type {
        WireType::NVarChar => length("nvarchar(max)", "nvarchar"),
        WireType::VarBinary => length("varbinary(max)", "varbinary"),
        WireType::Bit => Cow::Borrowed("bit"),
        WireType::Int => Cow::Borrowed("int"),
        WireType::BigInt => Cow::Borrowed("bigint"),
        WireType::Float => Cow::Borrowed("float"),
        WireType::DateTime => Cow::Borrowed("datetime"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mssql::binding::{BindingOptions, infer_binding};

    #[test]
    fn declarations_follow_wire_type() {
        let blob = infer_binding(&RowValues::Blob(vec![1])).unwrap();
        assert_eq!(declaration(&blob), "varbinary(max)");
        let big = infer_binding(&RowValues::Int(5_000_000_000)).unwrap();
        assert_eq!(declaration(&big), "bigint");
        let text = Binding::new(WireType::NVarChar, RowValues::Text("x".into())).with_options(
            BindingOptions {
                scale: None,
                length: Some(ParamLength::Fixed(50)),
            },
        );
        assert_eq!(declaration(&text), "nvarchar(50)");
    }

    #[test]
    fn encodes_as_wire_type() {
        let int = infer_binding(&RowValues::Int(12)).unwrap();
        assert!(matches!(SqlParam::try_from(&int), Ok(SqlParam::Int(Some(12)))));
        let null = infer_binding(&RowValues::Null).unwrap();
        assert!(matches!(SqlParam::try_from(&null), Ok(SqlParam::Text(None))));
        let typed_null = Binding::new(WireType::DateTime, RowValues::Null);
        assert!(matches!(SqlParam::try_from(&typed_null), Ok(SqlParam::DateTime(None))));
        let mapped = Binding::new(WireType::NVarChar, RowValues::Int(9_007_199_254_740_993));
        assert!(
            matches!(SqlParam::try_from(&mapped), Ok(SqlParam::Text(Some(ref s))) if s == "9007199254740993")
        );
    }

    #[test]
    fn values_that_do_not_fit_are_rejected() {
        for binding in [
            Binding::new(WireType::Int, RowValues::Int(5_000_000_000)),
            Binding::new(WireType::Int, RowValues::Text("12".into())),
            Binding::new(WireType::Bit, RowValues::Int(1)),
            Binding::new(WireType::DateTime, RowValues::Text("2024-01-01".into())),
            Binding::new(WireType::VarBinary, RowValues::Text("raw".into())),
        ] {
            let err = SqlParam::try_from(&binding).unwrap_err();
            assert!(matches!(err, SqlMiddlewareDbError::ParameterError(_)), "{binding:?}");
        }
    }
}
