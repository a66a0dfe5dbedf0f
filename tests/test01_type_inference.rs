use std::sync::Arc;

use chrono::NaiveDate;
use mssql_middleware::mssql::binding::{
    DECIMAL_SCALE, SQL_BIGINT_SAFE_MAX, SQL_BIGINT_SAFE_MIN, SQL_INT4_MAX, SQL_INT4_MIN,
    infer_binding,
};
use mssql_middleware::prelude::*;

fn sample_range(lo: i64, hi: i64) -> Vec<i64> {
    let step = ((hi - lo) / 97).max(1);
    let mut values: Vec<i64> = (0..=97).map(|i| lo.saturating_add(i * step)).filter(|v| *v <= hi).collect();
    values.extend([lo, lo + 1, hi - 1, hi]);
    values
}

#[test]
fn int4_range_infers_int() -> Result<(), SqlMiddlewareDbError> {
    for v in sample_range(SQL_INT4_MIN, SQL_INT4_MAX) {
        let binding = infer_binding(&RowValues::Int(v))?;
        assert_eq!(binding.wire_type, WireType::Int, "value {v}");
        assert_eq!(binding.value, RowValues::Int(v));
    }
    Ok(())
}

#[test]
fn beyond_int4_infers_bigint() -> Result<(), SqlMiddlewareDbError> {
    for v in sample_range(SQL_INT4_MAX + 1, SQL_BIGINT_SAFE_MAX) {
        assert_eq!(infer_binding(&RowValues::Int(v))?.wire_type, WireType::BigInt, "value {v}");
    }
    for v in sample_range(SQL_BIGINT_SAFE_MIN, SQL_INT4_MIN - 1) {
        assert_eq!(infer_binding(&RowValues::Int(v))?.wire_type, WireType::BigInt, "value {v}");
    }
    Ok(())
}

#[test]
fn unsafe_integers_are_rejected() {
    for v in [
        SQL_BIGINT_SAFE_MAX + 1,
        SQL_BIGINT_SAFE_MIN - 1,
        i64::MAX,
        i64::MIN,
    ] {
        let err = infer_binding(&RowValues::Int(v)).unwrap_err();
        assert!(matches!(err, SqlMiddlewareDbError::UnsafeInteger(_)), "value {v}");
        assert!(err.to_string().contains("must be passed as string"));
    }
}

#[test]
fn fractional_numbers_are_float_with_scale() -> Result<(), SqlMiddlewareDbError> {
    for v in [0.5, -0.5, 1.25, 3.141_592_653_589_793, -1e-9, 123_456.789] {
        let binding = infer_binding(&RowValues::Float(v))?;
        assert_eq!(binding.wire_type, WireType::Float, "value {v}");
        assert_eq!(binding.options.scale, Some(DECIMAL_SCALE));
        assert_eq!(binding.value, RowValues::Float(v));
    }
    Ok(())
}

#[test]
fn remaining_kinds() -> Result<(), SqlMiddlewareDbError> {
    let text = infer_binding(&RowValues::Text("hello".into()))?;
    assert_eq!(text.wire_type, WireType::NVarChar);

    let flag = infer_binding(&RowValues::Bool(false))?;
    assert_eq!(flag.wire_type, WireType::Bit);

    let when = NaiveDate::from_ymd_opt(2024, 2, 29)
        .and_then(|d| d.and_hms_opt(12, 30, 0))
        .expect("valid date");
    let stamp = infer_binding(&RowValues::Timestamp(when))?;
    assert_eq!(stamp.wire_type, WireType::DateTime);
    assert_eq!(stamp.value, RowValues::Timestamp(when));

    let blob = infer_binding(&RowValues::Blob(b"\x00\xff".to_vec()))?;
    assert_eq!(blob.wire_type, WireType::VarBinary);
    assert_eq!(blob.options.length, Some(ParamLength::Max));

    let null = infer_binding(&RowValues::Null)?;
    assert_eq!(null.wire_type, WireType::NVarChar);
    assert_eq!(null.value, RowValues::Null);

    let json = infer_binding(&RowValues::JSON(serde_json::json!("plain")))?;
    assert_eq!(json.value, RowValues::Text("plain".into()));
    Ok(())
}

#[test]
fn inference_is_deterministic() -> Result<(), SqlMiddlewareDbError> {
    let inferencer = TypeInferencer::default();
    for value in [
        RowValues::Int(7),
        RowValues::Float(2.5),
        RowValues::Text("x".into()),
    ] {
        assert_eq!(inferencer.infer(&value)?, inferencer.infer(&value)?);
    }
    Ok(())
}

#[test]
fn custom_mapping_is_consulted_first() -> Result<(), SqlMiddlewareDbError> {
    // Send oversized integers as text instead of failing.
    let map: MapBinding = Arc::new(|value: &RowValues| match value {
        RowValues::Int(i) if i.unsigned_abs() > SQL_BIGINT_SAFE_MAX.unsigned_abs() => Some(
            Binding::new(WireType::NVarChar, RowValues::Text(i.to_string())),
        ),
        _ => None,
    });
    let inferencer = TypeInferencer::with_map_binding(map);

    let big = inferencer.infer(&RowValues::Int(i64::MAX))?;
    assert_eq!(big.wire_type, WireType::NVarChar);

    let small = inferencer.infer(&RowValues::Int(5))?;
    assert_eq!(small.wire_type, WireType::Int);

    let custom = Binding::new(WireType::NVarChar, RowValues::Text("x".into())).with_options(
        BindingOptions {
            scale: None,
            length: Some(ParamLength::Fixed(10)),
        },
    );
    let fixed = TypeInferencer::with_map_binding(Arc::new(move |_: &RowValues| Some(custom.clone())));
    assert_eq!(
        fixed.infer(&RowValues::Bool(true))?.options.length,
        Some(ParamLength::Fixed(10))
    );
    Ok(())
}
