use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::error::SqlMiddlewareDbError;
use crate::types::RowValues;

/// Signed 32-bit range that fits SQL Server's `int`.
pub const SQL_INT4_MIN: i64 = -2_147_483_648;
pub const SQL_INT4_MAX: i64 = 2_147_483_647;
/// Largest magnitude an integer may have before it must be passed as text.
pub const SQL_BIGINT_SAFE_MAX: i64 = 9_007_199_254_740_991;
pub const SQL_BIGINT_SAFE_MIN: i64 = -SQL_BIGINT_SAFE_MAX;
/// Scale attached to every non-integral number.
pub const DECIMAL_SCALE: u8 = 10;

/// SQL Server type a parameter is sent as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    NVarChar,
    Bit,
    Int,
    BigInt,
    Float,
    DateTime,
    VarBinary,
}

impl WireType {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            WireType::NVarChar => "NVarChar",
            WireType::Bit => "Bit",
            WireType::Int => "Int",
            WireType::BigInt => "BigInt",
            WireType::Float => "Float",
            WireType::DateTime => "DateTime",
            WireType::VarBinary => "VarBinary",
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declared length of a variable-length parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamLength {
    Max,
    Fixed(u16),
}

/// Encoding hints that travel with a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BindingOptions {
    pub scale: Option<u8>,
    pub length: Option<ParamLength>,
}

/// Wire type, encoded value and hints inferred for one bound value.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub wire_type: WireType,
    pub value: RowValues,
    pub options: BindingOptions,
}

impl Binding {
    #[must_use]
    pub fn new(wire_type: WireType, value: RowValues) -> Self {
        Self {
            wire_type,
            value,
            options: BindingOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: BindingOptions) -> Self {
        self.options = options;
        self
    }
}

/// Custom mapping consulted before the built-in rules; `None` means "no override".
///
/// ```rust
/// use std::sync::Arc;
/// use mssql_middleware::prelude::*;
///
/// let map: MapBinding = Arc::new(|value: &RowValues| match value {
///     RowValues::JSON(json) => Some(Binding::new(WireType::NVarChar, RowValues::Text(json.to_string()))),
///     _ => None,
/// });
/// let inferencer = TypeInferencer::with_map_binding(map);
/// # let _ = inferencer;
/// ```
pub type MapBinding = Arc<dyn Fn(&RowValues) -> Option<Binding> + Send + Sync>;

/// The closed set of value shapes the inference rules distinguish.
#[derive(Debug, Clone, PartialEq)]
enum ValueKind<'a> {
    Text(&'a str),
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    UnsafeInteger(String),
    Decimal(f64),
    DateTime(NaiveDateTime),
    Binary(&'a [u8]),
    Fallback,
}

impl<'a> ValueKind<'a> {
    fn of(value: &'a RowValues) -> Self {
        match value {
            RowValues::Text(s) => ValueKind::Text(s),
            RowValues::Bool(b) => ValueKind::Boolean(*b),
            RowValues::Int(i) => integer_kind(*i),
            RowValues::Float(f) => float_kind(*f),
            RowValues::Timestamp(dt) => ValueKind::DateTime(*dt),
            RowValues::Blob(bytes) => ValueKind::Binary(bytes),
            RowValues::Null | RowValues::JSON(_) => ValueKind::Fallback,
        }
    }
}

fn integer_kind(i: i64) -> ValueKind<'static> {
    if let Ok(small) = i32::try_from(i) {
        ValueKind::Int32(small)
    } else if (SQL_BIGINT_SAFE_MIN..=SQL_BIGINT_SAFE_MAX).contains(&i) {
        ValueKind::Int64(i)
    } else {
        ValueKind::UnsafeInteger(i.to_string())
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn float_kind(f: f64) -> ValueKind<'static> {
    // Whole floats travel as integers; NaN and infinities have no integral part.
    if !f.is_finite() || f.fract() != 0.0 {
        return ValueKind::Decimal(f);
    }
    if f.abs() > SQL_BIGINT_SAFE_MAX as f64 {
        return ValueKind::UnsafeInteger(format!("{f}"));
    }
    integer_kind(f as i64)
}

/// Scale hint for a non-integral number.
///
/// # Errors
///
/// Returns `SqlMiddlewareDbError::InvalidBinding` if `value` is integral.
pub fn scale_for_binding(value: f64) -> Result<BindingOptions, SqlMiddlewareDbError> {
    if value.fract() == 0.0 {
        return Err(SqlMiddlewareDbError::InvalidBinding(format!(
            "The binding value {value} must be a decimal number."
        )));
    }

    Ok(BindingOptions {
        scale: Some(DECIMAL_SCALE),
        length: None,
    })
}

/// Decides how each bound value goes over the wire.
#[derive(Clone, Default)]
pub struct TypeInferencer {
    map_binding: Option<MapBinding>,
}

impl fmt::Debug for TypeInferencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInferencer")
            .field("map_binding", &self.map_binding.is_some())
            .finish()
    }
}

impl TypeInferencer {
    #[must_use]
    pub fn new(map_binding: Option<MapBinding>) -> Self {
        Self { map_binding }
    }

    #[must_use]
    pub fn with_map_binding(map_binding: MapBinding) -> Self {
        Self::new(Some(map_binding))
    }

    /// Infer the binding for one value.
    ///
    /// # Errors
    ///
    /// Returns `SqlMiddlewareDbError::UnsafeInteger` for integers beyond ±9007199254740991,
    /// or `SqlMiddlewareDbError::InvalidBinding` if scale inference is asked of an integer.
    pub fn infer(&self, value: &RowValues) -> Result<Binding, SqlMiddlewareDbError> {
        if let Some(map) = &self.map_binding
            && let Some(binding) = map(value)
        {
            return Ok(binding);
        }

        infer_binding(value)
    }
}

/// Built-in inference rules, without any custom mapping.
///
/// # Errors
///
/// See [`TypeInferencer::infer`].
pub fn infer_binding(value: &RowValues) -> Result<Binding, SqlMiddlewareDbError> {
    let binding = match ValueKind::of(value) {
        ValueKind::Text(s) => Binding::new(WireType::NVarChar, RowValues::Text(s.to_string())),
        ValueKind::Boolean(b) => Binding::new(WireType::Bit, RowValues::Bool(b)),
        ValueKind::Int32(i) => Binding::new(WireType::Int, RowValues::Int(i64::from(i))),
        ValueKind::Int64(i) => Binding::new(WireType::BigInt, RowValues::Int(i)),
        ValueKind::UnsafeInteger(repr) => {
            return Err(SqlMiddlewareDbError::UnsafeInteger(repr));
        }
        ValueKind::Decimal(f) => {
            Binding::new(WireType::Float, RowValues::Float(f)).with_options(scale_for_binding(f)?)
        }
        ValueKind::DateTime(dt) => Binding::new(WireType::DateTime, RowValues::Timestamp(dt)),
        ValueKind::Binary(bytes) => Binding::new(WireType::VarBinary, RowValues::Blob(bytes.to_vec()))
            .with_options(BindingOptions {
                scale: None,
                length: Some(ParamLength::Max),
            }),
        ValueKind::Fallback => Binding::new(WireType::NVarChar, fallback_text(value)),
    };

    Ok(binding)
}

fn fallback_text(value: &RowValues) -> RowValues {
    match value {
        RowValues::JSON(serde_json::Value::String(s)) => RowValues::Text(s.clone()),
        RowValues::JSON(serde_json::Value::Null) | RowValues::Null => RowValues::Null,
        RowValues::JSON(json) => RowValues::Text(json.to_string()),
        other => other.clone(),
    }
}
