use crate::error::{Result, SfError};
use crate::types::ColumnType;
use rusqlite::ToSql;
use rusqlite::types::{ToSqlOutput, ValueRef};
use std::cmp::Ordering;
use std::fmt;

/// Owned dynamic value of one attribute cell.
///
/// It mirrors SQLite's dynamic typing (null, integer, real, text, blob) with
/// an additional boolean, because delimited text and GeoJSON both carry
/// booleans natively.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view used by aggregations. Text is never parsed here.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Real(v) => Some(*v),
            Value::Boolean(v) => Some(if *v { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Total order used by `arrange`.
    ///
    /// Numbers compare numerically across integer and real, then come
    /// booleans, text and blobs. Nulls sort last.
    pub fn compare(&self, other: &Value) -> Ordering {
        fn rank(value: &Value) -> u8 {
            match value {
                Value::Integer(_) | Value::Real(_) => 0,
                Value::Boolean(_) => 1,
                Value::Text(_) => 2,
                Value::Blob(_) => 3,
                Value::Null => 4,
            }
        }

        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Blob(a), Value::Blob(b)) => a.cmp(b),
            (Value::Real(a), Value::Real(b)) => a.total_cmp(b),
            (Value::Integer(a), Value::Real(b)) => compare_integer_real(*a, *b),
            (Value::Real(a), Value::Integer(b)) => compare_integer_real(*b, *a).reverse(),
            _ => rank(self).cmp(&rank(other)),
        }
    }

    /// Hashable form used as a join or grouping key. `Null` never matches.
    pub fn key(&self) -> Option<ValueKey> {
        match self {
            Value::Null => None,
            Value::Boolean(v) => Some(ValueKey::Boolean(*v)),
            Value::Integer(v) => Some(ValueKey::Integer(*v)),
            Value::Real(v) => {
                let v = if *v == 0.0 { 0.0 } else { *v };
                Some(ValueKey::Real(v.to_bits()))
            }
            Value::Text(v) => Some(ValueKey::Text(v.clone())),
            Value::Blob(v) => Some(ValueKey::Blob(v.clone())),
        }
    }

    /// Parse a text cell as the given column type.
    pub fn parse_as(text: &str, column_type: ColumnType) -> Result<Value> {
        let trimmed = text.trim();
        let mismatch = || SfError::ValueTypeMismatch {
            expected: column_type.name(),
            actual: "text",
        };
        match column_type {
            ColumnType::Boolean => parse_bool(trimmed).map(Value::Boolean).ok_or_else(mismatch),
            ColumnType::Integer => trimmed
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| mismatch()),
            ColumnType::Double => trimmed
                .parse::<f64>()
                .map(Value::Real)
                .map_err(|_| mismatch()),
            ColumnType::Varchar | ColumnType::Geometry => Ok(Value::Text(text.to_string())),
            ColumnType::Blob => Ok(Value::Blob(text.as_bytes().to_vec())),
        }
    }

    /// Pick the narrowest column type that parses every non-null text cell.
    pub fn infer_text_type<'a, I>(cells: I) -> ColumnType
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut all_bool = true;
        let mut all_int = true;
        let mut all_double = true;
        let mut seen = false;
        for cell in cells {
            let cell = cell.trim();
            seen = true;
            all_bool &= parse_bool(cell).is_some();
            all_int &= cell.parse::<i64>().is_ok();
            all_double &= cell.parse::<f64>().is_ok();
            if !(all_bool || all_int || all_double) {
                return ColumnType::Varchar;
            }
        }
        if !seen {
            ColumnType::Varchar
        } else if all_bool {
            ColumnType::Boolean
        } else if all_int {
            ColumnType::Integer
        } else if all_double {
            ColumnType::Double
        } else {
            ColumnType::Varchar
        }
    }

    /// Convert a raw SQLite value using the declared column type.
    pub(crate) fn from_sql_ref(value: ValueRef<'_>, column_type: ColumnType) -> Value {
        match (value, column_type) {
            (ValueRef::Integer(v), ColumnType::Boolean) => Value::Boolean(v != 0),
            (ValueRef::Integer(v), ColumnType::Double) => Value::Real(v as f64),
            (value, _) => Value::from(value),
        }
    }
}

/// Exact comparison; casting a large integer to `f64` would round it.
fn compare_integer_real(integer: i64, real: f64) -> Ordering {
    // 2^63, the first real above every i64
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if real.is_nan() {
        return (integer as f64).total_cmp(&real);
    }
    if real >= LIMIT {
        return Ordering::Less;
    }
    if real < -LIMIT {
        return Ordering::Greater;
    }
    let whole = real.trunc();
    integer.cmp(&(whole as i64)).then_with(|| 0.0_f64.total_cmp(&(real - whole)))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "true" | "TRUE" | "True" => Some(true),
        "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Hashable, comparable key derived from a non-null `Value`.
///
/// `Integer(1)` and `Real(1.0)` are different keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKey {
    Boolean(bool),
    Integer(i64),
    Real(u64),
    Text(String),
    Blob(Vec<u8>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
            Value::Blob(v) => {
                for byte in v {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Blob(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(v) => Value::Integer(v),
            ValueRef::Real(v) => Value::Real(v),
            ValueRef::Text(v) => Value::Text(String::from_utf8_lossy(v).into_owned()),
            ValueRef::Blob(v) => Value::Blob(v.to_vec()),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as SqlValue;

        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Boolean(v) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*v))),
            Value::Integer(v) => ToSqlOutput::Owned(SqlValue::Integer(*v)),
            Value::Real(v) => ToSqlOutput::Owned(SqlValue::Real(*v)),
            Value::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            Value::Blob(v) => ToSqlOutput::Borrowed(ValueRef::Blob(v)),
        })
    }
}

impl TryFrom<&Value> for bool {
    type Error = SfError;

    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::Boolean(v) => Ok(*v),
            Value::Integer(0) => Ok(false),
            Value::Integer(1) => Ok(true),
            Value::Integer(_) => Err(SfError::ValueOutOfRange { target: "bool" }),
            other => Err(SfError::ValueTypeMismatch {
                expected: "boolean",
                actual: other.type_name(),
            }),
        }
    }
}

impl TryFrom<&Value> for i64 {
    type Error = SfError;

    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::Integer(v) => Ok(*v),
            Value::Boolean(v) => Ok(i64::from(*v)),
            other => Err(SfError::ValueTypeMismatch {
                expected: "integer",
                actual: other.type_name(),
            }),
        }
    }
}

impl TryFrom<&Value> for f64 {
    type Error = SfError;

    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::Real(v) => Ok(*v),
            Value::Integer(v) => Ok(*v as f64),
            other => Err(SfError::ValueTypeMismatch {
                expected: "real",
                actual: other.type_name(),
            }),
        }
    }
}

impl TryFrom<&Value> for String {
    type Error = SfError;

    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::Text(v) => Ok(v.clone()),
            other => Err(SfError::ValueTypeMismatch {
                expected: "text",
                actual: other.type_name(),
            }),
        }
    }
}

macro_rules! impl_try_from_owned {
    ($($target:ty),*) => {
        $(
            impl TryFrom<Value> for $target {
                type Error = SfError;

                fn try_from(value: Value) -> Result<Self> {
                    <$target>::try_from(&value)
                }
            }

            impl TryFrom<Value> for Option<$target> {
                type Error = SfError;

                fn try_from(value: Value) -> Result<Self> {
                    match value {
                        Value::Null => Ok(None),
                        other => <$target>::try_from(&other).map(Some),
                    }
                }
            }
        )*
    };
}

impl_try_from_owned!(bool, i64, f64, String);

/// Build a `Vec<Value>` from heterogeneous expressions.
///
/// ```
/// use tidysf::{Value, values};
///
/// let row = values!["alpha", 7_i64, Some(1.5_f64), Option::<i64>::None];
/// assert_eq!(row[3], Value::Null);
/// ```
#[macro_export]
macro_rules! values {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::Value::from($value)),+]
    };
}
