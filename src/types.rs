use chrono::{NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A decoded cell, or a positional parameter.
///
/// The same enum is used in both directions so callers can feed values read from one statement
/// straight into another:
/// ```rust
/// use ingres_client::prelude::*;
///
/// let params = vec![Value::Int32(1), Value::from("alice"), Value::Float64(0.5)];
/// # let _ = params;
/// ```
///
/// Decimal, money, date, time and interval columns decode to [`Value::Text`] holding the
/// engine's display rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL marker
    Null,
    Text(String),
    Bytes(Vec<u8>),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Bool(bool),
}

impl Value {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Integer of any width, widened to 64 bits.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int8(v) => Some(i64::from(*v)),
            Value::Int16(v) => Some(i64::from(*v)),
            Value::Int32(v) => Some(i64::from(*v)),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let Value::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        if let Value::Bool(value) = self {
            return Some(*value);
        } else if let Some(i) = self.as_int() {
            if i == 1 {
                return Some(true);
            } else if i == 0 {
                return Some(false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float32(v) => Some(f64::from(*v)),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let Value::Bytes(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// Parse a date/timestamp display string.
    ///
    /// Accepts ISO renderings (`2007-12-15 12:30:55`, with optional fraction) and the engine's
    /// `ingresdate` rendering (`10-oct-2021`, with optional time). Dates without a time part map
    /// to midnight.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        let s = self.as_text()?.trim();
        for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%d-%b-%Y %H:%M:%S"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
                return Some(dt);
            }
        }
        for format in ["%Y-%m-%d", "%d-%b-%Y"] {
            if let Ok(date) = NaiveDate::parse_from_str(s, format) {
                return date.and_hms_opt(0, 0, 0);
            }
        }
        None
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

value_from!(
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
);

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<Value> for JsonValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => JsonValue::Null,
            Value::Text(s) => JsonValue::String(s),
            Value::Bytes(bytes) => {
                JsonValue::Array(bytes.into_iter().map(JsonValue::from).collect())
            }
            Value::Int8(v) => JsonValue::from(v),
            Value::Int16(v) => JsonValue::from(v),
            Value::Int32(v) => JsonValue::from(v),
            Value::Int64(v) => JsonValue::from(v),
            Value::Float32(v) => JsonValue::from(f64::from(v)),
            Value::Float64(v) => JsonValue::from(v),
            Value::Bool(b) => JsonValue::Bool(b),
        }
    }
}

/// How a statement is submitted to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize)]
pub enum QueryKind {
    /// Row-returning query read through a cursor
    #[default]
    Query,
    /// Query returning at most one row
    SelectSingleton,
    /// Statement without a result set
    Exec,
    /// Explicit `open cursor`
    Open,
    /// Database procedure execution
    ExecProcedure,
}

impl QueryKind {
    #[must_use]
    pub fn as_raw(self) -> u32 {
        match self {
            QueryKind::Query => 0,
            QueryKind::SelectSingleton => 1,
            QueryKind::Exec => 2,
            QueryKind::Open => 3,
            QueryKind::ExecProcedure => 8,
        }
    }

    /// Whether the engine reports column descriptors for this kind.
    #[must_use]
    pub fn has_result_set(self) -> bool {
        !matches!(self, QueryKind::Exec)
    }
}

/// Application-side type a column scans into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanType {
    Text,
    Bytes,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Bool,
    Timestamp,
    Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_accessor_widens() {
        assert_eq!(Value::Int8(-3).as_int(), Some(-3));
        assert_eq!(Value::Int16(300).as_int(), Some(300));
        assert_eq!(Value::Int64(i64::MAX).as_int(), Some(i64::MAX));
        assert_eq!(Value::Text("1".into()).as_int(), None);
    }

    #[test]
    fn bool_accepts_zero_and_one() {
        assert_eq!(Value::Int32(1).as_bool(), Some(true));
        assert_eq!(Value::Int8(0).as_bool(), Some(false));
        assert_eq!(Value::Int8(2).as_bool(), None);
    }

    #[test]
    fn timestamps_from_display_strings() {
        let iso = Value::from("2007-12-15 12:30:55");
        assert_eq!(
            iso.as_timestamp().map(|t| t.to_string()),
            Some("2007-12-15 12:30:55".to_string())
        );

        let ingres = Value::from("10-oct-2021");
        assert_eq!(
            ingres.as_timestamp().map(|t| t.to_string()),
            Some("2021-10-10 00:00:00".to_string())
        );

        assert!(Value::from("55-04").as_timestamp().is_none());
    }

    #[test]
    fn option_maps_to_null() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(7i16)), Value::Int16(7));
    }

    #[test]
    fn json_rendering() {
        assert_eq!(JsonValue::from(Value::Int16(5)), serde_json::json!(5));
        assert_eq!(JsonValue::from(Value::Null), JsonValue::Null);
        assert_eq!(JsonValue::from(Value::from("x")), serde_json::json!("x"));
    }
}
