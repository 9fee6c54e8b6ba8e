//! Engine-neutral SQL values.
//!
//! Generated rows are held as [`SqlValue`]s and encoded per engine: as
//! binary parameters for PostgreSQL (via [`ToSql`]), as JSON for the CrateDB
//! HTTP endpoint, or as COPY text.

use std::error::Error as StdError;
use std::fmt;

use bytes::BytesMut;
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use tokio_postgres::Row;

/// A single SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i32),
    BigInt(i64),
    Decimal(Decimal),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

/// One row of values.
pub type ValueRow = Vec<SqlValue>;

impl SqlValue {
    /// Text value from anything string-like.
    pub fn text(s: impl Into<String>) -> Self {
        SqlValue::Text(s.into())
    }

    /// Money value rounded to two decimal places.
    pub fn money(amount: f64) -> Self {
        let d = Decimal::from_f64(amount)
            .unwrap_or_default()
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        SqlValue::Decimal(d)
    }

    /// Integer view of the value, if it has one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => Some(*v as i64),
            SqlValue::BigInt(v) => Some(*v),
            SqlValue::Decimal(d) if d.fract().is_zero() => d.to_i64(),
            SqlValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// String view of the value, if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Encode for the CrateDB HTTP endpoint.
    pub fn to_json(&self) -> Value {
        match self {
            SqlValue::Null => Value::Null,
            SqlValue::Bool(b) => Value::Bool(*b),
            SqlValue::Int(v) => Value::from(*v),
            SqlValue::BigInt(v) => Value::from(*v),
            SqlValue::Decimal(d) => d.to_f64().map(Value::from).unwrap_or(Value::Null),
            SqlValue::Float(f) => Value::from(*f),
            SqlValue::Text(s) => Value::String(s.clone()),
            SqlValue::Timestamp(ts) => Value::from(ts.and_utc().timestamp_millis()),
        }
    }

    /// Decode a value from a CrateDB result row.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::BigInt(i),
                None => SqlValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => SqlValue::Text(s.clone()),
            other => SqlValue::Text(other.to_string()),
        }
    }

    /// Best-effort decode of column `idx` of a PostgreSQL row.
    pub fn from_pg_row(row: &Row, idx: usize) -> Self {
        let ty = row.columns()[idx].type_();

        let decoded = match *ty {
            Type::BOOL => row.try_get::<_, Option<bool>>(idx).map(|v| v.map(SqlValue::Bool)),
            Type::INT2 => row
                .try_get::<_, Option<i16>>(idx)
                .map(|v| v.map(|n| SqlValue::Int(n as i32))),
            Type::INT4 => row.try_get::<_, Option<i32>>(idx).map(|v| v.map(SqlValue::Int)),
            Type::INT8 => row.try_get::<_, Option<i64>>(idx).map(|v| v.map(SqlValue::BigInt)),
            Type::NUMERIC => row
                .try_get::<_, Option<Decimal>>(idx)
                .map(|v| v.map(SqlValue::Decimal)),
            Type::FLOAT4 => row
                .try_get::<_, Option<f32>>(idx)
                .map(|v| v.map(|f| SqlValue::Float(f as f64))),
            Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx).map(|v| v.map(SqlValue::Float)),
            Type::TIMESTAMP => row
                .try_get::<_, Option<NaiveDateTime>>(idx)
                .map(|v| v.map(SqlValue::Timestamp)),
            Type::TIMESTAMPTZ => row
                .try_get::<_, Option<DateTime<Utc>>>(idx)
                .map(|v| v.map(|d| SqlValue::Timestamp(d.naive_utc()))),
            _ => row.try_get::<_, Option<String>>(idx).map(|v| v.map(SqlValue::Text)),
        };

        match decoded {
            Ok(Some(v)) => v,
            Ok(None) => SqlValue::Null,
            Err(_) => SqlValue::Text(format!("<{}>", ty.name())),
        }
    }

    /// Render in COPY text format.
    pub fn to_copy_text(&self) -> String {
        match self {
            SqlValue::Null => "\\N".to_string(),
            SqlValue::Bool(b) => if *b { "t" } else { "f" }.to_string(),
            SqlValue::Int(n) => n.to_string(),
            SqlValue::BigInt(n) => n.to_string(),
            SqlValue::Decimal(d) => d.to_string(),
            SqlValue::Float(f) => f.to_string(),
            SqlValue::Text(s) => escape_copy_text(s),
            SqlValue::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
        }
    }
}

/// Escape special characters for COPY text format.
fn escape_copy_text(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '\t' => result.push_str("\\t"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            _ => result.push(c),
        }
    }
    result
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Bool(b) => write!(f, "{}", b),
            SqlValue::Int(n) => write!(f, "{}", n),
            SqlValue::BigInt(n) => write!(f, "{}", n),
            SqlValue::Decimal(d) => write!(f, "{}", d),
            SqlValue::Float(v) => write!(f, "{}", v),
            SqlValue::Text(s) => write!(f, "{}", s),
            SqlValue::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn StdError + Sync + Send>> {
        match self {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Bool(b) => b.to_sql(ty, out),
            SqlValue::Int(n) => match *ty {
                Type::INT8 => (*n as i64).to_sql(ty, out),
                Type::INT2 => i16::try_from(*n)?.to_sql(ty, out),
                Type::NUMERIC => Decimal::from(*n).to_sql(ty, out),
                _ => n.to_sql(ty, out),
            },
            SqlValue::BigInt(n) => match *ty {
                Type::INT4 => i32::try_from(*n)?.to_sql(ty, out),
                Type::NUMERIC => Decimal::from(*n).to_sql(ty, out),
                _ => n.to_sql(ty, out),
            },
            SqlValue::Decimal(d) => match *ty {
                Type::FLOAT8 => d.to_f64().unwrap_or_default().to_sql(ty, out),
                _ => d.to_sql(ty, out),
            },
            SqlValue::Float(v) => match *ty {
                Type::NUMERIC => Decimal::from_f64(*v)
                    .ok_or("float is not representable as numeric")?
                    .to_sql(ty, out),
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            SqlValue::Text(s) => s.as_str().to_sql(ty, out),
            SqlValue::Timestamp(ts) => match *ty {
                Type::TIMESTAMPTZ => ts.and_utc().to_sql(ty, out),
                _ => ts.to_sql(ty, out),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_money_rounds_to_cents() {
        assert_eq!(SqlValue::money(12.346).to_string(), "12.35");
        assert_eq!(SqlValue::money(9.99).to_string(), "9.99");
    }

    #[test]
    fn test_to_json() {
        assert_eq!(SqlValue::Int(7).to_json(), json!(7));
        assert_eq!(SqlValue::text("abc").to_json(), json!("abc"));
        assert_eq!(SqlValue::Null.to_json(), Value::Null);
        assert_eq!(SqlValue::money(19.5).to_json(), json!(19.5));
        assert_eq!(SqlValue::Timestamp(ts()).to_json(), json!(1_709_296_200_000i64));
    }

    #[test]
    fn test_from_json() {
        assert_eq!(SqlValue::from_json(&json!(42)), SqlValue::BigInt(42));
        assert_eq!(SqlValue::from_json(&json!(1.5)), SqlValue::Float(1.5));
        assert_eq!(SqlValue::from_json(&json!("x")), SqlValue::text("x"));
        assert_eq!(SqlValue::from_json(&json!(null)), SqlValue::Null);
        assert_eq!(
            SqlValue::from_json(&json!(["a", 1])),
            SqlValue::text("[\"a\",1]")
        );
    }

    #[test]
    fn test_as_i64() {
        assert_eq!(SqlValue::Int(3).as_i64(), Some(3));
        assert_eq!(SqlValue::Float(4.0).as_i64(), Some(4));
        assert_eq!(SqlValue::Float(4.5).as_i64(), None);
        assert_eq!(SqlValue::text(" 12 ").as_i64(), Some(12));
        assert_eq!(SqlValue::Null.as_i64(), None);
    }

    #[test]
    fn test_copy_text_escaping() {
        assert_eq!(SqlValue::Null.to_copy_text(), "\\N");
        assert_eq!(
            SqlValue::text("a\tb\nc\\d").to_copy_text(),
            "a\\tb\\nc\\\\d"
        );
        assert_eq!(
            SqlValue::Timestamp(ts()).to_copy_text(),
            "2024-03-01 12:30:00.000000"
        );
    }

    #[test]
    fn test_to_sql_widens_int_for_bigint_column() {
        let mut buf = BytesMut::new();
        let is_null = SqlValue::Int(5).to_sql(&Type::INT8, &mut buf).unwrap();
        assert!(matches!(is_null, IsNull::No));
        assert_eq!(buf.len(), 8);
    }

    #[test]
    fn test_to_sql_null() {
        let mut buf = BytesMut::new();
        let is_null = SqlValue::Null.to_sql(&Type::INT4, &mut buf).unwrap();
        assert!(matches!(is_null, IsNull::Yes));
        assert!(buf.is_empty());
    }
}
