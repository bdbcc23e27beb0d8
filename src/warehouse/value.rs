use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;

/// A single cell as fetched from, or bound to, the warehouse.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Exact decimal kept in its textual form.
    Number(String),
    Text(String),
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
    Bytes(Vec<u8>),
}

/// Positionally aligned cells of one result or upload row.
pub type Row = Vec<Value>;

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Text form of the value, or `None` when it has none (non UTF-8 bytes).
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => Some(String::new()),
            Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(float_text(*f)),
            Value::Number(n) => Some(n.clone()),
            Value::Text(s) => Some(s.clone()),
            Value::Timestamp(ts) => Some(ts.to_string()),
            Value::Date(d) => Some(d.to_string()),
            Value::Bytes(b) => String::from_utf8(b.clone()).ok(),
        }
    }

    /// Native date/time, when the value carries one.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            Value::Date(d) => d.and_hms_opt(0, 0, 0),
            _ => None,
        }
    }
}

/// Integral floats keep a trailing `.0` so text columns can tell `1.0` from `1`.
fn float_text(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            other => f.write_str(&other.to_text().unwrap_or_default()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(ts: NaiveDateTime) -> Self {
        Value::Timestamp(ts)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Render a row for log output.
pub fn display_row(row: &[Value]) -> String {
    let cells: Vec<String> = row.iter().map(|v| format!("{:?}", v.to_string())).collect();
    format!("({})", cells.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_text_keeps_fraction_marker() {
        assert_eq!(Value::Float(1.0).to_text().as_deref(), Some("1.0"));
        assert_eq!(Value::Float(-20.0).to_text().as_deref(), Some("-20.0"));
        assert_eq!(Value::Float(2.5).to_text().as_deref(), Some("2.5"));
        assert_eq!(Value::Float(f64::NAN).to_text().as_deref(), Some("NaN"));
        assert_eq!(Value::Int(1).to_text().as_deref(), Some("1"));
    }
}
