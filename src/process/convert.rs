use crate::process::{date_parser, trimming};
use crate::schema::{ColumnDescriptor, TypeKind};
use crate::warehouse::{Row, Value};
use tracing::{debug, info, warn};

/// Why a cell could not be made upload-safe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellError {
    /// Not a date/time and not parseable as one.
    NotADate(String),
    /// No text representation (e.g. non UTF-8 bytes).
    NoText,
}

/// Outcome of a normalization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    /// Original (pre-removal) indices of the rows that were dropped.
    pub removed: Vec<usize>,
}

impl Normalized {
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }
}

/// Convert one cell for a column of `kind`.
pub fn convert_cell(value: &Value, kind: TypeKind, date_format: &str) -> Result<Value, CellError> {
    if value.is_null() {
        return Ok(Value::Text(String::new()));
    }

    match kind {
        TypeKind::Timestamp => convert_datetime(value, date_format),
        TypeKind::Text => value
            .to_text()
            .map(|s| Value::Text(trimming::scrub_text(&s)))
            .ok_or(CellError::NoText),
        TypeKind::Numeric => value.to_text().map(Value::Text).ok_or(CellError::NoText),
        TypeKind::Unknown => Ok(value.clone()),
    }
}

fn convert_datetime(value: &Value, date_format: &str) -> Result<Value, CellError> {
    if let Some(ts) = value.as_datetime() {
        return Ok(Value::Text(ts.format(date_format).to_string()));
    }
    match value {
        Value::Text(s) if s.is_empty() => Ok(value.clone()),
        Value::Text(s) => date_parser::parse_flexible(s)
            .map(|ts| Value::Text(ts.format(date_format).to_string()))
            .ok_or_else(|| CellError::NotADate(s.clone())),
        other => Err(CellError::NotADate(other.to_string())),
    }
}

/// Normalize `rows` in place against `columns`, then drop every row that had
/// a cell fail (or whose width does not match the columns).
pub fn normalize_rows(
    rows: &mut Vec<Row>,
    columns: &[ColumnDescriptor],
    date_format: &str,
) -> Normalized {
    info!(rows = rows.len(), columns = columns.len(), "preparing data for the warehouse");

    let mut removed = Vec::new();
    for (j, row) in rows.iter_mut().enumerate() {
        if row.len() != columns.len() {
            warn!(
                line = j,
                width = row.len(),
                expected = columns.len(),
                "row width does not match the target columns"
            );
            removed.push(j);
            continue;
        }

        for (i, (cell, column)) in row.iter_mut().zip(columns).enumerate() {
            match convert_cell(cell, column.kind, date_format) {
                Ok(v) => *cell = v,
                Err(err) => {
                    debug!(line = j, column = i, name = %column.name, ?err, "cell rejected");
                    if column.kind == TypeKind::Text {
                        warn!("line {j} removed because column {i} is not a string");
                    }
                    removed.push(j);
                    break;
                }
            }
        }
    }

    // `removed` is ascending, so one retain pass drops them without shifting.
    let mut line = 0;
    let mut pending = removed.iter().peekable();
    rows.retain(|_| {
        let keep = pending.peek() != Some(&&line);
        if !keep {
            pending.next();
        }
        line += 1;
        keep
    });

    if removed.is_empty() {
        info!("data prep complete");
    } else {
        warn!(count = removed.len(), lines = ?removed, "removed lines");
    }
    Normalized { removed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::DEFAULT_DATE_FORMAT;
    use chrono::NaiveDate;

    fn cols(kinds: &[TypeKind]) -> Vec<ColumnDescriptor> {
        kinds
            .iter()
            .enumerate()
            .map(|(i, k)| ColumnDescriptor::new(format!("C{i}"), *k))
            .collect()
    }

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn null_becomes_empty_for_every_kind() {
        for kind in [
            TypeKind::Timestamp,
            TypeKind::Text,
            TypeKind::Numeric,
            TypeKind::Unknown,
        ] {
            assert_eq!(
                convert_cell(&Value::Null, kind, DEFAULT_DATE_FORMAT),
                Ok(text("")),
                "{kind:?}"
            );
        }
    }

    #[test]
    fn native_date_uses_day_month_year() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let ts = d.and_hms_opt(13, 45, 0).unwrap();
        assert_eq!(
            convert_cell(&Value::Date(d), TypeKind::Timestamp, DEFAULT_DATE_FORMAT),
            Ok(text("05-Mar-24"))
        );
        assert_eq!(
            convert_cell(&Value::Timestamp(ts), TypeKind::Timestamp, DEFAULT_DATE_FORMAT),
            Ok(text("05-Mar-24"))
        );
        assert_eq!(
            convert_cell(&text("2024-03-05 13:45:00"), TypeKind::Timestamp, DEFAULT_DATE_FORMAT),
            Ok(text("05-Mar-24"))
        );
        assert_eq!(
            convert_cell(&text(""), TypeKind::Timestamp, DEFAULT_DATE_FORMAT),
            Ok(text(""))
        );
    }

    #[test]
    fn dialect_date_format_is_honoured() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(
            convert_cell(&Value::Date(d), TypeKind::Timestamp, "%Y-%m-%d"),
            Ok(text("2024-03-05"))
        );
    }

    #[test]
    fn text_and_numeric_coercion() {
        assert_eq!(
            convert_cell(&text("café\tB"), TypeKind::Text, DEFAULT_DATE_FORMAT),
            Ok(text("caf B"))
        );
        assert_eq!(
            convert_cell(&Value::Int(42), TypeKind::Text, DEFAULT_DATE_FORMAT),
            Ok(text("42"))
        );
        assert_eq!(
            convert_cell(&Value::Int(-7), TypeKind::Numeric, DEFAULT_DATE_FORMAT),
            Ok(text("-7"))
        );
        assert_eq!(
            convert_cell(&Value::Number("12.50".into()), TypeKind::Numeric, DEFAULT_DATE_FORMAT),
            Ok(text("12.50"))
        );
        assert_eq!(
            convert_cell(&Value::Bytes(vec![0xff, 0xfe]), TypeKind::Text, DEFAULT_DATE_FORMAT),
            Err(CellError::NoText)
        );
    }

    #[test]
    fn unknown_kind_passes_through() {
        let v = Value::Bytes(vec![1, 2, 3]);
        assert_eq!(convert_cell(&v, TypeKind::Unknown, DEFAULT_DATE_FORMAT), Ok(v));
    }

    #[test]
    fn bad_rows_are_removed_after_the_pass() {
        let columns = cols(&[TypeKind::Text, TypeKind::Timestamp, TypeKind::Numeric]);
        let mut rows = vec![
            vec![text("ok"), text("2024-03-05"), Value::Int(1)],
            vec![text("bad date"), text("yesterday-ish"), Value::Int(2)],
            vec![Value::Null, Value::Null, Value::Null],
            vec![Value::Bytes(vec![0xc3]), text("not a date either"), Value::Int(4)],
            vec![text("short row")],
            vec![text("last"), Value::Int(20240305), Value::Float(1.5)],
        ];

        let out = normalize_rows(&mut rows, &columns, DEFAULT_DATE_FORMAT);

        assert_eq!(out.removed, vec![1, 3, 4, 5]);
        assert_eq!(out.removed_count(), 4);
        assert_eq!(
            rows,
            vec![
                vec![text("ok"), text("05-Mar-24"), text("1")],
                vec![text(""), text(""), text("")],
            ]
        );
        assert!(rows.iter().all(|r| r.len() == columns.len()));
    }

    #[test]
    fn clean_dataset_reports_nothing_removed() {
        let columns = cols(&[TypeKind::Numeric]);
        let mut rows = vec![vec![Value::Int(1)], vec![Value::Float(2.5)]];
        let out = normalize_rows(&mut rows, &columns, DEFAULT_DATE_FORMAT);
        assert!(out.removed.is_empty());
        assert_eq!(rows, vec![vec![text("1")], vec![text("2.5")]]);
    }
}
