//! Embedded DuckDB as a warehouse backend.
//!
//! Sessions run in autocommit mode: DuckDB aborts an open transaction on the
//! first failed statement, which would undo the rows a bulk submission has
//! already applied. `commit` is therefore a no-op. Bulk submissions open their
//! own transactions and replay without the rows that failed.

use crate::config::{ConnectDescriptor, Credentials};
use crate::error::{BatchError, ConnectError, ExecError};
use crate::warehouse::{ColumnInfo, Dialect, ResultSet, Row, Session, Value, Warehouse};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use duckdb::types::{TimeUnit, Value as DuckValue, ValueRef};
use duckdb::{params_from_iter, Connection};
use std::path::PathBuf;
use std::time::Instant;
use tracing::debug;

/// Opens DuckDB files named by the connection profile.
#[derive(Debug, Clone, Default)]
pub struct DuckWarehouse {
    /// Used when a profile has no `database` entry: `<dir>/<sid>.duckdb`.
    pub data_dir: PathBuf,
}

impl DuckWarehouse {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn database_path(&self, target: &ConnectDescriptor) -> PathBuf {
        target
            .database
            .clone()
            .unwrap_or_else(|| self.data_dir.join(format!("{}.duckdb", target.sid)))
    }
}

impl Warehouse for DuckWarehouse {
    type Session = DuckSession;

    fn connect(
        &self,
        target: &ConnectDescriptor,
        credentials: &Credentials,
    ) -> Result<DuckSession, ConnectError> {
        let path = self.database_path(target);
        debug!(path = %path.display(), user = %credentials.username, "opening duckdb");
        let conn = Connection::open(&path).map_err(|e| ConnectError::Backend {
            dsn: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(DuckSession { conn })
    }
}

pub struct DuckSession {
    conn: Connection,
}

impl DuckSession {
    /// Wrap an already open connection (in-memory databases in tests).
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }
}

fn exec_error(err: duckdb::Error) -> ExecError {
    match err {
        duckdb::Error::DuckDBFailure(_, _) => ExecError::database("DUCKDB", err.to_string()),
        other => ExecError::structural(other.to_string()),
    }
}

impl Session for DuckSession {
    fn dialect(&self) -> Dialect {
        Dialect::DUCKDB
    }

    fn query(&mut self, sql: &str) -> Result<ResultSet, ExecError> {
        let start = Instant::now();
        let mut stmt = self.conn.prepare(sql).map_err(exec_error)?;
        let mut rows = stmt.query([]).map_err(exec_error)?;

        // Names and types are known once the statement has run.
        let columns: Vec<ColumnInfo> = match rows.as_ref() {
            Some(s) => s
                .column_names()
                .into_iter()
                .enumerate()
                .map(|(i, name)| ColumnInfo {
                    name: name.to_string(),
                    type_tag: format!("{:?}", s.column_type(i)),
                })
                .collect(),
            None => Vec::new(),
        };

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(exec_error)? {
            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                values.push(read_value(row.get_ref(i).map_err(exec_error)?));
            }
            out.push(values);
        }

        debug!(
            rows = out.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "query completed"
        );
        Ok(ResultSet { columns, rows: out })
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, ExecError> {
        let mut stmt = self.conn.prepare(sql).map_err(exec_error)?;
        let affected = stmt
            .execute(params_from_iter(params.iter().map(bind_value)))
            .map_err(exec_error)?;
        Ok(affected as u64)
    }

    fn execute_many(&mut self, sql: &str, rows: &[Row]) -> Result<Vec<BatchError>, ExecError> {
        let start = Instant::now();
        let mut stmt = self.conn.prepare(sql).map_err(exec_error)?;
        let expected = stmt.parameter_count();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != expected) {
            return Err(ExecError::structural(format!(
                "row {i} has {} values, statement expects {expected}",
                row.len()
            )));
        }

        // Each pass runs in one transaction. DuckDB aborts it on the first
        // failure, so the failing row is set aside and the pass starts over.
        let mut rejected = vec![false; rows.len()];
        let mut errors = Vec::new();
        loop {
            self.conn.execute_batch("BEGIN TRANSACTION").map_err(exec_error)?;
            let failure = rows
                .iter()
                .enumerate()
                .filter(|(offset, _)| !rejected[*offset])
                .find_map(|(offset, row)| {
                    stmt.execute(params_from_iter(row.iter().map(bind_value)))
                        .err()
                        .map(|err| (offset, err))
                });
            let Some((offset, err)) = failure else {
                self.conn.execute_batch("COMMIT").map_err(exec_error)?;
                break;
            };
            self.conn.execute_batch("ROLLBACK").map_err(exec_error)?;
            rejected[offset] = true;
            let (code, message) = match exec_error(err) {
                ExecError::Database { code, message } => (code, message),
                ExecError::Structural(message) => (String::new(), message),
            };
            errors.push(BatchError {
                offset,
                code,
                message,
            });
        }
        errors.sort_by_key(|e| e.offset);

        debug!(
            rows = rows.len(),
            rejected = errors.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "batch completed"
        );
        Ok(errors)
    }

    fn commit(&mut self) -> Result<(), ExecError> {
        Ok(())
    }

    fn close(self) -> Result<(), ExecError> {
        self.conn.close().map_err(|(_, e)| exec_error(e))
    }
}

/// Empty text binds as NULL, as the warehouse treats `''` and NULL alike.
fn bind_value(value: &Value) -> DuckValue {
    match value {
        Value::Null => DuckValue::Null,
        Value::Text(s) if s.is_empty() => DuckValue::Null,
        Value::Text(s) | Value::Number(s) => DuckValue::Text(s.clone()),
        Value::Bool(b) => DuckValue::Boolean(*b),
        Value::Int(i) => DuckValue::BigInt(*i),
        Value::Float(f) => DuckValue::Double(*f),
        Value::Timestamp(ts) => {
            DuckValue::Timestamp(TimeUnit::Microsecond, ts.and_utc().timestamp_micros())
        }
        Value::Date(d) => DuckValue::Timestamp(
            TimeUnit::Microsecond,
            d.and_time(NaiveTime::MIN).and_utc().timestamp_micros(),
        ),
        Value::Bytes(b) => DuckValue::Blob(b.clone()),
    }
}

fn timestamp(unit: TimeUnit, raw: i64) -> Option<NaiveDateTime> {
    let micros = match unit {
        TimeUnit::Second => raw.checked_mul(1_000_000)?,
        TimeUnit::Millisecond => raw.checked_mul(1_000)?,
        TimeUnit::Microsecond => raw,
        TimeUnit::Nanosecond => raw / 1_000,
    };
    DateTime::from_timestamp_micros(micros).map(|dt| dt.naive_utc())
}

fn read_value(v: ValueRef<'_>) -> Value {
    match v {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Bool(b),
        ValueRef::TinyInt(i) => Value::Int(i.into()),
        ValueRef::SmallInt(i) => Value::Int(i.into()),
        ValueRef::Int(i) => Value::Int(i.into()),
        ValueRef::BigInt(i) => Value::Int(i),
        ValueRef::HugeInt(i) => Value::Number(i.to_string()),
        ValueRef::UTinyInt(i) => Value::Int(i.into()),
        ValueRef::USmallInt(i) => Value::Int(i.into()),
        ValueRef::UInt(i) => Value::Int(i.into()),
        ValueRef::UBigInt(i) => Value::Number(i.to_string()),
        ValueRef::Float(f) => Value::Float(f.into()),
        ValueRef::Double(f) => Value::Float(f),
        ValueRef::Decimal(d) => Value::Number(d.to_string()),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
        ValueRef::Timestamp(unit, raw) => timestamp(unit, raw)
            .map(Value::Timestamp)
            .unwrap_or(Value::Null),
        ValueRef::Date32(days) => NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(days.into())))
            .map(Value::Date)
            .unwrap_or(Value::Null),
        other => Value::Text(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TypeKind;
    use anyhow::Result;

    fn mem_session() -> Result<DuckSession> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "CREATE SEQUENCE visit_ids;
             CREATE TABLE visits (
                ID INTEGER DEFAULT nextval('visit_ids'),
                NAME VARCHAR,
                SEEN DATE,
                SCORE INTEGER
             );",
        )?;
        Ok(DuckSession::from_connection(conn))
    }

    #[test]
    fn probe_reports_names_and_types() -> Result<()> {
        let mut s = mem_session()?;
        let rs = s.query("SELECT * FROM visits WHERE 1=0")?;
        assert!(rs.rows.is_empty());
        let names: Vec<_> = rs.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["ID", "NAME", "SEEN", "SCORE"]);
        let kinds: Vec<_> = rs
            .columns
            .iter()
            .map(|c| TypeKind::classify(&c.type_tag))
            .collect();
        assert_eq!(
            kinds,
            [
                TypeKind::Numeric,
                TypeKind::Text,
                TypeKind::Timestamp,
                TypeKind::Numeric
            ]
        );
        Ok(())
    }

    #[test]
    fn batch_rejects_bad_rows_and_keeps_the_rest() -> Result<()> {
        let mut s = mem_session()?;
        let sql = "INSERT INTO visits (NAME, SEEN, SCORE) VALUES ($1, $2, $3)";
        let rows: Vec<Row> = vec![
            vec!["a".into(), "2024-03-05".into(), "1".into()],
            vec!["b".into(), "2024-03-06".into(), "not a number".into()],
            vec!["c".into(), "".into(), "3".into()],
        ];
        let errors = s.execute_many(sql, &rows)?;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].offset, 1);

        let rs = s.query("SELECT NAME, SEEN, SCORE FROM visits ORDER BY NAME")?;
        assert_eq!(rs.rows.len(), 2);
        assert_eq!(
            rs.rows[0],
            vec![
                Value::Text("a".into()),
                Value::Date(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()),
                Value::Int(1),
            ]
        );
        assert_eq!(rs.rows[1][1], Value::Null);
        Ok(())
    }

    #[test]
    fn batch_replays_around_several_failures() -> Result<()> {
        let mut s = mem_session()?;
        let sql = "INSERT INTO visits (NAME, SEEN, SCORE) VALUES ($1, $2, $3)";
        let rows: Vec<Row> = (0..6)
            .map(|i| {
                let score = if i % 3 == 1 { "x".to_string() } else { i.to_string() };
                vec![format!("n{i}").into(), "2024-03-05".into(), score.into()]
            })
            .collect();
        let errors = s.execute_many(sql, &rows)?;
        let offsets: Vec<_> = errors.iter().map(|e| e.offset).collect();
        assert_eq!(offsets, [1, 4]);

        let rs = s.query("SELECT NAME FROM visits ORDER BY NAME")?;
        let names: Vec<_> = rs.rows.iter().map(|r| r[0].to_string()).collect();
        assert_eq!(names, ["n0", "n2", "n3", "n5"]);
        Ok(())
    }

    #[test]
    fn wrong_arity_is_structural() -> Result<()> {
        let mut s = mem_session()?;
        let sql = "INSERT INTO visits (NAME, SEEN, SCORE) VALUES ($1, $2, $3)";
        let rows = vec![vec![Value::from("a")]];
        assert!(matches!(
            s.execute_many(sql, &rows),
            Err(ExecError::Structural(_))
        ));
        Ok(())
    }

    #[test]
    fn missing_table_is_an_error() -> Result<()> {
        let mut s = mem_session()?;
        let res = s.execute("INSERT INTO missing_table VALUES ($1)", &[Value::Int(1)]);
        assert!(res.is_err());
        Ok(())
    }
}
