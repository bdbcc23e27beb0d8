//! The executor seam: a `Warehouse` opens `Session`s that run parameterized
//! statements, including bulk submissions that report rejected rows one by one.

pub mod value;

#[cfg(test)]
pub(crate) mod memory;

pub use value::{display_row, Row, Value};

use crate::config::{ConnectDescriptor, Credentials};
use crate::error::{BatchError, ConnectError, ExecError};

/// Oracle-style default: `05-Mar-24`.
pub const DEFAULT_DATE_FORMAT: &str = "%d-%b-%y";

/// How positional parameters are spelled in SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// `:1, :2, ...`
    Colon,
    /// `$1, $2, ...`
    Dollar,
    /// `?, ?, ...`
    Question,
}

impl Placeholder {
    /// Placeholder for the 1-based `position`.
    pub fn render(self, position: usize) -> String {
        match self {
            Placeholder::Colon => format!(":{position}"),
            Placeholder::Dollar => format!("${position}"),
            Placeholder::Question => "?".to_string(),
        }
    }
}

/// Backend-specific spelling the upload path needs to know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub placeholder: Placeholder,
    /// `chrono` format used for date/time cells bound as text.
    pub date_format: &'static str,
}

impl Dialect {
    pub const ORACLE: Dialect = Dialect {
        placeholder: Placeholder::Colon,
        date_format: DEFAULT_DATE_FORMAT,
    };

    pub const DUCKDB: Dialect = Dialect {
        placeholder: Placeholder::Dollar,
        date_format: "%Y-%m-%d",
    };
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect::ORACLE
    }
}

/// Name and driver type tag of one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub type_tag: String,
}

/// Rows returned by a query plus the description of their columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Row>,
}

impl ResultSet {
    /// Column names as a text row, the way a script result is headed.
    pub fn header(&self) -> Row {
        self.columns
            .iter()
            .map(|c| Value::Text(c.name.clone()))
            .collect()
    }
}

/// Opens sessions against a configured database.
pub trait Warehouse {
    type Session: Session;

    fn connect(
        &self,
        target: &ConnectDescriptor,
        credentials: &Credentials,
    ) -> Result<Self::Session, ConnectError>;
}

/// One open connection with a single cursor.
pub trait Session {
    fn dialect(&self) -> Dialect {
        Dialect::default()
    }

    /// Run a statement that returns rows.
    fn query(&mut self, sql: &str) -> Result<ResultSet, ExecError>;

    /// Run a statement once with positional parameters. Returns affected rows.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, ExecError>;

    /// Run one statement against many parameter rows. Rows the backend
    /// rejects are returned as `BatchError`s while the rest are applied;
    /// `Err` means the batch could not be processed at all.
    fn execute_many(&mut self, sql: &str, rows: &[Row]) -> Result<Vec<BatchError>, ExecError>;

    fn commit(&mut self) -> Result<(), ExecError>;

    fn close(self) -> Result<(), ExecError>
    where
        Self: Sized;
}
