//! Scripted in-memory warehouse for exercising the upload paths.

use super::{ColumnInfo, Dialect, ResultSet, Row, Session, Value, Warehouse};
use crate::config::{ConnectDescriptor, Credentials};
use crate::error::{BatchError, ConnectError, ExecError};
use std::cell::RefCell;
use std::rc::Rc;

/// What a call did, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Connect(String),
    Query(String),
    Execute(String, Row),
    ExecuteMany(String, usize),
    Commit,
    Close,
}

type RowRule = Box<dyn Fn(&[Value]) -> Option<ExecError>>;

#[derive(Default)]
pub struct State {
    pub calls: Vec<Call>,
    pub inserted: Vec<Row>,
    pub columns: Vec<ColumnInfo>,
    pub result_rows: Vec<Row>,
    /// Whole-batch failure returned by `execute_many`.
    pub batch_failure: Option<ExecError>,
    /// Per-row rejection applied by both `execute` and `execute_many`.
    pub reject: Option<RowRule>,
    pub refuse_connect: bool,
}

#[derive(Clone, Default)]
pub struct MemoryWarehouse {
    pub state: Rc<RefCell<State>>,
}

impl MemoryWarehouse {
    pub fn with_columns(columns: &[(&str, &str)]) -> Self {
        let wh = Self::default();
        wh.state.borrow_mut().columns = columns
            .iter()
            .map(|(name, tag)| ColumnInfo {
                name: name.to_string(),
                type_tag: tag.to_string(),
            })
            .collect();
        wh
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn inserted(&self) -> Vec<Row> {
        self.state.borrow().inserted.clone()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::ExecuteMany(_, n) => Some(n),
                _ => None,
            })
            .collect()
    }
}

pub struct MemorySession {
    state: Rc<RefCell<State>>,
}

impl Warehouse for MemoryWarehouse {
    type Session = MemorySession;

    fn connect(
        &self,
        target: &ConnectDescriptor,
        _credentials: &Credentials,
    ) -> Result<MemorySession, ConnectError> {
        let mut state = self.state.borrow_mut();
        if state.refuse_connect {
            return Err(ConnectError::Backend {
                dsn: target.dsn(),
                message: "listener refused the connection".into(),
            });
        }
        state.calls.push(Call::Connect(target.dsn()));
        Ok(MemorySession {
            state: Rc::clone(&self.state),
        })
    }
}

impl Session for MemorySession {
    fn dialect(&self) -> Dialect {
        Dialect::ORACLE
    }

    fn query(&mut self, sql: &str) -> Result<ResultSet, ExecError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Query(sql.to_string()));
        let rows = if sql.contains("1=0") {
            Vec::new()
        } else {
            state.result_rows.clone()
        };
        Ok(ResultSet {
            columns: state.columns.clone(),
            rows,
        })
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, ExecError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Execute(sql.to_string(), params.to_vec()));
        let verdict = state.reject.as_ref().and_then(|rule| rule(params));
        if let Some(err) = verdict {
            return Err(err);
        }
        if sql.starts_with("INSERT") {
            state.inserted.push(params.to_vec());
        }
        Ok(1)
    }

    fn execute_many(&mut self, sql: &str, rows: &[Row]) -> Result<Vec<BatchError>, ExecError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::ExecuteMany(sql.to_string(), rows.len()));
        if let Some(err) = state.batch_failure.clone() {
            return Err(err);
        }
        let mut errors = Vec::new();
        for (offset, row) in rows.iter().enumerate() {
            let verdict = state.reject.as_ref().and_then(|rule| rule(row));
            match verdict {
                Some(ExecError::Database { code, message }) => errors.push(BatchError {
                    offset,
                    code,
                    message,
                }),
                Some(ExecError::Structural(message)) => errors.push(BatchError {
                    offset,
                    code: String::new(),
                    message,
                }),
                None => state.inserted.push(row.clone()),
            }
        }
        Ok(errors)
    }

    fn commit(&mut self) -> Result<(), ExecError> {
        self.state.borrow_mut().calls.push(Call::Commit);
        Ok(())
    }

    fn close(self) -> Result<(), ExecError> {
        self.state.borrow_mut().calls.push(Call::Close);
        Ok(())
    }
}
