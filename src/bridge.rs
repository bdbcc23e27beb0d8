//! Per-call operations against a configured warehouse. Every operation opens
//! its own session and closes it before returning.

use crate::config::{Config, Target};
use crate::error::ConnectError;
use crate::fetch::{ScriptRef, ScriptSource};
use crate::schema::ColumnDescriptor;
use crate::upload::{probe_sql, upload_rows, UploadReport};
use crate::warehouse::{Row, Session, Warehouse};
use anyhow::{bail, Context, Result};
use tracing::{error, info, instrument, warn};

pub struct Bridge<W: Warehouse> {
    config: Config,
    warehouse: W,
    scripts: Option<Box<dyn ScriptSource>>,
}

impl<W: Warehouse> Bridge<W> {
    pub fn new(config: Config, warehouse: W) -> Self {
        Self {
            config,
            warehouse,
            scripts: None,
        }
    }

    pub fn with_scripts(mut self, scripts: impl ScriptSource + 'static) -> Self {
        self.scripts = Some(Box::new(scripts));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Open a session for `target`. Failures are logged and returned typed.
    pub fn open_connection(&self, target: &Target) -> Result<W::Session, ConnectError> {
        let (descriptor, credentials) = self.config.resolve(target)?;
        self.warehouse
            .connect(descriptor, credentials)
            .inspect_err(|err| error!(%target, "{err}"))
    }

    /// Run `op` on a fresh session and close it whatever the outcome.
    fn with_session<T>(
        &self,
        target: &Target,
        op: impl FnOnce(&mut W::Session) -> Result<T>,
    ) -> Result<T> {
        let mut session = self.open_connection(target)?;
        let result = op(&mut session);
        if let Err(err) = session.close() {
            warn!("closing session failed: {err}");
        }
        result
    }

    /// Execute one statement and commit.
    #[instrument(level = "info", skip(self))]
    pub fn execute_query(&self, sql: &str, target: &Target) -> Result<()> {
        self.with_session(target, |s| {
            s.execute(sql, &[])?;
            s.commit()?;
            Ok(())
        })
    }

    /// Run a script and return its rows with the header row first.
    #[instrument(level = "info", skip(self))]
    pub fn run_query(&self, script: &ScriptRef, target: &Target) -> Result<Vec<Row>> {
        let sql = match script {
            ScriptRef::Id(id) => {
                let source = self
                    .scripts
                    .as_deref()
                    .with_context(|| format!("no script source configured for script {id}"))?;
                script.resolve(source)?
            }
            ScriptRef::Raw(_) => script.resolve(&NoScripts)?,
        };
        self.with_session(target, |s| {
            let rs = s.query(&sql)?;
            let mut rows = Vec::with_capacity(rs.rows.len() + 1);
            rows.push(rs.header());
            rows.extend(rs.rows);
            info!(rows = rows.len() - 1, "script returned");
            Ok(rows)
        })
    }

    #[instrument(level = "info", skip(self))]
    pub fn get_data_from_table(
        &self,
        table: &str,
        distinct: bool,
        columns: Option<&str>,
        target: &Target,
    ) -> Result<Vec<Row>> {
        let sql = select_sql(table, distinct, columns)?;
        self.with_session(target, |s| Ok(s.query(&sql)?.rows))
    }

    /// Delete every row of `table`.
    #[instrument(level = "info", skip(self))]
    pub fn clear_table(&self, table: &str, target: &Target) -> Result<()> {
        info!("deleting data in {table}");
        let sql = format!("DELETE FROM {table}");
        self.with_session(target, |s| {
            s.execute(&sql, &[])?;
            s.commit()?;
            Ok(())
        })
    }

    /// Every column of `table`, surrogate key included.
    #[instrument(level = "info", skip(self))]
    pub fn get_column_info(&self, table: &str, target: &Target) -> Result<Vec<ColumnDescriptor>> {
        info!("retrieving column types from {table}");
        self.with_session(target, |s| {
            let rs = s.query(&probe_sql(table))?;
            Ok(rs.columns.iter().map(ColumnDescriptor::from).collect())
        })
    }

    /// Load `data` into `table`. Row and batch failures end up in the report;
    /// only connection, probe and commit failures are returned as errors.
    #[instrument(level = "info", skip(self, data), fields(rows = data.len()))]
    pub fn update_table(
        &self,
        table: &str,
        mut data: Vec<Row>,
        header_included: bool,
        target: &Target,
    ) -> Result<UploadReport> {
        info!("preparing data for upload to {table}");
        if header_included && !data.is_empty() {
            data.remove(0);
        }
        if data.is_empty() {
            info!("no new data uploaded");
            return Ok(UploadReport::nothing_to_upload(table));
        }
        let settings = self.config.upload.clone();
        self.with_session(target, |s| Ok(upload_rows(s, table, data, &settings)?))
    }

    /// Run a script and load its result into `table`, optionally emptying the
    /// table first.
    pub fn load_script(
        &self,
        script: &ScriptRef,
        table: &str,
        clear_first: bool,
        target: &Target,
    ) -> Result<UploadReport> {
        let rows = self.run_query(script, target)?;
        if clear_first {
            self.clear_table(table, target)?;
        }
        self.update_table(table, rows, true, target)
    }
}

struct NoScripts;

impl ScriptSource for NoScripts {
    fn read_script(&self, script_id: &str) -> Result<String> {
        bail!("no script source configured for script {script_id}")
    }
}

/// SELECT used by `get_data_from_table`.
pub fn select_sql(table: &str, distinct: bool, columns: Option<&str>) -> Result<String> {
    let columns = columns.map(str::trim).filter(|c| !c.is_empty());
    if distinct {
        let Some(column) = columns else {
            bail!("a distinct read of {table} needs a column name");
        };
        return Ok(format!("SELECT DISTINCT tn.{column} FROM {table} tn"));
    }
    Ok(match columns {
        None => format!("SELECT * FROM {table}"),
        Some(list) => {
            let qualified: Vec<String> = list
                .split(',')
                .map(|c| format!("{table}.{}", c.trim()))
                .collect();
            format!("SELECT {} FROM {table}", qualified.join(", "))
        }
    })
}
