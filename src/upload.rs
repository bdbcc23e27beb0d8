//! Bulk loading of normalized rows into a warehouse table.
//!
//! Rows are submitted as one bulk operation, as several equal parts when the
//! dataset is over the chunk threshold, or as a single execution when there is
//! exactly one row. Each bulk submission goes through [`ChunkState`]: rows the
//! backend rejects individually are reported, and a batch that cannot be
//! processed at all, for whatever reason, is replayed row by row so one bad
//! row cannot sink the rest.

use crate::config::UploadSettings;
use crate::error::{BatchError, ExecError};
use crate::process::{normalize_rows, part_count, split_into};
use crate::schema::{upload_columns, ColumnDescriptor};
use crate::warehouse::{display_row, Placeholder, Row, Session};
use tracing::{error, info, instrument, warn};

/// How a dataset is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// Nothing survived normalization.
    Empty,
    /// Exactly one row, executed directly.
    Single,
    /// One bulk submission.
    Batch,
    /// Over the threshold: this many independent bulk submissions.
    Chunked { parts: usize },
}

impl Plan {
    pub fn for_rows(rows: usize, threshold: usize) -> Self {
        match rows {
            0 => Plan::Empty,
            1 => Plan::Single,
            n if n > threshold => Plan::Chunked {
                parts: part_count(n, threshold),
            },
            _ => Plan::Batch,
        }
    }
}

/// Progress of one bulk submission.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkState {
    Attempted,
    PartiallyFailed(Vec<BatchError>),
    FallbackInProgress,
    Completed,
}

/// A row that failed when executed on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct RowFailure {
    /// 1-based position in the normalized dataset.
    pub line: usize,
    pub error: ExecError,
    pub row: Row,
}

/// What happened to one submitted chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkOutcome {
    pub submitted: usize,
    /// Rows rejected inside a bulk submission.
    pub batch_errors: Vec<BatchError>,
    /// Error that rejected the bulk submission as a whole, before the
    /// row-by-row replay.
    pub batch_failure: Option<ExecError>,
    pub fell_back: bool,
    /// Rows that failed during single execution or row-by-row fallback.
    pub row_failures: Vec<RowFailure>,
}

impl ChunkOutcome {
    fn new(submitted: usize) -> Self {
        Self {
            submitted,
            ..Default::default()
        }
    }

    pub fn rejected(&self) -> usize {
        self.batch_errors.len() + self.row_failures.len()
    }

    pub fn inserted(&self) -> usize {
        self.submitted - self.rejected()
    }
}

/// Result of an upload call.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadReport {
    pub table: String,
    /// Data rows handed in, header excluded.
    pub received: usize,
    /// Original indices of rows dropped by normalization.
    pub removed: Vec<usize>,
    /// `None` when there was nothing to upload.
    pub plan: Option<Plan>,
    pub chunks: Vec<ChunkOutcome>,
}

impl UploadReport {
    pub fn nothing_to_upload(table: &str) -> Self {
        Self {
            table: table.to_string(),
            received: 0,
            removed: Vec::new(),
            plan: None,
            chunks: Vec::new(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.plan.is_none()
    }

    pub fn inserted(&self) -> usize {
        self.chunks.iter().map(ChunkOutcome::inserted).sum()
    }

    pub fn rejected(&self) -> usize {
        self.chunks.iter().map(ChunkOutcome::rejected).sum()
    }

    pub fn row_failures(&self) -> impl Iterator<Item = &RowFailure> {
        self.chunks.iter().flat_map(|c| c.row_failures.iter())
    }
}

/// `INSERT INTO t (a, b) VALUES (:1, :2)` with the dialect's placeholders.
pub fn build_insert(table: &str, columns: &[ColumnDescriptor], placeholder: Placeholder) -> String {
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    let values: Vec<String> = (1..=columns.len()).map(|i| placeholder.render(i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        names.join(", "),
        values.join(", ")
    )
}

/// Zero-row probe used to read a table's column description.
pub fn probe_sql(table: &str) -> String {
    format!("SELECT * FROM {table} WHERE 1=0")
}

/// Normalize `rows` against `table` and load them through `session`, then
/// commit. Row- and batch-level failures are reported, never returned; `Err`
/// means the column probe or the commit failed.
#[instrument(level = "info", skip(session, rows, settings), fields(rows = rows.len()))]
pub fn upload_rows<S: Session>(
    session: &mut S,
    table: &str,
    mut rows: Vec<Row>,
    settings: &UploadSettings,
) -> Result<UploadReport, ExecError> {
    let received = rows.len();
    let dialect = session.dialect();

    info!("retrieving column types from {table}");
    let probe = session.query(&probe_sql(table))?;
    let columns = upload_columns(&probe.columns, &settings.surrogate_key);

    let normalized = normalize_rows(&mut rows, &columns, dialect.date_format);
    let sql = build_insert(table, &columns, dialect.placeholder);
    let plan = Plan::for_rows(rows.len(), settings.chunk_threshold);

    info!(plan = ?plan, "uploading data to {table}");
    let chunks = match plan {
        Plan::Empty => {
            warn!("no rows left to upload after data prep");
            Vec::new()
        }
        Plan::Single => vec![submit_single(session, &sql, table, &rows[0])],
        Plan::Batch => {
            info!("upload in progress");
            vec![submit_chunk(session, &sql, table, &rows, 0)]
        }
        Plan::Chunked { parts } => {
            info!("data set is too large for single submission");
            info!("data set will be split into {parts} parts");
            let max = rows.len().div_ceil(parts);
            if max > settings.chunk_threshold {
                warn!(
                    max_part = max,
                    threshold = settings.chunk_threshold,
                    "rounded part count leaves parts above the chunk threshold"
                );
            }
            let mut outcomes = Vec::with_capacity(parts);
            let mut base = 0;
            for (i, part) in split_into(&rows, parts).into_iter().enumerate() {
                info!("upload {} of {} in progress", i + 1, parts);
                outcomes.push(submit_chunk(session, &sql, table, part, base));
                info!("upload completed");
                base += part.len();
            }
            outcomes
        }
    };

    session.commit()?;

    let report = UploadReport {
        table: table.to_string(),
        received,
        removed: normalized.removed,
        plan: Some(plan),
        chunks,
    };
    info!(
        inserted = report.inserted(),
        rejected = report.rejected(),
        removed = report.removed.len(),
        "upload finished"
    );
    Ok(report)
}

/// Drive one bulk submission to completion. `base` is the number of rows
/// before this chunk, used for 1-based line numbers.
pub fn submit_chunk<S: Session>(
    session: &mut S,
    sql: &str,
    table: &str,
    rows: &[Row],
    base: usize,
) -> ChunkOutcome {
    let mut outcome = ChunkOutcome::new(rows.len());
    let mut state = ChunkState::Attempted;
    loop {
        state = match state {
            ChunkState::Attempted => match session.execute_many(sql, rows) {
                Ok(errors) if errors.is_empty() => {
                    info!("no errors encountered");
                    ChunkState::Completed
                }
                Ok(errors) => ChunkState::PartiallyFailed(errors),
                Err(err) => {
                    match err.diagnostic() {
                        Some((code, message)) => {
                            error!(code, detail = message, "batch insert into {table} failed")
                        }
                        None => warn!("type error from batch insert: {err}"),
                    }
                    warn!("now submitting single rows");
                    outcome.batch_failure = Some(err);
                    ChunkState::FallbackInProgress
                }
            },
            ChunkState::PartiallyFailed(errors) => {
                for e in &errors {
                    error!(offset = e.offset, code = %e.code, "{}", e.message);
                }
                outcome.batch_errors = errors;
                ChunkState::Completed
            }
            ChunkState::FallbackInProgress => {
                outcome.fell_back = true;
                outcome.row_failures = execute_rows(session, sql, table, rows, base);
                ChunkState::Completed
            }
            ChunkState::Completed => return outcome,
        };
    }
}

fn submit_single<S: Session>(session: &mut S, sql: &str, table: &str, row: &Row) -> ChunkOutcome {
    let mut outcome = ChunkOutcome::new(1);
    outcome.row_failures = execute_rows(session, sql, table, std::slice::from_ref(row), 0);
    outcome
}

/// Execute each row on its own; a failure is reported and the next row runs.
fn execute_rows<S: Session>(
    session: &mut S,
    sql: &str,
    table: &str,
    rows: &[Row],
    base: usize,
) -> Vec<RowFailure> {
    let mut failures = Vec::new();
    for (j, row) in rows.iter().enumerate() {
        let Err(err) = session.execute(sql, row) else {
            continue;
        };
        let line = base + j + 1;
        error!("error on data upload for {table} on line {line}");
        match err.diagnostic() {
            Some((code, message)) => {
                error!("error code from row by row insert: {code}");
                error!("error message from row by row insert: {message}");
            }
            None => error!("type error from row by row insert: {err}"),
        }
        error!("{}", display_row(row));
        failures.push(RowFailure {
            line,
            error: err,
            row: row.clone(),
        });
    }
    failures
}
