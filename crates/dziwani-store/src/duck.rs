//! DuckDB storage for the project catalog.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arrow::array::{Array, Int64Array, LargeStringArray, StringArray};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use duckdb::{Connection, params};
use dziwani_core::dashboard::{
    self, COMPLETION_DATE, IS_LATEST, LAST_VISIT, SIGNING_DATE, START_DATE, TABLE,
};
use dziwani_core::{ProjectRecord, Row};
use tracing::{debug, info};

use crate::builder::{DETAIL_COLUMNS, quote};
use crate::executor::{SqlExecutor, rows_from_batches};
use crate::safety::validate_sql;
use crate::StoreError;

const DATE_COLUMNS: &[&str] = &[START_DATE, COMPLETION_DATE, LAST_VISIT, SIGNING_DATE];

/// DuckDB store holding the `proj_dashboard` table.
///
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
/// Use [`open`](Self::open) for in-memory and [`open_persistent`](Self::open_persistent)
/// for file-backed storage that survives across process restarts.
pub struct DuckStore {
    conn: Connection,
}

impl DuckStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Open or create a persistent DuckDB database at the given path.
    ///
    /// If the file already holds a loaded catalog it is available immediately.
    /// Use [`has_table`](Self::has_table) to check whether a load is needed.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// Whether `proj_dashboard` exists.
    pub fn has_table(&self) -> bool {
        self.count().is_ok()
    }

    /// Create `proj_dashboard` from the catalog schema if it is missing.
    pub fn create_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(&create_table_sql())?;
        Ok(())
    }

    /// Append rows from a CSV export whose header names match the column
    /// names (in any case). Unknown headers are ignored; a missing `ISLATEST`
    /// column marks every row as latest. Returns the table's row count.
    pub fn load_csv(&self, path: &Path) -> Result<usize, StoreError> {
        if !path.exists() {
            return Err(StoreError::CsvNotFound(path.to_path_buf()));
        }
        self.create_schema()?;

        let source = format!(
            "read_csv({}, header = true, all_varchar = true)",
            quote(&path.display().to_string())
        );
        let headers = self.csv_headers(&source)?;

        let schema = dashboard::dashboard_schema();
        let mut targets = Vec::new();
        let mut exprs = Vec::new();
        for field in schema.fields() {
            let Some(header) = headers.iter().find(|h| h.eq_ignore_ascii_case(field.name())) else {
                continue;
            };
            targets.push(field.name().clone());
            exprs.push(cast_expr(header, field.name(), field.data_type()));
        }
        if !targets.iter().any(|t| t == dashboard::PROJECT_NAME) {
            return Err(StoreError::Other(format!(
                "CSV has no {} column",
                dashboard::PROJECT_NAME
            )));
        }

        let sql = format!(
            "INSERT INTO {TABLE} ({}) SELECT {} FROM {source}",
            targets.join(", "),
            exprs.join(", ")
        );
        self.conn.execute_batch(&sql)?;
        let count = self.count()?;
        info!(path = %path.display(), columns = targets.len(), count, "loaded CSV");
        Ok(count)
    }

    fn csv_headers(&self, source: &str) -> Result<Vec<String>, StoreError> {
        let batches = self.query_arrow(&format!("DESCRIBE SELECT * FROM {source}"))?;
        let mut names = Vec::new();
        for batch in &batches {
            let col = batch.column(0).as_any();
            if let Some(col) = col.downcast_ref::<StringArray>() {
                names.extend((0..col.len()).map(|i| col.value(i).to_string()));
            } else if let Some(col) = col.downcast_ref::<LargeStringArray>() {
                names.extend((0..col.len()).map(|i| col.value(i).to_string()));
            } else {
                return Err(StoreError::Other("DESCRIBE column_name not utf8".into()));
            }
        }
        Ok(names)
    }

    /// Insert one project. `is_latest = false` stores a superseded revision.
    pub fn insert_project(&self, record: &ProjectRecord, is_latest: bool) -> Result<(), StoreError> {
        let columns: Vec<&str> = DETAIL_COLUMNS.iter().map(|(col, _)| *col).collect();
        let placeholders: Vec<&str> = columns
            .iter()
            .map(|col| {
                if DATE_COLUMNS.contains(col) {
                    "CAST(? AS DATE)"
                } else {
                    "?"
                }
            })
            .collect();
        let sql = format!(
            "INSERT INTO {TABLE} ({}, {IS_LATEST}) VALUES ({}, ?)",
            columns.join(", "),
            placeholders.join(", ")
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let r = record;
        stmt.execute(params![
            r.project_name.as_deref(),
            r.project_code.as_deref(),
            r.project_sector.as_deref(),
            r.status.as_deref(),
            r.stage.as_deref(),
            r.region.as_deref(),
            r.district.as_deref(),
            r.traditional_authority.as_deref(),
            r.total_budget,
            r.total_expenditure,
            r.funding_source.as_deref(),
            r.start_date.as_deref(),
            r.completion_date.as_deref(),
            r.last_monitoring_visit.as_deref(),
            r.completion_progress,
            r.contractor.as_deref(),
            r.contract_signing_date.as_deref(),
            r.description.as_deref(),
            r.fiscal_year.as_deref(),
            i32::from(is_latest),
        ])?;
        Ok(())
    }

    /// Insert current-revision projects, creating the table if needed.
    pub fn insert_projects(&self, records: &[ProjectRecord]) -> Result<usize, StoreError> {
        self.create_schema()?;
        for record in records {
            self.insert_project(record, true)?;
        }
        debug!(inserted = records.len(), "inserted projects");
        Ok(records.len())
    }

    // ── Counts ──

    /// Number of rows in `proj_dashboard`, all revisions included.
    pub fn count(&self) -> Result<usize, StoreError> {
        self.count_table(TABLE)
    }

    fn count_table(&self, table: &str) -> Result<usize, StoreError> {
        let sql = format!("SELECT count(*)::BIGINT AS cnt FROM {table}");
        let mut stmt = self.conn.prepare(&sql)?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([])?.collect();
        let batch = batches.first().ok_or(StoreError::NoResults)?;
        let col = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| StoreError::Other("count column not i64".into()))?;
        Ok(col.value(0) as usize)
    }

    // ── Queries ──

    /// Execute SQL and return Arrow RecordBatches.
    pub fn query_arrow(&self, sql: &str) -> Result<Vec<RecordBatch>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([])?.collect();
        Ok(batches)
    }

    /// Execute SQL and return rows keyed by column alias.
    pub fn query_rows(&self, sql: &str) -> Result<Vec<Row>, StoreError> {
        rows_from_batches(&self.query_arrow(sql)?)
    }

    /// Share the store between async tasks with a per-query timeout.
    pub fn into_shared(self, timeout: Duration) -> SharedStore {
        SharedStore {
            inner: Arc::new(Mutex::new(self)),
            timeout,
        }
    }
}

/// `CREATE TABLE` statement derived from the Arrow catalog schema.
pub fn create_table_sql() -> String {
    let schema = dashboard::dashboard_schema();
    let columns: Vec<String> = schema
        .fields()
        .iter()
        .map(|f| {
            let mut col = format!("{} {}", f.name(), sql_type(f.data_type()));
            if f.name() == IS_LATEST {
                col.push_str(" DEFAULT 1");
            }
            if !f.is_nullable() {
                col.push_str(" NOT NULL");
            }
            col
        })
        .collect();
    format!("CREATE TABLE IF NOT EXISTS {TABLE} ({})", columns.join(", "))
}

fn sql_type(data_type: &DataType) -> &'static str {
    match data_type {
        DataType::Float64 => "DOUBLE",
        DataType::Date32 => "DATE",
        DataType::Int32 => "INTEGER",
        _ => "VARCHAR",
    }
}

/// Tolerant conversion of a text CSV cell to the column type. Unparseable
/// cells load as NULL.
fn cast_expr(header: &str, column: &str, data_type: &DataType) -> String {
    let cell = format!("NULLIF(TRIM(\"{}\"), '')", header.replace('"', "\"\""));
    match data_type {
        DataType::Float64 => format!("TRY_CAST(REPLACE({cell}, ',', '') AS DOUBLE)"),
        DataType::Date32 => format!(
            "COALESCE(TRY_CAST({cell} AS DATE), TRY_STRPTIME({cell}, '%d/%m/%Y')::DATE)"
        ),
        DataType::Int32 if column == IS_LATEST => {
            format!("COALESCE(TRY_CAST({cell} AS INTEGER), 1)")
        }
        DataType::Int32 => format!("TRY_CAST({cell} AS INTEGER)"),
        _ => cell,
    }
}

/// A [`DuckStore`] behind a mutex, executing on the blocking pool.
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<DuckStore>>,
    timeout: Duration,
}

#[async_trait]
impl SqlExecutor for SharedStore {
    async fn execute(&self, sql: &str) -> Result<Vec<Row>, StoreError> {
        validate_sql(sql)?;
        let inner = Arc::clone(&self.inner);
        let sql = sql.to_string();
        let task = tokio::task::spawn_blocking(move || {
            let store = inner
                .lock()
                .map_err(|_| StoreError::Other("store lock poisoned".into()))?;
            store.query_rows(&sql)
        });
        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(StoreError::Other(format!("query task failed: {e}"))),
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }
}
