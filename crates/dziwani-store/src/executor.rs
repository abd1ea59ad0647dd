//! The store contract consumed by the engine: `execute(sql) -> rows`.

use arrow::json::ArrayWriter;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use dziwani_core::Row;

use crate::StoreError;

/// Executes validated SELECT statements.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<Vec<Row>, StoreError>;
}

/// Convert Arrow batches into JSON rows keyed by column name.
///
/// Null cells are omitted from their row. Dates become `YYYY-MM-DD` strings.
pub fn rows_from_batches(batches: &[RecordBatch]) -> Result<Vec<Row>, StoreError> {
    let refs: Vec<&RecordBatch> = batches.iter().filter(|b| b.num_rows() > 0).collect();
    if refs.is_empty() {
        return Ok(Vec::new());
    }
    let mut writer = ArrayWriter::new(Vec::new());
    writer.write_batches(&refs)?;
    writer.finish()?;
    let buf = writer.into_inner();
    Ok(serde_json::from_slice(&buf)?)
}
