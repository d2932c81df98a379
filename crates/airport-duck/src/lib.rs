//! DuckDB mirror for remote Airport tables
//!
//! Creates local tables from translated remote definitions and appends
//! scanned record batches to them through the Arrow appender.

mod ddl;

use std::path::Path;

use airport_registry::TableDescriptor;
use airport_schema::TranslatedTable;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use duckdb::{Connection, Result as DuckResult};
use thiserror::Error;
use tracing::{debug, info};

pub use ddl::{column_type, create_table_statements, qualified_name, quote_identifier, quote_literal};

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

pub struct DuckMirror {
    conn: Connection,
}

impl DuckMirror {
    pub fn open_in_memory() -> DuckResult<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn open(path: impl AsRef<Path>) -> DuckResult<Self> {
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Create `schema.table` locally. An existing table and its rows are kept.
    pub fn create_table(
        &self,
        schema: &str,
        table: &str,
        definition: &TranslatedTable,
        comment: Option<&str>,
    ) -> Result<(), MirrorError> {
        let statements = create_table_statements(schema, table, definition, comment)?;
        for statement in &statements {
            debug!(sql = %statement, "Executing DDL");
            self.conn.execute_batch(statement)?;
        }
        info!(
            schema = %schema,
            table = %table,
            columns = definition.columns.len(),
            "Created mirror table"
        );
        Ok(())
    }

    /// Create the local counterpart of a remote table.
    pub fn mirror_table(&self, descriptor: &TableDescriptor) -> Result<(), MirrorError> {
        self.create_table(
            &descriptor.info.schema,
            &descriptor.info.name,
            &descriptor.table,
            Some(descriptor.info.comment.as_str()),
        )
    }

    /// Append batches to `schema.table`, returning the number of rows
    /// written. Batches still carrying wire-only columns such as the row id
    /// are projected onto `definition` first.
    pub fn append_batches<I>(
        &self,
        schema: &str,
        table: &str,
        definition: &TranslatedTable,
        batches: I,
    ) -> Result<usize, MirrorError>
    where
        I: IntoIterator<Item = RecordBatch>,
    {
        let mut appender = self.conn.appender_to_db(table, schema)?;
        let mut rows = 0;
        for batch in batches {
            let batch = project_onto(batch, definition)?;
            rows += batch.num_rows();
            appender.append_record_batch(batch)?;
        }
        appender.flush()?;
        debug!(schema = %schema, table = %table, rows, "Appended batches");
        Ok(rows)
    }

    pub fn row_count(&self, schema: &str, table: &str) -> DuckResult<u64> {
        let sql = format!("SELECT count(*) FROM {}", qualified_name(schema, table));
        self.conn.query_row(&sql, [], |row| row.get(0))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn project_onto(batch: RecordBatch, definition: &TranslatedTable) -> Result<RecordBatch, MirrorError> {
    if batch.num_columns() == definition.columns.len() {
        return Ok(batch);
    }
    let indices: Vec<usize> = definition.columns.iter().map(|c| c.wire_index).collect();
    if let Some(missing) = indices.iter().find(|&&i| i >= batch.num_columns()) {
        return Err(MirrorError::Unsupported(format!(
            "batch has {} columns, column {} expected",
            batch.num_columns(),
            missing
        )));
    }
    Ok(batch.project(&indices)?)
}
