//! LanceDB connection and table helpers.

use anyhow::Result;
use arrow_array::{RecordBatch, RecordBatchIterator};
use arrow_schema::Schema;
use lancedb::database::CreateTableMode;
use lancedb::table::Table;
use lancedb::{connect, Connection};
use std::sync::Arc;

pub async fn open_db(uri: &str) -> Result<Connection> {
	Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
	Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

pub async fn open_if_exists(conn: &Connection, name: &str) -> Result<Option<Table>> {
	if !table_exists(conn, name).await? { return Ok(None); }
	Ok(Some(conn.open_table(name).execute().await?))
}

/// Create the table with zero rows unless it already exists.
pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<Schema>) -> Result<Table> {
	if let Some(table) = open_if_exists(conn, name).await? { return Ok(table); }
	let iter = RecordBatchIterator::new(vec![Ok(RecordBatch::new_empty(schema.clone()))].into_iter(), schema);
	Ok(conn.create_table(name, Box::new(iter)).execute().await?)
}

/// Write `batch` as the table's whole content in one new version.
pub async fn replace_table(conn: &Connection, name: &str, batch: RecordBatch) -> Result<Table> {
	let schema = batch.schema();
	let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
	Ok(conn.create_table(name, reader).mode(CreateTableMode::Overwrite).execute().await?)
}

pub async fn row_count(conn: &Connection, name: &str) -> Result<usize> {
	match open_if_exists(conn, name).await? {
		Some(table) => Ok(table.count_rows(None).await?),
		None => Ok(0),
	}
}
