//! Database layer

pub mod sqlite;

use crate::error::{AppError, Result};
use sqlite::SqliteDb;
use std::sync::Arc;

/// Run blocking database work off the async runtime
pub async fn with_db<T, F>(db: &Arc<SqliteDb>, f: F) -> Result<T>
where
    F: FnOnce(&SqliteDb) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = Arc::clone(db);
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| AppError::Internal(format!("Database task failed: {}", e)))?
}
