//! Database Connection Management
//!
//! This module provides the database connection and table bootstrap
//! functionality using libsql/Turso.
//!
//! # Architecture
//!
//! - **Path-agnostic**: Accepts any valid PathBuf
//! - **WAL mode**: Write-Ahead Logging so readers never block the writer
//! - **Busy timeout**: Every connection waits for the write lock instead of
//!   failing immediately with `SQLITE_BUSY`
//! - **Bootstrap only**: `CREATE TABLE IF NOT EXISTS`, never ALTER
//!
//! # Database Connection Patterns
//!
//! **ALWAYS use `connect_with_timeout()` in async functions.** Tree
//! operations hold a write transaction across several statements; a
//! connection without busy timeout fails the moment another writer holds
//! the lock.
//!
//! ```no_run
//! # use nestedset_core::db::DatabaseService;
//! # use nestedset_core::NestedSetConfig;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db_service = DatabaseService::new(&NestedSetConfig::new("./data/tree.db")).await?;
//! let conn = db_service.connect_with_timeout().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::NestedSetConfig;
use crate::db::error::DatabaseError;
use crate::models::ColumnMap;
use libsql::{Builder, Database};
use std::path::PathBuf;
use std::sync::Arc;

/// Quote a validated identifier for interpolation into SQL text
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name)
}

/// Database service for managing libsql connections and the tree table
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database handle (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,

    busy_timeout_ms: u64,
}

impl DatabaseService {
    /// Open (or create) the database described by `config`
    ///
    /// This will:
    /// 1. Ensure the parent directory exists (create if needed)
    /// 2. Open/create the database file
    /// 3. Enable WAL mode and the busy timeout
    /// 4. Bootstrap the bound table when `config.create_table` is set
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if:
    /// - Parent directory cannot be created
    /// - Database connection fails
    /// - Table bootstrap fails
    pub async fn new(config: &NestedSetConfig) -> Result<Self, DatabaseError> {
        let db_path = config.database_path.clone();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
            busy_timeout_ms: config.busy_timeout_ms,
        };

        let conn = service.connect_with_timeout().await?;
        service
            .execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;

        if config.create_table {
            service
                .ensure_table(&conn, &config.columns, &config.payload_columns)
                .await?;
        }

        tracing::debug!(
            "Opened nested-set database at {} (table '{}')",
            service.db_path.display(),
            config.columns.table
        );

        Ok(service)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements return rows, so we must use query() instead of execute().
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Create the nested-set table if it does not exist yet
    ///
    /// Coordinate columns are `INTEGER`; the scope column and payload columns
    /// are declared without a type so they keep whatever value type the
    /// caller binds.
    async fn ensure_table(
        &self,
        conn: &libsql::Connection,
        columns: &ColumnMap,
        payload_columns: &[String],
    ) -> Result<(), DatabaseError> {
        let mut definitions = vec![
            format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", quote_ident(&columns.id)),
            format!("{} INTEGER", quote_ident(&columns.parent_id)),
            format!("{} INTEGER NOT NULL DEFAULT 0", quote_ident(&columns.depth)),
            format!("{} INTEGER NOT NULL", quote_ident(&columns.lft)),
            format!("{} INTEGER NOT NULL", quote_ident(&columns.rgt)),
            format!(
                "{} INTEGER NOT NULL DEFAULT 0",
                quote_ident(&columns.children_count)
            ),
        ];
        if let Some(scope) = &columns.scope {
            definitions.push(quote_ident(scope));
        }
        definitions.extend(payload_columns.iter().map(|c| quote_ident(c)));

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(&columns.table),
            definitions.join(", ")
        );

        conn.execute(&sql, ()).await.map_err(|e| {
            DatabaseError::initialization_failed(format!(
                "Failed to create table '{}': {}",
                columns.table, e
            ))
        })?;

        Ok(())
    }

    /// Get a connection without busy timeout
    ///
    /// Only for single-statement reads; use `connect_with_timeout()` for
    /// anything that writes.
    pub fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::LibsqlError)
    }

    /// Get a connection with the configured busy timeout
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.connect()?;
        self.execute_pragma(
            &conn,
            &format!("PRAGMA busy_timeout = {}", self.busy_timeout_ms),
        )
        .await?;
        Ok(conn)
    }
}
