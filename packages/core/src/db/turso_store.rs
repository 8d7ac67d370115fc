//! TursoStore - TreeStore Implementation for Turso/libsql Backend
//!
//! This module implements the `TreeStore` trait on top of `DatabaseService`.
//! Every statement is rendered from the store's `ColumnMap`: identifiers are
//! validated up front and double-quoted, values are always bound parameters.
//!
//! # Transactions
//!
//! `begin()` opens a dedicated connection and issues `BEGIN IMMEDIATE`, which
//! takes SQLite's write lock before the first read. Reads that compute
//! coordinates therefore see exactly the rows the later writes apply to.
//! `begin_read()` issues a deferred `BEGIN` instead: in WAL mode its first
//! SELECT pins a snapshot without touching the write lock.
//! Dropping a `TursoTransaction` without `commit()` closes its connection,
//! and SQLite rolls the open transaction back.
//!
//! # Examples
//!
//! ```rust,no_run
//! use nestedset_core::db::{TreeStore, TreeTransaction, TursoStore};
//! use nestedset_core::models::Scope;
//! use nestedset_core::NestedSetConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = TursoStore::open(&NestedSetConfig::new("./data/tree.db")).await?;
//!
//!     let mut tx = store.begin().await?;
//!     let nodes = tx.list_nodes(&Scope::Global).await?;
//!     tx.rollback().await?;
//!
//!     println!("{} nodes", nodes.len());
//!     Ok(())
//! }
//! ```

use crate::config::NestedSetConfig;
use crate::db::database::quote_ident;
use crate::db::node_store::{BoundPredicate, TreeStore, TreeTransaction};
use crate::db::{DatabaseError, DatabaseService};
use crate::models::{ColumnMap, CoordinateColumn, NodeDescriptor, Placement, Scope, ScopeValue};
use async_trait::async_trait;
use libsql::{params_from_iter, Row, Value};
use serde_json::Map;
use std::sync::Arc;

/// Maximum ids bound into one `IN (...)` list
const ID_CHUNK_SIZE: usize = 500;

/// TursoStore implements TreeStore for a libsql database
#[derive(Debug, Clone)]
pub struct TursoStore {
    db: Arc<DatabaseService>,
    columns: Arc<ColumnMap>,
}

impl TursoStore {
    /// Wrap an open database with validated column bindings
    pub fn new(db: Arc<DatabaseService>, columns: ColumnMap) -> Result<Self, DatabaseError> {
        columns.validate().map_err(|e| {
            DatabaseError::initialization_failed(format!("Invalid column bindings: {}", e))
        })?;
        Ok(Self {
            db,
            columns: Arc::new(columns),
        })
    }

    /// Open the database described by `config` and bind its columns
    pub async fn open(config: &NestedSetConfig) -> Result<Self, DatabaseError> {
        let db = DatabaseService::new(config).await?;
        Self::new(Arc::new(db), config.columns.clone())
    }

    pub fn database(&self) -> &Arc<DatabaseService> {
        &self.db
    }
}

#[async_trait]
impl TreeStore for TursoStore {
    type Transaction = TursoTransaction;

    fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    async fn begin(&self) -> Result<TursoTransaction, DatabaseError> {
        self.open_transaction("BEGIN IMMEDIATE").await
    }

    async fn begin_read(&self) -> Result<TursoTransaction, DatabaseError> {
        self.open_transaction("BEGIN").await
    }
}

impl TursoStore {
    async fn open_transaction(&self, statement: &str) -> Result<TursoTransaction, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        conn.execute(statement, ()).await.map_err(|e| {
            DatabaseError::transaction_failed(format!("Failed to begin transaction: {}", e))
        })?;

        Ok(TursoTransaction {
            conn,
            columns: self.columns.clone(),
            finished: false,
        })
    }
}

/// WHERE clause under construction with its bound values
struct Filter {
    conditions: Vec<String>,
    params: Vec<Value>,
}

impl Filter {
    fn scoped(columns: &ColumnMap, scope: &Scope) -> Result<Self, DatabaseError> {
        let mut filter = Filter {
            conditions: Vec::new(),
            params: Vec::new(),
        };
        match (scope, &columns.scope) {
            (Scope::Global, None) => {}
            (Scope::Keyed(value), Some(column)) => {
                filter.push(format!("{} = ?", quote_ident(column)), scope_value(value));
            }
            (Scope::Global, Some(column)) => {
                return Err(DatabaseError::sql_execution(format!(
                    "Scope column '{}' requires a scope value",
                    column
                )))
            }
            (Scope::Keyed(value), None) => {
                return Err(DatabaseError::sql_execution(format!(
                    "Scope {} given but table '{}' has no scope column",
                    value, columns.table
                )))
            }
        }
        Ok(filter)
    }

    fn push(&mut self, condition: String, value: Value) {
        self.conditions.push(condition);
        self.params.push(value);
    }

    fn render(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }
}

fn scope_value(value: &ScopeValue) -> Value {
    match value {
        ScopeValue::Integer(v) => Value::Integer(*v),
        ScopeValue::Text(v) => Value::Text(v.clone()),
    }
}

fn json_to_value(column: &str, value: &serde_json::Value) -> Result<Value, DatabaseError> {
    Ok(match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Integer(i64::from(*b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Real(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::Text(s.clone()),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
            return Err(DatabaseError::sql_execution(format!(
                "Attribute '{}' is not a scalar value",
                column
            )))
        }
    })
}

/// Open write transaction on a dedicated connection
pub struct TursoTransaction {
    conn: libsql::Connection,
    columns: Arc<ColumnMap>,
    finished: bool,
}

impl TursoTransaction {
    fn table(&self) -> String {
        quote_ident(&self.columns.table)
    }

    fn col(&self, name: &str) -> String {
        quote_ident(name)
    }

    fn select_list(&self) -> String {
        let c = &self.columns;
        [
            &c.id,
            &c.parent_id,
            &c.depth,
            &c.lft,
            &c.rgt,
            &c.children_count,
        ]
        .iter()
        .map(|name| quote_ident(name))
        .collect::<Vec<_>>()
        .join(", ")
    }

    /// Convert a row produced by `select_list()` into a descriptor
    fn row_to_node(row: &Row, scope: &Scope) -> Result<NodeDescriptor, DatabaseError> {
        let get = |idx: i32, name: &str| -> Result<i64, DatabaseError> {
            row.get::<i64>(idx)
                .map_err(|e| DatabaseError::invalid_row(format!("Failed to get {}: {}", name, e)))
        };

        Ok(NodeDescriptor {
            id: get(0, "id")?,
            parent_id: row.get::<Option<i64>>(1).map_err(|e| {
                DatabaseError::invalid_row(format!("Failed to get parent_id: {}", e))
            })?,
            depth: get(2, "depth")?,
            lft: get(3, "lft")?,
            rgt: get(4, "rgt")?,
            children_count: get(5, "children_count")?,
            scope: scope.clone(),
        })
    }

    async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<u64, DatabaseError> {
        self.conn
            .execute(sql, params_from_iter(params))
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("{}: {}", sql, e)))
    }

    async fn query_nodes(
        &self,
        sql: &str,
        params: Vec<Value>,
        scope: &Scope,
    ) -> Result<Vec<NodeDescriptor>, DatabaseError> {
        let mut rows = self
            .conn
            .query(sql, params_from_iter(params))
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("{}: {}", sql, e)))?;

        let mut nodes = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            nodes.push(Self::row_to_node(&row, scope)?);
        }
        Ok(nodes)
    }

    async fn query_optional_i64(
        &self,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Option<i64>, DatabaseError> {
        let mut rows = self
            .conn
            .query(sql, params_from_iter(params))
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("{}: {}", sql, e)))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            Some(row) => row
                .get::<Option<i64>>(0)
                .map_err(|e| DatabaseError::invalid_row(e.to_string())),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl TreeTransaction for TursoTransaction {
    async fn fetch_node(
        &mut self,
        scope: &Scope,
        id: i64,
    ) -> Result<Option<NodeDescriptor>, DatabaseError> {
        let mut filter = Filter::scoped(&self.columns, scope)?;
        filter.push(format!("{} = ?", self.col(&self.columns.id)), Value::Integer(id));

        let sql = format!(
            "SELECT {} FROM {}{}",
            self.select_list(),
            self.table(),
            filter.render()
        );
        Ok(self
            .query_nodes(&sql, filter.params, scope)
            .await?
            .into_iter()
            .next())
    }

    async fn read_max(
        &mut self,
        scope: &Scope,
        column: CoordinateColumn,
    ) -> Result<Option<i64>, DatabaseError> {
        let filter = Filter::scoped(&self.columns, scope)?;
        let sql = format!(
            "SELECT MAX({}) FROM {}{}",
            self.col(self.columns.coordinate(column)),
            self.table(),
            filter.render()
        );
        self.query_optional_i64(&sql, filter.params).await
    }

    async fn conditional_shift(
        &mut self,
        scope: &Scope,
        column: CoordinateColumn,
        predicate: BoundPredicate,
        step: i64,
    ) -> Result<u64, DatabaseError> {
        let name = self.col(self.columns.coordinate(column));
        let mut filter = Filter::scoped(&self.columns, scope)?;
        match predicate {
            BoundPredicate::AtLeast(k) => filter.push(format!("{} >= ?", name), Value::Integer(k)),
            BoundPredicate::GreaterThan(k) => {
                filter.push(format!("{} > ?", name), Value::Integer(k))
            }
            BoundPredicate::Between(lo, hi) => {
                filter.push(format!("{} >= ?", name), Value::Integer(lo));
                filter.push(format!("{} <= ?", name), Value::Integer(hi));
            }
        }

        let sql = format!(
            "UPDATE {} SET {} = {} + ?{}",
            self.table(),
            name,
            name,
            filter.render()
        );
        let mut params = vec![Value::Integer(step)];
        params.extend(filter.params);
        self.execute(&sql, params).await
    }

    async fn subtree_ids(
        &mut self,
        scope: &Scope,
        lft: i64,
        rgt: i64,
    ) -> Result<Vec<i64>, DatabaseError> {
        let mut filter = Filter::scoped(&self.columns, scope)?;
        filter.push(format!("{} >= ?", self.col(&self.columns.lft)), Value::Integer(lft));
        filter.push(format!("{} <= ?", self.col(&self.columns.rgt)), Value::Integer(rgt));

        let sql = format!(
            "SELECT {} FROM {}{}",
            self.col(&self.columns.id),
            self.table(),
            filter.render()
        );
        let mut rows = self
            .conn
            .query(&sql, params_from_iter(filter.params))
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("{}: {}", sql, e)))?;

        let mut ids = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            ids.push(
                row.get::<i64>(0)
                    .map_err(|e| DatabaseError::invalid_row(e.to_string()))?,
            );
        }
        Ok(ids)
    }

    async fn offset_nodes(
        &mut self,
        scope: &Scope,
        ids: &[i64],
        step: i64,
        depth_change: i64,
    ) -> Result<u64, DatabaseError> {
        let (lft, rgt, depth) = (
            self.col(&self.columns.lft),
            self.col(&self.columns.rgt),
            self.col(&self.columns.depth),
        );

        let mut affected = 0;
        for chunk in ids.chunks(ID_CHUNK_SIZE) {
            let mut filter = Filter::scoped(&self.columns, scope)?;
            let placeholders = vec!["?"; chunk.len()].join(", ");
            filter.conditions.push(format!(
                "{} IN ({})",
                self.col(&self.columns.id),
                placeholders
            ));
            filter
                .params
                .extend(chunk.iter().map(|id| Value::Integer(*id)));

            let sql = format!(
                "UPDATE {} SET {} = {} + ?, {} = {} + ?, {} = {} + ?{}",
                self.table(),
                lft,
                lft,
                rgt,
                rgt,
                depth,
                depth,
                filter.render()
            );
            let mut params = vec![
                Value::Integer(step),
                Value::Integer(step),
                Value::Integer(depth_change),
            ];
            params.extend(filter.params);
            affected += self.execute(&sql, params).await?;
        }
        Ok(affected)
    }

    async fn set_parent(
        &mut self,
        scope: &Scope,
        id: i64,
        parent_id: Option<i64>,
    ) -> Result<u64, DatabaseError> {
        let mut filter = Filter::scoped(&self.columns, scope)?;
        filter.push(format!("{} = ?", self.col(&self.columns.id)), Value::Integer(id));

        let sql = format!(
            "UPDATE {} SET {} = ?{}",
            self.table(),
            self.col(&self.columns.parent_id),
            filter.render()
        );
        let mut params = vec![parent_id.map_or(Value::Null, Value::Integer)];
        params.extend(filter.params);
        self.execute(&sql, params).await
    }

    async fn count_children(
        &mut self,
        scope: &Scope,
        parent_id: i64,
    ) -> Result<i64, DatabaseError> {
        let mut filter = Filter::scoped(&self.columns, scope)?;
        filter.push(
            format!("{} = ?", self.col(&self.columns.parent_id)),
            Value::Integer(parent_id),
        );

        let sql = format!("SELECT COUNT(*) FROM {}{}", self.table(), filter.render());
        Ok(self
            .query_optional_i64(&sql, filter.params)
            .await?
            .unwrap_or(0))
    }

    async fn set_children_count(
        &mut self,
        scope: &Scope,
        id: i64,
        count: i64,
    ) -> Result<u64, DatabaseError> {
        let mut filter = Filter::scoped(&self.columns, scope)?;
        filter.push(format!("{} = ?", self.col(&self.columns.id)), Value::Integer(id));

        let sql = format!(
            "UPDATE {} SET {} = ?{}",
            self.table(),
            self.col(&self.columns.children_count),
            filter.render()
        );
        let mut params = vec![Value::Integer(count)];
        params.extend(filter.params);
        self.execute(&sql, params).await
    }

    async fn increment_children_count(
        &mut self,
        scope: &Scope,
        id: i64,
        by: i64,
    ) -> Result<u64, DatabaseError> {
        let name = self.col(&self.columns.children_count);
        let mut filter = Filter::scoped(&self.columns, scope)?;
        filter.push(format!("{} = ?", self.col(&self.columns.id)), Value::Integer(id));

        let sql = format!(
            "UPDATE {} SET {} = {} + ?{}",
            self.table(),
            name,
            name,
            filter.render()
        );
        let mut params = vec![Value::Integer(by)];
        params.extend(filter.params);
        self.execute(&sql, params).await
    }

    async fn insert_node(
        &mut self,
        scope: &Scope,
        placement: &Placement,
        attributes: &Map<String, serde_json::Value>,
    ) -> Result<i64, DatabaseError> {
        let c = self.columns.clone();
        let mut names = Vec::new();
        let mut values = Vec::new();

        if let Some(id) = placement.id {
            names.push(quote_ident(&c.id));
            values.push(Value::Integer(id));
        }
        names.push(quote_ident(&c.parent_id));
        values.push(placement.parent_id.map_or(Value::Null, Value::Integer));
        names.push(quote_ident(&c.depth));
        values.push(Value::Integer(placement.depth));
        names.push(quote_ident(&c.lft));
        values.push(Value::Integer(placement.lft));
        names.push(quote_ident(&c.rgt));
        values.push(Value::Integer(placement.rgt));
        names.push(quote_ident(&c.children_count));
        values.push(Value::Integer(0));

        match (scope, &c.scope) {
            (Scope::Keyed(value), Some(column)) => {
                names.push(quote_ident(column));
                values.push(scope_value(value));
            }
            (Scope::Global, None) => {}
            _ => {
                return Err(DatabaseError::sql_execution(format!(
                    "Scope {} does not match the scope binding of table '{}'",
                    scope, c.table
                )))
            }
        }

        for (column, value) in attributes {
            names.push(quote_ident(column));
            values.push(json_to_value(column, value)?);
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table(),
            names.join(", "),
            vec!["?"; values.len()].join(", ")
        );
        self.execute(&sql, values).await?;

        Ok(match placement.id {
            Some(id) => id,
            None => self.conn.last_insert_rowid(),
        })
    }

    async fn list_nodes(&mut self, scope: &Scope) -> Result<Vec<NodeDescriptor>, DatabaseError> {
        let filter = Filter::scoped(&self.columns, scope)?;
        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY {}, {}",
            self.select_list(),
            self.table(),
            filter.render(),
            self.col(&self.columns.lft),
            self.col(&self.columns.id)
        );
        self.query_nodes(&sql, filter.params, scope).await
    }

    async fn commit(mut self) -> Result<(), DatabaseError> {
        self.finished = true;
        if let Err(e) = self.conn.execute("COMMIT", ()).await {
            if let Err(rollback_err) = self.conn.execute("ROLLBACK", ()).await {
                tracing::warn!(
                    "Rollback after failed commit on '{}' also failed: {}",
                    self.columns.table,
                    rollback_err
                );
            }
            return Err(DatabaseError::transaction_failed(format!(
                "Failed to commit transaction: {}",
                e
            )));
        }
        Ok(())
    }

    async fn rollback(mut self) -> Result<(), DatabaseError> {
        self.finished = true;
        self.conn.execute("ROLLBACK", ()).await.map_err(|e| {
            DatabaseError::transaction_failed(format!("Failed to roll back transaction: {}", e))
        })?;
        Ok(())
    }
}

impl Drop for TursoTransaction {
    fn drop(&mut self) {
        if !self.finished {
            // Closing the connection rolls the open transaction back
            tracing::debug!(
                "Transaction on '{}' dropped without commit; discarding writes",
                self.columns.table
            );
        }
    }
}
