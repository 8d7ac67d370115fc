//! Column Bindings
//!
//! A `ColumnMap` binds the nested-set roles (id, parent, depth, bounds,
//! children count, scope) to concrete column names of one table. It is the
//! statically-typed replacement for tag-driven field discovery: the caller
//! populates it once (usually through `NestedSetConfig`) and every SQL
//! statement the store issues is rendered from it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while validating a `ColumnMap`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ColumnMapError {
    #[error("Column binding '{role}' is empty")]
    Empty { role: &'static str },

    #[error("Column binding '{role}' = '{name}' is not a valid SQL identifier")]
    InvalidIdentifier { role: &'static str, name: String },

    #[error("Column '{name}' is bound to both '{first}' and '{second}'")]
    Duplicate {
        name: String,
        first: &'static str,
        second: &'static str,
    },
}

/// Interval bound columns that bulk shifts and aggregates operate on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinateColumn {
    Left,
    Right,
}

/// Table and column names for one nested-set table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub table: String,
    pub id: String,
    pub parent_id: String,
    pub depth: String,
    pub lft: String,
    pub rgt: String,
    pub children_count: String,
    /// Partition column; `None` means the whole table is one forest
    pub scope: Option<String>,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            table: "nodes".to_string(),
            id: "id".to_string(),
            parent_id: "parent_id".to_string(),
            depth: "depth".to_string(),
            lft: "lft".to_string(),
            rgt: "rgt".to_string(),
            children_count: "children_count".to_string(),
            scope: None,
        }
    }
}

impl ColumnMap {
    /// Default bindings with a scope column
    pub fn scoped(scope_column: impl Into<String>) -> Self {
        Self {
            scope: Some(scope_column.into()),
            ..Self::default()
        }
    }

    /// Default bindings on a different table name
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Column name for a coordinate role
    pub fn coordinate(&self, column: CoordinateColumn) -> &str {
        match column {
            CoordinateColumn::Left => &self.lft,
            CoordinateColumn::Right => &self.rgt,
        }
    }

    /// Every column the nested-set algorithm owns, with its role name
    pub fn bound_columns(&self) -> Vec<(&'static str, &str)> {
        let mut columns = vec![
            ("id", self.id.as_str()),
            ("parent_id", self.parent_id.as_str()),
            ("depth", self.depth.as_str()),
            ("lft", self.lft.as_str()),
            ("rgt", self.rgt.as_str()),
            ("children_count", self.children_count.as_str()),
        ];
        if let Some(scope) = &self.scope {
            columns.push(("scope", scope.as_str()));
        }
        columns
    }

    /// Whether `name` is one of the bound columns
    pub fn is_reserved(&self, name: &str) -> bool {
        self.bound_columns()
            .iter()
            .any(|(_, column)| column.eq_ignore_ascii_case(name))
    }

    /// Validate that every binding is a distinct, plain SQL identifier
    ///
    /// Names end up interpolated (quoted) into SQL text, so anything beyond
    /// `[A-Za-z_][A-Za-z0-9_]*` is rejected.
    pub fn validate(&self) -> Result<(), ColumnMapError> {
        check_identifier("table", &self.table)?;

        let columns = self.bound_columns();
        for &(role, name) in &columns {
            check_identifier(role, name)?;
        }

        for (i, &(first, name)) in columns.iter().enumerate() {
            if let Some(&(second, _)) = columns[i + 1..]
                .iter()
                .find(|(_, other)| other.eq_ignore_ascii_case(name))
            {
                return Err(ColumnMapError::Duplicate {
                    name: name.to_string(),
                    first,
                    second,
                });
            }
        }

        Ok(())
    }
}

/// Check that `name` is a plain SQL identifier
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_identifier(role: &'static str, name: &str) -> Result<(), ColumnMapError> {
    if name.is_empty() {
        return Err(ColumnMapError::Empty { role });
    }
    if !is_identifier(name) {
        return Err(ColumnMapError::InvalidIdentifier {
            role,
            name: name.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bindings_are_valid() {
        let columns = ColumnMap::default();
        assert!(columns.validate().is_ok());
        assert_eq!(columns.table, "nodes");
        assert_eq!(columns.coordinate(CoordinateColumn::Left), "lft");
        assert_eq!(columns.coordinate(CoordinateColumn::Right), "rgt");
        assert!(columns.scope.is_none());
    }

    #[test]
    fn test_scoped_bindings() {
        let columns = ColumnMap::scoped("tenant_id").with_table("categories");
        assert!(columns.validate().is_ok());
        assert_eq!(columns.scope.as_deref(), Some("tenant_id"));
        assert_eq!(columns.table, "categories");
        assert!(columns.is_reserved("TENANT_ID"));
        assert!(!columns.is_reserved("title"));
    }

    #[test]
    fn test_rejects_injection_in_identifier() {
        let columns = ColumnMap {
            lft: "lft; DROP TABLE nodes".to_string(),
            ..ColumnMap::default()
        };
        assert!(matches!(
            columns.validate(),
            Err(ColumnMapError::InvalidIdentifier { role: "lft", .. })
        ));
    }

    #[test]
    fn test_rejects_empty_and_duplicate_bindings() {
        let empty = ColumnMap {
            table: String::new(),
            ..ColumnMap::default()
        };
        assert_eq!(
            empty.validate(),
            Err(ColumnMapError::Empty { role: "table" })
        );

        let duplicate = ColumnMap {
            rgt: "LFT".to_string(),
            ..ColumnMap::default()
        };
        assert!(matches!(
            duplicate.validate(),
            Err(ColumnMapError::Duplicate {
                first: "lft",
                second: "rgt",
                ..
            })
        ));
    }

    #[test]
    fn test_identifier_rules() {
        assert!(is_identifier("parent_id"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("\"quoted\""));
    }
}
