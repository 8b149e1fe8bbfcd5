//! Reflected schema shapes, independent of the database they came from.

use crate::error::ConfigError;
use async_trait::async_trait;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReflectedColumn {
    pub name: String,
    /// Database type as the catalog spells it (e.g. "integer", "character varying(120)").
    pub data_type: String,
    pub nullable: bool,
    /// Column has a server-side default (sequence, identity, expression).
    pub has_default: bool,
    pub primary_key: bool,
}

impl ReflectedColumn {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        ReflectedColumn {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            has_default: false,
            primary_key: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReflectedTable {
    pub name: String,
    /// In declaration order.
    pub columns: Vec<ReflectedColumn>,
}

impl ReflectedTable {
    pub fn new(name: impl Into<String>) -> Self {
        ReflectedTable {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, column: ReflectedColumn) -> Self {
        self.columns.push(column);
        self
    }

    pub fn primary_key(&self) -> Vec<&ReflectedColumn> {
        self.columns.iter().filter(|c| c.primary_key).collect()
    }
}

/// Anything that can enumerate the tables of a database.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    async fn tables(&self) -> Result<Vec<ReflectedTable>, ConfigError>;
}

#[async_trait]
impl SchemaSource for Vec<ReflectedTable> {
    async fn tables(&self) -> Result<Vec<ReflectedTable>, ConfigError> {
        Ok(self.clone())
    }
}
