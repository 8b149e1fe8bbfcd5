//! Reflect ordinary and partitioned tables of one PostgreSQL schema from pg_catalog.

use crate::error::ConfigError;
use crate::schema::types::{ReflectedColumn, ReflectedTable, SchemaSource};
use async_trait::async_trait;
use sqlx::PgPool;

const REFLECT_SQL: &str = r#"
    SELECT c.relname::text,
           a.attname::text,
           format_type(a.atttypid, a.atttypmod),
           NOT a.attnotnull,
           (a.atthasdef OR a.attidentity <> ''),
           COALESCE(a.attnum = ANY(i.indkey), false)
    FROM pg_catalog.pg_class c
    JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
    JOIN pg_catalog.pg_attribute a ON a.attrelid = c.oid AND a.attnum > 0 AND NOT a.attisdropped
    LEFT JOIN pg_catalog.pg_index i ON i.indrelid = c.oid AND i.indisprimary
    WHERE n.nspname = $1 AND c.relkind IN ('r', 'p')
    ORDER BY c.relname, a.attnum
"#;

pub struct PgSchemaSource {
    pool: PgPool,
    schema: String,
}

impl PgSchemaSource {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        PgSchemaSource {
            pool,
            schema: schema.into(),
        }
    }
}

#[async_trait]
impl SchemaSource for PgSchemaSource {
    async fn tables(&self) -> Result<Vec<ReflectedTable>, ConfigError> {
        tracing::debug!(sql = %REFLECT_SQL, schema = %self.schema, "reflect");
        let rows = sqlx::query_as::<_, (String, String, String, bool, bool, bool)>(REFLECT_SQL)
            .bind(&self.schema)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        let mut tables: Vec<ReflectedTable> = Vec::new();
        for (table, name, data_type, nullable, has_default, primary_key) in rows {
            let column = ReflectedColumn {
                name,
                data_type,
                nullable,
                has_default,
                primary_key,
            };
            match tables.last_mut() {
                Some(t) if t.name == table => t.columns.push(column),
                _ => tables.push(ReflectedTable {
                    name: table,
                    columns: vec![column],
                }),
            }
        }
        tracing::debug!(schema = %self.schema, count = tables.len(), "reflected tables");
        Ok(tables)
    }
}
