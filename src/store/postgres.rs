//! PostgreSQL row store: one sqlx transaction per session.

use crate::config::ResourceModel;
use crate::error::StoreError;
use crate::sql::{self, bind_text, QueryBuf};
use crate::store::{Row, RowStore, Session};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};

#[derive(Clone)]
pub struct PgRowStore {
    pool: PgPool,
    schema: String,
}

impl PgRowStore {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        PgRowStore {
            pool,
            schema: schema.into(),
        }
    }

    pub async fn connect(database_url: &str, max_connections: u32, schema: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool, schema))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RowStore for PgRowStore {
    async fn begin(&self) -> Result<Box<dyn Session>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgSession {
            tx,
            schema: self.schema.clone(),
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }
}

/// Uncommitted transactions roll back when the session is dropped.
struct PgSession {
    tx: Transaction<'static, Postgres>,
    schema: String,
}

impl PgSession {
    async fn fetch_rows(&mut self, q: &QueryBuf) -> Result<Vec<Row>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, Value>(&q.sql);
        for p in &q.params {
            query = query.bind(bind_text(p));
        }
        let rows = query.fetch_all(&mut *self.tx).await.map_err(classify)?;
        Ok(rows.into_iter().filter_map(into_row).collect())
    }

    async fn fetch_row(&mut self, q: &QueryBuf) -> Result<Option<Row>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, Value>(&q.sql);
        for p in &q.params {
            query = query.bind(bind_text(p));
        }
        let row = query.fetch_optional(&mut *self.tx).await.map_err(classify)?;
        Ok(row.and_then(into_row))
    }

    async fn execute(&mut self, q: &QueryBuf) -> Result<u64, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(bind_text(p));
        }
        let done = query.execute(&mut *self.tx).await.map_err(classify)?;
        Ok(done.rows_affected())
    }
}

#[async_trait]
impl Session for PgSession {
    async fn get(&mut self, model: &ResourceModel, id: &Value) -> Result<Option<Row>, StoreError> {
        let q = sql::select_by_id(model, &self.schema, id);
        self.fetch_row(&q).await
    }

    async fn list(&mut self, model: &ResourceModel, limit: Option<u64>, offset: u64) -> Result<Vec<Row>, StoreError> {
        let q = sql::select_page(model, &self.schema, limit, offset);
        self.fetch_rows(&q).await
    }

    async fn find_matching(&mut self, model: &ResourceModel, filter: &Row) -> Result<Option<Row>, StoreError> {
        let q = sql::select_matching(model, &self.schema, filter);
        self.fetch_row(&q).await
    }

    async fn count(&mut self, model: &ResourceModel) -> Result<u64, StoreError> {
        let q = sql::count(model, &self.schema);
        tracing::debug!(sql = %q.sql, "query");
        let n: i64 = sqlx::query_scalar(&q.sql)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(classify)?;
        Ok(n.max(0) as u64)
    }

    async fn insert(&mut self, model: &ResourceModel, values: &Row) -> Result<Row, StoreError> {
        let q = sql::insert(model, &self.schema, values);
        self.fetch_row(&q)
            .await?
            .ok_or_else(|| StoreError::Backend(format!("insert into {} returned no row", model.table_name)))
    }

    async fn update(&mut self, model: &ResourceModel, id: &Value, changes: &Row) -> Result<Option<Row>, StoreError> {
        let q = sql::update(model, &self.schema, id, changes);
        self.fetch_row(&q).await
    }

    async fn delete(&mut self, model: &ResourceModel, id: &Value) -> Result<bool, StoreError> {
        let q = sql::delete(model, &self.schema, id);
        Ok(self.execute(&q).await? > 0)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}

fn into_row(v: Value) -> Option<Row> {
    match v {
        Value::Object(m) => Some(m),
        _ => None,
    }
}

/// Integrity (class 23) and data exceptions (class 22) are the client's fault.
fn is_client_error(sqlstate: &str) -> bool {
    sqlstate.starts_with("23") || sqlstate.starts_with("22")
}

/// Client errors keep the server text; everything else stays opaque.
fn classify(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().map_or(false, |c| is_client_error(&c)) {
            return StoreError::Constraint(db.message().to_string());
        }
    }
    StoreError::Db(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_and_data_errors_belong_to_the_client() {
        assert!(is_client_error("23505"));
        assert!(is_client_error("23502"));
        assert!(is_client_error("22P02"));
        assert!(!is_client_error("08006"));
        assert!(!is_client_error("42P01"));
    }

    #[test]
    fn non_database_errors_stay_opaque() {
        assert!(matches!(classify(sqlx::Error::RowNotFound), StoreError::Db(_)));
        assert!(matches!(classify(sqlx::Error::PoolTimedOut), StoreError::Db(_)));
    }
}
