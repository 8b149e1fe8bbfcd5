//! Transactional row storage behind the resource services.
//!
//! A [`Session`] is one transaction: reads see its own writes, nothing is visible to other
//! sessions until [`Session::commit`], and dropping a session without committing discards it.

mod memory;
mod postgres;

pub use memory::MemoryRowStore;
pub use postgres::PgRowStore;

use crate::config::ResourceModel;
use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::Value;

/// One row as a flat JSON object, column name to value.
pub type Row = serde_json::Map<String, Value>;

#[async_trait]
pub trait RowStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn Session>, StoreError>;

    /// Cheap liveness check for readiness probes.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait Session: Send {
    /// Point lookup by primary key.
    async fn get(&mut self, model: &ResourceModel, id: &Value) -> Result<Option<Row>, StoreError>;

    /// Rows ordered by primary key.
    async fn list(
        &mut self,
        model: &ResourceModel,
        limit: Option<u64>,
        offset: u64,
    ) -> Result<Vec<Row>, StoreError>;

    /// First row (by primary key) whose columns equal every entry of `filter`; `null` matches NULL.
    async fn find_matching(&mut self, model: &ResourceModel, filter: &Row) -> Result<Option<Row>, StoreError>;

    async fn count(&mut self, model: &ResourceModel) -> Result<u64, StoreError>;

    /// Insert and return the stored row, including server-assigned values.
    async fn insert(&mut self, model: &ResourceModel, values: &Row) -> Result<Row, StoreError>;

    /// Set the given columns (primary key excluded) and return the stored row, or None when absent.
    async fn update(&mut self, model: &ResourceModel, id: &Value, changes: &Row) -> Result<Option<Row>, StoreError>;

    /// Returns whether a row was removed.
    async fn delete(&mut self, model: &ResourceModel, id: &Value) -> Result<bool, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
