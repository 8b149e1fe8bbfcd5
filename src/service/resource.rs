//! ResourceService: HTTP verbs as operations on one table, one session per call.

use crate::adapter::body_object;
use crate::config::ResourceModel;
use crate::error::AppError;
use crate::store::{Row, RowStore};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Result of a create-if-absent.
#[derive(Debug)]
pub enum CreateOutcome {
    Created(Value),
    /// An existing row already equals every submitted field; nothing was written.
    Duplicate,
}

pub struct ResourceService {
    model: Arc<ResourceModel>,
    store: Arc<dyn RowStore>,
    page_size: u64,
}

impl ResourceService {
    pub fn new(model: Arc<ResourceModel>, store: Arc<dyn RowStore>, page_size: u32) -> Self {
        ResourceService {
            model,
            store,
            page_size: u64::from(page_size.max(1)),
        }
    }

    pub fn model(&self) -> &ResourceModel {
        &self.model
    }

    fn id_or_404(&self, segment: &str) -> Result<Value, AppError> {
        self.model
            .parse_id(segment)
            .ok_or_else(|| self.not_found(segment))
    }

    fn not_found(&self, segment: &str) -> AppError {
        AppError::NotFound(format!("{} {}", self.model.table_name, segment))
    }

    /// All rows, or one page of them when `page` is given. Pages are 1-indexed.
    pub async fn list(&self, page: Option<&str>) -> Result<Value, AppError> {
        let mut session = self.store.begin().await?;
        let rows = match page {
            None => session.list(&self.model, None, 0).await?,
            Some(p) => {
                let n = parse_page(p)?;
                session
                    .list(&self.model, Some(self.page_size), (n - 1).saturating_mul(self.page_size))
                    .await?
            }
        };
        let items: Vec<Value> = rows.iter().map(|r| self.model.serialize(r)).collect();
        let mut out = Map::new();
        out.insert(self.model.collection_key.clone(), Value::Array(items));
        Ok(Value::Object(out))
    }

    pub async fn read(&self, segment: &str) -> Result<Value, AppError> {
        let id = self.id_or_404(segment)?;
        let mut session = self.store.begin().await?;
        let row = self
            .model
            .lookup(session.as_mut(), &id)
            .await?
            .ok_or_else(|| self.not_found(segment))?;
        Ok(self.model.serialize(&row))
    }

    pub fn meta(&self) -> Value {
        self.model.describe_schema()
    }

    /// Insert unless a row already equals every submitted field.
    pub async fn create(&self, body: Value) -> Result<CreateOutcome, AppError> {
        let body = body_object(body)?;
        self.model.validate_fields(&body)?;
        let mut session = self.store.begin().await?;
        if session.find_matching(&self.model, &body).await?.is_some() {
            tracing::debug!(table = %self.model.table_name, "duplicate create ignored");
            return Ok(CreateOutcome::Duplicate);
        }
        let row = session.insert(&self.model, &body).await?;
        session.commit().await?;
        Ok(CreateOutcome::Created(self.model.serialize(&row)))
    }

    /// Full replace; an absent row is created with the path id.
    pub async fn replace(&self, segment: &str, body: Value) -> Result<Value, AppError> {
        let id = self.id_or_404(segment)?;
        let body = body_object(body)?;
        let mut session = self.store.begin().await?;
        let stored = match self.model.lookup(session.as_mut(), &id).await? {
            Some(mut row) => {
                self.model.apply_full_replace(&mut row, &body, &id)?;
                session
                    .update(&self.model, &id, &row)
                    .await?
                    .ok_or_else(|| self.not_found(segment))?
            }
            None => {
                let mut row = Row::new();
                self.model.apply_full_replace(&mut row, &body, &id)?;
                // Let the database fill defaults for columns the body left out.
                row.retain(|k, v| !v.is_null() || self.model.column(k).map_or(true, |c| !c.has_default));
                session.insert(&self.model, &row).await?
            }
        };
        session.commit().await?;
        Ok(self.model.serialize(&stored))
    }

    /// Partial update of an existing row.
    pub async fn update(&self, segment: &str, body: Value) -> Result<Value, AppError> {
        let id = self.id_or_404(segment)?;
        let body = body_object(body)?;
        let mut session = self.store.begin().await?;
        let mut row = self
            .model
            .lookup(session.as_mut(), &id)
            .await?
            .ok_or_else(|| self.not_found(segment))?;
        let changes = self.model.apply_partial_update(&mut row, &body)?;
        let stored = session
            .update(&self.model, &id, &changes)
            .await?
            .ok_or_else(|| self.not_found(segment))?;
        session.commit().await?;
        Ok(self.model.serialize(&stored))
    }

    /// Remove the row if it exists. Deleting an absent row is not an error.
    pub async fn delete(&self, segment: &str) -> Result<(), AppError> {
        let id = self.id_or_404(segment)?;
        let mut session = self.store.begin().await?;
        if self.model.lookup(session.as_mut(), &id).await?.is_none() {
            return Ok(());
        }
        session.delete(&self.model, &id).await?;
        session.commit().await?;
        Ok(())
    }
}

fn parse_page(p: &str) -> Result<u64, AppError> {
    match p.parse::<u64>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(AppError::BadRequest(format!(
            "page must be a positive integer, got '{}'",
            p
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, Settings};
    use crate::schema::{ReflectedColumn, ReflectedTable};
    use crate::store::MemoryRowStore;
    use serde_json::json;

    fn genre_table() -> ReflectedTable {
        ReflectedTable::new("Genre")
            .column(ReflectedColumn::new("GenreId", "integer").primary_key().with_default())
            .column(ReflectedColumn::new("Name", "character varying(120)"))
    }

    fn service(page_size: u32) -> (MemoryRowStore, ResourceService) {
        let store = MemoryRowStore::new(vec![genre_table()]);
        store
            .seed("Genre", (1..=5).map(|i| json!({"GenreId": i, "Name": format!("Genre {}", i)})))
            .unwrap();
        let registry = resolve(&[genre_table()], &Settings::default()).unwrap();
        let model = registry.by_path("genre").unwrap().clone();
        let svc = ResourceService::new(model, Arc::new(store.clone()), page_size);
        (store, svc)
    }

    #[test]
    fn pages_must_be_positive_integers() {
        assert_eq!(parse_page("3").unwrap(), 3);
        assert!(parse_page("0").is_err());
        assert!(parse_page("-1").is_err());
        assert!(parse_page("two").is_err());
    }

    #[tokio::test]
    async fn pages_are_bounded_and_empty_past_the_end() {
        let (_, svc) = service(2);
        let last = svc.list(Some("3")).await.unwrap();
        assert_eq!(last["resources"], json!([{"GenreId": 5, "Name": "Genre 5"}]));
        let past = svc.list(Some("4")).await.unwrap();
        assert_eq!(past["resources"], json!([]));
        let all = svc.list(None).await.unwrap();
        assert_eq!(all["resources"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn put_on_absent_row_creates_it_with_the_path_id() {
        let (store, svc) = service(20);
        let out = svc.replace("40", json!({"GenreId": 7, "Name": "Bossa"})).await.unwrap();
        assert_eq!(out, json!({"GenreId": 40, "Name": "Bossa"}));
        assert_eq!(store.row_count("Genre"), 6);
    }

    #[tokio::test]
    async fn failed_writes_leave_nothing_behind() {
        let (store, svc) = service(20);
        let err = svc.update("2", json!({"Nope": 1})).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(svc.read("2").await.unwrap()["Name"], json!("Genre 2"));
        assert_eq!(store.row_count("Genre"), 5);
    }

    #[tokio::test]
    async fn bad_ids_are_not_found() {
        let (_, svc) = service(20);
        assert!(matches!(svc.read("abc").await, Err(AppError::NotFound(_))));
        assert!(matches!(svc.delete("abc").await, Err(AppError::NotFound(_))));
        assert!(svc.delete("999").await.is_ok());
    }
}
