//! Row-level operations on a resource model: serialization, schema description, update rules.

use crate::config::{PkType, ResourceModel};
use crate::error::AppError;
use crate::store::{Row, Session};
use serde_json::{Map, Value};

impl ResourceModel {
    /// Every declared column; columns missing from the row serialize as null.
    pub fn serialize(&self, row: &Row) -> Value {
        let mut out = Map::new();
        for c in &self.columns {
            out.insert(c.name.clone(), row.get(&c.name).cloned().unwrap_or(Value::Null));
        }
        Value::Object(out)
    }

    /// `{TableName: {column: type tag}}`.
    pub fn describe_schema(&self) -> Value {
        let columns: Map<String, Value> = self
            .columns
            .iter()
            .map(|c| (c.name.clone(), Value::String(c.kind.as_str().to_string())))
            .collect();
        let mut out = Map::new();
        out.insert(self.table_name.clone(), Value::Object(columns));
        Value::Object(out)
    }

    /// Reject keys that are not declared columns.
    pub fn validate_fields(&self, body: &Row) -> Result<(), AppError> {
        let unknown: Vec<&str> = body
            .keys()
            .filter(|k| self.column(k).is_none())
            .map(String::as_str)
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(AppError::BadRequest(format!(
                "unknown field(s) for {}: {}",
                self.table_name,
                unknown.join(", ")
            )))
        }
    }

    /// Set only the keys present in `body`, leaving the primary key alone.
    /// Returns the assignments that were applied.
    pub fn apply_partial_update(&self, row: &mut Row, body: &Row) -> Result<Row, AppError> {
        self.validate_fields(body)?;
        let mut applied = Row::new();
        for (k, v) in body {
            if *k == self.pk_column {
                continue;
            }
            row.insert(k.clone(), v.clone());
            applied.insert(k.clone(), v.clone());
        }
        Ok(applied)
    }

    /// Set every declared column from `body` (absent means null). The key always comes from `id`.
    pub fn apply_full_replace(&self, row: &mut Row, body: &Row, id: &Value) -> Result<(), AppError> {
        self.validate_fields(body)?;
        for c in &self.columns {
            let v = if c.is_pk {
                id.clone()
            } else {
                body.get(&c.name).cloned().unwrap_or(Value::Null)
            };
            row.insert(c.name.clone(), v);
        }
        Ok(())
    }

    pub async fn lookup(&self, session: &mut dyn Session, id: &Value) -> Result<Option<Row>, AppError> {
        Ok(session.get(self, id).await?)
    }

    /// Convert a path segment to the key's JSON type. None when it cannot be one.
    pub fn parse_id(&self, segment: &str) -> Option<Value> {
        match self.pk_type {
            PkType::Integer => segment.parse::<i64>().ok().map(|n| Value::Number(n.into())),
            PkType::Uuid => uuid::Uuid::parse_str(segment)
                .ok()
                .map(|u| Value::String(u.to_string())),
            PkType::Text => Some(Value::String(segment.to_string())),
        }
    }
}

/// Request bodies must be JSON objects.
pub fn body_object(body: Value) -> Result<Row, AppError> {
    match body {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, Settings};
    use crate::schema::{ReflectedColumn, ReflectedTable};
    use serde_json::json;

    fn album() -> ResourceModel {
        let tables = vec![ReflectedTable::new("Album")
            .column(ReflectedColumn::new("AlbumId", "integer").primary_key().with_default())
            .column(ReflectedColumn::new("Title", "character varying(160)").not_null())
            .column(ReflectedColumn::new("ArtistId", "integer").not_null())
            .column(ReflectedColumn::new("Released", "date"))
            .column(ReflectedColumn::new("Cover", "bytea"))];
        let registry = resolve(&tables, &Settings::default()).unwrap();
        registry.by_path("album").unwrap().as_ref().clone()
    }

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn serialize_fills_missing_columns_with_null() {
        let out = album().serialize(&row(json!({"AlbumId": 1, "Title": "Let There Be Rock"})));
        assert_eq!(
            out,
            json!({"AlbumId": 1, "Title": "Let There Be Rock", "ArtistId": null, "Released": null, "Cover": null})
        );
    }

    #[test]
    fn schema_description_uses_coarse_tags() {
        assert_eq!(
            album().describe_schema(),
            json!({"Album": {
                "AlbumId": "integer",
                "Title": "string",
                "ArtistId": "integer",
                "Released": "datetime",
                "Cover": "binary"
            }})
        );
    }

    #[test]
    fn partial_update_ignores_the_key() {
        let model = album();
        let mut r = row(json!({"AlbumId": 1, "Title": "Old", "ArtistId": 1}));
        let applied = model
            .apply_partial_update(&mut r, &row(json!({"AlbumId": 9, "Title": "New"})))
            .unwrap();
        assert_eq!(applied, row(json!({"Title": "New"})));
        assert_eq!(r["AlbumId"], json!(1));
        assert_eq!(r["Title"], json!("New"));
        assert_eq!(r["ArtistId"], json!(1));
    }

    #[test]
    fn unknown_fields_are_rejected_by_name() {
        let model = album();
        let mut r = Row::new();
        let err = model
            .apply_partial_update(&mut r, &row(json!({"Colour": "red", "Title": "x"})))
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(m) if m.contains("Colour")));
        assert!(r.is_empty());
    }

    #[test]
    fn full_replace_nulls_absent_columns_and_keeps_the_path_id() {
        let model = album();
        let mut r = row(json!({"AlbumId": 4, "Title": "Old", "ArtistId": 2, "Released": "1977-03-21"}));
        model
            .apply_full_replace(&mut r, &row(json!({"AlbumId": 99, "Title": "New", "ArtistId": 3})), &json!(4))
            .unwrap();
        assert_eq!(r["AlbumId"], json!(4));
        assert_eq!(r["Title"], json!("New"));
        assert_eq!(r["Released"], Value::Null);
        assert_eq!(r["Cover"], Value::Null);
    }

    #[test]
    fn ids_parse_by_key_type() {
        let model = album();
        assert_eq!(model.parse_id("42"), Some(json!(42)));
        assert_eq!(model.parse_id("forty-two"), None);

        let mut text = model.clone();
        text.pk_type = PkType::Text;
        assert_eq!(text.parse_id("AC-DC"), Some(json!("AC-DC")));

        let mut keyed = model;
        keyed.pk_type = PkType::Uuid;
        assert_eq!(
            keyed.parse_id("6F9619FF-8B86-D011-B42D-00CF4FC964FF"),
            Some(json!("6f9619ff-8b86-d011-b42d-00cf4fc964ff"))
        );
        assert_eq!(keyed.parse_id("12"), None);
    }

    #[test]
    fn bodies_must_be_objects() {
        assert!(body_object(json!([1, 2])).is_err());
        assert!(body_object(json!({"a": 1})).is_ok());
    }
}
