//! Resolved resource models: reflection plus settings, flattened for runtime use.

use crate::error::ConfigError;
use std::collections::HashMap;
use std::sync::Arc;

const INTEGER_TYPES: &[&str] = &["smallint", "integer", "bigint", "int", "int2", "int4", "int8", "tinyint"];

/// Coarse type tag reported by the meta endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Boolean,
    String,
    Datetime,
    Json,
    Binary,
}

impl ColumnKind {
    pub fn from_db_type(data_type: &str) -> Self {
        let t = data_type.to_lowercase();
        if t.ends_with("[]") {
            ColumnKind::Json
        } else if INTEGER_TYPES.iter().any(|i| t == *i) || t.ends_with("serial") {
            ColumnKind::Integer
        } else if t.starts_with("numeric")
            || t.starts_with("decimal")
            || t == "real"
            || t.starts_with("double")
            || t.starts_with("float")
            || t == "money"
        {
            ColumnKind::Float
        } else if t.starts_with("bool") {
            ColumnKind::Boolean
        } else if t.starts_with("timestamp") || t == "date" || t.starts_with("time") || t == "datetime" {
            ColumnKind::Datetime
        } else if t == "json" || t == "jsonb" {
            ColumnKind::Json
        } else if t == "bytea" || t == "blob" {
            ColumnKind::Binary
        } else {
            ColumnKind::String
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Integer => "integer",
            ColumnKind::Float => "float",
            ColumnKind::Boolean => "boolean",
            ColumnKind::String => "string",
            ColumnKind::Datetime => "datetime",
            ColumnKind::Json => "json",
            ColumnKind::Binary => "binary",
        }
    }
}

/// Primary key type for parsing path ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkType {
    Integer,
    Uuid,
    Text,
}

impl PkType {
    pub fn from_db_type(data_type: &str) -> Self {
        let t = data_type.to_lowercase();
        if t.contains("uuid") {
            PkType::Uuid
        } else if ColumnKind::from_db_type(&t) == ColumnKind::Integer {
            PkType::Integer
        } else {
            PkType::Text
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub const ALL: [Method; 5] = [Method::Get, Method::Post, Method::Put, Method::Patch, Method::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl std::str::FromStr for Method {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            _ => Err(ConfigError::Validation(format!(
                "unknown HTTP method '{}' (expected one of GET, POST, PUT, PATCH, DELETE)",
                s
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    /// Database type, used for SQL casts when binding text parameters.
    pub db_type: String,
    pub kind: ColumnKind,
    pub nullable: bool,
    pub has_default: bool,
    pub is_pk: bool,
}

#[derive(Clone, Debug)]
pub struct ResourceModel {
    pub table_name: String,
    pub path_segment: String,
    pub collection_key: String,
    pub pk_column: String,
    pub pk_type: PkType,
    /// In declaration order.
    pub columns: Vec<ColumnInfo>,
    /// Sorted, deduplicated.
    pub methods: Vec<Method>,
}

impl ResourceModel {
    pub fn allows(&self, method: Method) -> bool {
        self.methods.contains(&method)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn pk(&self) -> &ColumnInfo {
        // resolve() only builds models whose pk_column is one of the columns
        self.columns
            .iter()
            .find(|c| c.is_pk)
            .unwrap_or(&self.columns[0])
    }
}

/// Every exposed resource, keyed by base path. Built once at start and handed to the router.
#[derive(Clone, Debug, Default)]
pub struct ModelRegistry {
    models: Vec<Arc<ResourceModel>>,
    by_path: HashMap<String, usize>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, model: ResourceModel) -> Result<(), ConfigError> {
        if self.by_path.contains_key(&model.path_segment) {
            return Err(ConfigError::DuplicatePathSegment(model.path_segment));
        }
        self.by_path.insert(model.path_segment.clone(), self.models.len());
        self.models.push(Arc::new(model));
        Ok(())
    }

    pub fn by_path(&self, path: &str) -> Option<&Arc<ResourceModel>> {
        self.by_path.get(path).map(|&i| &self.models[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ResourceModel>> {
        self.models.iter()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
