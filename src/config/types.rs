//! Raw settings matching the JSON settings file. Every field has a default.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_url: Option<String>,
    /// Database schema to reflect.
    pub schema: String,
    pub host: String,
    pub port: u16,
    pub max_connections: u32,
    /// Rows per page for `?page=N`.
    pub page_size: u32,
    /// Top-level key of collection responses unless a table overrides it.
    pub collection_key: String,
    /// Use the pluralized table name as collection key instead of `collection_key`.
    pub pluralize_collections: bool,
    /// Only these tables are exposed when non-empty.
    pub include: Vec<String>,
    /// Regex patterns; matching tables are skipped unless listed in `include`.
    pub exclude: Vec<String>,
    /// Cache-Control directives added to read responses.
    pub cache_control: Vec<String>,
    /// Shorthand for `no-cache, no-store, max-age=0`, applied when `cache_control` is empty.
    pub no_cache: bool,
    pub body_limit_bytes: usize,
    /// Per-table overrides keyed by reflected table name.
    pub tables: HashMap<String, TableOverride>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: None,
            schema: "public".into(),
            host: "0.0.0.0".into(),
            port: 5000,
            max_connections: 5,
            page_size: 20,
            collection_key: "resources".into(),
            pluralize_collections: false,
            include: Vec::new(),
            exclude: Vec::new(),
            cache_control: Vec::new(),
            no_cache: false,
            body_limit_bytes: 1024 * 1024,
            tables: HashMap::new(),
        }
    }
}

impl Settings {
    /// The Cache-Control header value for read responses, if any.
    pub fn cache_control_value(&self) -> Option<String> {
        if !self.cache_control.is_empty() {
            Some(self.cache_control.join(", "))
        } else if self.no_cache {
            Some("no-cache, no-store, max-age=0".into())
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TableOverride {
    /// Top-level JSON key for collection responses.
    pub collection: Option<String>,
    /// Base path segment; defaults to the lower-cased table name.
    pub path: Option<String>,
    /// Declared HTTP methods; defaults to all of GET, POST, PUT, PATCH, DELETE.
    pub methods: Option<Vec<String>>,
}
