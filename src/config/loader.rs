//! Load settings from a JSON file and the environment; resolve reflected tables into resource models.

use crate::config::resolved::{ColumnInfo, ColumnKind, Method, ModelRegistry, PkType, ResourceModel};
use crate::config::types::{Settings, TableOverride};
use crate::config::validator::{compile_patterns, parse_methods, validate_settings};
use crate::error::ConfigError;
use crate::schema::{ReflectedTable, SchemaSource};
use std::path::Path;

pub const ENV_CONFIG_PATH: &str = "TABLEREST_CONFIG";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_SCHEMA: &str = "TABLEREST_SCHEMA";
pub const ENV_PAGE_SIZE: &str = "TABLEREST_PAGE_SIZE";
pub const ENV_HOST: &str = "TABLEREST_HOST";
pub const ENV_PORT: &str = "TABLEREST_PORT";

/// Build the registry from reflected tables (validates settings first).
///
/// Tables without a single-column primary key cannot be addressed by id and are skipped with a
/// warning, unless they were listed in `include`, which makes the omission an error.
pub fn resolve(tables: &[ReflectedTable], settings: &Settings) -> Result<ModelRegistry, ConfigError> {
    validate_settings(settings, tables)?;
    let exclude = compile_patterns(&settings.exclude)?;
    let mut registry = ModelRegistry::new();

    for table in tables {
        let explicit = settings.include.iter().any(|t| *t == table.name);
        if !settings.include.is_empty() && !explicit {
            continue;
        }
        if !explicit && exclude.iter().any(|re| re.is_match(&table.name)) {
            tracing::debug!(table = %table.name, "excluded by pattern");
            continue;
        }

        let pk = table.primary_key();
        let pk_col = match pk.as_slice() {
            [one] => *one,
            others => {
                let reason = if others.is_empty() {
                    "no primary key".to_string()
                } else {
                    format!("composite primary key ({} columns)", others.len())
                };
                if explicit {
                    return Err(ConfigError::InvalidPrimaryKey {
                        table: table.name.clone(),
                        reason,
                    });
                }
                tracing::warn!("table {}: {}, skipping", table.name, reason);
                continue;
            }
        };

        let over = settings.tables.get(&table.name).cloned().unwrap_or_default();
        let model = build_model(table, pk_col.name.as_str(), &pk_col.data_type, &over, settings)?;
        tracing::debug!(table = %model.table_name, path = %model.path_segment, "resolved model");
        registry.insert(model)?;
    }

    Ok(registry)
}

fn build_model(
    table: &ReflectedTable,
    pk_name: &str,
    pk_db_type: &str,
    over: &TableOverride,
    settings: &Settings,
) -> Result<ResourceModel, ConfigError> {
    let columns = table
        .columns
        .iter()
        .map(|c| ColumnInfo {
            name: c.name.clone(),
            db_type: c.data_type.clone(),
            kind: ColumnKind::from_db_type(&c.data_type),
            nullable: c.nullable,
            has_default: c.has_default,
            is_pk: c.name == pk_name,
        })
        .collect();

    let methods = match &over.methods {
        Some(m) => parse_methods(m)?,
        None => Method::ALL.to_vec(),
    };

    let collection_key = match &over.collection {
        Some(c) => c.clone(),
        None if settings.pluralize_collections => pluralizer::pluralize(&table.name.to_lowercase(), 2, false),
        None => settings.collection_key.clone(),
    };

    Ok(ResourceModel {
        table_name: table.name.clone(),
        path_segment: over.path.clone().unwrap_or_else(|| table.name.to_lowercase()),
        collection_key,
        pk_column: pk_name.to_string(),
        pk_type: PkType::from_db_type(pk_db_type),
        columns,
        methods,
    })
}

/// Reflect every table from `source` and resolve it against `settings`.
pub async fn reflect(source: &dyn SchemaSource, settings: &Settings) -> Result<ModelRegistry, ConfigError> {
    let tables = source.tables().await?;
    resolve(&tables, settings)
}

/// Read settings from a JSON file. A missing path yields the defaults.
pub async fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&text).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}

/// Overlay values from the process environment.
pub fn apply_env(settings: &mut Settings) -> Result<(), ConfigError> {
    apply_env_from(settings, |k| std::env::var(k).ok())
}

pub fn apply_env_from<F>(settings: &mut Settings, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_DATABASE_URL) {
        settings.database_url = Some(url);
    }
    if let Some(schema) = lookup(ENV_SCHEMA) {
        settings.schema = schema;
    }
    if let Some(host) = lookup(ENV_HOST) {
        settings.host = host;
    }
    if let Some(port) = lookup(ENV_PORT) {
        settings.port = port
            .parse()
            .map_err(|_| ConfigError::Validation(format!("{}: invalid port '{}'", ENV_PORT, port)))?;
    }
    if let Some(size) = lookup(ENV_PAGE_SIZE) {
        settings.page_size = size
            .parse()
            .map_err(|_| ConfigError::Validation(format!("{}: invalid page size '{}'", ENV_PAGE_SIZE, size)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ReflectedColumn;
    use std::collections::HashMap;

    fn catalogue() -> Vec<ReflectedTable> {
        vec![
            ReflectedTable::new("Artist")
                .column(ReflectedColumn::new("ArtistId", "integer").primary_key().with_default())
                .column(ReflectedColumn::new("Name", "character varying(120)")),
            ReflectedTable::new("PlaylistTrack")
                .column(ReflectedColumn::new("PlaylistId", "integer").primary_key())
                .column(ReflectedColumn::new("TrackId", "integer").primary_key()),
            ReflectedTable::new("audit_log").column(ReflectedColumn::new("line", "text")),
            ReflectedTable::new("_migrations").column(ReflectedColumn::new("id", "integer").primary_key()),
        ]
    }

    #[test]
    fn keyless_and_composite_tables_are_skipped() {
        let registry = resolve(&catalogue(), &Settings::default()).unwrap();
        let names: Vec<&str> = registry.iter().map(|m| m.table_name.as_str()).collect();
        assert_eq!(names, vec!["Artist", "_migrations"]);
    }

    #[tokio::test]
    async fn reflect_reads_the_source_catalogue() {
        let registry = reflect(&catalogue(), &Settings::default()).await.unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.by_path("artist").is_some());
        assert!(registry.by_path("playlisttrack").is_none());
    }

    #[test]
    fn defaults_for_path_collection_and_methods() {
        let registry = resolve(&catalogue(), &Settings::default()).unwrap();
        let artist = registry.by_path("artist").unwrap();
        assert_eq!(artist.collection_key, "resources");
        assert_eq!(artist.pk_column, "ArtistId");
        assert_eq!(artist.pk_type, PkType::Integer);
        assert_eq!(artist.methods, Method::ALL.to_vec());
        assert_eq!(artist.columns[1].kind, ColumnKind::String);
    }

    #[test]
    fn overrides_and_exclusions_apply() {
        let mut tables = HashMap::new();
        tables.insert(
            "Artist".to_string(),
            TableOverride {
                collection: Some("singers".into()),
                path: Some("artists".into()),
                methods: Some(vec!["get".into(), "post".into()]),
            },
        );
        let settings = Settings {
            exclude: vec!["^_".into()],
            tables,
            ..Settings::default()
        };
        let registry = resolve(&catalogue(), &settings).unwrap();
        assert_eq!(registry.len(), 1);
        let artist = registry.by_path("artists").unwrap();
        assert_eq!(artist.collection_key, "singers");
        assert_eq!(artist.methods, vec![Method::Get, Method::Post]);
    }

    #[test]
    fn pluralized_collection_keys() {
        let settings = Settings {
            pluralize_collections: true,
            include: vec!["Artist".into()],
            ..Settings::default()
        };
        let registry = resolve(&catalogue(), &settings).unwrap();
        assert_eq!(registry.by_path("artist").unwrap().collection_key, "artists");
    }

    #[test]
    fn explicitly_included_composite_table_is_an_error() {
        let settings = Settings {
            include: vec!["PlaylistTrack".into()],
            ..Settings::default()
        };
        assert!(matches!(
            resolve(&catalogue(), &settings),
            Err(ConfigError::InvalidPrimaryKey { .. })
        ));
    }

    #[test]
    fn colliding_paths_are_rejected() {
        let tables = vec![
            ReflectedTable::new("Genre").column(ReflectedColumn::new("id", "integer").primary_key()),
            ReflectedTable::new("genre").column(ReflectedColumn::new("id", "integer").primary_key()),
        ];
        assert!(matches!(
            resolve(&tables, &Settings::default()),
            Err(ConfigError::DuplicatePathSegment(p)) if p == "genre"
        ));
    }

    #[test]
    fn environment_overlays_settings() {
        let mut settings = Settings::default();
        let env: HashMap<&str, &str> = [(ENV_PORT, "8080"), (ENV_SCHEMA, "music"), (ENV_PAGE_SIZE, "50")]
            .into_iter()
            .collect();
        apply_env_from(&mut settings, |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.schema, "music");
        assert_eq!(settings.page_size, 50);

        let bad = |k: &str| (k == ENV_PORT).then(|| "eighty".to_string());
        assert!(apply_env_from(&mut settings, bad).is_err());
    }

    #[test]
    fn settings_file_fields_default() {
        let settings: Settings = serde_json::from_str(r#"{"page_size": 5, "tables": {"Artist": {"collection": "singers"}}}"#).unwrap();
        assert_eq!(settings.page_size, 5);
        assert_eq!(settings.collection_key, "resources");
        assert_eq!(settings.tables["Artist"].collection.as_deref(), Some("singers"));
        assert!(settings.tables["Artist"].methods.is_none());
    }
}
