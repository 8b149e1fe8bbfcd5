//! Settings validation: sane values and references to tables that actually exist.

use crate::config::{Method, Settings};
use crate::error::ConfigError;
use crate::schema::ReflectedTable;
use regex::Regex;
use std::collections::HashSet;

/// Path prefix reserved for health/readiness/version routes.
pub const SERVICE_PATH_SEGMENT: &str = "_service";

pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|p| Regex::new(p).map_err(|e| ConfigError::Validation(format!("exclude pattern '{}': {}", p, e))))
        .collect()
}

pub fn parse_methods(methods: &[String]) -> Result<Vec<Method>, ConfigError> {
    let mut out = methods.iter().map(|m| m.parse()).collect::<Result<Vec<Method>, _>>()?;
    out.sort();
    out.dedup();
    Ok(out)
}

fn valid_path_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != SERVICE_PATH_SEGMENT
        && !segment.contains('/')
        && !segment.starts_with(':')
        && !segment.starts_with('*')
}

pub fn validate_settings(settings: &Settings, tables: &[ReflectedTable]) -> Result<(), ConfigError> {
    if settings.page_size == 0 {
        return Err(ConfigError::Validation("page_size must be at least 1".into()));
    }
    if settings.collection_key.is_empty() {
        return Err(ConfigError::Validation("collection_key must not be empty".into()));
    }
    compile_patterns(&settings.exclude)?;

    let table_names: HashSet<&str> = tables.iter().map(|t| t.name.as_str()).collect();
    for name in &settings.include {
        if !table_names.contains(name.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "table",
                id: name.clone(),
            });
        }
    }

    for (name, over) in &settings.tables {
        if !table_names.contains(name.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "table",
                id: name.clone(),
            });
        }
        if let Some(methods) = &over.methods {
            parse_methods(methods)?;
        }
        if let Some(path) = &over.path {
            if !valid_path_segment(path) {
                return Err(ConfigError::Validation(format!(
                    "table {}: invalid path segment '{}'",
                    name, path
                )));
            }
        }
        if matches!(&over.collection, Some(c) if c.is_empty()) {
            return Err(ConfigError::Validation(format!("table {}: empty collection name", name)));
        }
    }

    for t in tables {
        let default_path = t.name.to_lowercase();
        let overridden = settings.tables.get(&t.name).and_then(|o| o.path.as_ref()).is_some();
        if !overridden && default_path == SERVICE_PATH_SEGMENT {
            return Err(ConfigError::DuplicatePathSegment(default_path));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableOverride;
    use crate::schema::ReflectedColumn;

    fn tables() -> Vec<ReflectedTable> {
        vec![ReflectedTable::new("Artist").column(ReflectedColumn::new("ArtistId", "integer").primary_key())]
    }

    #[test]
    fn defaults_are_valid() {
        assert!(validate_settings(&Settings::default(), &tables()).is_ok());
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let settings = Settings {
            page_size: 0,
            ..Settings::default()
        };
        assert!(matches!(validate_settings(&settings, &tables()), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn override_for_unknown_table_is_rejected() {
        let mut settings = Settings::default();
        settings.tables.insert("Nope".into(), TableOverride::default());
        assert!(matches!(
            validate_settings(&settings, &tables()),
            Err(ConfigError::MissingReference { kind: "table", .. })
        ));
    }

    #[test]
    fn bad_method_and_bad_pattern_are_rejected() {
        let mut settings = Settings::default();
        settings.tables.insert(
            "Artist".into(),
            TableOverride {
                methods: Some(vec!["GET".into(), "FETCH".into()]),
                ..TableOverride::default()
            },
        );
        assert!(validate_settings(&settings, &tables()).is_err());

        let settings = Settings {
            exclude: vec!["(".into()],
            ..Settings::default()
        };
        assert!(validate_settings(&settings, &tables()).is_err());
    }

    #[test]
    fn reserved_path_is_rejected() {
        let mut settings = Settings::default();
        settings.tables.insert(
            "Artist".into(),
            TableOverride {
                path: Some(SERVICE_PATH_SEGMENT.into()),
                ..TableOverride::default()
            },
        );
        assert!(validate_settings(&settings, &tables()).is_err());
    }
}
