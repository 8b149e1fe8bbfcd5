//! MemoryRowStore - HashMap-backed row store for tests, demos and development.
//!
//! Sessions work on private copies of the tables they touch and replay their write log onto the
//! shared state on commit. Writes are checked the way a database would check them: declared
//! columns only, primary-key uniqueness, NOT NULL, and coarse type conversion.

use crate::config::ColumnKind;
use crate::config::ResourceModel;
use crate::error::{ConfigError, StoreError};
use crate::schema::{ReflectedColumn, ReflectedTable, SchemaSource};
use crate::store::{Row, RowStore, Session};
use async_trait::async_trait;
use serde_json::{Number, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum RowKey {
    Int(i64),
    Text(String),
}

impl RowKey {
    fn from_value(v: &Value) -> Option<Self> {
        match v {
            Value::Null => None,
            Value::Number(n) => Some(n.as_i64().map(RowKey::Int).unwrap_or_else(|| RowKey::Text(n.to_string()))),
            Value::String(s) => Some(RowKey::Text(s.clone())),
            other => Some(RowKey::Text(other.to_string())),
        }
    }
}

#[derive(Clone, Debug)]
struct MemoryTable {
    def: ReflectedTable,
    rows: BTreeMap<RowKey, Row>,
    /// Next value handed out for an omitted integer key with a default.
    next_id: i64,
}

#[derive(Default)]
struct MemoryState {
    order: Vec<String>,
    tables: HashMap<String, MemoryTable>,
}

#[derive(Clone)]
pub struct MemoryRowStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryRowStore {
    pub fn new(tables: Vec<ReflectedTable>) -> Self {
        let mut state = MemoryState::default();
        for def in tables {
            state.order.push(def.name.clone());
            state.tables.insert(
                def.name.clone(),
                MemoryTable {
                    def,
                    rows: BTreeMap::new(),
                    next_id: 1,
                },
            );
        }
        MemoryRowStore {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Insert rows directly, with the same checks as a session insert.
    pub fn seed<I>(&self, table: &str, rows: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = Value>,
    {
        let mut state = self
            .state
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;
        let t = state
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::Backend(format!("no such table: {}", table)))?;
        for v in rows {
            let Value::Object(values) = v else {
                return Err(StoreError::Backend("seed rows must be JSON objects".into()));
            };
            let (key, row) = t.prepare_insert(&values, None)?;
            t.rows.insert(key, row);
        }
        Ok(())
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.state
            .read()
            .ok()
            .and_then(|s| s.tables.get(table).map(|t| t.rows.len()))
            .unwrap_or(0)
    }
}

#[async_trait]
impl SchemaSource for MemoryRowStore {
    async fn tables(&self) -> Result<Vec<ReflectedTable>, ConfigError> {
        let state = self
            .state
            .read()
            .map_err(|_| ConfigError::Load("lock poisoned".into()))?;
        Ok(state
            .order
            .iter()
            .filter_map(|name| state.tables.get(name).map(|t| t.def.clone()))
            .collect())
    }
}

#[async_trait]
impl RowStore for MemoryRowStore {
    async fn begin(&self) -> Result<Box<dyn Session>, StoreError> {
        Ok(Box::new(MemorySession {
            state: self.state.clone(),
            working: HashMap::new(),
            log: Vec::new(),
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.state
            .read()
            .map(|_| ())
            .map_err(|_| StoreError::Backend("lock poisoned".into()))
    }
}

enum WriteOp {
    /// `inserted` marks a new row, which must not collide with a row committed meanwhile.
    Put { table: String, key: RowKey, row: Row, inserted: bool },
    Remove { table: String, key: RowKey },
}

struct MemorySession {
    state: Arc<RwLock<MemoryState>>,
    working: HashMap<String, MemoryTable>,
    log: Vec<WriteOp>,
}

impl MemorySession {
    fn table(&mut self, name: &str) -> Result<&mut MemoryTable, StoreError> {
        if !self.working.contains_key(name) {
            let state = self
                .state
                .read()
                .map_err(|_| StoreError::Backend("lock poisoned".into()))?;
            let t = state
                .tables
                .get(name)
                .cloned()
                .ok_or_else(|| StoreError::Backend(format!("no such table: {}", name)))?;
            drop(state);
            self.working.insert(name.to_string(), t);
        }
        self.working
            .get_mut(name)
            .ok_or_else(|| StoreError::Backend(format!("no such table: {}", name)))
    }

    /// Hand out the next integer key from the shared table so concurrent sessions never share one.
    fn allocate_id(&self, name: &str) -> Result<i64, StoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;
        let t = state
            .tables
            .get_mut(name)
            .ok_or_else(|| StoreError::Backend(format!("no such table: {}", name)))?;
        let id = t.next_id;
        t.next_id = t.next_id.saturating_add(1);
        Ok(id)
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn get(&mut self, model: &ResourceModel, id: &Value) -> Result<Option<Row>, StoreError> {
        let t = self.table(&model.table_name)?;
        let key = t.key_for(id)?;
        Ok(key.and_then(|k| t.rows.get(&k).cloned()))
    }

    async fn list(&mut self, model: &ResourceModel, limit: Option<u64>, offset: u64) -> Result<Vec<Row>, StoreError> {
        let t = self.table(&model.table_name)?;
        let rows = t.rows.values().skip(offset as usize);
        Ok(match limit {
            Some(n) => rows.take(n as usize).cloned().collect(),
            None => rows.cloned().collect(),
        })
    }

    async fn find_matching(&mut self, model: &ResourceModel, filter: &Row) -> Result<Option<Row>, StoreError> {
        let t = self.table(&model.table_name)?;
        let mut wanted = Vec::new();
        for (k, v) in filter {
            let Some(col) = t.def.columns.iter().find(|c| c.name == *k) else { continue };
            wanted.push((k.as_str(), coerce(col, v)?));
        }
        Ok(t
            .rows
            .values()
            .find(|row| {
                wanted
                    .iter()
                    .all(|(k, v)| row.get(*k).unwrap_or(&Value::Null) == v)
            })
            .cloned())
    }

    async fn count(&mut self, model: &ResourceModel) -> Result<u64, StoreError> {
        Ok(self.table(&model.table_name)?.rows.len() as u64)
    }

    async fn insert(&mut self, model: &ResourceModel, values: &Row) -> Result<Row, StoreError> {
        let auto = self.table(&model.table_name)?.assigns_integer_key(values)?;
        let id = if auto {
            Some(self.allocate_id(&model.table_name)?)
        } else {
            None
        };
        let t = self.table(&model.table_name)?;
        let (key, row) = t.prepare_insert(values, id)?;
        t.rows.insert(key.clone(), row.clone());
        self.log.push(WriteOp::Put {
            table: model.table_name.clone(),
            key,
            row: row.clone(),
            inserted: true,
        });
        Ok(row)
    }

    async fn update(&mut self, model: &ResourceModel, id: &Value, changes: &Row) -> Result<Option<Row>, StoreError> {
        let t = self.table(&model.table_name)?;
        let Some(key) = t.key_for(id)? else { return Ok(None) };
        let Some(existing) = t.rows.get(&key) else { return Ok(None) };
        let mut row = existing.clone();
        t.apply_changes(&mut row, changes)?;
        t.rows.insert(key.clone(), row.clone());
        self.log.push(WriteOp::Put {
            table: model.table_name.clone(),
            key,
            row: row.clone(),
            inserted: false,
        });
        Ok(Some(row))
    }

    async fn delete(&mut self, model: &ResourceModel, id: &Value) -> Result<bool, StoreError> {
        let t = self.table(&model.table_name)?;
        let Some(key) = t.key_for(id)? else { return Ok(false) };
        if t.rows.remove(&key).is_none() {
            return Ok(false);
        }
        self.log.push(WriteOp::Remove {
            table: model.table_name.clone(),
            key,
        });
        Ok(true)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;

        // Check every insert before applying anything; a rejected commit leaves the tables untouched.
        let mut removed: Vec<(&str, &RowKey)> = Vec::new();
        for op in &self.log {
            match op {
                WriteOp::Put {
                    table,
                    key,
                    inserted: true,
                    ..
                } => {
                    let committed = state.tables.get(table).map_or(false, |t| t.rows.contains_key(key));
                    if committed && !removed.contains(&(table.as_str(), key)) {
                        return Err(duplicate_key(table));
                    }
                }
                WriteOp::Remove { table, key } => removed.push((table.as_str(), key)),
                WriteOp::Put { .. } => {}
            }
        }

        for op in self.log {
            match op {
                WriteOp::Put { table, key, row, .. } => {
                    if let Some(t) = state.tables.get_mut(&table) {
                        t.rows.insert(key, row);
                    }
                }
                WriteOp::Remove { table, key } => {
                    if let Some(t) = state.tables.get_mut(&table) {
                        t.rows.remove(&key);
                    }
                }
            }
        }
        for (name, working) in self.working {
            if let Some(t) = state.tables.get_mut(&name) {
                t.next_id = t.next_id.max(working.next_id);
            }
        }
        Ok(())
    }
}

impl MemoryTable {
    fn pk(&self) -> Result<&ReflectedColumn, StoreError> {
        self.def
            .columns
            .iter()
            .find(|c| c.primary_key)
            .ok_or_else(|| StoreError::Backend(format!("table {} has no primary key", self.def.name)))
    }

    fn key_for(&self, id: &Value) -> Result<Option<RowKey>, StoreError> {
        let pk = self.pk()?;
        Ok(RowKey::from_value(&coerce(pk, id)?))
    }

    fn check_columns(&self, values: &Row) -> Result<(), StoreError> {
        for k in values.keys() {
            if !self.def.columns.iter().any(|c| c.name == *k) {
                return Err(StoreError::Constraint(format!(
                    "column \"{}\" of relation \"{}\" does not exist",
                    k, self.def.name
                )));
            }
        }
        Ok(())
    }

    /// Whether an insert of `values` takes its key from the integer sequence.
    fn assigns_integer_key(&self, values: &Row) -> Result<bool, StoreError> {
        let pk = self.pk()?;
        Ok(pk.has_default
            && !values.contains_key(&pk.name)
            && ColumnKind::from_db_type(&pk.data_type) == ColumnKind::Integer)
    }

    /// `assigned` is a key already taken from the shared sequence; without one the table's own is used.
    fn prepare_insert(&mut self, values: &Row, assigned: Option<i64>) -> Result<(RowKey, Row), StoreError> {
        self.check_columns(values)?;
        let mut row = Row::new();
        for col in &self.def.columns {
            let v = match values.get(&col.name) {
                Some(v) => coerce(col, v)?,
                None => Value::Null,
            };
            row.insert(col.name.clone(), v);
        }

        let pk = self.pk()?.clone();
        if !values.contains_key(&pk.name) && pk.has_default {
            match ColumnKind::from_db_type(&pk.data_type) {
                ColumnKind::Integer => {
                    let id = match assigned {
                        Some(id) => id,
                        None => {
                            let id = self.next_id;
                            self.next_id = self.next_id.saturating_add(1);
                            id
                        }
                    };
                    row.insert(pk.name.clone(), Value::Number(id.into()));
                }
                _ if pk.data_type.eq_ignore_ascii_case("uuid") => {
                    row.insert(pk.name.clone(), Value::String(uuid::Uuid::new_v4().to_string()));
                }
                _ => {}
            }
        }

        for col in &self.def.columns {
            let omitted_with_default = col.has_default && !values.contains_key(&col.name);
            if !col.nullable && !omitted_with_default && row.get(&col.name).map_or(true, Value::is_null) {
                return Err(not_null(&self.def.name, &col.name));
            }
        }

        let key = row
            .get(&pk.name)
            .and_then(RowKey::from_value)
            .ok_or_else(|| not_null(&self.def.name, &pk.name))?;
        if self.rows.contains_key(&key) {
            return Err(duplicate_key(&self.def.name));
        }
        if let RowKey::Int(n) = key {
            self.next_id = self.next_id.max(n.saturating_add(1));
        }
        Ok((key, row))
    }

    fn apply_changes(&self, row: &mut Row, changes: &Row) -> Result<(), StoreError> {
        self.check_columns(changes)?;
        for col in &self.def.columns {
            if col.primary_key {
                continue;
            }
            let Some(v) = changes.get(&col.name) else { continue };
            let v = coerce(col, v)?;
            if v.is_null() && !col.nullable {
                return Err(not_null(&self.def.name, &col.name));
            }
            row.insert(col.name.clone(), v);
        }
        Ok(())
    }
}

fn duplicate_key(table: &str) -> StoreError {
    StoreError::Constraint(format!(
        "duplicate key value violates unique constraint \"{}_pkey\"",
        table
    ))
}

fn not_null(table: &str, column: &str) -> StoreError {
    StoreError::Constraint(format!(
        "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
        column, table
    ))
}

fn invalid(col: &ReflectedColumn, v: &Value) -> StoreError {
    let text = match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    StoreError::Constraint(format!("invalid input syntax for type {}: \"{}\"", col.data_type, text))
}

fn parses_as_datetime(s: &str) -> bool {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").is_ok()
        || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
        || NaiveTime::parse_from_str(s, "%H:%M:%S%.f").is_ok()
}

/// Convert a JSON value to what the column would store, or fail like a text-to-type cast.
fn coerce(col: &ReflectedColumn, v: &Value) -> Result<Value, StoreError> {
    if v.is_null() {
        return Ok(Value::Null);
    }
    match ColumnKind::from_db_type(&col.data_type) {
        ColumnKind::Integer => match v {
            Value::Number(n) if n.as_i64().is_some() => Ok(v.clone()),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(|n| Value::Number(n.into()))
                .map_err(|_| invalid(col, v)),
            _ => Err(invalid(col, v)),
        },
        ColumnKind::Float => match v {
            Value::Number(n) => n
                .as_f64()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| invalid(col, v)),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| invalid(col, v)),
            _ => Err(invalid(col, v)),
        },
        ColumnKind::Boolean => match v {
            Value::Bool(_) => Ok(v.clone()),
            Value::String(s) => match s.to_lowercase().as_str() {
                "true" | "t" | "yes" | "on" | "1" => Ok(Value::Bool(true)),
                "false" | "f" | "no" | "off" | "0" => Ok(Value::Bool(false)),
                _ => Err(invalid(col, v)),
            },
            _ => Err(invalid(col, v)),
        },
        ColumnKind::Datetime => match v {
            Value::String(s) if parses_as_datetime(s) => Ok(v.clone()),
            _ => Err(invalid(col, v)),
        },
        ColumnKind::Json if col.data_type.ends_with("[]") => match v {
            Value::Array(_) => Ok(v.clone()),
            _ => Err(StoreError::Constraint(format!("malformed array literal: \"{}\"", v))),
        },
        ColumnKind::Json => Ok(v.clone()),
        ColumnKind::Binary => match v {
            Value::String(_) => Ok(v.clone()),
            _ => Err(invalid(col, v)),
        },
        ColumnKind::String if col.data_type.eq_ignore_ascii_case("uuid") => match v {
            Value::String(s) => uuid::Uuid::parse_str(s)
                .map(|u| Value::String(u.to_string()))
                .map_err(|_| invalid(col, v)),
            _ => Err(invalid(col, v)),
        },
        ColumnKind::String => match v {
            Value::String(_) => Ok(v.clone()),
            other => Ok(Value::String(other.to_string())),
        },
    }
}
