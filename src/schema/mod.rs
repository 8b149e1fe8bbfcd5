//! Schema introspection: the tables, columns and primary keys of a live database.

mod postgres;
mod types;

pub use postgres::PgSchemaSource;
pub use types::{ReflectedColumn, ReflectedTable, SchemaSource};
