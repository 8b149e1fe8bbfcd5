//! tablerest: an instant REST API over the tables of an existing database.

pub mod adapter;
pub mod app;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod schema;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use app::build_router;
pub use config::{apply_env, load_settings, reflect, resolve, ModelRegistry, ResourceModel, Settings};
pub use error::{AppError, ConfigError, StoreError};
pub use schema::{PgSchemaSource, ReflectedColumn, ReflectedTable, SchemaSource};
pub use service::{CreateOutcome, ResourceService};
pub use state::AppState;
pub use store::{MemoryRowStore, PgRowStore, Row, RowStore, Session};
