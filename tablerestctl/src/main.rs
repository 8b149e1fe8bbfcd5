//! tablerestctl: reflect a PostgreSQL database and serve its tables over HTTP.
//!
//! `tablerestctl postgres://localhost/chinook --port 8080`

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tablerest::config::ENV_CONFIG_PATH;
use tablerest::{apply_env, build_router, load_settings, reflect, AppState, PgRowStore, PgSchemaSource};
use tokio::net::TcpListener;

#[derive(Debug, Parser)]
#[command(name = "tablerestctl")]
#[command(about = "Instant REST API for an existing PostgreSQL database")]
struct Args {
    /// Database URI; falls back to DATABASE_URL and then the settings file.
    uri: Option<String>,
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    /// JSON settings file (also TABLEREST_CONFIG).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tablerest=info,tablerestctl=info")),
        )
        .init();

    let args = Args::parse();
    let config_path = args
        .config
        .clone()
        .or_else(|| std::env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from));
    let mut settings = load_settings(config_path.as_deref()).await?;
    apply_env(&mut settings)?;
    if let Some(uri) = args.uri {
        settings.database_url = Some(uri);
    }
    if let Some(host) = args.host {
        settings.host = host;
    }
    if let Some(port) = args.port {
        settings.port = port;
    }

    let database_url = settings
        .database_url
        .clone()
        .ok_or("no database URI: pass one, set DATABASE_URL, or set database_url in the settings file")?;
    let store = PgRowStore::connect(&database_url, settings.max_connections, &settings.schema).await?;
    let source = PgSchemaSource::new(store.pool().clone(), settings.schema.clone());
    let registry = reflect(&source, &settings).await?;
    if registry.is_empty() {
        tracing::warn!(schema = %settings.schema, "no tables with a single-column primary key found");
    }

    let addr = format!("{}:{}", settings.host, settings.port);
    let state = AppState::new(registry, Arc::new(store), settings);
    let app = build_router(state)?;

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("tablerest listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
